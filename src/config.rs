use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{AppError, Result};
use crate::services::{ExtractionRules, TelegramConfig};

const BOT_TOKEN_VARS: &[&str] = &["TELEGRAM_BOT_TOKEN"];
const CHANNEL_ID_VARS: &[&str] = &[
    "CHANNEL_ID",
    "channel_id",
    "TELEGRAM_CHANNEL_ID",
    "TELEGRAM_CHAT_ID",
];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_db_path")]
    pub db_path: String,

    #[serde(default = "default_source_url")]
    pub source_url: String,

    #[serde(default = "default_filter_pattern")]
    pub filter_pattern: String,

    #[serde(default)]
    pub case_sensitive: bool,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_schedule_time")]
    pub schedule_time: String,

    #[serde(default = "default_schedule_offset")]
    pub schedule_utc_offset_hours: i32,

    pub telegram_bot_token: Option<String>,
    pub telegram_channel_id: Option<String>,

    #[serde(default)]
    pub extraction: ExtractionRules,
}

fn default_db_path() -> String {
    let data_dir = dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("headline-relay");
    std::fs::create_dir_all(&data_dir).ok();
    data_dir.join("articles.db").to_string_lossy().to_string()
}

fn default_source_url() -> String {
    "https://techcrunch.com/category/artificial-intelligence/".to_string()
}

fn default_filter_pattern() -> String {
    "*/2025/*".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

fn default_schedule_time() -> String {
    "07:00".to_string()
}

fn default_schedule_offset() -> i32 {
    7
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            source_url: default_source_url(),
            filter_pattern: default_filter_pattern(),
            case_sensitive: false,
            request_timeout_secs: default_request_timeout(),
            schedule_time: default_schedule_time(),
            schedule_utc_offset_hours: default_schedule_offset(),
            telegram_bot_token: None,
            telegram_channel_id: None,
            extraction: ExtractionRules::default(),
        }
    }
}

impl Config {
    /// Loads the config file (writing defaults on first run), then applies
    /// credentials from the environment.
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        let mut config = if config_path.exists() {
            Self::load_from(&config_path)?
        } else {
            let config = Config::default();
            config.save()?;
            config
        };

        config.apply_env(|name| std::env::var(name).ok());
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| AppError::Config(e.to_string()))?;
        std::fs::write(config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("headline-relay")
            .join("config.toml")
    }

    /// Environment values win over the file. Blank values are ignored.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let first_set = |names: &[&str]| {
            names
                .iter()
                .filter_map(|name| lookup(name))
                .find(|value| !value.trim().is_empty())
        };

        if let Some(token) = first_set(BOT_TOKEN_VARS) {
            self.telegram_bot_token = Some(token);
        }
        if let Some(channel) = first_set(CHANNEL_ID_VARS) {
            self.telegram_channel_id = Some(channel);
        }
    }

    /// Both credentials, or nothing.
    pub fn telegram(&self) -> Option<TelegramConfig> {
        let bot_token = self.telegram_bot_token.as_deref()?.trim();
        let chat_id = self.telegram_channel_id.as_deref()?.trim();
        if bot_token.is_empty() || chat_id.is_empty() {
            return None;
        }
        Some(TelegramConfig {
            bot_token: bot_token.to_string(),
            chat_id: chat_id.to_string(),
        })
    }
}

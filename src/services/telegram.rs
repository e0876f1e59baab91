use std::time::Duration;

use reqwest::Client;
use serde::Serialize;

const TELEGRAM_API_URL: &str = "https://api.telegram.org";

/// Telegram's limit for a single message.
pub const MAX_MESSAGE_CHARS: usize = 4096;
/// Body previews are cut to this before the message is assembled.
pub const MAX_PREVIEW_CHARS: usize = 3000;
const ELLIPSIS: &str = "...";
/// Reserved for the link line and its formatting when the body must shrink.
const LINK_OVERHEAD: usize = 50;
/// Reserved for the headline and date formatting when the body must shrink.
const FORMAT_OVERHEAD: usize = 100;

/// Credentials for the destination channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub chat_id: String,
}

/// Anything that can relay an article. `send` reports delivery as a bool and
/// never fails.
#[allow(async_fn_in_trait)]
pub trait Notifier {
    fn is_enabled(&self) -> bool;

    async fn send(&self, headline: &str, url: &str, date: &str, body_preview: &str) -> bool;
}

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'a str,
    disable_web_page_preview: bool,
}

struct Channel {
    client: Client,
    config: TelegramConfig,
    api_base: String,
}

pub struct TelegramNotifier {
    channel: Option<Channel>,
}

impl TelegramNotifier {
    /// Without credentials, or without a working HTTP client, every send is
    /// suppressed and reports `false`.
    pub fn new(config: Option<TelegramConfig>) -> Self {
        let Some(config) = config else {
            tracing::debug!("Telegram credentials not configured, notifications disabled");
            return Self::disabled();
        };
        Self::with_api_base(config, TELEGRAM_API_URL)
    }

    /// Sends through `api_base` instead of the public Bot API endpoint.
    pub(crate) fn with_api_base(config: TelegramConfig, api_base: &str) -> Self {
        match Client::builder().timeout(Duration::from_secs(10)).build() {
            Ok(client) => Self {
                channel: Some(Channel {
                    client,
                    config,
                    api_base: api_base.trim_end_matches('/').to_string(),
                }),
            },
            Err(e) => {
                tracing::warn!("Failed to create HTTP client, notifications disabled: {}", e);
                Self::disabled()
            }
        }
    }

    pub fn disabled() -> Self {
        Self { channel: None }
    }
}

impl Notifier for TelegramNotifier {
    fn is_enabled(&self) -> bool {
        self.channel.is_some()
    }

    async fn send(&self, headline: &str, url: &str, date: &str, body_preview: &str) -> bool {
        let Some(channel) = &self.channel else {
            return false;
        };

        let text = format_message(headline, url, date, body_preview);
        let request = SendMessageRequest {
            chat_id: &channel.config.chat_id,
            text: &text,
            parse_mode: "Markdown",
            disable_web_page_preview: false,
        };

        let response = channel
            .client
            .post(format!(
                "{}/bot{}/sendMessage",
                channel.api_base, channel.config.bot_token
            ))
            .json(&request)
            .send()
            .await;

        match response {
            Ok(response) if response.status().is_success() => true,
            Ok(response) => {
                let status = response.status();
                let detail = response.text().await.unwrap_or_default();
                tracing::warn!(%url, %status, %detail, "Telegram rejected message");
                false
            }
            Err(e) => {
                tracing::warn!(%url, "Telegram API error: {}", e);
                false
            }
        }
    }
}

/// Builds the Markdown message, keeping it within [`MAX_MESSAGE_CHARS`].
///
/// The body preview is shortened first, then dropped. The link line is never
/// cut; headline and date are only shortened when they alone, with the link,
/// exceed the limit.
pub fn format_message(headline: &str, url: &str, date: &str, body_preview: &str) -> String {
    let preview = truncate_with_ellipsis(body_preview, MAX_PREVIEW_CHARS);

    let message = compose(headline, url, date, &preview);
    if char_len(&message) <= MAX_MESSAGE_CHARS {
        return message;
    }

    let budget = MAX_MESSAGE_CHARS as i64
        - char_len(url) as i64
        - LINK_OVERHEAD as i64
        - char_len(headline) as i64
        - char_len(date) as i64
        - FORMAT_OVERHEAD as i64;

    let message = if !preview.is_empty() && budget > 0 {
        let mut shortened: String = preview.chars().take(budget as usize).collect();
        shortened.push_str(ELLIPSIS);
        compose(headline, url, date, &shortened)
    } else {
        compose(headline, url, date, "")
    };
    if char_len(&message) <= MAX_MESSAGE_CHARS {
        return message;
    }

    let (headline_room, date_room) = header_rooms(url, char_len(headline), char_len(date));
    let headline = truncate_with_ellipsis(headline, headline_room);
    let date = truncate_with_ellipsis(date, date_room);
    let message = compose(&headline, url, &date, "");
    // Only a link longer than the limit itself gets here still oversized.
    message.chars().take(MAX_MESSAGE_CHARS).collect()
}

/// Splits the room beside the link line between headline and date. A field
/// shorter than half the room keeps its length and the other takes the rest.
fn header_rooms(url: &str, headline_len: usize, date_len: usize) -> (usize, usize) {
    let decoration = "📰 **\n".chars().count() + "📅 \n".chars().count() + 2 * ELLIPSIS.len();
    let available = MAX_MESSAGE_CHARS
        .saturating_sub(char_len(&compose("", url, "", "")))
        .saturating_sub(decoration);
    let half = available / 2;

    if date_len <= half {
        (available - date_len, date_len)
    } else if headline_len <= half {
        (headline_len, available - headline_len)
    } else {
        (available - half, half)
    }
}

fn compose(headline: &str, url: &str, date: &str, body_preview: &str) -> String {
    let mut parts = Vec::with_capacity(4);
    if !headline.is_empty() {
        parts.push(format!("📰 *{}*", headline));
    }
    if !date.is_empty() {
        parts.push(format!("📅 {}", date));
    }
    if !body_preview.is_empty() {
        parts.push(format!("\n{}", body_preview));
    }
    parts.push(format!("\n🔗 {}", url));
    parts.join("\n")
}

fn truncate_with_ellipsis(text: &str, max_chars: usize) -> String {
    if char_len(text) <= max_chars {
        return text.to_string();
    }
    let mut truncated: String = text.chars().take(max_chars).collect();
    truncated.push_str(ELLIPSIS);
    truncated
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

use std::path::Path;
use std::time::Duration;

use reqwest::Client;
use scraper::{Html, Selector};
use url::Url;

use crate::error::{AppError, Result};

const USER_AGENT_STRING: &str =
    "Mozilla/5.0 (X11; Linux x86_64; rv:128.0) Gecko/20100101 Firefox/128.0";

/// A fetched page together with the URL relative links resolve against.
#[derive(Debug, Clone)]
pub struct Page {
    pub html: String,
    pub base_url: Option<Url>,
}

pub struct PageFetcher {
    client: Client,
}

impl PageFetcher {
    pub fn new(timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(USER_AGENT_STRING)
            .build()?;

        Ok(Self { client })
    }

    /// Loads a page from an `http(s)://` URL or a local file path.
    /// Invalid UTF-8 is replaced rather than rejected.
    pub async fn fetch(&self, source: &str) -> Result<Page> {
        if is_remote(source) {
            let url = Url::parse(source)?;
            let response = self.client.get(url).send().await?;

            if !response.status().is_success() {
                return Err(AppError::Fetch(format!(
                    "{} returned HTTP {}",
                    source,
                    response.status()
                )));
            }

            let base_url = response.url().clone();
            let bytes = response.bytes().await?;
            tracing::debug!(url = %source, bytes = bytes.len(), "Fetched page");

            Ok(Page {
                html: String::from_utf8_lossy(&bytes).into_owned(),
                base_url: Some(base_url),
            })
        } else {
            let path = Path::new(source);
            if !path.is_file() {
                return Err(AppError::Fetch(format!("not a readable file: {}", source)));
            }

            let bytes = tokio::fs::read(path).await?;
            Ok(Page {
                html: String::from_utf8_lossy(&bytes).into_owned(),
                base_url: None,
            })
        }
    }
}

fn is_remote(source: &str) -> bool {
    source.starts_with("http://") || source.starts_with("https://")
}

impl Page {
    /// Every `<a href>` target in document order, resolved against the page URL when known.
    pub fn links(&self) -> Vec<String> {
        extract_links(&self.html, self.base_url.as_ref())
    }
}

pub fn extract_links(html: &str, base_url: Option<&Url>) -> Vec<String> {
    let document = Html::parse_document(html);
    let Ok(selector) = Selector::parse("a[href]") else {
        return Vec::new();
    };

    document
        .select(&selector)
        .filter_map(|element| element.value().attr("href"))
        .map(|href| resolve_url(href, base_url))
        .collect()
}

/// Resolve a potentially relative URL against a base URL
fn resolve_url(href: &str, base_url: Option<&Url>) -> String {
    if let Some(base) = base_url {
        if let Ok(resolved) = base.join(href) {
            return resolved.to_string();
        }
    }

    href.to_string()
}

//! Heuristic article extraction.
//!
//! Pulls a headline, a publication date and the body text out of an article
//! page. Every field is found by trying an ordered list of rules and keeping
//! the first hit, so a page that matches nothing degrades to empty strings.
//! The selector lists, date patterns and boilerplate lists live in
//! [`ExtractionRules`] and can be overridden from the config file.

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::ExtractedContent;

const PARAGRAPH_SEPARATOR: &str = "\n\n";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionRules {
    /// Removed from the whole document before anything is extracted.
    pub chrome_selectors: Vec<String>,
    pub headline_selectors: Vec<String>,
    /// A headline is cut at the first of these (e.g. "Title | Site").
    pub title_separators: Vec<String>,
    pub date_selector: String,
    /// Searched in order against the page text when no date element exists.
    pub date_patterns: Vec<String>,
    pub article_selector: String,
    /// Removed from inside an article or content container before reading it.
    pub container_noise_selectors: Vec<String>,
    pub content_selectors: Vec<String>,
    pub min_paragraph_chars: usize,
    pub min_body_chars: usize,
    /// Paragraphs containing these are skipped by the document-wide fallback.
    pub fallback_skip_phrases: Vec<String>,
    /// Paragraphs containing these are dropped from every body.
    pub boilerplate_keywords: Vec<String>,
}

impl Default for ExtractionRules {
    fn default() -> Self {
        Self {
            chrome_selectors: strings(&["script", "style", "nav", "footer", "header", "aside"]),
            headline_selectors: strings(&["h1", "article h1", ".article-title", ".post-title", "title"]),
            title_separators: strings(&["|"]),
            date_selector: "time".to_string(),
            date_patterns: strings(&[
                r"\d{1,2}:\d{2}\s*(?:AM|PM)\s*(?:PST|EST|CST|MST|UTC)?\s*[·•]\s*[A-Z][a-z]+\s+\d{1,2},\s+\d{4}",
                r"[A-Z][a-z]+\s+\d{1,2},\s+\d{4}",
                r"\d{1,2}/\d{1,2}/\d{4}",
                r"\d{4}-\d{2}-\d{2}",
            ]),
            article_selector: "article".to_string(),
            container_noise_selectors: strings(&[
                "nav", "footer", "aside", "header", "script", "style", "time",
            ]),
            content_selectors: strings(&[
                ".article-content",
                ".post-content",
                ".entry-content",
                "main",
                ".content",
            ]),
            min_paragraph_chars: 50,
            min_body_chars: 200,
            fallback_skip_phrases: strings(&[
                "subscribe",
                "newsletter",
                "register",
                "cookie",
                "privacy policy",
                "view bio",
                "you can contact",
            ]),
            boilerplate_keywords: strings(&[
                "subscribe",
                "newsletter",
                "register",
                "cookie",
                "privacy",
                "terms",
                "contact us",
                "advertise",
                "view bio",
                "you can contact",
                "topics",
                "related",
                "latest in",
                "image credits",
                "posted:",
                "in brief",
                "techcrunch",
                "©",
            ]),
        }
    }
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| s.to_string()).collect()
}

/// Ways of locating the body, tried in this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BodyStrategy {
    /// Paragraphs of the first semantic `<article>`.
    ArticleContainer,
    /// Paragraphs of the first common content container long enough to be a body.
    ContentContainers,
    /// Every remaining paragraph on the page that is not obvious boilerplate.
    DocumentParagraphs,
}

const BODY_STRATEGIES: [BodyStrategy; 3] = [
    BodyStrategy::ArticleContainer,
    BodyStrategy::ContentContainers,
    BodyStrategy::DocumentParagraphs,
];

impl BodyStrategy {
    fn applies(self, body: &str, min_body_chars: usize) -> bool {
        match self {
            BodyStrategy::ArticleContainer => true,
            BodyStrategy::ContentContainers => body.is_empty(),
            BodyStrategy::DocumentParagraphs => char_len(body) < min_body_chars,
        }
    }
}

pub struct ContentExtractor {
    chrome: Option<Selector>,
    headline: Vec<Selector>,
    title_separators: Vec<String>,
    date: Selector,
    date_patterns: Vec<Regex>,
    article: Selector,
    container_noise: Option<Selector>,
    content: Vec<Selector>,
    paragraph: Selector,
    min_paragraph_chars: usize,
    min_body_chars: usize,
    fallback_skip_phrases: Vec<String>,
    boilerplate_keywords: Vec<String>,
}

impl ContentExtractor {
    pub fn new(rules: &ExtractionRules) -> Result<Self> {
        let date_patterns = rules
            .date_patterns
            .iter()
            .map(|p| {
                Regex::new(p)
                    .map_err(|e| AppError::Config(format!("invalid date pattern '{}': {}", p, e)))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            chrome: parse_selector_list(&rules.chrome_selectors)?,
            headline: rules
                .headline_selectors
                .iter()
                .map(|s| parse_selector(s))
                .collect::<Result<Vec<_>>>()?,
            title_separators: rules
                .title_separators
                .iter()
                .filter(|s| !s.is_empty())
                .cloned()
                .collect(),
            date: parse_selector(&rules.date_selector)?,
            date_patterns,
            article: parse_selector(&rules.article_selector)?,
            container_noise: parse_selector_list(&rules.container_noise_selectors)?,
            content: rules
                .content_selectors
                .iter()
                .map(|s| parse_selector(s))
                .collect::<Result<Vec<_>>>()?,
            paragraph: parse_selector("p")?,
            min_paragraph_chars: rules.min_paragraph_chars,
            min_body_chars: rules.min_body_chars,
            fallback_skip_phrases: lowercase_all(&rules.fallback_skip_phrases),
            boilerplate_keywords: lowercase_all(&rules.boilerplate_keywords),
        })
    }

    /// Never fails: markup that matches nothing yields empty fields.
    pub fn extract(&self, html: &str) -> ExtractedContent {
        let mut document = Html::parse_document(html);

        if let Some(chrome) = &self.chrome {
            let ids: Vec<_> = document.select(chrome).map(|e| e.id()).collect();
            for id in ids {
                if let Some(mut node) = document.tree.get_mut(id) {
                    node.detach();
                }
            }
        }

        let headline = self.extract_headline(&document);
        let date = self.extract_date(&document);
        let body = self.extract_body(&mut document);

        ExtractedContent {
            date: date.trim().to_string(),
            headline: headline.trim().to_string(),
            body: body.trim().to_string(),
        }
    }

    fn extract_headline(&self, document: &Html) -> String {
        self.headline
            .iter()
            .filter_map(|selector| document.select(selector).next())
            .map(|element| self.strip_site_name(&collapsed_text(element)))
            .find(|headline| !headline.is_empty())
            .unwrap_or_default()
    }

    fn strip_site_name(&self, headline: &str) -> String {
        let cut = self
            .title_separators
            .iter()
            .filter_map(|sep| headline.find(sep.as_str()))
            .min()
            .unwrap_or(headline.len());
        headline[..cut].trim().to_string()
    }

    fn extract_date(&self, document: &Html) -> String {
        if let Some(time) = document.select(&self.date).next() {
            let text = collapsed_text(time);
            if !text.is_empty() {
                return text;
            }
            if let Some(datetime) = time.value().attr("datetime") {
                if !datetime.trim().is_empty() {
                    return datetime.trim().to_string();
                }
            }
        }

        let page_text: String = document.root_element().text().collect();
        self.date_patterns
            .iter()
            .find_map(|pattern| pattern.find(&page_text))
            .map(|m| m.as_str().to_string())
            .unwrap_or_default()
    }

    fn extract_body(&self, document: &mut Html) -> String {
        let mut body = String::new();

        for strategy in BODY_STRATEGIES {
            if !strategy.applies(&body, self.min_body_chars) {
                continue;
            }
            let found = match strategy {
                BodyStrategy::ArticleContainer => self.container_body(document, &self.article),
                BodyStrategy::ContentContainers => self.content_container_body(document),
                BodyStrategy::DocumentParagraphs => self.document_paragraphs(document),
            };
            if let Some(text) = found {
                tracing::trace!(?strategy, chars = char_len(&text), "Body candidate");
                body = text;
            }
        }

        self.drop_boilerplate(&body)
    }

    fn content_container_body(&self, document: &mut Html) -> Option<String> {
        let mut fallback = None;
        for selector in &self.content {
            if let Some(text) = self.container_body(document, selector) {
                if char_len(&text) > self.min_body_chars {
                    return Some(text);
                }
                fallback = Some(text);
            }
        }
        fallback
    }

    /// Reads the first element matching `selector`: its long paragraphs, or
    /// its whole text when it has no paragraphs at all.
    fn container_body(&self, document: &mut Html, selector: &Selector) -> Option<String> {
        let noise: Vec<_> = {
            let container = document.select(selector).next()?;
            match &self.container_noise {
                Some(noise) => container.select(noise).map(|e| e.id()).collect(),
                None => Vec::new(),
            }
        };
        for id in noise {
            if let Some(mut node) = document.tree.get_mut(id) {
                node.detach();
            }
        }

        let container = document.select(selector).next()?;
        let mut paragraphs = container.select(&self.paragraph).peekable();
        if paragraphs.peek().is_none() {
            let text = spaced_text(container);
            return (!text.is_empty()).then_some(text);
        }

        let parts: Vec<String> = paragraphs
            .map(spaced_text)
            .filter(|text| char_len(text) > self.min_paragraph_chars)
            .collect();
        (!parts.is_empty()).then(|| parts.join(PARAGRAPH_SEPARATOR))
    }

    fn document_paragraphs(&self, document: &Html) -> Option<String> {
        let parts: Vec<String> = document
            .select(&self.paragraph)
            .map(spaced_text)
            .filter(|text| {
                char_len(text) > self.min_paragraph_chars
                    && !contains_any(text, &self.fallback_skip_phrases)
            })
            .collect();
        (!parts.is_empty()).then(|| parts.join(PARAGRAPH_SEPARATOR))
    }

    fn drop_boilerplate(&self, body: &str) -> String {
        body.split(PARAGRAPH_SEPARATOR)
            .map(str::trim)
            .filter(|para| {
                char_len(para) > self.min_paragraph_chars
                    && !contains_any(para, &self.boilerplate_keywords)
            })
            .collect::<Vec<_>>()
            .join(PARAGRAPH_SEPARATOR)
    }
}

fn parse_selector(selector: &str) -> Result<Selector> {
    Selector::parse(selector)
        .map_err(|e| AppError::Config(format!("invalid selector '{}': {}", selector, e)))
}

fn parse_selector_list(selectors: &[String]) -> Result<Option<Selector>> {
    if selectors.is_empty() {
        return Ok(None);
    }
    parse_selector(&selectors.join(", ")).map(Some)
}

fn lowercase_all(values: &[String]) -> Vec<String> {
    values.iter().map(|v| v.to_lowercase()).collect()
}

/// `needles` must already be lowercase.
fn contains_any(text: &str, needles: &[String]) -> bool {
    let text = text.to_lowercase();
    needles.iter().any(|needle| text.contains(needle.as_str()))
}

/// Text nodes trimmed and joined with single spaces.
fn spaced_text(element: ElementRef) -> String {
    element
        .text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Full text with every whitespace run collapsed to one space.
fn collapsed_text(element: ElementRef) -> String {
    element
        .text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    const LONG_A: &str = "The company announced a new model that outperforms its predecessor on most benchmarks.";
    const LONG_B: &str = "Researchers said the release would be rolled out gradually to enterprise customers first.";
    const LONG_C: &str = "Analysts expect competitors to respond with their own announcements before the end of the year.";

    fn extractor() -> ContentExtractor {
        ContentExtractor::new(&ExtractionRules::default()).unwrap()
    }

    #[test]
    fn empty_or_plain_input_yields_empty_fields() {
        let extractor = extractor();
        assert_eq!(extractor.extract(""), ExtractedContent::default());
        assert_eq!(extractor.extract("not html at all"), ExtractedContent::default());
        assert_eq!(extractor.extract("<<<>>></p><div"), ExtractedContent::default());
    }

    #[test]
    fn newsletter_paragraph_is_dropped() {
        let html = format!(
            r#"<html><body><article>
                 <p>{LONG_A}</p>
                 <p>Want more stories like this? Subscribe to our newsletter for the weekly digest.</p>
               </article></body></html>"#
        );
        let content = extractor().extract(&html);
        assert_eq!(content.body, LONG_A);
    }

    #[test]
    fn article_paragraphs_are_joined_with_blank_lines() {
        let html = format!(
            r#"<html><head><title>Ignored | Site</title></head><body>
                 <h1>Model launch</h1>
                 <article>
                   <time datetime="2025-11-06T20:22:00Z">12:22 PM PST · November 6, 2025</time>
                   <p>{LONG_A}</p>
                   <p>Too short.</p>
                   <p>{LONG_B}</p>
                   <aside><p>{LONG_C}</p></aside>
                 </article>
               </body></html>"#
        );
        let content = extractor().extract(&html);
        assert_eq!(content.headline, "Model launch");
        assert_eq!(content.date, "12:22 PM PST · November 6, 2025");
        assert_eq!(content.body, format!("{LONG_A}\n\n{LONG_B}"));
    }

    #[test]
    fn headline_falls_back_to_title_without_site_name() {
        let html = r#"<html><head><title>Big news today | Example Site</title></head><body></body></html>"#;
        assert_eq!(extractor().extract(html).headline, "Big news today");
    }

    #[test]
    fn headline_inside_page_header_is_ignored() {
        let html = r#"<html><body>
                 <header><h1>Site Banner</h1></header>
                 <div class="post-title">Real   headline</div>
               </body></html>"#;
        assert_eq!(extractor().extract(html).headline, "Real headline");
    }

    #[test]
    fn date_uses_datetime_attribute_when_time_is_blank() {
        let html = r#"<html><body><div><time datetime="2025-11-06"> </time></div></body></html>"#;
        assert_eq!(extractor().extract(html).date, "2025-11-06");
    }

    #[test]
    fn date_patterns_are_tried_in_priority_order() {
        let html = r#"<html><body><p>Updated 11/07/2025, first posted November 6, 2025.</p></body></html>"#;
        assert_eq!(extractor().extract(html).date, "November 6, 2025");

        let html = r#"<html><body><p>Filed 11/07/2025 (2025-11-07)</p></body></html>"#;
        assert_eq!(extractor().extract(html).date, "11/07/2025");
    }

    #[test]
    fn content_container_is_used_without_article() {
        let html = format!(
            r#"<html><body>
                 <div class="sidebar"><p>Unrelated sidebar text that is long enough to count as a paragraph.</p></div>
                 <div class="entry-content"><p>{LONG_A}</p><p>{LONG_B}</p><p>{LONG_C}</p></div>
               </body></html>"#
        );
        let content = extractor().extract(&html);
        assert_eq!(content.body, format!("{LONG_A}\n\n{LONG_B}\n\n{LONG_C}"));
    }

    #[test]
    fn short_article_falls_back_to_document_paragraphs() {
        let html = format!(
            r#"<html><body>
                 <article><p>{LONG_A}</p></article>
                 <div><p>{LONG_B}</p></div>
                 <nav><p>{LONG_C}</p></nav>
                 <p>Please accept every cookie so that we can keep serving you this page forever.</p>
               </body></html>"#
        );
        let content = extractor().extract(&html);
        assert_eq!(content.body, format!("{LONG_A}\n\n{LONG_B}"));
    }

    #[test]
    fn article_without_paragraphs_uses_its_text() {
        let html = format!("<html><body><article><div>{LONG_A}</div></article></body></html>");
        assert_eq!(extractor().extract(&html).body, LONG_A);
    }

    #[test]
    fn boilerplate_lists_are_configurable() {
        let rules = ExtractionRules {
            boilerplate_keywords: vec!["predecessor".to_string()],
            ..ExtractionRules::default()
        };
        let extractor = ContentExtractor::new(&rules).unwrap();
        let html = format!("<html><body><article><p>{LONG_A}</p><p>{LONG_B}</p></article></body></html>");
        assert_eq!(extractor.extract(&html).body, LONG_B);
    }

    #[test]
    fn invalid_rules_are_rejected() {
        let rules = ExtractionRules {
            content_selectors: vec!["div[".to_string()],
            ..ExtractionRules::default()
        };
        assert!(matches!(ContentExtractor::new(&rules), Err(AppError::Config(_))));

        let rules = ExtractionRules {
            date_patterns: vec!["(".to_string()],
            ..ExtractionRules::default()
        };
        assert!(ContentExtractor::new(&rules).is_err());
    }
}

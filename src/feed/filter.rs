use regex::Regex;

use crate::error::{AppError, Result};

/// Matches URLs against a substring or, when the pattern contains `*` or `?`,
/// a glob anchored to the whole URL.
#[derive(Debug, Clone)]
pub struct LinkFilter {
    matcher: Matcher,
    case_sensitive: bool,
}

#[derive(Debug, Clone)]
enum Matcher {
    Substring(String),
    Glob(Regex),
}

impl LinkFilter {
    pub fn new(pattern: &str, case_sensitive: bool) -> Result<Self> {
        let pattern = if case_sensitive {
            pattern.to_string()
        } else {
            pattern.to_lowercase()
        };

        let matcher = if is_glob(&pattern) {
            let regex = Regex::new(&glob_to_regex(&pattern))
                .map_err(|e| AppError::Config(format!("invalid link pattern '{}': {}", pattern, e)))?;
            Matcher::Glob(regex)
        } else {
            Matcher::Substring(pattern)
        };

        Ok(Self {
            matcher,
            case_sensitive,
        })
    }

    pub fn matches(&self, link: &str) -> bool {
        let link = if self.case_sensitive {
            link.to_string()
        } else {
            link.to_lowercase()
        };

        match &self.matcher {
            Matcher::Substring(needle) => link.contains(needle.as_str()),
            Matcher::Glob(regex) => regex.is_match(&link),
        }
    }

    /// Keeps the matching links, in input order.
    pub fn filter<S: AsRef<str>>(&self, links: &[S]) -> Vec<String> {
        links
            .iter()
            .filter(|link| self.matches(link.as_ref()))
            .map(|link| {
                let link: &str = link.as_ref();
                link.to_string()
            })
            .collect()
    }
}

/// Convenience wrapper for one-off filtering.
pub fn filter_links<S: AsRef<str>>(
    links: &[S],
    pattern: &str,
    case_sensitive: bool,
) -> Result<Vec<String>> {
    Ok(LinkFilter::new(pattern, case_sensitive)?.filter(links))
}

fn is_glob(pattern: &str) -> bool {
    pattern.contains('*') || pattern.contains('?')
}

fn glob_to_regex(pattern: &str) -> String {
    let mut regex = String::from("(?s)^");
    for c in pattern.chars() {
        match c {
            '*' => regex.push_str(".*"),
            '?' => regex.push('.'),
            other => regex.push_str(&regex::escape(other.encode_utf8(&mut [0; 4]))),
        }
    }
    regex.push('$');
    regex
}

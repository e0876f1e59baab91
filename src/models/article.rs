use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};

/// Whether an article has been relayed to the notification channel.
///
/// The only transition is `Unpublished -> Published`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PublicationState {
    #[default]
    Unpublished,
    Published,
}

impl PublicationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PublicationState::Unpublished => "Unpublished",
            PublicationState::Published => "Published",
        }
    }
}

impl fmt::Display for PublicationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PublicationState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Unpublished" => Ok(PublicationState::Unpublished),
            "Published" => Ok(PublicationState::Published),
            other => Err(format!("unknown publication state: {other}")),
        }
    }
}

impl ToSql for PublicationState {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for PublicationState {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e: String| FromSqlError::Other(e.into()))
    }
}

/// A stored article row.
#[derive(Debug, Clone)]
pub struct Article {
    pub id: i64,
    pub url: String,
    pub article_date: String,
    pub headline: String,
    pub body: String,
    pub fetched_at: DateTime<Utc>,
    /// `None` for legacy rows that predate the state column and were never migrated.
    pub state: Option<PublicationState>,
}

#[derive(Debug, Clone)]
pub struct NewArticle {
    pub url: String,
    pub article_date: String,
    pub headline: String,
    pub body: String,
}

/// Fields isolated from an article page. Empty strings when nothing was found.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedContent {
    pub date: String,
    pub headline: String,
    pub body: String,
}

impl ExtractedContent {
    /// Nothing worth storing: neither a headline nor a body.
    pub fn is_empty(&self) -> bool {
        self.headline.is_empty() && self.body.is_empty()
    }

    pub fn into_new_article(self, url: &str) -> NewArticle {
        NewArticle {
            url: url.to_string(),
            article_date: self.date,
            headline: self.headline,
            body: self.body,
        }
    }
}

use chrono::{DateTime, Duration, Local, NaiveDateTime, TimeZone, Utc};
use rusqlite::{params, OptionalExtension, Row};
use tokio_rusqlite::Connection;

use crate::error::{AppError, Result};
use crate::models::{Article, NewArticle, PublicationState};

use super::schema::{
    ADD_STATE_COLUMN, LEGACY_COLUMNS, LEGACY_PUBLISHED_AFTER_HOURS, SCHEMA, STATE_INDEX,
};

/// Outcome of an age-based backfill of publication states.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MigrationReport {
    pub published: usize,
    pub unpublished: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StateCounts {
    pub published: i64,
    pub unpublished: i64,
}

#[derive(Debug)]
pub struct Repository {
    conn: Connection,
}

impl Repository {
    /// Opens (or creates) the store.
    ///
    /// Stores written with the older column names are renamed in place. A store
    /// without a state column gets one, and its rows are backfilled by age in
    /// the same transaction as the schema change.
    pub async fn new(db_path: &str) -> Result<Self> {
        let conn = Connection::open(db_path).await?;
        let threshold = Utc::now() - Duration::hours(LEGACY_PUBLISHED_AFTER_HOURS);

        let backfill = conn
            .call(move |conn| {
                let tx = conn.transaction()?;

                let columns = table_columns(&tx)?;
                for (legacy, current) in LEGACY_COLUMNS {
                    if columns.iter().any(|c| c == legacy) {
                        tx.execute(
                            &format!(r#"ALTER TABLE articles RENAME COLUMN "{}" TO {}"#, legacy, current),
                            [],
                        )?;
                    }
                }

                tx.execute_batch(SCHEMA)?;

                let has_state_column = table_columns(&tx)?
                    .iter()
                    .any(|c| c == "publication_state");
                let backfill = if has_state_column {
                    None
                } else {
                    tx.execute(ADD_STATE_COLUMN, [])?;
                    Some(backfill_states(&tx, threshold)?)
                };

                tx.execute_batch(STATE_INDEX)?;
                tx.commit()?;
                Ok(backfill)
            })
            .await?;

        if let Some(report) = backfill {
            tracing::info!(
                published = report.published,
                unpublished = report.unpublished,
                "Added publication state column and migrated legacy articles"
            );
        }

        Ok(Self { conn })
    }

    pub async fn exists(&self, url: &str) -> Result<bool> {
        let url = url.to_string();
        let exists = self
            .conn
            .call(move |conn| {
                let exists: bool = conn.query_row(
                    "SELECT EXISTS(SELECT 1 FROM articles WHERE url = ?1)",
                    params![url],
                    |row| row.get(0),
                )?;
                Ok(exists)
            })
            .await?;
        Ok(exists)
    }

    /// True only for a stored article whose state is `Unpublished` or unset.
    pub async fn is_unpublished(&self, url: &str) -> Result<bool> {
        let url = url.to_string();
        let state = self
            .conn
            .call(move |conn| {
                let state = conn
                    .query_row(
                        "SELECT publication_state FROM articles WHERE url = ?1",
                        params![url],
                        |row| row.get::<_, Option<String>>(0),
                    )
                    .optional()?;
                Ok(state)
            })
            .await?;

        Ok(match state {
            None => false,
            Some(None) => true,
            Some(Some(s)) => s == PublicationState::Unpublished.as_str(),
        })
    }

    pub async fn get_article(&self, url: &str) -> Result<Option<Article>> {
        let url = url.to_string();
        let article = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    r#"SELECT id, url, article_date, headline, body, fetched_at, publication_state
                       FROM articles WHERE url = ?1"#,
                )?;
                let article = stmt.query_row(params![url], article_from_row).optional()?;
                Ok(article)
            })
            .await?;
        Ok(article)
    }

    /// Inserts a new `Unpublished` article stamped with the current time.
    ///
    /// Fails with [`AppError::DuplicateArticle`] if the URL is already stored.
    pub async fn insert_article(&self, article: NewArticle) -> Result<i64> {
        let url = article.url.clone();
        let fetched_at = Utc::now().to_rfc3339();

        let result = self
            .conn
            .call(move |conn| {
                conn.execute(
                    r#"INSERT INTO articles (article_date, headline, body, fetched_at, url, publication_state)
                       VALUES (?1, ?2, ?3, ?4, ?5, ?6)"#,
                    params![
                        article.article_date,
                        article.headline,
                        article.body,
                        fetched_at,
                        article.url,
                        PublicationState::Unpublished,
                    ],
                )?;
                Ok(conn.last_insert_rowid())
            })
            .await;

        match result {
            Ok(id) => Ok(id),
            Err(tokio_rusqlite::Error::Rusqlite(rusqlite::Error::SqliteFailure(err, _)))
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(AppError::DuplicateArticle(url))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Moves an article to `Published`. Absent URLs and repeated calls are no-ops.
    pub async fn mark_published(&self, url: &str) -> Result<()> {
        let url = url.to_string();
        self.conn
            .call(move |conn| {
                conn.execute(
                    "UPDATE articles SET publication_state = ?1 WHERE url = ?2",
                    params![PublicationState::Published, url],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    /// Assigns a state to every row not already `Published`: rows fetched more
    /// than a day ago become `Published`, newer rows and rows without a usable
    /// timestamp become `Unpublished`.
    pub async fn migrate_legacy_records(&self) -> Result<MigrationReport> {
        let threshold = Utc::now() - Duration::hours(LEGACY_PUBLISHED_AFTER_HOURS);

        let report = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                let report = backfill_states(&tx, threshold)?;
                tx.commit()?;
                Ok(report)
            })
            .await?;

        Ok(report)
    }

    pub async fn count_by_state(&self) -> Result<StateCounts> {
        let counts = self
            .conn
            .call(|conn| {
                let counts = conn.query_row(
                    r#"SELECT
                           COALESCE(SUM(CASE WHEN publication_state = 'Published' THEN 1 ELSE 0 END), 0),
                           COALESCE(SUM(CASE WHEN publication_state IS NULL OR publication_state = 'Unpublished' THEN 1 ELSE 0 END), 0)
                       FROM articles"#,
                    [],
                    |row| {
                        Ok(StateCounts {
                            published: row.get(0)?,
                            unpublished: row.get(1)?,
                        })
                    },
                )?;
                Ok(counts)
            })
            .await?;
        Ok(counts)
    }
}

fn table_columns(conn: &rusqlite::Connection) -> rusqlite::Result<Vec<String>> {
    let mut stmt = conn.prepare("PRAGMA table_info(articles)")?;
    let columns = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(columns)
}

fn backfill_states(
    conn: &rusqlite::Connection,
    threshold: DateTime<Utc>,
) -> rusqlite::Result<MigrationReport> {
    let rows = {
        let mut select = conn.prepare(
            r#"SELECT id, fetched_at FROM articles
               WHERE publication_state IS NULL OR publication_state != ?1"#,
        )?;
        let rows = select
            .query_map(params![PublicationState::Published], |row| {
                Ok((row.get::<_, i64>(0)?, row.get::<_, Option<String>>(1)?))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows
    };

    let mut report = MigrationReport::default();
    let mut update = conn.prepare("UPDATE articles SET publication_state = ?1 WHERE id = ?2")?;
    for (id, fetched_at) in rows {
        let is_old = fetched_at
            .as_deref()
            .and_then(parse_datetime)
            .is_some_and(|dt| dt < threshold);
        let state = if is_old {
            report.published += 1;
            PublicationState::Published
        } else {
            report.unpublished += 1;
            PublicationState::Unpublished
        };
        update.execute(params![state, id])?;
    }
    Ok(report)
}

fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    // RFC3339, as written by insert_article (e.g., "2026-01-11T12:34:56+00:00")
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    // Naive ISO-8601 in local time (e.g., "2025-11-06T12:22:33.123456")
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
        return Local
            .from_local_datetime(&naive)
            .earliest()
            .map(|dt| dt.with_timezone(&Utc));
    }
    // SQLite datetime format (e.g., "2026-01-11 12:34:56")
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(naive.and_utc());
    }
    None
}

fn article_from_row(row: &Row) -> rusqlite::Result<Article> {
    Ok(Article {
        id: row.get(0)?,
        url: row.get(1)?,
        article_date: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
        headline: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
        body: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
        fetched_at: row
            .get::<_, Option<String>>(5)?
            .and_then(|s| parse_datetime(&s))
            .unwrap_or_else(Utc::now),
        state: row
            .get::<_, Option<String>>(6)?
            .and_then(|s| s.parse().ok()),
    })
}

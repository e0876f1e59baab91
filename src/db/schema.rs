pub const SCHEMA: &str = r#"
-- articles table
CREATE TABLE IF NOT EXISTS articles (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    article_date TEXT,
    headline TEXT,
    body TEXT,
    fetched_at TEXT,
    url TEXT UNIQUE,
    publication_state TEXT DEFAULT 'Unpublished'
);

CREATE INDEX IF NOT EXISTS idx_articles_url ON articles(url);
"#;

/// Column names used by stores written by the earlier scripts, and their
/// current equivalents. `ID` needs no rename since SQLite resolves column
/// names case-insensitively.
pub const LEGACY_COLUMNS: &[(&str, &str)] = &[
    ("Article Date", "article_date"),
    ("Article Header", "headline"),
    ("Article Body", "body"),
    ("Fetched at", "fetched_at"),
    ("Article URL", "url"),
    ("Published at", "publication_state"),
];

/// Added to stores created before `publication_state` existed.
pub const ADD_STATE_COLUMN: &str =
    "ALTER TABLE articles ADD COLUMN publication_state TEXT DEFAULT 'Unpublished'";

pub const STATE_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_articles_publication_state ON articles(publication_state);";

/// Records fetched longer ago than this are assumed to have been relayed already.
pub const LEGACY_PUBLISHED_AFTER_HOURS: i64 = 24;

//! Database schema and migrations for newsrelay.
//!
//! Migrations are applied in order when the database is opened. The
//! `schema_version` table tracks which ones have run.

/// Database migrations.
#[cfg(feature = "sqlite")]
pub const MIGRATIONS: &[&str] = &[
    // v1: news items
    r#"
CREATE TABLE news (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    text        TEXT NOT NULL,
    link        TEXT NOT NULL UNIQUE,
    date        INTEGER NOT NULL DEFAULT 0,   -- discovered at, UNIX seconds
    publish     INTEGER NOT NULL DEFAULT 0,   -- earliest publication, UNIX seconds
    chat_id     INTEGER NOT NULL DEFAULT 0,
    message_id  INTEGER NOT NULL DEFAULT 0    -- 0 until posted
);

CREATE INDEX idx_news_due ON news(message_id, publish);
"#,
    // v2: run lease for overlapping invocations
    r#"
CREATE TABLE run_locks (
    name        TEXT PRIMARY KEY,
    holder      TEXT NOT NULL,
    acquired_at INTEGER NOT NULL
);
"#,
];

/// Database migrations.
#[cfg(all(feature = "postgres", not(feature = "sqlite")))]
pub const MIGRATIONS: &[&str] = &[
    // v1: news items
    r#"
CREATE TABLE news (
    id          BIGSERIAL PRIMARY KEY,
    text        TEXT NOT NULL,
    link        TEXT NOT NULL UNIQUE,
    date        BIGINT NOT NULL DEFAULT 0,
    publish     BIGINT NOT NULL DEFAULT 0,
    chat_id     BIGINT NOT NULL DEFAULT 0,
    message_id  BIGINT NOT NULL DEFAULT 0
);

CREATE INDEX idx_news_due ON news(message_id, publish);
"#,
    // v2: run lease for overlapping invocations
    r#"
CREATE TABLE run_locks (
    name        TEXT PRIMARY KEY,
    holder      TEXT NOT NULL,
    acquired_at BIGINT NOT NULL
);
"#,
];

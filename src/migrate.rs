//! Database schema and version handling.
//!
//! Applies the embedded schema and enforces the stored `schema_version`.
//! Designed to be run on every [`crate::store::Store::open`].
//!
//! # Schema
//!
//! ```text
//! ┌──────────────┐     ┌──────────────┐     ┌──────────────┐
//! │    posts     │──┐  │   scores     │  ┌──│ post_also_in │
//! │              │  │  │              │  │  │              │
//! │ id (PK)      │  ├──│ post_id (PK) │  │  │ post_id      │
//! │ source       │  │  │ score        │  │  │ source       │
//! │ channel      │  │  │ labels       │  │  │ channel      │
//! │ external_id  │  │  │ tier         │  │  └──────────────┘
//! │ text         │  │  │ scored_at    │  │
//! │ snippet      │  │  │ explanation  │  │  ┌──────────────┐
//! │ text_hash    │  │  └──────────────┘  │  │   metadata   │
//! │ url          │  │                    │  │              │
//! │ posted_at    │  └────────────────────┘  │ key (PK)     │
//! │ fetched_at   │                          │ value        │
//! └──────────────┘                          └──────────────┘
//! ```
//!
//! # Tables
//!
//! | Table | Purpose |
//! |-------|---------|
//! | `posts` | One row per ingested post, unique on `(source, channel, external_id)` |
//! | `scores` | 1:1 scoring results; deleted explicitly (no cascade from posts) |
//! | `post_also_in` | Cross-source attributions written by dedup; cascades on post delete |
//! | `metadata` | Key/value pairs, at least `schema_version` |
//!
//! # Versioning
//!
//! The schema itself is idempotent (`CREATE TABLE IF NOT EXISTS`). The
//! stored `schema_version` is compared against [`SCHEMA_VERSION`]: a newer
//! stored version is an incompatible database and fails the open; an older
//! one is bumped forward (no destructive migrations in this version).

use anyhow::{bail, Result};
use sqlx::SqlitePool;

/// Compiled-in schema version, stored in `metadata.schema_version`.
pub const SCHEMA_VERSION: i64 = 2;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS posts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    source TEXT NOT NULL,
    channel TEXT NOT NULL,
    external_id TEXT NOT NULL,
    text TEXT,
    snippet TEXT NOT NULL,
    text_hash TEXT NOT NULL,
    url TEXT,
    posted_at INTEGER NOT NULL,
    fetched_at INTEGER NOT NULL,
    UNIQUE(source, channel, external_id)
);

CREATE INDEX IF NOT EXISTS idx_posts_posted_at ON posts(posted_at DESC);
CREATE INDEX IF NOT EXISTS idx_posts_text_hash ON posts(text_hash);

CREATE TABLE IF NOT EXISTS scores (
    post_id INTEGER PRIMARY KEY,
    score INTEGER NOT NULL,
    labels TEXT NOT NULL DEFAULT '[]',
    tier TEXT NOT NULL,
    scored_at INTEGER NOT NULL,
    explanation TEXT,
    FOREIGN KEY (post_id) REFERENCES posts(id)
);

CREATE TABLE IF NOT EXISTS post_also_in (
    post_id INTEGER NOT NULL,
    source TEXT NOT NULL,
    channel TEXT NOT NULL,
    UNIQUE(post_id, source, channel),
    FOREIGN KEY (post_id) REFERENCES posts(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS metadata (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;

/// Apply the embedded schema and reconcile the stored schema version.
///
/// Safe to call on every open. Fails when the database was written by a
/// newer build (stored version above [`SCHEMA_VERSION`]).
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    let mut tx = pool.begin().await?;

    for statement in SCHEMA.split(';') {
        let statement = statement.trim();
        if statement.is_empty() {
            continue;
        }
        sqlx::query(statement).execute(&mut *tx).await?;
    }

    let stored: Option<String> =
        sqlx::query_scalar("SELECT value FROM metadata WHERE key = 'schema_version'")
            .fetch_optional(&mut *tx)
            .await?;

    match stored {
        None => {
            sqlx::query("INSERT INTO metadata (key, value) VALUES ('schema_version', ?)")
                .bind(SCHEMA_VERSION.to_string())
                .execute(&mut *tx)
                .await?;
        }
        Some(raw) => {
            let version: i64 = raw
                .parse()
                .map_err(|_| anyhow::anyhow!("invalid schema_version in metadata: {raw:?}"))?;
            if version > SCHEMA_VERSION {
                bail!(
                    "database schema version {} is newer than supported {}",
                    version,
                    SCHEMA_VERSION
                );
            }
            if version < SCHEMA_VERSION {
                sqlx::query("UPDATE metadata SET value = ? WHERE key = 'schema_version'")
                    .bind(SCHEMA_VERSION.to_string())
                    .execute(&mut *tx)
                    .await?;
            }
        }
    }

    tx.commit().await?;
    Ok(())
}

//! SQLite-backed persistent store for posts, scores, and attributions.
//!
//! The store owns all persistent entities exclusively; other components
//! hold only snapshot copies. Every multi-row mutation (dedup, prune) runs
//! inside a single transaction and rolls back on any error.
//!
//! # Deduplication
//!
//! [`Store::deduplicate`] collapses posts sharing a `text_hash` into the
//! oldest row (earliest `posted_at`, id-tiebroken). Each removed duplicate
//! leaves a `post_also_in` attribution on the keeper so the digest can show
//! where else the same content appeared. Earliest-wins is deliberate:
//! later copies may have been redacted, so "richest text" is not a safe
//! criterion.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Duration, Utc};
use sha2::{Digest, Sha256};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use std::collections::HashMap;
use std::path::Path;

use crate::db;
use crate::migrate;
use crate::models::{
    first_n_chars, ChannelStats, Contribution, PostFilter, PostInput, PostWithScore, Score,
    StoredPost, Tier,
};

/// Number of Unicode code points kept in a derived snippet.
pub const SNIPPET_CHARS: usize = 200;

/// Handle over the single-file SQLite database.
#[derive(Debug)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    /// Open (creating if missing) the database at `path` and apply the
    /// embedded schema.
    ///
    /// Fails when the stored schema version is newer than this build
    /// supports.
    pub async fn open(path: &Path) -> Result<Store> {
        let pool = db::connect(path).await?;
        migrate::run_migrations(&pool)
            .await
            .context("apply schema")?;
        Ok(Store { pool })
    }

    pub async fn close(self) {
        self.pool.close().await;
    }

    /// Upsert a post by its natural key `(source, channel, external_id)`.
    ///
    /// Re-inserting the same key replaces all mutable fields. An empty
    /// snippet is derived from the first 200 code points of `text`;
    /// `text_hash` is the SHA-256 of the text (or of the snippet when the
    /// text is empty). Returns the post as stored.
    pub async fn insert_post(&self, input: PostInput) -> Result<StoredPost> {
        if input.source.trim().is_empty() {
            bail!("source is required");
        }
        if input.channel.trim().is_empty() {
            bail!("channel is required");
        }
        if input.external_id.trim().is_empty() {
            bail!("external_id is required");
        }
        if input.posted_at.timestamp() == 0 {
            bail!("posted_at is required");
        }
        if input.fetched_at.timestamp() == 0 {
            bail!("fetched_at is required");
        }

        let mut snippet = input.snippet.trim().to_string();
        if snippet.is_empty() {
            if input.text.is_empty() {
                bail!("snippet is required when text is empty");
            }
            snippet = first_n_chars(&input.text, SNIPPET_CHARS);
        }

        let hash = text_hash(&input.text, &snippet);
        let text: Option<&str> = if input.text.is_empty() {
            None
        } else {
            Some(&input.text)
        };
        let url = input
            .url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty());

        sqlx::query(
            r#"
            INSERT INTO posts (source, channel, external_id, text, snippet, text_hash, url, posted_at, fetched_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(source, channel, external_id) DO UPDATE SET
                text = excluded.text,
                snippet = excluded.snippet,
                text_hash = excluded.text_hash,
                url = excluded.url,
                posted_at = excluded.posted_at,
                fetched_at = excluded.fetched_at
            "#,
        )
        .bind(&input.source)
        .bind(&input.channel)
        .bind(&input.external_id)
        .bind(text)
        .bind(&snippet)
        .bind(&hash)
        .bind(url)
        .bind(input.posted_at.timestamp())
        .bind(input.fetched_at.timestamp())
        .execute(&self.pool)
        .await
        .context("insert post")?;

        let row = sqlx::query(
            r#"
            SELECT id, source, channel, external_id, text, snippet, text_hash, url, posted_at, fetched_at
            FROM posts
            WHERE source = ? AND channel = ? AND external_id = ?
            "#,
        )
        .bind(&input.source)
        .bind(&input.channel)
        .bind(&input.external_id)
        .fetch_one(&self.pool)
        .await?;

        row_to_post(&row)
    }

    /// Posts that have no score row yet, oldest first.
    pub async fn get_unscored(&self) -> Result<Vec<StoredPost>> {
        let rows = sqlx::query(
            r#"
            SELECT p.id, p.source, p.channel, p.external_id, p.text, p.snippet, p.text_hash,
                   p.url, p.posted_at, p.fetched_at
            FROM posts p
            LEFT JOIN scores s ON s.post_id = p.id
            WHERE s.post_id IS NULL
            ORDER BY p.posted_at ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_post).collect()
    }

    /// Fetch one post with its score, by row id.
    pub async fn get_post(&self, post_id: i64) -> Result<Option<PostWithScore>> {
        let row = sqlx::query(&format!("{POST_WITH_SCORE_SELECT} WHERE p.id = ?"))
            .bind(post_id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_post_with_score).transpose()
    }

    /// Upsert a score by `post_id`. Labels and explanation are stored as
    /// JSON text.
    pub async fn save_score(&self, score: &Score) -> Result<()> {
        if score.post_id == 0 {
            bail!("post_id is required");
        }
        if score.scored_at.timestamp() == 0 {
            bail!("scored_at is required");
        }

        let labels = serde_json::to_string(&score.labels)?;
        let explanation = if score.explanation.is_empty() {
            None
        } else {
            Some(serde_json::to_string(&score.explanation)?)
        };

        sqlx::query(
            r#"
            INSERT INTO scores (post_id, score, labels, tier, scored_at, explanation)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(post_id) DO UPDATE SET
                score = excluded.score,
                labels = excluded.labels,
                tier = excluded.tier,
                scored_at = excluded.scored_at,
                explanation = excluded.explanation
            "#,
        )
        .bind(score.post_id)
        .bind(score.score)
        .bind(&labels)
        .bind(score.tier.as_str())
        .bind(score.scored_at.timestamp())
        .bind(explanation)
        .execute(&self.pool)
        .await
        .context("save score")?;

        Ok(())
    }

    /// Posts with `posted_at >= since`, newest first.
    ///
    /// With a tier filter only scored posts of that tier are returned
    /// (inner join); without one, unscored posts are included too.
    pub async fn get_posts(
        &self,
        since: DateTime<Utc>,
        tier: Option<Tier>,
        filter: &PostFilter,
    ) -> Result<Vec<PostWithScore>> {
        let join = if tier.is_some() { "JOIN" } else { "LEFT JOIN" };
        let mut query = format!(
            r#"
            SELECT p.id, p.source, p.channel, p.external_id, p.text, p.snippet, p.text_hash,
                   p.url, p.posted_at, p.fetched_at,
                   s.score, s.labels, s.tier, s.scored_at, s.explanation
            FROM posts p
            {join} scores s ON s.post_id = p.id
            WHERE p.posted_at >= ?
            "#
        );
        if tier.is_some() {
            query.push_str(" AND s.tier = ?");
        }
        if filter.source.is_some() {
            query.push_str(" AND p.source = ?");
        }
        if filter.channel.is_some() {
            query.push_str(" AND p.channel = ?");
        }
        query.push_str(" ORDER BY p.posted_at DESC");

        let mut q = sqlx::query(&query).bind(since.timestamp());
        if let Some(tier) = tier {
            q = q.bind(tier.as_str());
        }
        if let Some(source) = &filter.source {
            q = q.bind(source);
        }
        if let Some(channel) = &filter.channel {
            q = q.bind(channel);
        }

        let rows = q.fetch_all(&self.pool).await.context("get posts")?;
        rows.iter().map(row_to_post_with_score).collect()
    }

    /// Collapse posts sharing a `text_hash` into the oldest row.
    ///
    /// Runs in a single transaction. Rows are visited ordered by
    /// `(text_hash, posted_at, id)`; the first row of each hash group is the
    /// keeper, every later row is removed after recording a
    /// `(keeper, source, channel)` attribution. Idempotent: a second pass
    /// over unchanged data removes nothing.
    ///
    /// Returns the number of duplicates removed.
    pub async fn deduplicate(&self) -> Result<u64> {
        let mut tx = self.pool.begin().await?;

        let rows = sqlx::query(
            r#"
            SELECT id, source, channel, text_hash
            FROM posts
            ORDER BY text_hash, posted_at ASC, id ASC
            "#,
        )
        .fetch_all(&mut *tx)
        .await
        .context("query duplicates")?;

        struct DupEntry {
            dup_id: i64,
            keeper_id: i64,
            source: String,
            channel: String,
        }

        let mut last_hash = String::new();
        let mut keeper_id = 0i64;
        let mut to_delete: Vec<DupEntry> = Vec::new();

        for row in &rows {
            let id: i64 = row.get("id");
            let hash: String = row.get("text_hash");
            if hash == last_hash {
                to_delete.push(DupEntry {
                    dup_id: id,
                    keeper_id,
                    source: row.get("source"),
                    channel: row.get("channel"),
                });
                continue;
            }
            last_hash = hash;
            keeper_id = id;
        }

        let mut deleted = 0u64;
        for dup in &to_delete {
            sqlx::query(
                "INSERT OR IGNORE INTO post_also_in (post_id, source, channel) VALUES (?, ?, ?)",
            )
            .bind(dup.keeper_id)
            .bind(&dup.source)
            .bind(&dup.channel)
            .execute(&mut *tx)
            .await?;

            sqlx::query("DELETE FROM scores WHERE post_id = ?")
                .bind(dup.dup_id)
                .execute(&mut *tx)
                .await?;
            sqlx::query("DELETE FROM posts WHERE id = ?")
                .bind(dup.dup_id)
                .execute(&mut *tx)
                .await?;
            deleted += 1;
        }

        tx.commit().await.context("commit deduplicate")?;
        Ok(deleted)
    }

    /// Delete posts older than `retain_days`, with their scores.
    ///
    /// `post_also_in` rows cascade; score deletion is explicit since the
    /// schema does not cascade from posts to scores. A non-positive
    /// `retain_days` is a no-op. Returns the number of posts removed.
    pub async fn prune_old(&self, retain_days: i64) -> Result<u64> {
        if retain_days <= 0 {
            return Ok(0);
        }

        let cutoff = (Utc::now() - Duration::days(retain_days)).timestamp();

        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM scores WHERE post_id IN (SELECT id FROM posts WHERE posted_at < ?)")
            .bind(cutoff)
            .execute(&mut *tx)
            .await
            .context("prune old scores")?;

        let result = sqlx::query("DELETE FROM posts WHERE posted_at < ?")
            .bind(cutoff)
            .execute(&mut *tx)
            .await
            .context("prune old posts")?;

        tx.commit().await.context("commit prune")?;
        Ok(result.rows_affected())
    }

    /// "Also seen in" attributions for the given post ids, as
    /// `post_id → ["source/channel", …]`.
    pub async fn get_also_in(&self, post_ids: &[i64]) -> Result<HashMap<i64, Vec<String>>> {
        if post_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let placeholders = vec!["?"; post_ids.len()].join(",");
        let query = format!(
            "SELECT post_id, source, channel FROM post_also_in WHERE post_id IN ({placeholders}) ORDER BY post_id, source, channel"
        );

        let mut q = sqlx::query(&query);
        for id in post_ids {
            q = q.bind(id);
        }

        let rows = q.fetch_all(&self.pool).await.context("query also_in")?;

        let mut result: HashMap<i64, Vec<String>> = HashMap::new();
        for row in &rows {
            let post_id: i64 = row.get("post_id");
            let source: String = row.get("source");
            let channel: String = row.get("channel");
            result
                .entry(post_id)
                .or_default()
                .push(format!("{source}/{channel}"));
        }

        Ok(result)
    }

    /// Per-channel tier totals for posts since the cutoff, with earliest
    /// and latest `posted_at`. Posts without a score count as ignored.
    pub async fn get_channel_stats(&self, since: DateTime<Utc>) -> Result<Vec<ChannelStats>> {
        let rows = sqlx::query(
            r#"
            SELECT p.source, p.channel,
                COUNT(*) AS total,
                SUM(CASE WHEN s.tier = 'read_now' THEN 1 ELSE 0 END) AS read_now,
                SUM(CASE WHEN s.tier = 'skim' THEN 1 ELSE 0 END) AS skim,
                SUM(CASE WHEN s.tier = 'ignore' OR s.tier IS NULL THEN 1 ELSE 0 END) AS ignored,
                MIN(p.posted_at) AS first_seen,
                MAX(p.posted_at) AS last_seen
            FROM posts p
            LEFT JOIN scores s ON s.post_id = p.id
            WHERE p.posted_at >= ?
            GROUP BY p.source, p.channel
            ORDER BY p.source, p.channel
            "#,
        )
        .bind(since.timestamp())
        .fetch_all(&self.pool)
        .await
        .context("get channel stats")?;

        rows.iter()
            .map(|row| {
                Ok(ChannelStats {
                    source: row.get("source"),
                    channel: row.get("channel"),
                    total: row.get("total"),
                    read_now: row.get("read_now"),
                    skim: row.get("skim"),
                    ignored: row.get("ignored"),
                    first_seen: parse_ts(row.get("first_seen"))?,
                    last_seen: parse_ts(row.get("last_seen"))?,
                })
            })
            .collect()
    }

    /// Delete every score row (the rescore workflow). Returns the count.
    pub async fn delete_all_scores(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM scores")
            .execute(&self.pool)
            .await
            .context("delete scores")?;
        Ok(result.rows_affected())
    }
}

const POST_WITH_SCORE_SELECT: &str = r#"
    SELECT p.id, p.source, p.channel, p.external_id, p.text, p.snippet, p.text_hash,
           p.url, p.posted_at, p.fetched_at,
           s.score, s.labels, s.tier, s.scored_at, s.explanation
    FROM posts p
    LEFT JOIN scores s ON s.post_id = p.id
"#;

/// SHA-256 over the effective text: the full text when present, the snippet
/// otherwise.
pub fn text_hash(text: &str, snippet: &str) -> String {
    let effective = if text.is_empty() { snippet } else { text };
    let digest = Sha256::digest(effective.as_bytes());
    format!("{digest:x}")
}

fn parse_ts(ts: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp(ts, 0).ok_or_else(|| anyhow::anyhow!("timestamp out of range: {ts}"))
}

fn row_to_post(row: &SqliteRow) -> Result<StoredPost> {
    Ok(StoredPost {
        id: row.get("id"),
        source: row.get("source"),
        channel: row.get("channel"),
        external_id: row.get("external_id"),
        text: row.get("text"),
        snippet: row.get("snippet"),
        text_hash: row.get("text_hash"),
        url: row.get("url"),
        posted_at: parse_ts(row.get("posted_at"))?,
        fetched_at: parse_ts(row.get("fetched_at"))?,
    })
}

fn row_to_post_with_score(row: &SqliteRow) -> Result<PostWithScore> {
    let post = row_to_post(row)?;

    let score_val: Option<i64> = row.get("score");
    let score = match score_val {
        None => None,
        Some(points) => {
            let labels_raw: Option<String> = row.get("labels");
            let labels: Vec<String> = match labels_raw {
                Some(raw) if !raw.is_empty() => {
                    serde_json::from_str(&raw).context("decode labels")?
                }
                _ => Vec::new(),
            };

            let tier_raw: String = row.get("tier");
            let tier = Tier::parse(&tier_raw)
                .ok_or_else(|| anyhow::anyhow!("unknown tier in scores row: {tier_raw:?}"))?;

            let explanation_raw: Option<String> = row.get("explanation");
            let explanation: Vec<Contribution> = match explanation_raw {
                Some(raw) if !raw.is_empty() => {
                    serde_json::from_str(&raw).context("decode explanation")?
                }
                _ => Vec::new(),
            };

            Some(Score {
                post_id: post.id,
                score: points,
                labels,
                tier,
                scored_at: parse_ts(row.get("scored_at"))?,
                explanation,
            })
        }
    };

    Ok(PostWithScore { post, score })
}

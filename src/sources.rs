//! Source abstraction and registry.
//!
//! A [`Source`] fetches posts from one information stream. Concrete
//! variants:
//!
//! | Source | Module | Transport |
//! |--------|--------|-----------|
//! | `chat` | [`crate::source_chat`] | collector subprocess emitting JSONL |
//! | `rss` | [`crate::source_rss`] | HTTP, RSS/Atom feeds |
//! | `reddit` | [`crate::source_reddit`] | HTTP, public JSON listings |
//! | `hn` | [`crate::source_hn`] | HTTP, ranked top-stories API |
//! | `script` | [`crate::source_script`] | local helper script |
//!
//! Sources do not score, label, or set `fetched_at`; they only produce
//! [`Post`]s with a fully populated natural key and `posted_at`.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::config::Config;
use crate::models::Post;
use crate::source_chat::ChatSource;
use crate::source_hn::HnSource;
use crate::source_reddit::RedditSource;
use crate::source_rss::RssSource;
use crate::source_script::ScriptSource;

/// A stream of posts that can be polled for items newer than a cutoff.
#[async_trait]
pub trait Source: Send + Sync {
    /// Source identifier, used as the post's `source` field
    /// (e.g. `"rss"`).
    fn name(&self) -> &'static str;

    /// Fetch posts published at or after `since`.
    ///
    /// Soft failures (one feed or channel of many) are logged and produce
    /// a partial result with no error; a hard error is returned only when
    /// the source cannot produce anything meaningful.
    async fn fetch(&self, since: DateTime<Utc>) -> Result<Vec<Post>>;
}

/// Build every configured source, in configuration order.
pub fn build_sources(config: &Config) -> Result<Vec<Box<dyn Source>>> {
    let mut sources: Vec<Box<dyn Source>> = Vec::new();

    let s = &config.sources;

    if !s.subprocess.channels.is_empty() {
        sources.push(Box::new(ChatSource::new(&s.subprocess)?));
    }
    if !s.feeds.is_empty() {
        sources.push(Box::new(RssSource::new(s.feeds.clone())?));
    }
    if !s.forum_channels.is_empty() {
        sources.push(Box::new(RedditSource::new(s.forum_channels.clone())?));
    }
    if s.ranked.min_points > 0 {
        sources.push(Box::new(HnSource::new(s.ranked.min_points)?));
    }
    if !s.local_command.script.is_empty() {
        sources.push(Box::new(ScriptSource::new(&s.local_command.script)?));
    }

    Ok(sources)
}

//! Core data models used throughout sift.
//!
//! These types represent the posts, scores, and derived views that flow
//! through the ingestion and digest pipeline. The data lifecycle is:
//!
//! ```text
//! Source → Post → ingest() → StoredPost → score() → Score
//!                                  ↓
//!                            summarize() → Summary
//!                                  ↓
//!                              digest() → rendered output
//! ```
//!
//! # Type Relationships
//!
//! - A **[`Post`]** is produced by a source (chat subprocess, RSS feed,
//!   forum listing, ranked list, local script) before storage.
//! - A **[`StoredPost`]** is the persisted representation with a row id,
//!   snippet, content hash, and fetch timestamp.
//! - A **[`Score`]** is the 1:1 scoring result attached to a stored post,
//!   with an explanation whose point sum equals the score.
//! - A **[`PostWithScore`]** pairs a post with its (possibly absent) score
//!   when reading a digest window.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Attention tier assigned by the scorer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    ReadNow,
    Skim,
    Ignore,
}

impl Tier {
    /// Stable string form used in the database and JSON output.
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::ReadNow => "read_now",
            Tier::Skim => "skim",
            Tier::Ignore => "ignore",
        }
    }

    /// Parse the stable string form. Unknown values map to `None`.
    pub fn parse(s: &str) -> Option<Tier> {
        match s {
            "read_now" => Some(Tier::ReadNow),
            "skim" => Some(Tier::Skim),
            "ignore" => Some(Tier::Ignore),
            _ => None,
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw item produced by a source before storage.
///
/// Every post must carry a fully populated natural key
/// (`source`, `channel`, `external_id`) and `posted_at`; `fetched_at` is
/// assigned by the ingestion engine at insert time, not by the source.
#[derive(Debug, Clone)]
pub struct Post {
    /// Source identifier: `"chat"`, `"rss"`, `"reddit"`, `"hn"`, `"script"`.
    pub source: String,
    /// Channel, feed title, or board name within the source.
    pub channel: String,
    /// Source-assigned unique id within the channel.
    pub external_id: String,
    /// Full message text.
    pub text: String,
    /// Link to the original item, if any.
    pub url: Option<String>,
    /// Publication timestamp.
    pub posted_at: DateTime<Utc>,
}

/// Input to [`crate::store::Store::insert_post`].
///
/// `snippet` may be left empty, in which case it is derived from the first
/// 200 Unicode code points of `text`.
#[derive(Debug, Clone)]
pub struct PostInput {
    pub source: String,
    pub channel: String,
    pub external_id: String,
    pub text: String,
    pub snippet: String,
    pub url: Option<String>,
    pub posted_at: DateTime<Utc>,
    pub fetched_at: DateTime<Utc>,
}

/// A post as persisted in the `posts` table.
///
/// `text` is `None` when privacy mode suppressed full-text storage; the
/// snippet is always present. `text_hash` is the SHA-256 of the effective
/// text (full text if stored, snippet otherwise) and is the dedup key.
#[derive(Debug, Clone)]
pub struct StoredPost {
    pub id: i64,
    pub source: String,
    pub channel: String,
    pub external_id: String,
    pub text: Option<String>,
    pub snippet: String,
    pub text_hash: String,
    pub url: Option<String>,
    pub posted_at: DateTime<Utc>,
    pub fetched_at: DateTime<Utc>,
}

impl StoredPost {
    /// The text scoring and summarization operate on: the full text when
    /// stored, the snippet otherwise.
    pub fn effective_text(&self) -> &str {
        match &self.text {
            Some(t) if !t.is_empty() => t,
            _ => &self.snippet,
        }
    }
}

/// One scoring reason and its point value.
///
/// The sum of all contribution points in a score's explanation equals the
/// score itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contribution {
    /// `"keyword: <kw>"` or `"rule: <first keyword>"`.
    pub reason: String,
    pub points: i64,
}

/// Scoring result stored 1:1 with a post.
#[derive(Debug, Clone)]
pub struct Score {
    pub post_id: i64,
    pub score: i64,
    /// Sorted, deduplicated labels from matched rules.
    pub labels: Vec<String>,
    pub tier: Tier,
    pub scored_at: DateTime<Utc>,
    /// Contributions in evaluation order; point sum equals `score`.
    pub explanation: Vec<Contribution>,
}

/// A post paired with its score, if one has been computed.
#[derive(Debug, Clone)]
pub struct PostWithScore {
    pub post: StoredPost,
    pub score: Option<Score>,
}

/// Optional equality filters for [`crate::store::Store::get_posts`].
#[derive(Debug, Clone, Default)]
pub struct PostFilter {
    pub source: Option<String>,
    pub channel: Option<String>,
}

/// Per-channel scoring aggregates returned by
/// [`crate::store::Store::get_channel_stats`].
#[derive(Debug, Clone)]
pub struct ChannelStats {
    pub source: String,
    pub channel: String,
    pub total: i64,
    pub read_now: i64,
    pub skim: i64,
    /// Posts tiered `ignore` plus posts with no score yet.
    pub ignored: i64,
    /// Earliest `posted_at` in the window (data-maturity hint).
    pub first_seen: DateTime<Utc>,
    /// Latest `posted_at` in the window (staleness hint).
    pub last_seen: DateTime<Utc>,
}

/// Returns the first `n` Unicode code points of `s`.
pub fn first_n_chars(s: &str, n: usize) -> String {
    s.chars().take(n).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_round_trip() {
        for tier in [Tier::ReadNow, Tier::Skim, Tier::Ignore] {
            assert_eq!(Tier::parse(tier.as_str()), Some(tier));
        }
        assert_eq!(Tier::parse("urgent"), None);
    }

    #[test]
    fn first_n_chars_counts_code_points() {
        assert_eq!(first_n_chars("héllo", 3), "hél");
        assert_eq!(first_n_chars("ab", 10), "ab");
        assert_eq!(first_n_chars("", 5), "");
    }
}

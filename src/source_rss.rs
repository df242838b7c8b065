//! RSS/Atom feed source.
//!
//! Fetches a configured list of feed URLs and converts entries into posts.
//! The interesting part is the fetch schedule:
//!
//! - Feeds are grouped by origin (URL host). A bounded pool of at most
//!   [`MAX_WORKERS`] workers consumes whole origin groups, so different
//!   origins proceed in parallel while requests to the same origin stay
//!   strictly sequential with a [`ORIGIN_DELAY`] pause between them.
//! - Each feed fetch is retried up to [`MAX_RETRIES`] times with 1 s / 2 s
//!   backoff, but only for retryable failures: timeouts, connection or DNS
//!   errors, HTTP 429 and 5xx. Other 4xx responses and parse errors fail
//!   the feed immediately.
//! - A feed that permanently fails is logged to stderr and skipped; it
//!   never fails the batch.
//!
//! All sleeps go through an injectable [`Sleeper`] so tests can observe
//! backoff without real time passing.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::StatusCode;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinSet;

use crate::models::Post;
use crate::sources::Source;

pub const SOURCE_NAME: &str = "rss";

const FETCH_TIMEOUT: Duration = Duration::from_secs(30);
const USER_AGENT: &str = "Mozilla/5.0 (compatible; sift/0.1; +https://github.com/sift-tools/sift)";
const MAX_WORKERS: usize = 10;
const MAX_RETRIES: u32 = 3;
const ORIGIN_DELAY: Duration = Duration::from_secs(3);

static HTML_TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").unwrap());
static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s{3,}").unwrap());

/// Sleep primitive used for origin delays and retry backoff.
///
/// The default implementation delegates to `tokio::time::sleep`; tests
/// swap in a recording no-op via [`RssSource::with_sleeper`].
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Production sleeper backed by the tokio timer.
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Why one feed fetch failed, classified for the retry loop.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("fetch {url}: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("fetch {url}: HTTP {status}")]
    Status { url: String, status: StatusCode },
    #[error("parse {url}: {source}")]
    Parse {
        url: String,
        #[source]
        source: feed_rs::parser::ParseFeedError,
    },
}

impl FeedError {
    /// Timeouts, connection/DNS failures, 429, and 5xx are worth retrying;
    /// other client errors and malformed feeds are not.
    pub fn retryable(&self) -> bool {
        match self {
            FeedError::Http { source, .. } => {
                source.is_timeout() || source.is_connect() || source.is_request()
            }
            FeedError::Status { status, .. } => {
                *status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
            }
            FeedError::Parse { .. } => false,
        }
    }
}

/// RSS/Atom source over a fixed list of feed URLs.
pub struct RssSource {
    feeds: Vec<String>,
    sleeper: Arc<dyn Sleeper>,
}

impl RssSource {
    /// Create an RSS source. At least one feed URL is required.
    pub fn new(feeds: Vec<String>) -> Result<RssSource> {
        if feeds.is_empty() {
            bail!("rss: at least one feed URL is required");
        }
        Ok(RssSource {
            feeds,
            sleeper: Arc::new(TokioSleeper),
        })
    }

    /// Replace the sleep primitive (tests).
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> RssSource {
        self.sleeper = sleeper;
        self
    }
}

#[async_trait]
impl Source for RssSource {
    fn name(&self) -> &'static str {
        SOURCE_NAME
    }

    async fn fetch(&self, since: DateTime<Utc>) -> Result<Vec<Post>> {
        let client = reqwest::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()
            .context("rss: build http client")?;

        // Group feeds by origin so same-origin requests stay sequential.
        let mut origin_feeds: HashMap<String, Vec<String>> = HashMap::new();
        for feed_url in &self.feeds {
            origin_feeds
                .entry(feed_origin(feed_url))
                .or_default()
                .push(feed_url.clone());
        }

        let queue: Arc<Mutex<VecDeque<Vec<String>>>> =
            Arc::new(Mutex::new(origin_feeds.into_values().collect()));
        let workers = MAX_WORKERS.min(queue.lock().unwrap().len());

        let mut set: JoinSet<Vec<Post>> = JoinSet::new();
        for _ in 0..workers {
            let queue = Arc::clone(&queue);
            let sleeper = Arc::clone(&self.sleeper);
            let client = client.clone();
            set.spawn(async move {
                let mut collected = Vec::new();
                loop {
                    let group = queue.lock().unwrap().pop_front();
                    let Some(feeds) = group else { break };
                    for (i, feed_url) in feeds.iter().enumerate() {
                        if i > 0 {
                            sleeper.sleep(ORIGIN_DELAY).await;
                        }
                        match fetch_with_retry(&client, sleeper.as_ref(), feed_url, since).await {
                            Ok(posts) => collected.extend(posts),
                            Err(err) => eprintln!("  rss: {err}"),
                        }
                    }
                }
                collected
            });
        }

        let mut posts = Vec::new();
        while let Some(result) = set.join_next().await {
            posts.extend(result.context("rss: fetch worker panicked")?);
        }

        Ok(posts)
    }
}

/// Extract the host (with any explicit port) from a feed URL for origin
/// grouping. Unparseable URLs fall back to the raw string, each forming
/// its own group.
fn feed_origin(feed_url: &str) -> String {
    let Ok(url) = reqwest::Url::parse(feed_url) else {
        return feed_url.to_string();
    };
    match (url.host_str(), url.port()) {
        (Some(host), Some(port)) => format!("{host}:{port}"),
        (Some(host), None) => host.to_string(),
        _ => feed_url.to_string(),
    }
}

/// Fetch one feed with up to [`MAX_RETRIES`] attempts and exponential
/// backoff (1 s, 2 s) between retryable failures.
pub(crate) async fn fetch_with_retry(
    client: &reqwest::Client,
    sleeper: &dyn Sleeper,
    feed_url: &str,
    since: DateTime<Utc>,
) -> Result<Vec<Post>, FeedError> {
    let mut last_err = None;
    for attempt in 0..MAX_RETRIES {
        match fetch_feed(client, feed_url, since).await {
            Ok(posts) => return Ok(posts),
            Err(err) => {
                if !err.retryable() {
                    return Err(err);
                }
                if attempt + 1 < MAX_RETRIES {
                    sleeper.sleep(Duration::from_secs(1 << attempt)).await;
                }
                last_err = Some(err);
            }
        }
    }
    Err(last_err.expect("retry loop exhausted without error"))
}

async fn fetch_feed(
    client: &reqwest::Client,
    feed_url: &str,
    since: DateTime<Utc>,
) -> Result<Vec<Post>, FeedError> {
    let response = client.get(feed_url).send().await.map_err(|e| FeedError::Http {
        url: feed_url.to_string(),
        source: e,
    })?;

    let status = response.status();
    if !status.is_success() {
        return Err(FeedError::Status {
            url: feed_url.to_string(),
            status,
        });
    }

    let body = response.bytes().await.map_err(|e| FeedError::Http {
        url: feed_url.to_string(),
        source: e,
    })?;

    let feed = feed_rs::parser::parse(&body[..]).map_err(|e| FeedError::Parse {
        url: feed_url.to_string(),
        source: e,
    })?;

    Ok(posts_from_feed(&feed, feed_url, since))
}

pub(crate) fn posts_from_feed(
    feed: &feed_rs::model::Feed,
    feed_url: &str,
    since: DateTime<Utc>,
) -> Vec<Post> {
    let channel = feed
        .title
        .as_ref()
        .map(|t| t.content.clone())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| feed_url.to_string());

    let mut posts = Vec::new();
    for entry in &feed.entries {
        // Published wins over updated; entries with neither are skipped.
        let Some(posted_at) = entry.published.or(entry.updated) else {
            continue;
        };
        if posted_at < since {
            continue;
        }

        let link = entry.links.first().map(|l| l.href.clone());
        let external_id = if entry.id.is_empty() {
            match &link {
                Some(href) => href.clone(),
                None => continue,
            }
        } else {
            entry.id.clone()
        };

        posts.push(Post {
            source: SOURCE_NAME.to_string(),
            channel: channel.clone(),
            external_id,
            text: entry_text(entry),
            url: link,
            posted_at,
        });
    }
    posts
}

/// Entry text: content (or summary) with HTML stripped, prefixed with the
/// title when the body does not already contain it.
fn entry_text(entry: &feed_rs::model::Entry) -> String {
    let raw = entry
        .content
        .as_ref()
        .and_then(|c| c.body.clone())
        .or_else(|| entry.summary.as_ref().map(|s| s.content.clone()))
        .unwrap_or_default();

    let mut text = strip_html(&raw);

    if let Some(title) = &entry.title {
        if !title.content.is_empty() && !text.contains(&title.content) {
            text = if text.is_empty() {
                title.content.clone()
            } else {
                format!("{}\n\n{}", title.content, text)
            };
        }
    }

    text.trim().to_string()
}

/// Remove tags, decode entities, and collapse runs of 3+ whitespace
/// characters into a blank line.
pub(crate) fn strip_html(input: &str) -> String {
    let stripped = HTML_TAG_RE.replace_all(input, " ");
    let decoded = html_escape::decode_html_entities(&stripped).into_owned();
    let collapsed = WHITESPACE_RE.replace_all(&decoded, "\n\n");
    collapsed.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const SAMPLE_RSS: &str = r#"<?xml version="1.0"?>
<rss version="2.0">
  <channel>
    <title>Release Notes</title>
    <item>
      <title>v2.0 is out</title>
      <guid>rel-2-0</guid>
      <link>https://example.com/rel/2.0</link>
      <description>&lt;p&gt;Major release with a &lt;b&gt;breaking change&lt;/b&gt; in the API.&lt;/p&gt;</description>
      <pubDate>Mon, 02 Jun 2025 10:00:00 GMT</pubDate>
    </item>
    <item>
      <title>Ancient news</title>
      <guid>rel-0-1</guid>
      <link>https://example.com/rel/0.1</link>
      <description>old</description>
      <pubDate>Mon, 06 Jan 2020 10:00:00 GMT</pubDate>
    </item>
  </channel>
</rss>"#;

    #[test]
    fn strip_html_removes_tags_and_decodes_entities() {
        let input = "<p>Tom &amp; Jerry</p>\n\n\n<div>again</div>";
        let out = strip_html(input);
        assert!(out.contains("Tom & Jerry"));
        assert!(!out.contains('<'));
        assert!(out.contains("\n\n"));
    }

    #[test]
    fn posts_from_feed_applies_window_and_metadata() {
        let feed = feed_rs::parser::parse(SAMPLE_RSS.as_bytes()).unwrap();
        let since = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();

        let posts = posts_from_feed(&feed, "https://example.com/feed.xml", since);
        assert_eq!(posts.len(), 1);

        let post = &posts[0];
        assert_eq!(post.source, "rss");
        assert_eq!(post.channel, "Release Notes");
        assert_eq!(post.external_id, "rel-2-0");
        assert_eq!(post.url.as_deref(), Some("https://example.com/rel/2.0"));
        // Title prepended since the description does not contain it.
        assert!(post.text.starts_with("v2.0 is out"));
        assert!(post.text.contains("breaking change"));
    }

    #[test]
    fn status_errors_classify_for_retry() {
        let retryable = FeedError::Status {
            url: "u".into(),
            status: StatusCode::SERVICE_UNAVAILABLE,
        };
        assert!(retryable.retryable());

        let rate_limited = FeedError::Status {
            url: "u".into(),
            status: StatusCode::TOO_MANY_REQUESTS,
        };
        assert!(rate_limited.retryable());

        let not_found = FeedError::Status {
            url: "u".into(),
            status: StatusCode::NOT_FOUND,
        };
        assert!(!not_found.retryable());
    }

    #[test]
    fn feed_origin_groups_by_host() {
        assert_eq!(feed_origin("https://blog.example.com/feed.xml"), "blog.example.com");
        assert_eq!(feed_origin("not a url"), "not a url");
    }
}

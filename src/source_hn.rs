//! Ranked-list source (Hacker News top stories).
//!
//! Fetches the ranked id list (capped at [`MAX_STORIES`]), then loads the
//! items through a bounded pool of [`MAX_WORKERS`] workers. An item is
//! accepted when it is a story, meets the configured point threshold, and
//! falls inside the window. Individual item failures are logged and
//! skipped; only a failure to load the id list fails the source.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinSet;

use crate::models::Post;
use crate::sources::Source;

pub const SOURCE_NAME: &str = "hn";
pub const CHANNEL_NAME: &str = "Hacker News";

const API_BASE: &str = "https://hacker-news.firebaseio.com/v0";
const FETCH_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_STORIES: usize = 200;
const MAX_WORKERS: usize = 5;

/// Ranked-list source filtered by a minimum item score.
pub struct HnSource {
    min_points: i64,
    api_base: String,
}

impl HnSource {
    /// Create a ranked-list source. `min_points` must be at least 1.
    pub fn new(min_points: i64) -> Result<HnSource> {
        if min_points < 1 {
            bail!("hn: min_points must be at least 1");
        }
        Ok(HnSource {
            min_points,
            api_base: API_BASE.to_string(),
        })
    }

    /// Point the source at a different API root (tests).
    pub fn with_api_base(mut self, api_base: String) -> HnSource {
        self.api_base = api_base;
        self
    }
}

#[derive(Debug, Deserialize)]
struct Item {
    #[serde(default)]
    id: i64,
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    score: i64,
    #[serde(default)]
    time: i64,
}

#[async_trait]
impl Source for HnSource {
    fn name(&self) -> &'static str {
        SOURCE_NAME
    }

    async fn fetch(&self, since: DateTime<Utc>) -> Result<Vec<Post>> {
        let client = reqwest::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .build()
            .context("hn: build http client")?;

        let mut ids = self.fetch_top_ids(&client).await.context("hn: fetch top stories")?;
        ids.truncate(MAX_STORIES);

        let queue: Arc<Mutex<VecDeque<i64>>> = Arc::new(Mutex::new(ids.into_iter().collect()));
        let workers = MAX_WORKERS.min(queue.lock().unwrap().len());
        let min_points = self.min_points;

        let mut set: JoinSet<Vec<Post>> = JoinSet::new();
        for _ in 0..workers {
            let queue = Arc::clone(&queue);
            let client = client.clone();
            let api_base = self.api_base.clone();
            set.spawn(async move {
                let mut collected = Vec::new();
                loop {
                    let id = queue.lock().unwrap().pop_front();
                    let Some(id) = id else { break };
                    match fetch_item(&client, &api_base, id).await {
                        Ok(item) => {
                            if let Some(post) = post_from_item(&item, min_points, since) {
                                collected.push(post);
                            }
                        }
                        Err(err) => eprintln!("  hn: item {id}: {err}"),
                    }
                }
                collected
            });
        }

        let mut posts = Vec::new();
        while let Some(result) = set.join_next().await {
            posts.extend(result.context("hn: fetch worker panicked")?);
        }

        Ok(posts)
    }
}

impl HnSource {
    async fn fetch_top_ids(&self, client: &reqwest::Client) -> Result<Vec<i64>> {
        let url = format!("{}/topstories.json", self.api_base);
        let response = client.get(&url).send().await?;

        let status = response.status();
        if !status.is_success() {
            bail!("topstories: HTTP {status}");
        }

        Ok(response.json().await.context("topstories: decode")?)
    }
}

async fn fetch_item(client: &reqwest::Client, api_base: &str, id: i64) -> Result<Item> {
    let url = format!("{api_base}/item/{id}.json");
    let response = client.get(&url).send().await?;

    let status = response.status();
    if !status.is_success() {
        bail!("HTTP {status}");
    }

    response.json().await.context("decode item")
}

fn post_from_item(item: &Item, min_points: i64, since: DateTime<Utc>) -> Option<Post> {
    if item.kind != "story" || item.score < min_points {
        return None;
    }
    let posted_at = DateTime::from_timestamp(item.time, 0)?;
    if posted_at < since {
        return None;
    }

    Some(Post {
        source: SOURCE_NAME.to_string(),
        channel: CHANNEL_NAME.to_string(),
        external_id: item.id.to_string(),
        text: item.title.clone(),
        url: item.url.clone(),
        posted_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn story(score: i64, time: i64) -> Item {
        Item {
            id: 41,
            kind: "story".to_string(),
            title: "Postgres 17 released".to_string(),
            url: Some("https://example.com/pg17".to_string()),
            score,
            time,
        }
    }

    #[test]
    fn accepts_qualifying_stories_only() {
        let since = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let recent = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap().timestamp();

        let post = post_from_item(&story(120, recent), 50, since).unwrap();
        assert_eq!(post.external_id, "41");
        assert_eq!(post.channel, CHANNEL_NAME);
        assert_eq!(post.text, "Postgres 17 released");

        // Below threshold.
        assert!(post_from_item(&story(10, recent), 50, since).is_none());

        // Outside window.
        let old = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap().timestamp();
        assert!(post_from_item(&story(120, old), 50, since).is_none());

        // Not a story.
        let mut comment = story(120, recent);
        comment.kind = "comment".to_string();
        assert!(post_from_item(&comment, 50, since).is_none());
    }

    #[test]
    fn min_points_validated() {
        assert!(HnSource::new(0).is_err());
        assert!(HnSource::new(1).is_ok());
    }
}

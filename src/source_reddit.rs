//! Public forum-listing source (reddit JSON API).
//!
//! Polls `/r/<channel>/new.json` for each configured channel. One listing
//! request per channel with a 1 s pause between channels; a failed listing
//! is logged and the remaining channels continue.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::time::Duration;

use crate::models::Post;
use crate::sources::Source;

pub const SOURCE_NAME: &str = "reddit";

const BASE_URL: &str = "https://www.reddit.com";
const FETCH_TIMEOUT: Duration = Duration::from_secs(30);
const USER_AGENT: &str = "sift/0.1";
const CHANNEL_DELAY: Duration = Duration::from_secs(1);

/// Forum source over a fixed list of public channels.
pub struct RedditSource {
    channels: Vec<String>,
    base_url: String,
}

impl RedditSource {
    /// Create a forum source. At least one channel is required.
    pub fn new(channels: Vec<String>) -> Result<RedditSource> {
        if channels.is_empty() {
            bail!("reddit: at least one channel is required");
        }
        Ok(RedditSource {
            channels,
            base_url: BASE_URL.to_string(),
        })
    }

    /// Point the source at a different API root (tests).
    pub fn with_base_url(mut self, base_url: String) -> RedditSource {
        self.base_url = base_url;
        self
    }
}

#[async_trait]
impl Source for RedditSource {
    fn name(&self) -> &'static str {
        SOURCE_NAME
    }

    async fn fetch(&self, since: DateTime<Utc>) -> Result<Vec<Post>> {
        let client = reqwest::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()
            .context("reddit: build http client")?;

        let mut posts = Vec::new();
        for (i, channel) in self.channels.iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(CHANNEL_DELAY).await;
            }
            match self.fetch_channel(&client, channel, since).await {
                Ok(items) => posts.extend(items),
                Err(err) => eprintln!("  reddit: r/{channel}: {err}"),
            }
        }

        Ok(posts)
    }
}

impl RedditSource {
    async fn fetch_channel(
        &self,
        client: &reqwest::Client,
        channel: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<Post>> {
        let url = format!("{}/r/{}/new.json?limit=100", self.base_url, channel);
        let response = client.get(&url).send().await.context("request listing")?;

        let status = response.status();
        if !status.is_success() {
            bail!("status {status}");
        }

        let listing: Listing = response.json().await.context("decode listing")?;
        Ok(posts_from_listing(&listing, channel, &self.base_url, since))
    }
}

fn posts_from_listing(
    listing: &Listing,
    channel: &str,
    base_url: &str,
    since: DateTime<Utc>,
) -> Vec<Post> {
    let mut posts = Vec::new();
    for child in &listing.data.children {
        let item = &child.data;
        let Some(posted_at) = DateTime::from_timestamp(item.created_utc as i64, 0) else {
            continue;
        };
        if posted_at < since {
            continue;
        }

        let text = if item.selftext.trim().is_empty() {
            item.title.clone()
        } else {
            format!("{}\n\n{}", item.title, item.selftext)
        };

        posts.push(Post {
            source: SOURCE_NAME.to_string(),
            channel: channel.to_string(),
            external_id: item.id.clone(),
            text,
            url: Some(format!("{}{}", base_url, item.permalink)),
            posted_at,
        });
    }
    posts
}

#[derive(Debug, Deserialize)]
struct Listing {
    data: ListingData,
}

#[derive(Debug, Deserialize)]
struct ListingData {
    #[serde(default)]
    children: Vec<ListingChild>,
}

#[derive(Debug, Deserialize)]
struct ListingChild {
    data: ListingPost,
}

#[derive(Debug, Deserialize)]
struct ListingPost {
    #[serde(default)]
    id: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    selftext: String,
    #[serde(default)]
    permalink: String,
    #[serde(default)]
    created_utc: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn listing_items_become_posts() {
        let raw = r#"{
            "data": {"children": [
                {"data": {"id": "abc", "title": "Cluster upgrade notes", "selftext": "Details inside.",
                          "permalink": "/r/ops/comments/abc/", "created_utc": 1750000000}},
                {"data": {"id": "old", "title": "Stale", "selftext": "",
                          "permalink": "/r/ops/comments/old/", "created_utc": 1000000000}}
            ]}
        }"#;
        let listing: Listing = serde_json::from_str(raw).unwrap();
        let since = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();

        let posts = posts_from_listing(&listing, "ops", "https://www.reddit.com", since);
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].external_id, "abc");
        assert_eq!(posts[0].channel, "ops");
        assert_eq!(posts[0].text, "Cluster upgrade notes\n\nDetails inside.");
        assert_eq!(
            posts[0].url.as_deref(),
            Some("https://www.reddit.com/r/ops/comments/abc/")
        );
    }

    #[test]
    fn title_alone_when_body_empty() {
        let raw = r#"{"data": {"children": [
            {"data": {"id": "x", "title": "Just a title", "selftext": "  ",
                      "permalink": "/r/ops/x/", "created_utc": 1750000000}}
        ]}}"#;
        let listing: Listing = serde_json::from_str(raw).unwrap();
        let since = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();

        let posts = posts_from_listing(&listing, "ops", "https://www.reddit.com", since);
        assert_eq!(posts[0].text, "Just a title");
    }
}

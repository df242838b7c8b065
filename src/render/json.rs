//! JSON digest formatter — the stable automation contract.
//!
//! Field order follows struct declaration order and absent optional
//! per-item fields are omitted entirely, so downstream consumers can diff
//! outputs byte-for-byte.

use anyhow::Result;
use serde::Serialize;
use std::io::Write;

use super::{format_duration, group_by_tier, headline, Formatter};
use crate::digest::{DigestInput, DigestItem};

pub struct JsonFormatter;

#[derive(Serialize)]
struct JsonDigest {
    meta: JsonMeta,
    read_now: Vec<JsonItem>,
    skims: Vec<JsonItem>,
    ignored: usize,
}

#[derive(Serialize)]
struct JsonMeta {
    channels: usize,
    total_posts: usize,
    since: String,
}

#[derive(Serialize)]
struct JsonItem {
    source: String,
    channel: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    url: Option<String>,
    posted_at: String,
    score: i64,
    tier: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    labels: Vec<String>,
    headline: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    bullets: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    also_in: Vec<String>,
}

impl Formatter for JsonFormatter {
    fn format(&self, w: &mut dyn Write, input: &DigestInput) -> Result<()> {
        let (read_now, skims, ignored) = group_by_tier(&input.items);

        let digest = JsonDigest {
            meta: JsonMeta {
                channels: input.channels,
                total_posts: input.total_posts,
                since: format_duration(input.since),
            },
            read_now: read_now.iter().map(|i| to_json_item(i)).collect(),
            skims: skims.iter().map(|i| to_json_item(i)).collect(),
            ignored,
        };

        serde_json::to_writer_pretty(&mut *w, &digest)?;
        writeln!(w)?;
        Ok(())
    }
}

fn to_json_item(item: &DigestItem) -> JsonItem {
    JsonItem {
        source: item.post.source.clone(),
        channel: item.post.channel.clone(),
        url: item.post.url.clone(),
        posted_at: item.post.posted_at.format("%Y-%m-%dT%H:%M:%SZ").to_string(),
        score: item.score.score,
        tier: item.score.tier.as_str().to_string(),
        labels: item.score.labels.clone(),
        headline: headline(item).to_string(),
        bullets: item.summary.bullets.iter().skip(1).cloned().collect(),
        also_in: item.also_in.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Score, StoredPost, Tier};
    use crate::summarize::Summary;
    use chrono::Utc;
    use std::time::Duration;

    fn sample_input() -> DigestInput {
        let now = Utc::now();
        DigestInput {
            items: vec![DigestItem {
                post: StoredPost {
                    id: 1,
                    source: "rss".to_string(),
                    channel: "Release Notes".to_string(),
                    external_id: "rel-1".to_string(),
                    text: Some("text".to_string()),
                    snippet: "text".to_string(),
                    text_hash: String::new(),
                    url: None,
                    posted_at: now,
                    fetched_at: now,
                },
                score: Score {
                    post_id: 1,
                    score: 8,
                    labels: Vec::new(),
                    tier: Tier::ReadNow,
                    scored_at: now,
                    explanation: Vec::new(),
                },
                summary: Summary {
                    bullets: vec!["only bullet".to_string()],
                    links: Vec::new(),
                    cves: Vec::new(),
                },
                also_in: Vec::new(),
            }],
            trending: Vec::new(),
            channels: 1,
            total_posts: 1,
            since: Duration::from_secs(24 * 3600),
        }
    }

    #[test]
    fn shape_is_stable_and_empty_optionals_are_omitted() {
        let mut buffer = Vec::new();
        JsonFormatter.format(&mut buffer, &sample_input()).unwrap();
        let out = String::from_utf8(buffer).unwrap();

        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["meta"]["channels"], 1);
        assert_eq!(value["meta"]["since"], "1d");
        assert_eq!(value["read_now"][0]["headline"], "only bullet");
        assert_eq!(value["ignored"], 0);
        assert!(value["skims"].as_array().unwrap().is_empty());

        // Empty optionals never appear.
        assert!(value["read_now"][0].get("url").is_none());
        assert!(value["read_now"][0].get("labels").is_none());
        assert!(value["read_now"][0].get("bullets").is_none());
        assert!(value["read_now"][0].get("also_in").is_none());
    }
}

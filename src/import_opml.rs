//! OPML feed-list import.
//!
//! Reads the `xmlUrl` attributes from an OPML outline tree and merges the
//! new feed URLs into `sources.feeds` in `config.yaml`, skipping any that
//! are already present.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;

use crate::config::{Config, CONFIG_FILE};

#[derive(Debug, Deserialize)]
struct Opml {
    body: OpmlBody,
}

#[derive(Debug, Deserialize)]
struct OpmlBody {
    #[serde(rename = "outline", default)]
    outlines: Vec<OpmlOutline>,
}

#[derive(Debug, Deserialize)]
struct OpmlOutline {
    #[serde(rename = "@xmlUrl", default)]
    xml_url: Option<String>,
    #[serde(rename = "outline", default)]
    outlines: Vec<OpmlOutline>,
}

/// Import feeds from `opml_path` into the config at `config_dir`.
pub fn run_import(config_dir: &Path, opml_path: &Path, dry_run: bool) -> Result<()> {
    let raw = std::fs::read_to_string(opml_path)
        .with_context(|| format!("read OPML: {}", opml_path.display()))?;

    let doc: Opml = quick_xml::de::from_str(&raw).context("parse OPML")?;

    let mut feed_urls = Vec::new();
    collect_feed_urls(&doc.body.outlines, &mut feed_urls);
    if feed_urls.is_empty() {
        println!("No feed URLs found in OPML file.");
        return Ok(());
    }

    let config = Config::load(config_dir)?;
    let existing: HashSet<&str> = config.sources.feeds.iter().map(String::as_str).collect();

    let mut new_feeds = Vec::new();
    let mut skipped = 0;
    for url in &feed_urls {
        if existing.contains(url.as_str()) {
            skipped += 1;
        } else if !new_feeds.contains(url) {
            new_feeds.push(url.clone());
        }
    }

    if new_feeds.is_empty() {
        println!("All {skipped} feeds already present, nothing to add.");
        return Ok(());
    }

    if dry_run {
        println!(
            "Would add {} feeds (skipping {} duplicates):",
            new_feeds.len(),
            skipped
        );
        for feed in &new_feeds {
            println!("  + {feed}");
        }
        return Ok(());
    }

    let config_path = config_dir.join(CONFIG_FILE);
    merge_feeds(&config_path, &new_feeds).context("merge feeds")?;

    println!(
        "Added {} feeds to {} (skipped {} duplicates).",
        new_feeds.len(),
        config_path.display(),
        skipped
    );
    Ok(())
}

fn collect_feed_urls(outlines: &[OpmlOutline], urls: &mut Vec<String>) {
    for outline in outlines {
        if let Some(url) = &outline.xml_url {
            let url = url.trim();
            // Only http(s) URLs are valid feed entries.
            if url.starts_with("http://") || url.starts_with("https://") {
                urls.push(url.to_string());
            }
        }
        collect_feed_urls(&outline.outlines, urls);
    }
}

/// Append feed URLs to `sources.feeds`, creating the path if absent.
fn merge_feeds(config_path: &Path, new_feeds: &[String]) -> Result<()> {
    let raw = std::fs::read_to_string(config_path)
        .with_context(|| format!("read config: {}", config_path.display()))?;
    let mut doc: serde_yaml::Value = serde_yaml::from_str(&raw).context("parse config")?;

    let root = doc
        .as_mapping_mut()
        .ok_or_else(|| anyhow::anyhow!("config root is not a mapping"))?;

    let sources = root
        .entry("sources".into())
        .or_insert_with(|| serde_yaml::Value::Mapping(Default::default()));
    let sources = sources
        .as_mapping_mut()
        .ok_or_else(|| anyhow::anyhow!("sources is not a mapping"))?;

    let feeds = sources
        .entry("feeds".into())
        .or_insert_with(|| serde_yaml::Value::Sequence(Vec::new()));
    if feeds.is_null() {
        *feeds = serde_yaml::Value::Sequence(Vec::new());
    }
    let feeds = feeds
        .as_sequence_mut()
        .ok_or_else(|| anyhow::anyhow!("sources.feeds is not a list"))?;

    for url in new_feeds {
        feeds.push(serde_yaml::Value::String(url.clone()));
    }

    std::fs::write(config_path, serde_yaml::to_string(&doc)?)
        .with_context(|| format!("write config: {}", config_path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_OPML: &str = r#"<?xml version="1.0"?>
<opml version="2.0">
  <body>
    <outline text="Engineering">
      <outline text="Blog A" xmlUrl="https://a.example/feed.xml"/>
      <outline text="Blog B" xmlUrl="https://b.example/rss"/>
    </outline>
    <outline text="Blog C" xmlUrl="https://c.example/atom.xml"/>
    <outline text="Desktop reader" xmlUrl="feed://d.example/feed.xml"/>
    <outline text="Local notes" xmlUrl="/home/me/notes.xml"/>
  </body>
</opml>"#;

    #[test]
    fn collects_nested_feed_urls() {
        let doc: Opml = quick_xml::de::from_str(SAMPLE_OPML).unwrap();
        let mut urls = Vec::new();
        collect_feed_urls(&doc.body.outlines, &mut urls);
        assert_eq!(
            urls,
            [
                "https://a.example/feed.xml",
                "https://b.example/rss",
                "https://c.example/atom.xml"
            ]
        );
    }

    #[test]
    fn non_http_urls_are_rejected() {
        let doc: Opml = quick_xml::de::from_str(
            r#"<opml version="2.0"><body>
                <outline text="A" xmlUrl="feed://a.example/feed.xml"/>
                <outline text="B" xmlUrl="not a url"/>
                <outline text="C" xmlUrl="http://c.example/feed.xml"/>
            </body></opml>"#,
        )
        .unwrap();

        let mut urls = Vec::new();
        collect_feed_urls(&doc.body.outlines, &mut urls);
        assert_eq!(urls, ["http://c.example/feed.xml"]);
    }

    #[test]
    fn merge_appends_to_existing_feed_list() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join(CONFIG_FILE);
        std::fs::write(
            &config_path,
            "sources:\n  feeds:\n    - https://old.example/feed.xml\n",
        )
        .unwrap();

        merge_feeds(&config_path, &["https://new.example/feed.xml".to_string()]).unwrap();

        let raw = std::fs::read_to_string(&config_path).unwrap();
        let value: serde_yaml::Value = serde_yaml::from_str(&raw).unwrap();
        let feeds = value["sources"]["feeds"].as_sequence().unwrap();
        assert_eq!(feeds.len(), 2);
        assert_eq!(feeds[1], "https://new.example/feed.xml");
    }
}

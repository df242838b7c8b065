//! URL verification for read_now posts via an external scanner.
//!
//! Drives the `entropia` binary (`entropia scan <url> --json`) over the
//! URLs of read_now posts in the window and prints the reported support
//! index, confidence, and conflict flag. The scanner is an opaque
//! collaborator: every per-URL failure (missing binary, timeout, bad
//! JSON, unscannable host) is a printed note, never a command failure.

use anyhow::{anyhow, bail, Context, Result};
use chrono::Utc;
use serde::Deserialize;
use std::time::Duration;
use tokio::process::Command;

use crate::config::{parse_duration, Config};
use crate::models::{PostFilter, Tier};
use crate::store::Store;

const SCAN_TIMEOUT: Duration = Duration::from_secs(30);
const SCANNER_BIN: &str = "entropia";

#[derive(Debug, Deserialize)]
struct ScanResult {
    #[allow(dead_code)]
    #[serde(default)]
    url: String,
    score: ScanScore,
}

#[derive(Debug, Deserialize)]
struct ScanScore {
    #[serde(default)]
    index: i64,
    #[serde(default)]
    confidence: String,
    #[serde(default)]
    conflict: bool,
}

/// Run the verify command over read_now posts in the window.
pub async fn run_verify(config: &Config, store: &Store, since: Option<&str>) -> Result<()> {
    let window = match since {
        Some(raw) => parse_duration(raw).context("parse --since")?,
        None => config.digest.since_duration()?,
    };
    let since_time = Utc::now() - chrono::Duration::from_std(window).context("window too large")?;

    let posts = store
        .get_posts(since_time, Some(Tier::ReadNow), &PostFilter::default())
        .await?;

    println!(
        "sift verify — {} read_now posts, checking URLs...",
        posts.len()
    );
    println!();

    for entry in &posts {
        let post = &entry.post;
        let score = entry.score.as_ref().map(|s| s.score).unwrap_or_default();

        let mut title = post.snippet.as_str();
        if let Some(idx) = title.find('\n') {
            title = &title[..idx];
        }
        let title: String = if title.chars().count() > 60 {
            format!("{}...", title.chars().take(57).collect::<String>())
        } else {
            title.to_string()
        };

        println!("  [{}] {} — {}", score, post.channel, title);

        let Some(url) = post.url.as_deref().map(str::trim).filter(|u| !u.is_empty()) else {
            println!("      {SCANNER_BIN}: skipped (no URL)");
            println!();
            continue;
        };
        println!("      {url}");

        if let Some(reason) = skip_reason(url) {
            println!("      {SCANNER_BIN}: skipped ({reason})");
            println!();
            continue;
        }

        match scan_url(url).await {
            Ok(result) => {
                let conflict = if result.score.conflict {
                    ", conflict detected"
                } else {
                    ", no conflict"
                };
                println!(
                    "      {SCANNER_BIN}: support {}/100, confidence {}{}",
                    result.score.index, result.score.confidence, conflict
                );
            }
            Err(err) => println!("      {SCANNER_BIN}: error ({err:#})"),
        }
        println!();
    }

    Ok(())
}

/// Hosts the scanner cannot usefully inspect.
fn skip_reason(raw_url: &str) -> Option<&'static str> {
    let url = match reqwest::Url::parse(raw_url) {
        Ok(url) => url,
        Err(_) => return Some("invalid URL"),
    };
    let host = url.host_str()?.to_lowercase();
    if host.contains("reddit.com") {
        return Some("listing page, not scannable");
    }
    if host.contains("t.me") {
        return Some("requires auth");
    }
    None
}

async fn scan_url(url: &str) -> Result<ScanResult> {
    let output = tokio::time::timeout(
        SCAN_TIMEOUT,
        Command::new(SCANNER_BIN)
            .arg("scan")
            .arg(url)
            .arg("--json")
            .kill_on_drop(true)
            .output(),
    )
    .await
    .map_err(|_| anyhow!("timeout"))?
    .context("run scanner")?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!("failed: {}", stderr.trim());
    }

    serde_json::from_slice(&output.stdout).context("parse json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unscannable_hosts_are_skipped() {
        assert!(skip_reason("https://www.reddit.com/r/ops/comments/x/").is_some());
        assert!(skip_reason("https://t.me/somechannel/5").is_some());
        assert!(skip_reason("not a url").is_some());
        assert!(skip_reason("https://example.com/article").is_none());
    }

    #[test]
    fn scan_result_parses_scanner_output() {
        let raw = r#"{"url": "https://example.com", "score": {"index": 82, "confidence": "high", "conflict": false, "signals": ["dns", "tls"]}}"#;
        let result: ScanResult = serde_json::from_str(raw).unwrap();
        assert_eq!(result.score.index, 82);
        assert_eq!(result.score.confidence, "high");
        assert!(!result.score.conflict);
    }
}

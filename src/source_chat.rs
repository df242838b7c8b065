//! Chat source backed by an out-of-process collector.
//!
//! The collector is an opaque subprocess (by default a Python script) that
//! authenticates to the chat service and prints one JSON record per line:
//!
//! ```text
//! {"channel": "...", "msg_id": "...", "date": "<RFC 3339>", "text": "...", "url": "..."}
//! ```
//!
//! The whole batch is strict: any malformed line or unparseable date
//! aborts the fetch with an error, and a non-zero exit surfaces the
//! collector's stderr. Credentials are passed through on the command line
//! from env-resolved config; this process never talks to the chat API
//! itself.

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::time::Duration;
use tokio::process::Command;

use crate::config::SubprocessConfig;
use crate::models::Post;
use crate::sources::Source;

pub const SOURCE_NAME: &str = "chat";

const FETCH_TIMEOUT: Duration = Duration::from_secs(120);

/// Chat-collector subprocess source.
pub struct ChatSource {
    script_path: String,
    python_path: String,
    api_id: String,
    api_hash: String,
    session_dir: String,
    channels: Vec<String>,
}

impl ChatSource {
    /// Create a chat source from env-resolved subprocess config.
    pub fn new(config: &SubprocessConfig) -> Result<ChatSource> {
        if config.script.trim().is_empty() {
            bail!("chat: collector script path is required");
        }
        if config.channels.is_empty() {
            bail!("chat: at least one channel is required");
        }

        Ok(ChatSource {
            script_path: config.script.clone(),
            python_path: config.python_path.clone(),
            api_id: config.api_id.clone(),
            api_hash: config.api_hash.clone(),
            session_dir: config.session_dir.clone(),
            channels: config.channels.clone(),
        })
    }
}

#[async_trait]
impl Source for ChatSource {
    fn name(&self) -> &'static str {
        SOURCE_NAME
    }

    async fn fetch(&self, since: DateTime<Utc>) -> Result<Vec<Post>> {
        let output = tokio::time::timeout(
            FETCH_TIMEOUT,
            Command::new(&self.python_path)
                .arg(&self.script_path)
                .arg("--api-id")
                .arg(&self.api_id)
                .arg("--api-hash")
                .arg(&self.api_hash)
                .arg("--session-dir")
                .arg(&self.session_dir)
                .arg("--channels")
                .arg(self.channels.join(","))
                .arg("--since")
                .arg(since.to_rfc3339())
                .kill_on_drop(true)
                .output(),
        )
        .await
        .map_err(|_| anyhow!("chat: collector timed out after {}s", FETCH_TIMEOUT.as_secs()))?
        .context("chat: start collector")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stderr = stderr.trim();
            if stderr.is_empty() {
                bail!("chat: collector failed: {}", output.status);
            }
            bail!("chat: collector failed: {stderr}");
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        parse_jsonl(&stdout).context("chat: parse collector output")
    }
}

/// One JSONL record as emitted by the collector.
#[derive(Debug, Deserialize)]
struct ChatRecord {
    channel: String,
    msg_id: String,
    date: String,
    #[serde(default)]
    text: String,
    #[serde(default)]
    url: Option<String>,
}

/// Parse line-delimited JSON records into posts. Blank lines are skipped;
/// any malformed line or date fails the whole batch.
pub(crate) fn parse_jsonl(input: &str) -> Result<Vec<Post>> {
    let mut posts = Vec::new();

    for (i, line) in input.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let record: ChatRecord = serde_json::from_str(line)
            .with_context(|| format!("line {}: invalid json", i + 1))?;

        let posted_at = DateTime::parse_from_rfc3339(&record.date)
            .with_context(|| format!("line {}: invalid date {:?}", i + 1, record.date))?
            .with_timezone(&Utc);

        posts.push(Post {
            source: SOURCE_NAME.to_string(),
            channel: record.channel,
            external_id: record.msg_id,
            text: record.text,
            url: record.url.filter(|u| !u.is_empty()),
            posted_at,
        });
    }

    Ok(posts)
}

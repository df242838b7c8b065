//! Local-command source.
//!
//! Runs a helper script and ingests its "Suggested actions" section as
//! posts. Each numbered `N. description` line becomes one post; the next
//! non-blank, non-numbered line below it is treated as the associated
//! command and appended to the text.

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use std::time::Duration;
use tokio::process::Command;

use crate::models::Post;
use crate::sources::Source;

pub const SOURCE_NAME: &str = "script";
pub const CHANNEL_NAME: &str = "actions";

const RUN_TIMEOUT: Duration = Duration::from_secs(30);

static ACTION_LINE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*(\d+)\.\s+(.+)$").unwrap());

/// Source over a local helper script's suggested actions.
pub struct ScriptSource {
    script_path: String,
}

impl ScriptSource {
    pub fn new(script_path: &str) -> Result<ScriptSource> {
        if script_path.trim().is_empty() {
            bail!("script: path is required");
        }
        Ok(ScriptSource {
            script_path: script_path.to_string(),
        })
    }
}

#[async_trait]
impl Source for ScriptSource {
    fn name(&self) -> &'static str {
        SOURCE_NAME
    }

    async fn fetch(&self, _since: DateTime<Utc>) -> Result<Vec<Post>> {
        let metadata = std::fs::metadata(&self.script_path)
            .with_context(|| format!("script: not found: {}", self.script_path))?;
        if metadata.is_dir() {
            bail!("script: {} is a directory, not a script", self.script_path);
        }

        let output = tokio::time::timeout(
            RUN_TIMEOUT,
            Command::new(&self.script_path).kill_on_drop(true).output(),
        )
        .await
        .map_err(|_| anyhow!("script: timed out after {}s", RUN_TIMEOUT.as_secs()))?
        .with_context(|| format!("script: run {}", self.script_path))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!("script: {} failed: {}", self.script_path, stderr.trim());
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let now = Utc::now();

        Ok(parse_actions(&stdout)
            .into_iter()
            .map(|action| {
                let text = match &action.command {
                    Some(command) => format!("{}\n\n{}", action.description, command),
                    None => action.description.clone(),
                };
                Post {
                    source: SOURCE_NAME.to_string(),
                    channel: CHANNEL_NAME.to_string(),
                    external_id: format!("action-{}", action.number),
                    text,
                    url: None,
                    posted_at: now,
                }
            })
            .collect())
    }
}

#[derive(Debug, PartialEq, Eq)]
pub(crate) struct Action {
    pub number: u32,
    pub description: String,
    pub command: Option<String>,
}

/// Extract numbered actions below a "Suggested actions" header.
pub(crate) fn parse_actions(output: &str) -> Vec<Action> {
    let lines: Vec<&str> = output.lines().collect();

    let Some(start) = lines
        .iter()
        .position(|line| line.trim().to_lowercase().contains("suggested actions"))
    else {
        return Vec::new();
    };

    let mut actions = Vec::new();
    for (i, line) in lines.iter().enumerate().skip(start + 1) {
        let Some(captures) = ACTION_LINE_RE.captures(line) else {
            continue;
        };

        let number: u32 = captures[1].parse().unwrap_or(0);
        let description = captures[2].trim().to_string();

        // The next non-blank line is the command, unless it starts the
        // following numbered action.
        let mut command = None;
        for next in &lines[i + 1..] {
            let trimmed = next.trim();
            if trimmed.is_empty() {
                continue;
            }
            if ACTION_LINE_RE.is_match(next) {
                break;
            }
            command = Some(trimmed.to_string());
            break;
        }

        actions.push(Action {
            number,
            description,
            command,
        });
    }

    actions
}

//! Digest assembly: window → score → summarize → annotate → limit → render.
//!
//! The assembler reads every post in the requested window, scores the ones
//! that have no stored score yet (persisting the result so repeated digests
//! reuse it), pairs each post with a summary, attaches also-in
//! attributions, applies the tier limits, and computes trends over the
//! retained set. Rendering is delegated to a [`crate::render::Formatter`].

use anyhow::{Context, Result};
use chrono::Utc;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use crate::config::{Config, TasteProfile};
use crate::models::{PostFilter, Score, StoredPost, Tier};
use crate::render;
use crate::scorer;
use crate::store::Store;
use crate::summarize::{HeuristicSummarizer, LlmSummarizer, Summarizer, Summary};
use crate::trending::{find_trending, Trend};

/// Trend computation threshold used by the digest.
const TREND_MIN_SOURCES: usize = 3;

/// One retained digest entry: a scored post with its summary and
/// cross-source attributions.
#[derive(Debug, Clone)]
pub struct DigestItem {
    pub post: StoredPost,
    pub score: Score,
    pub summary: Summary,
    /// `"source/channel"` pairs the same content also arrived under.
    pub also_in: Vec<String>,
}

/// Everything a formatter needs to render a digest.
#[derive(Debug, Clone)]
pub struct DigestInput {
    pub items: Vec<DigestItem>,
    pub trending: Vec<Trend>,
    /// Distinct channels in the window, before tier limits.
    pub channels: usize,
    /// Posts in the window, before tier limits.
    pub total_posts: usize,
    /// The window length itself.
    pub since: Duration,
}

/// Flags for the digest command.
#[derive(Debug, Default)]
pub struct DigestOptions {
    /// Override of the configured window, e.g. `"48h"`.
    pub since: Option<String>,
    /// `terminal` (default), `json`, or `markdown`.
    pub format: Option<String>,
    pub source: Option<String>,
    pub channel: Option<String>,
    pub color: bool,
    /// Write to this file instead of stdout (`-` means stdout).
    pub output: Option<PathBuf>,
    /// POST the JSON rendering to this URL as well.
    pub webhook: Option<String>,
}

/// Assemble the digest for the given window and filter.
pub async fn build_digest(
    config: &Config,
    profile: &TasteProfile,
    store: &Store,
    since: Duration,
    filter: &PostFilter,
) -> Result<DigestInput> {
    let since_time = Utc::now() - chrono::Duration::from_std(since).context("window too large")?;
    let mut posts = store.get_posts(since_time, None, filter).await?;

    // Score anything the scorer has not seen yet, persisting as we go.
    let now = Utc::now();
    for entry in &mut posts {
        if entry.score.is_some() {
            continue;
        }
        let eval = scorer::score(entry.post.effective_text(), profile);
        let score = Score {
            post_id: entry.post.id,
            score: eval.score,
            labels: eval.labels,
            tier: eval.tier,
            scored_at: now,
            explanation: eval.explanation,
        };
        store.save_score(&score).await.context("save score")?;
        entry.score = Some(score);
    }

    let heuristic = HeuristicSummarizer;
    let llm = build_llm_summarizer(config)?;

    let mut channels: std::collections::HashSet<&str> = std::collections::HashSet::new();
    let total_posts = posts.len();

    let post_ids: Vec<i64> = posts.iter().map(|p| p.post.id).collect();
    let mut also_in = store.get_also_in(&post_ids).await?;

    let mut items = Vec::with_capacity(posts.len());
    for entry in &posts {
        channels.insert(entry.post.channel.as_str());
        let score = entry.score.clone().expect("all posts scored above");

        // The LLM backend is reserved for read_now posts; everything else
        // stays heuristic.
        let summarizer: &dyn Summarizer = match &llm {
            Some(llm) if score.tier == Tier::ReadNow => llm,
            _ => &heuristic,
        };
        let summary = summarizer.summarize(entry.post.effective_text()).await;

        items.push(DigestItem {
            post: entry.post.clone(),
            score,
            summary,
            also_in: also_in.remove(&entry.post.id).unwrap_or_default(),
        });
    }

    // Tier limits: keep the top_n best read_now items and include_skims
    // skims; ignored items are retained only for the footer count.
    items.sort_by(|a, b| b.score.score.cmp(&a.score.score));
    let mut limited = Vec::with_capacity(items.len());
    let (mut read_now_count, mut skim_count) = (0usize, 0usize);
    for item in items {
        match item.score.tier {
            Tier::ReadNow => {
                if read_now_count < config.digest.top_n {
                    limited.push(item);
                    read_now_count += 1;
                }
            }
            Tier::Skim => {
                if skim_count < config.digest.include_skims {
                    limited.push(item);
                    skim_count += 1;
                }
            }
            Tier::Ignore => limited.push(item),
        }
    }

    let trending = find_trending(&limited, profile, TREND_MIN_SOURCES);

    Ok(DigestInput {
        items: limited,
        trending,
        channels: channels.len(),
        total_posts,
        since,
    })
}

fn build_llm_summarizer(config: &Config) -> Result<Option<LlmSummarizer>> {
    if config.summarize.mode != "llm" || config.summarize.llm.api_key.is_empty() {
        return Ok(None);
    }
    let llm = &config.summarize.llm;
    let max_tokens = if llm.max_tokens_per_post == 0 {
        200
    } else {
        llm.max_tokens_per_post
    };
    Ok(Some(LlmSummarizer::new(
        llm.api_key.clone(),
        llm.model.clone(),
        max_tokens,
    )?))
}

/// Run the digest command: assemble, render, and deliver.
pub async fn run_digest(
    config: &Config,
    profile: &TasteProfile,
    store: &Store,
    options: &DigestOptions,
) -> Result<()> {
    let since = match &options.since {
        Some(raw) => crate::config::parse_duration(raw).context("parse --since")?,
        None => config.digest.since_duration()?,
    };

    let filter = PostFilter {
        source: options.source.clone(),
        channel: options.channel.clone(),
    };

    let input = build_digest(config, profile, store, since, &filter).await?;

    let format = options.format.as_deref().unwrap_or("terminal");
    let formatter = render::formatter_for(format, options.color)?;

    match &options.output {
        Some(path) if path.as_os_str() != "-" => {
            if let Some(dir) = path.parent() {
                if !dir.as_os_str().is_empty() {
                    std::fs::create_dir_all(dir).context("create output dir")?;
                }
            }
            let mut file = std::fs::File::create(path)
                .with_context(|| format!("create output file: {}", path.display()))?;
            formatter.format(&mut file, &input)?;
        }
        _ => {
            let stdout = std::io::stdout();
            let mut handle = stdout.lock();
            formatter.format(&mut handle, &input)?;
            handle.flush().ok();
        }
    }

    // The webhook always receives JSON, whatever --format selected.
    if let Some(url) = &options.webhook {
        if let Err(err) = post_webhook(url, &input).await {
            eprintln!("warning: webhook failed: {err:#}");
        }
    }

    Ok(())
}

async fn post_webhook(url: &str, input: &DigestInput) -> Result<()> {
    let json = render::formatter_for("json", false)?;
    let mut body = Vec::new();
    json.format(&mut body, input).context("format json")?;

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()?;

    let response = client
        .post(url)
        .header("Content-Type", "application/json")
        .body(body)
        .send()
        .await
        .context("post")?;

    let status = response.status();
    if status.is_client_error() || status.is_server_error() {
        anyhow::bail!("HTTP {status}");
    }
    Ok(())
}

//! Ingestion engine: drive every configured source into the store.
//!
//! The pull pipeline is:
//!
//! 1. **Fetch** — each source in configuration order, with
//!    `since = now − retention window`. A source that fails is reported on
//!    stderr and skipped; the others still run.
//! 2. **Filter** — optional regex redaction, and snippet-only storage when
//!    privacy mode disables full text.
//! 3. **Upsert** — every post lands via the natural-key upsert with
//!    `fetched_at = now`. A store failure here is fatal to the pass;
//!    partial state is recovered by the idempotent re-ingest.
//! 4. **Dedup + prune** — collapse cross-source duplicates into also-in
//!    attributions, then drop posts older than the retention window.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashSet;

use crate::config::Config;
use crate::models::{first_n_chars, PostInput};
use crate::redact;
use crate::sources::build_sources;
use crate::store::{Store, SNIPPET_CHARS};

/// Totals from one pull pass.
#[derive(Debug, Default)]
pub struct IngestReport {
    /// Posts returned by all sources.
    pub fetched: usize,
    /// Posts upserted into the store.
    pub inserted: u64,
    /// Duplicates collapsed by the dedup pass.
    pub duplicates_removed: u64,
    /// Posts dropped by retention pruning.
    pub pruned: u64,
    /// Distinct channels seen across all sources.
    pub channels: usize,
}

/// Run one ingest pass over every configured source.
pub async fn run_pull(config: &Config, store: &Store) -> Result<IngestReport> {
    let sources = build_sources(config)?;

    let retain_days = config.storage.retain_days;
    let since: DateTime<Utc> = if retain_days > 0 {
        Utc::now() - Duration::days(retain_days)
    } else {
        DateTime::from_timestamp(0, 0).expect("epoch is representable")
    };

    let redact_patterns = if config.privacy.redact.enabled {
        redact::compile(&config.privacy.redact.patterns)?
    } else {
        Vec::new()
    };
    let store_full_text = config.privacy.store_full_text;

    let mut report = IngestReport::default();
    let mut channels: HashSet<String> = HashSet::new();

    for source in &sources {
        let posts = match source.fetch(since).await {
            Ok(posts) => posts,
            Err(err) => {
                eprintln!("warning: {}: {err:#}", source.name());
                continue;
            }
        };

        let now = Utc::now();
        report.fetched += posts.len();

        for post in posts {
            channels.insert(post.channel.clone());

            let mut text = post.text;
            if !redact_patterns.is_empty() {
                text = redact::apply(&text, &redact_patterns);
            }

            let (text, snippet) = if store_full_text {
                (text, String::new())
            } else {
                let snippet = first_n_chars(&text, SNIPPET_CHARS);
                (String::new(), snippet)
            };

            store
                .insert_post(PostInput {
                    source: post.source,
                    channel: post.channel,
                    external_id: post.external_id,
                    text,
                    snippet,
                    url: post.url,
                    posted_at: post.posted_at,
                    fetched_at: now,
                })
                .await
                .context("insert post")?;
            report.inserted += 1;
        }
    }

    report.duplicates_removed = store.deduplicate().await.context("deduplicate")?;
    report.pruned = store
        .prune_old(retain_days)
        .await
        .context("prune old posts")?;
    report.channels = channels.len();

    Ok(report)
}

/// Print the pull summary in the shape the CLI reports it.
pub fn print_report(report: &IngestReport) {
    print!(
        "Pulled {} posts from {} channels",
        report.inserted, report.channels
    );
    if report.duplicates_removed > 0 {
        print!(" ({} duplicates removed)", report.duplicates_removed);
    }
    if report.pruned > 0 {
        print!(" ({} pruned)", report.pruned);
    }
    println!();
}

//! Rescore workflow: wipe stored scores and re-evaluate the window with
//! the current taste profile.

use anyhow::{Context, Result};
use chrono::Utc;

use crate::config::{parse_duration, Config, TasteProfile};
use crate::models::{PostFilter, Score};
use crate::scorer;
use crate::store::Store;

pub async fn run_rescore(
    config: &Config,
    profile: &TasteProfile,
    store: &Store,
    since: Option<&str>,
) -> Result<()> {
    let deleted = store.delete_all_scores().await?;
    println!("Deleted {deleted} existing scores");

    let window = match since {
        Some(raw) => parse_duration(raw).context("parse --since")?,
        None => config.digest.since_duration()?,
    };
    let since_time = Utc::now() - chrono::Duration::from_std(window).context("window too large")?;

    let posts = store
        .get_posts(since_time, None, &PostFilter::default())
        .await?;

    let now = Utc::now();
    let mut rescored = 0u64;
    for entry in &posts {
        let eval = scorer::score(entry.post.effective_text(), profile);
        store
            .save_score(&Score {
                post_id: entry.post.id,
                score: eval.score,
                labels: eval.labels,
                tier: eval.tier,
                scored_at: now,
                explanation: eval.explanation,
            })
            .await
            .context("save score")?;
        rescored += 1;
    }

    println!("Rescored {rescored} posts");
    Ok(())
}

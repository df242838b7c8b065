//! Scoring breakdown for a single post.
//!
//! Prints the stored score with its per-contribution explanation, or
//! scores the post live against the current profile when no score has
//! been persisted yet.

use anyhow::{bail, Result};
use std::io::Write;

use crate::config::TasteProfile;
use crate::models::PostWithScore;
use crate::scorer;
use crate::store::Store;

pub async fn run_explain(store: &Store, profile: &TasteProfile, post_id: i64) -> Result<()> {
    let Some(entry) = store.get_post(post_id).await? else {
        bail!("post {post_id} not found");
    };

    let stdout = std::io::stdout();
    let mut w = stdout.lock();
    print_explanation(&mut w, &entry, profile)?;
    Ok(())
}

fn print_explanation(
    w: &mut dyn Write,
    entry: &PostWithScore,
    profile: &TasteProfile,
) -> Result<()> {
    let post = &entry.post;
    writeln!(w, "Post #{}", post.id)?;
    writeln!(w, "  Source:  {}/{}", post.source, post.channel)?;
    writeln!(w, "  Snippet: {}", post.snippet)?;
    if let Some(url) = &post.url {
        writeln!(w, "  URL:     {url}")?;
    }
    writeln!(w)?;

    match &entry.score {
        Some(score) => {
            writeln!(w, "Score: {}  Tier: {}", score.score, score.tier)?;
            if !score.labels.is_empty() {
                writeln!(w, "Labels: {}", score.labels.join(", "))?;
            }
            writeln!(w)?;
            if !score.explanation.is_empty() {
                writeln!(w, "Breakdown:")?;
                for c in &score.explanation {
                    writeln!(w, "  {:+}  {}", c.points, c.reason)?;
                }
            }
        }
        None => {
            let eval = scorer::score(post.effective_text(), profile);
            writeln!(w, "Score: {}  Tier: {}  (not saved)", eval.score, eval.tier)?;
            if !eval.labels.is_empty() {
                writeln!(w, "Labels: {}", eval.labels.join(", "))?;
            }
            writeln!(w)?;
            writeln!(w, "Breakdown:")?;
            for c in &eval.explanation {
                writeln!(w, "  {:+}  {}", c.points, c.reason)?;
            }
        }
    }

    Ok(())
}

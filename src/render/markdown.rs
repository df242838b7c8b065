//! Markdown digest formatter.

use anyhow::Result;
use std::io::Write;

use super::{format_duration, group_by_tier, headline, Formatter};
use crate::digest::{DigestInput, DigestItem};

pub struct MarkdownFormatter;

impl Formatter for MarkdownFormatter {
    fn format(&self, w: &mut dyn Write, input: &DigestInput) -> Result<()> {
        let (read_now, skims, ignored) = group_by_tier(&input.items);

        writeln!(w, "# sift digest")?;
        writeln!(w)?;
        writeln!(
            w,
            "{} channels, {} posts, since {}",
            input.channels,
            input.total_posts,
            format_duration(input.since)
        )?;
        writeln!(w)?;

        if read_now.is_empty() && skims.is_empty() && ignored == 0 {
            writeln!(w, "No posts found.")?;
            return Ok(());
        }

        if !input.trending.is_empty() {
            writeln!(w, "## Trending (appeared in 3+ sources)")?;
            writeln!(w)?;
            for trend in &input.trending {
                writeln!(
                    w,
                    "- **\"{}\"** — mentioned in {} channels: {}",
                    trend.keyword,
                    trend.channels.len(),
                    trend.channels.join(", ")
                )?;
            }
            writeln!(w)?;
        }

        if !read_now.is_empty() {
            writeln!(w, "## Read Now ({})", read_now.len())?;
            writeln!(w)?;
            for item in &read_now {
                write_read_now_item(w, item)?;
            }
        }

        if !skims.is_empty() {
            writeln!(w, "## Skim ({})", skims.len())?;
            writeln!(w)?;
            for item in &skims {
                write_skim_item(w, item)?;
            }
            writeln!(w)?;
        }

        if ignored > 0 {
            writeln!(w, "*Ignored: {ignored} posts*")?;
        }

        Ok(())
    }
}

fn write_read_now_item(w: &mut dyn Write, item: &DigestItem) -> Result<()> {
    writeln!(
        w,
        "### [{}] {} — {}",
        item.score.score,
        item.post.channel,
        headline(item)
    )?;
    writeln!(w)?;

    if !item.score.labels.is_empty() {
        let labels: Vec<String> = item
            .score
            .labels
            .iter()
            .map(|l| format!("`{l}`"))
            .collect();
        writeln!(w, "Labels: {}", labels.join(" "))?;
        writeln!(w)?;
    }

    for bullet in item.summary.bullets.iter().skip(1) {
        writeln!(w, "- {bullet}")?;
    }
    if item.summary.bullets.len() > 1 {
        writeln!(w)?;
    }

    if !item.also_in.is_empty() {
        writeln!(w, "Also in: {}", item.also_in.join(", "))?;
        writeln!(w)?;
    }

    if let Some(url) = &item.post.url {
        writeln!(w, "[Link]({url})")?;
        writeln!(w)?;
    }

    Ok(())
}

fn write_skim_item(w: &mut dyn Write, item: &DigestItem) -> Result<()> {
    write!(
        w,
        "- **[{}]** {} — {}",
        item.score.score,
        item.post.channel,
        headline(item)
    )?;
    if !item.also_in.is_empty() {
        write!(w, " _(also in: {})_", item.also_in.join(", "))?;
    }
    writeln!(w)?;
    Ok(())
}

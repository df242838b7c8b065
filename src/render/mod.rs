//! Digest rendering into the three interchangeable output formats.
//!
//! | Format | Module | Audience |
//! |--------|--------|----------|
//! | `terminal` | [`terminal`] | humans, optional ANSI styling |
//! | `json` | [`json`] | automation, stable field order |
//! | `markdown` | [`markdown`] | notes, chat, static sites |
//!
//! Every formatter receives the same [`DigestInput`](crate::digest::DigestInput)
//! and must render deterministically: same input, same bytes.

pub mod json;
pub mod markdown;
pub mod terminal;

use anyhow::{bail, Result};
use std::io::Write;
use std::time::Duration;

use crate::digest::{DigestInput, DigestItem};
use crate::models::Tier;

/// Writes a rendered digest to `w`.
pub trait Formatter {
    fn format(&self, w: &mut dyn Write, input: &DigestInput) -> Result<()>;
}

/// Resolve a formatter by name. `color` only affects the terminal format.
pub fn formatter_for(name: &str, color: bool) -> Result<Box<dyn Formatter>> {
    match name {
        "terminal" | "" => Ok(Box::new(terminal::TerminalFormatter::new(color))),
        "json" => Ok(Box::new(json::JsonFormatter)),
        "markdown" | "md" => Ok(Box::new(markdown::MarkdownFormatter)),
        other => bail!("unknown format {other:?} (want terminal, json, or markdown)"),
    }
}

/// Split items into the read-now list, the skim list, and the ignored
/// count.
pub(crate) fn group_by_tier(items: &[DigestItem]) -> (Vec<&DigestItem>, Vec<&DigestItem>, usize) {
    let mut read_now = Vec::new();
    let mut skims = Vec::new();
    let mut ignored = 0usize;

    for item in items {
        match item.score.tier {
            Tier::ReadNow => read_now.push(item),
            Tier::Skim => skims.push(item),
            Tier::Ignore => ignored += 1,
        }
    }

    (read_now, skims, ignored)
}

/// `"<H>h"` for sub-day windows and ragged hour counts, `"<D>d"` for whole
/// day multiples.
pub(crate) fn format_duration(duration: Duration) -> String {
    let hours = duration.as_secs() / 3600;
    if hours >= 24 && hours % 24 == 0 {
        format!("{}d", hours / 24)
    } else {
        format!("{hours}h")
    }
}

/// First bullet of an item's summary, or empty.
pub(crate) fn headline(item: &DigestItem) -> &str {
    item.summary.bullets.first().map(String::as_str).unwrap_or("")
}

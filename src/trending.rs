//! Cross-channel trend detection.
//!
//! A trend is a profile keyword (or a shared URL) that appears in at least
//! `min_sources` distinct channels among the read_now/skim posts of a
//! digest. Only keywords the profile already cares about are considered:
//! the high-signal weights plus every rule's `contains_any` keywords.

use std::collections::{BTreeSet, HashMap};

use crate::config::TasteProfile;
use crate::digest::DigestItem;
use crate::models::Tier;

/// A keyword or URL seen across multiple channels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trend {
    /// The keyword (or URL) that trended.
    pub keyword: String,
    /// Distinct channel names, sorted.
    pub channels: Vec<String>,
}

/// Detect keywords and URLs spanning at least `min_sources` distinct
/// channels. Values below 2 are clamped to 2; keywords take precedence
/// over URLs when both share the same string.
pub fn find_trending(items: &[DigestItem], profile: &TasteProfile, min_sources: usize) -> Vec<Trend> {
    let min_sources = min_sources.max(2);

    let keywords = collect_keywords(profile);
    if keywords.is_empty() {
        return Vec::new();
    }

    let mut keyword_channels: HashMap<&str, BTreeSet<&str>> = HashMap::new();
    let mut url_channels: HashMap<&str, BTreeSet<&str>> = HashMap::new();

    for item in items {
        if item.score.tier != Tier::ReadNow && item.score.tier != Tier::Skim {
            continue;
        }
        let text_lower = item.post.effective_text().to_lowercase();

        for keyword in &keywords {
            if text_lower.contains(&keyword.to_lowercase()) {
                keyword_channels
                    .entry(keyword.as_str())
                    .or_default()
                    .insert(&item.post.channel);
            }
        }

        if let Some(url) = &item.post.url {
            if !url.is_empty() {
                url_channels.entry(url).or_default().insert(&item.post.channel);
            }
        }
    }

    let mut trends = Vec::new();
    let mut emitted: BTreeSet<&str> = BTreeSet::new();

    for (keyword, channels) in &keyword_channels {
        if channels.len() < min_sources {
            continue;
        }
        trends.push(Trend {
            keyword: keyword.to_string(),
            channels: channels.iter().map(|c| c.to_string()).collect(),
        });
        emitted.insert(*keyword);
    }

    for (url, channels) in &url_channels {
        if channels.len() < min_sources || emitted.contains(url) {
            continue;
        }
        trends.push(Trend {
            keyword: url.to_string(),
            channels: channels.iter().map(|c| c.to_string()).collect(),
        });
    }

    trends.sort_by(|a, b| {
        b.channels
            .len()
            .cmp(&a.channels.len())
            .then_with(|| a.keyword.cmp(&b.keyword))
    });

    trends
}

/// Candidate keywords: high-signal weights plus rule keywords,
/// case-insensitively unique, first spelling wins.
fn collect_keywords(profile: &TasteProfile) -> Vec<String> {
    let mut seen: BTreeSet<String> = BTreeSet::new();
    let mut keywords = Vec::new();

    for keyword in profile.weights.high_signal.keys() {
        if seen.insert(keyword.to_lowercase()) {
            keywords.push(keyword.clone());
        }
    }

    for rule in &profile.rules {
        for keyword in &rule.condition.contains_any {
            if seen.insert(keyword.to_lowercase()) {
                keywords.push(keyword.clone());
            }
        }
    }

    keywords
}

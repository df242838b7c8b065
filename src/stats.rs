//! Channel and scoring analytics.
//!
//! Summarizes how each channel has scored inside a window: a
//! signal-to-noise table sorted by signal percentage, the overall tier
//! distribution, and a callout of stale channels. Channels need ~30 days
//! of data before their numbers are trustworthy, so young ones are
//! annotated inline. Used by `sift stats` to decide which channels earn
//! their keep.

use anyhow::{bail, Context, Result};
use chrono::{Duration as ChronoDuration, Utc};
use serde::Serialize;
use std::io::Write;
use std::time::Duration;

use crate::config::parse_duration;
use crate::models::ChannelStats;
use crate::store::Store;

const STALE_DAYS: i64 = 7;
const MATURITY_DAYS: i64 = 30;
const MAX_CHANNEL_WIDTH: usize = 40;

/// Run the stats command over the given window.
pub async fn run_stats(store: &Store, since: &str, format: &str) -> Result<()> {
    let window = parse_duration(since).context("parse --since")?;
    let since_time = Utc::now() - ChronoDuration::from_std(window).context("window too large")?;

    let stats = store.get_channel_stats(since_time).await?;

    let stdout = std::io::stdout();
    let mut w = stdout.lock();

    if stats.is_empty() {
        match format {
            "json" => writeln!(w, r#"{{"channels":[],"distribution":{{}}}}"#)?,
            _ => writeln!(w, "No posts found. Run 'sift pull' first.")?,
        }
        return Ok(());
    }

    match format {
        "json" => print_stats_json(&mut w, &stats),
        "terminal" | "" => print_stats(&mut w, &stats, window),
        other => bail!("unknown format {other:?} (want terminal or json)"),
    }
}

#[derive(Serialize)]
struct JsonStats {
    channels: Vec<JsonChannel>,
    distribution: JsonDistribution,
}

#[derive(Serialize)]
struct JsonChannel {
    source: String,
    channel: String,
    total: i64,
    read_now: i64,
    skim: i64,
    ignored: i64,
    signal_pct: f64,
    data_days: i64,
}

#[derive(Serialize, Default)]
struct JsonDistribution {
    read_now: i64,
    skim: i64,
    ignored: i64,
    total: i64,
}

fn print_stats_json(w: &mut dyn Write, stats: &[ChannelStats]) -> Result<()> {
    let now = Utc::now();
    let mut distribution = JsonDistribution::default();
    let mut channels = Vec::with_capacity(stats.len());

    for cs in stats {
        distribution.read_now += cs.read_now;
        distribution.skim += cs.skim;
        distribution.ignored += cs.ignored;
        distribution.total += cs.total;

        channels.push(JsonChannel {
            source: cs.source.clone(),
            channel: cs.channel.clone(),
            total: cs.total,
            read_now: cs.read_now,
            skim: cs.skim,
            ignored: cs.ignored,
            signal_pct: signal_pct(cs),
            data_days: data_days(cs, now),
        });
    }

    serde_json::to_writer_pretty(&mut *w, &JsonStats {
        channels,
        distribution,
    })?;
    writeln!(w)?;
    Ok(())
}

fn print_stats(w: &mut dyn Write, stats: &[ChannelStats], window: Duration) -> Result<()> {
    let now = Utc::now();

    let total_posts: i64 = stats.iter().map(|cs| cs.total).sum();
    let total_read_now: i64 = stats.iter().map(|cs| cs.read_now).sum();
    let total_skim: i64 = stats.iter().map(|cs| cs.skim).sum();
    let total_ignored: i64 = stats.iter().map(|cs| cs.ignored).sum();

    writeln!(
        w,
        "sift stats — {}, {} posts from {} channels",
        format_stats_duration(window),
        total_posts,
        stats.len()
    )?;
    writeln!(w)?;

    // Signal-to-noise by channel, best channels first.
    let mut sorted: Vec<&ChannelStats> = stats.iter().collect();
    sorted.sort_by(|a, b| {
        signal_pct(b)
            .partial_cmp(&signal_pct(a))
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    writeln!(w, "--- Signal-to-Noise by Channel ---")?;
    writeln!(w)?;

    let mut max_chan = "Channel".len();
    for cs in &sorted {
        max_chan = max_chan.max(cs.channel.chars().count());
    }
    max_chan = max_chan.min(MAX_CHANNEL_WIDTH);

    writeln!(
        w,
        "  {:<max_chan$}  {:>5}  {:>8}  {:>4}  {:>7}  {:>6}",
        "Channel", "Posts", "Read Now", "Skim", "Ignored", "Signal"
    )?;
    for cs in &sorted {
        let mut name = cs.channel.clone();
        if name.chars().count() > max_chan {
            name = name.chars().take(max_chan - 1).collect();
            name.push('…');
        }

        let mut signal = format!("{:5.0}%", signal_pct(cs));
        let age = data_days(cs, now);
        if age < MATURITY_DAYS {
            signal = format!("{:5.0}% ({}d data)", signal_pct(cs), age);
        }

        writeln!(
            w,
            "  {:<max_chan$}  {:>5}  {:>8}  {:>4}  {:>7}  {}",
            name, cs.total, cs.read_now, cs.skim, cs.ignored, signal
        )?;
    }
    writeln!(w)?;

    writeln!(w, "--- Scoring Distribution ---")?;
    writeln!(w)?;
    writeln!(
        w,
        "  Read Now:  {:>5}  ({:.1}%)",
        total_read_now,
        pct(total_read_now, total_posts)
    )?;
    writeln!(
        w,
        "  Skim:      {:>5}  ({:.1}%)",
        total_skim,
        pct(total_skim, total_posts)
    )?;
    writeln!(
        w,
        "  Ignored:   {:>5}  ({:.1}%)",
        total_ignored,
        pct(total_ignored, total_posts)
    )?;
    writeln!(w)?;

    let stale_threshold = now - ChronoDuration::days(STALE_DAYS);
    let stale: Vec<&ChannelStats> = stats
        .iter()
        .filter(|cs| cs.last_seen < stale_threshold)
        .collect();
    if !stale.is_empty() {
        writeln!(w, "--- Stale Channels (no posts in {STALE_DAYS}+ days) ---")?;
        writeln!(w)?;
        for cs in &stale {
            let days_ago = (now - cs.last_seen).num_days();
            writeln!(w, "  {} — last post {} days ago", cs.channel, days_ago)?;
        }
        writeln!(w)?;
    }

    Ok(())
}

fn signal_pct(cs: &ChannelStats) -> f64 {
    if cs.total == 0 {
        return 0.0;
    }
    ((cs.read_now + cs.skim) as f64 / cs.total as f64) * 100.0
}

fn pct(n: i64, total: i64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (n as f64 / total as f64) * 100.0
}

fn data_days(cs: &ChannelStats, now: chrono::DateTime<Utc>) -> i64 {
    (now - cs.first_seen).num_days().max(1)
}

/// `"N days"` for whole-day windows, `"Nh"` otherwise.
fn format_stats_duration(duration: Duration) -> String {
    let hours = duration.as_secs() / 3600;
    if hours >= 24 && hours % 24 == 0 {
        format!("{} days", hours / 24)
    } else {
        format!("{hours}h")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channel_stats(
        channel: &str,
        total: i64,
        read_now: i64,
        skim: i64,
        age_days: i64,
        last_seen_days_ago: i64,
    ) -> ChannelStats {
        let now = Utc::now();
        ChannelStats {
            source: "rss".to_string(),
            channel: channel.to_string(),
            total,
            read_now,
            skim,
            ignored: total - read_now - skim,
            first_seen: now - ChronoDuration::days(age_days),
            last_seen: now - ChronoDuration::days(last_seen_days_ago),
        }
    }

    #[test]
    fn signal_percentage() {
        assert_eq!(signal_pct(&channel_stats("a", 10, 2, 3, 40, 0)), 50.0);
        assert_eq!(signal_pct(&channel_stats("a", 0, 0, 0, 40, 0)), 0.0);
    }

    #[test]
    fn channels_sorted_by_signal_descending() {
        let stats = vec![
            channel_stats("mostly-noise", 10, 0, 1, 40, 0),
            channel_stats("all-signal", 10, 5, 5, 40, 0),
        ];

        let mut buffer = Vec::new();
        print_stats(&mut buffer, &stats, Duration::from_secs(30 * 86400)).unwrap();
        let out = String::from_utf8(buffer).unwrap();

        assert!(out.contains("--- Signal-to-Noise by Channel ---"));
        let signal_pos = out.find("all-signal").unwrap();
        let noise_pos = out.find("mostly-noise").unwrap();
        assert!(signal_pos < noise_pos, "expected best channel first:\n{out}");
    }

    #[test]
    fn distribution_section_shows_percentages() {
        let stats = vec![channel_stats("feedA", 10, 2, 3, 40, 0)];

        let mut buffer = Vec::new();
        print_stats(&mut buffer, &stats, Duration::from_secs(30 * 86400)).unwrap();
        let out = String::from_utf8(buffer).unwrap();

        assert!(out.contains("sift stats — 30 days, 10 posts from 1 channels"));
        assert!(out.contains("--- Scoring Distribution ---"));
        assert!(out.contains("Read Now:") && out.contains("(20.0%)"));
        assert!(out.contains("Skim:") && out.contains("(30.0%)"));
        assert!(out.contains("Ignored:") && out.contains("(50.0%)"));
    }

    #[test]
    fn young_channels_annotated_inline() {
        let stats = vec![channel_stats("fresh", 4, 1, 1, 5, 0)];

        let mut buffer = Vec::new();
        print_stats(&mut buffer, &stats, Duration::from_secs(30 * 86400)).unwrap();
        let out = String::from_utf8(buffer).unwrap();

        assert!(out.contains("(5d data)"), "got: {out}");
        assert!(!out.contains("Stale Channels"));
    }

    #[test]
    fn stale_channels_get_their_own_section() {
        let stats = vec![
            channel_stats("lively", 10, 2, 3, 40, 0),
            channel_stats("dormant", 3, 0, 0, 40, 12),
        ];

        let mut buffer = Vec::new();
        print_stats(&mut buffer, &stats, Duration::from_secs(30 * 86400)).unwrap();
        let out = String::from_utf8(buffer).unwrap();

        assert!(out.contains("--- Stale Channels (no posts in 7+ days) ---"));
        assert!(out.contains("dormant — last post 12 days ago"));
        assert!(!out.contains("lively — last post"));
    }

    #[test]
    fn long_channel_names_truncated_with_ellipsis() {
        let long_name = "c".repeat(60);
        let stats = vec![channel_stats(&long_name, 5, 1, 1, 40, 0)];

        let mut buffer = Vec::new();
        print_stats(&mut buffer, &stats, Duration::from_secs(30 * 86400)).unwrap();
        let out = String::from_utf8(buffer).unwrap();

        assert!(out.contains('…'));
        assert!(!out.contains(&long_name));
    }

    #[test]
    fn json_output_contains_distribution() {
        let mut buffer = Vec::new();
        print_stats_json(&mut buffer, &[channel_stats("feedA", 10, 2, 3, 40, 0)]).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&buffer).unwrap();

        assert_eq!(value["channels"][0]["signal_pct"], 50.0);
        assert_eq!(value["distribution"]["total"], 10);
    }
}

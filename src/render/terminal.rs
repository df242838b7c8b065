//! Terminal digest formatter with optional ANSI styling.

use anyhow::Result;
use std::io::Write;

use super::{format_duration, group_by_tier, headline, Formatter};
use crate::digest::{DigestInput, DigestItem};

pub struct TerminalFormatter {
    color: bool,
}

impl TerminalFormatter {
    pub fn new(color: bool) -> TerminalFormatter {
        TerminalFormatter { color }
    }
}

impl Formatter for TerminalFormatter {
    fn format(&self, w: &mut dyn Write, input: &DigestInput) -> Result<()> {
        let (read_now, skims, ignored) = group_by_tier(&input.items);

        let header = format!(
            "sift — {} channels, {} posts, since {}",
            input.channels,
            input.total_posts,
            format_duration(input.since)
        );
        writeln!(w, "{}", self.bold(&header))?;
        writeln!(w)?;

        if read_now.is_empty() && skims.is_empty() && ignored == 0 {
            writeln!(w, "No posts found.")?;
            return Ok(());
        }

        if !input.trending.is_empty() {
            writeln!(
                w,
                "{}",
                self.bold("--- Trending (appeared in 3+ sources) ---")
            )?;
            writeln!(w)?;
            for trend in &input.trending {
                writeln!(
                    w,
                    "  {} — mentioned in {} channels",
                    self.bold(&format!("\"{}\"", trend.keyword)),
                    trend.channels.len()
                )?;
                writeln!(w, "    {}", self.dim(&trend.channels.join(", ")))?;
            }
            writeln!(w)?;
        }

        if !read_now.is_empty() {
            let title = format!("--- Read Now ({}) ---", read_now.len());
            writeln!(w, "{}", self.green(&self.bold(&title)))?;
            writeln!(w)?;
            for item in &read_now {
                self.write_read_now_item(w, item)?;
            }
        }

        if !skims.is_empty() {
            let title = format!("--- Skim ({}) ---", skims.len());
            writeln!(w, "{}", self.yellow(&self.bold(&title)))?;
            writeln!(w)?;
            for item in &skims {
                self.write_skim_item(w, item)?;
            }
            writeln!(w)?;
        }

        if ignored > 0 {
            writeln!(
                w,
                "{}",
                self.dim(&format!("Ignored: {ignored} posts (noise suppressed)"))
            )?;
        }

        Ok(())
    }
}

impl TerminalFormatter {
    fn write_read_now_item(&self, w: &mut dyn Write, item: &DigestItem) -> Result<()> {
        let labels = if item.score.labels.is_empty() {
            String::new()
        } else {
            format!(" [{}]", item.score.labels.join(", "))
        };

        writeln!(
            w,
            "  {}{} {} — {}",
            self.bold(&format!("[{}]", item.score.score)),
            self.dim(&labels),
            item.post.channel,
            headline(item)
        )?;

        for bullet in item.summary.bullets.iter().skip(1) {
            writeln!(w, "      {}", self.dim(bullet))?;
        }
        if let Some(url) = &item.post.url {
            writeln!(w, "      {}", self.dim(url))?;
        }
        if !item.also_in.is_empty() {
            let line = format!("also in: {}", item.also_in.join(", "));
            writeln!(w, "      {}", self.dim(&line))?;
        }
        writeln!(w)?;
        Ok(())
    }

    fn write_skim_item(&self, w: &mut dyn Write, item: &DigestItem) -> Result<()> {
        writeln!(
            w,
            "  [{}] {} — {}",
            item.score.score,
            item.post.channel,
            headline(item)
        )?;
        if let Some(url) = &item.post.url {
            writeln!(w, "      {}", self.dim(url))?;
        }
        if !item.also_in.is_empty() {
            let line = format!("also in: {}", item.also_in.join(", "));
            writeln!(w, "      {}", self.dim(&line))?;
        }
        Ok(())
    }

    // ANSI helpers, no-ops when color is off.

    fn bold(&self, s: &str) -> String {
        self.wrap(s, "\x1b[1m")
    }

    fn green(&self, s: &str) -> String {
        self.wrap(s, "\x1b[32m")
    }

    fn yellow(&self, s: &str) -> String {
        self.wrap(s, "\x1b[33m")
    }

    fn dim(&self, s: &str) -> String {
        if s.is_empty() {
            return String::new();
        }
        self.wrap(s, "\x1b[2m")
    }

    fn wrap(&self, s: &str, code: &str) -> String {
        if !self.color {
            return s.to_string();
        }
        format!("{code}{s}\x1b[0m")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Score, StoredPost, Tier};
    use crate::summarize::Summary;
    use crate::trending::Trend;
    use chrono::Utc;
    use std::time::Duration;

    fn item(channel: &str, score: i64, tier: Tier, bullets: &[&str]) -> DigestItem {
        let now = Utc::now();
        DigestItem {
            post: StoredPost {
                id: 1,
                source: "script".to_string(),
                channel: channel.to_string(),
                external_id: "action-1".to_string(),
                text: Some("text".to_string()),
                snippet: "text".to_string(),
                text_hash: String::new(),
                url: None,
                posted_at: now,
                fetched_at: now,
            },
            score: Score {
                post_id: 1,
                score,
                labels: vec!["ops".to_string()],
                tier,
                scored_at: now,
                explanation: Vec::new(),
            },
            summary: Summary {
                bullets: bullets.iter().map(|b| b.to_string()).collect(),
                links: Vec::new(),
                cves: Vec::new(),
            },
            also_in: Vec::new(),
        }
    }

    fn render(input: &DigestInput) -> String {
        let mut buffer = Vec::new();
        TerminalFormatter::new(false)
            .format(&mut buffer, input)
            .unwrap();
        String::from_utf8(buffer).unwrap()
    }

    #[test]
    fn groups_tiers_with_counts_and_footer() {
        let input = DigestInput {
            items: vec![
                item("actions", 10, Tier::ReadNow, &["urgent fix", "second bullet"]),
                item("actions", 3, Tier::Skim, &["worth a look"]),
                item("actions", -4, Tier::Ignore, &["noise"]),
            ],
            trending: Vec::new(),
            channels: 1,
            total_posts: 3,
            since: Duration::from_secs(24 * 3600),
        };

        let out = render(&input);
        assert!(out.contains("sift — 1 channels, 3 posts, since 1d"));
        assert!(out.contains("Read Now (1)"));
        assert!(out.contains("Skim (1)"));
        assert!(out.contains("Ignored: 1 posts (noise suppressed)"));
        assert!(out.contains("urgent fix"));
        assert!(out.contains("second bullet"));
        assert!(out.contains("[ops]"));
    }

    #[test]
    fn empty_digest_prints_no_posts() {
        let input = DigestInput {
            items: Vec::new(),
            trending: Vec::new(),
            channels: 0,
            total_posts: 0,
            since: Duration::from_secs(3600),
        };
        let out = render(&input);
        assert!(out.contains("sift — 0 channels, 0 posts, since 1h"));
        assert!(out.contains("No posts found."));
    }

    #[test]
    fn trending_section_lists_channels() {
        let input = DigestInput {
            items: vec![item("a", 8, Tier::ReadNow, &["headline"])],
            trending: vec![Trend {
                keyword: "cve".to_string(),
                channels: vec!["a".to_string(), "b".to_string(), "c".to_string()],
            }],
            channels: 3,
            total_posts: 3,
            since: Duration::from_secs(3600),
        };
        let out = render(&input);
        assert!(out.contains("Trending (appeared in 3+ sources)"));
        assert!(out.contains("\"cve\" — mentioned in 3 channels"));
        assert!(out.contains("a, b, c"));
    }

    #[test]
    fn color_wraps_with_ansi_codes() {
        let formatter = TerminalFormatter::new(true);
        assert_eq!(formatter.bold("x"), "\x1b[1mx\x1b[0m");
        let plain = TerminalFormatter::new(false);
        assert_eq!(plain.bold("x"), "x");
    }
}

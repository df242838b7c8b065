//! # sift CLI
//!
//! The `sift` binary is the interface to the digest pipeline. All
//! commands read the config directory given by `--config` (default
//! `.sift`), which holds `config.yaml` and `taste.yaml`.
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `sift init` | Create the config directory with example files |
//! | `sift pull` | Fetch posts from all configured sources |
//! | `sift digest` | Score, summarize, and display posts |
//! | `sift run` | Pull then digest, once or on an interval |
//! | `sift rescore` | Recompute all scores with the current profile |
//! | `sift stats` | Per-channel signal analytics |
//! | `sift explain <id>` | Scoring breakdown for one post |
//! | `sift import <file>` | Merge OPML feeds into the config |
//! | `sift verify` | Check read_now URLs with the external scanner |
//!
//! ## Examples
//!
//! ```bash
//! sift init
//! sift pull
//! sift digest --since 48h --format markdown
//! sift run --every 30m --no-color
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

use sift::config::{Config, TasteProfile, TASTE_FILE};
use sift::digest::DigestOptions;
use sift::store::Store;

/// sift — extract signal from noisy information streams.
#[derive(Parser)]
#[command(
    name = "sift",
    about = "Extract signal from noisy information streams",
    version,
    long_about = "sift reads chat channels, RSS feeds, forum listings, and local scripts, \
    scores posts against your taste profile, and produces a concise three-tier digest."
)]
struct Cli {
    /// Config directory holding config.yaml and taste.yaml.
    #[arg(long, global = true, default_value = ".sift")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the config directory with example files.
    ///
    /// Never overwrites files that already exist.
    Init,

    /// Fetch posts from all configured sources.
    ///
    /// Runs deduplication and retention pruning after the sources drain.
    Pull,

    /// Score, summarize, and display posts.
    Digest {
        /// Time window (e.g. 48h, 7d). Defaults to digest.since.
        #[arg(long)]
        since: Option<String>,

        /// Output format: terminal, json, or markdown.
        #[arg(long)]
        format: Option<String>,

        /// Filter by source (e.g. rss, chat, reddit).
        #[arg(long)]
        source: Option<String>,

        /// Filter by channel name.
        #[arg(long)]
        channel: Option<String>,

        /// Disable ANSI colors.
        #[arg(long)]
        no_color: bool,

        /// Write the digest to a file (- for stdout).
        #[arg(long)]
        output: Option<PathBuf>,

        /// POST the digest JSON to this URL as well.
        #[arg(long)]
        webhook: Option<String>,
    },

    /// Pull posts then display the digest, once or continuously.
    Run {
        /// Repeat at this interval (e.g. 30m). Omit for one-shot.
        #[arg(long)]
        every: Option<String>,

        /// Time window (e.g. 48h, 7d). Defaults to digest.since.
        #[arg(long)]
        since: Option<String>,

        /// Output format: terminal, json, or markdown.
        #[arg(long)]
        format: Option<String>,

        /// Filter by source.
        #[arg(long)]
        source: Option<String>,

        /// Filter by channel name.
        #[arg(long)]
        channel: Option<String>,

        /// Disable ANSI colors.
        #[arg(long)]
        no_color: bool,

        /// Write the digest to a file (- for stdout).
        #[arg(long)]
        output: Option<PathBuf>,

        /// POST the digest JSON to this URL as well.
        #[arg(long)]
        webhook: Option<String>,
    },

    /// Recompute scores for all posts using the current taste profile.
    Rescore {
        /// Time window (e.g. 7d, 48h). Defaults to digest.since.
        #[arg(long)]
        since: Option<String>,
    },

    /// Show per-channel signal analytics.
    Stats {
        /// Time window (e.g. 7d, 48h).
        #[arg(long, default_value = "30d")]
        since: String,

        /// Output format: terminal or json.
        #[arg(long, default_value = "terminal")]
        format: String,
    },

    /// Show the scoring breakdown for a post.
    Explain {
        /// Post id as shown in the store.
        post_id: i64,
    },

    /// Import RSS feeds from an OPML file.
    Import {
        /// Path to the OPML file.
        file: PathBuf,

        /// Show what would be added without modifying the config.
        #[arg(long)]
        dry_run: bool,
    },

    /// Verify read_now URLs with the external scanner.
    Verify {
        /// Time window (e.g. 48h). Defaults to digest.since.
        #[arg(long)]
        since: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Commands that work without a loadable config.
    match &cli.command {
        Commands::Init => {
            sift::scaffold::run_init(&cli.config)?;
            return Ok(());
        }
        Commands::Import { file, dry_run } => {
            sift::import_opml::run_import(&cli.config, file, *dry_run)?;
            return Ok(());
        }
        _ => {}
    }

    let config = Config::load(&cli.config)?;

    match cli.command {
        Commands::Pull => {
            let store = Store::open(&config.storage.path).await?;
            let report = sift::ingest::run_pull(&config, &store).await?;
            sift::ingest::print_report(&report);
            store.close().await;
        }
        Commands::Digest {
            since,
            format,
            source,
            channel,
            no_color,
            output,
            webhook,
        } => {
            let profile = TasteProfile::load(&cli.config.join(TASTE_FILE))?;
            let store = Store::open(&config.storage.path).await?;
            let options = DigestOptions {
                since,
                format,
                source,
                channel,
                color: use_color(no_color),
                output,
                webhook,
            };
            sift::digest::run_digest(&config, &profile, &store, &options).await?;
            store.close().await;
        }
        Commands::Run {
            every,
            since,
            format,
            source,
            channel,
            no_color,
            output,
            webhook,
        } => {
            let profile = TasteProfile::load(&cli.config.join(TASTE_FILE))?;
            let store = Store::open(&config.storage.path).await?;
            let options = DigestOptions {
                since,
                format,
                source,
                channel,
                color: use_color(no_color),
                output,
                webhook,
            };

            let interval = sift::run::parse_every(every.as_deref().unwrap_or(""))?;
            match interval {
                None => {
                    sift::run::run_once(&config, &profile, &store, &options).await?;
                }
                Some(interval) => {
                    let token = CancellationToken::new();
                    sift::run::cancel_on_signals(token.clone());
                    sift::run::run_watch(interval, token, || {
                        sift::run::run_once(&config, &profile, &store, &options)
                    })
                    .await?;
                }
            }
            store.close().await;
        }
        Commands::Rescore { since } => {
            let profile = TasteProfile::load(&cli.config.join(TASTE_FILE))?;
            let store = Store::open(&config.storage.path).await?;
            sift::rescore::run_rescore(&config, &profile, &store, since.as_deref()).await?;
            store.close().await;
        }
        Commands::Stats { since, format } => {
            let store = Store::open(&config.storage.path).await?;
            sift::stats::run_stats(&store, &since, &format).await?;
            store.close().await;
        }
        Commands::Explain { post_id } => {
            let profile = TasteProfile::load(&cli.config.join(TASTE_FILE))?;
            let store = Store::open(&config.storage.path).await?;
            sift::explain::run_explain(&store, &profile, post_id).await?;
            store.close().await;
        }
        Commands::Verify { since } => {
            let store = Store::open(&config.storage.path).await?;
            sift::verify::run_verify(&config, &store, since.as_deref()).await?;
            store.close().await;
        }
        Commands::Init | Commands::Import { .. } => unreachable!("handled before config load"),
    }

    Ok(())
}

/// Color is on for TTY stdout unless explicitly disabled.
fn use_color(no_color: bool) -> bool {
    !no_color && atty::is(atty::Stream::Stdout)
}

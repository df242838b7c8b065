//! # sift
//!
//! **Extract the signal from noisy information streams, locally.**
//!
//! sift pulls posts from heterogeneous sources (a chat-collector
//! subprocess, RSS/Atom feeds, public forum listings, a ranked story list,
//! local helper scripts), scores each one against a user-owned taste
//! profile of keyword weights and rules, and renders a concise three-tier
//! digest. It is pull-based and deterministic: no server, no accounts,
//! no ML.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌───────────┐   ┌───────────┐
//! │   Sources    │──▶│  Ingest   │──▶│  SQLite   │
//! │ chat/rss/... │   │ redact+   │   │ posts +   │
//! └──────────────┘   │ dedup     │   │ scores    │
//!                    └───────────┘   └─────┬─────┘
//!                                          │
//!                     ┌────────────────────┤
//!                     ▼                    ▼
//!               ┌───────────┐       ┌────────────┐
//!               │  Scorer   │       │   Digest   │
//!               │ + trends  │──────▶│ 3 formats  │
//!               └───────────┘       └────────────┘
//! ```
//!
//! ## Data Flow
//!
//! 1. **Sources** ([`sources`]) fetch raw [`models::Post`]s newer than the
//!    retention cutoff.
//! 2. The **ingestion engine** ([`ingest`]) applies redaction and privacy
//!    settings, upserts posts by natural key, collapses cross-source
//!    duplicates into also-in attributions, and prunes old rows.
//! 3. The **scorer** ([`scorer`]) evaluates unscored posts against the
//!    taste profile, producing a score, labels, tier, and an explanation
//!    whose points always sum to the score.
//! 4. The **digest assembler** ([`digest`]) windows, summarizes
//!    ([`summarize`]), annotates, limits, and detects trends
//!    ([`trending`]).
//! 5. **Formatters** ([`render`]) emit the digest as terminal text, JSON,
//!    or Markdown.
//! 6. The **orchestrator** ([`run`]) sequences pull → digest once or on an
//!    interval with signal-driven cancellation.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | YAML config and taste-profile loading with validation |
//! | [`models`] | Core types: `Post`, `StoredPost`, `Score`, `Tier` |
//! | [`db`] | SQLite connection with WAL mode and foreign keys |
//! | [`migrate`] | Embedded schema and version enforcement |
//! | [`store`] | Upsert, dedup, prune, window queries, attributions |
//! | [`sources`] | `Source` trait and configured-source registry |
//! | [`source_chat`] | Chat-collector subprocess (JSONL contract) |
//! | [`source_rss`] | Feed fetcher with per-origin serialization and retry |
//! | [`source_reddit`] | Public forum listing fetcher |
//! | [`source_hn`] | Ranked story list fetcher |
//! | [`source_script`] | Local "suggested actions" script |
//! | [`redact`] | Regex redaction of stored text |
//! | [`ingest`] | Fan-out pull pipeline with failure isolation |
//! | [`scorer`] | Deterministic, explainable scoring |
//! | [`trending`] | Cross-channel keyword/URL co-occurrence |
//! | [`summarize`] | Heuristic and LLM summarizers |
//! | [`digest`] | Window, limit, annotate, trend-merge |
//! | [`render`] | Terminal, JSON, and Markdown formatters |
//! | [`run`] | One-shot and watch orchestration |
//! | [`stats`] | Per-channel signal analytics |
//! | [`explain`] | Score breakdown for one post |
//! | [`rescore`] | Wipe and recompute scores |
//! | [`scaffold`] | `sift init` example files |
//! | [`import_opml`] | OPML feed import |
//! | [`verify`] | External URL-verification subprocess driver |

pub mod config;
pub mod db;
pub mod digest;
pub mod explain;
pub mod import_opml;
pub mod ingest;
pub mod migrate;
pub mod models;
pub mod redact;
pub mod render;
pub mod rescore;
pub mod run;
pub mod scaffold;
pub mod scorer;
pub mod source_chat;
pub mod source_hn;
pub mod source_reddit;
pub mod source_rss;
pub mod source_script;
pub mod sources;
pub mod stats;
pub mod store;
pub mod summarize;
pub mod trending;
pub mod verify;

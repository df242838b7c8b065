//! Config directory scaffolding for `sift init`.
//!
//! Writes commented example `config.yaml` and `taste.yaml` files into the
//! config directory. Existing files are never overwritten.

use anyhow::{Context, Result};
use std::path::Path;

use crate::config::{CONFIG_FILE, TASTE_FILE};

const EXAMPLE_CONFIG: &str = r#"# sift configuration

sources:
  subprocess:
    script: scripts/collector_chat.py
    # python_path: python3
    api_id_env: CHAT_API_ID
    api_hash_env: CHAT_API_HASH
    session_dir: .sift/session
    channels:
      - "@your_channel_here"
  feeds: []
  # - "https://example.com/feed.xml"
  forum_channels: []
  # - "devops"
  # - "kubernetes"
  ranked:
    min_points: 0
  local_command:
    script: ""

storage:
  path: .sift/sift.db
  retain_days: 30

digest:
  timezone: "UTC"
  top_n: 7
  include_skims: 5
  since: 24h

summarize:
  mode: heuristic
  # llm:
  #   provider: openai
  #   model: gpt-4o-mini
  #   api_key_env: OPENAI_API_KEY
  #   max_tokens_per_post: 200

privacy:
  store_full_text: false
  redact:
    enabled: false
    patterns: []
"#;

const EXAMPLE_TASTE: &str = r#"# sift taste profile

weights:
  high_signal:
    "cve": 5
    "incident": 4
    "postmortem": 4
    "kubernetes": 3
    "breaking change": 5
    "outage": 4
    "zero-day": 5
  low_signal:
    "hiring": -3
    "webinar": -4
    "sponsor": -3
    "subscribe": -3

rules:
  - if:
      contains_any: ["breaking change", "migration required"]
    then:
      score_add: 2
      labels: ["action-needed"]
  - if:
      contains_any: ["cve", "zero-day", "exploit"]
    then:
      score_add: 2
      labels: ["security"]

thresholds:
  read_now: 7
  skim: 3
  ignore: 0
"#;

/// Create the config directory with example files. Returns how many files
/// were newly created.
pub fn run_init(config_dir: &Path) -> Result<usize> {
    std::fs::create_dir_all(config_dir)
        .with_context(|| format!("create config dir: {}", config_dir.display()))?;

    let mut created = 0;
    for (name, content) in [(CONFIG_FILE, EXAMPLE_CONFIG), (TASTE_FILE, EXAMPLE_TASTE)] {
        let path = config_dir.join(name);
        if path.exists() {
            println!("  exists: {}", path.display());
            continue;
        }
        std::fs::write(&path, content).with_context(|| format!("write {}", path.display()))?;
        println!("  created: {}", path.display());
        created += 1;
    }

    if created == 0 {
        println!("Config directory {} already initialized.", config_dir.display());
    } else {
        println!(
            "Initialized {} with {} config files.",
            config_dir.display(),
            created
        );
    }

    Ok(created)
}

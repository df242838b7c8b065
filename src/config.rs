//! YAML configuration and taste-profile loading.
//!
//! Two files live in the config directory (default `.sift`):
//!
//! - `config.yaml` — sources, storage, digest, summarize, and privacy
//!   settings. Credentials are referenced by environment-variable *name*
//!   and resolved at load time; secrets never appear inline.
//! - `taste.yaml` — the user-owned taste profile: keyword weights,
//!   conditional rules, and tier thresholds.
//!
//! Both loaders apply defaults and validate before returning; an invalid
//! file is a fatal configuration error reported once.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILE: &str = "config.yaml";
pub const TASTE_FILE: &str = "taste.yaml";

const DEFAULT_STORAGE_PATH: &str = ".sift/sift.db";
const DEFAULT_RETAIN_DAYS: i64 = 30;
const DEFAULT_TOP_N: usize = 7;
const DEFAULT_INCLUDE_SKIMS: usize = 5;
const DEFAULT_SINCE: &str = "24h";
const DEFAULT_TIMEZONE: &str = "UTC";
const DEFAULT_SUMMARIZE_MODE: &str = "heuristic";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub sources: SourcesConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub digest: DigestConfig,
    #[serde(default)]
    pub summarize: SummarizeConfig,
    #[serde(default)]
    pub privacy: PrivacyConfig,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct SourcesConfig {
    /// Chat collector subprocess settings.
    #[serde(default)]
    pub subprocess: SubprocessConfig,
    /// RSS/Atom feed URLs.
    #[serde(default)]
    pub feeds: Vec<String>,
    /// Public forum channels polled via their JSON listing API.
    #[serde(default)]
    pub forum_channels: Vec<String>,
    /// Ranked-list ("top stories") source settings.
    #[serde(default)]
    pub ranked: RankedConfig,
    /// Local helper command producing suggested actions.
    #[serde(default)]
    pub local_command: LocalCommandConfig,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct SubprocessConfig {
    /// Path to the collector script. Empty disables the source.
    #[serde(default)]
    pub script: String,
    #[serde(default = "default_python_path")]
    pub python_path: String,
    /// Environment variable *names* holding the API credentials.
    #[serde(default)]
    pub api_id_env: String,
    #[serde(default)]
    pub api_hash_env: String,
    #[serde(default)]
    pub session_dir: String,
    #[serde(default)]
    pub channels: Vec<String>,

    /// Resolved from the environment at load time.
    #[serde(skip)]
    pub api_id: String,
    #[serde(skip)]
    pub api_hash: String,
}

fn default_python_path() -> String {
    "python3".to_string()
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct RankedConfig {
    /// Minimum score for an item to be accepted. Zero disables the source.
    #[serde(default)]
    pub min_points: i64,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct LocalCommandConfig {
    /// Path to the script. Empty disables the source.
    #[serde(default)]
    pub script: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    #[serde(default = "default_storage_path")]
    pub path: PathBuf,
    #[serde(default = "default_retain_days")]
    pub retain_days: i64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_storage_path(),
            retain_days: DEFAULT_RETAIN_DAYS,
        }
    }
}

fn default_storage_path() -> PathBuf {
    PathBuf::from(DEFAULT_STORAGE_PATH)
}
fn default_retain_days() -> i64 {
    DEFAULT_RETAIN_DAYS
}

#[derive(Debug, Deserialize, Clone)]
pub struct DigestConfig {
    #[serde(default = "default_timezone")]
    pub timezone: String,
    #[serde(default = "default_top_n")]
    pub top_n: usize,
    #[serde(default = "default_include_skims")]
    pub include_skims: usize,
    /// Time window as a duration string, e.g. `"24h"` or `"7d"`.
    #[serde(default = "default_since")]
    pub since: String,
}

impl Default for DigestConfig {
    fn default() -> Self {
        Self {
            timezone: default_timezone(),
            top_n: DEFAULT_TOP_N,
            include_skims: DEFAULT_INCLUDE_SKIMS,
            since: default_since(),
        }
    }
}

fn default_timezone() -> String {
    DEFAULT_TIMEZONE.to_string()
}
fn default_top_n() -> usize {
    DEFAULT_TOP_N
}
fn default_include_skims() -> usize {
    DEFAULT_INCLUDE_SKIMS
}
fn default_since() -> String {
    DEFAULT_SINCE.to_string()
}

impl DigestConfig {
    pub fn since_duration(&self) -> Result<Duration> {
        parse_duration(&self.since)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SummarizeConfig {
    /// `"heuristic"` or `"llm"`.
    #[serde(default = "default_summarize_mode")]
    pub mode: String,
    #[serde(default)]
    pub llm: LlmConfig,
}

impl Default for SummarizeConfig {
    fn default() -> Self {
        Self {
            mode: default_summarize_mode(),
            llm: LlmConfig::default(),
        }
    }
}

fn default_summarize_mode() -> String {
    DEFAULT_SUMMARIZE_MODE.to_string()
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct LlmConfig {
    #[serde(default)]
    pub provider: String,
    #[serde(default)]
    pub model: String,
    /// Environment variable *name* holding the API key.
    #[serde(default)]
    pub api_key_env: String,
    #[serde(default)]
    pub max_tokens_per_post: u32,

    /// Resolved from the environment at load time.
    #[serde(skip)]
    pub api_key: String,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct PrivacyConfig {
    #[serde(default)]
    pub store_full_text: bool,
    #[serde(default)]
    pub redact: RedactConfig,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct RedactConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub patterns: Vec<String>,
}

impl Config {
    /// Load `config.yaml` from `dir`, apply defaults, resolve env-var
    /// credentials, and validate.
    pub fn load(dir: &Path) -> Result<Config> {
        let path = dir.join(CONFIG_FILE);
        let raw = std::fs::read_to_string(&path)
            .with_context(|| format!("read config file: {}", path.display()))?;

        let mut config: Config = serde_yaml::from_str(&raw).context("parse config file")?;
        config.resolve_env();
        config.validate()?;
        Ok(config)
    }

    fn resolve_env(&mut self) {
        let subprocess = &mut self.sources.subprocess;
        if !subprocess.api_id_env.is_empty() {
            subprocess.api_id = std::env::var(&subprocess.api_id_env).unwrap_or_default();
        }
        if !subprocess.api_hash_env.is_empty() {
            subprocess.api_hash = std::env::var(&subprocess.api_hash_env).unwrap_or_default();
        }
        let llm = &mut self.summarize.llm;
        if !llm.api_key_env.is_empty() {
            llm.api_key = std::env::var(&llm.api_key_env).unwrap_or_default();
        }
    }

    fn validate(&self) -> Result<()> {
        let s = &self.sources;
        let has_any = !s.subprocess.channels.is_empty()
            || !s.feeds.is_empty()
            || !s.forum_channels.is_empty()
            || s.ranked.min_points > 0
            || !s.local_command.script.is_empty();
        if !has_any {
            bail!("sources: at least one source must be configured");
        }

        self.digest
            .timezone
            .parse::<chrono_tz::Tz>()
            .map_err(|_| anyhow::anyhow!("digest.timezone: unknown timezone {:?}", self.digest.timezone))?;

        self.digest
            .since_duration()
            .context("digest.since")?;

        match self.summarize.mode.as_str() {
            "heuristic" | "llm" => {}
            other => bail!("summarize.mode: unknown mode {other:?} (want heuristic or llm)"),
        }

        Ok(())
    }
}

/// The user-owned taste profile: keyword weights, conditional rules, and
/// tier thresholds.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct TasteProfile {
    #[serde(default)]
    pub weights: Weights,
    #[serde(default)]
    pub rules: Vec<Rule>,
    #[serde(default)]
    pub thresholds: Thresholds,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Weights {
    /// Keyword → positive points. BTreeMap keeps evaluation order stable.
    #[serde(default)]
    pub high_signal: BTreeMap<String, i64>,
    /// Keyword → negative points.
    #[serde(default)]
    pub low_signal: BTreeMap<String, i64>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Rule {
    #[serde(rename = "if")]
    pub condition: RuleCondition,
    pub then: RuleAction,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct RuleCondition {
    #[serde(default)]
    pub contains_any: Vec<String>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct RuleAction {
    #[serde(default)]
    pub score_add: i64,
    #[serde(default)]
    pub labels: Vec<String>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Thresholds {
    #[serde(default)]
    pub read_now: i64,
    #[serde(default)]
    pub skim: i64,
    #[serde(default)]
    pub ignore: i64,
}

impl TasteProfile {
    /// Load and validate a taste profile from `path`.
    pub fn load(path: &Path) -> Result<TasteProfile> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("read taste profile: {}", path.display()))?;

        let profile: TasteProfile =
            serde_yaml::from_str(&raw).context("parse taste profile")?;
        profile.validate()?;
        Ok(profile)
    }

    pub fn validate(&self) -> Result<()> {
        let t = &self.thresholds;
        if t.read_now <= t.skim {
            bail!(
                "thresholds: read_now ({}) must be greater than skim ({})",
                t.read_now,
                t.skim
            );
        }
        if t.skim <= t.ignore {
            bail!(
                "thresholds: skim ({}) must be greater than ignore ({})",
                t.skim,
                t.ignore
            );
        }
        Ok(())
    }
}

/// Parse a duration string of the form `90s`, `30m`, `48h`, or `7d`.
pub fn parse_duration(value: &str) -> Result<Duration> {
    let value = value.trim();
    if value.len() < 2 {
        bail!("invalid duration {value:?} (want e.g. 30m, 48h, 7d)");
    }

    let (number, unit) = value.split_at(value.len() - 1);
    let number: u64 = number
        .parse()
        .map_err(|_| anyhow::anyhow!("invalid duration {value:?} (want e.g. 30m, 48h, 7d)"))?;

    let seconds = match unit {
        "s" => number,
        "m" => number * 60,
        "h" => number * 3600,
        "d" => number * 86400,
        _ => bail!("invalid duration unit in {value:?} (want s, m, h, or d)"),
    };

    Ok(Duration::from_secs(seconds))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_duration_units() {
        assert_eq!(parse_duration("90s").unwrap(), Duration::from_secs(90));
        assert_eq!(parse_duration("30m").unwrap(), Duration::from_secs(1800));
        assert_eq!(parse_duration("48h").unwrap(), Duration::from_secs(48 * 3600));
        assert_eq!(parse_duration("7d").unwrap(), Duration::from_secs(7 * 86400));
        assert!(parse_duration("").is_err());
        assert!(parse_duration("7w").is_err());
        assert!(parse_duration("h").is_err());
    }

    #[test]
    fn taste_profile_threshold_order_enforced() {
        let profile: TasteProfile = serde_yaml::from_str(
            r#"
weights:
  high_signal:
    cve: 5
thresholds:
  read_now: 3
  skim: 5
  ignore: 0
"#,
        )
        .unwrap();
        assert!(profile.validate().is_err());

        let profile: TasteProfile = serde_yaml::from_str(
            r#"
thresholds:
  read_now: 7
  skim: 3
  ignore: 0
"#,
        )
        .unwrap();
        assert!(profile.validate().is_ok());
    }

    #[test]
    fn taste_profile_parses_rules() {
        let profile: TasteProfile = serde_yaml::from_str(
            r#"
weights:
  high_signal:
    kubernetes: 3
  low_signal:
    webinar: -4
rules:
  - if:
      contains_any: ["breaking change"]
    then:
      score_add: 2
      labels: ["ops"]
thresholds:
  read_now: 7
  skim: 3
  ignore: 0
"#,
        )
        .unwrap();

        assert_eq!(profile.weights.high_signal.get("kubernetes"), Some(&3));
        assert_eq!(profile.rules.len(), 1);
        assert_eq!(profile.rules[0].condition.contains_any, ["breaking change"]);
        assert_eq!(profile.rules[0].then.score_add, 2);
        assert_eq!(profile.rules[0].then.labels, ["ops"]);
    }

    #[test]
    fn config_requires_a_source() {
        let config: Config = serde_yaml::from_str("storage:\n  retain_days: 10\n").unwrap();
        assert!(config.validate().is_err());

        let config: Config =
            serde_yaml::from_str("sources:\n  feeds:\n    - https://example.com/feed.xml\n")
                .unwrap();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn config_rejects_unknown_timezone_and_mode() {
        let config: Config = serde_yaml::from_str(
            "sources:\n  feeds: [\"https://example.com/a.xml\"]\ndigest:\n  timezone: Mars/Olympus\n",
        )
        .unwrap();
        assert!(config.validate().is_err());

        let config: Config = serde_yaml::from_str(
            "sources:\n  feeds: [\"https://example.com/a.xml\"]\nsummarize:\n  mode: oracle\n",
        )
        .unwrap();
        assert!(config.validate().is_err());
    }
}

//! End-to-end tests driving the `sift` binary: a local script source
//! feeds the full pipeline (pull → score → digest) inside a tempdir.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn sift_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("sift");
    path
}

const ACTIONS_SCRIPT: &str = r#"#!/bin/sh
cat <<'EOF'
Repo health report

Suggested actions:

1. CVE-2026-1111 Kubernetes breaking change affects control plane.

   kubectl apply -f fix.yaml

2. Kubernetes migration checklist for v1.2.3.

   kubectl rollout status deploy/app

3. Join our webinar on cluster best practices.

   https://example.com/webinar
EOF
"#;

const TASTE: &str = r#"weights:
  high_signal:
    "cve": 5
    "kubernetes": 3
  low_signal:
    "webinar": -4

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
"#;

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join(".sift");
    fs::create_dir_all(&config_dir).unwrap();

    let script_path = root.join("plan.sh");
    fs::write(&script_path, ACTIONS_SCRIPT).unwrap();
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&script_path, fs::Permissions::from_mode(0o755)).unwrap();
    }

    let config = format!(
        r#"sources:
  local_command:
    script: "{}"

storage:
  path: "{}"
  retain_days: 30

digest:
  timezone: "UTC"
  top_n: 7
  include_skims: 5
  since: 24h

summarize:
  mode: heuristic

privacy:
  store_full_text: true
"#,
        script_path.display(),
        root.join("data").join("sift.db").display()
    );

    fs::write(config_dir.join("config.yaml"), config).unwrap();
    fs::write(config_dir.join("taste.yaml"), TASTE).unwrap();

    (tmp, config_dir)
}

fn run_sift(config_dir: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = sift_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_dir.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run sift binary at {binary:?}: {e}"));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

#[test]
fn test_init_scaffolds_config_dir() {
    let tmp = TempDir::new().unwrap();
    let config_dir = tmp.path().join(".sift");

    let (stdout, stderr, success) = run_sift(&config_dir, &["init"]);
    assert!(success, "init failed: stdout={stdout}, stderr={stderr}");
    assert!(stdout.contains("created"));
    assert!(config_dir.join("config.yaml").exists());
    assert!(config_dir.join("taste.yaml").exists());

    // Second init leaves the files alone.
    let (stdout, _, success) = run_sift(&config_dir, &["init"]);
    assert!(success);
    assert!(stdout.contains("already initialized"));
}

#[test]
fn test_pull_ingests_script_actions() {
    let (_tmp, config_dir) = setup_test_env();

    let (stdout, stderr, success) = run_sift(&config_dir, &["pull"]);
    assert!(success, "pull failed: stdout={stdout}, stderr={stderr}");
    assert!(
        stdout.contains("Pulled 3 posts from 1 channels"),
        "unexpected pull output: {stdout}"
    );
}

#[test]
fn test_pull_is_idempotent() {
    let (_tmp, config_dir) = setup_test_env();

    run_sift(&config_dir, &["pull"]);
    let (stdout, _, success) = run_sift(&config_dir, &["pull"]);
    assert!(success);
    // Same natural keys: replaced, not duplicated.
    assert!(stdout.contains("Pulled 3 posts from 1 channels"));

    let (json, _, _) = run_sift(&config_dir, &["digest", "--format", "json"]);
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["meta"]["total_posts"], 3);
}

#[test]
fn test_digest_terminal_tiers() {
    let (_tmp, config_dir) = setup_test_env();

    run_sift(&config_dir, &["pull"]);
    let (stdout, stderr, success) = run_sift(&config_dir, &["digest", "--no-color"]);
    assert!(success, "digest failed: stdout={stdout}, stderr={stderr}");

    assert!(stdout.contains("Read Now (1)"), "output: {stdout}");
    assert!(stdout.contains("Skim (1)"), "output: {stdout}");
    assert!(stdout.contains("Ignored: 1 posts"), "output: {stdout}");
    assert!(stdout.contains("[10]"), "score missing: {stdout}");
    assert!(stdout.contains("[ops]"), "labels missing: {stdout}");
}

#[test]
fn test_digest_json_contract() {
    let (_tmp, config_dir) = setup_test_env();

    run_sift(&config_dir, &["pull"]);
    let (stdout, _, success) = run_sift(&config_dir, &["digest", "--format", "json"]);
    assert!(success);

    let value: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(value["meta"]["channels"], 1);
    assert_eq!(value["meta"]["total_posts"], 3);
    assert_eq!(value["meta"]["since"], "1d");

    let read_now = value["read_now"].as_array().unwrap();
    assert_eq!(read_now.len(), 1);
    assert_eq!(read_now[0]["score"], 10);
    assert_eq!(read_now[0]["tier"], "read_now");
    assert_eq!(read_now[0]["labels"][0], "ops");
    assert_eq!(read_now[0]["source"], "script");

    assert_eq!(value["skims"].as_array().unwrap().len(), 1);
    assert_eq!(value["skims"][0]["score"], 3);
    assert_eq!(value["ignored"], 1);
}

#[test]
fn test_digest_markdown_sections() {
    let (_tmp, config_dir) = setup_test_env();

    run_sift(&config_dir, &["pull"]);
    let (stdout, _, success) = run_sift(&config_dir, &["digest", "--format", "markdown"]);
    assert!(success);

    assert!(stdout.contains("# sift digest"));
    assert!(stdout.contains("## Read Now (1)"));
    assert!(stdout.contains("## Skim (1)"));
    assert!(stdout.contains("*Ignored: 1 posts*"));
}

#[test]
fn test_digest_output_file() {
    let (tmp, config_dir) = setup_test_env();

    run_sift(&config_dir, &["pull"]);
    let out_path = tmp.path().join("out").join("digest.md");
    let (_, _, success) = run_sift(
        &config_dir,
        &[
            "digest",
            "--format",
            "markdown",
            "--output",
            out_path.to_str().unwrap(),
        ],
    );
    assert!(success);

    let written = fs::read_to_string(&out_path).unwrap();
    assert!(written.contains("# sift digest"));
}

#[test]
fn test_digest_unknown_format_errors() {
    let (_tmp, config_dir) = setup_test_env();

    run_sift(&config_dir, &["pull"]);
    let (_, stderr, success) = run_sift(&config_dir, &["digest", "--format", "yaml"]);
    assert!(!success);
    assert!(stderr.contains("unknown format"), "stderr: {stderr}");
}

#[test]
fn test_digest_empty_window() {
    let (_tmp, config_dir) = setup_test_env();

    // No pull: nothing stored.
    let (stdout, _, success) = run_sift(&config_dir, &["digest", "--no-color"]);
    assert!(success);
    assert!(stdout.contains("No posts found."));
}

#[test]
fn test_explain_shows_breakdown() {
    let (_tmp, config_dir) = setup_test_env();

    run_sift(&config_dir, &["pull"]);
    run_sift(&config_dir, &["digest", "--format", "json"]);

    let (stdout, stderr, success) = run_sift(&config_dir, &["explain", "1"]);
    assert!(success, "explain failed: {stderr}");
    assert!(stdout.contains("Post #1"));
    assert!(stdout.contains("Breakdown:"));
    assert!(stdout.contains("keyword:"));

    let (_, stderr, success) = run_sift(&config_dir, &["explain", "999"]);
    assert!(!success);
    assert!(stderr.contains("not found"));
}

#[test]
fn test_rescore_recomputes_scores() {
    let (_tmp, config_dir) = setup_test_env();

    run_sift(&config_dir, &["pull"]);
    run_sift(&config_dir, &["digest", "--format", "json"]);

    let (stdout, _, success) = run_sift(&config_dir, &["rescore"]);
    assert!(success);
    assert!(stdout.contains("Deleted 3 existing scores"), "got: {stdout}");
    assert!(stdout.contains("Rescored 3 posts"), "got: {stdout}");
}

#[test]
fn test_stats_reports_channel() {
    let (_tmp, config_dir) = setup_test_env();

    run_sift(&config_dir, &["pull"]);
    run_sift(&config_dir, &["digest", "--format", "json"]);

    let (stdout, _, success) = run_sift(&config_dir, &["stats"]);
    assert!(success);
    assert!(stdout.contains("--- Signal-to-Noise by Channel ---"), "got: {stdout}");
    assert!(stdout.contains("actions"), "got: {stdout}");
    assert!(stdout.contains("--- Scoring Distribution ---"), "got: {stdout}");
    assert!(stdout.contains("3 posts from 1 channels"), "got: {stdout}");

    let (json, _, success) = run_sift(&config_dir, &["stats", "--format", "json"]);
    assert!(success);
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["distribution"]["total"], 3);
    assert_eq!(value["distribution"]["read_now"], 1);
}

#[test]
fn test_stats_without_posts() {
    let (_tmp, config_dir) = setup_test_env();

    let (stdout, _, success) = run_sift(&config_dir, &["stats"]);
    assert!(success);
    assert!(stdout.contains("No posts found"));
}

#[test]
fn test_run_one_shot_pipeline() {
    let (_tmp, config_dir) = setup_test_env();

    let (stdout, stderr, success) = run_sift(&config_dir, &["run", "--no-color"]);
    assert!(success, "run failed: stdout={stdout}, stderr={stderr}");
    assert!(stdout.contains("Pulled 3 posts"));
    assert!(stdout.contains("Read Now (1)"));
}

#[test]
fn test_run_rejects_zero_interval() {
    let (_tmp, config_dir) = setup_test_env();

    let (_, stderr, success) = run_sift(&config_dir, &["run", "--every", "0m"]);
    assert!(!success);
    assert!(stderr.contains("--every"), "stderr: {stderr}");
}

#[test]
fn test_missing_config_is_fatal() {
    let tmp = TempDir::new().unwrap();
    let config_dir = tmp.path().join("nowhere");

    let (_, stderr, success) = run_sift(&config_dir, &["pull"]);
    assert!(!success);
    assert!(stderr.contains("config"), "stderr: {stderr}");
}

#[test]
fn test_invalid_taste_profile_is_fatal() {
    let (_tmp, config_dir) = setup_test_env();

    fs::write(
        config_dir.join("taste.yaml"),
        "thresholds:\n  read_now: 1\n  skim: 5\n  ignore: 0\n",
    )
    .unwrap();

    let (_, stderr, success) = run_sift(&config_dir, &["digest"]);
    assert!(!success);
    assert!(stderr.contains("thresholds"), "stderr: {stderr}");
}

#[test]
fn test_import_opml_dry_run() {
    let (tmp, config_dir) = setup_test_env();

    let opml_path = tmp.path().join("feeds.opml");
    fs::write(
        &opml_path,
        r#"<?xml version="1.0"?>
<opml version="2.0">
  <body>
    <outline text="Blog" xmlUrl="https://blog.example/feed.xml"/>
  </body>
</opml>"#,
    )
    .unwrap();

    let (stdout, _, success) = run_sift(
        &config_dir,
        &["import", opml_path.to_str().unwrap(), "--dry-run"],
    );
    assert!(success);
    assert!(stdout.contains("Would add 1 feeds"), "got: {stdout}");

    let (stdout, _, success) = run_sift(&config_dir, &["import", opml_path.to_str().unwrap()]);
    assert!(success, "import failed: {stdout}");

    let merged = fs::read_to_string(config_dir.join("config.yaml")).unwrap();
    assert!(merged.contains("https://blog.example/feed.xml"));
}

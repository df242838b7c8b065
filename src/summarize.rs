//! Post summarization: heuristic extraction with an optional LLM backend.
//!
//! Two interchangeable variants:
//!
//! - **[`HeuristicSummarizer`]** — deterministic, total, always available.
//!   Extracts up to three bullets (first sentence, an alert sentence
//!   mentioning breaking changes/deprecations/removals, and a metadata
//!   line), plus URLs, CVE ids, and version strings via regex.
//! - **[`LlmSummarizer`]** — posts the text to a chat-completion endpoint
//!   and parses `-`-prefixed lines as bullets. On *any* failure (network,
//!   non-200, empty choices, no bullets) it silently falls back to the
//!   heuristic. Link and CVE extraction always run heuristically on the
//!   original text regardless of backend.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::time::Duration;

static URL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"https?://\S+").unwrap());
static CVE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"CVE-\d{4}-\d{4,}").unwrap());
static VERSION_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"v?\d+\.\d+\.\d+").unwrap());

const MAX_BULLETS: usize = 3;
const MAX_FIRST_SENTENCE: usize = 120;
const ALERT_KEYWORDS: [&str; 3] = ["breaking change", "deprecated", "removed"];

const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);
const SYSTEM_PROMPT: &str = "Summarize for senior DevOps engineer. Focus on: breaking changes, incidents, security, architectural shifts. Max 4 bullets. Return only bullet points, one per line, starting with -";

/// Summarization result for one post.
#[derive(Debug, Clone, Default)]
pub struct Summary {
    /// 1–3 key points; the first is the headline.
    pub bullets: Vec<String>,
    /// Extracted URLs.
    pub links: Vec<String>,
    /// Extracted CVE ids.
    pub cves: Vec<String>,
}

/// Produces a [`Summary`] from post text.
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, text: &str) -> Summary;
}

/// Rule-based summarizer: deterministic and total.
#[derive(Debug, Default)]
pub struct HeuristicSummarizer;

#[async_trait]
impl Summarizer for HeuristicSummarizer {
    async fn summarize(&self, text: &str) -> Summary {
        heuristic_summary(text)
    }
}

fn heuristic_summary(text: &str) -> Summary {
    let text = text.trim();

    let links: Vec<String> = URL_RE.find_iter(text).map(|m| m.as_str().to_string()).collect();
    let cves: Vec<String> = CVE_RE.find_iter(text).map(|m| m.as_str().to_string()).collect();
    let versions: Vec<String> = VERSION_RE
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .collect();

    let mut bullets = Vec::new();

    let mut first = first_sentence(text, MAX_FIRST_SENTENCE);
    if first.is_empty() {
        first = "(empty)".to_string();
    }
    bullets.push(first.clone());

    if let Some(sentence) = find_sentence_containing(text, &ALERT_KEYWORDS) {
        if sentence != first {
            bullets.push(sentence);
        }
    }

    if bullets.len() < MAX_BULLETS {
        if !cves.is_empty() {
            bullets.push(format!("CVE: {}", cves.join(", ")));
        } else if !versions.is_empty() {
            bullets.push(format!("Versions: {}", versions.join(", ")));
        } else if links.len() > 3 {
            bullets.push(format!("{} links included", links.len()));
        }
    }

    bullets.truncate(MAX_BULLETS);

    Summary {
        bullets,
        links,
        cves,
    }
}

/// Text up to the first sentence boundary (`". "`, `".\n"`, or newline),
/// truncated at `max_len` characters on a word boundary with a `...`
/// suffix when exceeded.
fn first_sentence(text: &str, max_len: usize) -> String {
    if text.is_empty() {
        return String::new();
    }

    let bytes = text.as_bytes();
    let mut end = text.find('\n').unwrap_or(text.len());

    for i in 0..end.saturating_sub(1) {
        if bytes[i] == b'.' && (bytes[i + 1] == b' ' || bytes[i + 1] == b'\n') {
            end = i + 1;
            break;
        }
    }

    let sentence = &text[..end];
    if sentence.chars().count() > max_len {
        let prefix: String = sentence.chars().take(max_len).collect();
        return match prefix.rfind(' ') {
            Some(idx) if idx > 0 => format!("{}...", &prefix[..idx]),
            _ => format!("{prefix}..."),
        };
    }

    sentence.trim().to_string()
}

/// First sentence containing any of the keywords (case-insensitive),
/// truncated like the headline.
fn find_sentence_containing(text: &str, keywords: &[&str]) -> Option<String> {
    for sentence in split_sentences(text) {
        let lower = sentence.to_lowercase();
        if keywords.iter().any(|kw| lower.contains(kw)) {
            if sentence.chars().count() > MAX_FIRST_SENTENCE {
                let prefix: String = sentence.chars().take(MAX_FIRST_SENTENCE).collect();
                return Some(format!("{prefix}..."));
            }
            return Some(sentence);
        }
    }
    None
}

/// Split on `". "` / `".\n"` and newline boundaries.
fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        current.push(c);

        if c == '\n' {
            let s = current.trim();
            if !s.is_empty() {
                sentences.push(s.to_string());
            }
            current.clear();
            continue;
        }

        if c == '.' && matches!(chars.peek(), Some(&' ') | Some(&'\n')) {
            let s = current.trim();
            if !s.is_empty() {
                sentences.push(s.to_string());
            }
            current.clear();
        }
    }

    let s = current.trim();
    if !s.is_empty() {
        sentences.push(s.to_string());
    }

    sentences
}

/// Chat-completion summarizer with heuristic fallback.
pub struct LlmSummarizer {
    api_key: String,
    model: String,
    max_tokens: u32,
    endpoint: String,
    client: reqwest::Client,
    fallback: HeuristicSummarizer,
}

impl LlmSummarizer {
    pub fn new(api_key: String, model: String, max_tokens: u32) -> Result<LlmSummarizer> {
        let client = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .context("llm: build http client")?;

        Ok(LlmSummarizer {
            api_key,
            model,
            max_tokens,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            client,
            fallback: HeuristicSummarizer,
        })
    }

    /// Point the summarizer at a different endpoint (tests).
    pub fn with_endpoint(mut self, endpoint: String) -> LlmSummarizer {
        self.endpoint = endpoint;
        self
    }

    async fn call_api(&self, text: &str) -> Result<Vec<String>> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: text.to_string(),
                },
            ],
            max_tokens: self.max_tokens,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .context("http request")?;

        let status = response.status();
        if !status.is_success() {
            bail!("api returned status {status}");
        }

        let chat: ChatResponse = response.json().await.context("decode response")?;
        let content = chat
            .choices
            .first()
            .map(|c| c.message.content.as_str())
            .ok_or_else(|| anyhow::anyhow!("empty choices in response"))?;

        Ok(parse_bullets(content))
    }
}

#[async_trait]
impl Summarizer for LlmSummarizer {
    async fn summarize(&self, text: &str) -> Summary {
        let bullets = match self.call_api(text).await {
            Ok(bullets) if !bullets.is_empty() => bullets,
            _ => return self.fallback.summarize(text).await,
        };

        Summary {
            bullets,
            links: URL_RE.find_iter(text).map(|m| m.as_str().to_string()).collect(),
            cves: CVE_RE.find_iter(text).map(|m| m.as_str().to_string()).collect(),
        }
    }
}

/// Lines starting with `-` (space optional) from LLM output.
fn parse_bullets(content: &str) -> Vec<String> {
    content
        .lines()
        .filter_map(|line| {
            let line = line.trim();
            line.strip_prefix("- ")
                .or_else(|| line.strip_prefix('-'))
                .map(|b| b.trim_start().to_string())
        })
        .filter(|b| !b.is_empty())
        .collect()
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
}

#[derive(Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

//! Redaction filter applied to post text before storage.

use anyhow::{Context, Result};
use regex::Regex;

const PLACEHOLDER: &str = "[REDACTED]";

/// Compile a list of redaction patterns. Any invalid pattern is a
/// configuration error.
pub fn compile(patterns: &[String]) -> Result<Vec<Regex>> {
    patterns
        .iter()
        .map(|p| Regex::new(p).with_context(|| format!("compile redact pattern {p:?}")))
        .collect()
}

/// Replace every match of the compiled patterns with `[REDACTED]`.
pub fn apply(text: &str, patterns: &[Regex]) -> String {
    let mut text = text.to_string();
    for re in patterns {
        text = re.replace_all(&text, PLACEHOLDER).into_owned();
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redacts_all_matches() {
        let patterns = compile(&["secret-\\w+".to_string(), "\\b\\d{16}\\b".to_string()]).unwrap();
        let out = apply("token secret-abc and card 1234123412341234 leaked", &patterns);
        assert_eq!(out, "token [REDACTED] and card [REDACTED] leaked");
    }

    #[test]
    fn invalid_pattern_is_an_error() {
        assert!(compile(&["[unclosed".to_string()]).is_err());
    }

    #[test]
    fn no_patterns_is_identity() {
        assert_eq!(apply("unchanged", &[]), "unchanged");
    }
}

//! Deterministic, explainable post scoring.
//!
//! The scorer is pure and total: given the same text and profile it always
//! produces the same score, labels, tier, and explanation, and it never
//! fails. Matching is purely lexical — lowercase substring containment —
//! with each keyword and each rule contributing at most once no matter how
//! often it occurs.
//!
//! Contributions are recorded in evaluation order: high-signal keywords,
//! then low-signal keywords, then rules in declaration order. The sum of
//! contribution points always equals the score.

use crate::config::{RuleCondition, TasteProfile, Thresholds};
use crate::models::{Contribution, Tier};

/// Result of evaluating one post's text against a taste profile.
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub score: i64,
    /// Sorted, deduplicated labels from matched rules.
    pub labels: Vec<String>,
    pub tier: Tier,
    pub explanation: Vec<Contribution>,
}

/// Evaluate `text` against `profile`.
pub fn score(text: &str, profile: &TasteProfile) -> Evaluation {
    let text_lower = text.to_lowercase();

    let mut total = 0i64;
    let mut labels: Vec<String> = Vec::new();
    let mut explanation: Vec<Contribution> = Vec::new();

    for (keyword, weight) in &profile.weights.high_signal {
        if text_lower.contains(&keyword.to_lowercase()) {
            total += weight;
            explanation.push(Contribution {
                reason: format!("keyword: {keyword}"),
                points: *weight,
            });
        }
    }

    for (keyword, weight) in &profile.weights.low_signal {
        if text_lower.contains(&keyword.to_lowercase()) {
            total += weight;
            explanation.push(Contribution {
                reason: format!("keyword: {keyword}"),
                points: *weight,
            });
        }
    }

    for rule in &profile.rules {
        if rule_matches(&text_lower, &rule.condition) {
            total += rule.then.score_add;
            labels.extend(rule.then.labels.iter().cloned());
            let reason = match rule.condition.contains_any.first() {
                Some(keyword) => format!("rule: {keyword}"),
                None => "rule".to_string(),
            };
            explanation.push(Contribution {
                reason,
                points: rule.then.score_add,
            });
        }
    }

    labels.sort();
    labels.dedup();

    Evaluation {
        score: total,
        labels,
        tier: assign_tier(total, &profile.thresholds),
        explanation,
    }
}

fn rule_matches(text_lower: &str, condition: &RuleCondition) -> bool {
    condition
        .contains_any
        .iter()
        .any(|keyword| text_lower.contains(&keyword.to_lowercase()))
}

/// `read_now` at or above its threshold, then `skim`; everything else is
/// `ignore`. The `ignore` threshold only participates in the ordering
/// invariant, never in assignment.
fn assign_tier(score: i64, thresholds: &Thresholds) -> Tier {
    if score >= thresholds.read_now {
        Tier::ReadNow
    } else if score >= thresholds.skim {
        Tier::Skim
    } else {
        Tier::Ignore
    }
}

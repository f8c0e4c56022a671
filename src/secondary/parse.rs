//! Lenient decoding of a model's JSON answer.
//!
//! Models wrap JSON in code fences, prepend chatter, quote numbers or write
//! `"$50,000"`. Decoding runs in two stages:
//!
//! 1. Strip code fences and parse the remainder as JSON
//! 2. Otherwise parse the substring from the first `{` to the last `}`
//!
//! If both fail the result is [`SecondaryVerdict::sentinel`].

use super::SecondaryVerdict;
use crate::classify::fields::to_whole;
use crate::models::OutcomeLabel;
use crate::utils::{clip_for_log, is_incomplete_json};
use serde_json::{Map, Value};
use tracing::{debug, warn};

/// Decode raw model output. Never fails.
pub fn parse_verdict(raw: &str) -> SecondaryVerdict {
    let cleaned = strip_fences(raw);

    let value = match serde_json::from_str::<Value>(cleaned) {
        Ok(value) => Some(value),
        Err(e) => {
            if is_incomplete_json(&e) {
                warn!(error = %e, "Classifier output looks truncated");
            }
            debug!(error = %e, "Direct parse failed; trying embedded object");
            embedded_object(cleaned).and_then(|s| serde_json::from_str::<Value>(s).ok())
        }
    };

    match value {
        Some(Value::Object(map)) => from_object(&map),
        _ => {
            warn!(output = %clip_for_log(cleaned, 200), "Unparseable classifier output");
            SecondaryVerdict::sentinel(format!(
                "Failed to parse classifier output: {}",
                clip_for_log(cleaned, 100)
            ))
        }
    }
}

fn strip_fences(raw: &str) -> &str {
    let s = raw.trim();
    let s = s
        .strip_prefix("```json")
        .or_else(|| s.strip_prefix("```"))
        .unwrap_or(s);
    s.strip_suffix("```").unwrap_or(s).trim()
}

fn embedded_object(s: &str) -> Option<&str> {
    let start = s.find('{')?;
    let end = s.rfind('}')?;
    (start < end).then(|| &s[start..=end])
}

fn from_object(map: &Map<String, Value>) -> SecondaryVerdict {
    let status = map
        .get("approval_status")
        .or_else(|| map.get("status"))
        .and_then(Value::as_str)
        .unwrap_or("unknown");
    let reasoning = map
        .get("reasoning")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    SecondaryVerdict {
        label: label_for(status, &reasoning),
        confidence: map.get("confidence").and_then(number).unwrap_or(0.0),
        income: map.get("income").and_then(number).and_then(to_whole),
        credit_score: map.get("credit_score").and_then(number).and_then(to_whole),
        credit_limit: map
            .get("approval_amount")
            .or_else(|| map.get("credit_limit"))
            .and_then(number)
            .and_then(to_whole),
        reasoning,
        decoded: true,
    }
}

/// Map a status string to a label.
///
/// An `unknown` whose reasoning says the post is "not about" the product
/// counts as an exclusion too.
fn label_for(status: &str, reasoning: &str) -> OutcomeLabel {
    let status = status.trim().to_lowercase().replace([' ', '-'], "_");
    match status.as_str() {
        "approved" => OutcomeLabel::Approved,
        "denied" => OutcomeLabel::Denied,
        "question" => OutcomeLabel::Question,
        "not_relevant" | "irrelevant" | "exclude" | "excluded" => OutcomeLabel::Excluded,
        _ if reasoning.to_lowercase().contains("not about") => OutcomeLabel::Excluded,
        _ => OutcomeLabel::Unknown,
    }
}

/// A JSON number, or a string like `"720"`, `"$50,000"` or `"85k"`.
fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let s = s.trim().trim_start_matches('$').replace([',', ' '], "");
            let lower = s.to_lowercase();
            match lower.strip_suffix('k') {
                Some(base) => base.parse::<f64>().ok().map(|v| v * 1_000.0),
                None => lower.parse().ok(),
            }
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_json() {
        let raw = r#"{"approval_status": "approved", "confidence": 9, "income": 50000,
            "credit_score": 720, "approval_amount": 5000, "reasoning": "clear approval"}"#;
        let v = parse_verdict(raw);
        assert_eq!(v.label, OutcomeLabel::Approved);
        assert_eq!(v.confidence, 9.0);
        assert_eq!(v.income, Some(50_000));
        assert_eq!(v.credit_score, Some(720));
        assert_eq!(v.credit_limit, Some(5_000));
        assert_eq!(v.reasoning, "clear approval");
        assert!(v.decoded);
    }

    #[test]
    fn test_code_fenced_json() {
        let raw = "```json\n{\"approval_status\": \"denied\", \"confidence\": 7}\n```";
        let v = parse_verdict(raw);
        assert_eq!(v.label, OutcomeLabel::Denied);
        assert_eq!(v.confidence, 7.0);
        assert_eq!(v.income, None);
    }

    #[test]
    fn test_json_embedded_in_chatter() {
        let raw = "Sure! Here is the analysis:\n{\"approval_status\": \"question\", \"confidence\": 3} Hope that helps.";
        let v = parse_verdict(raw);
        assert_eq!(v.label, OutcomeLabel::Question);
        assert_eq!(v.confidence, 3.0);
    }

    #[test]
    fn test_garbage_becomes_sentinel() {
        for raw in ["I cannot classify this post.", "", "{broken", "[1, 2, 3]"] {
            let v = parse_verdict(raw);
            assert_eq!(v.label, OutcomeLabel::Unknown);
            assert_eq!(v.confidence, 0.0);
            assert!(v.reasoning.starts_with("Failed to parse"));
            assert!(!v.decoded);
        }
    }

    #[test]
    fn test_lenient_numbers() {
        let raw = r#"{"approval_status": "approved", "confidence": "8",
            "income": "$85,000", "credit_score": null, "approval_amount": "7.5k"}"#;
        let v = parse_verdict(raw);
        assert_eq!(v.confidence, 8.0);
        assert_eq!(v.income, Some(85_000));
        assert_eq!(v.credit_score, None);
        assert_eq!(v.credit_limit, Some(7_500));
    }

    #[test]
    fn test_not_relevant_signals() {
        let explicit = parse_verdict(r#"{"approval_status": "not_relevant", "confidence": 9}"#);
        assert_eq!(explicit.label, OutcomeLabel::Excluded);

        let spaced = parse_verdict(r#"{"approval_status": "Not Relevant", "confidence": 9}"#);
        assert_eq!(spaced.label, OutcomeLabel::Excluded);

        let implied = parse_verdict(
            r#"{"approval_status": "unknown", "confidence": 6, "reasoning": "Post is not about Freedom cards, it is about Savor"}"#,
        );
        assert_eq!(implied.label, OutcomeLabel::Excluded);

        let plain = parse_verdict(r#"{"approval_status": "unknown", "confidence": 2, "reasoning": "unclear"}"#);
        assert_eq!(plain.label, OutcomeLabel::Unknown);
    }

    #[test]
    fn test_negative_numbers_are_dropped() {
        let v = parse_verdict(r#"{"approval_status": "approved", "confidence": 5, "income": -1}"#);
        assert_eq!(v.income, None);
    }
}

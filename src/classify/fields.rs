//! Numeric field extraction: income, credit score, credit limit.
//!
//! Each field has an ordered rule list. Rules run against the title first and
//! only then against the body, since authors usually summarize their numbers
//! in the title. Within a rule every match is tried in order and the first
//! value inside the field's plausibility range wins. Out-of-range values are
//! discarded, never clamped.
//!
//! Gaps between a keyword and its number are bounded, stay inside one
//! sentence and never skip over another number, so "approved with 720 FICO and
//! a $5k limit" does not read 720 as the limit. A number followed by a score,
//! income or rate word before the limit keyword is not a limit either.

use crate::models::ExtractedFields;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::ops::RangeInclusive;

/// Which numeric field a rule extracts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Income,
    CreditScore,
    CreditLimit,
}

impl FieldKind {
    /// Hard plausibility range for the field.
    pub fn range(self) -> RangeInclusive<u32> {
        match self {
            FieldKind::Income => 10_000..=500_000,
            FieldKind::CreditScore => 300..=850,
            FieldKind::CreditLimit => 500..=50_000,
        }
    }

    /// `Some(value)` if `value` is inside the field's range.
    pub fn plausible(self, value: u32) -> Option<u32> {
        self.range().contains(&value).then_some(value)
    }

    fn rules(self) -> &'static [Regex] {
        match self {
            FieldKind::Income => &INCOME_RULES,
            FieldKind::CreditScore => &SCORE_RULES,
            FieldKind::CreditLimit => &LIMIT_RULES,
        }
    }
}

/// Money amount: `$5,000`, `5000`, `85k`, `5.5k`.
const MONEY: &str = r"\$?\s?(?P<num>\d{1,3}(?:,\d{3})+|\d+(?:\.\d+)?)\s?(?P<k>k\b)?";
const SCORE: &str = r"\b(?P<num>\d{3})\b";

fn gap(max: usize) -> String {
    format!(r"[^.\n\d]{{0,{max}}}?")
}

fn compile(patterns: Vec<String>) -> Vec<Regex> {
    patterns
        .iter()
        .map(|p| Regex::new(p).expect("built-in field pattern compiles"))
        .collect()
}

static INCOME_RULES: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile(vec![
        format!(r"\b(?:annual income|income|salary)\b{}{MONEY}", gap(40)),
        format!(
            r"\b(?:make|earn|making|earning)\b{}{MONEY}{}\b(?:annually|yearly|per year|a year|/yr|/year)",
            gap(40),
            gap(30)
        ),
        format!(r"{MONEY}{}\b(?:income|salary)\b", gap(20)),
    ])
});

static SCORE_RULES: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile(vec![
        format!(r"\b(?:credit score|fico|vantage(?:score)?|score)\b{}{SCORE}", gap(25)),
        format!(r"{SCORE}{}\b(?:credit score|fico|vantage|score)\b", gap(20)),
    ])
});

/// Words that make a number something other than a limit.
static NOT_A_LIMIT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"%|\b(?:apr|fico|credit score|score|income|salary)\b")
        .expect("limit veto pattern compiles")
});

/// Limit rules carry an optional `veto` group (a number immediately followed
/// by a score/income/rate word) or a `between` group (the text between a
/// number and the limit keyword). Either one naming [`NOT_A_LIMIT`] words
/// discards the match.
static LIMIT_RULES: Lazy<Vec<Regex>> = Lazy::new(|| {
    let veto = r"(?P<veto>\s*(?:%|apr\b|fico\b|credit score\b|score\b|income\b|salary\b))?";
    compile(vec![
        format!(
            r"\b(?:starting limit|credit limit|credit line|limit of|limit|sl|cl)\b{}{MONEY}{veto}",
            gap(20)
        ),
        format!(r"{MONEY}(?P<between>{})\b(?:limit|credit line|sl|cl)\b", gap(15)),
        format!(r"\bapproved\b{}{MONEY}{veto}", gap(40)),
    ])
});

/// Extract one field, title first, then body.
///
/// Never fails: anything that does not parse to an in-range number is
/// treated as no match.
pub fn extract(kind: FieldKind, title: &str, body: &str) -> Option<u32> {
    [title, body]
        .into_iter()
        .find_map(|text| extract_from(kind, &text.to_lowercase()))
}

fn extract_from(kind: FieldKind, text: &str) -> Option<u32> {
    kind.rules().iter().find_map(|rule| {
        rule.captures_iter(text)
            .filter(|caps| !vetoed(caps))
            .find_map(|caps| parse_amount(&caps).and_then(|v| kind.plausible(v)))
    })
}

fn vetoed(caps: &Captures<'_>) -> bool {
    caps.name("veto").is_some()
        || caps
            .name("between")
            .is_some_and(|m| NOT_A_LIMIT.is_match(m.as_str()))
}

/// Extract every field at once.
pub fn extract_all(title: &str, body: &str) -> ExtractedFields {
    ExtractedFields {
        income: extract(FieldKind::Income, title, body),
        credit_score: extract(FieldKind::CreditScore, title, body),
        credit_limit: extract(FieldKind::CreditLimit, title, body),
    }
}

fn parse_amount(caps: &Captures<'_>) -> Option<u32> {
    let digits = caps.name("num")?.as_str().replace(',', "");
    let mut value: f64 = digits.parse().ok()?;
    if caps.name("k").is_some() {
        value *= 1_000.0;
    }
    to_whole(value)
}

/// Round a parsed amount to a whole number; `None` for negative, NaN or huge values.
pub(crate) fn to_whole(value: f64) -> Option<u32> {
    let rounded = value.round();
    (rounded.is_finite() && rounded >= 0.0 && rounded <= f64::from(u32::MAX))
        .then_some(rounded as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scenario_limit_and_score() {
        let title = "Got approved for Product-A, credit limit of $5,000, FICO 720";
        let fields = extract_all(title, "");
        assert_eq!(fields.credit_limit, Some(5000));
        assert_eq!(fields.credit_score, Some(720));
        assert_eq!(fields.income, None);
    }

    #[test]
    fn test_income_forms() {
        assert_eq!(extract(FieldKind::Income, "Income: $85,000", ""), Some(85_000));
        assert_eq!(extract(FieldKind::Income, "salary 72k, CFU approved", ""), Some(72_000));
        assert_eq!(
            extract(FieldKind::Income, "", "I make about $60,000 per year as a nurse"),
            Some(60_000)
        );
        assert_eq!(extract(FieldKind::Income, "", "$45,000 income, 2 cards"), Some(45_000));
    }

    #[test]
    fn test_title_takes_precedence_over_body() {
        let title = "CFU approved, income 90k";
        let body = "Stated income was $120,000 on a previous app";
        assert_eq!(extract(FieldKind::Income, title, body), Some(90_000));
        assert_eq!(extract(FieldKind::Income, "CFU approved", body), Some(120_000));
    }

    #[test]
    fn test_out_of_range_values_are_discarded() {
        assert_eq!(extract(FieldKind::CreditScore, "FICO 920", ""), None);
        assert_eq!(extract(FieldKind::CreditScore, "score 250", ""), None);
        assert_eq!(extract(FieldKind::CreditLimit, "credit limit of $200", ""), None);
        assert_eq!(extract(FieldKind::CreditLimit, "credit limit of $75,000", ""), None);
        assert_eq!(extract(FieldKind::Income, "income 5000", ""), None);
    }

    #[test]
    fn test_first_plausible_match_wins() {
        // 920 is implausible, the next match in the same rule is used.
        assert_eq!(
            extract(FieldKind::CreditScore, "", "score 920 (typo), real score 705"),
            Some(705)
        );
    }

    #[test]
    fn test_limit_ignores_score_after_approved() {
        let title = "Approved with 720 FICO and a $5k limit";
        assert_eq!(extract(FieldKind::CreditLimit, title, ""), Some(5000));
        assert_eq!(extract(FieldKind::CreditScore, title, ""), Some(720));
    }

    #[test]
    fn test_score_before_limit_keyword_is_not_a_limit() {
        assert_eq!(
            extract(FieldKind::CreditLimit, "CFU approved! 720 FICO, limit 5000", ""),
            Some(5000)
        );
        assert_eq!(
            extract(
                FieldKind::CreditLimit,
                "",
                "My 710 score got me a limit of... wait, I mean $3,000"
            ),
            None
        );
        assert_eq!(
            extract(FieldKind::CreditLimit, "", "650 credit score but a 2k limit"),
            Some(2000)
        );
    }

    #[test]
    fn test_limit_forms() {
        assert_eq!(extract(FieldKind::CreditLimit, "Starting limit 3500", ""), Some(3500));
        assert_eq!(extract(FieldKind::CreditLimit, "got a 7.5k SL", ""), Some(7500));
        assert_eq!(
            extract(FieldKind::CreditLimit, "", "Approved for $12,000 on the CFF"),
            Some(12_000)
        );
    }

    #[test]
    fn test_no_numbers_no_fields() {
        let fields = extract_all("Denied for CFU", "No reason given, will recon tomorrow.");
        assert_eq!(fields, ExtractedFields::default());
    }

    #[test]
    fn test_extraction_is_idempotent() {
        let title = "CFU approved $8,000 SL, income 95k, fico 760";
        let body = "First chase card!";
        assert_eq!(extract_all(title, body), extract_all(title, body));
    }

    #[test]
    fn test_extracted_values_stay_in_range() {
        let samples = [
            ("income 1,000,000", "score 999 limit of 99999"),
            ("approved 100", "credit limit 49,999 fico 851"),
            ("make 9k a year", "salary $500,001"),
        ];
        for (title, body) in samples {
            let f = extract_all(title, body);
            if let Some(v) = f.income {
                assert!(FieldKind::Income.range().contains(&v));
            }
            if let Some(v) = f.credit_score {
                assert!(FieldKind::CreditScore.range().contains(&v));
            }
            if let Some(v) = f.credit_limit {
                assert!(FieldKind::CreditLimit.range().contains(&v));
            }
        }
    }

    #[test]
    fn test_to_whole() {
        assert_eq!(to_whole(5499.6), Some(5500));
        assert_eq!(to_whole(-1.0), None);
        assert_eq!(to_whole(f64::NAN), None);
        assert_eq!(to_whole(1e12), None);
    }
}

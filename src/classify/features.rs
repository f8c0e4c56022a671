//! Binary text features attached to every classified record, and the
//! datapoint check used by the strict filter profile.

use super::static_phrases;
use crate::models::TextFeatures;
use once_cell::sync::Lazy;
use regex::Regex;

static STUDENT: Lazy<Regex> =
    Lazy::new(|| static_phrases(&["student", "college", "university", "school"]));

static FIRST_CARD: Lazy<Regex> = Lazy::new(|| {
    static_phrases(&["first card", "first credit card", "first cc", "first time", "beginner"])
});

static BANK_RELATIONSHIP: Lazy<Regex> = Lazy::new(|| {
    static_phrases(&[
        "chase account",
        "chase checking",
        "chase savings",
        "chase relationship",
        "chase customer",
        "chase banking",
        "checking account",
        "savings account",
        "banking relationship",
        "existing customer",
    ])
});

static INCOME_MENTION: Lazy<Regex> =
    Lazy::new(|| static_phrases(&["income", "salary", "make", "earn", "annual"]));

static SCORE_MENTION: Lazy<Regex> =
    Lazy::new(|| static_phrases(&["credit score", "fico", "score", "vantage"]));

/// Phrases that introduce an applicant number or a stated reason.
static DATAPOINT: Lazy<Regex> = Lazy::new(|| {
    static_phrases(&[
        "income",
        "credit score",
        "fico",
        "approved for",
        "approval amount",
        "limit of",
        "starting limit",
        "credit limit",
        "approved with",
        "denied with",
        "denial with",
        "denied due to",
    ])
});

/// Compute the binary features of a post.
///
/// # Arguments
///
/// * `title` - Post title, any case
/// * `body` - Post body, any case; may be empty
///
/// # Returns
///
/// Keyword flags over the lower-cased text, plus `text_length`, the character
/// count of title and body joined by one space.
pub fn text_features(title: &str, body: &str) -> TextFeatures {
    let text = format!("{title} {body}").to_lowercase();
    TextFeatures {
        is_student: STUDENT.is_match(&text),
        is_first_card: FIRST_CARD.is_match(&text),
        has_bank_relationship: BANK_RELATIONSHIP.is_match(&text),
        mentions_income: INCOME_MENTION.is_match(&text),
        mentions_credit_score: SCORE_MENTION.is_match(&text),
        text_length: title.chars().count() + 1 + body.chars().count(),
    }
}

/// Whether lower-cased `text` reports a number or a reason, not just an outcome.
pub fn mentions_datapoint(text: &str) -> bool {
    DATAPOINT.is_match(text)
}

//! Title-based outcome label and rule confidence.
//!
//! The confidence score is both the inclusion threshold for the curated output
//! and the baseline the secondary classifier has to beat to override.
//!
//! | Signal | Points |
//! |--------|--------|
//! | exact outcome word (`approved`, `denied`, `rejected`) | 5 |
//! | softer phrase (`got approved`, `was denied`, ...) | 4 |
//! | question wording (`odds`, `chances`, `advice`, ...) | 1 |
//! | brand or product term | 2 |
//!
//! A softer phrase always contains an exact word, so "got approved" scores 9
//! while a bare question with a brand mention scores 3.

use super::card::{CardClassifier, NEGATED_APPROVAL};
use super::static_phrases;
use crate::models::OutcomeLabel;
use once_cell::sync::Lazy;
use regex::Regex;

/// Points per title signal. An exact outcome word outweighs a softer phrase.
pub const EXACT_OUTCOME_POINTS: u32 = 5;
pub const SOFT_PHRASE_POINTS: u32 = 4;
pub const QUESTION_POINTS: u32 = 1;
pub const BRAND_POINTS: u32 = 2;

static EXACT_OUTCOME: Lazy<Regex> = Lazy::new(|| static_phrases(&["approved", "denied", "rejected"]));

static SOFT_PHRASE: Lazy<Regex> = Lazy::new(|| {
    static_phrases(&["got approved", "got denied", "was approved", "was denied"])
});

static QUESTION_WORDING: Lazy<Regex> =
    Lazy::new(|| static_phrases(&["odds", "chances", "should i", "help", "advice"]));

static APPROVAL_INDICATORS: Lazy<Regex> = Lazy::new(|| {
    static_phrases(&[
        "approved",
        "got approved",
        "was approved",
        "instant approval",
        "approved for",
        "got the card",
        "received the card",
        "successful",
        "approval success",
        "got it",
        "accepted",
    ])
});

static DENIAL_INDICATORS: Lazy<Regex> = Lazy::new(|| {
    static_phrases(&[
        "denied",
        "got denied",
        "was denied",
        "rejected",
        "rejection",
        "application denied",
        "declined",
        "denial",
        "got rejected",
        "was rejected",
    ])
});

static QUESTION_INDICATORS: Lazy<Regex> = Lazy::new(|| {
    static_phrases(&[
        "approval odds",
        "chances of approval",
        "should i apply",
        "will i get approved",
        "approval likelihood",
        "recommendations",
        "help",
        "advice",
        "what card",
        "which card",
        "next card",
        "approval question",
        "odds",
        "chances",
    ])
});

/// Outcome label from the title alone.
///
/// Negated approval ("not approved") is checked first; after that approval
/// indicators win over denial indicators, which win over question wording.
pub fn classify_title(title: &str) -> OutcomeLabel {
    let title = title.to_lowercase();
    if NEGATED_APPROVAL.is_match(&title) {
        OutcomeLabel::Denied
    } else if APPROVAL_INDICATORS.is_match(&title) {
        OutcomeLabel::Approved
    } else if DENIAL_INDICATORS.is_match(&title) {
        OutcomeLabel::Denied
    } else if QUESTION_INDICATORS.is_match(&title) {
        OutcomeLabel::Question
    } else {
        OutcomeLabel::Unknown
    }
}

/// Score how unambiguous a title is about its outcome.
pub fn score_title(title: &str, cards: &CardClassifier) -> u32 {
    let title = title.to_lowercase();
    let mut score = 0;
    if EXACT_OUTCOME.is_match(&title) {
        score += EXACT_OUTCOME_POINTS;
    }
    if SOFT_PHRASE.is_match(&title) {
        score += SOFT_PHRASE_POINTS;
    }
    if QUESTION_WORDING.is_match(&title) {
        score += QUESTION_POINTS;
    }
    if cards.mentions_brand(&title) {
        score += BRAND_POINTS;
    }
    score
}

//! Second-opinion classification by a language model.
//!
//! The rule pipeline consults a [`SecondaryClassifier`] for records it is not
//! sure about. The classifier sees the post text and the product it was
//! attributed to, and answers with a label, a confidence, optional numeric
//! fields and a short reasoning.
//!
//! # Architecture
//!
//! - [`SecondaryClassifier`]: Core trait, one post in, one verdict out
//! - [`ollama::OllamaClassifier`]: Local model served by Ollama
//! - [`retry::RetryClassifier`]: Decorator adding backoff on transport errors
//! - [`parse`]: Lenient decoding of the model's free-text answer
//!
//! Transport failures surface as [`SecondaryError`]; the caller falls back to
//! the rule result. Output that cannot be decoded is not an error: it becomes
//! the zero-confidence sentinel, and the record keeps its rule result just
//! as if the call had failed.

pub mod ollama;
pub mod parse;
pub mod retry;

use crate::error::SecondaryError;
use crate::models::{OutcomeLabel, ProductIdentity};
use serde::{Deserialize, Serialize};

/// What the classifier is asked about.
#[derive(Debug, Clone, Copy)]
pub struct SecondaryRequest<'a> {
    pub title: &'a str,
    pub body: &'a str,
    pub product: &'a ProductIdentity,
    /// Human name of the product family, e.g. "Chase Freedom".
    pub family_name: &'a str,
}

/// Decoded classifier answer, before confidence normalisation and range checks.
#[derive(Debug, Clone, PartialEq)]
pub struct SecondaryVerdict {
    /// [`OutcomeLabel::Excluded`] when the model said the post is off-topic.
    pub label: OutcomeLabel,
    /// Raw confidence on the classifier's own scale.
    pub confidence: f64,
    pub income: Option<u32>,
    pub credit_score: Option<u32>,
    pub credit_limit: Option<u32>,
    pub reasoning: String,
    /// False for the sentinel; the reconciler treats it like a failed call.
    pub decoded: bool,
}

impl SecondaryVerdict {
    /// The answer used when the model's output could not be decoded.
    pub fn sentinel(reasoning: impl Into<String>) -> Self {
        Self {
            decoded: false,
            label: OutcomeLabel::Unknown,
            confidence: 0.0,
            income: None,
            credit_score: None,
            credit_limit: None,
            reasoning: reasoning.into(),
        }
    }
}

/// Scale the classifier reports confidence on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceScale {
    /// 0 to 10, directly comparable with rule confidence.
    #[default]
    Ten,
    /// 0 to 100, divided by ten before comparison.
    Hundred,
}

impl ConfidenceScale {
    /// Map a raw confidence onto 0..=10. Non-finite values become 0.
    pub fn normalize(self, raw: f64) -> f64 {
        if !raw.is_finite() {
            return 0.0;
        }
        let scaled = match self {
            ConfidenceScale::Ten => raw,
            ConfidenceScale::Hundred => raw / 10.0,
        };
        scaled.clamp(0.0, 10.0)
    }
}

/// Something that can give a second opinion on a post.
pub trait SecondaryClassifier {
    async fn classify(
        &self,
        request: &SecondaryRequest<'_>,
    ) -> Result<SecondaryVerdict, SecondaryError>;
}

impl<T: SecondaryClassifier> SecondaryClassifier for &T {
    async fn classify(
        &self,
        request: &SecondaryRequest<'_>,
    ) -> Result<SecondaryVerdict, SecondaryError> {
        (**self).classify(request).await
    }
}

/// Build the instruction prompt for one post.
pub fn build_prompt(request: &SecondaryRequest<'_>, scale: ConfidenceScale) -> String {
    let family = request.family_name;
    let card = match request.product {
        ProductIdentity::Variant(name) => name.clone(),
        _ => family.to_string(),
    };
    let max_confidence = match scale {
        ConfidenceScale::Ten => 10,
        ConfidenceScale::Hundred => 100,
    };
    format!(
        r#"You are analyzing a forum post about a credit card application.

POST TITLE: {title}
POST BODY: {body}
CARD: {card}

Only classify posts about the {family} family of cards. If the post is about other cards and does not describe an application for {card}, answer "not_relevant".

Respond with a JSON object containing:
1. "approval_status": "approved", "denied", "question", "unknown" or "not_relevant"
2. "confidence": 0-{max_confidence} score for your classification
3. "income": annual income if mentioned (number only, or null)
4. "credit_score": credit score if mentioned (number only, or null)
5. "approval_amount": credit limit if mentioned (number only, or null)
6. "reasoning": brief explanation of your classification

Base the status on clear approval or denial language about {card}. Only extract numbers that are clearly an income, a credit score or a credit limit. If uncertain, answer "unknown".

Respond only with valid JSON."#,
        title = request.title,
        body = request.body,
    )
}

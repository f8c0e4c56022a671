//! Data models for collected posts and their classified representations.
//!
//! This module defines the core data structures used throughout the application:
//! - [`RawItem`]: One discussion post as returned by the search capability
//! - [`CorpusEntry`]: A raw item plus the collection-time labels, one line of the raw corpus
//! - [`ClassifiedRecord`]: The labeled record produced by the classification pipeline
//! - [`ClassifiedSnapshot`]: The whole derived corpus written at the end of a classification run
//!
//! Raw items are immutable once collected. A classified record is derived from
//! exactly one raw item and is only ever rebuilt wholesale by rerunning the
//! pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single forum post as returned by the search capability.
///
/// # Fields
///
/// * `id` - Stable external identifier (absolute permalink URL), the dedup key
/// * `title` - Post title
/// * `body` - Free text body, may be empty for link posts
/// * `source_location` - Forum section the post came from, e.g. `Reddit-CreditCards`
/// * `observed_at` - When this run collected the post
/// * `created_at` - The post's own creation time, used for recency filtering
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RawItem {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub body: String,
    pub source_location: String,
    pub observed_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl RawItem {
    /// Lower-cased `title body` text used by every keyword rule.
    pub fn combined_text(&self) -> String {
        format!("{} {}", self.title, self.body).to_lowercase()
    }
}

/// Which product of the tracked family a post is about.
///
/// Variant names come from the product catalog, so the set is closed per
/// deployment rather than per build.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(tag = "kind", content = "name", rename_all = "snake_case")]
pub enum ProductIdentity {
    /// A specific variant, named as in the catalog.
    Variant(String),
    /// The family is mentioned but no specific variant is.
    Generic,
    /// No tracked product, or a premium-tier product vetoed the match.
    NoneDetected,
}

impl ProductIdentity {
    pub fn is_detected(&self) -> bool {
        !matches!(self, ProductIdentity::NoneDetected)
    }
}

impl fmt::Display for ProductIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProductIdentity::Variant(name) => f.write_str(name),
            ProductIdentity::Generic => f.write_str("generic"),
            ProductIdentity::NoneDetected => f.write_str("none detected"),
        }
    }
}

/// Discrete decision result inferred for a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeLabel {
    Approved,
    Denied,
    Question,
    Unknown,
    /// The secondary classifier said the post is not about the tracked products.
    Excluded,
}

impl OutcomeLabel {
    /// Labels that can go into the curated output.
    pub fn is_decision(self) -> bool {
        matches!(self, OutcomeLabel::Approved | OutcomeLabel::Denied)
    }
}

impl fmt::Display for OutcomeLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OutcomeLabel::Approved => "approved",
            OutcomeLabel::Denied => "denied",
            OutcomeLabel::Question => "question",
            OutcomeLabel::Unknown => "unknown",
            OutcomeLabel::Excluded => "excluded",
        };
        f.write_str(s)
    }
}

/// One line of the persisted raw corpus.
///
/// The raw item is flattened so the file reads as a plain table keyed by `id`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct CorpusEntry {
    #[serde(flatten)]
    pub item: RawItem,
    pub product: ProductIdentity,
    pub outcome: OutcomeLabel,
}

/// Numeric fields pulled out of a post.
///
/// Each value is `None` unless it passed its field's plausibility range.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct ExtractedFields {
    pub income: Option<u32>,
    pub credit_score: Option<u32>,
    pub credit_limit: Option<u32>,
}

/// Binary text features used by downstream modeling.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct TextFeatures {
    pub is_student: bool,
    pub is_first_card: bool,
    pub has_bank_relationship: bool,
    pub mentions_income: bool,
    pub mentions_credit_score: bool,
    pub text_length: usize,
}

/// What the secondary classifier said about a record.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SecondaryOpinion {
    pub label: OutcomeLabel,
    /// Confidence normalised to the 0-10 scale.
    pub confidence: f64,
    pub reasoning: String,
    /// Range-validated numeric fields the classifier reported.
    pub fields: ExtractedFields,
}

/// A fully labeled record, derived from exactly one [`RawItem`].
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ClassifiedRecord {
    pub id: String,
    pub title: String,
    pub body: String,
    pub source_location: String,
    pub created_at: DateTime<Utc>,
    pub product: ProductIdentity,
    /// Rule-based outcome label.
    pub outcome_label: OutcomeLabel,
    pub rule_confidence: u32,
    /// Rule-based numeric fields.
    pub extracted: ExtractedFields,
    pub used_secondary_classifier: bool,
    /// Present only when the secondary classifier was consulted.
    pub secondary: Option<SecondaryOpinion>,
    pub final_label: OutcomeLabel,
    pub final_fields: ExtractedFields,
    pub features: TextFeatures,
}

/// Counters describing one classification run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct ClassificationSummary {
    pub total: usize,
    pub rule_filtered: usize,
    pub secondary_consulted: usize,
    pub secondary_overrides: usize,
    pub secondary_failures: usize,
    pub excluded: usize,
    pub dropped_undecided: usize,
    pub kept: usize,
}

/// The derived corpus written at the end of a classification run.
#[derive(Debug, Deserialize, Serialize)]
pub struct ClassifiedSnapshot {
    pub generated_at: DateTime<Utc>,
    pub input: String,
    pub summary: ClassificationSummary,
    pub records: Vec<ClassifiedRecord>,
}

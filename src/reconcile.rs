//! Rule-then-model classification of the raw corpus.
//!
//! Every record moves through the same states:
//!
//! ```text
//! RuleClassified ──filter──▶ triage ──▶ Local ─────────────┐
//!                                   └─▶ NeedsSecondary ──▶ reconcile ──▶ finalize
//! ```
//!
//! Rules always run. The profile filter drops records that are not a clear
//! decision about a tracked product. Triage decides per [`ValidationMode`]
//! whether a second opinion is wanted. Reconciliation applies the precedence
//! rules:
//!
//! - a secondary confidence strictly above the rule confidence replaces the
//!   rule label, and its in-range numeric fields replace the rule values
//! - a "not relevant" answer forces [`OutcomeLabel::Excluded`] whatever the confidences
//! - a failed or undecodable call leaves the rule result untouched
//!
//! Finalization keeps only approved and denied records.

use crate::classify::CardClassifier;
use crate::classify::confidence::{classify_title, score_title};
use crate::classify::features::{mentions_datapoint, text_features};
use crate::classify::fields::{FieldKind, extract_all};
use crate::models::{
    ClassificationSummary, ClassifiedRecord, CorpusEntry, ExtractedFields, OutcomeLabel,
    ProductIdentity, RawItem, SecondaryOpinion, TextFeatures,
};
use crate::secondary::{ConfidenceScale, SecondaryClassifier, SecondaryRequest, SecondaryVerdict};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

/// Precision/recall trade-off of the rule filter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum FilterProfile {
    /// Confidence at least 3, specific variants only, and the post must carry a datapoint.
    #[default]
    Strict,
    /// Confidence at least 1, generic family mentions allowed, competitor posts dropped.
    Broad,
}

impl FilterProfile {
    /// Lowest rule confidence a record may have; `--min-confidence` overrides it.
    pub fn min_confidence(self) -> u32 {
        match self {
            FilterProfile::Strict => 3,
            FilterProfile::Broad => 1,
        }
    }

    /// Whether records attributed to `product` may pass.
    ///
    /// # Returns
    ///
    /// `true` for any variant, `true` for the generic family only under
    /// [`FilterProfile::Broad`], and never for an undetected product.
    pub fn allows(self, product: &ProductIdentity) -> bool {
        match product {
            ProductIdentity::Variant(_) => true,
            ProductIdentity::Generic => self == FilterProfile::Broad,
            ProductIdentity::NoneDetected => false,
        }
    }

    /// Drop posts that also name another issuer's product.
    pub fn excludes_competitors(self) -> bool {
        self == FilterProfile::Broad
    }

    /// Keep only posts with an extracted field or a datapoint phrase
    /// ("approved with", "credit limit", "denied due to", ...).
    pub fn requires_datapoint(self) -> bool {
        self == FilterProfile::Strict
    }
}

/// When the secondary classifier is consulted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationMode {
    /// Never.
    RulesOnly,
    /// For every record that passed the filter.
    Full,
    /// Only when rule confidence is below `threshold`.
    Selective { threshold: u32 },
}

/// Knobs for one classification run. The default is the strict profile with
/// selective validation below confidence 5.
#[derive(Debug, Clone, Copy)]
pub struct ReconcileOptions {
    pub profile: FilterProfile,
    /// Overrides the profile's minimum rule confidence.
    pub min_confidence: Option<u32>,
    pub mode: ValidationMode,
    pub scale: ConfidenceScale,
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        Self {
            profile: FilterProfile::default(),
            min_confidence: None,
            mode: ValidationMode::Selective { threshold: 5 },
            scale: ConfidenceScale::default(),
        }
    }
}

impl ReconcileOptions {
    pub fn confidence_threshold(&self) -> u32 {
        self.min_confidence
            .unwrap_or_else(|| self.profile.min_confidence())
    }
}

/// Output of the rule stage for one corpus entry.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleClassified {
    pub item: RawItem,
    /// Product stored at collection time.
    pub declared_product: ProductIdentity,
    /// Product detected now, from the current catalog.
    pub product: ProductIdentity,
    pub label: OutcomeLabel,
    pub confidence: u32,
    pub fields: ExtractedFields,
    pub features: TextFeatures,
}

impl RuleClassified {
    /// Borrow this record as a secondary classifier request.
    ///
    /// # Arguments
    ///
    /// * `family_name` - Human name of the product family, quoted in the prompt
    pub fn request<'a>(&'a self, family_name: &'a str) -> SecondaryRequest<'a> {
        SecondaryRequest {
            title: &self.item.title,
            body: &self.item.body,
            product: &self.product,
            family_name,
        }
    }

    fn into_record(
        self,
        secondary: Option<SecondaryOpinion>,
        final_label: OutcomeLabel,
        final_fields: ExtractedFields,
    ) -> ClassifiedRecord {
        ClassifiedRecord {
            id: self.item.id,
            title: self.item.title,
            body: self.item.body,
            source_location: self.item.source_location,
            created_at: self.item.created_at,
            product: self.product,
            outcome_label: self.label,
            rule_confidence: self.confidence,
            extracted: self.fields,
            used_secondary_classifier: secondary.is_some(),
            secondary,
            final_label,
            final_fields,
            features: self.features,
        }
    }
}

/// Triage result: finish locally or ask for a second opinion.
#[derive(Debug)]
pub enum Outcome {
    Local(RuleClassified),
    NeedsSecondary(RuleClassified),
}

/// Runs the rule stage, consults the secondary classifier where triage asks,
/// and merges the two.
///
/// # Examples
///
/// ```ignore
/// let cards = CardClassifier::new(&ProductCatalog::default())?;
/// let reconciler = HybridReconciler::new(&cards, "Chase Freedom", ReconcileOptions::default());
/// let (records, summary) = reconciler.run(&entries, Some(&ollama)).await;
/// ```
pub struct HybridReconciler<'a> {
    cards: &'a CardClassifier,
    family_name: &'a str,
    options: ReconcileOptions,
}

impl<'a> HybridReconciler<'a> {
    pub fn new(cards: &'a CardClassifier, family_name: &'a str, options: ReconcileOptions) -> Self {
        Self {
            cards,
            family_name,
            options,
        }
    }

    /// Run every rule over one entry.
    ///
    /// The rule label is the collection-time outcome when that is already a
    /// decision, otherwise the title outcome.
    pub fn rule_classify(&self, entry: &CorpusEntry) -> RuleClassified {
        let item = &entry.item;
        let text = item.combined_text();
        let label = if entry.outcome.is_decision() {
            entry.outcome
        } else {
            classify_title(&item.title)
        };
        RuleClassified {
            declared_product: entry.product.clone(),
            product: self.cards.detect_product(&text),
            label,
            confidence: score_title(&item.title, self.cards),
            fields: extract_all(&item.title, &item.body),
            features: text_features(&item.title, &item.body),
            item: item.clone(),
        }
    }

    /// Profile filter applied before any secondary call.
    pub fn passes_filter(&self, rule: &RuleClassified) -> bool {
        let profile = self.options.profile;
        if !rule.label.is_decision() || rule.confidence < self.options.confidence_threshold() {
            return false;
        }
        if !profile.allows(&rule.product) {
            return false;
        }
        let text = rule.item.combined_text();
        // A variant stored by an older catalog must still be named in the text.
        if matches!(rule.declared_product, ProductIdentity::Variant(_))
            && !self.cards.mentions(&rule.declared_product, &text)
        {
            return false;
        }
        if profile.requires_datapoint()
            && rule.fields == ExtractedFields::default()
            && !mentions_datapoint(&text)
        {
            return false;
        }
        !(profile.excludes_competitors() && self.cards.mentions_competitor(&text))
    }

    pub fn triage(&self, rule: RuleClassified) -> Outcome {
        match self.options.mode {
            ValidationMode::Full => Outcome::NeedsSecondary(rule),
            ValidationMode::Selective { threshold } if rule.confidence < threshold => {
                Outcome::NeedsSecondary(rule)
            }
            _ => Outcome::Local(rule),
        }
    }

    /// Merge a secondary verdict into the rule result.
    ///
    /// `None` and undecodable verdicts leave the rule result as is, with
    /// `used_secondary_classifier == false`.
    pub fn reconcile(
        &self,
        rule: RuleClassified,
        verdict: Option<SecondaryVerdict>,
    ) -> ClassifiedRecord {
        let Some(verdict) = verdict.filter(|v| v.decoded) else {
            let (label, fields) = (rule.label, rule.fields);
            return rule.into_record(None, label, fields);
        };

        let confidence = self.options.scale.normalize(verdict.confidence);
        let fields = ExtractedFields {
            income: verdict.income.and_then(|v| FieldKind::Income.plausible(v)),
            credit_score: verdict
                .credit_score
                .and_then(|v| FieldKind::CreditScore.plausible(v)),
            credit_limit: verdict
                .credit_limit
                .and_then(|v| FieldKind::CreditLimit.plausible(v)),
        };

        let (mut final_label, mut final_fields) = (rule.label, rule.fields);
        if confidence > f64::from(rule.confidence) {
            final_label = verdict.label;
            final_fields = ExtractedFields {
                income: fields.income.or(rule.fields.income),
                credit_score: fields.credit_score.or(rule.fields.credit_score),
                credit_limit: fields.credit_limit.or(rule.fields.credit_limit),
            };
        }
        if verdict.label == OutcomeLabel::Excluded {
            final_label = OutcomeLabel::Excluded;
        }

        let opinion = SecondaryOpinion {
            label: verdict.label,
            confidence,
            reasoning: verdict.reasoning,
            fields,
        };
        rule.into_record(Some(opinion), final_label, final_fields)
    }

    /// Classify a whole corpus, consulting `secondary` sequentially where triage asks for it.
    #[instrument(level = "info", skip_all, fields(entries = entries.len(), mode = ?self.options.mode, profile = ?self.options.profile))]
    pub async fn run<S: SecondaryClassifier>(
        &self,
        entries: &[CorpusEntry],
        secondary: Option<&S>,
    ) -> (Vec<ClassifiedRecord>, ClassificationSummary) {
        let mut summary = ClassificationSummary {
            total: entries.len(),
            ..ClassificationSummary::default()
        };
        let mut kept = Vec::new();

        for entry in entries {
            let rule = self.rule_classify(entry);
            if !self.passes_filter(&rule) {
                summary.rule_filtered += 1;
                continue;
            }

            let record = match (self.triage(rule), secondary) {
                (Outcome::NeedsSecondary(rule), Some(classifier)) => {
                    summary.secondary_consulted += 1;
                    let verdict = match classifier.classify(&rule.request(self.family_name)).await {
                        Ok(v) if v.decoded => Some(v),
                        Ok(v) => {
                            warn!(id = %rule.item.id, reasoning = %v.reasoning, "Secondary output undecodable; keeping rule result");
                            summary.secondary_failures += 1;
                            None
                        }
                        Err(e) => {
                            warn!(id = %rule.item.id, error = %e, "Secondary classifier failed; keeping rule result");
                            summary.secondary_failures += 1;
                            None
                        }
                    };
                    self.reconcile(rule, verdict)
                }
                (Outcome::NeedsSecondary(rule) | Outcome::Local(rule), _) => {
                    self.reconcile(rule, None)
                }
            };

            let overridden = record
                .secondary
                .as_ref()
                .is_some_and(|o| o.confidence > f64::from(record.rule_confidence));
            if overridden {
                summary.secondary_overrides += 1;
            }

            let excluded = record.final_label == OutcomeLabel::Excluded;
            let id = record.id.clone();
            match finalize(record) {
                Some(record) => kept.push(record),
                None if excluded => {
                    debug!(%id, "Excluded by secondary classifier");
                    summary.excluded += 1;
                }
                None => {
                    debug!(%id, "Dropped without a decision");
                    summary.dropped_undecided += 1;
                }
            }
        }

        summary.kept = kept.len();
        info!(
            total = summary.total,
            rule_filtered = summary.rule_filtered,
            consulted = summary.secondary_consulted,
            overrides = summary.secondary_overrides,
            failures = summary.secondary_failures,
            excluded = summary.excluded,
            kept = summary.kept,
            "Classification finished"
        );
        (kept, summary)
    }
}

/// Keep a record for the curated output only if it ended on a decision.
pub fn finalize(record: ClassifiedRecord) -> Option<ClassifiedRecord> {
    record.final_label.is_decision().then_some(record)
}

//! Product identity detection and the collection-time relevance rules.
//!
//! # Identity rules
//!
//! Evaluated in order over lower-cased `title body` text:
//!
//! 1. Any premium-tier exclusion term → [`ProductIdentity::NoneDetected`]
//! 2. First variant (catalog order) with a matching term → that variant
//! 3. A family term → [`ProductIdentity::Generic`]
//! 4. Otherwise → [`ProductIdentity::NoneDetected`]
//!
//! A post naming two variants is always attributed to the one listed first
//! in the catalog.

use super::{matches, phrase_regex, static_phrases};
use crate::config::ProductCatalog;
use crate::error::ConfigError;
use crate::models::{OutcomeLabel, ProductIdentity};
use once_cell::sync::Lazy;
use regex::Regex;

/// "not approved", "didn't get approved", ...
pub(crate) static NEGATED_APPROVAL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:not|never|wasn't|wasnt|didn't|didnt|wasn’t|didn’t)\s+(?:get\s+|got\s+|been\s+)?approved\b")
        .expect("negated approval pattern compiles")
});

static DENIAL: Lazy<Regex> =
    Lazy::new(|| static_phrases(&["denied", "rejected", "declined", "denial", "rejection"]));

static PREAPPROVAL: Lazy<Regex> = Lazy::new(|| {
    static_phrases(&["preapproved", "pre-approved", "preapproval", "pre-approval", "pre approval"])
});

static APPROVAL: Lazy<Regex> = Lazy::new(|| static_phrases(&["approved"]));

/// Outcome keywords searched for inside the relevance window.
static OUTCOME_KEYWORDS: Lazy<Regex> = Lazy::new(|| {
    static_phrases(&[
        "approved",
        "approval",
        "preapproved",
        "pre-approved",
        "pre-approval",
        "pre approval",
        "denied",
        "denial",
        "rejected",
        "rejection",
        "declined",
    ])
});

static TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\S+").expect("token pattern compiles"));

/// Keyword tables compiled once per run.
#[derive(Debug, Clone)]
pub struct CardClassifier {
    exclusions: Option<Regex>,
    variants: Vec<(String, Regex)>,
    family: Option<Regex>,
    /// Every variant and family term, for locating product mentions.
    product_terms: Option<Regex>,
    brand: Option<Regex>,
    competitors: Option<Regex>,
}

impl CardClassifier {
    /// Compile the catalog's keyword tables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when a variant has no usable terms.
    pub fn new(catalog: &ProductCatalog) -> Result<Self, ConfigError> {
        let mut variants = Vec::with_capacity(catalog.variants.len());
        for variant in &catalog.variants {
            let re = phrase_regex(&variant.terms)?.ok_or_else(|| {
                ConfigError::Invalid(format!("variant {:?} has no terms", variant.name))
            })?;
            variants.push((variant.name.clone(), re));
        }

        let all_terms: Vec<&String> = catalog
            .variants
            .iter()
            .flat_map(|v| v.terms.iter())
            .chain(catalog.family_terms.iter())
            .collect();

        Ok(Self {
            exclusions: phrase_regex(&catalog.premium_exclusions)?,
            variants,
            family: phrase_regex(&catalog.family_terms)?,
            product_terms: phrase_regex(&all_terms)?,
            brand: phrase_regex(&catalog.brand_terms)?,
            competitors: phrase_regex(&catalog.competitor_terms)?,
        })
    }

    /// Infer which product a post is about. `text` must already be lower-cased.
    pub fn detect_product(&self, text: &str) -> ProductIdentity {
        if matches(&self.exclusions, text) {
            return ProductIdentity::NoneDetected;
        }
        for (name, re) in &self.variants {
            if re.is_match(text) {
                return ProductIdentity::Variant(name.clone());
            }
        }
        if matches(&self.family, text) {
            return ProductIdentity::Generic;
        }
        ProductIdentity::NoneDetected
    }

    /// Whether the text actually names the given identity.
    ///
    /// Used to re-verify a stored identity against the text it came from.
    pub fn mentions(&self, identity: &ProductIdentity, text: &str) -> bool {
        match identity {
            ProductIdentity::Variant(name) => self
                .variants
                .iter()
                .find(|(n, _)| n == name)
                .is_some_and(|(_, re)| re.is_match(text)),
            ProductIdentity::Generic => matches(&self.family, text),
            ProductIdentity::NoneDetected => false,
        }
    }

    /// Whether the text names the issuer, which earns the title score its brand bonus.
    pub fn mentions_brand(&self, text: &str) -> bool {
        matches(&self.brand, text)
    }

    /// Whether the text names another issuer's product. `text` must be lower-cased.
    pub fn mentions_competitor(&self, text: &str) -> bool {
        matches(&self.competitors, text)
    }

    /// True when an outcome keyword appears within `window` tokens of a product mention.
    pub fn is_contextually_relevant(&self, text: &str, window: usize) -> bool {
        let Some(product_terms) = &self.product_terms else {
            return false;
        };
        let tokens: Vec<(usize, usize)> = TOKEN
            .find_iter(text)
            .map(|m| (m.start(), m.end()))
            .collect();
        if tokens.is_empty() {
            return false;
        }

        product_terms.find_iter(text).any(|mention| {
            let first = tokens.partition_point(|&(_, end)| end <= mention.start());
            let last = tokens
                .partition_point(|&(start, _)| start < mention.end())
                .saturating_sub(1)
                .max(first);
            let lo = first.saturating_sub(window);
            let hi = (last + window).min(tokens.len() - 1);
            OUTCOME_KEYWORDS.is_match(&text[tokens[lo].0..tokens[hi].1])
        })
    }
}

/// Collection-time outcome over lower-cased title+body.
///
/// Denial language wins over approval language, so "applied, got approved
/// for the CSP but denied for CFU" reads as a denial.
pub fn detect_outcome(text: &str) -> OutcomeLabel {
    if NEGATED_APPROVAL.is_match(text) || DENIAL.is_match(text) {
        OutcomeLabel::Denied
    } else if PREAPPROVAL.is_match(text) || APPROVAL.is_match(text) {
        OutcomeLabel::Approved
    } else {
        OutcomeLabel::Unknown
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProductVariant;

    fn classifier() -> CardClassifier {
        CardClassifier::new(&ProductCatalog::default()).unwrap()
    }

    fn unlimited() -> ProductIdentity {
        ProductIdentity::Variant("Freedom Unlimited".to_string())
    }

    fn flex() -> ProductIdentity {
        ProductIdentity::Variant("Freedom Flex".to_string())
    }

    #[test]
    fn test_detects_variants() {
        let c = classifier();
        assert_eq!(c.detect_product("just got approved for the cfu!"), unlimited());
        assert_eq!(c.detect_product("chase freedom flex denied"), flex());
        assert_eq!(c.detect_product("my cff came in the mail"), flex());
    }

    #[test]
    fn test_first_variant_wins_when_both_present() {
        let c = classifier();
        let text = "should i get the freedom flex or freedom unlimited? approved for cff";
        assert_eq!(c.detect_product(text), unlimited());
        assert_eq!(c.detect_product(text), c.detect_product(text));
    }

    #[test]
    fn test_premium_exclusion_vetoes_variant() {
        let c = classifier();
        assert_eq!(
            c.detect_product("approved for cfu after my sapphire preferred"),
            ProductIdentity::NoneDetected
        );
        assert_eq!(
            c.detect_product("freedom flex plus amex gold combo"),
            ProductIdentity::NoneDetected
        );
    }

    #[test]
    fn test_exclusions_match_whole_words_only() {
        let c = classifier();
        assert_eq!(c.detect_product("i think the cfu is great"), unlimited());
        assert_eq!(c.detect_product("golden freedom flex"), flex());
    }

    #[test]
    fn test_generic_and_none() {
        let c = classifier();
        assert_eq!(
            c.detect_product("chase freedom approved today"),
            ProductIdentity::Generic
        );
        assert_eq!(
            c.detect_product("discover it approved"),
            ProductIdentity::NoneDetected
        );
    }

    #[test]
    fn test_custom_catalog_precedence() {
        let catalog = ProductCatalog {
            premium_exclusions: vec!["product-z".to_string()],
            variants: vec![
                ProductVariant {
                    name: "Product-A".to_string(),
                    terms: vec!["product-a".to_string()],
                },
                ProductVariant {
                    name: "Product-B".to_string(),
                    terms: vec!["product-b".to_string()],
                },
            ],
            family_terms: vec!["product".to_string()],
            ..ProductCatalog::default()
        };
        let c = CardClassifier::new(&catalog).unwrap();
        assert_eq!(
            c.detect_product("product-b and product-a"),
            ProductIdentity::Variant("Product-A".to_string())
        );
        assert_eq!(
            c.detect_product("product-a vs product-z"),
            ProductIdentity::NoneDetected
        );
    }

    #[test]
    fn test_variant_without_terms_is_rejected() {
        let catalog = ProductCatalog {
            variants: vec![ProductVariant {
                name: "Empty".to_string(),
                terms: vec![],
            }],
            ..ProductCatalog::default()
        };
        assert!(matches!(
            CardClassifier::new(&catalog),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_mentions_identity() {
        let c = classifier();
        assert!(c.mentions(&unlimited(), "love my cfu"));
        assert!(!c.mentions(&flex(), "love my cfu"));
        assert!(c.mentions(&ProductIdentity::Generic, "freedom card"));
        assert!(!c.mentions(&ProductIdentity::NoneDetected, "freedom card"));
        assert!(!c.mentions(&ProductIdentity::Variant("Nope".into()), "cfu"));
    }

    #[test]
    fn test_detect_outcome() {
        assert_eq!(detect_outcome("cfu denied after 7 days"), OutcomeLabel::Denied);
        assert_eq!(detect_outcome("application rejected"), OutcomeLabel::Denied);
        assert_eq!(detect_outcome("i was not approved"), OutcomeLabel::Denied);
        assert_eq!(detect_outcome("got a pre-approval offer"), OutcomeLabel::Approved);
        assert_eq!(detect_outcome("instantly approved!"), OutcomeLabel::Approved);
        assert_eq!(detect_outcome("what are my odds"), OutcomeLabel::Unknown);
    }

    #[test]
    fn test_relevance_window() {
        let c = classifier();
        assert!(c.is_contextually_relevant("my cfu was approved today", 12));
        assert!(!c.is_contextually_relevant("freedom unlimited then approved", 0));
        assert!(c.is_contextually_relevant("freedom unlimited then approved", 2));

        let far = format!("cfu {} approved", "filler ".repeat(20));
        assert!(!c.is_contextually_relevant(&far, 12));
        assert!(c.is_contextually_relevant(&far, 25));

        assert!(!c.is_contextually_relevant("approved for discover", 12));
        assert!(!c.is_contextually_relevant("", 12));
    }
}

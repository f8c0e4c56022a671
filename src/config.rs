//! Collection configuration and the product keyword catalog.
//!
//! Everything the collector varies over (forum sections, query phrases, sort
//! orders, limits, keyword tables) is data, loaded from an optional YAML file.
//! Every field has a default, so a partial file only overrides what it names.
//!
//! ```yaml
//! sources: [CreditCards, Chase]
//! phrases: ['"Freedom Flex" approved', 'CFU denied']
//! max_new_items: 200
//! workers: 8
//! catalog:
//!   variants:
//!     - name: Freedom Unlimited
//!       terms: [freedom unlimited, cfu]
//! ```

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;
use tracing::{info, instrument};

/// Sort order requested from the search capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    New,
    Top,
    Hot,
    Relevance,
    Comments,
}

impl SortOrder {
    pub fn as_str(self) -> &'static str {
        match self {
            SortOrder::New => "new",
            SortOrder::Top => "top",
            SortOrder::Hot => "hot",
            SortOrder::Relevance => "relevance",
            SortOrder::Comments => "comments",
        }
    }
}

/// Settings for one collection run.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CollectionConfig {
    /// Forum sections to search (subreddit names).
    pub sources: Vec<String>,
    /// Query phrases; every phrase is run against every source.
    pub phrases: Vec<String>,
    /// Each unit issues one ranked query per sort order, in this order.
    pub sort_orders: Vec<SortOrder>,
    pub results_per_query: usize,
    /// Global cap on newly accepted items for the whole run.
    pub max_new_items: usize,
    /// Number of units in flight at once.
    pub workers: usize,
    /// Items created more than this many days ago are discarded.
    pub recency_days: i64,
    /// Body length above which an item is relevant even without an outcome keyword near the product.
    pub min_body_chars: usize,
    /// Tokens on each side of a product mention searched for an outcome keyword.
    pub relevance_window: usize,
    pub catalog: ProductCatalog,
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            sources: strings(&["CreditCards", "Chase", "churning", "personalfinance"]),
            phrases: strings(&[
                "\"Freedom Unlimited\" approved",
                "\"Freedom Unlimited\" denied",
                "\"Freedom Unlimited\" preapproved",
                "\"Freedom Unlimited\" pre-approval",
                "CFU approved",
                "CFU denied",
                "CFU preapproved",
                "\"Freedom Flex\" approved",
                "\"Freedom Flex\" denied",
                "\"Freedom Flex\" preapproved",
                "\"Freedom Flex\" pre-approval",
                "CFF approved",
                "CFF denied",
                "CFF preapproved",
                "Chase Freedom approved",
                "Chase Freedom denied",
                "Chase Freedom preapproved",
            ]),
            sort_orders: vec![SortOrder::New, SortOrder::Top],
            results_per_query: 100,
            max_new_items: 500,
            workers: 4,
            recency_days: 180,
            min_body_chars: 30,
            relevance_window: 12,
            catalog: ProductCatalog::default(),
        }
    }
}

impl CollectionConfig {
    /// Load the config from `path`, or return the defaults when no path is given.
    ///
    /// # Arguments
    ///
    /// * `path` - YAML file to read; `None` selects the built-in defaults
    ///
    /// # Errors
    ///
    /// An explicitly named file that cannot be read, parsed or validated.
    #[instrument(level = "info")]
    pub async fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => {
                let raw = fs::read_to_string(path).await.map_err(|source| ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })?;
                let config: CollectionConfig = serde_yaml::from_str(&raw)?;
                info!(path = %path.display(), "Loaded collection config");
                config
            }
            None => {
                info!("No config file given; using built-in defaults");
                CollectionConfig::default()
            }
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.sources.is_empty() {
            return Err(ConfigError::Invalid("at least one source is required".into()));
        }
        if self.phrases.is_empty() {
            return Err(ConfigError::Invalid("at least one phrase is required".into()));
        }
        if self.sort_orders.is_empty() {
            return Err(ConfigError::Invalid("at least one sort order is required".into()));
        }
        if self.workers == 0 {
            return Err(ConfigError::Invalid("workers must be at least 1".into()));
        }
        if self.catalog.variants.is_empty() {
            return Err(ConfigError::Invalid("catalog needs at least one variant".into()));
        }
        Ok(())
    }
}

/// One specific product of the tracked family.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ProductVariant {
    pub name: String,
    pub terms: Vec<String>,
}

/// Keyword tables for product detection.
///
/// Variant order is precedence: a post naming two variants is attributed to
/// the one listed first.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ProductCatalog {
    /// Human name of the family, used in secondary-classifier prompts.
    pub family_name: String,
    /// Higher-tier products whose mention vetoes every other signal.
    pub premium_exclusions: Vec<String>,
    pub variants: Vec<ProductVariant>,
    pub family_terms: Vec<String>,
    /// Issuer/product words that earn the confidence brand bonus.
    pub brand_terms: Vec<String>,
    /// Other issuers' products; posts naming them are dropped by the broad filter profile.
    pub competitor_terms: Vec<String>,
}

impl Default for ProductCatalog {
    fn default() -> Self {
        Self {
            family_name: "Chase Freedom".to_string(),
            premium_exclusions: strings(&[
                "sapphire", "preferred", "reserve", "csr", "csp", "ink", "business", "amex",
                "gold",
            ]),
            variants: vec![
                ProductVariant {
                    name: "Freedom Unlimited".to_string(),
                    terms: strings(&[
                        "freedom unlimited",
                        "chase freedom unlimited",
                        "cfu",
                        "chase cfu",
                    ]),
                },
                ProductVariant {
                    name: "Freedom Flex".to_string(),
                    terms: strings(&["freedom flex", "chase freedom flex", "cff", "chase cff"]),
                },
            ],
            family_terms: strings(&["freedom"]),
            brand_terms: strings(&["chase", "freedom unlimited", "freedom flex", "cfu", "cff"]),
            competitor_terms: strings(&[
                "capital one", "savor", "citi", "custom cash", "amex", "bce",
            ]),
        }
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

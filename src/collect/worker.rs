//! One collection unit: a (source, phrase) pair searched under every sort order.

use super::{Admission, CollectionStats, DedupStore};
use crate::classify::CardClassifier;
use crate::classify::card::detect_outcome;
use crate::config::SortOrder;
use crate::models::{CorpusEntry, RawItem};
use crate::scrapers::{SearchProvider, SearchQuery};
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use tracing::{debug, error, info, instrument};

/// One forum section searched for one phrase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkUnit {
    pub source: String,
    pub phrase: String,
}

/// Knobs that stay fixed for the whole run.
#[derive(Debug, Clone)]
pub struct WorkerSettings {
    pub sort_orders: Vec<SortOrder>,
    pub results_per_query: usize,
    /// Items created before this instant are stale.
    pub recency_cutoff: DateTime<Utc>,
    pub min_body_chars: usize,
    pub relevance_window: usize,
}

/// Everything a unit produced.
#[derive(Debug)]
pub struct UnitReport {
    pub unit: WorkUnit,
    pub accepted: Vec<CorpusEntry>,
    pub stats: CollectionStats,
}

enum Verdict {
    Accept(CorpusEntry),
    Duplicate,
    Stale,
    NoCard,
    Irrelevant,
    Full,
}

/// Shared, read-only view of the run a unit works against.
pub struct CollectionWorker<'a, S> {
    search: &'a S,
    store: &'a DedupStore,
    cards: &'a CardClassifier,
    settings: &'a WorkerSettings,
}

impl<'a, S: SearchProvider> CollectionWorker<'a, S> {
    pub fn new(
        search: &'a S,
        store: &'a DedupStore,
        cards: &'a CardClassifier,
        settings: &'a WorkerSettings,
    ) -> Self {
        Self {
            search,
            store,
            cards,
            settings,
        }
    }

    /// Run a unit to completion.
    ///
    /// Search failures are logged and counted; the unit moves on to its next
    /// sort order. The unit stops early once the run's capacity is used up.
    #[instrument(level = "info", skip_all, fields(source = %unit.source, phrase = %unit.phrase))]
    pub async fn run(&self, unit: WorkUnit) -> UnitReport {
        let mut stats = CollectionStats {
            units: 1,
            ..CollectionStats::default()
        };
        let mut accepted = Vec::new();
        let mut seen_in_unit = HashSet::new();

        'sorts: for &sort in &self.settings.sort_orders {
            if self.store.is_full() {
                debug!("Capacity reached; skipping remaining queries");
                break;
            }
            let query = SearchQuery {
                source: &unit.source,
                phrase: &unit.phrase,
                sort,
                limit: self.settings.results_per_query,
            };
            let items = match self.search.search(&query).await {
                Ok(items) => items,
                Err(e) => {
                    error!(error = %e, sort = sort.as_str(), "Search failed");
                    stats.errors += 1;
                    continue;
                }
            };

            for item in items {
                match self.evaluate(item, &mut seen_in_unit) {
                    Verdict::Accept(entry) => {
                        debug!(id = %entry.item.id, product = %entry.product, outcome = %entry.outcome, "Accepted");
                        stats.accepted += 1;
                        accepted.push(entry);
                    }
                    Verdict::Duplicate => stats.skipped_duplicate += 1,
                    Verdict::Stale => stats.skipped_stale += 1,
                    Verdict::NoCard => stats.skipped_no_card += 1,
                    Verdict::Irrelevant => stats.skipped_irrelevant += 1,
                    Verdict::Full => break 'sorts,
                }
            }
        }

        info!(
            accepted = stats.accepted,
            duplicate = stats.skipped_duplicate,
            stale = stats.skipped_stale,
            no_card = stats.skipped_no_card,
            irrelevant = stats.skipped_irrelevant,
            errors = stats.errors,
            "Unit finished"
        );
        UnitReport {
            unit,
            accepted,
            stats,
        }
    }

    fn evaluate(&self, item: RawItem, seen_in_unit: &mut HashSet<String>) -> Verdict {
        if self.store.is_full() {
            return Verdict::Full;
        }
        // An item returned under two sort orders counts as a duplicate.
        if !seen_in_unit.insert(item.id.clone()) || self.store.contains(&item.id) {
            return Verdict::Duplicate;
        }
        if item.created_at < self.settings.recency_cutoff {
            return Verdict::Stale;
        }

        let text = item.combined_text();
        let product = self.cards.detect_product(&text);
        if !product.is_detected() {
            return Verdict::NoCard;
        }
        let relevant = self
            .cards
            .is_contextually_relevant(&text, self.settings.relevance_window)
            || item.body.chars().count() > self.settings.min_body_chars;
        if !relevant {
            return Verdict::Irrelevant;
        }

        match self.store.try_admit(&item.id) {
            Admission::Admitted => Verdict::Accept(CorpusEntry {
                outcome: detect_outcome(&text),
                product,
                item,
            }),
            Admission::Duplicate => Verdict::Duplicate,
            Admission::CapacityReached => Verdict::Full,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProductCatalog;
    use crate::error::SearchError;
    use crate::models::{OutcomeLabel, ProductIdentity};
    use chrono::Duration;
    use std::collections::HashMap;

    /// Returns canned items per sort order; a missing sort order fails.
    struct Canned(HashMap<SortOrder, Vec<RawItem>>);

    impl SearchProvider for Canned {
        async fn search(&self, query: &SearchQuery<'_>) -> Result<Vec<RawItem>, SearchError> {
            self.0
                .get(&query.sort)
                .cloned()
                .ok_or_else(|| SearchError::Malformed("no canned page".into()))
        }
    }

    fn item(id: &str, title: &str, body: &str, age_days: i64) -> RawItem {
        let now = Utc::now();
        RawItem {
            id: id.to_string(),
            title: title.to_string(),
            body: body.to_string(),
            source_location: "Reddit-CreditCards".to_string(),
            observed_at: now,
            created_at: now - Duration::days(age_days),
        }
    }

    fn settings(sorts: Vec<SortOrder>) -> WorkerSettings {
        WorkerSettings {
            sort_orders: sorts,
            results_per_query: 100,
            recency_cutoff: Utc::now() - Duration::days(180),
            min_body_chars: 30,
            relevance_window: 12,
        }
    }

    fn unit() -> WorkUnit {
        WorkUnit {
            source: "CreditCards".into(),
            phrase: "CFU approved".into(),
        }
    }

    #[tokio::test]
    async fn test_gates_in_order() {
        let search = Canned(HashMap::from([(
            SortOrder::New,
            vec![
                item("fresh", "CFU approved!", "", 2),
                item("old", "CFU approved!", "", 400),
                item("other", "Discover it approved", "", 1),
                item("vague", "Freedom", "short", 1),
                item("known", "CFF denied", "", 1),
                item("fresh", "CFU approved!", "", 2),
            ],
        )]));
        let store = DedupStore::new(10);
        store.add("known");
        let cards = CardClassifier::new(&ProductCatalog::default()).unwrap();
        let settings = settings(vec![SortOrder::New]);

        let report = CollectionWorker::new(&search, &store, &cards, &settings)
            .run(unit())
            .await;

        assert_eq!(report.stats.accepted, 1);
        assert_eq!(report.stats.skipped_stale, 1);
        assert_eq!(report.stats.skipped_no_card, 1);
        assert_eq!(report.stats.skipped_irrelevant, 1);
        // "known" from the store, the second "fresh" from this unit.
        assert_eq!(report.stats.skipped_duplicate, 2);
        let entry = &report.accepted[0];
        assert_eq!(entry.item.id, "fresh");
        assert_eq!(
            entry.product,
            ProductIdentity::Variant("Freedom Unlimited".into())
        );
        assert_eq!(entry.outcome, OutcomeLabel::Approved);
    }

    #[tokio::test]
    async fn test_repeat_across_sort_orders_is_counted() {
        let page = vec![
            item("a", "CFU approved!", "", 1),
            item("b", "Discover it approved", "", 1),
        ];
        let search = Canned(HashMap::from([
            (SortOrder::New, page.clone()),
            (SortOrder::Top, page),
        ]));
        let store = DedupStore::new(10);
        let cards = CardClassifier::new(&ProductCatalog::default()).unwrap();
        let settings = settings(vec![SortOrder::New, SortOrder::Top]);

        let report = CollectionWorker::new(&search, &store, &cards, &settings)
            .run(unit())
            .await;
        let s = report.stats;
        assert_eq!(s.accepted, 1);
        assert_eq!(s.skipped_duplicate, 2);
        assert_eq!(s.skipped_no_card, 1);
        // Every fetched item lands in exactly one bucket.
        let counted = s.accepted
            + s.skipped_duplicate
            + s.skipped_stale
            + s.skipped_no_card
            + s.skipped_irrelevant;
        assert_eq!(counted, 4);
    }

    #[tokio::test]
    async fn test_long_body_is_relevant_without_outcome_word() {
        let body = "Thinking about adding the CFU to my wallet next month, any thoughts?";
        let search = Canned(HashMap::from([(
            SortOrder::New,
            vec![item("long", "Freedom Unlimited thoughts", body, 1)],
        )]));
        let store = DedupStore::new(10);
        let cards = CardClassifier::new(&ProductCatalog::default()).unwrap();
        let settings = settings(vec![SortOrder::New]);

        let report = CollectionWorker::new(&search, &store, &cards, &settings)
            .run(unit())
            .await;
        assert_eq!(report.stats.accepted, 1);
        assert_eq!(report.accepted[0].outcome, OutcomeLabel::Unknown);
    }

    #[tokio::test]
    async fn test_search_error_does_not_stop_unit() {
        // Top has no canned page and fails; New still runs.
        let search = Canned(HashMap::from([(
            SortOrder::New,
            vec![item("a", "CFF denied", "", 1)],
        )]));
        let store = DedupStore::new(10);
        let cards = CardClassifier::new(&ProductCatalog::default()).unwrap();
        let settings = settings(vec![SortOrder::Top, SortOrder::New]);

        let report = CollectionWorker::new(&search, &store, &cards, &settings)
            .run(unit())
            .await;
        assert_eq!(report.stats.errors, 1);
        assert_eq!(report.stats.accepted, 1);
        assert_eq!(report.accepted[0].outcome, OutcomeLabel::Denied);
    }

    #[tokio::test]
    async fn test_stops_at_capacity() {
        let items = (0..5)
            .map(|i| item(&format!("p{i}"), "CFU approved", "", 1))
            .collect();
        let search = Canned(HashMap::from([(SortOrder::New, items)]));
        let store = DedupStore::new(2);
        let cards = CardClassifier::new(&ProductCatalog::default()).unwrap();
        let settings = settings(vec![SortOrder::New]);

        let report = CollectionWorker::new(&search, &store, &cards, &settings)
            .run(unit())
            .await;
        assert_eq!(report.stats.accepted, 2);
        assert!(store.is_full());
    }
}

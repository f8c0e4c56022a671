//! Fans collection units out over a bounded pool and persists the result.
//!
//! Units are the cartesian product of sources and phrases. Up to `workers`
//! units are in flight at once. Accepted entries are gathered in memory and
//! appended to the corpus once, after every unit has finished, so a crashed
//! run leaves the corpus untouched.

use super::worker::{CollectionWorker, WorkUnit, WorkerSettings};
use super::{CollectionStats, CollectionSummary, DedupStore};
use crate::classify::CardClassifier;
use crate::config::CollectionConfig;
use crate::error::{ConfigError, CorpusError};
use crate::models::CorpusEntry;
use crate::outputs::corpus;
use crate::scrapers::SearchProvider;
use chrono::{Duration, Utc};
use futures::stream::{self, StreamExt};
use itertools::Itertools;
use std::path::Path;
use tracing::{info, instrument};

/// Longest accepted recency window, roughly a century.
const MAX_RECENCY_DAYS: i64 = 36_500;

/// Owns the search backend and the compiled catalog for one collection run.
pub struct CollectionScheduler<S> {
    search: S,
    config: CollectionConfig,
    cards: CardClassifier,
}

impl<S: SearchProvider> CollectionScheduler<S> {
    /// # Errors
    ///
    /// Fails if the catalog's keyword tables do not compile.
    pub fn new(search: S, config: CollectionConfig) -> Result<Self, ConfigError> {
        let cards = CardClassifier::new(&config.catalog)?;
        Ok(Self {
            search,
            config,
            cards,
        })
    }

    fn units(&self) -> Vec<WorkUnit> {
        self.config
            .sources
            .iter()
            .cartesian_product(self.config.phrases.iter())
            .map(|(source, phrase)| WorkUnit {
                source: source.clone(),
                phrase: phrase.clone(),
            })
            .collect()
    }

    fn settings(&self) -> WorkerSettings {
        let days = self.config.recency_days.clamp(0, MAX_RECENCY_DAYS);
        WorkerSettings {
            sort_orders: self.config.sort_orders.clone(),
            results_per_query: self.config.results_per_query,
            recency_cutoff: Utc::now() - Duration::days(days),
            min_body_chars: self.config.min_body_chars,
            relevance_window: self.config.relevance_window,
        }
    }

    /// Run every unit against `store` and return what was accepted.
    ///
    /// Nothing is persisted here.
    #[instrument(level = "info", skip_all, fields(workers = self.config.workers))]
    pub async fn collect(&self, store: &DedupStore) -> (Vec<CorpusEntry>, CollectionStats) {
        let units = self.units();
        let settings = self.settings();
        let worker = CollectionWorker::new(&self.search, store, &self.cards, &settings);
        info!(
            units = units.len(),
            capacity = store.remaining(),
            "Starting collection"
        );

        let reports: Vec<_> = stream::iter(units)
            .map(|unit| worker.run(unit))
            .buffer_unordered(self.config.workers.max(1))
            .collect()
            .await;

        let mut stats = CollectionStats::default();
        let mut accepted = Vec::new();
        for report in reports {
            stats += report.stats;
            accepted.extend(report.accepted);
        }
        info!(accepted = accepted.len(), errors = stats.errors, "Collection finished");
        (accepted, stats)
    }

    /// Collect into the corpus at `corpus_path`.
    ///
    /// The dedup store is seeded from the existing corpus, so rerunning over
    /// the same file never duplicates an id.
    ///
    /// # Errors
    ///
    /// Only persistence failures are fatal; search failures are counted in
    /// the returned stats.
    #[instrument(level = "info", skip_all, fields(corpus = %corpus_path.display()))]
    pub async fn run(&self, corpus_path: &Path) -> Result<CollectionSummary, CorpusError> {
        let store = DedupStore::load_from(corpus_path, self.config.max_new_items).await;
        let (accepted, stats) = self.collect(&store).await;

        let new_records = corpus::append_entries(corpus_path, &accepted).await?;
        let total_corpus_size = corpus::count_rows(corpus_path).await?;
        info!(new_records, total_corpus_size, "Corpus updated");

        Ok(CollectionSummary {
            new_records,
            total_corpus_size,
            stats,
        })
    }
}

//! Concurrent collection of candidate posts into the raw corpus.
//!
//! # Submodules
//!
//! - [`dedup`]: Shared id set and new-item budget
//! - [`worker`]: Runs one (source, phrase) unit through the acceptance gates
//! - [`scheduler`]: Fans units out over a bounded pool and persists the result
//!
//! # Acceptance gates
//!
//! Every search result passes, in order:
//!
//! 1. Global capacity not yet reached
//! 2. Not already seen in this unit or in the dedup store
//! 3. Created inside the recency window
//! 4. A tracked product is detected
//! 5. Contextually relevant, or long enough to be worth keeping
//! 6. Atomic admission into the dedup store

pub mod dedup;
pub mod scheduler;
pub mod worker;

pub use dedup::{Admission, DedupStore};
pub use scheduler::CollectionScheduler;

use serde::Serialize;
use std::ops::AddAssign;

/// Per-unit and per-run counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CollectionStats {
    pub units: usize,
    pub accepted: usize,
    /// Already stored, or already returned to this unit under another sort order.
    pub skipped_duplicate: usize,
    pub skipped_stale: usize,
    pub skipped_no_card: usize,
    pub skipped_irrelevant: usize,
    /// Failed search queries.
    pub errors: usize,
}

impl AddAssign for CollectionStats {
    fn add_assign(&mut self, other: Self) {
        self.units += other.units;
        self.accepted += other.accepted;
        self.skipped_duplicate += other.skipped_duplicate;
        self.skipped_stale += other.skipped_stale;
        self.skipped_no_card += other.skipped_no_card;
        self.skipped_irrelevant += other.skipped_irrelevant;
        self.errors += other.errors;
    }
}

/// What a collection run reports back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CollectionSummary {
    pub new_records: usize,
    pub total_corpus_size: usize,
    pub stats: CollectionStats,
}

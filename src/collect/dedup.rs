//! Run-wide set of known post identifiers plus the new-item budget.
//!
//! Both live behind one lock so "not seen yet and capacity left" is decided
//! and recorded in a single step. Two workers racing on the same id can never
//! both accept it, and the run never accepts more than its cap.

use crate::outputs::corpus;
use std::collections::HashSet;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::instrument;

/// Result of [`DedupStore::try_admit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// The id was new and a slot was reserved for it.
    Admitted,
    /// The id is already known; nothing changed.
    Duplicate,
    /// The run has hit its cap; nothing changed.
    CapacityReached,
}

#[derive(Debug)]
struct State {
    seen: HashSet<String>,
    remaining: usize,
}

/// Shared by every worker of a run; see the module docs for the locking contract.
#[derive(Debug)]
pub struct DedupStore {
    state: Mutex<State>,
}

impl DedupStore {
    /// An empty store that will admit at most `capacity` new ids.
    pub fn new(capacity: usize) -> Self {
        Self::with_ids(HashSet::new(), capacity)
    }

    /// A store pre-seeded with known ids. Seeded ids do not use capacity.
    pub fn with_ids(seen: HashSet<String>, capacity: usize) -> Self {
        Self {
            state: Mutex::new(State {
                seen,
                remaining: capacity,
            }),
        }
    }

    /// Seed from a persisted corpus; missing or unreadable files give an empty store.
    #[instrument(level = "info", skip_all, fields(path = %path.display(), capacity))]
    pub async fn load_from(path: &Path, capacity: usize) -> Self {
        Self::with_ids(corpus::load_ids(path).await, capacity)
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether `id` is already known, from the corpus or from this run.
    ///
    /// A snapshot only: use [`DedupStore::try_admit`] to claim an id.
    pub fn contains(&self, id: &str) -> bool {
        self.lock().seen.contains(id)
    }

    /// Record an id as known without touching capacity. Returns `true` if it was new.
    pub fn add(&self, id: &str) -> bool {
        self.lock().seen.insert(id.to_string())
    }

    /// Atomically check the id and the budget, and claim both if free.
    ///
    /// # Arguments
    ///
    /// * `id` - Stable post identifier, the absolute permalink
    ///
    /// # Returns
    ///
    /// [`Admission::Duplicate`] takes precedence over
    /// [`Admission::CapacityReached`], so a full store still reports known ids
    /// as duplicates.
    pub fn try_admit(&self, id: &str) -> Admission {
        let mut state = self.lock();
        if state.seen.contains(id) {
            return Admission::Duplicate;
        }
        if state.remaining == 0 {
            return Admission::CapacityReached;
        }
        state.remaining -= 1;
        state.seen.insert(id.to_string());
        Admission::Admitted
    }

    /// True once the run's new-item budget is spent.
    pub fn is_full(&self) -> bool {
        self.lock().remaining == 0
    }

    /// New ids that may still be admitted.
    pub fn remaining(&self) -> usize {
        self.lock().remaining
    }

    /// Known ids, seeded and admitted together.
    pub fn len(&self) -> usize {
        self.lock().seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

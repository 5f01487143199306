//! First-call deduplication
//!
//! A ledger remembers every (image, function) pair that already produced a
//! trace record in one traced process. It only ever grows. Each instrumented
//! process instance owns its own ledger, so a forked child starts empty.

use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

/// Identity of an (image, function) pair
///
/// Kept as a structured pair rather than a joined string, so names that
/// contain the `:` separator cannot alias each other.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DedupKey {
    image: Arc<str>,
    function: Arc<str>,
}

impl DedupKey {
    /// Build a key from shared name storage
    pub fn new(image: impl Into<Arc<str>>, function: impl Into<Arc<str>>) -> Self {
        Self {
            image: image.into(),
            function: function.into(),
        }
    }

    pub fn image(&self) -> &str {
        &self.image
    }

    pub fn function(&self) -> &str {
        &self.function
    }
}

impl fmt::Display for DedupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.image, self.function)
    }
}

/// Thread-safe set of already-logged keys
#[derive(Debug, Default)]
pub struct DedupLedger {
    seen: Mutex<HashSet<DedupKey>>,
}

impl DedupLedger {
    /// Create an empty ledger
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the right to log `key`
    ///
    /// Returns true for exactly one call per distinct key, however many
    /// threads race on it. The lock covers only the check-and-insert.
    pub fn try_claim(&self, key: DedupKey) -> bool {
        // A panicking holder cannot leave the set half-updated, so a
        // poisoned lock is still usable.
        let mut seen = self.seen.lock().unwrap_or_else(PoisonError::into_inner);
        seen.insert(key)
    }

    /// Check whether `key` was already claimed
    pub fn contains(&self, key: &DedupKey) -> bool {
        self.seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(key)
    }

    /// Number of claimed keys
    pub fn len(&self) -> usize {
        self.seen.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

//! Store Statistics Module
//!
//! Tracks lookup hits and misses, floor releases and collected entries.

use serde::Serialize;

// == Store Stats ==
/// Tracks weak store activity.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StoreStats {
    /// Number of lookups that found a live value
    pub hits: u64,
    /// Number of lookups that found nothing (never set or collected)
    pub misses: u64,
    /// Number of entries whose value was reclaimed and whose bookkeeping was removed
    pub collected: u64,
    /// Number of strong floor references dropped after their deadline
    pub floor_releases: u64,
    /// Current number of entries with a weak handle
    pub total_entries: usize,
}

impl StoreStats {
    pub fn new() -> Self {
        Self::default()
    }

    // == Hit Rate ==
    /// Returns hits / (hits + misses), or 0.0 if no lookups have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    pub fn record_collection(&mut self) {
        self.collected += 1;
    }

    pub fn record_floor_release(&mut self) {
        self.floor_releases += 1;
    }

    pub fn set_total_entries(&mut self, count: usize) {
        self.total_entries = count;
    }
}

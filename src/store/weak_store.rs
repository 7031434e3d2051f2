//! Weak Store Module
//!
//! Key-to-value table that holds values weakly, keeps each one strongly
//! reachable for a minimum lifespan after every write or floor extension,
//! and cleans up bookkeeping once a value has been reclaimed.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::store::{StoreEntry, StoreStats};

/// Callback invoked with the key of an entry whose value was reclaimed.
///
/// Runs while the store is borrowed mutably, so it must not call back into
/// the owner of the store.
pub type FinalizeHook = Arc<dyn Fn(&str) + Send + Sync>;

// == Weak Store ==
/// Weak-reference table with a TTL floor.
pub struct WeakStore<T> {
    /// Per-key bookkeeping
    entries: HashMap<String, StoreEntry<T>>,
    /// Floor duration, zero = pure weak holding
    lifespan: Duration,
    /// Activity statistics
    stats: StoreStats,
    /// Called when a value is found to be reclaimed
    on_finalize: Option<FinalizeHook>,
}

impl<T> fmt::Debug for WeakStore<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakStore")
            .field("keys", &self.entries.keys().collect::<Vec<_>>())
            .field("lifespan", &self.lifespan)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

impl<T: Send + Sync + 'static> WeakStore<T> {
    // == Constructor ==
    /// Creates an empty store with the given floor lifespan.
    ///
    /// # Arguments
    /// * `lifespan` - Minimum residency after each write, `Duration::ZERO` disables the floor
    pub fn new(lifespan: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            lifespan,
            stats: StoreStats::new(),
            on_finalize: None,
        }
    }

    /// Registers the callback run when an entry's value has been reclaimed.
    pub fn with_finalizer(mut self, hook: FinalizeHook) -> Self {
        self.on_finalize = Some(hook);
        self
    }

    pub fn lifespan(&self) -> Duration {
        self.lifespan
    }

    // == Set ==
    /// Stores a weak handle to `value`, replacing any existing entry.
    ///
    /// When the lifespan is non-zero a strong floor reference is kept for the
    /// full lifespan starting now.
    pub fn set(&mut self, key: impl Into<String>, value: &Arc<T>) {
        self.entries
            .insert(key.into(), StoreEntry::new(value, self.lifespan));
        self.stats.set_total_entries(self.entries.len());
    }

    // == Get ==
    /// Returns the value if it is still alive.
    ///
    /// An expired floor is released first; an entry whose value is gone is
    /// finalized and reported as absent.
    pub fn get(&mut self, key: &str) -> Option<Arc<T>> {
        let value = self.live(key);
        if value.is_some() {
            self.stats.record_hit();
        } else {
            self.stats.record_miss();
        }
        value
    }

    // == Has ==
    /// True if `get` would return a value. Does not touch hit/miss counters.
    pub fn has(&mut self, key: &str) -> bool {
        self.live(key).is_some()
    }

    // == Extend Floor ==
    /// Restarts the floor deadline for `key` with the full lifespan.
    ///
    /// No-op when the lifespan is zero or no floor is currently held.
    pub fn extend_floor(&mut self, key: &str) -> bool {
        if self.lifespan.is_zero() {
            return false;
        }
        let lifespan = self.lifespan;
        match self.entries.get_mut(key) {
            Some(entry) => {
                if entry.release_expired_floor() {
                    self.stats.record_floor_release();
                }
                entry.extend_floor(lifespan)
            }
            None => false,
        }
    }

    // == Delete ==
    /// Removes the entry for `key`, dropping its floor reference.
    ///
    /// The finalize callback is not run for deleted entries. Idempotent.
    pub fn delete(&mut self, key: &str) -> bool {
        let removed = self.entries.remove(key).is_some();
        self.stats.set_total_entries(self.entries.len());
        removed
    }

    // == Keys ==
    /// Keys with a weak handle. Liveness is not re-checked here.
    pub fn keys(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    // == Clear ==
    /// Deletes every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.stats.set_total_entries(0);
    }

    // == Sweep ==
    /// Releases expired floors and finalizes every entry whose value is gone.
    ///
    /// Floors drop their values at the deadline on their own; sweeping only
    /// removes the bookkeeping of reclaimed values earlier than the next access.
    ///
    /// Returns the number of finalized entries.
    pub fn sweep(&mut self) -> usize {
        let mut released = 0;
        for entry in self.entries.values_mut() {
            if entry.release_expired_floor() {
                released += 1;
            }
        }
        for _ in 0..released {
            self.stats.record_floor_release();
        }

        let dead_keys: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| !entry.is_alive())
            .map(|(key, _)| key.clone())
            .collect();

        let count = dead_keys.len();
        for key in dead_keys {
            self.finalize(&key);
        }
        count
    }

    // == Length ==
    /// Returns the number of entries with a weak handle.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Remaining floor time for `key`, or None if no floor is held.
    pub fn floor_remaining(&self, key: &str) -> Option<Duration> {
        self.entries.get(key).and_then(StoreEntry::floor_remaining)
    }

    // == Stats ==
    /// Returns current store statistics.
    pub fn stats(&self) -> StoreStats {
        let mut stats = self.stats.clone();
        stats.set_total_entries(self.entries.len());
        stats
    }

    fn live(&mut self, key: &str) -> Option<Arc<T>> {
        let entry = self.entries.get_mut(key)?;
        if entry.release_expired_floor() {
            self.stats.record_floor_release();
        }
        match entry.upgrade() {
            Some(value) => Some(value),
            None => {
                self.finalize(key);
                None
            }
        }
    }

    fn finalize(&mut self, key: &str) {
        if self.entries.remove(key).is_some() {
            self.stats.record_collection();
            self.stats.set_total_entries(self.entries.len());
            if let Some(hook) = &self.on_finalize {
                hook(key);
            }
        }
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::thread::sleep;

    #[test]
    fn test_store_new() {
        let store: WeakStore<String> = WeakStore::new(Duration::ZERO);
        assert_eq!(store.len(), 0);
        assert!(store.is_empty());
        assert_eq!(store.lifespan(), Duration::ZERO);
    }

    #[test]
    fn test_store_set_and_get_while_held() {
        let mut store = WeakStore::new(Duration::ZERO);
        let value = Arc::new("value1".to_string());

        store.set("key1", &value);
        let retrieved = store.get("key1").unwrap();

        assert!(Arc::ptr_eq(&retrieved, &value));
        assert!(store.has("key1"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_store_get_nonexistent() {
        let mut store: WeakStore<String> = WeakStore::new(Duration::ZERO);
        assert!(store.get("nonexistent").is_none());
        assert!(!store.has("nonexistent"));
    }

    #[test]
    fn test_zero_lifespan_drops_unheld_value() {
        let mut store = WeakStore::new(Duration::ZERO);
        store.set("key1", &Arc::new(1u32));

        assert!(store.get("key1").is_none());
        assert!(store.is_empty(), "collected entry should be finalized");
        assert!(!store.extend_floor("key1"));
    }

    #[test]
    fn test_floor_keeps_unheld_value() {
        let mut store = WeakStore::new(Duration::from_millis(200));
        store.set("key1", &Arc::new(1u32));

        sleep(Duration::from_millis(100));
        assert_eq!(store.get("key1").map(|v| *v), Some(1));

        sleep(Duration::from_millis(150));
        assert!(store.get("key1").is_none());
    }

    #[test]
    fn test_floor_expires_without_store_access() {
        let mut store = WeakStore::new(Duration::from_millis(50));
        let value = Arc::new("value".to_string());
        let watch = Arc::downgrade(&value);
        store.set("key1", &value);
        drop(value);

        sleep(Duration::from_millis(200));
        assert!(watch.upgrade().is_none(), "floor should not outlive its deadline");

        assert_eq!(store.len(), 1);
        assert!(store.get("key1").is_none());
        assert!(store.is_empty());
        assert_eq!(store.stats().floor_releases, 1);
        assert_eq!(store.stats().collected, 1);
    }

    #[test]
    fn test_extend_floor_slides_window() {
        let mut store = WeakStore::new(Duration::from_millis(300));
        store.set("key1", &Arc::new(1u32));

        sleep(Duration::from_millis(200));
        assert!(store.extend_floor("key1"));

        // Past the original deadline, inside the extended one
        sleep(Duration::from_millis(200));
        assert!(store.has("key1"));

        sleep(Duration::from_millis(200));
        assert!(!store.has("key1"));
        assert!(!store.extend_floor("key1"));
    }

    #[test]
    fn test_expired_floor_keeps_externally_held_value() {
        let mut store = WeakStore::new(Duration::from_millis(30));
        let value = Arc::new("held".to_string());
        store.set("key1", &value);

        sleep(Duration::from_millis(60));
        assert!(store.has("key1"));
        assert!(store.floor_remaining("key1").is_none());
        assert!(!store.extend_floor("key1"));
        assert_eq!(store.stats().floor_releases, 1);
    }

    #[test]
    fn test_store_overwrite() {
        let mut store = WeakStore::new(Duration::ZERO);
        let first = Arc::new("value1".to_string());
        let second = Arc::new("value2".to_string());

        store.set("key1", &first);
        store.set("key1", &second);

        assert_eq!(store.get("key1").as_deref().map(String::as_str), Some("value2"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_store_delete_is_idempotent() {
        let mut store = WeakStore::new(Duration::from_secs(60));
        store.set("key1", &Arc::new(1u32));

        assert!(store.delete("key1"));
        assert!(!store.delete("key1"));
        assert!(store.get("key1").is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_store_keys_and_clear() {
        let mut store = WeakStore::new(Duration::from_secs(60));
        store.set("a", &Arc::new(1u32));
        store.set("a/b", &Arc::new(2u32));

        let mut keys = store.keys();
        keys.sort();
        assert_eq!(keys, vec!["a".to_string(), "a/b".to_string()]);

        store.clear();
        assert!(store.keys().is_empty());
        assert_eq!(store.stats().total_entries, 0);
    }

    #[test]
    fn test_sweep_finalizes_collected_entries() {
        let finalized = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&finalized);
        let mut store = WeakStore::new(Duration::from_millis(30))
            .with_finalizer(Arc::new(move |key: &str| sink.lock().push(key.to_string())));

        let held = Arc::new(1u32);
        store.set("held", &held);
        store.set("dropped", &Arc::new(2u32));

        assert_eq!(store.sweep(), 0);
        sleep(Duration::from_millis(60));

        assert_eq!(store.sweep(), 1);
        assert_eq!(*finalized.lock(), vec!["dropped".to_string()]);
        assert_eq!(store.keys(), vec!["held".to_string()]);

        let stats = store.stats();
        assert_eq!(stats.collected, 1);
        assert_eq!(stats.floor_releases, 2);
        assert_eq!(stats.total_entries, 1);
    }

    #[test]
    fn test_delete_does_not_finalize() {
        let finalized = Arc::new(Mutex::new(0usize));
        let counter = Arc::clone(&finalized);
        let mut store = WeakStore::new(Duration::ZERO)
            .with_finalizer(Arc::new(move |_: &str| *counter.lock() += 1));

        let value = Arc::new(1u32);
        store.set("key1", &value);
        store.delete("key1");
        drop(value);

        assert_eq!(store.sweep(), 0);
        assert_eq!(*finalized.lock(), 0);
    }

    #[test]
    fn test_store_stats() {
        let mut store = WeakStore::new(Duration::from_secs(60));
        store.set("key1", &Arc::new(1u32));

        store.get("key1");
        let _ = store.get("nonexistent");

        let stats = store.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.total_entries, 1);
    }
}

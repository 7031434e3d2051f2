//! Store Entry Module
//!
//! Defines the bookkeeping kept for each weakly held value: the weak handle
//! and the optional strong floor reference with its deadline.

use std::fmt;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use crate::store::floor::Floor;

// == Store Entry ==
/// Bookkeeping for a single weakly held value.
pub struct StoreEntry<T> {
    /// Handle that yields the value while anything keeps it alive
    handle: Weak<T>,
    /// Strong reference released at its deadline, None = no floor observed
    floor: Option<Arc<Floor<T>>>,
}

impl<T: Send + Sync + 'static> StoreEntry<T> {
    // == Constructor ==
    /// Creates an entry for `value`, floored for `lifespan` when non-zero.
    pub fn new(value: &Arc<T>, lifespan: Duration) -> Self {
        let floor = if lifespan.is_zero() {
            None
        } else {
            Some(Floor::hold(value, Instant::now() + lifespan))
        };

        Self {
            handle: Arc::downgrade(value),
            floor,
        }
    }
}

impl<T> StoreEntry<T> {
    /// Upgrades the weak handle.
    pub fn upgrade(&self) -> Option<Arc<T>> {
        self.handle.upgrade()
    }

    /// True while anything, floor included, keeps the value alive.
    pub fn is_alive(&self) -> bool {
        self.handle.strong_count() > 0
    }

    // == Floor ==
    /// True while the floor holds a strong reference and its deadline is ahead.
    ///
    /// The floor counts as expired once the current time reaches the deadline.
    pub fn is_floored(&self) -> bool {
        self.floor.as_ref().is_some_and(|floor| floor.is_held())
    }

    /// Forgets a floor whose deadline has passed, dropping its reference if
    /// the reaper has not already done so.
    ///
    /// Returns true when an expired floor was observed.
    pub fn release_expired_floor(&mut self) -> bool {
        match &self.floor {
            Some(floor) if !floor.is_held() => {
                floor.release();
                self.floor = None;
                true
            }
            _ => false,
        }
    }

    /// Restarts the floor deadline with a full `lifespan`.
    ///
    /// No-op unless a floor is currently held.
    pub fn extend_floor(&mut self, lifespan: Duration) -> bool {
        if lifespan.is_zero() {
            return false;
        }
        match &self.floor {
            Some(floor) => floor.extend(Instant::now() + lifespan),
            None => false,
        }
    }

    /// Remaining floor time, or None if no floor is held.
    pub fn floor_remaining(&self) -> Option<Duration> {
        self.floor.as_ref()?.remaining()
    }
}

impl<T> fmt::Debug for StoreEntry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreEntry")
            .field("alive", &self.is_alive())
            .field("floor_remaining", &self.floor_remaining())
            .finish()
    }
}

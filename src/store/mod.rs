//! Store Module
//!
//! Provides the weak-reference table backing each entanglement node, with an
//! optional TTL floor that keeps values resident for a minimum duration.

mod entry;
mod floor;
mod stats;
mod weak_store;

// Re-export public types
pub use entry::StoreEntry;
pub use stats::StoreStats;
pub use weak_store::{FinalizeHook, WeakStore};

//! Cache Entanglement - A dependency-aware in-memory caching engine
//!
//! Provides a graph of cache nodes whose entries are derived from entries of
//! other nodes, with hierarchical keys, lazy invalidation and a weak store
//! that guarantees a minimum residency after each access.

pub mod config;
pub mod data;
pub mod duration;
pub mod error;
pub mod key;
pub mod node;
pub mod store;
pub mod tasks;

pub use config::{Config, Lifespan};
pub use data::{CacheData, CloneStrategy};
pub use duration::parse_duration;
pub use error::{EntanglementError, Result};
pub use node::{Cached, EntanglementAsync, EntanglementSync, ResolvedDependencies};
pub use store::WeakStore;
pub use tasks::{spawn_sweep_task, Sweep};

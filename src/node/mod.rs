//! Node Module
//!
//! Entanglement nodes: cache stores whose entries are derived from entries
//! of other nodes and kept consistent with them through lazy invalidation.

mod async_node;
mod graph;
mod resolved;
mod source;
mod sync_node;

#[cfg(test)]
mod property_tests;

// Re-export public types
pub use async_node::{EntanglementAsync, EntanglementAsyncBuilder};
pub use graph::{Cached, GraphNode, NodeId};
pub use resolved::{ErasedData, ResolvedDependencies};
pub use source::{AsyncDependency, AsyncSource, SyncDependency, SyncSource};
pub use sync_node::{EntanglementSync, EntanglementSyncBuilder};

//! Dependency edges.
//!
//! A node reaches its dependencies through these object-safe traits, so one
//! node can depend on nodes with other value and parameter types.

use std::sync::Arc;

use futures::future::BoxFuture;

use crate::error::Result;
use crate::node::{ErasedData, GraphNode};

/// A dependency that recomputes synchronously.
pub trait SyncSource: Send + Sync {
    fn graph_node(&self) -> Arc<dyn GraphNode>;

    /// Fresh value for `key`, recomputed if collected or dirty.
    ///
    /// `Ok(None)` when the key was never cached on the dependency.
    fn recache_erased(&self, key: &str) -> Result<Option<ErasedData>>;
}

/// A dependency that may suspend while recomputing.
pub trait AsyncSource: Send + Sync {
    fn graph_node(&self) -> Arc<dyn GraphNode>;

    /// Fresh value for `key`, recomputed if collected or dirty.
    fn recache_erased<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<ErasedData>>>;
}

/// Node handles usable as dependencies of synchronous nodes.
pub trait SyncDependency {
    fn sync_source(&self) -> Arc<dyn SyncSource>;
}

/// Node handles usable as dependencies of asynchronous nodes.
pub trait AsyncDependency {
    fn async_source(&self) -> Arc<dyn AsyncSource>;
}

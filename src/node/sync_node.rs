//! Synchronous entanglement nodes.
//!
//! Creation functions and before-update hooks run to completion on the
//! calling thread. A synchronous node may only depend on other synchronous
//! nodes.

use std::fmt;
use std::sync::Arc;

use futures::future::{self, BoxFuture, FutureExt};
use tracing::debug;

use crate::config::{Config, Lifespan};
use crate::data::CacheData;
use crate::error::{EntanglementError, Result};
use crate::key::parent_key;
use crate::node::graph::{NodeCore, Recache};
use crate::node::{
    AsyncDependency, AsyncSource, Cached, ErasedData, GraphNode, NodeId, ResolvedDependencies,
    SyncDependency, SyncSource,
};
use crate::store::StoreStats;
use crate::tasks::Sweep;

type SyncCreation<V, P> =
    dyn Fn(&str, &ResolvedDependencies, &P) -> anyhow::Result<V> + Send + Sync;
type SyncHook<P> = dyn Fn(&str, &str, &P) -> anyhow::Result<()> + Send + Sync;

struct SyncInner<V, P> {
    core: Arc<NodeCore<V, P>>,
    creation: Box<SyncCreation<V, P>>,
    hook: Option<Box<SyncHook<P>>>,
    dependencies: Vec<(String, Arc<dyn SyncSource>)>,
}

impl<V, P> SyncInner<V, P>
where
    V: Send + Sync + 'static,
    P: Clone + Send + Sync + 'static,
{
    fn resolve(&self, key: &str, params: P) -> Result<Cached<V>> {
        let parent = parent_key(key);
        let ticket = self.core.begin_resolve(key);

        if let Some(hook) = &self.hook {
            hook(key, parent, &params).map_err(|source| EntanglementError::Hook {
                key: key.to_string(),
                source,
            })?;
        }

        let mut resolved = ResolvedDependencies::with_capacity(self.dependencies.len());
        for (name, dependency) in &self.dependencies {
            let value = match dependency.recache_erased(key)? {
                Some(value) => value,
                None if parent != key => dependency
                    .recache_erased(parent)?
                    .ok_or_else(|| self.core.unsatisfied(name, key, parent))?,
                None => return Err(self.core.unsatisfied(name, key, parent)),
            };
            resolved.push(name.as_str(), value);
        }

        let value = (self.creation)(key, &resolved, &params).map_err(|source| {
            EntanglementError::Creation {
                key: key.to_string(),
                source,
            }
        })?;
        let value = Arc::new(CacheData::new(value));
        let stored = self.core.store_resolved(&ticket, &value, params);
        debug!(node = %self.core.name(), key, ?stored, "resolved");
        Ok(value)
    }

    fn recache(&self, key: &str) -> Result<Option<Cached<V>>> {
        match self.core.recache_state(key, false) {
            Recache::Unknown => Ok(None),
            Recache::Fresh(value) => Ok(Some(value)),
            Recache::Stale(params) => {
                debug!(node = %self.core.name(), key, "recomputing");
                self.resolve(key, params).map(Some)
            }
        }
    }
}

impl<V, P> SyncSource for SyncInner<V, P>
where
    V: Send + Sync + 'static,
    P: Clone + Send + Sync + 'static,
{
    fn graph_node(&self) -> Arc<dyn GraphNode> {
        self.core.clone()
    }

    fn recache_erased(&self, key: &str) -> Result<Option<ErasedData>> {
        Ok(self.recache(key)?.map(|value| value as ErasedData))
    }
}

impl<V, P> AsyncSource for SyncInner<V, P>
where
    V: Send + Sync + 'static,
    P: Clone + Send + Sync + 'static,
{
    fn graph_node(&self) -> Arc<dyn GraphNode> {
        self.core.clone()
    }

    fn recache_erased<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<ErasedData>>> {
        future::ready(SyncSource::recache_erased(self, key)).boxed()
    }
}

// == Entanglement Sync ==
/// A cache node whose values are created synchronously.
///
/// `V` is the cached value type, `P` the extra parameters passed to the
/// creation function and remembered per key for lazy recomputation.
pub struct EntanglementSync<V, P = ()> {
    inner: Arc<SyncInner<V, P>>,
}

impl<V, P> Clone for EntanglementSync<V, P> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<V, P> fmt::Debug for EntanglementSync<V, P>
where
    V: Send + Sync + 'static,
    P: Clone + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntanglementSync")
            .field("name", &self.inner.core.name())
            .field(
                "dependencies",
                &self.inner.dependencies.iter().map(|(name, _)| name).collect::<Vec<_>>(),
            )
            .finish_non_exhaustive()
    }
}

impl<V, P> EntanglementSync<V, P>
where
    V: Send + Sync + 'static,
    P: Clone + Send + Sync + 'static,
{
    /// Starts building a node around `creation`.
    ///
    /// `creation` receives the key, the resolved dependency values and the
    /// extra parameters.
    pub fn builder<F>(creation: F) -> EntanglementSyncBuilder<V, P>
    where
        F: Fn(&str, &ResolvedDependencies, &P) -> anyhow::Result<V> + Send + Sync + 'static,
    {
        EntanglementSyncBuilder {
            creation: Box::new(creation),
            hook: None,
            dependencies: Vec::new(),
            label: None,
            lifespan: Lifespan::default(),
        }
    }

    pub fn id(&self) -> NodeId {
        self.inner.core.id()
    }

    pub fn label(&self) -> Option<&str> {
        self.inner.core.label()
    }

    // == Cache ==
    /// Returns the value for `key`, creating it if it is missing or dirty.
    ///
    /// A hit slides the TTL floor of the entry.
    pub fn cache(&self, key: &str, params: P) -> Result<Cached<V>> {
        if let Some(value) = self.inner.core.cached(key) {
            return Ok(value);
        }
        self.inner.resolve(key, params)
    }

    // == Get ==
    /// Like [`cache`](Self::cache) with the parameters remembered for `key`.
    ///
    /// Fails with `NotFound` if `key` was never cached on this node.
    pub fn get(&self, key: &str) -> Result<Cached<V>> {
        match self.inner.core.recache_state(key, true) {
            Recache::Unknown => Err(EntanglementError::NotFound(key.to_string())),
            Recache::Fresh(value) => Ok(value),
            Recache::Stale(params) => self.inner.resolve(key, params),
        }
    }

    // == Update ==
    /// Recreates `key` with new parameters.
    ///
    /// Dependent nodes are only marked dirty for `key` and nested keys; they
    /// recompute the next time they are read.
    pub fn update(&self, key: &str, params: P) -> Result<Cached<V>> {
        self.inner.core.bubble_update_signal(key);
        self.inner.resolve(key, params)
    }

    /// Fresh value for `key` without sliding its floor, `None` if never cached.
    pub fn recache(&self, key: &str) -> Result<Option<Cached<V>>> {
        self.inner.recache(key)
    }

    /// Removes `key` here and every nested key on dependent nodes.
    pub fn delete(&self, key: &str) {
        self.inner.core.delete(key);
    }

    pub fn exists(&self, key: &str) -> bool {
        self.inner.core.exists(key)
    }

    /// Alias for [`exists`](Self::exists).
    pub fn has(&self, key: &str) -> bool {
        self.exists(key)
    }

    /// Keys that can be read with [`get`](Self::get).
    pub fn keys(&self) -> Vec<String> {
        self.inner.core.keys()
    }

    pub fn clear(&self) {
        self.inner.core.clear();
    }

    pub fn is_dirty(&self, key: &str) -> bool {
        self.inner.core.is_dirty(key)
    }

    pub fn stats(&self) -> StoreStats {
        self.inner.core.stats()
    }
}

impl<V, P> SyncDependency for EntanglementSync<V, P>
where
    V: Send + Sync + 'static,
    P: Clone + Send + Sync + 'static,
{
    fn sync_source(&self) -> Arc<dyn SyncSource> {
        self.inner.clone()
    }
}

impl<V, P> AsyncDependency for EntanglementSync<V, P>
where
    V: Send + Sync + 'static,
    P: Clone + Send + Sync + 'static,
{
    fn async_source(&self) -> Arc<dyn AsyncSource> {
        self.inner.clone()
    }
}

impl<V, P> Sweep for EntanglementSync<V, P>
where
    V: Send + Sync + 'static,
    P: Clone + Send + Sync + 'static,
{
    fn sweep(&self) -> usize {
        self.inner.core.sweep()
    }
}

// == Builder ==
/// Builder for [`EntanglementSync`].
pub struct EntanglementSyncBuilder<V, P> {
    creation: Box<SyncCreation<V, P>>,
    hook: Option<Box<SyncHook<P>>>,
    dependencies: Vec<(String, Arc<dyn SyncSource>)>,
    label: Option<String>,
    lifespan: Lifespan,
}

impl<V, P> EntanglementSyncBuilder<V, P>
where
    V: Send + Sync + 'static,
    P: Clone + Send + Sync + 'static,
{
    /// Name used in logs and error messages.
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Declares a dependency. Resolution visits dependencies in declaration order.
    pub fn dependency(mut self, name: impl Into<String>, node: &impl SyncDependency) -> Self {
        self.dependencies.push((name.into(), node.sync_source()));
        self
    }

    /// Hook run at the start of every resolution with the key, its parent key
    /// and the extra parameters.
    pub fn before_update<F>(mut self, hook: F) -> Self
    where
        F: Fn(&str, &str, &P) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.hook = Some(Box::new(hook));
        self
    }

    /// TTL floor granted to values after each write or read.
    pub fn lifespan(mut self, lifespan: impl Into<Lifespan>) -> Self {
        self.lifespan = lifespan.into();
        self
    }

    /// Takes the default lifespan from `config`.
    pub fn config(self, config: &Config) -> Self {
        self.lifespan(config.default_lifespan)
    }

    /// Creates the node and registers it with its dependencies.
    ///
    /// Fails if the lifespan string cannot be parsed.
    pub fn build(self) -> Result<EntanglementSync<V, P>> {
        let lifespan = self.lifespan.to_duration()?;
        let core = Arc::new(NodeCore::new(self.label, lifespan));

        let dependent: Arc<dyn GraphNode> = core.clone();
        for (_, dependency) in &self.dependencies {
            dependency
                .graph_node()
                .attach_dependent(Arc::downgrade(&dependent));
        }

        Ok(EntanglementSync {
            inner: Arc::new(SyncInner {
                core,
                creation: self.creation,
                hook: self.hook,
                dependencies: self.dependencies,
            }),
        })
    }
}

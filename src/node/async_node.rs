//! Asynchronous entanglement nodes.
//!
//! Creation functions and before-update hooks return futures. An asynchronous
//! node may depend on both synchronous and asynchronous nodes; the node
//! suspends only while awaiting its hook, a dependency or its creation.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};
use tracing::debug;

use crate::config::{Config, Lifespan};
use crate::data::CacheData;
use crate::error::{EntanglementError, Result};
use crate::key::parent_key;
use crate::node::graph::{NodeCore, Recache};
use crate::node::{
    AsyncDependency, AsyncSource, Cached, ErasedData, GraphNode, NodeId, ResolvedDependencies,
};
use crate::store::StoreStats;
use crate::tasks::Sweep;

type AsyncCreation<V, P> = dyn Fn(String, ResolvedDependencies, P) -> BoxFuture<'static, anyhow::Result<V>>
    + Send
    + Sync;
type AsyncHook<P> =
    dyn Fn(String, String, P) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync;

struct AsyncInner<V, P> {
    core: Arc<NodeCore<V, P>>,
    creation: Box<AsyncCreation<V, P>>,
    hook: Option<Box<AsyncHook<P>>>,
    dependencies: Vec<(String, Arc<dyn AsyncSource>)>,
}

impl<V, P> AsyncInner<V, P>
where
    V: Send + Sync + 'static,
    P: Clone + Send + Sync + 'static,
{
    async fn resolve(&self, key: &str, params: P) -> Result<Cached<V>> {
        let parent = parent_key(key);
        let ticket = self.core.begin_resolve(key);

        if let Some(hook) = &self.hook {
            hook(key.to_string(), parent.to_string(), params.clone())
                .await
                .map_err(|source| EntanglementError::Hook {
                    key: key.to_string(),
                    source,
                })?;
        }

        let mut resolved = ResolvedDependencies::with_capacity(self.dependencies.len());
        for (name, dependency) in &self.dependencies {
            let value = match dependency.recache_erased(key).await? {
                Some(value) => value,
                None if parent != key => dependency
                    .recache_erased(parent)
                    .await?
                    .ok_or_else(|| self.core.unsatisfied(name, key, parent))?,
                None => return Err(self.core.unsatisfied(name, key, parent)),
            };
            resolved.push(name.as_str(), value);
        }

        let value = (self.creation)(key.to_string(), resolved, params.clone())
            .await
            .map_err(|source| EntanglementError::Creation {
                key: key.to_string(),
                source,
            })?;
        let value = Arc::new(CacheData::new(value));
        let stored = self.core.store_resolved(&ticket, &value, params);
        debug!(node = %self.core.name(), key, ?stored, "resolved");
        Ok(value)
    }

    async fn recache(&self, key: &str) -> Result<Option<Cached<V>>> {
        let params = match self.core.recache_state(key, false) {
            Recache::Unknown => return Ok(None),
            Recache::Fresh(value) => return Ok(Some(value)),
            Recache::Stale(params) => params,
        };
        debug!(node = %self.core.name(), key, "recomputing");
        self.resolve(key, params).await.map(Some)
    }
}

impl<V, P> AsyncSource for AsyncInner<V, P>
where
    V: Send + Sync + 'static,
    P: Clone + Send + Sync + 'static,
{
    fn graph_node(&self) -> Arc<dyn GraphNode> {
        self.core.clone()
    }

    fn recache_erased<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<ErasedData>>> {
        async move {
            let value = self.recache(key).await?;
            Ok::<_, EntanglementError>(value.map(|value| value as ErasedData))
        }
        .boxed()
    }
}

// == Entanglement Async ==
/// A cache node whose values are created by futures.
///
/// Concurrent calls for the same key are not coalesced: each runs its own
/// resolution and the last one to finish wins.
pub struct EntanglementAsync<V, P = ()> {
    inner: Arc<AsyncInner<V, P>>,
}

impl<V, P> Clone for EntanglementAsync<V, P> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<V, P> fmt::Debug for EntanglementAsync<V, P>
where
    V: Send + Sync + 'static,
    P: Clone + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntanglementAsync")
            .field("name", &self.inner.core.name())
            .field(
                "dependencies",
                &self.inner.dependencies.iter().map(|(name, _)| name).collect::<Vec<_>>(),
            )
            .finish_non_exhaustive()
    }
}

impl<V, P> EntanglementAsync<V, P>
where
    V: Send + Sync + 'static,
    P: Clone + Send + Sync + 'static,
{
    /// Starts building a node around the asynchronous `creation` function.
    pub fn builder<F, Fut>(creation: F) -> EntanglementAsyncBuilder<V, P>
    where
        F: Fn(String, ResolvedDependencies, P) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<V>> + Send + 'static,
    {
        EntanglementAsyncBuilder {
            creation: Box::new(move |key, resolved, params| creation(key, resolved, params).boxed()),
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

    /// Returns the value for `key`, creating it if it is missing or dirty.
    pub async fn cache(&self, key: &str, params: P) -> Result<Cached<V>> {
        if let Some(value) = self.inner.core.cached(key) {
            return Ok(value);
        }
        self.inner.resolve(key, params).await
    }

    /// Like [`cache`](Self::cache) with the parameters remembered for `key`.
    pub async fn get(&self, key: &str) -> Result<Cached<V>> {
        let params = match self.inner.core.recache_state(key, true) {
            Recache::Unknown => return Err(EntanglementError::NotFound(key.to_string())),
            Recache::Fresh(value) => return Ok(value),
            Recache::Stale(params) => params,
        };
        self.inner.resolve(key, params).await
    }

    /// Recreates `key` with new parameters, marking dependents dirty.
    pub async fn update(&self, key: &str, params: P) -> Result<Cached<V>> {
        self.inner.core.bubble_update_signal(key);
        self.inner.resolve(key, params).await
    }

    pub async fn recache(&self, key: &str) -> Result<Option<Cached<V>>> {
        self.inner.recache(key).await
    }

    pub fn delete(&self, key: &str) {
        self.inner.core.delete(key);
    }

    pub fn exists(&self, key: &str) -> bool {
        self.inner.core.exists(key)
    }

    pub fn has(&self, key: &str) -> bool {
        self.exists(key)
    }

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

impl<V, P> AsyncDependency for EntanglementAsync<V, P>
where
    V: Send + Sync + 'static,
    P: Clone + Send + Sync + 'static,
{
    fn async_source(&self) -> Arc<dyn AsyncSource> {
        self.inner.clone()
    }
}

impl<V, P> Sweep for EntanglementAsync<V, P>
where
    V: Send + Sync + 'static,
    P: Clone + Send + Sync + 'static,
{
    fn sweep(&self) -> usize {
        self.inner.core.sweep()
    }
}

// == Builder ==
/// Builder for [`EntanglementAsync`].
pub struct EntanglementAsyncBuilder<V, P> {
    creation: Box<AsyncCreation<V, P>>,
    hook: Option<Box<AsyncHook<P>>>,
    dependencies: Vec<(String, Arc<dyn AsyncSource>)>,
    label: Option<String>,
    lifespan: Lifespan,
}

impl<V, P> EntanglementAsyncBuilder<V, P>
where
    V: Send + Sync + 'static,
    P: Clone + Send + Sync + 'static,
{
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Declares a dependency on a synchronous or asynchronous node.
    pub fn dependency(mut self, name: impl Into<String>, node: &impl AsyncDependency) -> Self {
        self.dependencies.push((name.into(), node.async_source()));
        self
    }

    /// Hook awaited at the start of every resolution with the key, its parent
    /// key and the extra parameters.
    pub fn before_update<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(String, String, P) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.hook = Some(Box::new(move |key, parent, params| hook(key, parent, params).boxed()));
        self
    }

    pub fn lifespan(mut self, lifespan: impl Into<Lifespan>) -> Self {
        self.lifespan = lifespan.into();
        self
    }

    pub fn config(self, config: &Config) -> Self {
        self.lifespan(config.default_lifespan)
    }

    pub fn build(self) -> Result<EntanglementAsync<V, P>> {
        let lifespan = self.lifespan.to_duration()?;
        let core = Arc::new(NodeCore::new(self.label, lifespan));

        let dependent: Arc<dyn GraphNode> = core.clone();
        for (_, dependency) in &self.dependencies {
            dependency
                .graph_node()
                .attach_dependent(Arc::downgrade(&dependent));
        }

        Ok(EntanglementAsync {
            inner: Arc::new(AsyncInner {
                core,
                creation: self.creation,
                hook: self.hook,
                dependencies: self.dependencies,
            }),
        })
    }
}

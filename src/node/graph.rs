//! Node Graph Core
//!
//! State shared by both node flavours: the weak store, remembered creation
//! parameters, the dirty-key set and the reverse edges to dependent nodes.
//! Dirty-signal propagation and cascading deletes live here because they never
//! call a creation function.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::data::CacheData;
use crate::error::EntanglementError;
use crate::key::is_nested_under;
use crate::store::{StoreStats, WeakStore};

/// Shared handle to a cached value.
pub type Cached<V> = Arc<CacheData<V>>;

static NEXT_NODE_ID: AtomicU64 = AtomicU64::new(1);

// == Node Id ==
/// Process-unique identity of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl NodeId {
    fn next() -> Self {
        NodeId(NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// == Graph Node ==
/// Type-erased view of a node used along reverse (dependent) edges.
pub trait GraphNode: Send + Sync {
    fn id(&self) -> NodeId;

    /// Registers `dependent` as a node that depends on this one.
    ///
    /// Registration is deduplicated by node identity.
    fn attach_dependent(&self, dependent: Weak<dyn GraphNode>);

    /// Marks `key` dirty here and on every dependent key nested under it.
    fn bubble_update_signal(&self, key: &str);

    /// Removes `key` here and every nested key on dependent nodes.
    fn delete(&self, key: &str);

    /// Keys that can be recomputed on this node.
    fn keys(&self) -> Vec<String>;

    /// Recomputable keys plus keys whose first resolution is still running.
    fn tracked_keys(&self) -> Vec<String>;
}

pub(crate) struct NodeState<V, P> {
    pub store: WeakStore<CacheData<V>>,
    pub params: HashMap<String, P>,
    pub dirty: HashSet<String>,
    /// Bumped by every invalidation of any key
    generation: u64,
    /// Resolutions running per key
    pending: HashMap<String, usize>,
    /// What happened to each key while resolutions were running
    clocks: HashMap<String, KeyClock>,
}

/// Generations of the last events on a key, kept only while resolutions run.
#[derive(Debug, Default, Clone, Copy)]
struct KeyClock {
    updated: u64,
    deleted: u64,
    stored: u64,
}

impl<V, P> NodeState<V, P> {
    fn invalidate(&mut self, key: &str, deleted: bool) {
        self.generation += 1;
        if self.pending.is_empty() {
            return;
        }
        let generation = self.generation;
        let clock = self.clocks.entry(key.to_string()).or_default();
        if deleted {
            clock.deleted = generation;
        } else {
            clock.updated = generation;
        }
    }
}

// == Resolve Ticket ==
/// Marks a resolution of one key as running.
///
/// A result is only stored as clean if nothing invalidated the key after
/// the ticket was taken.
pub(crate) struct ResolveTicket<'a, V, P> {
    core: &'a NodeCore<V, P>,
    key: String,
    generation: u64,
}

impl<V, P> Drop for ResolveTicket<'_, V, P> {
    fn drop(&mut self) {
        let mut state = self.core.state.lock();
        let done = match state.pending.get_mut(&self.key) {
            Some(count) if *count > 1 => {
                *count -= 1;
                false
            }
            _ => true,
        };
        if done {
            state.pending.remove(&self.key);
            if !state.params.contains_key(&self.key) {
                // Dirtied while resolving but never stored
                state.dirty.remove(&self.key);
            }
        }
        if state.pending.is_empty() {
            state.clocks.clear();
        }
    }
}

/// Outcome of storing a resolved value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Stored {
    /// Stored and clean
    Fresh,
    /// Invalidated while resolving; stored value, if any, stays dirty
    Dirty,
    /// Deleted or superseded by a later resolution; nothing stored
    Discarded,
}

/// What a lazy recompute has to do for a key.
pub(crate) enum Recache<V, P> {
    /// Never cached on this node
    Unknown,
    /// Live and clean
    Fresh(Cached<V>),
    /// Collected or dirty; recompute with the remembered parameters
    Stale(P),
}

// == Node Core ==
pub(crate) struct NodeCore<V, P> {
    id: NodeId,
    label: Option<String>,
    state: Mutex<NodeState<V, P>>,
    dependents: Mutex<Vec<Weak<dyn GraphNode>>>,
}

impl<V, P> NodeCore<V, P>
where
    V: Send + Sync + 'static,
    P: Clone + Send + Sync + 'static,
{
    pub fn new(label: Option<String>, lifespan: Duration) -> Self {
        let id = NodeId::next();
        let name = display_name(label.as_deref(), id);
        let store = WeakStore::new(lifespan).with_finalizer(Arc::new(move |key: &str| {
            debug!(node = %name, key, "cached value reclaimed");
        }));

        Self {
            id,
            label,
            state: Mutex::new(NodeState {
                store,
                params: HashMap::new(),
                dirty: HashSet::new(),
                generation: 0,
                pending: HashMap::new(),
                clocks: HashMap::new(),
            }),
            dependents: Mutex::new(Vec::new()),
        }
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// Diagnostic name, `label#id`.
    pub fn name(&self) -> String {
        display_name(self.label.as_deref(), self.id)
    }

    /// Live dependents, in registration order.
    fn dependents(&self) -> Vec<Arc<dyn GraphNode>> {
        self.dependents
            .lock()
            .iter()
            .filter_map(Weak::upgrade)
            .collect()
    }

    /// Returns the live, clean value for `key`, sliding its floor.
    pub fn cached(&self, key: &str) -> Option<Cached<V>> {
        let mut state = self.state.lock();
        if state.dirty.contains(key) {
            return None;
        }
        let value = state.store.get(key)?;
        if state.store.extend_floor(key) {
            trace!(node = %self.name(), key, "floor extended");
        }
        trace!(node = %self.name(), key, "cache hit");
        Some(value)
    }

    /// Classifies `key` for a lazy recompute or a parameterless read.
    pub fn recache_state(&self, key: &str, extend_floor: bool) -> Recache<V, P> {
        let mut state = self.state.lock();
        let Some(params) = state.params.get(key).cloned() else {
            return Recache::Unknown;
        };
        if !state.dirty.contains(key) {
            if let Some(value) = state.store.get(key) {
                if extend_floor {
                    state.store.extend_floor(key);
                }
                return Recache::Fresh(value);
            }
        }
        Recache::Stale(params)
    }

    /// Registers a resolution of `key` that is about to start.
    pub fn begin_resolve(&self, key: &str) -> ResolveTicket<'_, V, P> {
        let mut state = self.state.lock();
        *state.pending.entry(key.to_string()).or_insert(0) += 1;
        ResolveTicket {
            core: self,
            key: key.to_string(),
            generation: state.generation,
        }
    }

    /// Records a freshly created value and the parameters that produced it.
    ///
    /// A delete of `key` after the ticket was taken, or a resolution started
    /// later that already stored, discards the value. An update signal after
    /// the ticket was taken leaves the key dirty.
    pub fn store_resolved(
        &self,
        ticket: &ResolveTicket<'_, V, P>,
        value: &Cached<V>,
        params: P,
    ) -> Stored {
        let key = ticket.key.as_str();
        let mut state = self.state.lock();
        let clock = state.clocks.get(key).copied().unwrap_or_default();

        if clock.deleted > ticket.generation || clock.stored > ticket.generation {
            debug!(node = %self.name(), key, "result discarded, key changed while resolving");
            return Stored::Discarded;
        }

        state.clocks.entry(key.to_string()).or_default().stored = ticket.generation;
        if clock.updated > ticket.generation {
            if !state.params.contains_key(key) {
                state.store.set(key, value);
                state.params.insert(key.to_string(), params);
            }
            state.dirty.insert(key.to_string());
            debug!(node = %self.name(), key, "invalidated while resolving, left dirty");
            return Stored::Dirty;
        }

        state.store.set(key, value);
        state.params.insert(key.to_string(), params);
        state.dirty.remove(key);
        Stored::Fresh
    }

    pub fn unsatisfied(&self, dependency: &str, key: &str, parent_key: &str) -> EntanglementError {
        EntanglementError::DependencyNotSatisfied {
            dependency: dependency.to_string(),
            key: key.to_string(),
            parent_key: parent_key.to_string(),
            node: self.name(),
        }
    }

    pub fn exists(&self, key: &str) -> bool {
        let mut state = self.state.lock();
        state.params.contains_key(key) || state.store.has(key)
    }

    pub fn is_dirty(&self, key: &str) -> bool {
        self.state.lock().dirty.contains(key)
    }

    pub fn sweep(&self) -> usize {
        self.state.lock().store.sweep()
    }

    pub fn stats(&self) -> StoreStats {
        self.state.lock().store.stats()
    }

    pub fn clear(&self) {
        for key in GraphNode::keys(self) {
            GraphNode::delete(self, &key);
        }
    }
}

impl<V, P> GraphNode for NodeCore<V, P>
where
    V: Send + Sync + 'static,
    P: Clone + Send + Sync + 'static,
{
    fn id(&self) -> NodeId {
        self.id
    }

    fn attach_dependent(&self, dependent: Weak<dyn GraphNode>) {
        let Some(node) = dependent.upgrade() else {
            return;
        };
        let mut dependents = self.dependents.lock();
        dependents.retain(|existing| existing.strong_count() > 0);
        let known = dependents
            .iter()
            .filter_map(Weak::upgrade)
            .any(|existing| existing.id() == node.id());
        if !known {
            dependents.push(dependent);
        }
    }

    fn bubble_update_signal(&self, key: &str) {
        {
            let mut state = self.state.lock();
            state.dirty.insert(key.to_string());
            state.invalidate(key, false);
        }
        debug!(node = %self.name(), key, "marked dirty");

        for dependent in self.dependents() {
            for cached_key in dependent.tracked_keys() {
                if is_nested_under(&cached_key, key) {
                    dependent.bubble_update_signal(&cached_key);
                }
            }
        }
    }

    fn delete(&self, key: &str) {
        {
            let mut state = self.state.lock();
            state.store.delete(key);
            state.params.remove(key);
            state.dirty.remove(key);
            state.invalidate(key, true);
        }
        debug!(node = %self.name(), key, "deleted");

        for dependent in self.dependents() {
            for cached_key in dependent.tracked_keys() {
                if is_nested_under(&cached_key, key) {
                    dependent.delete(&cached_key);
                }
            }
        }
    }

    fn keys(&self) -> Vec<String> {
        self.state.lock().params.keys().cloned().collect()
    }

    fn tracked_keys(&self) -> Vec<String> {
        let state = self.state.lock();
        let mut keys: Vec<String> = state.params.keys().cloned().collect();
        keys.extend(
            state
                .pending
                .keys()
                .filter(|key| !state.params.contains_key(*key))
                .cloned(),
        );
        keys
    }
}

fn display_name(label: Option<&str>, id: NodeId) -> String {
    format!("{}{}", label.unwrap_or("node"), id)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn core(label: &str) -> Arc<NodeCore<u32, ()>> {
        Arc::new(NodeCore::new(Some(label.to_string()), Duration::from_secs(60)))
    }

    fn link(dependency: &Arc<NodeCore<u32, ()>>, dependent: &Arc<NodeCore<u32, ()>>) {
        let dependent: Arc<dyn GraphNode> = dependent.clone();
        dependency.attach_dependent(Arc::downgrade(&dependent));
    }

    fn seed(node: &NodeCore<u32, ()>, key: &str, value: u32) -> Cached<u32> {
        let value = Arc::new(CacheData::new(value));
        let ticket = node.begin_resolve(key);
        node.store_resolved(&ticket, &value, ());
        value
    }

    #[test]
    fn test_node_ids_are_unique() {
        let a = core("a");
        let b = core("b");
        assert_ne!(a.id(), b.id());
        assert_eq!(a.name(), format!("a#{}", a.id().as_u64()));
    }

    #[test]
    fn test_attach_dependent_deduplicates() {
        let a = core("a");
        let b = core("b");
        link(&a, &b);
        link(&a, &b);
        assert_eq!(a.dependents().len(), 1);
    }

    #[test]
    fn test_dropped_dependent_is_not_signalled() {
        let a = core("a");
        {
            let b = core("b");
            link(&a, &b);
        }
        assert!(a.dependents().is_empty());
        a.bubble_update_signal("p");
        assert!(a.is_dirty("p"));
    }

    #[test]
    fn test_bubble_marks_nested_dependent_keys() {
        let a = core("a");
        let b = core("b");
        link(&a, &b);
        for key in ["p", "p/c", "p/c/d", "q", "pq"] {
            seed(&b, key, 1);
        }

        a.bubble_update_signal("p");

        assert!(a.is_dirty("p"));
        assert!(b.is_dirty("p"));
        assert!(b.is_dirty("p/c"));
        assert!(b.is_dirty("p/c/d"));
        assert!(!b.is_dirty("q"));
        assert!(!b.is_dirty("pq"));
    }

    #[test]
    fn test_dirty_key_is_not_served() {
        let a = core("a");
        let _held = seed(&a, "p", 1);

        assert!(a.cached("p").is_some());
        a.bubble_update_signal("p");
        assert!(a.cached("p").is_none());
        assert!(matches!(a.recache_state("p", false), Recache::Stale(())));
        assert!(matches!(a.recache_state("x", false), Recache::Unknown));
    }

    #[test]
    fn test_delete_cascades_to_nested_keys() {
        let a = core("a");
        let b = core("b");
        let c = core("c");
        link(&a, &b);
        link(&b, &c);
        seed(&a, "p", 1);
        seed(&b, "p/c", 2);
        seed(&b, "q", 3);
        seed(&c, "p/c/d", 4);

        a.delete("p");

        assert!(!a.exists("p"));
        assert!(!b.exists("p/c"));
        assert!(b.exists("q"));
        assert!(!c.exists("p/c/d"));
    }

    #[test]
    fn test_update_during_resolve_leaves_key_dirty() {
        let a = core("a");
        let value = Arc::new(CacheData::new(1));

        let ticket = a.begin_resolve("p");
        a.bubble_update_signal("p");
        assert_eq!(a.store_resolved(&ticket, &value, ()), Stored::Dirty);
        drop(ticket);

        assert!(a.exists("p"));
        assert!(a.is_dirty("p"));
        assert!(matches!(a.recache_state("p", false), Recache::Stale(())));
    }

    #[test]
    fn test_delete_during_resolve_discards_result() {
        let a = core("a");
        let value = Arc::new(CacheData::new(1));

        let ticket = a.begin_resolve("p");
        a.delete("p");
        assert_eq!(a.store_resolved(&ticket, &value, ()), Stored::Discarded);
        drop(ticket);

        assert!(!a.exists("p"));
        assert!(GraphNode::keys(a.as_ref()).is_empty());
    }

    #[test]
    fn test_bubble_reaches_key_on_first_resolution() {
        let a = core("a");
        let b = core("b");
        link(&a, &b);
        let value = Arc::new(CacheData::new(1));

        let ticket = b.begin_resolve("p/c");
        assert!(GraphNode::keys(b.as_ref()).is_empty());
        a.bubble_update_signal("p");

        assert_eq!(b.store_resolved(&ticket, &value, ()), Stored::Dirty);
        assert!(b.is_dirty("p/c"));
    }

    #[test]
    fn test_later_resolution_supersedes_earlier_one() {
        let a = core("a");
        let older = Arc::new(CacheData::new(1));
        let newer = Arc::new(CacheData::new(2));

        let first = a.begin_resolve("k");
        a.bubble_update_signal("k");
        let second = a.begin_resolve("k");

        assert_eq!(a.store_resolved(&second, &newer, ()), Stored::Fresh);
        assert_eq!(a.store_resolved(&first, &older, ()), Stored::Discarded);
        drop((first, second));

        assert!(!a.is_dirty("k"));
        assert_eq!(a.cached("k").map(|v| *v.raw()), Some(2));
    }

    #[test]
    fn test_same_generation_resolutions_last_write_wins() {
        let a = core("a");
        let first = a.begin_resolve("k");
        let second = a.begin_resolve("k");

        let one = Arc::new(CacheData::new(1));
        let two = Arc::new(CacheData::new(2));
        assert_eq!(a.store_resolved(&second, &two, ()), Stored::Fresh);
        assert_eq!(a.store_resolved(&first, &one, ()), Stored::Fresh);

        assert_eq!(a.cached("k").map(|v| *v.raw()), Some(1));
    }

    #[test]
    fn test_abandoned_resolution_clears_dirty_mark() {
        let a = core("a");
        let b = core("b");
        link(&a, &b);

        let ticket = b.begin_resolve("p/c");
        a.bubble_update_signal("p");
        assert!(b.is_dirty("p/c"));

        drop(ticket);
        assert!(!b.is_dirty("p/c"));
        assert!(!b.exists("p/c"));
    }

    #[test]
    fn test_clear_removes_everything() {
        let a = core("a");
        seed(&a, "x", 1);
        seed(&a, "y", 2);

        a.clear();
        assert!(GraphNode::keys(a.as_ref()).is_empty());
    }
}

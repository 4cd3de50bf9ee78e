// ── Generic reactive entity collection ──
//
// Concurrent keyed storage with push-based change notification via
// `watch` channels.

use std::hash::Hash;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::watch;

/// A concurrent, reactive collection for a single entity type.
///
/// Every mutation rebuilds the snapshot that subscribers receive.
pub(crate) struct EntityCollection<K, T>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    T: Clone + Send + Sync + 'static,
{
    by_key: DashMap<K, Arc<T>>,

    /// Full snapshot, rebuilt on mutation for efficient subscription.
    snapshot: watch::Sender<Arc<Vec<Arc<T>>>>,
}

impl<K, T> EntityCollection<K, T>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    T: Clone + Send + Sync + 'static,
{
    pub(crate) fn new() -> Self {
        let (snapshot, _) = watch::channel(Arc::new(Vec::new()));

        Self {
            by_key: DashMap::new(),
            snapshot,
        }
    }

    /// Insert or replace an entity. Returns `true` if the key was new.
    pub(crate) fn upsert(&self, key: K, entity: T) -> bool {
        let is_new = self.by_key.insert(key, Arc::new(entity)).is_none();
        self.rebuild_snapshot();
        is_new
    }

    /// Remove an entity by key. Returns the removed entity if it existed.
    pub(crate) fn remove(&self, key: &K) -> Option<Arc<T>> {
        let removed = self.by_key.remove(key).map(|(_, v)| v);
        if removed.is_some() {
            self.rebuild_snapshot();
        }
        removed
    }

    pub(crate) fn get(&self, key: &K) -> Option<Arc<T>> {
        self.by_key.get(key).map(|r| Arc::clone(r.value()))
    }

    /// Every entity whose key matches `pred`.
    pub(crate) fn filter_keys(&self, pred: impl Fn(&K) -> bool) -> Vec<Arc<T>> {
        self.by_key
            .iter()
            .filter(|r| pred(r.key()))
            .map(|r| Arc::clone(r.value()))
            .collect()
    }

    /// Get the current snapshot (cheap `Arc` clone).
    pub(crate) fn snapshot(&self) -> Arc<Vec<Arc<T>>> {
        self.snapshot.borrow().clone()
    }

    /// Subscribe to snapshot changes via a `watch::Receiver`.
    pub(crate) fn subscribe(&self) -> watch::Receiver<Arc<Vec<Arc<T>>>> {
        self.snapshot.subscribe()
    }

    pub(crate) fn len(&self) -> usize {
        self.by_key.len()
    }

    // ── Private helpers ──────────────────────────────────────────────

    /// Collect all values into a snapshot vec and broadcast to subscribers.
    fn rebuild_snapshot(&self) {
        let values: Vec<Arc<T>> = self.by_key.iter().map(|r| Arc::clone(r.value())).collect();
        // `send_modify` updates unconditionally, even with zero receivers.
        self.snapshot.send_modify(|snap| *snap = Arc::new(values));
    }
}

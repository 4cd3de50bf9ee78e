// ── Time-bounded state ──
//
// Every piece of per-terminal state the engine carries between cycles
// lives in one of these, so nothing accumulates without bound.

use std::collections::HashMap;
use std::hash::Hash;
use std::time::Duration;

use tokio::time::Instant;

/// Map whose entries expire `ttl` after their last write.
#[derive(Debug)]
pub struct ExpiringCache<K, V> {
    ttl: Duration,
    entries: HashMap<K, (Instant, V)>,
}

impl<K: Eq + Hash, V> ExpiringCache<K, V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: HashMap::new(),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Insert or overwrite, restarting the entry's lifetime.
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        self.entries
            .insert(key, (Instant::now(), value))
            .map(|(_, v)| v)
    }

    /// Live entry for `key`. Expired entries read as absent.
    pub fn get(&self, key: &K) -> Option<&V> {
        self.entries
            .get(key)
            .filter(|(at, _)| at.elapsed() < self.ttl)
            .map(|(_, v)| v)
    }

    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        let ttl = self.ttl;
        self.entries
            .get_mut(key)
            .filter(|(at, _)| at.elapsed() < ttl)
            .map(|(_, v)| v)
    }

    pub fn contains(&self, key: &K) -> bool {
        self.get(key).is_some()
    }

    pub fn remove(&mut self, key: &K) -> Option<V> {
        self.entries.remove(key).map(|(_, v)| v)
    }

    /// Drop expired entries; returns how many went.
    pub fn evict_expired(&mut self) -> usize {
        let before = self.entries.len();
        let ttl = self.ttl;
        self.entries.retain(|_, (at, _)| at.elapsed() < ttl);
        before - self.entries.len()
    }

    /// Iterate live entries.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.entries
            .iter()
            .filter(|(_, (at, _))| at.elapsed() < self.ttl)
            .map(|(k, (_, v))| (k, v))
    }

    /// Entry count, expired-but-not-evicted included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn entries_expire_after_ttl() {
        let mut cache = ExpiringCache::new(Duration::from_secs(60));
        cache.insert("a", 1);
        tokio::time::advance(Duration::from_secs(30)).await;
        cache.insert("b", 2);
        assert_eq!(cache.get(&"a"), Some(&1));

        tokio::time::advance(Duration::from_secs(31)).await;
        assert_eq!(cache.get(&"a"), None);
        assert_eq!(cache.get(&"b"), Some(&2));
        assert_eq!(cache.len(), 2);

        assert_eq!(cache.evict_expired(), 1);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.iter().count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn insert_restarts_lifetime() {
        let mut cache = ExpiringCache::new(Duration::from_secs(10));
        cache.insert("a", 1);
        tokio::time::advance(Duration::from_secs(8)).await;
        assert_eq!(cache.insert("a", 2), Some(1));
        tokio::time::advance(Duration::from_secs(8)).await;
        assert!(cache.contains(&"a"));
        assert_eq!(cache.remove(&"a"), Some(2));
        assert!(cache.is_empty());
    }
}

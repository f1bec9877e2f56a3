//! Read cache for values resolved out of the loaded document.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use serde_json::Value;
use tracing::debug;

/// Hit and miss counters plus the current entry count.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups answered from the cache.
    pub hits: u64,
    /// Lookups that had to read the document.
    pub misses: u64,
    /// Values currently cached.
    pub entries: usize,
    /// Invalidations so far.
    pub generation: u64,
}

struct Entry {
    generation: u64,
    value: Value,
}

/// Process-wide cache of values derived from the loaded document.
///
/// Entries are stamped with the generation current when their source was read.
/// [`ReadCache::invalidate_all`] bumps the generation, so a value computed from
/// a document that has since been replaced is never served, even if it was
/// inserted after the invalidation ran.
#[derive(Default)]
pub struct ReadCache {
    entries: DashMap<String, Entry>,
    generation: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ReadCache {
    /// Empty cache at generation zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Generation to stamp on a value about to be computed from the current document.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Value cached under `key` for the current generation, if any.
    pub fn get(&self, key: &str) -> Option<Value> {
        let current = self.generation();
        let hit = self
            .entries
            .get(key)
            .filter(|entry| entry.generation == current)
            .map(|entry| entry.value.clone());

        match hit {
            Some(_) => self.hits.fetch_add(1, Ordering::Relaxed),
            None => self.misses.fetch_add(1, Ordering::Relaxed),
        };
        hit
    }

    /// Store `value` computed while `generation` was current.
    pub fn insert(&self, generation: u64, key: impl Into<String>, value: Value) {
        if generation != self.generation() {
            return;
        }
        self.entries.insert(key.into(), Entry { generation, value });
    }

    /// Drop every entry; called after each successful write.
    pub fn invalidate_all(&self) {
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        let dropped = self.entries.len();
        self.entries.clear();
        debug!(generation, dropped, "read cache invalidated");
    }

    /// Current counters.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.entries.len(),
            generation: self.generation(),
        }
    }
}

/// Cache key for the value at `path` inside one guild.
pub fn entity_key(guild_id: &str, path: &str) -> String {
    format!("entity:{guild_id}:{path}")
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn miss_then_hit_is_counted() {
        let cache = ReadCache::new();
        let key = entity_key("1", "players.2");

        assert_eq!(cache.get(&key), None);
        cache.insert(cache.generation(), key.clone(), json!({"age": "30"}));
        assert_eq!(cache.get(&key), Some(json!({"age": "30"})));

        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses, stats.entries), (1, 1, 1));
    }

    #[test]
    fn invalidate_drops_everything() {
        let cache = ReadCache::new();
        cache.insert(0, "a", json!(1));
        cache.insert(0, "b", json!(2));

        cache.invalidate_all();

        assert_eq!(cache.get("a"), None);
        assert_eq!(cache.stats().entries, 0);
        assert_eq!(cache.generation(), 1);
    }

    #[test]
    fn value_from_superseded_generation_is_not_stored() {
        let cache = ReadCache::new();
        let before_write = cache.generation();

        cache.invalidate_all();
        cache.insert(before_write, "stale", json!("old"));

        assert_eq!(cache.get("stale"), None);
    }
}

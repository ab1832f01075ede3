//! Generic TTL cache shared by the provider clients (C4) and the pre-fetch
//! planner (C5): a `parking_lot`-guarded map with explicit per-entry expiry,
//! one reusable type instead of one bespoke cache per data source.

use dashmap::DashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

struct Entry<V> {
    value: V,
    expires_at: Instant,
}

/// Read-heavy, single-writer-per-key (last write wins) cache. Shared across
/// concurrent requests — per the concurrency model this is the one piece of
/// state that intentionally *is* process-wide, unlike per-request telemetry.
pub struct TtlCache<K, V> {
    entries: DashMap<K, Entry<V>>,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Returns the cached value only if present and not expired. A hit here
    /// satisfies the "data used" contract only because `put` is only ever
    /// called right after a live provider call completes successfully.
    pub fn get(&self, key: &K) -> Option<V> {
        let hit = self.entries.get(key)?;
        if hit.expires_at <= Instant::now() {
            drop(hit);
            self.entries.remove(key);
            return None;
        }
        Some(hit.value.clone())
    }

    pub fn put(&self, key: K, value: V, ttl: Duration) {
        self.entries.insert(
            key,
            Entry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K, V> Default for TtlCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    #[test]
    fn expires_after_ttl() {
        let cache: TtlCache<String, i32> = TtlCache::new();
        cache.put("k".to_string(), 42, Duration::from_millis(10));
        assert_eq!(cache.get(&"k".to_string()), Some(42));
        sleep(Duration::from_millis(20));
        assert_eq!(cache.get(&"k".to_string()), None);
    }

    #[test]
    fn lower_cased_keys_distinguish_targets() {
        // A partial key would collide two distinct candidates; the cache
        // itself is key-format agnostic, but callers (Candidate::prefetch_key)
        // are responsible for fully qualifying — this just proves distinct
        // tuples don't collide.
        let cache: TtlCache<(String, String, String), f64> = TtlCache::new();
        cache.put(
            ("lakers".into(), "celtics".into(), "points".into()),
            1.0,
            Duration::from_secs(60),
        );
        cache.put(
            ("lakers".into(), "celtics".into(), "rebounds".into()),
            2.0,
            Duration::from_secs(60),
        );
        assert_eq!(
            cache.get(&("lakers".into(), "celtics".into(), "points".into())),
            Some(1.0)
        );
        assert_eq!(
            cache.get(&("lakers".into(), "celtics".into(), "rebounds".into())),
            Some(2.0)
        );
    }
}

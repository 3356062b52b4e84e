use std::sync::Arc;
use std::time::Duration;

use agrimedia_common::MediaError;
use chrono::{DateTime, Utc};
use lru::LruCache;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, trace};

use super::stats::{CacheStats, EntryUsage};
use super::{EvictionObserver, EvictionPolicy, EvictionReason};
use crate::clock::Clock;
use crate::config::CacheConfig;

const DEFAULT_TOP_ENTRIES: usize = 5;

/// A cached value and its bookkeeping.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry<V> {
    pub value: V,
    pub cached_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub access_count: u64,
    pub last_accessed: DateTime<Utc>,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

struct CacheState<V> {
    /// Most recently used at the front. Under FIFO, lookups never promote,
    /// so the order is insertion order.
    entries: LruCache<String, CacheEntry<V>>,
    hits: u64,
    misses: u64,
    evictions: u64,
}

/// Thread-safe bounded cache with lazy TTL expiry.
///
/// The map and the recency order live behind one mutex, so each
/// over-capacity insert evicts exactly one entry and access counts only ever
/// grow. Observers are called after the lock is dropped.
pub struct BoundedCache<V> {
    state: Mutex<CacheState<V>>,
    max_size: usize,
    default_ttl: Duration,
    policy: EvictionPolicy,
    clock: Arc<dyn Clock>,
    observers: RwLock<Vec<Arc<dyn EvictionObserver>>>,
}

impl<V: Clone> BoundedCache<V> {
    pub fn new(
        max_size: usize,
        default_ttl: Duration,
        policy: EvictionPolicy,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            state: Mutex::new(CacheState {
                entries: LruCache::unbounded(),
                hits: 0,
                misses: 0,
                evictions: 0,
            }),
            max_size: max_size.max(1),
            default_ttl,
            policy,
            clock,
            observers: RwLock::new(Vec::new()),
        }
    }

    pub fn from_config(config: &CacheConfig, clock: Arc<dyn Clock>) -> Self {
        Self::new(
            config.max_size,
            Duration::from_secs(config.default_ttl_secs),
            config.eviction_policy,
            clock,
        )
    }

    pub fn subscribe(&self, observer: Arc<dyn EvictionObserver>) {
        self.observers.write().push(observer);
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn policy(&self) -> EvictionPolicy {
        self.policy
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Look up `key`, counting a hit or miss. Stale entries are removed and
    /// reported as [`EvictionReason::Expired`].
    pub fn get(&self, key: &str) -> Option<V> {
        let now = self.clock.now();
        let mut removed = None;

        let result = {
            let mut state = self.state.lock();
            let expired = match state.entries.peek(key) {
                None => None,
                Some(entry) => Some(entry.is_expired(now)),
            };

            match expired {
                None => {
                    state.misses += 1;
                    None
                }
                Some(true) => {
                    state.entries.pop(key);
                    state.misses += 1;
                    state.evictions += 1;
                    removed = Some(key.to_string());
                    None
                }
                Some(false) => {
                    let entry = match self.policy {
                        EvictionPolicy::Lru => state.entries.get_mut(key),
                        EvictionPolicy::Fifo => state.entries.peek_mut(key),
                    };
                    let value = entry.map(|e| {
                        e.access_count += 1;
                        e.last_accessed = now;
                        e.value.clone()
                    });
                    state.hits += 1;
                    value
                }
            }
        };

        match (&result, removed) {
            (_, Some(k)) => {
                trace!(key = %k, "Cache entry expired");
                self.notify(vec![(k, EvictionReason::Expired)]);
            }
            (Some(_), None) => trace!(key, "Cache hit"),
            (None, None) => trace!(key, "Cache miss"),
        }

        result
    }

    /// Snapshot of the entry for `key` without touching stats or recency.
    pub fn entry(&self, key: &str) -> Option<CacheEntry<V>> {
        self.state.lock().entries.peek(key).cloned()
    }

    /// Insert with the default TTL.
    pub fn set(&self, key: impl Into<String>, value: V) -> Result<(), MediaError> {
        self.set_with_ttl(key, value, self.default_ttl)
    }

    /// Insert or replace `key`. Replacing keeps the original access count.
    pub fn set_with_ttl(
        &self,
        key: impl Into<String>,
        value: V,
        ttl: Duration,
    ) -> Result<(), MediaError> {
        let key = key.into();
        if ttl.is_zero() {
            return Err(MediaError::cache(format!("TTL for {key:?} must be positive")));
        }
        let ttl = chrono::Duration::from_std(ttl)
            .map_err(|e| MediaError::cache(format!("TTL for {key:?} out of range: {e}")))?;

        let now = self.clock.now();
        let mut removed = Vec::new();
        {
            let mut state = self.state.lock();
            let access_count = state
                .entries
                .peek(&key)
                .map(|e| e.access_count)
                .unwrap_or(0);
            let entry = CacheEntry {
                value,
                cached_at: now,
                expires_at: now + ttl,
                access_count,
                last_accessed: now,
            };

            let in_place = self.policy == EvictionPolicy::Fifo && state.entries.contains(&key);
            if in_place {
                if let Some(existing) = state.entries.peek_mut(&key) {
                    *existing = entry;
                }
            } else {
                state.entries.put(key.clone(), entry);
            }

            if state.entries.len() > self.max_size {
                if let Some((evicted, _)) = state.entries.pop_lru() {
                    state.evictions += 1;
                    removed.push((evicted, EvictionReason::Capacity));
                }
            }
        }

        for (evicted, _) in &removed {
            debug!(key = %evicted, inserted = %key, "Evicted cache entry at capacity");
        }
        self.notify(removed);
        Ok(())
    }

    /// Remove `key`. Returns whether it was present.
    pub fn evict(&self, key: &str) -> bool {
        let present = {
            let mut state = self.state.lock();
            let present = state.entries.pop(key).is_some();
            if present {
                state.evictions += 1;
            }
            present
        };
        if present {
            self.notify(vec![(key.to_string(), EvictionReason::Manual)]);
        }
        present
    }

    /// Remove every entry. Returns how many were removed.
    pub fn clear(&self) -> usize {
        let removed: Vec<(String, EvictionReason)> = {
            let mut state = self.state.lock();
            let mut removed = Vec::with_capacity(state.entries.len());
            while let Some((key, _)) = state.entries.pop_lru() {
                removed.push((key, EvictionReason::Cleared));
            }
            state.evictions += removed.len() as u64;
            removed
        };
        let count = removed.len();
        debug!(count, "Cleared cache");
        self.notify(removed);
        count
    }

    /// Sweep out every stale entry. Returns how many were removed.
    pub fn cleanup_expired(&self) -> usize {
        let now = self.clock.now();
        let removed: Vec<(String, EvictionReason)> = {
            let mut state = self.state.lock();
            let stale: Vec<String> = state
                .entries
                .iter()
                .filter(|(_, e)| e.is_expired(now))
                .map(|(k, _)| k.clone())
                .collect();
            for key in &stale {
                state.entries.pop(key);
            }
            state.evictions += stale.len() as u64;
            stale
                .into_iter()
                .map(|k| (k, EvictionReason::Expired))
                .collect()
        };
        let count = removed.len();
        if count > 0 {
            debug!(count, "Removed expired cache entries");
        }
        self.notify(removed);
        count
    }

    /// Live presence check; does not count as a lookup.
    pub fn contains(&self, key: &str) -> bool {
        let now = self.clock.now();
        self.state
            .lock()
            .entries
            .peek(key)
            .is_some_and(|e| !e.is_expired(now))
    }

    /// Keys in eviction order, last to go first.
    pub fn keys(&self) -> Vec<String> {
        self.state
            .lock()
            .entries
            .iter()
            .map(|(k, _)| k.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        self.stats_with_top(DEFAULT_TOP_ENTRIES)
    }

    pub fn stats_with_top(&self, top_n: usize) -> CacheStats {
        let now = self.clock.now();
        let state = self.state.lock();

        let live: Vec<(&String, &CacheEntry<V>)> = state
            .entries
            .iter()
            .filter(|(_, e)| !e.is_expired(now))
            .collect();

        let mut top: Vec<EntryUsage> = live
            .iter()
            .map(|(k, e)| EntryUsage {
                key: (*k).clone(),
                access_count: e.access_count,
            })
            .collect();
        top.sort_by(|a, b| b.access_count.cmp(&a.access_count).then(a.key.cmp(&b.key)));
        top.truncate(top_n);

        let (hit_rate, miss_rate) = CacheStats::rates(state.hits, state.misses);
        let size = state.entries.len();

        CacheStats {
            size,
            max_size: self.max_size,
            hits: state.hits,
            misses: state.misses,
            hit_rate,
            miss_rate,
            evictions: state.evictions,
            oldest_entry: live.iter().map(|(_, e)| e.cached_at).min(),
            newest_entry: live.iter().map(|(_, e)| e.cached_at).max(),
            top_entries: top,
            utilization_pct: size as f64 / self.max_size as f64 * 100.0,
        }
    }

    fn notify(&self, removed: Vec<(String, EvictionReason)>) {
        if removed.is_empty() {
            return;
        }
        let observers = self.observers.read().clone();
        for (key, reason) in &removed {
            for observer in &observers {
                observer.on_evict(key, *reason);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use assert_matches::assert_matches;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<(String, EvictionReason)>>,
    }

    impl EvictionObserver for Recorder {
        fn on_evict(&self, key: &str, reason: EvictionReason) {
            self.seen.lock().push((key.to_string(), reason));
        }
    }

    fn cache(max: usize, policy: EvictionPolicy) -> (BoundedCache<u32>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::default());
        let cache = BoundedCache::new(max, Duration::from_secs(60), policy, clock.clone());
        (cache, clock)
    }

    fn sorted(mut keys: Vec<String>) -> Vec<String> {
        keys.sort();
        keys
    }

    #[test]
    fn evicts_least_recently_accessed() {
        let (cache, _) = cache(3, EvictionPolicy::Lru);
        cache.set("A", 1).unwrap();
        cache.set("B", 2).unwrap();
        cache.set("C", 3).unwrap();
        assert_eq!(cache.get("A"), Some(1));
        cache.set("D", 4).unwrap();

        assert_eq!(sorted(cache.keys()), vec!["A", "C", "D"]);
        assert!(!cache.contains("B"));
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn fifo_ignores_access_order() {
        let (cache, _) = cache(3, EvictionPolicy::Fifo);
        cache.set("A", 1).unwrap();
        cache.set("B", 2).unwrap();
        cache.set("C", 3).unwrap();
        assert_eq!(cache.get("A"), Some(1));
        cache.set("D", 4).unwrap();

        assert_eq!(sorted(cache.keys()), vec!["B", "C", "D"]);
    }

    #[test]
    fn size_never_exceeds_max() {
        let (cache, _) = cache(4, EvictionPolicy::Lru);
        for i in 0..50u32 {
            cache.set(format!("k{}", i % 9), i).unwrap();
            if i % 3 == 0 {
                cache.get(&format!("k{}", (i + 1) % 9));
            }
            assert!(cache.len() <= 4);
        }
        assert_eq!(cache.len(), 4);
    }

    #[test]
    fn replace_keeps_size_and_reorders() {
        let (cache, _) = cache(2, EvictionPolicy::Lru);
        cache.set("A", 1).unwrap();
        cache.set("B", 2).unwrap();
        cache.set("A", 10).unwrap();
        assert_eq!(cache.len(), 2);
        cache.set("C", 3).unwrap();

        assert_eq!(sorted(cache.keys()), vec!["A", "C"]);
        assert_eq!(cache.get("A"), Some(10));
    }

    #[test]
    fn expired_entries_are_never_returned() {
        let (cache, clock) = cache(3, EvictionPolicy::Lru);
        let recorder = Arc::new(Recorder::default());
        cache.subscribe(recorder.clone());

        cache.set("A", 1).unwrap();
        clock.advance(chrono::Duration::seconds(60));
        assert_eq!(cache.get("A"), Some(1));

        clock.advance(chrono::Duration::seconds(1));
        assert!(!cache.contains("A"));
        assert_eq!(cache.get("A"), None);
        assert!(cache.is_empty());

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.evictions, 1);
        assert_eq!(
            *recorder.seen.lock(),
            vec![("A".to_string(), EvictionReason::Expired)]
        );
    }

    #[test]
    fn access_bookkeeping() {
        let (cache, clock) = cache(3, EvictionPolicy::Lru);
        cache.set("A", 1).unwrap();
        let inserted = cache.entry("A").unwrap();
        assert_eq!(inserted.access_count, 0);
        assert!(inserted.expires_at > inserted.cached_at);

        clock.advance(chrono::Duration::seconds(5));
        cache.get("A");
        cache.get("A");
        let entry = cache.entry("A").unwrap();
        assert_eq!(entry.access_count, 2);
        assert_eq!(entry.last_accessed, clock.now());
        assert_eq!(entry.cached_at, inserted.cached_at);
    }

    #[test]
    fn zero_ttl_is_rejected() {
        let (cache, _) = cache(3, EvictionPolicy::Lru);
        assert_matches!(
            cache.set_with_ttl("A", 1, Duration::ZERO),
            Err(MediaError::Cache(_))
        );
        assert!(cache.is_empty());
    }

    #[test]
    fn observers_see_every_removal() {
        let (cache, _) = cache(2, EvictionPolicy::Lru);
        let first = Arc::new(Recorder::default());
        let second = Arc::new(Recorder::default());
        cache.subscribe(first.clone());
        cache.subscribe(second.clone());

        cache.set("A", 1).unwrap();
        cache.set("B", 2).unwrap();
        cache.set("C", 3).unwrap();
        assert!(cache.evict("B"));
        assert!(!cache.evict("B"));
        assert_eq!(cache.clear(), 1);

        let expected = vec![
            ("A".to_string(), EvictionReason::Capacity),
            ("B".to_string(), EvictionReason::Manual),
            ("C".to_string(), EvictionReason::Cleared),
        ];
        assert_eq!(*first.seen.lock(), expected);
        assert_eq!(*second.seen.lock(), expected);
        assert_eq!(cache.stats().evictions, 3);
    }

    #[test]
    fn cleanup_removes_only_stale() {
        let (cache, clock) = cache(5, EvictionPolicy::Lru);
        cache.set("short", 1).unwrap();
        cache
            .set_with_ttl("long", 2, Duration::from_secs(600))
            .unwrap();
        clock.advance(chrono::Duration::seconds(120));

        assert_eq!(cache.cleanup_expired(), 1);
        assert_eq!(cache.keys(), vec!["long".to_string()]);
        assert_eq!(cache.cleanup_expired(), 0);
    }

    #[test]
    fn stats_are_consistent() {
        let (cache, clock) = cache(4, EvictionPolicy::Lru);
        let t0 = clock.now();
        cache.set("A", 1).unwrap();
        clock.advance(chrono::Duration::seconds(10));
        cache.set("B", 2).unwrap();

        cache.get("A");
        cache.get("A");
        cache.get("B");
        cache.get("missing");

        let stats = cache.stats_with_top(1);
        assert_eq!(stats.lookups(), 4);
        assert_eq!(stats.hits, 3);
        assert_eq!(stats.misses, 1);
        assert!((stats.hit_rate - 0.75).abs() < 1e-9);
        assert!((stats.hit_rate + stats.miss_rate - 1.0).abs() < 1e-9);
        assert_eq!(stats.size, 2);
        assert!((stats.utilization_pct - 50.0).abs() < 1e-9);
        assert_eq!(stats.oldest_entry, Some(t0));
        assert_eq!(stats.newest_entry, Some(t0 + chrono::Duration::seconds(10)));
        assert_eq!(
            stats.top_entries,
            vec![EntryUsage {
                key: "A".into(),
                access_count: 2
            }]
        );
    }

    #[test]
    fn concurrent_access_respects_bound() {
        let (cache, _) = cache(8, EvictionPolicy::Lru);
        std::thread::scope(|s| {
            for t in 0..4u32 {
                let cache = &cache;
                s.spawn(move || {
                    for i in 0..200u32 {
                        cache.set(format!("{t}-{}", i % 20), i).unwrap();
                        cache.get(&format!("{}-{}", (t + 1) % 4, i % 20));
                    }
                });
            }
        });

        let stats = cache.stats();
        assert_eq!(stats.size, 8);
        assert_eq!(stats.lookups(), 800);
    }
}

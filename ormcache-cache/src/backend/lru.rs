//! In-process, single-node LRU cache with per-entry TTL.

use crate::traits::Cache;
use async_trait::async_trait;
use indexmap::IndexMap;
use ormcache_core::ShapeId;
use std::sync::{Arc, Mutex, Weak};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::debug;

/// Tuning knobs for [`LruTtlCache`].
#[derive(Debug, Clone)]
pub struct LruConfig {
    /// Maximum number of entries held before the least-recently-used one is evicted.
    pub max_items: usize,
    /// TTL applied to an entry when `set` is called without an explicit one.
    pub default_ttl: Option<Duration>,
    /// How often the background sweep scans for expired entries.
    pub sweep_interval: Duration,
}

impl Default for LruConfig {
    fn default() -> Self {
        Self {
            max_items: 10_000,
            default_ttl: None,
            sweep_interval: Duration::from_secs(30),
        }
    }
}

impl LruConfig {
    pub fn with_max_items(mut self, max_items: usize) -> Self {
        self.max_items = max_items;
        self
    }

    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = Some(ttl);
        self
    }

    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }
}

struct Entry<V> {
    value: V,
    expires_at: Option<Instant>,
}

impl<V> Entry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

struct State<V> {
    entries: IndexMap<ShapeId, Entry<V>>,
}

/// A bounded in-process cache ordering entries by recency of access.
///
/// Access (`get`) re-inserts the touched entry at the most-recently-used
/// end; insertion beyond `max_items` evicts from the least-recently-used
/// end. A background task sweeps expired entries on `sweep_interval`; it
/// holds only a [`Weak`] reference to the cache so it never keeps the
/// process alive after the cache is dropped.
pub struct LruTtlCache<V> {
    state: Mutex<State<V>>,
    config: LruConfig,
    sweep: Mutex<Option<JoinHandle<()>>>,
}

impl<V> LruTtlCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub fn new(config: LruConfig) -> Arc<Self> {
        let cache = Arc::new(Self {
            state: Mutex::new(State {
                entries: IndexMap::new(),
            }),
            config,
            sweep: Mutex::new(None),
        });
        let handle = spawn_sweep(Arc::downgrade(&cache));
        *cache.sweep.lock().unwrap() = Some(handle);
        cache
    }

    pub fn with_defaults() -> Arc<Self> {
        Self::new(LruConfig::default())
    }

    fn sweep_once(&self) {
        let now = Instant::now();
        let mut state = self.state.lock().unwrap();
        let before = state.entries.len();
        state.entries.retain(|_, entry| !entry.is_expired(now));
        let removed = before - state.entries.len();
        if removed > 0 {
            debug!(removed, "swept expired cache entries");
        }
    }
}

fn spawn_sweep<V>(cache: Weak<LruTtlCache<V>>) -> JoinHandle<()>
where
    V: Send + Sync + 'static,
{
    tokio::spawn(async move {
        loop {
            let interval = match cache.upgrade() {
                Some(cache) => cache.config.sweep_interval,
                None => return,
            };
            tokio::time::sleep(interval).await;
            match cache.upgrade() {
                Some(cache) => cache.sweep_once(),
                None => return,
            }
        }
    })
}

#[async_trait]
impl<V> Cache<V> for LruTtlCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    async fn get(&self, key: &ShapeId) -> Option<V> {
        let mut state = self.state.lock().unwrap();
        let now = Instant::now();
        let (_, entry) = state.entries.shift_remove_entry(key)?;
        if entry.is_expired(now) {
            return None;
        }
        let value = entry.value.clone();
        state.entries.insert(key.clone(), entry);
        Some(value)
    }

    async fn set(&self, key: ShapeId, value: V, ttl: Option<Duration>) {
        let ttl = ttl.or(self.config.default_ttl);
        let expires_at = ttl.map(|ttl| Instant::now() + ttl);
        let mut state = self.state.lock().unwrap();
        state.entries.shift_remove(&key);
        state.entries.insert(key, Entry { value, expires_at });
        while state.entries.len() > self.config.max_items {
            state.entries.shift_remove_index(0);
        }
    }

    async fn delete(&self, key: &ShapeId) {
        let mut state = self.state.lock().unwrap();
        state.entries.shift_remove(key);
    }

    async fn clear(&self) {
        self.state.lock().unwrap().entries.clear();
    }

    async fn size(&self) -> Option<usize> {
        Some(self.state.lock().unwrap().entries.len())
    }

    async fn destroy(&self) {
        if let Some(handle) = self.sweep.lock().unwrap().take() {
            handle.abort();
        }
        self.state.lock().unwrap().entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn get_promotes_entry_to_most_recently_used() {
        let cache = LruTtlCache::<&'static str>::new(LruConfig::default().with_max_items(2));
        cache.set(ShapeId::new("a"), "a", None).await;
        cache.set(ShapeId::new("b"), "b", None).await;
        assert_eq!(cache.get(&ShapeId::new("a")).await, Some("a"));
        cache.set(ShapeId::new("c"), "c", None).await;
        // "b" was least-recently-used after "a" was touched, so it's evicted.
        assert_eq!(cache.get(&ShapeId::new("b")).await, None);
        assert_eq!(cache.get(&ShapeId::new("a")).await, Some("a"));
        assert_eq!(cache.get(&ShapeId::new("c")).await, Some("c"));
    }

    #[tokio::test]
    async fn entries_expire_after_their_ttl() {
        let cache = LruTtlCache::<&'static str>::with_defaults();
        cache
            .set(ShapeId::new("k"), "v", Some(Duration::from_millis(1)))
            .await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(cache.get(&ShapeId::new("k")).await, None);
    }

    #[tokio::test]
    async fn destroy_stops_the_sweep_and_clears_entries() {
        let cache = LruTtlCache::<&'static str>::with_defaults();
        cache.set(ShapeId::new("k"), "v", None).await;
        cache.destroy().await;
        assert_eq!(cache.size().await, Some(0));
    }

    #[tokio::test]
    async fn clear_empties_the_cache() {
        let cache = LruTtlCache::<&'static str>::with_defaults();
        cache.set(ShapeId::new("k"), "v", None).await;
        cache.clear().await;
        assert_eq!(cache.size().await, Some(0));
    }
}

#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// P7: an LRU with `max_items = k` never holds more than `k` entries,
        /// no matter how many distinct keys are inserted.
        #[test]
        fn size_never_exceeds_max_items(max_items in 1usize..16, keys in 0usize..64) {
            let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
            rt.block_on(async {
                let cache = LruTtlCache::<u32>::new(LruConfig::default().with_max_items(max_items));
                for i in 0..keys {
                    cache.set(ShapeId::new(format!("k{i}")), i as u32, None).await;
                    let size = cache.size().await.unwrap();
                    prop_assert!(size <= max_items, "size {size} exceeded max_items {max_items}");
                }
                Ok(())
            })?;
        }
    }
}

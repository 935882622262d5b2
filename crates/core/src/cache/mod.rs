//! In-memory memoizing cache with a fixed time-to-live.
//!
//! Values are produced on demand by a [`Loader`] and kept for `ttl` seconds
//! from the moment they were inserted. Expiry is passive: every [`ExpiringCache::get`]
//! first sweeps the whole map and drops entries older than the TTL, so memory is
//! bounded by recency rather than by entry count.
//!
//! Loads are de-duplicated per key: at most one loader call for a given key runs
//! at a time, and callers asking for the same key wait for it and then reuse the
//! stored value. Unrelated keys load concurrently. Loader failures are returned to
//! the caller and never stored. A caller that is cancelled mid-load still gives its
//! in-flight slot back.

pub mod clock;

use std::collections::HashMap;
use std::fmt::Display;
use std::hash::Hash;
use std::sync::{Arc, Mutex as SyncMutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

pub use clock::{Clock, ManualClock, SystemClock};

/// Computes the value for a key on a cache miss.
#[async_trait]
pub trait Loader<K, V>: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    async fn load(&self, key: &K) -> Result<V, Self::Error>;
}

/// A loader invocation failed. Nothing was cached for `key`.
#[derive(Debug, thiserror::Error)]
#[error("cache load failed for {key}: {source}")]
pub struct CacheLoadError<E: std::error::Error + 'static> {
    pub key: String,
    #[source]
    pub source: E,
}

struct CacheEntry<V> {
    value: V,
    inserted_at: i64,
}

/// Key-to-value cache with a pluggable loader and fixed TTL.
pub struct ExpiringCache<K, V, L> {
    loader: L,
    ttl_secs: i64,
    clock: Arc<dyn Clock>,
    entries: Mutex<HashMap<K, CacheEntry<V>>>,
    in_flight: InFlight<K>,
}

/// Per-key load locks. Only touched synchronously, never across an await.
type InFlight<K> = SyncMutex<HashMap<K, Arc<Mutex<()>>>>;

/// A caller's claim on a key's load lock, handed back on drop.
///
/// Dropping happens on every exit from [`ExpiringCache::get`], including
/// cancellation, so abandoned keys do not pile up in the in-flight map.
struct SlotGuard<'a, K: Eq + Hash> {
    in_flight: &'a InFlight<K>,
    key: K,
    slot: Arc<Mutex<()>>,
}

impl<K: Eq + Hash> Drop for SlotGuard<'_, K> {
    fn drop(&mut self) {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        // Slots are only cloned under this lock: the map's reference plus ours means nobody else wants it.
        if in_flight.get(&self.key).is_some_and(|slot| Arc::strong_count(slot) == 2) {
            in_flight.remove(&self.key);
        }
    }
}

impl<K, V, L> ExpiringCache<K, V, L>
where
    K: Eq + Hash + Clone + Display + Send + Sync,
    V: Clone + Send + Sync,
    L: Loader<K, V>,
{
    /// Create a cache that reads time from the system clock.
    pub fn new(loader: L, ttl: Duration) -> Self {
        Self::with_clock(loader, ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(loader: L, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            loader,
            ttl_secs: i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX),
            clock,
            entries: Mutex::new(HashMap::new()),
            in_flight: SyncMutex::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs.unsigned_abs())
    }

    /// Return the live value for `key`, loading and storing it on a miss.
    ///
    /// # Errors
    ///
    /// Returns `CacheLoadError` when the loader fails. The failure is not
    /// cached, so the next call for the same key invokes the loader again.
    pub async fn get(&self, key: &K) -> Result<V, CacheLoadError<L::Error>> {
        {
            let mut entries = self.entries.lock().await;
            self.sweep(&mut entries);
            if let Some(entry) = entries.get(key) {
                tracing::debug!(key = %key, "cache hit");
                return Ok(entry.value.clone());
            }
        }

        let claim = self.slot(key);
        let _guard = claim.slot.lock().await;
        // Another caller may have stored the key while we waited on the slot.
        let stored = self.entries.lock().await.get(key).map(|entry| entry.value.clone());
        match stored {
            Some(value) => {
                tracing::debug!(key = %key, "cache hit after in-flight load");
                Ok(value)
            }
            None => self.load(key).await,
        }
    }

    /// Number of stored entries, including ones that expired since the last sweep.
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    fn sweep(&self, entries: &mut HashMap<K, CacheEntry<V>>) {
        let oldest_live = self.clock.now_secs().saturating_sub(self.ttl_secs);
        let before = entries.len();
        entries.retain(|_, entry| entry.inserted_at >= oldest_live);
        let removed = before - entries.len();
        if removed > 0 {
            tracing::debug!(removed, remaining = entries.len(), "swept expired cache entries");
        }
    }

    async fn load(&self, key: &K) -> Result<V, CacheLoadError<L::Error>> {
        tracing::debug!(key = %key, "cache miss");
        let value = self
            .loader
            .load(key)
            .await
            .map_err(|source| CacheLoadError { key: key.to_string(), source })?;

        let inserted_at = self.clock.now_secs();
        self.entries
            .lock()
            .await
            .insert(key.clone(), CacheEntry { value: value.clone(), inserted_at });

        Ok(value)
    }

    fn slot(&self, key: &K) -> SlotGuard<'_, K> {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        let slot = in_flight.entry(key.clone()).or_default().clone();
        SlotGuard { in_flight: &self.in_flight, key: key.clone(), slot }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Barrier;

    #[derive(Debug, thiserror::Error)]
    #[error("upstream unavailable")]
    struct Unavailable;

    #[derive(Default)]
    struct CountingLoader {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Loader<String, usize> for CountingLoader {
        type Error = Unavailable;

        async fn load(&self, key: &String) -> Result<usize, Unavailable> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(key.len())
        }
    }

    /// Fails the first `failures` calls, then succeeds.
    struct FlakyLoader {
        failures: usize,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Loader<String, usize> for FlakyLoader {
        type Error = Unavailable;

        async fn load(&self, key: &String) -> Result<usize, Unavailable> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures { Err(Unavailable) } else { Ok(key.len()) }
        }
    }

    struct SlowLoader {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Loader<String, usize> for SlowLoader {
        type Error = Unavailable;

        async fn load(&self, key: &String) -> Result<usize, Unavailable> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok(key.len())
        }
    }

    /// Never finishes; stands in for an upstream that stops answering.
    struct HangingLoader;

    #[async_trait]
    impl Loader<String, usize> for HangingLoader {
        type Error = Unavailable;

        async fn load(&self, _key: &String) -> Result<usize, Unavailable> {
            std::future::pending().await
        }
    }

    /// Blocks until `parties` loads are running at the same time.
    struct RendezvousLoader {
        barrier: Barrier,
    }

    #[async_trait]
    impl Loader<String, usize> for RendezvousLoader {
        type Error = Unavailable;

        async fn load(&self, key: &String) -> Result<usize, Unavailable> {
            self.barrier.wait().await;
            Ok(key.len())
        }
    }

    fn counting_cache(ttl_secs: u64) -> (ExpiringCache<String, usize, CountingLoader>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(1_000));
        let cache =
            ExpiringCache::with_clock(CountingLoader::default(), Duration::from_secs(ttl_secs), clock.clone());
        (cache, clock)
    }

    #[tokio::test]
    async fn test_hit_within_ttl_loads_once() {
        let (cache, clock) = counting_cache(10);
        let key = "abc".to_string();

        assert_eq!(cache.get(&key).await.unwrap(), 3);
        clock.advance(9);
        assert_eq!(cache.get(&key).await.unwrap(), 3);

        assert_eq!(cache.loader.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_reload_after_ttl() {
        let (cache, clock) = counting_cache(10);
        let key = "abc".to_string();

        cache.get(&key).await.unwrap();
        clock.advance(11);
        cache.get(&key).await.unwrap();

        assert_eq!(cache.loader.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_entry_alive_at_exact_ttl() {
        let (cache, clock) = counting_cache(10);
        let key = "abc".to_string();

        cache.get(&key).await.unwrap();
        clock.advance(10);
        cache.get(&key).await.unwrap();

        assert_eq!(cache.loader.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_keys_expire_independently() {
        let (cache, clock) = counting_cache(10);
        let old = "old".to_string();
        let young = "young".to_string();

        cache.get(&old).await.unwrap();
        clock.advance(6);
        cache.get(&young).await.unwrap();
        clock.advance(6);

        // `old` is 12s old and gets reloaded; `young` is 6s old and still served.
        cache.get(&young).await.unwrap();
        assert_eq!(cache.loader.calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.len().await, 1);

        cache.get(&old).await.unwrap();
        assert_eq!(cache.loader.calls.load(Ordering::SeqCst), 3);
        assert_eq!(cache.len().await, 2);
    }

    #[tokio::test]
    async fn test_sweep_clears_whole_cache() {
        let (cache, clock) = counting_cache(10);
        for key in ["a", "bb", "ccc"] {
            cache.get(&key.to_string()).await.unwrap();
        }
        assert_eq!(cache.len().await, 3);

        clock.advance(30);
        cache.get(&"dddd".to_string()).await.unwrap();
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn test_failure_is_not_cached() {
        let loader = FlakyLoader { failures: 1, calls: AtomicUsize::new(0) };
        let cache = ExpiringCache::new(loader, Duration::from_secs(10));
        let key = "abc".to_string();

        let err = cache.get(&key).await.unwrap_err();
        assert_eq!(err.key, "abc");
        assert!(err.to_string().contains("upstream unavailable"));
        assert!(cache.is_empty().await);

        assert_eq!(cache.get(&key).await.unwrap(), 3);
        assert_eq!(cache.loader.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_concurrent_gets_share_one_load() {
        let cache = Arc::new(ExpiringCache::new(SlowLoader { calls: AtomicUsize::new(0) }, Duration::from_secs(60)));
        let key = "same".to_string();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = cache.clone();
                let key = key.clone();
                tokio::spawn(async move { cache.get(&key).await.unwrap() })
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.await.unwrap(), 4);
        }

        assert_eq!(cache.loader.calls.load(Ordering::SeqCst), 1);
        assert!(cache.in_flight.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_get_releases_slot() {
        let cache = Arc::new(ExpiringCache::new(HangingLoader, Duration::from_secs(60)));

        for i in 0..20 {
            let key = format!("key-{i}");
            let result = tokio::time::timeout(Duration::from_millis(1), cache.get(&key)).await;
            assert!(result.is_err(), "load should still be pending");
        }
        assert!(cache.in_flight.lock().unwrap().is_empty());

        // A waiter cancelled behind a running load leaves the loader's slot in place.
        let key = "shared".to_string();
        let running = tokio::spawn({
            let cache = cache.clone();
            let key = key.clone();
            async move { cache.get(&key).await }
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(tokio::time::timeout(Duration::from_millis(1), cache.get(&key)).await.is_err());
        assert_eq!(cache.in_flight.lock().unwrap().len(), 1);

        running.abort();
        assert!(running.await.unwrap_err().is_cancelled());
        assert!(cache.in_flight.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_distinct_keys_load_concurrently() {
        let cache = ExpiringCache::new(RendezvousLoader { barrier: Barrier::new(2) }, Duration::from_secs(60));
        let a = "a".to_string();
        let b = "bb".to_string();

        // Each load waits for the other; a cache that serialized unrelated keys would time out here.
        let both = async { tokio::join!(cache.get(&a), cache.get(&b)) };
        let (ra, rb) = tokio::time::timeout(Duration::from_secs(5), both).await.unwrap();
        assert_eq!(ra.unwrap(), 1);
        assert_eq!(rb.unwrap(), 2);
    }

    #[test]
    fn test_ttl_accessor() {
        let cache = ExpiringCache::new(CountingLoader::default(), Duration::from_secs(43_200));
        assert_eq!(cache.ttl(), Duration::from_secs(43_200));
    }
}

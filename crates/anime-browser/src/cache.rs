//! Two-tier TTL cache for API responses.
//!
//! Entries live in an in-memory map backed by a persistent [`KeyValueStore`].
//! Persistent keys carry the `cache_` prefix so a bulk clear never touches
//! unrelated data. Persistent-tier failures are logged and the cache carries
//! on memory-only.

use chrono::Utc;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use shared::KeyValueStore;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, warn};

/// Namespace prefix for persisted entries
pub const PERSISTENT_PREFIX: &str = "cache_";

/// Source of "now" in unix milliseconds
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> i64;
}

/// Wall clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

/// `duration` in whole milliseconds, saturating at `i64::MAX`
fn duration_millis(duration: Duration) -> i64 {
    i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}

/// Clock that only moves when told to
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    pub fn new(start_millis: i64) -> Self {
        Self {
            now: AtomicI64::new(start_millis),
        }
    }

    pub fn advance(&self, by: Duration) {
        let by = duration_millis(by);
        let _ = self
            .now
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |now| Some(now.saturating_add(by)));
    }

    pub fn set(&self, millis: i64) {
        self.now.store(millis, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// A cached value and the instant (unix ms) it stops being visible
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub value: Value,
    pub expiry: i64,
}

impl CacheEntry {
    pub fn is_live(&self, now_millis: i64) -> bool {
        now_millis < self.expiry
    }
}

/// Cache statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub memory_entries: usize,
    pub persisted_entries: usize,
}

fn persistent_key(key: &str) -> String {
    format!("{}{}", PERSISTENT_PREFIX, key)
}

/// Memory + persistent TTL cache
pub struct TtlCache {
    memory: Mutex<HashMap<String, CacheEntry>>,
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    default_ttl: Duration,
}

impl TtlCache {
    pub fn new(store: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>, default_ttl: Duration) -> Self {
        Self {
            memory: Mutex::new(HashMap::new()),
            store,
            clock,
            default_ttl,
        }
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    fn memory(&self) -> MutexGuard<'_, HashMap<String, CacheEntry>> {
        self.memory.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Look up a live entry, promoting persisted hits into memory
    pub fn get(&self, key: &str) -> Option<Value> {
        let now = self.clock.now_millis();

        {
            let mut memory = self.memory();
            match memory.get(key) {
                Some(entry) if entry.is_live(now) => {
                    debug!(key = key, tier = "memory", "Cache hit");
                    return Some(entry.value.clone());
                }
                Some(_) => {
                    memory.remove(key);
                }
                None => {}
            }
        }

        let stored_key = persistent_key(key);
        let raw = match self.store.get(&stored_key) {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                debug!(key = key, "Cache miss");
                return None;
            }
            Err(e) => {
                warn!(key = key, store = self.store.name(), error = %e, "Error reading persisted cache entry");
                return None;
            }
        };

        match serde_json::from_str::<CacheEntry>(&raw) {
            Ok(entry) if entry.is_live(now) => {
                debug!(key = key, tier = self.store.name(), "Cache hit");
                let value = entry.value.clone();
                self.memory().insert(key.to_string(), entry);
                Some(value)
            }
            Ok(_) => {
                debug!(key = key, "Persisted cache entry expired");
                self.remove_persisted(&stored_key);
                None
            }
            Err(e) => {
                warn!(key = key, error = %e, "Discarding unreadable cache entry");
                self.remove_persisted(&stored_key);
                None
            }
        }
    }

    /// Typed lookup; a value that no longer decodes counts as a miss
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.get(key)?;
        match serde_json::from_value(value) {
            Ok(typed) => Some(typed),
            Err(e) => {
                debug!(key = key, error = %e, "Cached value has unexpected shape");
                None
            }
        }
    }

    /// Store with the default expiration
    pub fn set(&self, key: &str, value: Value) {
        self.set_with_ttl(key, value, self.default_ttl);
    }

    /// Store in both tiers; a persistent-tier failure leaves the value memory-only
    pub fn set_with_ttl(&self, key: &str, value: Value, ttl: Duration) {
        let entry = CacheEntry {
            value,
            expiry: self.clock.now_millis().saturating_add(duration_millis(ttl)),
        };

        let serialized = serde_json::to_string(&entry);
        self.memory().insert(key.to_string(), entry);

        let result = match serialized {
            Ok(raw) => self
                .store
                .set(&persistent_key(key), &raw)
                .map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        };

        match result {
            Ok(()) => debug!(key = key, ttl_ms = duration_millis(ttl), "Cache stored"),
            Err(e) => warn!(
                key = key,
                store = self.store.name(),
                error = %e,
                "Could not persist cache entry, keeping it in memory only"
            ),
        }
    }

    pub fn remove(&self, key: &str) {
        self.memory().remove(key);
        self.remove_persisted(&persistent_key(key));
    }

    /// Drop every cache entry, leaving unprefixed persisted keys alone
    pub fn clear(&self) {
        self.memory().clear();

        match self.store.keys() {
            Ok(keys) => {
                for key in keys.iter().filter(|k| k.starts_with(PERSISTENT_PREFIX)) {
                    self.remove_persisted(key);
                }
            }
            Err(e) => warn!(store = self.store.name(), error = %e, "Error clearing persisted cache"),
        }

        debug!("Cache cleared");
    }

    pub fn stats(&self) -> CacheStats {
        let persisted_entries = match self.store.keys() {
            Ok(keys) => keys.iter().filter(|k| k.starts_with(PERSISTENT_PREFIX)).count(),
            Err(e) => {
                warn!(store = self.store.name(), error = %e, "Error listing persisted cache");
                0
            }
        };

        CacheStats {
            memory_entries: self.memory().len(),
            persisted_entries,
        }
    }

    fn remove_persisted(&self, stored_key: &str) {
        if let Err(e) = self.store.remove(stored_key) {
            warn!(key = stored_key, store = self.store.name(), error = %e, "Error removing persisted cache entry");
        }
    }

    /// Return the cached value for `key`, or run `fetch` and cache its success.
    ///
    /// Failures are returned untouched and never cached.
    pub async fn get_or_fetch<T, E, F, Fut>(&self, key: &str, ttl: Duration, fetch: F) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(hit) = self.get_as::<T>(key) {
            return Ok(hit);
        }

        let value = fetch().await?;

        match serde_json::to_value(&value) {
            Ok(json) => self.set_with_ttl(key, json, ttl),
            Err(e) => warn!(key = key, error = %e, "Result is not cacheable"),
        }

        Ok(value)
    }
}

/// Index of the `window`-sized time slot containing now.
///
/// Appending it to a key gives "fresh-ish" results for calls that would
/// otherwise return something different every time.
pub fn time_bucket(clock: &dyn Clock, window: Duration) -> i64 {
    let window_ms = duration_millis(window).max(1);
    clock.now_millis().div_euclid(window_ms)
}

/// An async function whose results are memoized in a [`TtlCache`]
pub struct Cached<F, K> {
    cache: Arc<TtlCache>,
    fetch: F,
    key_fn: K,
    ttl: Duration,
}

/// Wrap `fetch` so each call is cached under `key_fn(&args)` for `ttl`
pub fn with_cache<F, K>(cache: Arc<TtlCache>, fetch: F, key_fn: K, ttl: Duration) -> Cached<F, K> {
    Cached {
        cache,
        fetch,
        key_fn,
        ttl,
    }
}

impl<F, K> Cached<F, K> {
    pub async fn call<A, T, E, Fut>(&self, args: A) -> Result<T, E>
    where
        K: Fn(&A) -> String,
        F: Fn(A) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        T: Serialize + DeserializeOwned,
    {
        let key = (self.key_fn)(&args);
        self.cache
            .get_or_fetch(&key, self.ttl, || (self.fetch)(args))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use shared::{MemoryStore, StoreError};
    use std::sync::atomic::AtomicUsize;

    const HOUR: Duration = Duration::from_secs(3600);

    struct FailingStore;

    impl KeyValueStore for FailingStore {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn get(&self, _key: &str) -> Result<Option<String>, StoreError> {
            Err(StoreError::Unavailable("disk gone".into()))
        }

        fn set(&self, _key: &str, _value: &str) -> Result<(), StoreError> {
            Err(StoreError::QuotaExceeded { used: 0, capacity: 0 })
        }

        fn remove(&self, _key: &str) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("disk gone".into()))
        }

        fn keys(&self) -> Result<Vec<String>, StoreError> {
            Err(StoreError::Unavailable("disk gone".into()))
        }
    }

    fn setup() -> (Arc<TtlCache>, Arc<MemoryStore>, Arc<ManualClock>) {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(1_000_000));
        let cache = Arc::new(TtlCache::new(store.clone(), clock.clone(), HOUR));
        (cache, store, clock)
    }

    #[test]
    fn test_set_and_get() {
        let (cache, store, _) = setup();

        cache.set("seasons_now", json!({"data": [1, 2, 3]}));
        assert_eq!(cache.get("seasons_now"), Some(json!({"data": [1, 2, 3]})));

        let raw = store.get("cache_seasons_now").unwrap().unwrap();
        let entry: CacheEntry = serde_json::from_str(&raw).unwrap();
        assert_eq!(entry.expiry, 1_000_000 + 3_600_000);
    }

    #[test]
    fn test_expiry_boundary() {
        let (cache, store, clock) = setup();
        let ttl = Duration::from_secs(60);

        cache.set_with_ttl("k", json!("v"), ttl);

        clock.advance(ttl - Duration::from_millis(1));
        assert_eq!(cache.get("k"), Some(json!("v")));

        clock.advance(Duration::from_millis(2));
        assert_eq!(cache.get("k"), None);
        // Expired entries are purged from the persistent tier on access
        assert_eq!(store.get("cache_k").unwrap(), None);
    }

    #[test]
    fn test_huge_ttl_saturates() {
        let (cache, store, clock) = setup();

        cache.set_with_ttl("k", json!(1), Duration::from_secs(u64::MAX / 1000));
        assert_eq!(cache.get("k"), Some(json!(1)));

        let entry: CacheEntry = serde_json::from_str(&store.get("cache_k").unwrap().unwrap()).unwrap();
        assert_eq!(entry.expiry, i64::MAX);

        clock.advance(Duration::MAX);
        assert_eq!(clock.now_millis(), i64::MAX);
    }

    #[test]
    fn test_promotes_from_persistent_tier() {
        let (_, store, clock) = setup();
        let writer = TtlCache::new(store.clone(), clock.clone(), HOUR);
        writer.set("detail_1", json!({"title": "Cowboy Bebop"}));

        // A fresh process sharing the same store
        let reader = TtlCache::new(store.clone(), clock.clone(), HOUR);
        assert_eq!(reader.stats().memory_entries, 0);
        assert_eq!(reader.get("detail_1"), Some(json!({"title": "Cowboy Bebop"})));
        assert_eq!(reader.stats().memory_entries, 1);

        // Memory now answers even if the store loses the entry
        store.remove("cache_detail_1").unwrap();
        assert!(reader.get("detail_1").is_some());
    }

    #[test]
    fn test_corrupt_persisted_entry_is_purged() {
        let (cache, store, _) = setup();
        store.set("cache_bad", "not json").unwrap();

        assert_eq!(cache.get("bad"), None);
        assert_eq!(store.get("cache_bad").unwrap(), None);
    }

    #[test]
    fn test_remove_and_clear_only_touch_cache_keys() {
        let (cache, store, _) = setup();
        store.set("myAnimeList", "[]").unwrap();

        cache.set("a", json!(1));
        cache.set("b", json!(2));
        cache.remove("a");
        assert_eq!(cache.get("a"), None);
        assert_eq!(cache.stats(), CacheStats { memory_entries: 1, persisted_entries: 1 });

        cache.clear();
        assert_eq!(cache.get("b"), None);
        assert_eq!(cache.stats(), CacheStats::default());
        assert_eq!(store.get("myAnimeList").unwrap(), Some("[]".to_string()));
    }

    #[test]
    fn test_persistent_failure_degrades_to_memory() {
        let clock = Arc::new(ManualClock::new(0));
        let cache = TtlCache::new(Arc::new(FailingStore), clock, HOUR);

        cache.set("k", json!({"still": "here"}));
        assert_eq!(cache.get("k"), Some(json!({"still": "here"})));

        cache.remove("k");
        assert_eq!(cache.get("k"), None);
        cache.clear();
        assert_eq!(cache.stats().persisted_entries, 0);
    }

    #[test]
    fn test_quota_exceeded_degrades_to_memory() {
        let store = Arc::new(MemoryStore::with_capacity(16));
        let cache = TtlCache::new(store.clone(), Arc::new(ManualClock::new(0)), HOUR);

        cache.set("big", json!("a value far larger than sixteen bytes"));
        assert!(store.is_empty());
        assert!(cache.get("big").is_some());
    }

    #[tokio::test]
    async fn test_with_cache_calls_once() {
        let (cache, _, _) = setup();
        let calls = Arc::new(AtomicUsize::new(0));

        let counter = calls.clone();
        let search = with_cache(
            cache.clone(),
            move |(query, page): (String, u32)| {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, String>(vec![format!("{}#{}", query, page)])
                }
            },
            |(query, page): &(String, u32)| format!("search_{}_page_{}", query, page),
            HOUR,
        );

        let first = search.call(("naruto".to_string(), 1)).await.unwrap();
        let second = search.call(("naruto".to_string(), 1)).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        search.call(("naruto".to_string(), 2)).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_with_cache_refetches_after_expiry() {
        let (cache, _, clock) = setup();
        let calls = Arc::new(AtomicUsize::new(0));

        let counter = calls.clone();
        let random = with_cache(
            cache.clone(),
            move |_: ()| {
                let counter = counter.clone();
                async move { Ok::<_, String>(counter.fetch_add(1, Ordering::SeqCst)) }
            },
            |_: &()| "random".to_string(),
            Duration::from_secs(10),
        );

        assert_eq!(random.call(()).await, Ok(0));
        assert_eq!(random.call(()).await, Ok(0));
        clock.advance(Duration::from_secs(11));
        assert_eq!(random.call(()).await, Ok(1));
    }

    #[tokio::test]
    async fn test_failures_are_not_cached() {
        let (cache, store, _) = setup();

        let result: Result<u32, String> = cache
            .get_or_fetch("flaky", HOUR, || async { Err("boom".to_string()) })
            .await;
        assert_eq!(result, Err("boom".to_string()));
        assert_eq!(cache.get("flaky"), None);
        assert!(store.is_empty());

        let result: Result<u32, String> = cache.get_or_fetch("flaky", HOUR, || async { Ok(7) }).await;
        assert_eq!(result, Ok(7));
        assert_eq!(cache.get_as::<u32>("flaky"), Some(7));
    }

    #[test]
    fn test_time_bucket() {
        let clock = ManualClock::new(1_700_000_004_999);
        let window = Duration::from_secs(10);
        let first = time_bucket(&clock, window);

        clock.set(1_700_000_009_999);
        assert_eq!(time_bucket(&clock, window), first);

        clock.set(1_700_000_010_000);
        assert_eq!(time_bucket(&clock, window), first + 1);
    }
}

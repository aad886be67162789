//! Session memo cache for derived tables
//!
//! Entries are keyed by operation name, serialized scalar parameters and the
//! fingerprint of the input dataset. The cache is append-only: nothing is
//! evicted or invalidated within a session, since the source ledger is
//! immutable for the session's lifetime.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::debug;

use crate::error::{Error, Result};

/// Identity of a memoized computation
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub operation: &'static str,
    pub params: String,
    pub fingerprint: String,
}

impl CacheKey {
    pub fn new(operation: &'static str, params: impl Into<String>, fingerprint: &str) -> Self {
        Self {
            operation,
            params: params.into(),
            fingerprint: fingerprint.to_string(),
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let short = self.fingerprint.get(..12).unwrap_or(&self.fingerprint);
        if self.params.is_empty() {
            write!(f, "{}@{}", self.operation, short)
        } else {
            write!(f, "{}({})@{}", self.operation, self.params, short)
        }
    }
}

/// Hit and miss counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

type Entry = Arc<dyn Any + Send + Sync>;

/// Content-addressed memo cache, injected by reference into query code
#[derive(Default)]
pub struct MemoCache {
    entries: Mutex<HashMap<CacheKey, Entry>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl MemoCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<CacheKey, Entry>> {
        // Entries are only ever inserted whole, so a poisoned map is still consistent
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Return the cached result for `key`, computing and storing it on a miss
    ///
    /// The lock is not held while computing. A failed computation stores
    /// nothing.
    pub fn get_or_try_insert_with<T, F>(&self, key: CacheKey, compute: F) -> Result<Arc<T>>
    where
        T: Any + Send + Sync,
        F: FnOnce() -> Result<T>,
    {
        if let Some(entry) = self.lock().get(&key).cloned() {
            self.hits.fetch_add(1, Ordering::Relaxed);
            debug!("Cache hit for {}", key);
            return downcast(entry, &key);
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        debug!("Cache miss for {}", key);
        let value: Entry = Arc::new(compute()?);

        // First writer wins if the same key was computed twice
        let entry = self.lock().entry(key.clone()).or_insert(value).clone();
        downcast(entry, &key)
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.lock().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.len(),
        }
    }
}

fn downcast<T: Any + Send + Sync>(entry: Entry, key: &CacheKey) -> Result<Arc<T>> {
    entry.downcast::<T>().map_err(|_| {
        Error::InvalidData(format!("Cache entry {} holds a different type", key))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_computes_once_per_key() {
        let cache = MemoCache::new();
        let calls = Cell::new(0);
        let key = CacheKey::new("double", "x=2", "abc");

        for _ in 0..3 {
            let value = cache
                .get_or_try_insert_with(key.clone(), || {
                    calls.set(calls.get() + 1);
                    Ok(4)
                })
                .unwrap();
            assert_eq!(*value, 4);
        }

        assert_eq!(calls.get(), 1);
        assert_eq!(
            cache.stats(),
            CacheStats {
                hits: 2,
                misses: 1,
                entries: 1
            }
        );
    }

    #[test]
    fn test_params_and_fingerprint_separate_entries() {
        let cache = MemoCache::new();
        let a = cache
            .get_or_try_insert_with(CacheKey::new("op", "year=2024", "f1"), || Ok(1))
            .unwrap();
        let b = cache
            .get_or_try_insert_with(CacheKey::new("op", "year=2025", "f1"), || Ok(2))
            .unwrap();
        let c = cache
            .get_or_try_insert_with(CacheKey::new("op", "year=2024", "f2"), || Ok(3))
            .unwrap();

        assert_eq!((*a, *b, *c), (1, 2, 3));
        assert_eq!(cache.len(), 3);
    }

    #[test]
    fn test_failed_computation_is_not_cached() {
        let cache = MemoCache::new();
        let key = CacheKey::new("fallible", "", "f");

        let err = cache.get_or_try_insert_with::<i32, _>(key.clone(), || {
            Err(Error::InvalidData("boom".into()))
        });
        assert!(err.is_err());
        assert!(!cache.contains(&key));

        let ok = cache.get_or_try_insert_with(key.clone(), || Ok(7)).unwrap();
        assert_eq!(*ok, 7);
    }

    #[test]
    fn test_type_mismatch_is_an_error() {
        let cache = MemoCache::new();
        let key = CacheKey::new("op", "", "f");
        cache.get_or_try_insert_with(key.clone(), || Ok(1u32)).unwrap();

        let wrong = cache.get_or_try_insert_with(key, || Ok(String::from("x")));
        assert!(matches!(wrong, Err(Error::InvalidData(_))));
    }

    #[test]
    fn test_key_display() {
        let key = CacheKey::new("growth_movers", "year=2025", "0123456789abcdef");
        assert_eq!(key.to_string(), "growth_movers(year=2025)@0123456789ab");
    }
}

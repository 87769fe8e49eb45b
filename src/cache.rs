//! The cache-pool contract consumed by the definition resolver
//!
//! The core never assumes a particular cache backend; it talks to a
//! narrow [`CachePool`] trait. Keys are namespaced with the container
//! alias by the repository before they reach the pool. [`MemoryPool`]
//! is the bundled in-process implementation used by warm-up routines
//! and tests.

use crate::definition::Value;
use crate::error::Result;
use ahash::RandomState;
use dashmap::DashMap;
use std::sync::Arc;

/// Pluggable memoization collaborator for Singleton definition artifacts.
pub trait CachePool: Send + Sync {
    /// Return the memoized value for `key`, invoking `producer` on miss.
    ///
    /// Implementations must store the produced value before returning it.
    fn get(&self, key: &str, producer: &mut dyn FnMut() -> Result<Value>) -> Result<Value>;

    /// Drop a single entry
    fn delete(&self, key: &str) -> Result<()>;

    /// Drop all entries, or only those whose key starts with `prefix`
    fn clear(&self, prefix: Option<&str>) -> Result<()>;
}

/// In-process [`CachePool`] backed by a concurrent map.
///
/// # Examples
///
/// ```rust
/// use syringa::{CachePool, MemoryPool, value, cast};
///
/// let pool = MemoryPool::new();
/// let mut calls = 0;
///
/// for _ in 0..2 {
///     let v = pool
///         .get("svc:demo", &mut || {
///             calls += 1;
///             Ok(value(9_i64))
///         })
///         .unwrap();
///     assert_eq!(*cast::<i64>(&v).unwrap(), 9);
/// }
///
/// // second read was a hit
/// assert_eq!(calls, 1);
/// ```
#[derive(Default)]
pub struct MemoryPool {
    entries: DashMap<String, Value, RandomState>,
}

impl MemoryPool {
    /// Create an empty pool
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of memoized entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing is memoized
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether a key is currently memoized
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }
}

impl CachePool for MemoryPool {
    fn get(&self, key: &str, producer: &mut dyn FnMut() -> Result<Value>) -> Result<Value> {
        if let Some(hit) = self.entries.get(key).map(|e| Arc::clone(e.value())) {
            return Ok(hit);
        }
        let produced = producer()?;
        self.entries.insert(key.to_string(), Arc::clone(&produced));
        Ok(produced)
    }

    fn delete(&self, key: &str) -> Result<()> {
        self.entries.remove(key);
        Ok(())
    }

    fn clear(&self, prefix: Option<&str>) -> Result<()> {
        match prefix {
            Some(prefix) => self.entries.retain(|k, _| !k.starts_with(prefix)),
            None => self.entries.clear(),
        }
        Ok(())
    }
}

impl std::fmt::Debug for MemoryPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryPool")
            .field("entries", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::{cast, value};

    #[test]
    fn test_get_memoizes() {
        let pool = MemoryPool::new();
        let mut calls = 0_u32;

        for _ in 0..3 {
            let v = pool
                .get("k", &mut || {
                    calls += 1;
                    Ok(value(calls))
                })
                .unwrap();
            assert_eq!(*cast::<u32>(&v).unwrap(), 1);
        }
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_producer_error_is_not_cached() {
        let pool = MemoryPool::new();
        let err = pool.get("k", &mut || {
            Err(crate::DiError::Internal("boom".into()))
        });
        assert!(err.is_err());
        assert!(!pool.contains("k"));

        let ok = pool.get("k", &mut || Ok(value(1_i64)));
        assert!(ok.is_ok());
    }

    #[test]
    fn test_delete_and_prefix_clear() {
        let pool = MemoryPool::new();
        pool.get("app:def:a", &mut || Ok(value(1_i64))).unwrap();
        pool.get("app:def:b", &mut || Ok(value(2_i64))).unwrap();
        pool.get("other:def:c", &mut || Ok(value(3_i64))).unwrap();

        pool.delete("app:def:a").unwrap();
        assert!(!pool.contains("app:def:a"));

        pool.clear(Some("app:")).unwrap();
        assert!(!pool.contains("app:def:b"));
        assert!(pool.contains("other:def:c"));

        pool.clear(None).unwrap();
        assert!(pool.is_empty());
    }
}

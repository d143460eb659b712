//! Hot cache for frequently read metadata rows.
//!
//! A read-through cache keyed by `(table, key)`. On a miss the loader runs
//! and, when `will_need` is set, the decoded value is retained. The cache is
//! advisory: it never stores errors, partial rows, or mid-transaction
//! snapshots, and mutators must invalidate the corresponding entry before
//! reporting success. Stale reads remain possible by design; callers that
//! need fresh data remove the entry first.

use std::any::Any;
use std::future::Future;
use std::sync::Arc;

use dashmap::DashMap;
use tracing::trace;

use crate::error::MetaResult;

/// The tables the cache can front.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheTable {
    /// Bucket rows, keyed by bucket name.
    Bucket,
    /// Object rows, keyed `"{bucket}:{key}:{version}"`.
    Object,
    /// Per-user bucket lists, keyed by user id.
    User,
}

type CacheKey = (CacheTable, String);
type CacheValue = Arc<dyn Any + Send + Sync>;

/// Read-through cache over decoded metadata rows.
#[derive(Default)]
pub struct HotCache {
    entries: DashMap<CacheKey, CacheValue>,
}

impl std::fmt::Debug for HotCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HotCache")
            .field("entries", &self.entries.len())
            .finish()
    }
}

impl HotCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch a value, calling `loader` on a miss.
    ///
    /// `will_need` hints whether the loaded value should be retained; a
    /// `false` turns this into a plain load.
    ///
    /// # Errors
    ///
    /// Propagates the loader's error; nothing is cached in that case.
    pub async fn get<T, F, Fut>(
        &self,
        table: CacheTable,
        key: &str,
        will_need: bool,
        loader: F,
    ) -> MetaResult<Arc<T>>
    where
        T: Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = MetaResult<T>>,
    {
        if let Some(entry) = self.entries.get(&(table, key.to_owned())) {
            if let Ok(hit) = Arc::clone(entry.value()).downcast::<T>() {
                trace!(?table, key, "cache hit");
                return Ok(hit);
            }
            // A value of the wrong type means the entry is unusable; drop it.
            drop(entry);
            self.entries.remove(&(table, key.to_owned()));
        }

        let value = Arc::new(loader().await?);
        if will_need {
            self.entries
                .insert((table, key.to_owned()), Arc::clone(&value) as CacheValue);
        }
        Ok(value)
    }

    /// Invalidate one entry.
    pub fn remove(&self, table: CacheTable, key: &str) {
        self.entries.remove(&(table, key.to_owned()));
    }

    /// Number of retained entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache holds nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

//! Keyed cache of live tenant pools.
//!
//! The cache guarantees at most one pool per tenant key. Concurrent
//! requests for a missing key are serialized per key, so a burst of
//! first-time lookups still builds a single pool.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tokio::time::Instant;
use tracing::debug;

use crate::config::PoolSettings;
use crate::connector::Connector;
use crate::error::PoolResult;
use crate::key::TenantKey;
use crate::pool::TenantPool;
use crate::registry::ConnectionRegistry;

/// A cached pool together with the time it was last handed out.
struct CacheEntry<C: Connector> {
    pool: Arc<TenantPool<C>>,
    last_access: Mutex<Instant>,
}

impl<C: Connector> CacheEntry<C> {
    fn new(pool: Arc<TenantPool<C>>) -> Self {
        Self {
            pool,
            last_access: Mutex::new(Instant::now()),
        }
    }

    fn touch(&self) {
        *self.last_access.lock() = Instant::now();
    }

    fn idle_for(&self) -> Duration {
        self.last_access.lock().elapsed()
    }
}

/// Cache of per-tenant pools, keyed by [`TenantKey`].
pub struct PoolCache<C: Connector> {
    registry: Arc<ConnectionRegistry>,
    connector: Arc<C>,
    settings: PoolSettings,
    entries: RwLock<HashMap<TenantKey, CacheEntry<C>>>,
    /// One creation slot per key, so concurrent misses build one pool.
    creating: Mutex<HashMap<TenantKey, Arc<tokio::sync::Mutex<()>>>>,
}

impl<C: Connector> PoolCache<C> {
    /// Create an empty cache resolving descriptors through `registry`.
    pub fn new(
        registry: Arc<ConnectionRegistry>,
        connector: Arc<C>,
        settings: PoolSettings,
    ) -> Self {
        Self {
            registry,
            connector,
            settings,
            entries: RwLock::new(HashMap::new()),
            creating: Mutex::new(HashMap::new()),
        }
    }

    /// Get the cached pool for `key`, creating it on first use.
    ///
    /// An unknown key fails with [`crate::PoolError::UnknownTenant`] and a
    /// failed pool open with [`crate::PoolError::ConnectionFailure`];
    /// neither leaves an entry behind, so a later call can succeed once the
    /// cause is fixed.
    pub async fn get_or_create(&self, key: &TenantKey) -> PoolResult<Arc<TenantPool<C>>> {
        if let Some(pool) = self.get(key) {
            return Ok(pool);
        }

        // Resolve before taking a creation slot so unknown keys never
        // allocate one.
        let descriptor = self.registry.resolve(key)?.clone();

        let slot = self.creation_slot(key);
        let _guard = slot.lock().await;

        // Another task may have built the pool while we waited.
        if let Some(pool) = self.get(key) {
            return Ok(pool);
        }

        debug!(tenant = %key, "creating connection pool");
        let pool = Arc::new(
            TenantPool::open(
                key.clone(),
                descriptor,
                Arc::clone(&self.connector),
                self.settings.clone(),
            )
            .await?,
        );

        self.entries
            .write()
            .insert(key.clone(), CacheEntry::new(Arc::clone(&pool)));
        Ok(pool)
    }

    fn creation_slot(&self, key: &TenantKey) -> Arc<tokio::sync::Mutex<()>> {
        let mut creating = self.creating.lock();
        Arc::clone(creating.entry(key.clone()).or_default())
    }

    /// Look up a cached pool, marking the entry as freshly accessed.
    ///
    /// The access mark and the lookup happen under the map lock, so an
    /// eviction checking staleness either runs before this access and wins,
    /// or after it and backs off.
    pub fn get(&self, key: &TenantKey) -> Option<Arc<TenantPool<C>>> {
        let entries = self.entries.read();
        entries.get(key).map(|entry| {
            entry.touch();
            Arc::clone(&entry.pool)
        })
    }

    /// Look up a cached pool without refreshing its access time.
    pub fn peek(&self, key: &TenantKey) -> Option<Arc<TenantPool<C>>> {
        self.entries.read().get(key).map(|entry| Arc::clone(&entry.pool))
    }

    /// Remove and close the pool for `key`.
    ///
    /// Returns whether a pool was removed. The entry leaves the cache
    /// before the pool closes, so a concurrent lookup either sees the
    /// live pool or no entry at all.
    pub async fn remove(&self, key: &TenantKey) -> bool {
        let entry = self.entries.write().remove(key);
        match entry {
            Some(entry) => {
                entry.pool.close().await;
                true
            }
            None => false,
        }
    }

    /// Remove and close the pool for `key` only if it has gone unaccessed
    /// for at least `min_idle`.
    ///
    /// Returns whether the pool was evicted. An access that lands after
    /// the staleness check re-arms its own timer, so backing off here
    /// never strands a pool.
    pub async fn remove_if_idle(&self, key: &TenantKey, min_idle: Duration) -> bool {
        let stale = {
            let mut entries = self.entries.write();
            match entries.get(key) {
                Some(entry) if entry.idle_for() >= min_idle => {
                    entries.remove(key).map(|entry| entry.pool)
                }
                _ => None,
            }
        };

        match stale {
            Some(pool) => {
                debug!(tenant = %key, "evicting idle connection pool");
                pool.close().await;
                true
            }
            None => false,
        }
    }

    /// Remove and close every cached pool, returning how many there were.
    pub async fn drain(&self) -> usize {
        let drained: Vec<(TenantKey, CacheEntry<C>)> = {
            let mut entries = self.entries.write();
            entries.drain().collect()
        };

        let count = drained.len();
        for (_, entry) in drained {
            entry.pool.close().await;
        }
        count
    }

    /// Keys with a live pool right now.
    pub fn keys(&self) -> Vec<TenantKey> {
        self.entries.read().keys().cloned().collect()
    }

    /// Check whether a pool is cached for `key`.
    pub fn contains(&self, key: &TenantKey) -> bool {
        self.entries.read().contains_key(key)
    }

    /// Number of cached pools.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Check whether the cache holds no pools.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

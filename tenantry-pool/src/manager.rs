//! Connection lifecycle facade.
//!
//! [`ConnectionManager`] ties the registry, the pool cache, and the idle
//! evictor together behind one handle-oriented API. Every access to a
//! tenant re-arms that tenant's eviction timer, so pools live exactly as
//! long as someone keeps using them.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::info;

use crate::cache::PoolCache;
use crate::config::{ManagerConfig, POOL_SIZE_CEILING};
use crate::connector::Connector;
use crate::error::{PoolError, PoolResult};
use crate::evictor::IdleEvictor;
use crate::key::TenantKey;
use crate::pool::{Lease, PoolStatus, TenantPool};
use crate::registry::ConnectionRegistry;

/// Manages per-tenant connection pools over their whole lifecycle.
///
/// Cloning is cheap; clones share the same pools, timers, and shutdown
/// state.
///
/// # Example
///
/// ```rust,ignore
/// use tenantry_pool::{ConnectionManager, ConnectionRegistry};
///
/// let manager = ConnectionManager::new(registry, connector);
///
/// // Scoped use: the lease is released on every exit path
/// let count = manager
///     .with_connection("company1", |lease| async move {
///         count_rows(lease.inner()).await
///     })
///     .await?;
///
/// // Or hold a handle and lease as needed
/// let handle = manager.get_handle("company1").await?;
/// let lease = handle.lease().await?;
/// ```
pub struct ConnectionManager<C: Connector> {
    inner: Arc<ManagerInner<C>>,
}

struct ManagerInner<C: Connector> {
    registry: Arc<ConnectionRegistry>,
    config: ManagerConfig,
    cache: Arc<PoolCache<C>>,
    evictor: IdleEvictor,
    closed: AtomicBool,
}

impl<C: Connector> Clone for ConnectionManager<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C: Connector> ConnectionManager<C> {
    /// Create a manager with the default configuration.
    pub fn new(registry: ConnectionRegistry, connector: C) -> Self {
        Self::with_config(registry, connector, ManagerConfig::default())
    }

    /// Create a manager with an explicit configuration.
    ///
    /// The pool size is clamped to `1..=POOL_SIZE_CEILING` no matter how the
    /// configuration was built.
    pub fn with_config(
        registry: ConnectionRegistry,
        connector: C,
        mut config: ManagerConfig,
    ) -> Self {
        config.pool.max_connections = config.pool.max_connections.clamp(1, POOL_SIZE_CEILING);

        let registry = Arc::new(registry);
        let cache = Arc::new(PoolCache::new(
            Arc::clone(&registry),
            Arc::new(connector),
            config.pool.clone(),
        ));

        Self {
            inner: Arc::new(ManagerInner {
                evictor: IdleEvictor::new(config.eviction_delay),
                registry,
                config,
                cache,
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Get a handle to the tenant's pool, creating the pool on first use.
    ///
    /// Each call re-arms the tenant's eviction timer. The handle stays
    /// valid after eviction, but leases taken from it then fail with
    /// [`PoolError::ShutdownInProgress`]; ask the manager again to get a
    /// fresh pool.
    pub async fn get_handle(&self, key: impl Into<TenantKey>) -> PoolResult<Handle<C>> {
        let key = key.into();
        let pool = self.ensure_open(&key).await?;
        Ok(Handle { key, pool })
    }

    /// Run `f` with a leased connection for the tenant.
    ///
    /// The pool is created and its eviction timer re-armed exactly as in
    /// [`Self::get_handle`]. The lease is released when `f` finishes,
    /// whether it returns `Ok`, returns `Err`, or is cancelled.
    pub async fn with_connection<T, E, F, Fut>(
        &self,
        key: impl Into<TenantKey>,
        f: F,
    ) -> Result<T, E>
    where
        E: From<PoolError>,
        F: FnOnce(Lease<C::Conn>) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let key = key.into();
        let pool = self.ensure_open(&key).await?;
        let lease = pool.acquire().await?;
        f(lease).await
    }

    /// Close and forget the tenant's pool, cancelling its eviction timer.
    ///
    /// Returns whether a pool existed. Safe to call for unknown or
    /// already removed tenants.
    pub async fn remove(&self, key: impl Into<TenantKey>) -> bool {
        let key = key.into();
        self.inner.evictor.cancel(&key);
        self.inner.cache.remove(&key).await
    }

    /// Close every pool and refuse further use of the manager.
    ///
    /// Pending eviction timers are cancelled first, so no eviction runs
    /// after this returns. Returns how many pools were closed. Calling
    /// again is a no-op. A pool creation still in flight when the shutdown
    /// starts is torn down by its creator, which reports
    /// [`PoolError::ShutdownInProgress`] instead of handing the pool out.
    pub async fn close_all(&self) -> usize {
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return 0;
        }

        let cancelled = self.inner.evictor.cancel_all();
        let closed = self.inner.cache.drain().await;
        info!(pools = %closed, timers = %cancelled, "closed all connection pools");
        closed
    }

    /// Keys that currently have a live pool.
    pub fn active_pools(&self) -> Vec<TenantKey> {
        self.inner.cache.keys()
    }

    /// Status of the tenant's pool, if one is live.
    pub fn status(&self, key: impl Into<TenantKey>) -> Option<PoolStatus> {
        self.inner.cache.peek(&key.into()).map(|pool| pool.status())
    }

    /// Ping the tenant's pool. `false` when no pool is live.
    pub async fn is_healthy(&self, key: impl Into<TenantKey>) -> bool {
        match self.inner.cache.peek(&key.into()) {
            Some(pool) => pool.is_healthy().await,
            None => false,
        }
    }

    /// Eviction timers armed and not yet fired.
    pub fn pending_evictions(&self) -> usize {
        self.inner.evictor.pending()
    }

    /// Check if [`Self::close_all`] has run.
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// The configuration in effect, after clamping.
    pub fn config(&self) -> &ManagerConfig {
        &self.inner.config
    }

    /// The registry tenant keys are resolved against.
    pub fn registry(&self) -> &ConnectionRegistry {
        &self.inner.registry
    }

    async fn ensure_open(&self, key: &TenantKey) -> PoolResult<Arc<TenantPool<C>>> {
        if self.inner.closed.load(Ordering::SeqCst) {
            return Err(PoolError::ShutdownInProgress);
        }

        let pool = self.inner.cache.get_or_create(key).await?;
        self.arm_eviction(key);

        // A close_all that started during the awaits above may have drained
        // before this pool was inserted. The timer is already armed, so it
        // was either swept by cancel_all or is cancelled here with the pool.
        if self.inner.closed.load(Ordering::SeqCst) {
            self.inner.evictor.cancel(key);
            self.inner.cache.remove(key).await;
            return Err(PoolError::ShutdownInProgress);
        }

        Ok(pool)
    }

    fn arm_eviction(&self, key: &TenantKey) {
        let cache = Arc::clone(&self.inner.cache);
        let delay = self.inner.evictor.delay();
        let owned = key.clone();

        self.inner.evictor.arm(key, move || async move {
            // Hop to a detached task so replacing this timer cannot abort
            // a close already in progress.
            tokio::spawn(async move {
                cache.remove_if_idle(&owned, delay).await;
            });
        });
    }
}

/// A cheap, cloneable handle to one tenant's pool.
pub struct Handle<C: Connector> {
    key: TenantKey,
    pool: Arc<TenantPool<C>>,
}

impl<C: Connector> Clone for Handle<C> {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            pool: Arc::clone(&self.pool),
        }
    }
}

impl<C: Connector> fmt::Debug for Handle<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle")
            .field("key", &self.key)
            .field("pool", &self.pool)
            .finish()
    }
}

impl<C: Connector> Handle<C> {
    /// The tenant this handle belongs to.
    pub fn key(&self) -> &TenantKey {
        &self.key
    }

    /// Lease a connection from the pool.
    pub async fn lease(&self) -> PoolResult<Lease<C::Conn>> {
        self.pool.acquire().await
    }

    /// Current status of the underlying pool.
    pub fn status(&self) -> PoolStatus {
        self.pool.status()
    }

    /// Ping the underlying pool.
    pub async fn is_healthy(&self) -> bool {
        self.pool.is_healthy().await
    }
}

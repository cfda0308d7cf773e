//! Per-tenant bounded connection pool.
//!
//! Each pool owns the live connections for exactly one tenant. A semaphore
//! caps how many connections may be checked out at once; released
//! connections go back to an idle queue and are reused until they sit idle
//! past the configured timeout.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::{Instant, timeout};
use tracing::{debug, info, trace};

use crate::config::PoolSettings;
use crate::connector::Connector;
use crate::error::{PoolError, PoolResult};
use crate::key::TenantKey;
use crate::registry::ConnectionDescriptor;

/// A connection parked in the pool between leases.
struct IdleConn<T> {
    conn: T,
    last_used: Instant,
}

impl<T> IdleConn<T> {
    fn new(conn: T) -> Self {
        Self {
            conn,
            last_used: Instant::now(),
        }
    }
}

/// A bounded connection pool for one tenant.
///
/// # Example
///
/// ```rust,ignore
/// use tenantry_pool::{TenantPool, PoolSettings};
///
/// let pool = TenantPool::open(key, descriptor, connector, PoolSettings::default()).await?;
/// let lease = pool.acquire().await?;
/// // Use the connection...
/// // It returns to the pool when the lease is dropped
/// ```
pub struct TenantPool<C: Connector> {
    key: TenantKey,
    descriptor: ConnectionDescriptor,
    connector: Arc<C>,
    settings: PoolSettings,
    /// Caps the number of checked-out connections.
    semaphore: Arc<Semaphore>,
    /// Connections waiting for their next lease.
    idle: Arc<Mutex<VecDeque<IdleConn<C::Conn>>>>,
    closed: Arc<AtomicBool>,
}

impl<C: Connector> TenantPool<C> {
    /// Open a pool, verifying the descriptor by establishing one connection.
    ///
    /// The verified connection seeds the idle queue. A failure here leaves
    /// nothing behind and surfaces as [`PoolError::ConnectionFailure`].
    pub async fn open(
        key: TenantKey,
        descriptor: ConnectionDescriptor,
        connector: Arc<C>,
        settings: PoolSettings,
    ) -> PoolResult<Self> {
        let pool = Self {
            semaphore: Arc::new(Semaphore::new(settings.max_connections)),
            idle: Arc::new(Mutex::new(VecDeque::with_capacity(settings.max_connections))),
            closed: Arc::new(AtomicBool::new(false)),
            key,
            descriptor,
            connector,
            settings,
        };

        let mut conn = pool.establish().await?;
        pool.connector.ping(&mut conn).await?;
        pool.idle.lock().push_back(IdleConn::new(conn));

        info!(
            tenant = %pool.key,
            host = %pool.descriptor.host,
            database = %pool.descriptor.database,
            max_connections = %pool.settings.max_connections,
            "connection pool created"
        );

        Ok(pool)
    }

    /// Establish a new connection, bounded by the connect timeout.
    async fn establish(&self) -> PoolResult<C::Conn> {
        match timeout(
            self.settings.connect_timeout,
            self.connector.connect(&self.descriptor),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(PoolError::connection(format!(
                "connect to '{}' timed out after {}ms",
                self.descriptor.host,
                self.settings.connect_timeout.as_millis()
            ))),
        }
    }

    /// Lease a connection from the pool.
    ///
    /// Blocks until a connection is available or the acquire timeout
    /// elapses, in which case the caller gets [`PoolError::LeaseTimeout`].
    pub async fn acquire(&self) -> PoolResult<Lease<C::Conn>> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(PoolError::ShutdownInProgress);
        }
        trace!(tenant = %self.key, "acquiring connection");

        let permit = match timeout(
            self.settings.connect_timeout,
            self.semaphore.clone().acquire_owned(),
        )
        .await
        {
            Ok(Ok(permit)) => permit,
            // The semaphore only closes when the pool shuts down
            Ok(Err(_)) => return Err(PoolError::ShutdownInProgress),
            Err(_) => {
                return Err(PoolError::LeaseTimeout {
                    waited: self.settings.connect_timeout,
                });
            }
        };

        let (reusable, expired) = self.pop_idle();
        for stale in expired {
            debug!(tenant = %self.key, "discarding connection past its idle timeout");
            self.connector.close(stale.conn).await;
        }

        let conn = match reusable {
            Some(conn) => conn,
            None => {
                debug!(tenant = %self.key, "no idle connections, opening a new one");
                self.establish().await?
            }
        };

        Ok(Lease {
            conn: Some(conn),
            permit,
            return_to: Arc::clone(&self.idle),
            pool_closed: Arc::clone(&self.closed),
        })
    }

    /// Pop the first non-expired idle connection, collecting expired ones.
    fn pop_idle(&self) -> (Option<C::Conn>, Vec<IdleConn<C::Conn>>) {
        let mut idle = self.idle.lock();
        let mut expired = Vec::new();

        while let Some(pooled) = idle.pop_front() {
            if pooled.last_used.elapsed() > self.settings.idle_timeout {
                expired.push(pooled);
                continue;
            }
            return (Some(pooled.conn), expired);
        }
        (None, expired)
    }

    /// Close the pool, draining and closing every idle connection.
    ///
    /// Safe to call more than once. Leases handed out before the close keep
    /// working; their connections are discarded instead of returned. New
    /// acquires fail with [`PoolError::ShutdownInProgress`].
    pub async fn close(&self) {
        // Flag and drain move together under the queue lock; see the
        // matching check in Lease::drop.
        let drained: Vec<IdleConn<C::Conn>> = {
            let mut idle = self.idle.lock();
            if self.closed.swap(true, Ordering::SeqCst) {
                return;
            }
            self.semaphore.close();
            idle.drain(..).collect()
        };
        for pooled in drained {
            self.connector.close(pooled.conn).await;
        }

        info!(tenant = %self.key, "connection pool closed");
    }

    /// Check if the pool is healthy by leasing and pinging a connection.
    pub async fn is_healthy(&self) -> bool {
        match self.acquire().await {
            Ok(mut lease) => self.connector.ping(lease.inner_mut()).await.is_ok(),
            Err(_) => false,
        }
    }

    /// Get the current pool status.
    pub fn status(&self) -> PoolStatus {
        let available = self.semaphore.available_permits();
        let idle = self.idle.lock().len();
        PoolStatus {
            available,
            size: idle + self.settings.max_connections.saturating_sub(available),
            max_size: self.settings.max_connections,
        }
    }

    /// The tenant this pool belongs to.
    pub fn key(&self) -> &TenantKey {
        &self.key
    }

    /// The descriptor this pool connects with.
    pub fn descriptor(&self) -> &ConnectionDescriptor {
        &self.descriptor
    }

    /// The pool tuning in effect.
    pub fn settings(&self) -> &PoolSettings {
        &self.settings
    }

    /// Check if the pool has been closed.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl<C: Connector> fmt::Debug for TenantPool<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TenantPool")
            .field("key", &self.key)
            .field("descriptor", &self.descriptor)
            .field("settings", &self.settings)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

/// Pool status information.
#[derive(Debug, Clone)]
pub struct PoolStatus {
    /// Number of leases that could be handed out right now.
    pub available: usize,
    /// Live connections, both idle and checked out.
    pub size: usize,
    /// Maximum number of connections.
    pub max_size: usize,
}

/// A single connection checked out of a pool.
///
/// Dropping the lease returns the connection to the pool on every exit
/// path. If the pool closed while the lease was out, the connection is
/// discarded instead.
pub struct Lease<T: Send + 'static> {
    conn: Option<T>,
    #[allow(dead_code)]
    permit: OwnedSemaphorePermit,
    return_to: Arc<Mutex<VecDeque<IdleConn<T>>>>,
    pool_closed: Arc<AtomicBool>,
}

impl<T: Send + 'static> Lease<T> {
    /// Get the leased connection.
    pub fn inner(&self) -> &T {
        self.conn.as_ref().expect("connection already taken")
    }

    /// Get the leased connection mutably.
    pub fn inner_mut(&mut self) -> &mut T {
        self.conn.as_mut().expect("connection already taken")
    }
}

impl<T: Send + 'static> fmt::Debug for Lease<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lease")
            .field("active", &self.conn.is_some())
            .finish_non_exhaustive()
    }
}

impl<T: Send + 'static> Drop for Lease<T> {
    fn drop(&mut self) {
        // The permit releases after this body runs, so a waiter woken by it
        // always finds the returned connection already queued.
        if let Some(conn) = self.conn.take() {
            let mut idle = self.return_to.lock();
            // Checked under the queue lock that close() drains under, so
            // the connection is either drained there or discarded here.
            if self.pool_closed.load(Ordering::SeqCst) {
                trace!("pool closed, discarding leased connection");
                return;
            }
            idle.push_back(IdleConn::new(conn));
            trace!("returning connection to pool");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::test_util::{TestConnector, descriptor};

    fn settings(max: usize) -> PoolSettings {
        PoolSettings {
            max_connections: max,
            ..PoolSettings::default()
        }
    }

    async fn open_pool(
        connector: &TestConnector,
        settings: PoolSettings,
    ) -> TenantPool<TestConnector> {
        TenantPool::open(
            TenantKey::new("t1"),
            descriptor(),
            Arc::new(connector.clone()),
            settings,
        )
        .await
        .expect("pool should open")
    }

    #[tokio::test]
    async fn test_open_verifies_one_connection() {
        let connector = TestConnector::default();
        let pool = open_pool(&connector, settings(5)).await;

        assert_eq!(connector.connects.load(Ordering::SeqCst), 1);
        let status = pool.status();
        assert_eq!(status.available, 5);
        assert_eq!(status.size, 1);
        assert_eq!(status.max_size, 5);
    }

    #[tokio::test]
    async fn test_open_fails_when_backend_down() {
        let connector = TestConnector::default();
        connector.fail_next.store(true, Ordering::SeqCst);

        let result = TenantPool::open(
            TenantKey::new("t1"),
            descriptor(),
            Arc::new(connector.clone()),
            settings(5),
        )
        .await;

        assert!(result.unwrap_err().is_connection_failure());
    }

    #[tokio::test]
    async fn test_acquire_reuses_idle_connection() {
        let connector = TestConnector::default();
        let pool = open_pool(&connector, settings(5)).await;

        let lease = pool.acquire().await.unwrap();
        assert_eq!(connector.connects.load(Ordering::SeqCst), 1);
        drop(lease);

        let _lease = pool.acquire().await.unwrap();
        assert_eq!(connector.connects.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_acquire_opens_beyond_idle() {
        let connector = TestConnector::default();
        let pool = open_pool(&connector, settings(5)).await;

        let _first = pool.acquire().await.unwrap();
        let _second = pool.acquire().await.unwrap();

        assert_eq!(connector.connects.load(Ordering::SeqCst), 2);
        assert_eq!(pool.status().available, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_acquire_times_out_when_exhausted() {
        let connector = TestConnector::default();
        let pool = open_pool(&connector, settings(1)).await;

        let _held = pool.acquire().await.unwrap();
        let err = pool.acquire().await.unwrap_err();

        assert!(err.is_lease_timeout());
    }

    #[tokio::test]
    async fn test_release_restores_permits() {
        let connector = TestConnector::default();
        let pool = open_pool(&connector, settings(5)).await;

        let before = pool.status().available;
        let lease = pool.acquire().await.unwrap();
        assert_eq!(pool.status().available, before - 1);
        drop(lease);
        assert_eq!(pool.status().available, before);
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_expiry_discards_stale_connection() {
        let connector = TestConnector::default();
        let pool = open_pool(
            &connector,
            PoolSettings {
                max_connections: 5,
                idle_timeout: Duration::from_millis(50),
                ..PoolSettings::default()
            },
        )
        .await;

        tokio::time::sleep(Duration::from_millis(60)).await;

        let _lease = pool.acquire().await.unwrap();
        assert_eq!(connector.closes.load(Ordering::SeqCst), 1);
        assert_eq!(connector.connects.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_close_drains_idle_and_rejects_acquire() {
        let connector = TestConnector::default();
        let pool = open_pool(&connector, settings(5)).await;

        pool.close().await;
        assert!(pool.is_closed());
        assert_eq!(connector.closes.load(Ordering::SeqCst), 1);

        let err = pool.acquire().await.unwrap_err();
        assert!(err.is_shutdown());
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let connector = TestConnector::default();
        let pool = open_pool(&connector, settings(5)).await;

        pool.close().await;
        pool.close().await;
        assert_eq!(connector.closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_lease_discarded_when_pool_closes_mid_flight() {
        let connector = TestConnector::default();
        let pool = open_pool(&connector, settings(5)).await;

        let lease = pool.acquire().await.unwrap();
        pool.close().await;
        drop(lease);

        // The in-flight connection is dropped, not returned to the queue
        assert_eq!(pool.status().size, 0);
    }

    #[tokio::test]
    async fn test_returned_connections_drain_on_close() {
        let connector = TestConnector::default();
        let pool = open_pool(&connector, settings(5)).await;

        let first = pool.acquire().await.unwrap();
        let second = pool.acquire().await.unwrap();
        drop(first);
        drop(second);

        pool.close().await;
        assert_eq!(connector.closes.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_debug_output_redacts_credentials() {
        let connector = TestConnector::default();
        let pool = open_pool(&connector, settings(5)).await;

        let rendered = format!("{pool:?}");
        assert!(rendered.contains("\"t1\""));
        assert!(rendered.contains("***"));
        assert!(!rendered.contains("pw"));

        let lease = pool.acquire().await.unwrap();
        assert!(format!("{lease:?}").contains("active: true"));
    }

    #[tokio::test]
    async fn test_is_healthy() {
        let connector = TestConnector::default();
        let pool = open_pool(&connector, settings(5)).await;
        assert!(pool.is_healthy().await);

        pool.close().await;
        assert!(!pool.is_healthy().await);
    }
}

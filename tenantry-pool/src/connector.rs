//! The seam between the pool and a concrete database driver.

use async_trait::async_trait;

use crate::error::PoolResult;
use crate::registry::ConnectionDescriptor;

/// Opens, probes, and closes connections for a concrete backend.
///
/// Pools call [`connect`](Connector::connect) to grow,
/// [`ping`](Connector::ping) to verify liveness, and
/// [`close`](Connector::close) to tear a connection down gracefully. The
/// connection type itself is opaque to the pool; whatever the connector
/// yields is handed to callers as a capability to run statements.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// The connection type this connector produces.
    type Conn: Send + 'static;

    /// Establish a new connection for the given descriptor.
    async fn connect(&self, descriptor: &ConnectionDescriptor) -> PoolResult<Self::Conn>;

    /// Verify that a connection is still usable.
    async fn ping(&self, _conn: &mut Self::Conn) -> PoolResult<()> {
        Ok(())
    }

    /// Gracefully close a connection.
    async fn close(&self, conn: Self::Conn) {
        drop(conn);
    }
}

//! # tenantry-postgres
//!
//! PostgreSQL connector for the tenantry connection manager.
//!
//! Pairs [`tenantry_pool::ConnectionManager`] with real `tokio-postgres`
//! connections. Each pooled connection owns its client and the background
//! task driving the socket; both are torn down when the pool closes.
//!
//! ## Example
//!
//! ```rust,ignore
//! use tenantry_pool::{ConnectionManager, ConnectionRegistry};
//! use tenantry_postgres::PgConnector;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let registry = ConnectionRegistry::sample();
//!     let manager = ConnectionManager::new(registry, PgConnector::new());
//!
//!     let rows = manager
//!         .with_connection("company1", |lease| async move {
//!             lease.inner().query("SELECT id, name FROM users", &[]).await
//!                 .map_err(|e| tenantry_pool::PoolError::connection(e.to_string()))
//!         })
//!         .await?;
//!
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod connector;

pub use client::PgClient;
pub use connector::PgConnector;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::client::PgClient;
    pub use crate::connector::PgConnector;
}

//! # Tenantry
//!
//! Multi-tenant database connection lifecycle management.
//!
//! Tenantry provides:
//! - A registry mapping tenant keys to connection descriptors
//! - Lazily created, bounded connection pools, one per tenant
//! - Idle eviction that closes pools nobody has used for a while
//! - Leased connections released on every exit path
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use tenantry::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), tenantry::PoolError> {
//!     let registry = ConnectionRegistry::from_toml_str(r#"
//!         [tenants.company1]
//!         host = "localhost"
//!         user = "company1_user"
//!         password = "secret"
//!         database = "company1"
//!     "#)?;
//!
//!     let manager = ConnectionManager::new(registry, PgConnector::new());
//!
//!     let names: Vec<String> = manager
//!         .with_connection("company1", |lease| async move {
//!             let rows = lease.inner().query("SELECT name FROM users", &[]).await
//!                 .map_err(|e| PoolError::connection(e.to_string()))?;
//!             Ok(rows.iter().map(|row| row.get(0)).collect())
//!         })
//!         .await?;
//!
//!     manager.close_all().await;
//!     Ok(())
//! }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

/// Connection lifecycle management core.
pub mod pool {
    pub use tenantry_pool::*;
}

/// PostgreSQL connector.
#[cfg(feature = "postgres")]
#[cfg_attr(docsrs, doc(cfg(feature = "postgres")))]
pub mod postgres {
    pub use tenantry_postgres::*;
}

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::pool::prelude::*;
    #[cfg(feature = "postgres")]
    pub use crate::postgres::prelude::*;
}

// Re-export key types at the crate root
pub use pool::{
    ConnectionDescriptor, ConnectionManager, ConnectionRegistry, Connector, Handle, Lease,
    ManagerConfig, PoolError, PoolResult, PoolSettings, TenantKey,
};

#[cfg(feature = "postgres")]
pub use postgres::{PgClient, PgConnector};

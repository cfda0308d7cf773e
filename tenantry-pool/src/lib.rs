//! # tenantry-pool
//!
//! Per-tenant database connection lifecycle management.
//!
//! This crate provides:
//! - A registry mapping tenant keys to connection descriptors
//! - Lazily created, bounded connection pools, one per tenant
//! - Idle eviction that closes pools nobody has used for a while
//! - A [`ConnectionManager`] facade with leased, RAII-released connections
//!
//! The crate is driver-agnostic: anything implementing [`Connector`] can
//! back the pools. See `tenantry-postgres` for the PostgreSQL connector.
//!
//! ## Example
//!
//! ```rust,ignore
//! use tenantry_pool::{ConnectionManager, ConnectionRegistry};
//! use tenantry_postgres::PgConnector;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let registry = ConnectionRegistry::from_toml_str(r#"
//!         [tenants.company1]
//!         host = "localhost"
//!         user = "company1_user"
//!         password = "secret"
//!         database = "company1"
//!     "#)?;
//!
//!     let manager = ConnectionManager::new(registry, PgConnector::new());
//!     let handle = manager.get_handle("company1").await?;
//!     let lease = handle.lease().await?;
//!
//!     // The connection returns to the pool when the lease drops
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod config;
pub mod connector;
pub mod error;
pub mod evictor;
pub mod key;
pub mod logging;
pub mod manager;
pub mod pool;
pub mod registry;

#[cfg(test)]
mod test_util;

pub use cache::PoolCache;
pub use config::{ManagerConfig, ManagerConfigBuilder, POOL_SIZE_CEILING, PoolSettings};
pub use connector::Connector;
pub use error::{PoolError, PoolResult};
pub use evictor::IdleEvictor;
pub use key::TenantKey;
pub use manager::{ConnectionManager, Handle};
pub use pool::{Lease, PoolStatus, TenantPool};
pub use registry::{
    ConnectionDescriptor, ConnectionDescriptorBuilder, ConnectionRegistry,
    ConnectionRegistryBuilder,
};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::config::{ManagerConfig, PoolSettings};
    pub use crate::connector::Connector;
    pub use crate::error::{PoolError, PoolResult};
    pub use crate::key::TenantKey;
    pub use crate::manager::{ConnectionManager, Handle};
    pub use crate::pool::Lease;
    pub use crate::registry::{ConnectionDescriptor, ConnectionRegistry};
}

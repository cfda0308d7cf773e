//! Connector implementation backed by tokio-postgres.

use async_trait::async_trait;
use tokio_postgres::NoTls;
use tracing::warn;

use tenantry_pool::{ConnectionDescriptor, Connector, PoolError, PoolResult};

use crate::client::PgClient;

/// Opens PostgreSQL connections for the pool.
///
/// # Example
///
/// ```rust,ignore
/// use tenantry_pool::{ConnectionManager, ConnectionRegistry};
/// use tenantry_postgres::PgConnector;
///
/// let manager = ConnectionManager::new(registry, PgConnector::new());
/// ```
#[derive(Debug, Clone, Default)]
pub struct PgConnector {
    application_name: Option<String>,
}

impl PgConnector {
    /// Create a connector with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the `application_name` reported to the server.
    pub fn with_application_name(name: impl Into<String>) -> Self {
        Self {
            application_name: Some(name.into()),
        }
    }

    /// Translate a descriptor into a tokio-postgres configuration.
    pub fn pg_config(&self, descriptor: &ConnectionDescriptor) -> tokio_postgres::Config {
        let mut config = tokio_postgres::Config::new();
        config.host(&descriptor.host);
        config.port(descriptor.port);
        config.dbname(&descriptor.database);
        config.user(&descriptor.user);

        if let Some(ref password) = descriptor.password {
            config.password(password);
        }

        if let Some(ref app_name) = self.application_name {
            config.application_name(app_name);
        }

        config
    }
}

#[async_trait]
impl Connector for PgConnector {
    type Conn = PgClient;

    async fn connect(&self, descriptor: &ConnectionDescriptor) -> PoolResult<PgClient> {
        let config = self.pg_config(descriptor);

        let (client, connection) = config.connect(NoTls).await.map_err(|e| {
            PoolError::connection(format!(
                "failed to connect to '{}/{}': {}",
                descriptor.host, descriptor.database, e
            ))
        })?;

        // Drive the socket until the client is dropped
        let driver = tokio::spawn(async move {
            if let Err(error) = connection.await {
                warn!(error = %error, "postgres connection terminated with error");
            }
        });

        Ok(PgClient::new(client, driver))
    }

    async fn ping(&self, conn: &mut PgClient) -> PoolResult<()> {
        conn.ping()
            .await
            .map_err(|e| PoolError::connection(format!("ping failed: {e}")))
    }

    async fn close(&self, conn: PgClient) {
        conn.shutdown().await;
    }
}

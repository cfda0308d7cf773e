//! PostgreSQL client wrapper.

use tokio::task::JoinHandle;
use tokio::time::{Duration, timeout};
use tokio_postgres::types::ToSql;
use tokio_postgres::{Client, Row};
use tracing::{debug, warn};

/// How long to wait for the connection driver task to wind down.
const CLOSE_GRACE: Duration = Duration::from_secs(5);

/// A live PostgreSQL connection.
///
/// Owns both the `tokio-postgres` client and the background task driving
/// its socket. Query errors come back as [`tokio_postgres::Error`]; pool
/// lifecycle errors are the pool's concern, not this type's.
pub struct PgClient {
    client: Client,
    driver: JoinHandle<()>,
}

impl PgClient {
    pub(crate) fn new(client: Client, driver: JoinHandle<()>) -> Self {
        Self { client, driver }
    }

    /// Execute a query and return all rows.
    pub async fn query(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<Vec<Row>, tokio_postgres::Error> {
        debug!(sql = %sql, "Executing query");
        self.client.query(sql, params).await
    }

    /// Execute a query and return exactly one row.
    pub async fn query_one(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<Row, tokio_postgres::Error> {
        debug!(sql = %sql, "Executing query_one");
        self.client.query_one(sql, params).await
    }

    /// Execute a query and return zero or one row.
    pub async fn query_opt(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<Option<Row>, tokio_postgres::Error> {
        debug!(sql = %sql, "Executing query_opt");
        self.client.query_opt(sql, params).await
    }

    /// Execute a statement and return the number of affected rows.
    pub async fn execute(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<u64, tokio_postgres::Error> {
        debug!(sql = %sql, "Executing statement");
        self.client.execute(sql, params).await
    }

    /// Execute a batch of statements in a single round-trip.
    pub async fn batch_execute(&self, sql: &str) -> Result<(), tokio_postgres::Error> {
        debug!(sql = %sql, "Executing batch");
        self.client.batch_execute(sql).await
    }

    /// Round-trip to the server to confirm the connection still works.
    pub async fn ping(&self) -> Result<(), tokio_postgres::Error> {
        self.client.query_one("SELECT 1", &[]).await.map(|_| ())
    }

    /// Get the underlying tokio-postgres client.
    ///
    /// This is useful for advanced operations not covered by this wrapper.
    pub fn inner(&self) -> &Client {
        &self.client
    }

    /// Drop the client and wait for the driver task to wind down.
    ///
    /// The driver normally exits as soon as the client goes away; if it
    /// does not within the grace period, it is aborted.
    pub(crate) async fn shutdown(self) {
        let Self { client, mut driver } = self;
        drop(client);

        if timeout(CLOSE_GRACE, &mut driver).await.is_err() {
            warn!("postgres driver task outlived its grace period, aborting");
            driver.abort();
        }
    }
}

//! Test doubles shared by the unit tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use crate::connector::Connector;
use crate::error::{PoolError, PoolResult};
use crate::registry::ConnectionDescriptor;

/// In-memory connector that counts lifecycle events.
#[derive(Clone, Default)]
pub(crate) struct TestConnector {
    pub connects: Arc<AtomicUsize>,
    pub closes: Arc<AtomicUsize>,
    pub fail_next: Arc<AtomicBool>,
    pub connect_delay: Option<Duration>,
}

impl TestConnector {
    /// Connector whose connection attempts take `delay` to complete.
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            connect_delay: Some(delay),
            ..Self::default()
        }
    }
}

pub(crate) struct TestConn {
    #[allow(dead_code)]
    pub id: usize,
}

#[async_trait]
impl Connector for TestConnector {
    type Conn = TestConn;

    async fn connect(&self, _descriptor: &ConnectionDescriptor) -> PoolResult<TestConn> {
        if let Some(delay) = self.connect_delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(PoolError::connection("injected failure"));
        }
        let id = self.connects.fetch_add(1, Ordering::SeqCst);
        Ok(TestConn { id })
    }

    async fn close(&self, conn: TestConn) {
        self.closes.fetch_add(1, Ordering::SeqCst);
        drop(conn);
    }
}

/// A descriptor pointing nowhere in particular.
pub(crate) fn descriptor() -> ConnectionDescriptor {
    ConnectionDescriptor::new("localhost", "user", "pw", "db")
}

//! Error types for connection lifecycle operations.

use std::time::Duration;

use thiserror::Error;

/// Result type for connection lifecycle operations.
pub type PoolResult<T> = Result<T, PoolError>;

/// Errors that can occur while managing tenant connections.
#[derive(Error, Debug)]
pub enum PoolError {
    /// The tenant key has no registry entry.
    #[error("no tenant registered for key '{key}'")]
    UnknownTenant {
        /// The key that failed to resolve.
        key: String,
    },

    /// Establishing a connection to the backing database failed.
    #[error("connection failure: {message}")]
    ConnectionFailure {
        /// Description of the underlying failure.
        message: String,
    },

    /// No connection became available within the acquire timeout.
    #[error("no connection available after {}ms", waited.as_millis())]
    LeaseTimeout {
        /// How long the caller waited.
        waited: Duration,
    },

    /// The manager or pool has been shut down.
    #[error("shutdown in progress")]
    ShutdownInProgress,

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl PoolError {
    /// Create an error for an unregistered tenant key.
    pub fn unknown_tenant(key: impl Into<String>) -> Self {
        Self::UnknownTenant { key: key.into() }
    }

    /// Create a connection establishment error.
    pub fn connection(message: impl Into<String>) -> Self {
        Self::ConnectionFailure {
            message: message.into(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Check if this is an unknown-tenant error.
    pub fn is_unknown_tenant(&self) -> bool {
        matches!(self, Self::UnknownTenant { .. })
    }

    /// Check if this is a connection establishment error.
    pub fn is_connection_failure(&self) -> bool {
        matches!(self, Self::ConnectionFailure { .. })
    }

    /// Check if this is an acquire timeout.
    pub fn is_lease_timeout(&self) -> bool {
        matches!(self, Self::LeaseTimeout { .. })
    }

    /// Check if this error was caused by shutdown.
    pub fn is_shutdown(&self) -> bool {
        matches!(self, Self::ShutdownInProgress)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = PoolError::unknown_tenant("acme");
        assert!(err.is_unknown_tenant());
        assert_eq!(err.to_string(), "no tenant registered for key 'acme'");

        let err = PoolError::connection("connection refused");
        assert!(err.is_connection_failure());

        let err = PoolError::config("bad URL");
        assert!(matches!(err, PoolError::Config(_)));
    }

    #[test]
    fn test_lease_timeout_display() {
        let err = PoolError::LeaseTimeout {
            waited: Duration::from_millis(3000),
        };
        assert!(err.is_lease_timeout());
        assert_eq!(err.to_string(), "no connection available after 3000ms");
    }

    #[test]
    fn test_predicates_are_distinct() {
        let timeout = PoolError::LeaseTimeout {
            waited: Duration::from_millis(1),
        };
        assert!(!timeout.is_connection_failure());

        let shutdown = PoolError::ShutdownInProgress;
        assert!(shutdown.is_shutdown());
        assert!(!shutdown.is_lease_timeout());
    }
}

//! Pool and manager tuning.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{PoolError, PoolResult};

/// Hard ceiling on the per-tenant pool size.
pub const POOL_SIZE_CEILING: usize = 20;

/// Environment variable overriding the per-tenant pool size.
pub const POOL_MAX_ENV: &str = "TENANTRY_POOL_MAX";
/// Environment variable overriding the per-connection idle timeout (ms).
pub const IDLE_TIMEOUT_ENV: &str = "TENANTRY_IDLE_TIMEOUT_MS";
/// Environment variable overriding the connect/acquire timeout (ms).
pub const CONNECT_TIMEOUT_ENV: &str = "TENANTRY_CONNECT_TIMEOUT_MS";
/// Environment variable overriding the idle-eviction delay (ms).
pub const EVICTION_DELAY_ENV: &str = "TENANTRY_EVICTION_DELAY_MS";

mod duration_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

fn default_max_connections() -> usize {
    5
}

fn default_idle_timeout() -> Duration {
    Duration::from_millis(10_000)
}

fn default_connect_timeout() -> Duration {
    Duration::from_millis(3_000)
}

fn default_eviction_delay() -> Duration {
    Duration::from_secs(300)
}

/// Tuning for one tenant's connection pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolSettings {
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
    /// Maximum idle time before a pooled connection is discarded.
    #[serde(
        default = "default_idle_timeout",
        rename = "idle_timeout_ms",
        with = "duration_millis"
    )]
    pub idle_timeout: Duration,
    /// Maximum time to wait for a connection, both when establishing one and
    /// when waiting for a lease.
    #[serde(
        default = "default_connect_timeout",
        rename = "connect_timeout_ms",
        with = "duration_millis"
    )]
    pub connect_timeout: Duration,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_connections: default_max_connections(),
            idle_timeout: default_idle_timeout(),
            connect_timeout: default_connect_timeout(),
        }
    }
}

/// Configuration for a [`ConnectionManager`](crate::manager::ConnectionManager).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagerConfig {
    /// Per-tenant pool tuning.
    #[serde(default)]
    pub pool: PoolSettings,
    /// How long a pool may sit unaccessed before it is closed and evicted.
    #[serde(
        default = "default_eviction_delay",
        rename = "eviction_delay_ms",
        with = "duration_millis"
    )]
    pub eviction_delay: Duration,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            pool: PoolSettings::default(),
            eviction_delay: default_eviction_delay(),
        }
    }
}

impl ManagerConfig {
    /// Create a builder for configuration.
    pub fn builder() -> ManagerConfigBuilder {
        ManagerConfigBuilder::default()
    }

    /// Read configuration overrides from the process environment.
    ///
    /// Unset variables fall back to the defaults; values that fail to parse
    /// are a configuration error rather than a silent default.
    pub fn from_env() -> PoolResult<Self> {
        Self::from_env_with(|name| std::env::var(name).ok())
    }

    /// Read configuration overrides through `lookup` instead of the process
    /// environment. Tests pass a closure over fixed values so they never
    /// touch real variables.
    pub fn from_env_with<F>(lookup: F) -> PoolResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut builder = Self::builder();

        if let Some(raw) = lookup(POOL_MAX_ENV) {
            let max: usize = raw
                .parse()
                .map_err(|_| PoolError::config(format!("invalid {POOL_MAX_ENV}: '{raw}'")))?;
            builder = builder.max_connections(max);
        }
        if let Some(timeout) = parse_millis(lookup(IDLE_TIMEOUT_ENV), IDLE_TIMEOUT_ENV)? {
            builder = builder.idle_timeout(timeout);
        }
        if let Some(timeout) = parse_millis(lookup(CONNECT_TIMEOUT_ENV), CONNECT_TIMEOUT_ENV)? {
            builder = builder.connect_timeout(timeout);
        }
        if let Some(delay) = parse_millis(lookup(EVICTION_DELAY_ENV), EVICTION_DELAY_ENV)? {
            builder = builder.eviction_delay(delay);
        }

        Ok(builder.build())
    }
}

fn parse_millis(raw: Option<String>, name: &str) -> PoolResult<Option<Duration>> {
    raw.map(|raw| {
        raw.parse::<u64>()
            .map(Duration::from_millis)
            .map_err(|_| PoolError::config(format!("invalid {name}: '{raw}'")))
    })
    .transpose()
}

/// Builder for manager configuration.
#[derive(Debug, Default)]
pub struct ManagerConfigBuilder {
    max_connections: Option<usize>,
    idle_timeout: Option<Duration>,
    connect_timeout: Option<Duration>,
    eviction_delay: Option<Duration>,
}

impl ManagerConfigBuilder {
    /// Set the maximum pool size. Clamped to `1..=POOL_SIZE_CEILING`.
    pub fn max_connections(mut self, max: usize) -> Self {
        self.max_connections = Some(max);
        self
    }

    /// Set the per-connection idle timeout.
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = Some(timeout);
        self
    }

    /// Set the connect/acquire timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Set the idle-eviction delay.
    pub fn eviction_delay(mut self, delay: Duration) -> Self {
        self.eviction_delay = Some(delay);
        self
    }

    /// Build the configuration.
    pub fn build(self) -> ManagerConfig {
        let defaults = PoolSettings::default();
        ManagerConfig {
            pool: PoolSettings {
                max_connections: self
                    .max_connections
                    .unwrap_or(defaults.max_connections)
                    .clamp(1, POOL_SIZE_CEILING),
                idle_timeout: self.idle_timeout.unwrap_or(defaults.idle_timeout),
                connect_timeout: self.connect_timeout.unwrap_or(defaults.connect_timeout),
            },
            eviction_delay: self.eviction_delay.unwrap_or_else(default_eviction_delay),
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_defaults() {
        let config = ManagerConfig::default();
        assert_eq!(config.pool.max_connections, 5);
        assert_eq!(config.pool.idle_timeout, Duration::from_millis(10_000));
        assert_eq!(config.pool.connect_timeout, Duration::from_millis(3_000));
        assert_eq!(config.eviction_delay, Duration::from_secs(300));
    }

    #[test]
    fn test_builder_clamps_pool_size() {
        let config = ManagerConfig::builder().max_connections(100).build();
        assert_eq!(config.pool.max_connections, POOL_SIZE_CEILING);

        let config = ManagerConfig::builder().max_connections(0).build();
        assert_eq!(config.pool.max_connections, 1);
    }

    #[test]
    fn test_builder_overrides() {
        let config = ManagerConfig::builder()
            .max_connections(8)
            .idle_timeout(Duration::from_millis(500))
            .connect_timeout(Duration::from_millis(250))
            .eviction_delay(Duration::from_millis(50))
            .build();

        assert_eq!(config.pool.max_connections, 8);
        assert_eq!(config.pool.idle_timeout, Duration::from_millis(500));
        assert_eq!(config.pool.connect_timeout, Duration::from_millis(250));
        assert_eq!(config.eviction_delay, Duration::from_millis(50));
    }

    #[test]
    fn test_from_env_with_overrides() {
        let config = ManagerConfig::from_env_with(|name| match name {
            POOL_MAX_ENV => Some("12".to_string()),
            EVICTION_DELAY_ENV => Some("60000".to_string()),
            _ => None,
        })
        .unwrap();

        assert_eq!(config.pool.max_connections, 12);
        assert_eq!(config.eviction_delay, Duration::from_secs(60));
        // Untouched knobs keep their defaults
        assert_eq!(config.pool.connect_timeout, Duration::from_millis(3_000));
    }

    #[test]
    fn test_from_env_with_clamps() {
        let config =
            ManagerConfig::from_env_with(|name| (name == POOL_MAX_ENV).then(|| "500".to_string()))
                .unwrap();
        assert_eq!(config.pool.max_connections, POOL_SIZE_CEILING);
    }

    #[test]
    fn test_from_env_with_rejects_garbage() {
        let err =
            ManagerConfig::from_env_with(|name| (name == POOL_MAX_ENV).then(|| "many".to_string()))
                .unwrap_err();
        assert!(matches!(err, PoolError::Config(_)));

        let result = ManagerConfig::from_env_with(|name| {
            (name == IDLE_TIMEOUT_ENV).then(|| "-5".to_string())
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_toml_round_trip() {
        let document = r#"
            eviction_delay_ms = 120000

            [pool]
            max_connections = 10
            idle_timeout_ms = 5000
            connect_timeout_ms = 1000
        "#;

        let config: ManagerConfig = toml::from_str(document).unwrap();
        assert_eq!(config.pool.max_connections, 10);
        assert_eq!(config.pool.idle_timeout, Duration::from_millis(5_000));
        assert_eq!(config.eviction_delay, Duration::from_secs(120));
    }
}

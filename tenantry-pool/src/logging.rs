//! Structured logging controlled by `TENANTRY_*` environment variables.
//!
//! The crate logs through the standard tracing macros, with the tenant key
//! attached as a structured field wherever one is in scope. Installing a
//! subscriber is the embedding application's job by default; the built-in
//! one is opt-in:
//!
//! - `TENANTRY_DEBUG=true|1|yes` enables debug-level output
//! - `TENANTRY_LOG_LEVEL=trace|debug|info|warn|error` picks an explicit level
//! - `TENANTRY_LOG_FORMAT=json|pretty|compact` picks the output shape
//!   (default: json)
//!
//! ```rust,no_run
//! tenantry_pool::logging::init();
//! ```
//!
//! Applications that want the built-in subscriber without environment
//! variables can call [`init_with`] directly.

use std::env;
use std::str::FromStr;
use std::sync::Once;

use tracing::Level;

static INIT: Once = Once::new();

/// Output shape of the built-in subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// One JSON object per event.
    #[default]
    Json,
    /// Multi-line human-readable output.
    Pretty,
    /// Single-line human-readable output.
    Compact,
}

impl FromStr for LogFormat {
    type Err = ();

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "pretty" => Ok(Self::Pretty),
            "compact" => Ok(Self::Compact),
            _ => Err(()),
        }
    }
}

/// Subscriber settings resolved from the environment.
#[derive(Debug, Clone, Copy)]
struct Options {
    level: Level,
    format: LogFormat,
}

/// Decide what the environment asked for. `None` means logging was not
/// requested at all.
fn resolve(debug: Option<&str>, level: Option<&str>, format: Option<&str>) -> Option<Options> {
    let debug_requested = matches!(
        debug.map(str::to_ascii_lowercase).as_deref(),
        Some("true" | "1" | "yes")
    );

    let level = match level {
        Some(raw) => Some(Level::from_str(raw).unwrap_or(Level::WARN)),
        None if debug_requested => Some(Level::DEBUG),
        None => None,
    };

    let format = format.and_then(|raw| raw.parse().ok()).unwrap_or_default();

    level.map(|level| Options { level, format })
}

/// Install the built-in subscriber if the environment asks for one.
///
/// Call once at application startup; later calls are no-ops. Does nothing
/// unless `TENANTRY_DEBUG` or `TENANTRY_LOG_LEVEL` is set, so embedding
/// applications keep control of their own subscriber by default.
pub fn init() {
    let requested = resolve(
        env::var("TENANTRY_DEBUG").ok().as_deref(),
        env::var("TENANTRY_LOG_LEVEL").ok().as_deref(),
        env::var("TENANTRY_LOG_FORMAT").ok().as_deref(),
    );
    if let Some(options) = requested {
        init_with(options.level, options.format);
    }
}

/// Install the built-in subscriber at an explicit level and format.
///
/// The first call wins; later calls, including through [`init`], are
/// no-ops. Without the `tracing-subscriber` feature this does nothing.
#[cfg_attr(not(feature = "tracing-subscriber"), allow(unused_variables))]
pub fn init_with(level: Level, format: LogFormat) {
    INIT.call_once(|| {
        #[cfg(feature = "tracing-subscriber")]
        {
            use tracing_subscriber::{EnvFilter, fmt, prelude::*};

            let filter = EnvFilter::new(format!(
                "tenantry={level},tenantry_pool={level},tenantry_postgres={level}"
            ));
            let base = tracing_subscriber::registry().with(filter);
            match format {
                LogFormat::Json => base.with(fmt::layer().json()).init(),
                LogFormat::Pretty => base.with(fmt::layer().pretty()).init(),
                LogFormat::Compact => base.with(fmt::layer().compact()).init(),
            }

            tracing::debug!(%level, ?format, "logging initialized");
        }
    });
}

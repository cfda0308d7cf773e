//! Tenant keys for selecting a database.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A logical identifier selecting which tenant's database to use.
///
/// Keys come from a fixed, closed set of configured tenants. The empty
/// string is a legal key meaning "no tenant bound"; it resolves through the
/// registry like any other key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantKey(String);

impl TenantKey {
    /// Create a new tenant key.
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// The key callers fall back to when no tenant is bound to a request.
    pub fn unbound() -> Self {
        Self(String::new())
    }

    /// Get the key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Convert to the inner string.
    pub fn into_inner(self) -> String {
        self.0
    }

    /// Check if this is the unbound (empty) key.
    pub fn is_unbound(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for TenantKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for TenantKey {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for TenantKey {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

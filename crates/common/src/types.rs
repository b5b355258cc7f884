//! Common data types for Beacon backend components.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for a plugin.
///
/// Plugin IDs are assigned by plugin authors (e.g. `"beacon-clickhouse-datasource"`)
/// and are stable across plugin versions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PluginId(pub String);

impl PluginId {
    /// Create a plugin ID from anything string-like.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the plugin ID as a string slice for use in log fields and
    /// metric labels.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PluginId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PluginId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for PluginId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

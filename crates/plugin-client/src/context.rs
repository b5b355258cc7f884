//! Plugin invocation context types.

use common::types::PluginId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Deployment mode for a backend plugin.
///
/// Used as a metric label, so the value set is fixed at three variants.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Target {
    /// Target could not be determined (e.g. plugin not registered yet).
    #[default]
    Unknown,
    /// Plugin runs inside the server process.
    InProcess,
    /// Plugin runs as a separate managed process.
    SeparateProcess,
}

impl Target {
    /// Returns the target as a string for metric labels.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Target::Unknown => "unknown",
            Target::InProcess => "in_process",
            Target::SeparateProcess => "separate_process",
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of the plugin an operation is invoked against.
///
/// Immutable for the duration of a call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginContext {
    /// The plugin being invoked.
    pub plugin_id: PluginId,
    /// Where the plugin runs.
    pub target: Target,
}

impl PluginContext {
    /// Context for a plugin with an unresolved target.
    #[must_use]
    pub fn new(plugin_id: impl Into<PluginId>) -> Self {
        Self {
            plugin_id: plugin_id.into(),
            target: Target::Unknown,
        }
    }

    /// Set the deployment target.
    #[must_use]
    pub fn with_target(mut self, target: Target) -> Self {
        self.target = target;
        self
    }
}

//! Common configuration types for Beacon backend components.
//!
//! Feature toggles are loaded from environment variables. Components read
//! toggle state once at construction time; a toggle flip requires a restart
//! so that any derived schemas (e.g. metric label sets) stay stable for the
//! lifetime of the process.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::env;

/// Environment variable holding the comma-separated list of enabled toggles.
pub const FEATURE_TOGGLES_ENV_VAR: &str = "BEACON_FEATURE_TOGGLES";

/// Adds a `status_source` label to plugin request metrics, attributing
/// failures to the plugin itself or to a downstream dependency.
pub const TOGGLE_PLUGIN_STATUS_SOURCE_LABELS: &str = "plugin_status_source_labels";

/// Set of named feature toggles enabled for this process.
///
/// Toggles are plain strings so that components can ship new flags without
/// a coordinated release of this crate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureToggles {
    enabled: HashSet<String>,
}

impl FeatureToggles {
    /// No toggles enabled.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Enable the given toggles (for tests and embedded setups).
    #[must_use]
    pub fn with_toggles<I, S>(toggles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            enabled: toggles.into_iter().map(Into::into).collect(),
        }
    }

    /// Load toggles from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_vars(&env::vars().collect())
    }

    /// Load toggles from a `HashMap` (for testing).
    #[must_use]
    pub fn from_vars(vars: &HashMap<String, String>) -> Self {
        let enabled = vars
            .get(FEATURE_TOGGLES_ENV_VAR)
            .map(|list| {
                list.split(',')
                    .map(str::trim)
                    .filter(|toggle| !toggle.is_empty())
                    .map(ToString::to_string)
                    .collect()
            })
            .unwrap_or_default();
        Self { enabled }
    }

    /// Whether the named toggle is enabled.
    #[must_use]
    pub fn is_enabled(&self, toggle: &str) -> bool {
        self.enabled.contains(toggle)
    }
}

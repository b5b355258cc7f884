//! Plugin client error types.
//!
//! Errors returned by a [`crate::PluginClient`] are opaque to middlewares:
//! instrumentation observes them but always returns them to the caller
//! verbatim.

use thiserror::Error;

/// Error returned by a plugin client operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PluginClientError {
    /// The plugin process is not running or not reachable.
    #[error("Plugin unavailable: {0}")]
    PluginUnavailable(String),

    /// The plugin does not implement the invoked operation.
    #[error("Method not implemented by plugin")]
    MethodNotImplemented,

    /// The call was cancelled before the plugin produced a result.
    #[error("Request cancelled")]
    Cancelled,

    /// The plugin returned a transport-level failure.
    #[error("Plugin request failed: {0}")]
    RequestFailed(String),
}

impl PluginClientError {
    /// Whether this error represents a cancelled call rather than a failure.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, PluginClientError::Cancelled)
    }
}

//! Per-call request metadata shared along the middleware chain.
//!
//! A [`RequestMeta`] is attached to the [`crate::CallContext`] at the top of
//! the middleware chain. Inner middlewares write derived facts into it (the
//! status source classification of the outcome); outer middlewares and
//! externally-owned collaborators read it after the inner call returns,
//! without recomputing. The slot is atomic so it can be shared across await
//! points and worker threads.

use std::sync::atomic::{AtomicU8, Ordering};

use crate::request::ErrorSource;

/// Classification of where a request outcome originated.
///
/// Successful requests are attributed to the plugin itself, so `Plugin` is
/// the default for calls that never fail.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum StatusSource {
    /// Outcome originated in the plugin (also the success default).
    #[default]
    Plugin,
    /// Outcome originated in a downstream dependency of the plugin.
    Downstream,
}

impl StatusSource {
    /// Returns the status source as a string for metric labels.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            StatusSource::Plugin => "plugin",
            StatusSource::Downstream => "downstream",
        }
    }
}

impl From<ErrorSource> for StatusSource {
    fn from(source: ErrorSource) -> Self {
        match source {
            ErrorSource::Plugin => StatusSource::Plugin,
            ErrorSource::Downstream => StatusSource::Downstream,
        }
    }
}

const SOURCE_PLUGIN: u8 = 0;
const SOURCE_DOWNSTREAM: u8 = 1;

/// Mutable per-call metadata slot.
///
/// Exactly one classification is recorded per invocation; the last write
/// wins if a middleware reclassifies.
#[derive(Debug)]
pub struct RequestMeta {
    status_source: AtomicU8,
}

impl RequestMeta {
    /// Fresh metadata with the default status source.
    #[must_use]
    pub fn new() -> Self {
        Self {
            status_source: AtomicU8::new(SOURCE_PLUGIN),
        }
    }

    /// The current status source classification.
    #[must_use]
    pub fn status_source(&self) -> StatusSource {
        match self.status_source.load(Ordering::SeqCst) {
            SOURCE_DOWNSTREAM => StatusSource::Downstream,
            _ => StatusSource::Plugin,
        }
    }

    /// Record the status source classification for this call.
    pub fn set_status_source(&self, source: StatusSource) {
        let encoded = match source {
            StatusSource::Plugin => SOURCE_PLUGIN,
            StatusSource::Downstream => SOURCE_DOWNSTREAM,
        };
        self.status_source.store(encoded, Ordering::SeqCst);
    }
}

impl Default for RequestMeta {
    fn default() -> Self {
        Self::new()
    }
}

//! Plugin Request Instrumentation
//!
//! Middleware chain that observes every backend plugin operation without
//! changing its outcome:
//!
//! - [`request_meta`] - attaches a per-call metadata slot at the top of the
//!   chain so inner layers and external collaborators share derived facts
//! - [`status_source`] - classifies batched data-query outcomes as
//!   plugin- or downstream-originated and records the result in the call
//!   metadata
//! - [`metrics`] - records request counts, durations, and payload sizes
//!   into an explicitly-owned Prometheus registry
//! - [`notices`] - surfaces repeated operation failures to users exactly
//!   once per plugin and operation kind
//!
//! # Transparency
//!
//! Every wrapper returns the inner client's result or error verbatim.
//! Instrumentation failures (e.g. a label cardinality defect) are logged
//! and counted, never propagated to the caller.
//!
//! # Assembly
//!
//! The chain is an explicit ordered list applied once at startup via
//! [`plugin_client::decorate`]; see [`default_stack`].

#![warn(clippy::pedantic)]

pub mod metrics;
pub mod notices;
pub mod request_meta;
pub mod status_source;

use std::sync::Arc;

use common::config::FeatureToggles;
use plugin_client::ClientMiddleware;
use prometheus::Registry;

use crate::metrics::MetricsMiddleware;
use crate::notices::{ErrorNoticeMiddleware, NoticeSink};
use crate::request_meta::RequestMetaMiddleware;
use crate::status_source::StatusSourceMiddleware;

/// The default instrumentation stack, outermost first:
///
/// 1. request metadata attachment
/// 2. metrics recording
/// 3. status source classification
/// 4. failure notices
///
/// Metrics sit outside the classifier so that by the time a request is
/// recorded, the call metadata already carries its status source.
///
/// # Errors
///
/// Returns an error if metric registration fails (e.g. duplicate
/// registration against the same registry).
pub fn default_stack(
    registry: &Registry,
    toggles: &FeatureToggles,
    notice_sink: Arc<dyn NoticeSink>,
) -> Result<Vec<Arc<dyn ClientMiddleware>>, prometheus::Error> {
    Ok(vec![
        Arc::new(RequestMetaMiddleware::new()),
        Arc::new(MetricsMiddleware::new(registry, toggles)?),
        Arc::new(StatusSourceMiddleware::new()),
        Arc::new(ErrorNoticeMiddleware::new(notice_sink)),
    ])
}

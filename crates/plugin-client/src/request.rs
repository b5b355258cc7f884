//! The four plugin operation request/response shapes.
//!
//! Data queries are batched: one [`QueryDataRequest`] carries any number of
//! named sub-queries, and the plugin answers with one [`DataResponse`] per
//! name. Each sub-response may fail independently, optionally declaring
//! where the failure originated ([`ErrorSource`]). Aggregating those
//! per-response outcomes into a single classification for the whole
//! invocation is the instrumentation layer's job, not this crate's.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use crate::context::PluginContext;

// ============================================================================
// Health check
// ============================================================================

/// Request for a plugin health check.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckHealthRequest {
    /// Plugin being checked.
    pub context: PluginContext,
}

/// Health state reported by a plugin.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    /// Plugin did not report a recognizable state.
    #[default]
    Unknown,
    /// Plugin is healthy.
    Ok,
    /// Plugin reported itself unhealthy.
    Error,
}

/// Response to a health check.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckHealthResponse {
    /// Reported health state.
    pub status: HealthStatus,
    /// Optional human-readable detail.
    pub message: String,
}

impl CheckHealthResponse {
    /// A healthy response with no detail message.
    #[must_use]
    pub fn ok() -> Self {
        Self {
            status: HealthStatus::Ok,
            message: String::new(),
        }
    }
}

// ============================================================================
// Resource call
// ============================================================================

/// Request forwarded to a plugin-defined HTTP-like resource.
#[derive(Debug, Clone, PartialEq)]
pub struct CallResourceRequest {
    /// Plugin owning the resource.
    pub context: PluginContext,
    /// Resource path within the plugin (e.g. `"autocomplete"`).
    pub path: String,
    /// HTTP-like method (e.g. `"GET"`).
    pub method: String,
    /// Request body.
    pub body: Bytes,
}

impl CallResourceRequest {
    /// Size in bytes of the request payload, for size instrumentation.
    #[must_use]
    pub fn payload_bytes(&self) -> usize {
        self.body.len()
    }
}

/// Response from a plugin resource.
#[derive(Debug, Clone, PartialEq)]
pub struct CallResourceResponse {
    /// HTTP-like status code.
    pub status: u16,
    /// Response body.
    pub body: Bytes,
}

// ============================================================================
// Data query
// ============================================================================

/// Declared origin of a sub-response failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorSource {
    /// The plugin itself failed.
    Plugin,
    /// A dependency the plugin calls (database, remote API) failed.
    Downstream,
}

/// A single named query within a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataQuery {
    /// Name correlating this query with its response (e.g. `"A"`).
    pub ref_id: String,
    /// Datasource-specific query model.
    pub query: Value,
}

impl DataQuery {
    /// Build a query from a ref ID and a query model.
    #[must_use]
    pub fn new(ref_id: impl Into<String>, query: Value) -> Self {
        Self {
            ref_id: ref_id.into(),
            query,
        }
    }
}

/// Batched data query request.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryDataRequest {
    /// Plugin answering the queries.
    pub context: PluginContext,
    /// Named sub-queries.
    pub queries: Vec<DataQuery>,
}

impl QueryDataRequest {
    /// Size in bytes of the serialized query models, for size instrumentation.
    #[must_use]
    pub fn payload_bytes(&self) -> usize {
        self.queries.iter().map(|q| q.query.to_string().len()).sum()
    }
}

/// Failure of a single sub-response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataError {
    /// Human-readable failure description.
    pub message: String,
    /// HTTP-like status code for the failure.
    pub status: u16,
    /// Declared failure origin. `None` for legacy plugins that predate
    /// error-source declarations.
    pub source: Option<ErrorSource>,
}

impl DataError {
    /// A failure the plugin attributes to itself.
    #[must_use]
    pub fn plugin(message: impl Into<String>, status: u16) -> Self {
        Self {
            message: message.into(),
            status,
            source: Some(ErrorSource::Plugin),
        }
    }

    /// A failure the plugin attributes to a downstream dependency.
    #[must_use]
    pub fn downstream(message: impl Into<String>, status: u16) -> Self {
        Self {
            message: message.into(),
            status,
            source: Some(ErrorSource::Downstream),
        }
    }

    /// A failure with no declared origin (legacy plugins).
    #[must_use]
    pub fn undeclared(message: impl Into<String>, status: u16) -> Self {
        Self {
            message: message.into(),
            status,
            source: None,
        }
    }
}

/// Response to a single named query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataResponse {
    /// Result frames; opaque to this layer.
    pub frames: Vec<Value>,
    /// Failure, if the sub-query did not produce frames.
    pub error: Option<DataError>,
}

impl DataResponse {
    /// A successful response carrying the given frames.
    #[must_use]
    pub fn ok(frames: Vec<Value>) -> Self {
        Self {
            frames,
            error: None,
        }
    }

    /// A failed response.
    #[must_use]
    pub fn from_error(error: DataError) -> Self {
        Self {
            frames: Vec::new(),
            error: Some(error),
        }
    }
}

/// Batched data query response, keyed by sub-query ref ID.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryDataResponse {
    /// One response per sub-query.
    pub responses: HashMap<String, DataResponse>,
}

impl QueryDataResponse {
    /// Response with no sub-responses.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Add a sub-response under the given ref ID.
    #[must_use]
    pub fn with_response(mut self, ref_id: impl Into<String>, response: DataResponse) -> Self {
        self.responses.insert(ref_id.into(), response);
        self
    }
}

// ============================================================================
// Metrics collection
// ============================================================================

/// Request for a plugin's internal metrics.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectMetricsRequest {
    /// Plugin to collect from.
    pub context: PluginContext,
}

/// Plugin-internal metrics in Prometheus text exposition format.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CollectMetricsResponse {
    /// Raw exposition payload.
    pub prometheus: Bytes,
}

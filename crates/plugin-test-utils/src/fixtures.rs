//! Pre-built contexts, requests, and data responses for tests.

use bytes::Bytes;
use serde_json::json;

use plugin_client::request::{
    CallResourceRequest, CheckHealthRequest, CollectMetricsRequest, DataError, DataQuery,
    DataResponse, QueryDataRequest, QueryDataResponse,
};
use plugin_client::PluginContext;

/// Context for a plugin with an unresolved target.
#[must_use]
pub fn plugin_context(plugin_id: &str) -> PluginContext {
    PluginContext::new(plugin_id)
}

/// Health check request for the given plugin.
#[must_use]
pub fn check_health_request(plugin_id: &str) -> CheckHealthRequest {
    CheckHealthRequest {
        context: plugin_context(plugin_id),
    }
}

/// Resource call request with a small body.
#[must_use]
pub fn call_resource_request(plugin_id: &str) -> CallResourceRequest {
    CallResourceRequest {
        context: plugin_context(plugin_id),
        path: "resources/test".to_string(),
        method: "POST".to_string(),
        body: Bytes::from_static(b"{\"input\":\"value\"}"),
    }
}

/// Data query request carrying one sub-query.
#[must_use]
pub fn query_data_request(plugin_id: &str) -> QueryDataRequest {
    QueryDataRequest {
        context: plugin_context(plugin_id),
        queries: vec![DataQuery::new("A", json!({"expr": "up"}))],
    }
}

/// Metrics collection request for the given plugin.
#[must_use]
pub fn collect_metrics_request(plugin_id: &str) -> CollectMetricsRequest {
    CollectMetricsRequest {
        context: plugin_context(plugin_id),
    }
}

/// A successful sub-response with no frames.
#[must_use]
pub fn ok_response() -> DataResponse {
    DataResponse::ok(Vec::new())
}

/// A sub-response failed by the plugin itself.
#[must_use]
pub fn plugin_error_response() -> DataResponse {
    DataResponse::from_error(DataError::plugin("internal error", 500))
}

/// A sub-response failed by a downstream dependency.
#[must_use]
pub fn downstream_error_response() -> DataResponse {
    DataResponse::from_error(DataError::downstream("bad gateway", 502))
}

/// A failed sub-response with no declared error source.
#[must_use]
pub fn legacy_error_response() -> DataResponse {
    DataResponse::from_error(DataError::undeclared("internal error", 500))
}

/// Assemble a batched response from (ref ID, sub-response) pairs.
#[must_use]
pub fn batch<const N: usize>(entries: [(&str, DataResponse); N]) -> QueryDataResponse {
    let mut response = QueryDataResponse::empty();
    for (ref_id, data_response) in entries {
        response = response.with_response(ref_id, data_response);
    }
    response
}

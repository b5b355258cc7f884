//! Plugin client trait, call context, and middleware composition.

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

use crate::error::PluginClientError;
use crate::meta::RequestMeta;
use crate::request::{
    CallResourceRequest, CallResourceResponse, CheckHealthRequest, CheckHealthResponse,
    CollectMetricsRequest, CollectMetricsResponse, QueryDataRequest, QueryDataResponse,
};

/// The four operation kinds a backend plugin supports.
///
/// Used as a metric label, so the value set is fixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    /// Plugin health check.
    CheckHealth,
    /// Plugin-defined resource call.
    CallResource,
    /// Batched data query.
    QueryData,
    /// Plugin-internal metrics collection.
    CollectMetrics,
}

impl Endpoint {
    /// Returns the endpoint as a string for metric labels.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Endpoint::CheckHealth => "check_health",
            Endpoint::CallResource => "call_resource",
            Endpoint::QueryData => "query_data",
            Endpoint::CollectMetrics => "collect_metrics",
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-call execution context threaded through the middleware chain.
///
/// Cloning is cheap; the metadata slot, when present, is shared between all
/// clones of the same call's context.
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    meta: Option<Arc<RequestMeta>>,
}

impl CallContext {
    /// Context with no metadata attached.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A copy of this context carrying the given metadata slot.
    #[must_use]
    pub fn with_meta(&self, meta: Arc<RequestMeta>) -> Self {
        Self { meta: Some(meta) }
    }

    /// The metadata slot, if one has been attached.
    #[must_use]
    pub fn meta(&self) -> Option<&Arc<RequestMeta>> {
        self.meta.as_ref()
    }
}

/// Result type alias for plugin client operations.
pub type ClientResult<T> = Result<T, PluginClientError>;

/// Client interface to a backend plugin.
///
/// Implemented by the transport client and by every middleware wrapper, so
/// that decoration is invisible to callers.
#[async_trait]
pub trait PluginClient: Send + Sync {
    /// Check plugin health.
    async fn check_health(
        &self,
        ctx: &CallContext,
        req: &CheckHealthRequest,
    ) -> ClientResult<CheckHealthResponse>;

    /// Call a plugin-defined resource.
    async fn call_resource(
        &self,
        ctx: &CallContext,
        req: &CallResourceRequest,
    ) -> ClientResult<CallResourceResponse>;

    /// Run a batched data query.
    async fn query_data(
        &self,
        ctx: &CallContext,
        req: &QueryDataRequest,
    ) -> ClientResult<QueryDataResponse>;

    /// Collect the plugin's internal metrics.
    async fn collect_metrics(
        &self,
        ctx: &CallContext,
        req: &CollectMetricsRequest,
    ) -> ClientResult<CollectMetricsResponse>;
}

/// A middleware produces a wrapped client from the next client in the chain.
pub trait ClientMiddleware: Send + Sync {
    /// Wrap `next`, returning the decorated client.
    fn wrap(&self, next: Arc<dyn PluginClient>) -> Arc<dyn PluginClient>;
}

/// Apply an ordered middleware list to a client.
///
/// The first middleware in the list becomes the outermost wrapper: a call
/// enters `middlewares[0]` first and reaches `client` last. The list is
/// assembled once at startup; there is no runtime re-composition.
#[must_use]
pub fn decorate(
    client: Arc<dyn PluginClient>,
    middlewares: &[Arc<dyn ClientMiddleware>],
) -> Arc<dyn PluginClient> {
    let mut wrapped = client;
    for middleware in middlewares.iter().rev() {
        wrapped = middleware.wrap(wrapped);
    }
    wrapped
}

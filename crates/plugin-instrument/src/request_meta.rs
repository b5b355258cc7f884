//! Middleware that attaches per-call request metadata.
//!
//! Applied outermost so that every layer below it, and every collaborator
//! that receives the call context, can rely on a [`RequestMeta`] slot being
//! present. A context that already carries metadata passes through
//! untouched, which lets callers pre-attach a slot they want to inspect
//! after the call.

use async_trait::async_trait;
use std::sync::Arc;

use plugin_client::request::{
    CallResourceRequest, CallResourceResponse, CheckHealthRequest, CheckHealthResponse,
    CollectMetricsRequest, CollectMetricsResponse, QueryDataRequest, QueryDataResponse,
};
use plugin_client::{CallContext, ClientMiddleware, ClientResult, PluginClient, RequestMeta};

/// Middleware constructor for request metadata attachment.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestMetaMiddleware;

impl RequestMetaMiddleware {
    /// Create the middleware.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl ClientMiddleware for RequestMetaMiddleware {
    fn wrap(&self, next: Arc<dyn PluginClient>) -> Arc<dyn PluginClient> {
        Arc::new(RequestMetaClient { next })
    }
}

struct RequestMetaClient {
    next: Arc<dyn PluginClient>,
}

fn ensure_meta(ctx: &CallContext) -> CallContext {
    if ctx.meta().is_some() {
        ctx.clone()
    } else {
        ctx.with_meta(Arc::new(RequestMeta::new()))
    }
}

#[async_trait]
impl PluginClient for RequestMetaClient {
    async fn check_health(
        &self,
        ctx: &CallContext,
        req: &CheckHealthRequest,
    ) -> ClientResult<CheckHealthResponse> {
        let ctx = ensure_meta(ctx);
        self.next.check_health(&ctx, req).await
    }

    async fn call_resource(
        &self,
        ctx: &CallContext,
        req: &CallResourceRequest,
    ) -> ClientResult<CallResourceResponse> {
        let ctx = ensure_meta(ctx);
        self.next.call_resource(&ctx, req).await
    }

    async fn query_data(
        &self,
        ctx: &CallContext,
        req: &QueryDataRequest,
    ) -> ClientResult<QueryDataResponse> {
        let ctx = ensure_meta(ctx);
        self.next.query_data(&ctx, req).await
    }

    async fn collect_metrics(
        &self,
        ctx: &CallContext,
        req: &CollectMetricsRequest,
    ) -> ClientResult<CollectMetricsResponse> {
        let ctx = ensure_meta(ctx);
        self.next.collect_metrics(&ctx, req).await
    }
}

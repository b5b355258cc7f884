//! Programmable in-memory plugin client.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use plugin_client::request::{
    CallResourceRequest, CallResourceResponse, CheckHealthRequest, CheckHealthResponse,
    CollectMetricsRequest, CollectMetricsResponse, QueryDataRequest, QueryDataResponse,
};
use plugin_client::{CallContext, ClientResult, PluginClient};

type CheckHealthHandler =
    Box<dyn Fn(&CallContext, &CheckHealthRequest) -> ClientResult<CheckHealthResponse> + Send + Sync>;
type CallResourceHandler = Box<
    dyn Fn(&CallContext, &CallResourceRequest) -> ClientResult<CallResourceResponse> + Send + Sync,
>;
type QueryDataHandler =
    Box<dyn Fn(&CallContext, &QueryDataRequest) -> ClientResult<QueryDataResponse> + Send + Sync>;
type CollectMetricsHandler = Box<
    dyn Fn(&CallContext, &CollectMetricsRequest) -> ClientResult<CollectMetricsResponse>
        + Send
        + Sync,
>;

/// In-memory plugin client with programmable per-endpoint behavior.
///
/// Without a handler installed, every endpoint succeeds with an empty
/// response. The client records call counts per endpoint and the context
/// and request of the most recent data query, so tests can assert on what
/// the middleware chain passed down.
#[derive(Default)]
pub struct TestClient {
    check_health_handler: Mutex<Option<CheckHealthHandler>>,
    call_resource_handler: Mutex<Option<CallResourceHandler>>,
    query_data_handler: Mutex<Option<QueryDataHandler>>,
    collect_metrics_handler: Mutex<Option<CollectMetricsHandler>>,

    check_health_calls: AtomicUsize,
    call_resource_calls: AtomicUsize,
    query_data_calls: AtomicUsize,
    collect_metrics_calls: AtomicUsize,

    last_query_context: Mutex<Option<CallContext>>,
    last_query_request: Mutex<Option<QueryDataRequest>>,
}

impl TestClient {
    /// Client where every endpoint succeeds with an empty response.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Program the health check endpoint.
    pub fn on_check_health(
        &self,
        handler: impl Fn(&CallContext, &CheckHealthRequest) -> ClientResult<CheckHealthResponse>
            + Send
            + Sync
            + 'static,
    ) {
        *self
            .check_health_handler
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(Box::new(handler));
    }

    /// Program the resource call endpoint.
    pub fn on_call_resource(
        &self,
        handler: impl Fn(&CallContext, &CallResourceRequest) -> ClientResult<CallResourceResponse>
            + Send
            + Sync
            + 'static,
    ) {
        *self
            .call_resource_handler
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(Box::new(handler));
    }

    /// Program the data query endpoint.
    pub fn on_query_data(
        &self,
        handler: impl Fn(&CallContext, &QueryDataRequest) -> ClientResult<QueryDataResponse>
            + Send
            + Sync
            + 'static,
    ) {
        *self
            .query_data_handler
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(Box::new(handler));
    }

    /// Program the metrics collection endpoint.
    pub fn on_collect_metrics(
        &self,
        handler: impl Fn(&CallContext, &CollectMetricsRequest) -> ClientResult<CollectMetricsResponse>
            + Send
            + Sync
            + 'static,
    ) {
        *self
            .collect_metrics_handler
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(Box::new(handler));
    }

    /// Number of health check invocations that reached this client.
    #[must_use]
    pub fn check_health_calls(&self) -> usize {
        self.check_health_calls.load(Ordering::SeqCst)
    }

    /// Number of resource call invocations that reached this client.
    #[must_use]
    pub fn call_resource_calls(&self) -> usize {
        self.call_resource_calls.load(Ordering::SeqCst)
    }

    /// Number of data query invocations that reached this client.
    #[must_use]
    pub fn query_data_calls(&self) -> usize {
        self.query_data_calls.load(Ordering::SeqCst)
    }

    /// Number of metrics collection invocations that reached this client.
    #[must_use]
    pub fn collect_metrics_calls(&self) -> usize {
        self.collect_metrics_calls.load(Ordering::SeqCst)
    }

    /// Call context of the most recent data query, as seen by this client.
    #[must_use]
    pub fn last_query_context(&self) -> Option<CallContext> {
        self.last_query_context
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Request of the most recent data query, as seen by this client.
    #[must_use]
    pub fn last_query_request(&self) -> Option<QueryDataRequest> {
        self.last_query_request
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl PluginClient for TestClient {
    async fn check_health(
        &self,
        ctx: &CallContext,
        req: &CheckHealthRequest,
    ) -> ClientResult<CheckHealthResponse> {
        self.check_health_calls.fetch_add(1, Ordering::SeqCst);
        let handler = self
            .check_health_handler
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        match handler.as_ref() {
            Some(handler) => handler(ctx, req),
            None => Ok(CheckHealthResponse::ok()),
        }
    }

    async fn call_resource(
        &self,
        ctx: &CallContext,
        req: &CallResourceRequest,
    ) -> ClientResult<CallResourceResponse> {
        self.call_resource_calls.fetch_add(1, Ordering::SeqCst);
        let handler = self
            .call_resource_handler
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        match handler.as_ref() {
            Some(handler) => handler(ctx, req),
            None => Ok(CallResourceResponse {
                status: 200,
                body: bytes::Bytes::new(),
            }),
        }
    }

    async fn query_data(
        &self,
        ctx: &CallContext,
        req: &QueryDataRequest,
    ) -> ClientResult<QueryDataResponse> {
        self.query_data_calls.fetch_add(1, Ordering::SeqCst);
        *self
            .last_query_context
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(ctx.clone());
        *self
            .last_query_request
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(req.clone());
        let handler = self
            .query_data_handler
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        match handler.as_ref() {
            Some(handler) => handler(ctx, req),
            None => Ok(QueryDataResponse::empty()),
        }
    }

    async fn collect_metrics(
        &self,
        ctx: &CallContext,
        req: &CollectMetricsRequest,
    ) -> ClientResult<CollectMetricsResponse> {
        self.collect_metrics_calls.fetch_add(1, Ordering::SeqCst);
        let handler = self
            .collect_metrics_handler
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        match handler.as_ref() {
            Some(handler) => handler(ctx, req),
            None => Ok(CollectMetricsResponse::default()),
        }
    }
}

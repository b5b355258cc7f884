//! User-facing failure notices with de-duplication.
//!
//! A failing plugin operation is often retried on a tight loop (e.g. an
//! editor re-requesting autocomplete on every keystroke). The middleware
//! here surfaces such failures to users exactly once per plugin and
//! operation kind, while the underlying operation keeps being invoked and
//! keeps returning its error to the caller unchanged.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use common::types::PluginId;
use plugin_client::request::{
    CallResourceRequest, CallResourceResponse, CheckHealthRequest, CheckHealthResponse,
    CollectMetricsRequest, CollectMetricsResponse, QueryDataRequest, QueryDataResponse,
};
use plugin_client::{
    CallContext, ClientMiddleware, ClientResult, Endpoint, PluginClient, PluginContext,
};

/// A user-facing notice about a failing plugin operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    /// Plugin whose operation failed.
    pub plugin_id: PluginId,
    /// Operation kind that failed.
    pub endpoint: Endpoint,
    /// Failure description shown to the user.
    pub message: String,
}

/// Destination for user-facing notices.
pub trait NoticeSink: Send + Sync {
    /// Deliver a notice.
    fn notify(&self, notice: Notice);
}

/// Sink that emits notices to the structured log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNoticeSink;

impl NoticeSink for LogNoticeSink {
    fn notify(&self, notice: Notice) {
        tracing::warn!(
            target: "plugin.instrument.notices",
            plugin_id = %notice.plugin_id,
            endpoint = %notice.endpoint,
            message = %notice.message,
            "Plugin operation failing"
        );
    }
}

struct NoticeState {
    sink: Arc<dyn NoticeSink>,
    seen: Mutex<HashSet<(PluginId, Endpoint)>>,
}

/// Middleware constructor for de-duplicated failure notices.
pub struct ErrorNoticeMiddleware {
    state: Arc<NoticeState>,
}

impl ErrorNoticeMiddleware {
    /// Create the middleware with the given notice destination.
    #[must_use]
    pub fn new(sink: Arc<dyn NoticeSink>) -> Self {
        Self {
            state: Arc::new(NoticeState {
                sink,
                seen: Mutex::new(HashSet::new()),
            }),
        }
    }

    /// Forget previously emitted notices (for tests).
    pub fn reset(&self) {
        self.state
            .seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl ClientMiddleware for ErrorNoticeMiddleware {
    fn wrap(&self, next: Arc<dyn PluginClient>) -> Arc<dyn PluginClient> {
        Arc::new(ErrorNoticeClient {
            state: Arc::clone(&self.state),
            next,
        })
    }
}

struct ErrorNoticeClient {
    state: Arc<NoticeState>,
    next: Arc<dyn PluginClient>,
}

impl ErrorNoticeClient {
    fn observe<T>(&self, context: &PluginContext, endpoint: Endpoint, result: &ClientResult<T>) {
        let Err(error) = result else {
            return;
        };
        let key = (context.plugin_id.clone(), endpoint);
        let first = self
            .state
            .seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key);
        if first {
            self.state.sink.notify(Notice {
                plugin_id: context.plugin_id.clone(),
                endpoint,
                message: error.to_string(),
            });
        }
    }
}

#[async_trait]
impl PluginClient for ErrorNoticeClient {
    async fn check_health(
        &self,
        ctx: &CallContext,
        req: &CheckHealthRequest,
    ) -> ClientResult<CheckHealthResponse> {
        let result = self.next.check_health(ctx, req).await;
        self.observe(&req.context, Endpoint::CheckHealth, &result);
        result
    }

    async fn call_resource(
        &self,
        ctx: &CallContext,
        req: &CallResourceRequest,
    ) -> ClientResult<CallResourceResponse> {
        let result = self.next.call_resource(ctx, req).await;
        self.observe(&req.context, Endpoint::CallResource, &result);
        result
    }

    async fn query_data(
        &self,
        ctx: &CallContext,
        req: &QueryDataRequest,
    ) -> ClientResult<QueryDataResponse> {
        let result = self.next.query_data(ctx, req).await;
        self.observe(&req.context, Endpoint::QueryData, &result);
        result
    }

    async fn collect_metrics(
        &self,
        ctx: &CallContext,
        req: &CollectMetricsRequest,
    ) -> ClientResult<CollectMetricsResponse> {
        let result = self.next.collect_metrics(ctx, req).await;
        self.observe(&req.context, Endpoint::CollectMetrics, &result);
        result
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use plugin_client::PluginClientError;

    #[derive(Default)]
    struct RecordingSink {
        notices: Mutex<Vec<Notice>>,
    }

    impl NoticeSink for RecordingSink {
        fn notify(&self, notice: Notice) {
            self.notices
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(notice);
        }
    }

    impl RecordingSink {
        fn notices(&self) -> Vec<Notice> {
            self.notices
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone()
        }
    }

    fn rig(sink: Arc<RecordingSink>) -> (ErrorNoticeMiddleware, Arc<dyn PluginClient>) {
        struct FailingClient;

        #[async_trait]
        impl PluginClient for FailingClient {
            async fn check_health(
                &self,
                _ctx: &CallContext,
                _req: &CheckHealthRequest,
            ) -> ClientResult<CheckHealthResponse> {
                Ok(CheckHealthResponse::ok())
            }

            async fn call_resource(
                &self,
                _ctx: &CallContext,
                _req: &CallResourceRequest,
            ) -> ClientResult<CallResourceResponse> {
                Err(PluginClientError::RequestFailed(
                    "autocomplete failed".to_string(),
                ))
            }

            async fn query_data(
                &self,
                _ctx: &CallContext,
                _req: &QueryDataRequest,
            ) -> ClientResult<QueryDataResponse> {
                Err(PluginClientError::RequestFailed("query failed".to_string()))
            }

            async fn collect_metrics(
                &self,
                _ctx: &CallContext,
                _req: &CollectMetricsRequest,
            ) -> ClientResult<CollectMetricsResponse> {
                Ok(CollectMetricsResponse::default())
            }
        }

        let middleware = ErrorNoticeMiddleware::new(sink);
        let client = middleware.wrap(Arc::new(FailingClient));
        (middleware, client)
    }

    fn resource_request() -> CallResourceRequest {
        CallResourceRequest {
            context: PluginContext::new("test-datasource"),
            path: "autocomplete".to_string(),
            method: "GET".to_string(),
            body: bytes::Bytes::new(),
        }
    }

    #[tokio::test]
    async fn test_repeated_failures_notify_once() {
        let sink = Arc::new(RecordingSink::default());
        let (_middleware, client) = rig(Arc::clone(&sink));

        let req = resource_request();
        for _ in 0..5 {
            let result = client.call_resource(&CallContext::new(), &req).await;
            assert!(result.is_err(), "error must reach the caller every time");
        }

        let notices = sink.notices();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices.first().unwrap().endpoint, Endpoint::CallResource);
        assert!(notices.first().unwrap().message.contains("autocomplete"));
    }

    #[tokio::test]
    async fn test_distinct_operations_notify_separately() {
        let sink = Arc::new(RecordingSink::default());
        let (_middleware, client) = rig(Arc::clone(&sink));

        let resource_req = resource_request();
        let query_req = QueryDataRequest {
            context: PluginContext::new("test-datasource"),
            queries: Vec::new(),
        };

        let _ = client
            .call_resource(&CallContext::new(), &resource_req)
            .await;
        let _ = client.query_data(&CallContext::new(), &query_req).await;
        let _ = client
            .call_resource(&CallContext::new(), &resource_req)
            .await;

        assert_eq!(sink.notices().len(), 2);
    }

    #[tokio::test]
    async fn test_successful_operations_do_not_notify() {
        let sink = Arc::new(RecordingSink::default());
        let (_middleware, client) = rig(Arc::clone(&sink));

        let req = CheckHealthRequest {
            context: PluginContext::new("test-datasource"),
        };
        client.check_health(&CallContext::new(), &req).await.unwrap();

        assert!(sink.notices().is_empty());
    }

    #[tokio::test]
    async fn test_reset_allows_renotification() {
        let sink = Arc::new(RecordingSink::default());
        let (middleware, client) = rig(Arc::clone(&sink));

        let req = resource_request();
        let _ = client.call_resource(&CallContext::new(), &req).await;
        middleware.reset();
        let _ = client.call_resource(&CallContext::new(), &req).await;

        assert_eq!(sink.notices().len(), 2);
    }
}

//! Outcome classification for batched data-query responses.
//!
//! A data query invocation returns one sub-response per named query, each
//! of which may fail independently with a declared error source. The whole
//! invocation gets exactly one classification, chosen by priority:
//!
//! 1. any plugin-sourced error, or any error with no declared source
//! 2. otherwise any downstream-sourced error
//! 3. otherwise plugin (success is attributed to the plugin itself)
//!
//! The priority is order-independent: a batch mixing outcomes always
//! resolves to the most actionable one. Errors with no declared source come
//! from plugins that predate source declarations and are treated as
//! plugin-sourced.
//!
//! Only data queries are classified here; the other three endpoints return
//! single results and keep the default status source.

use async_trait::async_trait;
use std::sync::Arc;

use plugin_client::request::{
    CallResourceRequest, CallResourceResponse, CheckHealthRequest, CheckHealthResponse,
    CollectMetricsRequest, CollectMetricsResponse, DataResponse, ErrorSource, QueryDataRequest,
    QueryDataResponse,
};
use plugin_client::{CallContext, ClientMiddleware, ClientResult, PluginClient, StatusSource};

/// Classify a batch of sub-responses into a single status source.
pub fn aggregate_status_source<'a, I>(responses: I) -> StatusSource
where
    I: IntoIterator<Item = &'a DataResponse>,
{
    let mut saw_downstream_error = false;
    for response in responses {
        if let Some(error) = &response.error {
            match error.source {
                // Plugin-sourced and undeclared errors outrank everything.
                Some(ErrorSource::Plugin) | None => return StatusSource::Plugin,
                Some(ErrorSource::Downstream) => saw_downstream_error = true,
            }
        }
    }
    if saw_downstream_error {
        StatusSource::Downstream
    } else {
        StatusSource::Plugin
    }
}

/// Middleware constructor for status source classification.
#[derive(Debug, Clone, Copy, Default)]
pub struct StatusSourceMiddleware;

impl StatusSourceMiddleware {
    /// Create the middleware.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl ClientMiddleware for StatusSourceMiddleware {
    fn wrap(&self, next: Arc<dyn PluginClient>) -> Arc<dyn PluginClient> {
        Arc::new(StatusSourceClient { next })
    }
}

struct StatusSourceClient {
    next: Arc<dyn PluginClient>,
}

#[async_trait]
impl PluginClient for StatusSourceClient {
    async fn check_health(
        &self,
        ctx: &CallContext,
        req: &CheckHealthRequest,
    ) -> ClientResult<CheckHealthResponse> {
        self.next.check_health(ctx, req).await
    }

    async fn call_resource(
        &self,
        ctx: &CallContext,
        req: &CallResourceRequest,
    ) -> ClientResult<CallResourceResponse> {
        self.next.call_resource(ctx, req).await
    }

    async fn query_data(
        &self,
        ctx: &CallContext,
        req: &QueryDataRequest,
    ) -> ClientResult<QueryDataResponse> {
        let result = self.next.query_data(ctx, req).await;
        if let Ok(response) = &result {
            if let Some(meta) = ctx.meta() {
                meta.set_status_source(aggregate_status_source(response.responses.values()));
            }
        }
        result
    }

    async fn collect_metrics(
        &self,
        ctx: &CallContext,
        req: &CollectMetricsRequest,
    ) -> ClientResult<CollectMetricsResponse> {
        self.next.collect_metrics(ctx, req).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use plugin_client::request::DataError;

    fn ok() -> DataResponse {
        DataResponse::ok(Vec::new())
    }

    fn plugin_error() -> DataResponse {
        DataResponse::from_error(DataError::plugin("internal error", 500))
    }

    fn downstream_error() -> DataResponse {
        DataResponse::from_error(DataError::downstream("bad gateway", 502))
    }

    fn legacy_error() -> DataResponse {
        DataResponse::from_error(DataError::undeclared("internal error", 500))
    }

    #[test]
    fn test_empty_batch_defaults_to_plugin() {
        let batch: [DataResponse; 0] = [];
        assert_eq!(aggregate_status_source(&batch), StatusSource::Plugin);
    }

    #[test]
    fn test_all_ok_defaults_to_plugin() {
        let batch = [ok(), ok()];
        assert_eq!(aggregate_status_source(&batch), StatusSource::Plugin);
    }

    #[test]
    fn test_plugin_error_outranks_downstream_error() {
        let batch = [plugin_error(), downstream_error()];
        assert_eq!(aggregate_status_source(&batch), StatusSource::Plugin);

        // Regardless of ordering.
        let batch = [downstream_error(), plugin_error()];
        assert_eq!(aggregate_status_source(&batch), StatusSource::Plugin);
    }

    #[test]
    fn test_downstream_error_outranks_ok() {
        let batch = [ok(), downstream_error()];
        assert_eq!(aggregate_status_source(&batch), StatusSource::Downstream);
    }

    #[test]
    fn test_only_downstream_errors_classify_downstream() {
        let batch = [downstream_error(), downstream_error()];
        assert_eq!(aggregate_status_source(&batch), StatusSource::Downstream);
    }

    #[test]
    fn test_legacy_error_classifies_as_plugin() {
        let batch = [legacy_error()];
        assert_eq!(aggregate_status_source(&batch), StatusSource::Plugin);

        let batch = [ok(), legacy_error()];
        assert_eq!(aggregate_status_source(&batch), StatusSource::Plugin);

        let batch = [downstream_error(), legacy_error()];
        assert_eq!(aggregate_status_source(&batch), StatusSource::Plugin);
    }

    #[test]
    fn test_plugin_error_outranks_ok() {
        let batch = [ok(), plugin_error()];
        assert_eq!(aggregate_status_source(&batch), StatusSource::Plugin);
    }
}

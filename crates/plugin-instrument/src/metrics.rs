//! Plugin request metrics recording.
//!
//! All metrics follow Prometheus naming conventions:
//! - `beacon_plugin_` prefix
//! - `_total` suffix for counters
//! - `_milliseconds` / `_seconds` / `_bytes` suffixes for histograms
//!
//! # Cardinality
//!
//! Labels are bounded to prevent cardinality explosion:
//! - `endpoint`: 4 values (the four plugin operations)
//! - `status`: 3 values (ok, error, cancelled)
//! - `target`: 3 values (unknown, in_process, separate_process)
//! - `status_source`: 2 values (plugin, downstream)
//! - `plugin_id`: bounded by the installed plugin set
//!
//! The label schema is resolved once at construction from the feature
//! toggles: with `plugin_status_source_labels` off, the request counter and
//! size histogram are registered without a `status_source` label name, so a
//! metric name never carries two label shapes at once. Flipping the toggle
//! requires a restart.
//!
//! # Failure semantics
//!
//! Recording never affects the wrapped operation: a cardinality mismatch is
//! a programming defect, surfaced through the
//! `beacon_plugin_metrics_recording_failures_total` counter and a warning
//! log, while the caller receives the inner result unchanged.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant};

use common::config::{FeatureToggles, TOGGLE_PLUGIN_STATUS_SOURCE_LABELS};
use common::types::PluginId;
use plugin_client::request::{
    CallResourceRequest, CallResourceResponse, CheckHealthRequest, CheckHealthResponse,
    CollectMetricsRequest, CollectMetricsResponse, QueryDataRequest, QueryDataResponse,
};
use plugin_client::{
    CallContext, ClientMiddleware, ClientResult, Endpoint, PluginClient, PluginClientError,
    StatusSource, Target,
};
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry};

/// Request counter metric name.
pub const METRIC_REQUEST_TOTAL: &str = "beacon_plugin_request_total";
/// Millisecond-bucketed duration histogram metric name.
pub const METRIC_REQUEST_DURATION_MS: &str = "beacon_plugin_request_duration_milliseconds";
/// Second-bucketed duration histogram metric name.
pub const METRIC_REQUEST_DURATION_S: &str = "beacon_plugin_request_duration_seconds";
/// Request payload size histogram metric name.
pub const METRIC_REQUEST_SIZE: &str = "beacon_plugin_request_size_bytes";
/// Internal recording-failure counter metric name.
pub const METRIC_RECORDING_FAILURES: &str = "beacon_plugin_metrics_recording_failures_total";

/// Label value for the payload source on the size histogram.
pub const PAYLOAD_SOURCE_BACKEND: &str = "backend";

const MS_BUCKETS: &[f64] = &[
    1.0, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 2500.0, 5000.0, 10000.0,
];

/// Completion status of a plugin request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestStatus {
    /// The operation returned a result.
    Ok,
    /// The operation returned an error.
    Error,
    /// The operation was cancelled before producing a result.
    Cancelled,
}

impl RequestStatus {
    /// Returns the status as a string for metric labels.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Ok => "ok",
            RequestStatus::Error => "error",
            RequestStatus::Cancelled => "cancelled",
        }
    }

    /// Derive the status label from an operation result.
    #[must_use]
    pub fn from_result<T>(result: &ClientResult<T>) -> Self {
        match result {
            Ok(_) => RequestStatus::Ok,
            Err(PluginClientError::Cancelled) => RequestStatus::Cancelled,
            Err(_) => RequestStatus::Error,
        }
    }
}

/// One completed invocation, ready to record.
#[derive(Debug)]
pub struct RequestSample<'a> {
    /// Plugin that served the request.
    pub plugin_id: &'a PluginId,
    /// Operation kind.
    pub endpoint: Endpoint,
    /// Plugin deployment target.
    pub target: Target,
    /// Completion status.
    pub status: RequestStatus,
    /// Status source classification from the call metadata.
    pub status_source: StatusSource,
    /// Wall-clock duration of the inner call.
    pub duration: Duration,
    /// Request payload size, for payload-carrying endpoints only.
    pub payload_bytes: Option<usize>,
}

/// Prometheus aggregate for plugin request instrumentation.
///
/// Owned by the server process for its lifetime and passed by reference
/// into middleware construction; there is no process-wide singleton.
/// Fields are public so tests can query series directly.
pub struct PluginMetrics {
    /// Requests by (plugin, endpoint, status, target[, status source]).
    pub request_total: IntCounterVec,
    /// Request duration in milliseconds.
    pub request_duration_ms: HistogramVec,
    /// Request duration in seconds.
    pub request_duration_s: HistogramVec,
    /// Request payload size in bytes, payload-carrying endpoints only.
    pub request_size: HistogramVec,
    /// Internal recording failures; any non-zero value is a defect.
    pub recording_failures: IntCounter,
    status_source_labels: bool,
}

impl PluginMetrics {
    /// Create and register all plugin request metrics.
    ///
    /// The status-source toggle is read here, once; it decides the label
    /// schema for the lifetime of this value.
    ///
    /// # Errors
    ///
    /// Returns an error if registration fails (e.g. a metric with the same
    /// name is already registered).
    pub fn new(registry: &Registry, toggles: &FeatureToggles) -> Result<Self, prometheus::Error> {
        let status_source_labels = toggles.is_enabled(TOGGLE_PLUGIN_STATUS_SOURCE_LABELS);

        let mut counter_labels = vec!["plugin_id", "endpoint", "status", "target"];
        let mut size_labels = vec!["plugin_id", "endpoint", "target", "source"];
        if status_source_labels {
            counter_labels.push("status_source");
            size_labels.push("status_source");
        }

        let request_total = IntCounterVec::new(
            Opts::new(METRIC_REQUEST_TOTAL, "Total plugin requests"),
            counter_labels.as_slice(),
        )?;
        let request_duration_ms = HistogramVec::new(
            HistogramOpts::new(
                METRIC_REQUEST_DURATION_MS,
                "Plugin request duration in milliseconds",
            )
            .buckets(MS_BUCKETS.to_vec()),
            &["plugin_id", "endpoint", "status", "target"],
        )?;
        let request_duration_s = HistogramVec::new(
            HistogramOpts::new(
                METRIC_REQUEST_DURATION_S,
                "Plugin request duration in seconds",
            ),
            &["plugin_id", "endpoint", "status", "target"],
        )?;
        let request_size = HistogramVec::new(
            HistogramOpts::new(
                METRIC_REQUEST_SIZE,
                "Plugin request payload size in bytes",
            )
            .buckets(prometheus::exponential_buckets(128.0, 2.0, 12)?),
            size_labels.as_slice(),
        )?;
        let recording_failures = IntCounter::new(
            METRIC_RECORDING_FAILURES,
            "Total plugin metrics recording failures",
        )?;

        registry.register(Box::new(request_total.clone()))?;
        registry.register(Box::new(request_duration_ms.clone()))?;
        registry.register(Box::new(request_duration_s.clone()))?;
        registry.register(Box::new(request_size.clone()))?;
        registry.register(Box::new(recording_failures.clone()))?;

        Ok(Self {
            request_total,
            request_duration_ms,
            request_duration_s,
            request_size,
            recording_failures,
            status_source_labels,
        })
    }

    /// Whether the status-source label is part of the schema.
    #[must_use]
    pub fn status_source_labels(&self) -> bool {
        self.status_source_labels
    }

    /// Record one completed invocation.
    ///
    /// Never fails from the caller's perspective: internal errors are
    /// counted and logged.
    pub fn record(&self, sample: &RequestSample<'_>) {
        if let Err(error) = self.observe(sample) {
            self.recording_failures.inc();
            tracing::warn!(
                target: "plugin.instrument.metrics",
                plugin_id = %sample.plugin_id,
                endpoint = %sample.endpoint,
                error = %error,
                "Failed to record plugin request metrics"
            );
        }
    }

    fn observe(&self, sample: &RequestSample<'_>) -> Result<(), prometheus::Error> {
        let plugin_id = sample.plugin_id.as_str();
        let endpoint = sample.endpoint.as_str();
        let status = sample.status.as_str();
        let target = sample.target.as_str();

        let mut counter_values = vec![plugin_id, endpoint, status, target];
        if self.status_source_labels {
            counter_values.push(sample.status_source.as_str());
        }
        self.request_total
            .get_metric_with_label_values(counter_values.as_slice())?
            .inc();

        let duration_values = [plugin_id, endpoint, status, target];
        self.request_duration_ms
            .get_metric_with_label_values(&duration_values)?
            .observe(sample.duration.as_secs_f64() * 1000.0);
        self.request_duration_s
            .get_metric_with_label_values(&duration_values)?
            .observe(sample.duration.as_secs_f64());

        if let Some(bytes) = sample.payload_bytes {
            let mut size_values = vec![plugin_id, endpoint, target, PAYLOAD_SOURCE_BACKEND];
            if self.status_source_labels {
                size_values.push(sample.status_source.as_str());
            }
            #[allow(clippy::cast_precision_loss)]
            self.request_size
                .get_metric_with_label_values(size_values.as_slice())?
                .observe(bytes as f64);
        }

        Ok(())
    }

    /// Remove all recorded series.
    ///
    /// For tests only: not safe to call concurrently with in-flight
    /// recordings; tests serialize around it.
    pub fn reset(&self) {
        self.request_total.reset();
        self.request_duration_ms.reset();
        self.request_duration_s.reset();
        self.request_size.reset();
        self.recording_failures.reset();
    }
}

/// Middleware constructor for metrics recording.
pub struct MetricsMiddleware {
    metrics: Arc<PluginMetrics>,
}

impl MetricsMiddleware {
    /// Create the middleware, registering its metrics with `registry`.
    ///
    /// # Errors
    ///
    /// Returns an error if metric registration fails.
    pub fn new(registry: &Registry, toggles: &FeatureToggles) -> Result<Self, prometheus::Error> {
        Ok(Self {
            metrics: Arc::new(PluginMetrics::new(registry, toggles)?),
        })
    }

    /// Handle to the underlying metrics aggregate.
    #[must_use]
    pub fn metrics(&self) -> Arc<PluginMetrics> {
        Arc::clone(&self.metrics)
    }
}

impl ClientMiddleware for MetricsMiddleware {
    fn wrap(&self, next: Arc<dyn PluginClient>) -> Arc<dyn PluginClient> {
        Arc::new(MetricsClient {
            metrics: Arc::clone(&self.metrics),
            next,
        })
    }
}

struct MetricsClient {
    metrics: Arc<PluginMetrics>,
    next: Arc<dyn PluginClient>,
}

impl MetricsClient {
    fn record<T>(
        &self,
        ctx: &CallContext,
        endpoint: Endpoint,
        plugin_id: &PluginId,
        target: Target,
        started: Instant,
        payload_bytes: Option<usize>,
        result: &ClientResult<T>,
    ) {
        // The status source was written into the call metadata by an inner
        // middleware before the inner call returned.
        let status_source = ctx
            .meta()
            .map_or(StatusSource::Plugin, |meta| meta.status_source());
        self.metrics.record(&RequestSample {
            plugin_id,
            endpoint,
            target,
            status: RequestStatus::from_result(result),
            status_source,
            duration: started.elapsed(),
            payload_bytes,
        });
    }
}

#[async_trait]
impl PluginClient for MetricsClient {
    async fn check_health(
        &self,
        ctx: &CallContext,
        req: &CheckHealthRequest,
    ) -> ClientResult<CheckHealthResponse> {
        let started = Instant::now();
        let result = self.next.check_health(ctx, req).await;
        self.record(
            ctx,
            Endpoint::CheckHealth,
            &req.context.plugin_id,
            req.context.target,
            started,
            None,
            &result,
        );
        result
    }

    async fn call_resource(
        &self,
        ctx: &CallContext,
        req: &CallResourceRequest,
    ) -> ClientResult<CallResourceResponse> {
        let started = Instant::now();
        let result = self.next.call_resource(ctx, req).await;
        self.record(
            ctx,
            Endpoint::CallResource,
            &req.context.plugin_id,
            req.context.target,
            started,
            Some(req.payload_bytes()),
            &result,
        );
        result
    }

    async fn query_data(
        &self,
        ctx: &CallContext,
        req: &QueryDataRequest,
    ) -> ClientResult<QueryDataResponse> {
        let started = Instant::now();
        let result = self.next.query_data(ctx, req).await;
        self.record(
            ctx,
            Endpoint::QueryData,
            &req.context.plugin_id,
            req.context.target,
            started,
            Some(req.payload_bytes()),
            &result,
        );
        result
    }

    async fn collect_metrics(
        &self,
        ctx: &CallContext,
        req: &CollectMetricsRequest,
    ) -> ClientResult<CollectMetricsResponse> {
        let started = Instant::now();
        let result = self.next.collect_metrics(ctx, req).await;
        self.record(
            ctx,
            Endpoint::CollectMetrics,
            &req.context.plugin_id,
            req.context.target,
            started,
            None,
            &result,
        );
        result
    }
}

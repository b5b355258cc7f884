//! Integration tests for the plugin instrumentation middleware chain.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use common::config::{FeatureToggles, TOGGLE_PLUGIN_STATUS_SOURCE_LABELS};
use plugin_client::{CallContext, ClientMiddleware, Endpoint, StatusSource};
use plugin_instrument::metrics::{
    MetricsMiddleware, METRIC_REQUEST_DURATION_MS, METRIC_REQUEST_DURATION_S,
    METRIC_REQUEST_SIZE, METRIC_REQUEST_TOTAL, PAYLOAD_SOURCE_BACKEND,
};
use plugin_instrument::notices::{Notice, NoticeSink};
use plugin_instrument::request_meta::RequestMetaMiddleware;
use plugin_instrument::status_source::StatusSourceMiddleware;
use plugin_test_utils::{fixtures, DecoratorRig};
use prometheus::Registry;

const PLUGIN_ID: &str = "test-datasource";

// ============================================================================
// Helpers
// ============================================================================

/// Notice sink that records deliveries for assertions.
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

/// Number of series currently recorded for the named metric family.
fn series_count(registry: &Registry, name: &str) -> usize {
    registry
        .gather()
        .iter()
        .find(|family| family.get_name() == name)
        .map_or(0, |family| family.get_metric().len())
}

/// Check that a histogram with the given name carries a series matching all
/// expected labels and that at least one sample has been observed.
fn check_histogram(
    registry: &Registry,
    name: &str,
    expected_labels: &HashMap<&str, &str>,
) -> Result<(), String> {
    let families = registry.gather();
    let family = families
        .iter()
        .find(|family| family.get_name() == name)
        .ok_or_else(|| format!("metric {name:?} not found"))?;

    for metric in family.get_metric() {
        let labels: HashMap<&str, &str> = metric
            .get_label()
            .iter()
            .map(|pair| (pair.get_name(), pair.get_value()))
            .collect();
        let all_match = expected_labels
            .iter()
            .all(|(key, value)| labels.get(key) == Some(value));
        if !all_match {
            continue;
        }
        let sample_count = metric.get_histogram().get_sample_count();
        if sample_count == 0 {
            return Err("found metric but no samples have been collected".to_string());
        }
        return Ok(());
    }
    Err(format!(
        "could not find series of {name:?} with labels {expected_labels:?}"
    ))
}

struct InstrumentedRig {
    registry: Registry,
    metrics: Arc<plugin_instrument::metrics::PluginMetrics>,
    rig: DecoratorRig,
}

/// Build a rig with the full instrumentation chain: request metadata,
/// metrics, status source classification.
fn instrumented_rig(toggles: &FeatureToggles) -> InstrumentedRig {
    let registry = Registry::new();
    let metrics_middleware = MetricsMiddleware::new(&registry, toggles).unwrap();
    let metrics = metrics_middleware.metrics();
    let middlewares: Vec<Arc<dyn ClientMiddleware>> = vec![
        Arc::new(RequestMetaMiddleware::new()),
        Arc::new(metrics_middleware),
        Arc::new(StatusSourceMiddleware::new()),
    ];
    InstrumentedRig {
        registry,
        metrics,
        rig: DecoratorRig::new(&middlewares),
    }
}

// ============================================================================
// Endpoint instrumentation
// ============================================================================

#[tokio::test]
async fn test_instruments_all_four_endpoints() {
    struct Case {
        endpoint: Endpoint,
        should_instrument_request_size: bool,
    }

    for case in [
        Case {
            endpoint: Endpoint::CheckHealth,
            should_instrument_request_size: false,
        },
        Case {
            endpoint: Endpoint::CallResource,
            should_instrument_request_size: true,
        },
        Case {
            endpoint: Endpoint::QueryData,
            should_instrument_request_size: true,
        },
        Case {
            endpoint: Endpoint::CollectMetrics,
            should_instrument_request_size: false,
        },
    ] {
        let setup = instrumented_rig(&FeatureToggles::none());
        let ctx = CallContext::new();

        match case.endpoint {
            Endpoint::CheckHealth => {
                setup
                    .rig
                    .decorated
                    .check_health(&ctx, &fixtures::check_health_request(PLUGIN_ID))
                    .await
                    .unwrap();
            }
            Endpoint::CallResource => {
                setup
                    .rig
                    .decorated
                    .call_resource(&ctx, &fixtures::call_resource_request(PLUGIN_ID))
                    .await
                    .unwrap();
            }
            Endpoint::QueryData => {
                setup
                    .rig
                    .decorated
                    .query_data(&ctx, &fixtures::query_data_request(PLUGIN_ID))
                    .await
                    .unwrap();
            }
            Endpoint::CollectMetrics => {
                setup
                    .rig
                    .decorated
                    .collect_metrics(&ctx, &fixtures::collect_metrics_request(PLUGIN_ID))
                    .await
                    .unwrap();
            }
        }

        let endpoint = case.endpoint.as_str();
        assert_eq!(
            series_count(&setup.registry, METRIC_REQUEST_TOTAL),
            1,
            "{endpoint}: request counter should have exactly one series"
        );
        assert_eq!(series_count(&setup.registry, METRIC_REQUEST_DURATION_MS), 1);
        assert_eq!(series_count(&setup.registry, METRIC_REQUEST_DURATION_S), 1);

        let counter = setup
            .metrics
            .request_total
            .get_metric_with_label_values(&[PLUGIN_ID, endpoint, "ok", "unknown"])
            .unwrap();
        assert_eq!(counter.get(), 1, "{endpoint}: one ok request recorded");

        let duration_labels = HashMap::from([
            ("plugin_id", PLUGIN_ID),
            ("endpoint", endpoint),
            ("target", "unknown"),
        ]);
        for name in [METRIC_REQUEST_DURATION_MS, METRIC_REQUEST_DURATION_S] {
            check_histogram(&setup.registry, name, &duration_labels).unwrap();
        }

        if case.should_instrument_request_size {
            assert_eq!(
                series_count(&setup.registry, METRIC_REQUEST_SIZE),
                1,
                "{endpoint}: request size should have been instrumented"
            );
            let size_labels = HashMap::from([
                ("plugin_id", PLUGIN_ID),
                ("endpoint", endpoint),
                ("target", "unknown"),
                ("source", PAYLOAD_SOURCE_BACKEND),
            ]);
            check_histogram(&setup.registry, METRIC_REQUEST_SIZE, &size_labels).unwrap();
        } else {
            assert_eq!(
                series_count(&setup.registry, METRIC_REQUEST_SIZE),
                0,
                "{endpoint}: request size should not have been instrumented"
            );
        }
    }
}

#[tokio::test]
async fn test_errors_are_returned_unchanged_and_recorded() {
    let setup = instrumented_rig(&FeatureToggles::none());
    setup.rig.client.on_query_data(|_ctx, _req| {
        Err(plugin_client::PluginClientError::RequestFailed(
            "connection refused".to_string(),
        ))
    });

    let result = setup
        .rig
        .decorated
        .query_data(&CallContext::new(), &fixtures::query_data_request(PLUGIN_ID))
        .await;
    assert_eq!(
        result.unwrap_err(),
        plugin_client::PluginClientError::RequestFailed("connection refused".to_string())
    );

    let counter = setup
        .metrics
        .request_total
        .get_metric_with_label_values(&[PLUGIN_ID, "query_data", "error", "unknown"])
        .unwrap();
    assert_eq!(counter.get(), 1);
}

#[tokio::test]
async fn test_cancelled_calls_are_recorded_distinctly() {
    let setup = instrumented_rig(&FeatureToggles::none());
    setup
        .rig
        .client
        .on_query_data(|_ctx, _req| Err(plugin_client::PluginClientError::Cancelled));

    let result = setup
        .rig
        .decorated
        .query_data(&CallContext::new(), &fixtures::query_data_request(PLUGIN_ID))
        .await;
    assert!(result.unwrap_err().is_cancelled());

    let counter = setup
        .metrics
        .request_total
        .get_metric_with_label_values(&[PLUGIN_ID, "query_data", "cancelled", "unknown"])
        .unwrap();
    assert_eq!(counter.get(), 1);
}

// ============================================================================
// Status source labeling
// ============================================================================

#[tokio::test]
async fn test_ignores_status_source_when_toggle_disabled() {
    let setup = instrumented_rig(&FeatureToggles::none());
    setup.rig.client.on_query_data(|_ctx, _req| {
        Ok(fixtures::batch([(
            "A",
            fixtures::downstream_error_response(),
        )]))
    });

    setup
        .rig
        .decorated
        .query_data(&CallContext::new(), &fixtures::query_data_request(PLUGIN_ID))
        .await
        .unwrap();

    let base_labels = HashMap::from([
        ("plugin_id", PLUGIN_ID),
        ("endpoint", "query_data"),
        ("status", "ok"),
        ("target", "unknown"),
    ]);
    let counter = setup.metrics.request_total.get_metric_with(&base_labels).unwrap();
    assert_eq!(counter.get(), 1);

    // status_source must not be defined at all.
    let mut with_status_source = base_labels.clone();
    with_status_source.insert("status_source", "downstream");
    let err = setup
        .metrics
        .request_total
        .get_metric_with(&with_status_source)
        .unwrap_err();
    assert!(matches!(
        err,
        prometheus::Error::InconsistentCardinality { .. }
    ));
}

#[tokio::test]
async fn test_adds_status_source_label_when_toggle_enabled() {
    let toggles = FeatureToggles::with_toggles([TOGGLE_PLUGIN_STATUS_SOURCE_LABELS]);
    let setup = instrumented_rig(&toggles);
    setup.rig.client.on_query_data(|_ctx, _req| {
        Ok(fixtures::batch([(
            "A",
            fixtures::downstream_error_response(),
        )]))
    });

    setup
        .rig
        .decorated
        .query_data(&CallContext::new(), &fixtures::query_data_request(PLUGIN_ID))
        .await
        .unwrap();

    let labels = HashMap::from([
        ("plugin_id", PLUGIN_ID),
        ("endpoint", "query_data"),
        ("status", "ok"),
        ("target", "unknown"),
        ("status_source", "downstream"),
    ]);
    let counter = setup.metrics.request_total.get_metric_with(&labels).unwrap();
    assert_eq!(counter.get(), 1);
}

// ============================================================================
// Classification priority
// ============================================================================

#[tokio::test]
async fn test_status_source_priority() {
    struct Case {
        name: &'static str,
        batch: Vec<(&'static str, plugin_client::request::DataResponse)>,
        expected: StatusSource,
    }

    let cases = vec![
        Case {
            name: "default status source for ok responses is plugin",
            batch: vec![("A", fixtures::ok_response())],
            expected: StatusSource::Plugin,
        },
        Case {
            name: "plugin errors outrank downstream errors",
            batch: vec![
                ("A", fixtures::plugin_error_response()),
                ("B", fixtures::downstream_error_response()),
            ],
            expected: StatusSource::Plugin,
        },
        Case {
            name: "errors without a declared source classify as plugin",
            batch: vec![("A", fixtures::legacy_error_response())],
            expected: StatusSource::Plugin,
        },
        Case {
            name: "downstream errors outrank ok responses",
            batch: vec![
                ("A", fixtures::ok_response()),
                ("B", fixtures::downstream_error_response()),
            ],
            expected: StatusSource::Downstream,
        },
        Case {
            name: "plugin errors outrank ok responses",
            batch: vec![
                ("A", fixtures::ok_response()),
                ("B", fixtures::plugin_error_response()),
            ],
            expected: StatusSource::Plugin,
        },
        Case {
            name: "legacy errors outrank ok responses",
            batch: vec![
                ("A", fixtures::ok_response()),
                ("B", fixtures::legacy_error_response()),
            ],
            expected: StatusSource::Plugin,
        },
    ];

    for case in cases {
        let setup = instrumented_rig(&FeatureToggles::none());
        let batch = case.batch.clone();
        setup.rig.client.on_query_data(move |_ctx, _req| {
            let mut response = plugin_client::request::QueryDataResponse::empty();
            for (ref_id, data_response) in &batch {
                response = response.with_response(*ref_id, data_response.clone());
            }
            Ok(response)
        });

        setup
            .rig
            .decorated
            .query_data(&CallContext::new(), &fixtures::query_data_request(PLUGIN_ID))
            .await
            .unwrap();

        let recorded_ctx = setup
            .rig
            .client
            .last_query_context()
            .expect("inner client saw the call context");
        let meta = recorded_ctx.meta().expect("metadata attached by the chain");
        assert_eq!(meta.status_source(), case.expected, "{}", case.name);

        // One invocation, one increment, regardless of batch contents.
        assert_eq!(series_count(&setup.registry, METRIC_REQUEST_TOTAL), 1);
        let counter = setup
            .metrics
            .request_total
            .get_metric_with_label_values(&[PLUGIN_ID, "query_data", "ok", "unknown"])
            .unwrap();
        assert_eq!(counter.get(), 1, "{}", case.name);
    }
}

// ============================================================================
// Notices
// ============================================================================

#[tokio::test]
async fn test_default_stack_notifies_once_for_repeated_failures() {
    let registry = Registry::new();
    let sink = Arc::new(RecordingSink::default());
    let middlewares = plugin_instrument::default_stack(
        &registry,
        &FeatureToggles::none(),
        Arc::clone(&sink) as Arc<dyn NoticeSink>,
    )
    .unwrap();
    let rig = DecoratorRig::new(&middlewares);

    rig.client.on_call_resource(|_ctx, _req| {
        Err(plugin_client::PluginClientError::RequestFailed(
            "autocomplete failed".to_string(),
        ))
    });

    let req = fixtures::call_resource_request(PLUGIN_ID);
    for _ in 0..4 {
        let result = rig.decorated.call_resource(&CallContext::new(), &req).await;
        assert!(result.is_err());
    }

    assert_eq!(
        rig.client.call_resource_calls(),
        4,
        "every call must reach the inner client"
    );
    let notices = sink.notices();
    assert_eq!(notices.len(), 1, "only one user-facing notice");
    assert_eq!(notices.first().unwrap().endpoint, Endpoint::CallResource);
}

// ============================================================================
// Concurrency
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_invocations_aggregate() {
    const CALLS: usize = 64;

    let setup = instrumented_rig(&FeatureToggles::none());
    let decorated = Arc::clone(&setup.rig.decorated);

    let mut handles = Vec::with_capacity(CALLS);
    for _ in 0..CALLS {
        let decorated = Arc::clone(&decorated);
        handles.push(tokio::spawn(async move {
            decorated
                .query_data(&CallContext::new(), &fixtures::query_data_request(PLUGIN_ID))
                .await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let counter = setup
        .metrics
        .request_total
        .get_metric_with_label_values(&[PLUGIN_ID, "query_data", "ok", "unknown"])
        .unwrap();
    assert_eq!(counter.get(), CALLS as u64);
    assert_eq!(setup.rig.client.query_data_calls(), CALLS);
}

//! # Prometheus Metrics
//!
//! Operational metrics for the custody node, scraped at `/metrics` on the
//! metrics port.
//!
//! All metrics live in a dedicated [`prometheus::Registry`] with the `reit`
//! prefix so they do not collide with any default global registry consumers.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::sync::Arc;

/// Holds all Prometheus metric handles for the node.
#[derive(Clone)]
pub struct NodeMetrics {
    registry: Registry,
    /// Engine calls made through the API, by operation and outcome.
    pub operations_total: IntCounterVec,
    /// Smallest units credited by successful buys.
    pub units_bought_total: IntCounter,
    /// Smallest units burned by successful sells.
    pub units_sold_total: IntCounter,
    /// Payment tokens moved into vaults by buys.
    pub payments_received_total: IntCounter,
    /// Payment tokens paid out of vaults by sells.
    pub proceeds_paid_total: IntCounter,
    /// Requests whose envelope signature did not verify.
    pub rejected_signatures_total: IntCounter,
    /// Verified envelopes refused because their nonce was already used.
    pub replayed_envelopes_total: IntCounter,
    /// Time spent inside engine calls, in seconds.
    pub operation_latency_seconds: Histogram,
}

impl NodeMetrics {
    /// Creates and registers all metrics. Call once at startup.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("reit".into()), None)?;

        let operations_total = IntCounterVec::new(
            Opts::new(
                "operations_total",
                "Engine operations submitted through the API",
            ),
            &["operation", "outcome"],
        )?;
        registry.register(Box::new(operations_total.clone()))?;

        let units_bought_total =
            IntCounter::new("units_bought_total", "Smallest units credited by buys")?;
        registry.register(Box::new(units_bought_total.clone()))?;

        let units_sold_total =
            IntCounter::new("units_sold_total", "Smallest units burned by sells")?;
        registry.register(Box::new(units_sold_total.clone()))?;

        let payments_received_total = IntCounter::new(
            "payments_received_total",
            "Payment tokens moved into scheme vaults",
        )?;
        registry.register(Box::new(payments_received_total.clone()))?;

        let proceeds_paid_total = IntCounter::new(
            "proceeds_paid_total",
            "Payment tokens paid out of scheme vaults",
        )?;
        registry.register(Box::new(proceeds_paid_total.clone()))?;

        let rejected_signatures_total = IntCounter::new(
            "rejected_signatures_total",
            "Requests rejected because the envelope signature did not verify",
        )?;
        registry.register(Box::new(rejected_signatures_total.clone()))?;

        let replayed_envelopes_total = IntCounter::new(
            "replayed_envelopes_total",
            "Signed envelopes refused because their nonce was already used",
        )?;
        registry.register(Box::new(replayed_envelopes_total.clone()))?;

        let operation_latency_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "operation_latency_seconds",
                "Time spent inside engine operations in seconds",
            )
            .buckets(vec![
                0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0,
            ]),
        )?;
        registry.register(Box::new(operation_latency_seconds.clone()))?;

        Ok(Self {
            registry,
            operations_total,
            units_bought_total,
            units_sold_total,
            payments_received_total,
            proceeds_paid_total,
            rejected_signatures_total,
            replayed_envelopes_total,
            operation_latency_seconds,
        })
    }

    /// Count one engine call under `operation`.
    pub fn record(&self, operation: &str, ok: bool) {
        let outcome = if ok { "ok" } else { "rejected" };
        self.operations_total
            .with_label_values(&[operation, outcome])
            .inc();
    }

    /// Encodes all registered metrics into the Prometheus text exposition format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

/// Shared metrics state passed to axum handlers.
pub type SharedMetrics = Arc<NodeMetrics>;

/// Router serving `/metrics` alone, for the dedicated metrics port.
pub fn router(metrics: SharedMetrics) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(metrics)
}

/// Axum handler that renders `/metrics` in Prometheus text format.
pub async fn metrics_handler(State(metrics): State<SharedMetrics>) -> impl IntoResponse {
    match metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!("failed to encode metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "metrics encoding failed").into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    #[test]
    fn counters_show_up_in_exposition() {
        let metrics = NodeMetrics::new().unwrap();
        metrics.record("buy", true);
        metrics.record("buy", false);
        metrics.units_bought_total.inc_by(42);

        let text = metrics.encode().unwrap();
        assert!(text.contains("reit_operations_total{operation=\"buy\",outcome=\"ok\"} 1"));
        assert!(text.contains("reit_operations_total{operation=\"buy\",outcome=\"rejected\"} 1"));
        assert!(text.contains("reit_units_bought_total 42"));
    }

    #[tokio::test]
    async fn metrics_endpoint_serves_text() {
        let metrics = Arc::new(NodeMetrics::new().unwrap());
        metrics.units_sold_total.inc();

        let resp = router(metrics)
            .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let body = resp.into_body().collect().await.unwrap().to_bytes();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.contains("reit_units_sold_total 1"));
    }
}

//! Prometheus /metrics + health check HTTP endpoints
//!
//! Endpoints:
//!   GET /metrics  Prometheus text format
//!   GET /healthz  Liveness probe (always 200 if process is running)
//!   GET /readyz   Readiness probe (200 if storage is reachable)

use anyhow::Result;
use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Router};
use prometheus_client::{
    encoding::text::encode,
    metrics::{counter::Counter, family::Family, histogram::Histogram},
    registry::Registry,
};
use sealfile_core::SealError;
use std::sync::Arc;

type Labels = Vec<(String, String)>;

/// Per-operation counters, shared between the gRPC handlers.
#[derive(Clone)]
pub struct Metrics {
    requests: Family<Labels, Counter>,
    bytes_in: Family<Labels, Counter>,
    bytes_out: Family<Labels, Counter>,
    duration: Family<Labels, Histogram>,
}

impl Metrics {
    pub fn new(registry: &mut Registry) -> Self {
        let requests = Family::default();
        let bytes_in = Family::default();
        let bytes_out = Family::default();
        let duration = Family::<Labels, Histogram>::new_with_constructor(|| {
            Histogram::new([0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 30.0])
        });

        registry.register(
            "sealfile_requests",
            "Requests handled, by operation and outcome",
            requests.clone(),
        );
        registry.register(
            "sealfile_bytes_in",
            "Payload bytes received, by operation",
            bytes_in.clone(),
        );
        registry.register(
            "sealfile_bytes_out",
            "Payload bytes returned, by operation",
            bytes_out.clone(),
        );
        registry.register(
            "sealfile_request_duration_seconds",
            "Request handling time in seconds",
            duration.clone(),
        );

        Self {
            requests,
            bytes_in,
            bytes_out,
            duration,
        }
    }

    /// Record one finished request. `outcome` is `ok` or an error kind.
    pub fn observe<T>(
        &self,
        op: &str,
        result: &Result<T, SealError>,
        bytes_in: usize,
        bytes_out: usize,
        elapsed: std::time::Duration,
    ) {
        let outcome = match result {
            Ok(_) => "ok",
            Err(e) => e.kind().as_str(),
        };
        self.requests
            .get_or_create(&vec![
                ("op".to_string(), op.to_string()),
                ("outcome".to_string(), outcome.to_string()),
            ])
            .inc();

        let labels = op_labels(op);
        self.bytes_in.get_or_create(&labels).inc_by(bytes_in as u64);
        self.bytes_out.get_or_create(&labels).inc_by(bytes_out as u64);
        self.duration
            .get_or_create(&labels)
            .observe(elapsed.as_secs_f64());
    }
}

fn op_labels(op: &str) -> Labels {
    vec![("op".to_string(), op.to_string())]
}

/// Shared state for the HTTP handlers
#[derive(Clone)]
pub struct HealthState {
    pub registry: Arc<Registry>,
    pub store: sealfile_storage::OpendalStore,
}

/// Serve Prometheus metrics and health endpoints on `addr` (e.g. "127.0.0.1:9110")
pub async fn serve(addr: String, state: HealthState) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| anyhow::anyhow!("metrics bind {addr}: {e}"))?;

    tracing::info!(addr = %addr, "metrics: listening on /metrics, /healthz, /readyz");

    axum::serve(listener, router(state))
        .await
        .map_err(|e| anyhow::anyhow!("metrics server: {e}"))
}

fn router(state: HealthState) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/healthz", get(healthz_handler))
        .route("/readyz", get(readyz_handler))
        .with_state(state)
}

async fn metrics_handler(State(state): State<HealthState>) -> impl IntoResponse {
    let mut body = String::new();
    match encode(&mut body, &state.registry) {
        Ok(()) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4")],
            body,
        ),
        Err(e) => {
            tracing::error!("metrics encode failed: {e}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [("content-type", "text/plain")],
                e.to_string(),
            )
        }
    }
}

/// Liveness probe: returns 200 if the process is running.
async fn healthz_handler() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

/// Readiness probe: returns 200 if storage is reachable, 503 otherwise.
async fn readyz_handler(State(state): State<HealthState>) -> impl IntoResponse {
    match state.store.health().await {
        Ok(()) => (StatusCode::OK, "ready"),
        Err(_) => (StatusCode::SERVICE_UNAVAILABLE, "storage unreachable"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sealfile_core::ContentId;

    #[test]
    fn observe_labels_outcome_by_error_kind() {
        let mut registry = Registry::default();
        let metrics = Metrics::new(&mut registry);

        let ok: Result<(), SealError> = Ok(());
        let missing: Result<(), SealError> =
            Err(SealError::NotFound(ContentId::new("blake3:00")));
        metrics.observe("restore", &ok, 10, 5, std::time::Duration::from_millis(3));
        metrics.observe("restore", &missing, 10, 0, std::time::Duration::from_millis(1));

        let mut body = String::new();
        encode(&mut body, &registry).unwrap();
        assert!(body.contains(r#"sealfile_requests_total{op="restore",outcome="ok"} 1"#));
        assert!(body.contains(r#"sealfile_requests_total{op="restore",outcome="not_found"} 1"#));
        assert!(body.contains(r#"sealfile_bytes_in_total{op="restore"} 20"#));
    }

    #[tokio::test]
    async fn readyz_reflects_storage() {
        let state = HealthState {
            registry: Arc::new(Registry::default()),
            store: sealfile_storage::OpendalStore::memory().unwrap(),
        };
        let resp = readyz_handler(State(state)).await.into_response();
        assert_eq!(resp.status(), StatusCode::OK);
    }
}

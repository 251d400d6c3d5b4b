//! Health, readiness, stream monitoring and Prometheus endpoints.
//!
//! - `/health`, `/healthz`: liveness
//! - `/ready`, `/readyz`: every registered [`ReadinessProbe`] must pass
//! - `/stream/info`: backlog of the consumed stream and its DLQ
//! - `/metrics`: Prometheus text format

use async_trait::async_trait;
use axum::{
    Json, Router,
    extract::State,
    http::{StatusCode, header},
    response::IntoResponse,
    routing::get,
};
use redis::aio::ConnectionManager;
use serde::Serialize;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::config::WorkerConfig;
use crate::consumer::StreamConsumer;
use crate::dlq::DlqManager;
use crate::metrics;

/// A dependency that must be reachable before the worker reports ready.
#[async_trait]
pub trait ReadinessProbe: Send + Sync {
    fn name(&self) -> &'static str;

    async fn check(&self) -> Result<(), String>;
}

/// PING against the stream broker.
pub struct RedisProbe {
    redis: ConnectionManager,
}

impl RedisProbe {
    pub fn new(redis: ConnectionManager) -> Self {
        Self { redis }
    }
}

#[async_trait]
impl ReadinessProbe for RedisProbe {
    fn name(&self) -> &'static str {
        "redis"
    }

    async fn check(&self) -> Result<(), String> {
        let mut conn = self.redis.clone();
        match redis::cmd("PING").query_async::<String>(&mut conn).await {
            Ok(reply) if reply == "PONG" => Ok(()),
            Ok(reply) => Err(format!("unexpected response: {reply}")),
            Err(e) => Err(format!("error: {e}")),
        }
    }
}

/// Shared state for the health endpoints.
#[derive(Clone)]
pub struct HealthState {
    pub app_name: String,
    pub app_version: String,
    consumer: StreamConsumer,
    dlq: DlqManager,
    probes: Vec<Arc<dyn ReadinessProbe>>,
}

impl HealthState {
    /// Redis is always probed; add other dependencies with [`HealthState::with_probe`].
    pub fn new(
        redis: ConnectionManager,
        config: &WorkerConfig,
        app_name: impl Into<String>,
        app_version: impl Into<String>,
    ) -> Self {
        Self {
            app_name: app_name.into(),
            app_version: app_version.into(),
            consumer: StreamConsumer::new(redis.clone(), config.clone()),
            dlq: DlqManager::new(redis.clone(), config.dlq_stream.clone()),
            probes: vec![Arc::new(RedisProbe::new(redis))],
        }
    }

    pub fn with_probe(mut self, probe: impl ReadinessProbe + 'static) -> Self {
        self.probes.push(Arc::new(probe));
        self
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub name: String,
    pub version: String,
}

#[derive(Debug, Serialize)]
pub struct ReadinessReport {
    pub status: &'static str,
    pub checks: BTreeMap<&'static str, String>,
}

impl ReadinessReport {
    pub fn is_ready(&self) -> bool {
        self.status == "ready"
    }
}

/// Run every probe; the report is ready only if all of them pass.
pub async fn evaluate_probes(probes: &[Arc<dyn ReadinessProbe>]) -> ReadinessReport {
    let mut checks = BTreeMap::new();
    let mut ready = true;

    for probe in probes {
        let outcome = match probe.check().await {
            Ok(()) => "ok".to_string(),
            Err(reason) => {
                ready = false;
                reason
            }
        };
        checks.insert(probe.name(), outcome);
    }

    ReadinessReport {
        status: if ready { "ready" } else { "not_ready" },
        checks,
    }
}

pub async fn health_handler(State(state): State<HealthState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        name: state.app_name,
        version: state.app_version,
    })
}

pub async fn ready_handler(State(state): State<HealthState>) -> impl IntoResponse {
    let report = evaluate_probes(&state.probes).await;
    let status = if report.is_ready() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(report))
}

pub async fn stream_info_handler(State(state): State<HealthState>) -> impl IntoResponse {
    let stream = state.consumer.stream_info().await;
    let dlq = state.dlq.stats().await;

    match (stream, dlq) {
        (Ok(stream), Ok(dlq)) => (StatusCode::OK, Json(json!({ "stream": stream, "dlq": dlq }))),
        (Err(e), _) | (_, Err(e)) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": format!("Failed to get stream info: {e}") })),
        ),
    }
}

pub async fn metrics_handler() -> impl IntoResponse {
    match metrics::render_metrics() {
        Some(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        ),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            "metrics recorder not installed".to_string(),
        ),
    }
}

pub fn health_router(state: HealthState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/healthz", get(health_handler))
        .route("/ready", get(ready_handler))
        .route("/readyz", get(ready_handler))
        .route("/stream/info", get(stream_info_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedProbe {
        name: &'static str,
        result: Result<(), String>,
    }

    #[async_trait]
    impl ReadinessProbe for FixedProbe {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn check(&self) -> Result<(), String> {
            self.result.clone()
        }
    }

    fn probe(name: &'static str, result: Result<(), String>) -> Arc<dyn ReadinessProbe> {
        Arc::new(FixedProbe { name, result })
    }

    #[tokio::test]
    async fn test_all_probes_pass() {
        let report = evaluate_probes(&[probe("redis", Ok(())), probe("mongodb", Ok(()))]).await;

        assert!(report.is_ready());
        assert_eq!(report.checks["mongodb"], "ok");
    }

    #[tokio::test]
    async fn test_one_failing_probe_marks_not_ready() {
        let report = evaluate_probes(&[
            probe("redis", Ok(())),
            probe("mongodb", Err("server selection timeout".to_string())),
        ])
        .await;

        assert!(!report.is_ready());
        assert_eq!(report.checks["redis"], "ok");
        assert_eq!(report.checks["mongodb"], "server selection timeout");

        let body = serde_json::to_value(&report).unwrap();
        assert_eq!(body["status"], "not_ready");
    }

    #[test]
    fn test_health_response_serialization() {
        let response = HealthResponse {
            status: "healthy",
            name: "waste-report-worker".to_string(),
            version: "0.1.0".to_string(),
        };

        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("\"status\":\"healthy\""));
    }
}

//! HTTP API for health checks, module health and Prometheus metrics

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use engine_lib::{HealthState, HealthStatus, ModuleEngine};
use prometheus::{Encoder, TextEncoder};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<ModuleEngine>,
}

impl AppState {
    pub fn new(engine: Arc<ModuleEngine>) -> Self {
        Self { engine }
    }
}

/// Overall service status derived from cached module health
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceStatus {
    Healthy,
    /// Some modules are warning or critical, none failed
    Degraded,
    Unhealthy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LivenessResponse {
    pub status: ServiceStatus,
    pub modules: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub degraded: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failed: Vec<String>,
}

impl LivenessResponse {
    pub fn from_health(health: &[HealthStatus]) -> Self {
        let label = |h: &HealthStatus| match &h.tenant_id {
            Some(tenant) => format!("{}@{}", h.module_id, tenant),
            None => h.module_id.clone(),
        };
        let failed: Vec<String> = health
            .iter()
            .filter(|h| h.status == HealthState::Failed)
            .map(label)
            .collect();
        let degraded: Vec<String> = health
            .iter()
            .filter(|h| matches!(h.status, HealthState::Warning | HealthState::Critical))
            .map(label)
            .collect();

        let status = if !failed.is_empty() {
            ServiceStatus::Unhealthy
        } else if !degraded.is_empty() {
            ServiceStatus::Degraded
        } else {
            ServiceStatus::Healthy
        };

        Self {
            status,
            modules: health.len(),
            degraded,
            failed,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Liveness - 200 unless a module has failed, then 503
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = LivenessResponse::from_health(&state.engine.get_all_module_health());

    let status_code = match health.status {
        ServiceStatus::Healthy => StatusCode::OK,
        ServiceStatus::Degraded => StatusCode::OK, // Still operational
        ServiceStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health))
}

/// Readiness - 200 while the monitoring loop runs
async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let ready = state.engine.is_monitoring().await;
    let readiness = ReadinessResponse {
        ready,
        reason: (!ready).then(|| "health monitoring is not running".to_string()),
    };

    let status_code = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(readiness))
}

/// Cached health of every monitored module
async fn module_health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.engine.get_all_module_health())
}

/// Prometheus metrics endpoint
async fn metrics() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        error!(error = %e, "Failed to encode metrics");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            [("content-type", "text/plain; charset=utf-8")],
            Vec::new(),
        );
    }

    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        buffer,
    )
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .route("/modules/health", get(module_health))
        .with_state(state)
}

/// Start the API server, returning once `shutdown` resolves
pub async fn serve(
    addr: String,
    state: Arc<AppState>,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let app = create_router(state);

    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use chrono::{Duration, TimeZone, Utc};
    use engine_lib::{EngineBuilder, UsageSample};
    use std::time::Duration as StdDuration;
    use tower::ServiceExt;

    fn sample(module: &str, i: i64, response_time: f64) -> UsageSample {
        UsageSample {
            module_id: module.to_string(),
            tenant_id: "acme".to_string(),
            timestamp: Utc.timestamp_opt(1_700_000_000, 0).unwrap() + Duration::seconds(i),
            memory_usage: 256.0,
            cpu_usage: 40.0,
            storage_usage: 100.0,
            network_usage: 1.0,
            active_requests: 10,
            response_time,
            error_count: 0,
        }
    }

    fn setup_test_app() -> (Router, Arc<ModuleEngine>) {
        let engine = Arc::new(EngineBuilder::new().build());
        let router = create_router(Arc::new(AppState::new(engine.clone())));
        (router, engine)
    }

    async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn test_healthz_ok_without_modules() {
        let (app, _engine) = setup_test_app();
        let (status, body) = get_json(app, "/healthz").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["modules"], 0);
    }

    #[tokio::test]
    async fn test_healthz_unavailable_when_module_failed() {
        let (app, engine) = setup_test_app();
        for i in 0..3 {
            engine.record_resource_usage(sample("slow", i, 1500.0)).unwrap();
            engine.record_resource_usage(sample("fast", i, 100.0)).unwrap();
        }
        engine.register_instance("slow", Some("acme")).unwrap();
        engine.register_instance("fast", Some("acme")).unwrap();
        engine.run_health_checks().await;

        let (status, body) = get_json(app, "/healthz").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["status"], "unhealthy");
        assert_eq!(body["failed"][0], "slow@acme");
        assert_eq!(body["modules"], 2);
    }

    #[tokio::test]
    async fn test_healthz_ok_when_degraded() {
        let (app, engine) = setup_test_app();
        // Slow-ish, busy and leaking memory: warning, not failed
        for (i, memory) in [100.0, 200.0].iter().enumerate() {
            let mut s = sample("busy", i as i64, 800.0);
            s.cpu_usage = 70.0;
            s.memory_usage = *memory;
            engine.record_resource_usage(s).unwrap();
        }
        engine.register_instance("busy", Some("acme")).unwrap();
        let health = engine.get_module_health("busy", Some("acme")).unwrap();
        assert_eq!(health.status, HealthState::Warning);

        let (status, body) = get_json(app, "/healthz").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "degraded");
        assert_eq!(body["degraded"][0], "busy@acme");
    }

    #[tokio::test]
    async fn test_readyz_follows_monitoring() {
        let (app, engine) = setup_test_app();

        let (status, body) = get_json(app.clone(), "/readyz").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["ready"], false);
        assert!(body["reason"].is_string());

        engine.start_monitoring(StdDuration::from_secs(60)).await;
        let (status, body) = get_json(app, "/readyz").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ready"], true);

        engine.stop_monitoring().await;
    }

    #[tokio::test]
    async fn test_module_health_lists_cached_statuses() {
        let (app, engine) = setup_test_app();
        engine.record_resource_usage(sample("billing", 0, 100.0)).unwrap();
        engine.register_instance("billing", Some("acme")).unwrap();
        engine.get_module_health("billing", Some("acme")).unwrap();

        let (status, body) = get_json(app, "/modules/health").await;
        assert_eq!(status, StatusCode::OK);
        let modules = body.as_array().unwrap();
        assert_eq!(modules.len(), 1);
        assert_eq!(modules[0]["module_id"], "billing");
        assert_eq!(modules[0]["status"], "healthy");
        assert_eq!(modules[0]["checks"].as_array().unwrap().len(), 5);
    }

    #[tokio::test]
    async fn test_metrics_endpoint() {
        let (app, engine) = setup_test_app();
        engine.record_resource_usage(sample("billing", 0, 100.0)).unwrap();

        let response = app
            .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.contains("module_engine_usage_samples_total"));
    }

    #[test]
    fn test_liveness_classification() {
        let (_, engine) = setup_test_app();
        assert_eq!(
            LivenessResponse::from_health(&engine.get_all_module_health()).status,
            ServiceStatus::Healthy
        );
    }
}

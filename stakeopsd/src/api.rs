//! HTTP surface of a keeper process.
//!
//! Provides:
//! - `GET /health`  - named boolean checks, 200 when all pass, 503 otherwise
//! - `GET /metrics` - Prometheus text exposition
//! - `GET /alerts`  - recent alerts from the dispatcher ring buffer

use async_trait::async_trait;
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tower_http::trace::TraceLayer;
use tracing::error;

use stakeops_alerts::AlertDispatcher;
use stakeops_domain::Alert;
use stakeops_keeper::KeeperMetrics;

// =============================================================================
// Health Probe
// =============================================================================

/// Named health checks reported by a process.
#[async_trait]
pub trait HealthProbe: Send + Sync {
    /// Evaluate every check.
    async fn health_checks(&self) -> BTreeMap<String, bool>;
}

// =============================================================================
// API State
// =============================================================================

/// Shared state for API handlers.
pub struct ApiState {
    /// Process health checks
    pub probe: Arc<dyn HealthProbe>,
    /// Process metrics
    pub metrics: Arc<KeeperMetrics>,
    /// Alert dispatcher
    pub alerts: Arc<AlertDispatcher>,
    /// Process start time
    pub started_at: Instant,
}

impl ApiState {
    /// Create API state, starting the uptime clock now.
    pub fn new(
        probe: Arc<dyn HealthProbe>,
        metrics: Arc<KeeperMetrics>,
        alerts: Arc<AlertDispatcher>,
    ) -> Self {
        Self {
            probe,
            metrics,
            alerts,
            started_at: Instant::now(),
        }
    }
}

// =============================================================================
// Response Types
// =============================================================================

/// Health check response.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// `healthy` or `unhealthy`
    pub status: String,
    /// Individual check results
    pub checks: BTreeMap<String, bool>,
    /// Seconds since start
    pub uptime: u64,
    /// Time of the check
    pub timestamp: DateTime<Utc>,
}

// =============================================================================
// Router
// =============================================================================

/// Create the API router.
pub fn create_router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .route("/alerts", get(alerts_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// =============================================================================
// Handlers
// =============================================================================

/// Health check endpoint.
async fn health_handler(State(state): State<Arc<ApiState>>) -> (StatusCode, Json<HealthResponse>) {
    let checks = state.probe.health_checks().await;
    let healthy = checks.values().all(|ok| *ok);

    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(HealthResponse {
            status: if healthy { "healthy" } else { "unhealthy" }.to_string(),
            checks,
            uptime: state.started_at.elapsed().as_secs(),
            timestamp: Utc::now(),
        }),
    )
}

/// Prometheus exposition endpoint.
async fn metrics_handler(State(state): State<Arc<ApiState>>) -> Response {
    match state.metrics.gather() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "Failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

/// Recent alerts, oldest first.
async fn alerts_handler(State(state): State<Arc<ApiState>>) -> Json<Vec<Alert>> {
    Json(state.alerts.recent_alerts())
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use stakeops_domain::{AlertDetails, Severity};
    use tower::ServiceExt;

    struct FixedProbe(Vec<(&'static str, bool)>);

    #[async_trait]
    impl HealthProbe for FixedProbe {
        async fn health_checks(&self) -> BTreeMap<String, bool> {
            self.0.iter().map(|(k, v)| (k.to_string(), *v)).collect()
        }
    }

    fn app(checks: Vec<(&'static str, bool)>) -> (Router, Arc<ApiState>) {
        let state = Arc::new(ApiState::new(
            Arc::new(FixedProbe(checks)),
            Arc::new(KeeperMetrics::new().unwrap()),
            Arc::new(AlertDispatcher::new(Vec::new())),
        ));
        (create_router(state.clone()), state)
    }

    async fn get(router: Router, uri: &str) -> (StatusCode, Vec<u8>) {
        let response = router
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, body.to_vec())
    }

    #[tokio::test]
    async fn test_health_all_checks_pass() {
        let (router, _) = app(vec![("chain_connected", true), ("deposit_subscription", true)]);

        let (status, body) = get(router, "/health").await;
        let health: HealthResponse = serde_json::from_slice(&body).unwrap();

        assert_eq!(status, StatusCode::OK);
        assert_eq!(health.status, "healthy");
        assert_eq!(health.checks.len(), 2);
    }

    #[tokio::test]
    async fn test_health_failing_check_is_503() {
        let (router, _) = app(vec![("chain_connected", true), ("min_buffer_maintained", false)]);

        let (status, body) = get(router, "/health").await;
        let health: HealthResponse = serde_json::from_slice(&body).unwrap();

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(health.status, "unhealthy");
        assert_eq!(health.checks.get("min_buffer_maintained"), Some(&false));
    }

    #[tokio::test]
    async fn test_metrics_exposition() {
        let (router, state) = app(vec![]);
        state.metrics.batches_processed.inc();

        let (status, body) = get(router, "/metrics").await;
        let text = String::from_utf8(body).unwrap();

        assert_eq!(status, StatusCode::OK);
        assert!(text.contains("stakeops_batches_processed_total 1"));
    }

    #[tokio::test]
    async fn test_alerts_endpoint() {
        let (router, state) = app(vec![]);
        state
            .alerts
            .send_alert(Severity::Warning, "Buffer low", AlertDetails::new())
            .await;

        let (status, body) = get(router, "/alerts").await;
        let alerts: Vec<Alert> = serde_json::from_slice(&body).unwrap();

        assert_eq!(status, StatusCode::OK);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].message, "Buffer low");
    }
}

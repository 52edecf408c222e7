//! REST API server for the budget guardian agent
//!
//! Exposes sessions, the audit trail and the reallocation engine over HTTP.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use uuid::Uuid;

use crate::agent::Orchestrator;
use crate::error::AgentError;
use crate::models::{CategoryAmounts, Transaction};
use crate::state::SessionRequest;

/// =============================
/// Request Models
/// =============================

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct OptimizeRequest {
    pub budget: CategoryAmounts,
    pub total_spending: CategoryAmounts,
    #[serde(default)]
    pub transactions: Vec<Transaction>,
}

/// =============================
/// Response Wrapper
/// =============================

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse {
    pub success: bool,
    pub data: Option<serde_json::Value>,
    pub error: Option<String>,
    pub timestamp: String,
}

impl ApiResponse {
    pub fn success<T: Serialize>(data: T) -> Self {
        Self {
            success: true,
            data: serde_json::to_value(data).ok(),
            error: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// =============================
/// API State
/// =============================

#[derive(Clone)]
pub struct ApiState {
    pub orchestrator: Arc<Orchestrator>,
}

/// =============================
/// Health Endpoint
/// =============================

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// =============================
/// Session Endpoints
/// =============================

async fn analyze(
    State(state): State<ApiState>,
    Json(req): Json<SessionRequest>,
) -> (StatusCode, Json<ApiResponse>) {
    info!(user = %req.profile.name, categories = req.budget.len(), "Received analysis request");

    match state.orchestrator.run(req).await {
        Ok(outcome) => (
            StatusCode::OK,
            Json(ApiResponse::success(serde_json::json!({
                "session_id": outcome.state.session_id,
                "report": outcome.report,
                "state": outcome.state,
            }))),
        ),
        Err(e @ AgentError::InvalidRequest(_)) => (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::error(e.to_string())),
        ),
        Err(e) => {
            warn!(error = %e, "Session failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error(format!("Session failed: {}", e))),
            )
        }
    }
}

async fn get_session(
    State(state): State<ApiState>,
    Path(session_id): Path<String>,
) -> (StatusCode, Json<ApiResponse>) {
    let Ok(session_id) = Uuid::parse_str(&session_id) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::error(format!("Invalid session id: {}", session_id))),
        );
    };

    let audit_log = state.orchestrator.audit_log();
    match audit_log.get(session_id).await {
        Ok(Some(record)) => {
            let verified = audit_log.verify_integrity(session_id).await.unwrap_or(false);
            (
                StatusCode::OK,
                Json(ApiResponse::success(serde_json::json!({
                    "record": record,
                    "integrity_verified": verified,
                }))),
            )
        }
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::error(format!("Session {} not found", session_id))),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiResponse::error(e.to_string())),
        ),
    }
}

/// =============================
/// Reallocation Endpoint
/// =============================

async fn optimize(
    State(state): State<ApiState>,
    Json(req): Json<OptimizeRequest>,
) -> (StatusCode, Json<ApiResponse>) {
    if let Some((category, amount)) = req.budget.iter().find(|(_, a)| !a.is_finite() || **a < 0.0) {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::error(format!(
                "budget for {} must be a non-negative amount, got {}",
                category, amount
            ))),
        );
    }

    let result = state
        .orchestrator
        .optimizer()
        .optimize(&req.budget, &req.total_spending, &req.transactions);
    info!(
        optimization_needed = result.optimization_needed,
        recommendations = result.recommendations.len(),
        "Direct optimization request served"
    );

    (StatusCode::OK, Json(ApiResponse::success(result)))
}

/// =============================
/// Router
/// =============================

pub fn create_router(orchestrator: Arc<Orchestrator>) -> Router {
    let state = ApiState { orchestrator };

    Router::new()
        .route("/health", get(health))
        .route("/api/v1/analyze", post(analyze))
        .route("/api/v1/sessions/:id", get(get_session))
        .route("/api/v1/optimize", post(optimize))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// =============================
/// Server Startup
/// =============================

pub async fn start_server(
    orchestrator: Arc<Orchestrator>,
    port: u16,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let router = create_router(orchestrator);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    info!("API Server listening on http://0.0.0.0:{}", port);
    info!("Local: http://127.0.0.1:{}", port);

    axum::serve(listener, router).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::AuditLog;
    use crate::config::AgentConfig;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn router() -> Router {
        create_router(Arc::new(Orchestrator::demo(&AgentConfig::default(), AuditLog::new())))
    }

    async fn send(router: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = router.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get_req(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = send(router(), get_req("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
    }

    #[tokio::test]
    async fn test_analyze_then_fetch_session() {
        let router = router();
        let (status, body) = send(
            router.clone(),
            post_json(
                "/api/v1/analyze",
                json!({
                    "profile": {"name": "Aisha", "location": "Kuala Lumpur"},
                    "budget": {"Housing": 1600, "Food": 100, "Healthcare": 400, "Entertainment": 600},
                }),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["report"]["status"], "alert");

        let session_id = body["data"]["session_id"].as_str().unwrap().to_string();
        let (status, body) = send(router, get_req(&format!("/api/v1/sessions/{}", session_id))).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["integrity_verified"], true);
        assert_eq!(body["data"]["record"]["session_id"], session_id.as_str());
    }

    #[tokio::test]
    async fn test_analyze_rejects_negative_budget() {
        let (status, body) = send(
            router(),
            post_json(
                "/api/v1/analyze",
                json!({"profile": {"name": "Ben"}, "budget": {"Food": -5}}),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn test_unknown_session_is_not_found() {
        let (status, _) = send(router(), get_req(&format!("/api/v1/sessions/{}", Uuid::new_v4()))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send(router(), get_req("/api/v1/sessions/not-a-uuid")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_optimize_endpoint() {
        let (status, body) = send(
            router(),
            post_json(
                "/api/v1/optimize",
                json!({
                    "budget": {"Food": 1200, "Entertainment": 900},
                    "total_spending": {"Food": 1300, "Entertainment": 400},
                }),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        let data = &body["data"];
        assert_eq!(data["optimization_needed"], true);
        assert_eq!(data["recommendations"][0]["from_category"], "Entertainment");
        assert_eq!(data["recommendations"][0]["to_category"], "Food");
        assert!(data["proposed_budget"]["Food"].as_f64().unwrap() > 1200.0);
    }
}

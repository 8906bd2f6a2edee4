//! REST API server for the edge support agent
//!
//! Thin transport over the pipeline: validates input, runs the gate checks
//! (challenge token, rate limit), and maps outcomes onto the status
//! taxonomy: 400 invalid input, 403 challenge failure, 429 rate-limited,
//! 200 success (axum itself answers 405 for wrong methods).

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::agent::SupportAgent;
use crate::gates::{verify_challenge, RateLimiter};
use crate::models::SupportResponse;

/// =============================
/// Request / Error Models
/// =============================

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SupportRequest {
    pub query: String,
    pub challenge_token: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub error: String,
    pub timestamp: String,
}

impl ApiError {
    fn new(message: &str) -> Json<Self> {
        Json(Self {
            error: message.to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        })
    }
}

/// =============================
/// API State
/// =============================

#[derive(Clone)]
pub struct ApiState {
    pub agent: Arc<SupportAgent>,
    pub rate_limiter: Arc<RateLimiter>,
}

/// =============================
/// Helpers
/// =============================

/// Stable rate-limit key for a caller: explicit client id header when
/// present, else forwarded address, else a shared anonymous bucket.
fn client_key(headers: &HeaderMap) -> String {
    let raw = headers
        .get("x-client-id")
        .or_else(|| headers.get("x-forwarded-for"))
        .and_then(|v| v.to_str().ok())
        .unwrap_or("anonymous");

    let hash = Sha256::digest(raw.as_bytes());
    hex::encode(&hash[..8])
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
/// Support Endpoint
/// =============================

async fn handle_support(
    State(state): State<ApiState>,
    headers: HeaderMap,
    payload: Result<Json<SupportRequest>, JsonRejection>,
) -> Result<Json<SupportResponse>, (StatusCode, Json<ApiError>)> {
    // Missing/malformed bodies are invalid input, same as an empty
    // query: the whole class maps to 400, not axum's default 422.
    let Json(req) = payload.map_err(|e| {
        (
            StatusCode::BAD_REQUEST,
            ApiError::new(&format!("invalid request body: {}", e)),
        )
    })?;

    if req.query.trim().is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            ApiError::new("query must not be empty"),
        ));
    }

    if !verify_challenge(req.challenge_token.as_deref()) {
        return Err((
            StatusCode::FORBIDDEN,
            ApiError::new("challenge verification failed"),
        ));
    }

    let key = client_key(&headers);
    if !state.rate_limiter.check(&key).await {
        return Err((
            StatusCode::TOO_MANY_REQUESTS,
            ApiError::new("rate limit exceeded, slow down"),
        ));
    }

    info!(client = %key, "support request accepted");

    let response = state.agent.handle(req.query.trim()).await;
    Ok(Json(response))
}

/// =============================
/// Router
/// =============================

pub fn create_router(agent: Arc<SupportAgent>, rate_limiter: Arc<RateLimiter>) -> Router {
    let state = ApiState {
        agent,
        rate_limiter,
    };

    Router::new()
        .route("/health", get(health))
        .route("/api/support", post(handle_support))
        .with_state(state)
        .layer(CorsLayer::permissive())
}

/// =============================
/// Server Startup
/// =============================

pub async fn start_server(
    agent: Arc<SupportAgent>,
    rate_limiter: Arc<RateLimiter>,
    port: u16,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let router = create_router(agent, rate_limiter);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    info!("API server listening on http://0.0.0.0:{}", port);

    axum::serve(listener, router).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gates::RateLimiter;
    use crate::gemini::MockGenerativeService;
    use crate::store::InMemoryOrderStore;
    use crate::telemetry::LogTelemetrySink;
    use axum::body::Body;
    use axum::http::Request;
    use std::time::Duration;
    use tower::ServiceExt;

    fn test_router() -> Router {
        let agent = Arc::new(SupportAgent::new(
            Arc::new(InMemoryOrderStore::seeded()),
            Arc::new(MockGenerativeService::new("Your order shipped.")),
            Arc::new(LogTelemetrySink),
        ));
        create_router(agent, Arc::new(RateLimiter::new(100, Duration::from_secs(60))))
    }

    fn support_post(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/support")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_missing_query_field_is_bad_request() {
        let response = test_router().oneshot(support_post("{}")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_malformed_body_is_bad_request() {
        let response = test_router()
            .oneshot(support_post("{not json"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_empty_query_is_bad_request() {
        let response = test_router()
            .oneshot(support_post(r#"{"query": "   "}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_valid_query_is_ok() {
        let response = test_router()
            .oneshot(support_post(r#"{"query": "status of CERT-123456"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn test_client_key_is_stable_and_header_sensitive() {
        let mut headers = HeaderMap::new();
        headers.insert("x-client-id", "shop-frontend".parse().unwrap());

        let a = client_key(&headers);
        let b = client_key(&headers);
        assert_eq!(a, b);

        let anon = client_key(&HeaderMap::new());
        assert_ne!(a, anon);
    }

    #[test]
    fn test_support_request_deserialization() {
        let req: SupportRequest =
            serde_json::from_str(r#"{"query": "where is CERT-123456"}"#).unwrap();
        assert_eq!(req.query, "where is CERT-123456");
        assert!(req.challenge_token.is_none());
    }
}

// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! HTTP handlers for the API security gateway.
//!
//! The handlers themselves are thin: everything interesting happens in the
//! pipeline middleware and the components it composes. Note the demo scope:
//! `/auth/register` hashes and discards (no credential store), and
//! `/auth/login` issues a token without checking a password against one.

use crate::auth::TokenManager;
use crate::config::Config;
use crate::error::GatewayError;
use crate::limiter::RateLimiter;
use crate::pipeline::{security_pipeline, RequestIdentifier};
use crate::validator::ThreatValidator;
use axum::extract::{Extension, State};
use axum::http::HeaderMap;
use axum::middleware;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tower_http::catch_panic::CatchPanicLayer;
use tracing::{error, info};

/// Shared application state.
pub struct AppState {
    pub limiter: RateLimiter,
    pub validator: ThreatValidator,
    pub tokens: TokenManager,
    pub config: Config,
}

/// Service banner.
#[derive(Debug, Serialize)]
pub struct BannerResponse {
    pub message: &'static str,
    pub version: &'static str,
    pub status: &'static str,
    pub features: Vec<&'static str>,
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: i64,
    pub counter_store: String,
}

#[derive(Debug, Deserialize)]
pub struct CredentialsRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub message: &'static str,
    pub username: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_in: u64,
}

#[derive(Debug, Deserialize)]
pub struct ApiKeyRequest {
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct ApiKeyResponse {
    pub api_key: String,
    pub name: String,
    pub created_at: i64,
}

#[derive(Debug, Serialize)]
pub struct ProtectedResponse {
    pub message: &'static str,
    pub user: String,
    pub data: &'static str,
}

#[derive(Debug, Serialize)]
pub struct RateLimitStatusResponse {
    pub limit: u32,
    pub remaining: u32,
    pub reset_in_seconds: u64,
    pub window_seconds: u64,
    pub enforcing: bool,
}

/// Gateway root endpoint.
pub async fn root() -> Json<BannerResponse> {
    Json(BannerResponse {
        message: "Secure API Gateway",
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        features: vec![
            "JWT Authentication",
            "Rate Limiting",
            "Request Validation",
            "SQL Injection Prevention",
            "XSS Protection",
            "Security Headers",
        ],
    })
}

/// Health check endpoint.
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        timestamp: chrono::Utc::now().timestamp(),
        counter_store: state.limiter.status().to_string(),
    })
}

/// Register a new user. Demo only: the hash is computed and discarded.
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CredentialsRequest>,
) -> Result<Json<RegisterResponse>, GatewayError> {
    let _hash = state.tokens.hash_password(&req.password)?;
    info!(username = %req.username, "User registered");
    Ok(Json(RegisterResponse {
        message: "User registered successfully",
        username: req.username,
    }))
}

/// Login and receive an access token. Demo only: no credential store is
/// consulted; any username receives a token.
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CredentialsRequest>,
) -> Result<Json<LoginResponse>, GatewayError> {
    let mut extra = HashMap::new();
    extra.insert("type".to_string(), serde_json::json!("access"));

    let access_token = state.tokens.issue(&req.username, extra)?;
    info!(username = %req.username, "Access token issued");
    Ok(Json(LoginResponse {
        access_token,
        token_type: "bearer",
        expires_in: state.tokens.token_ttl_secs(),
    }))
}

/// Generate a new API key.
pub async fn generate_api_key(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ApiKeyRequest>,
) -> Json<ApiKeyResponse> {
    let api_key = state.tokens.generate_api_key();
    info!(name = %req.name, "API key generated");
    Json(ApiKeyResponse {
        api_key,
        name: req.name,
        created_at: chrono::Utc::now().timestamp(),
    })
}

fn bearer_token(headers: &HeaderMap) -> Result<&str, GatewayError> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .filter(|token| !token.is_empty())
        .ok_or(GatewayError::AuthenticationInvalid)
}

/// Example protected endpoint: requires a valid bearer token.
pub async fn protected(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<ProtectedResponse>, GatewayError> {
    let token = bearer_token(&headers)?;
    let claims = state.tokens.verify(token)?;
    Ok(Json(ProtectedResponse {
        message: "Access granted to protected resource",
        user: claims.sub,
        data: "This is protected data",
    }))
}

/// Current rate limit status for the caller's identifier.
pub async fn rate_limit_status(
    State(state): State<Arc<AppState>>,
    Extension(identifier): Extension<RequestIdentifier>,
) -> Json<RateLimitStatusResponse> {
    let usage = state.limiter.usage(&identifier.0).await;
    Json(RateLimitStatusResponse {
        limit: usage.limit,
        remaining: usage.remaining,
        reset_in_seconds: usage.reset_secs,
        window_seconds: state.config.rate_limit.window_secs,
        enforcing: state.limiter.enforcing(),
    })
}

/// Build the gateway router with the security pipeline wrapped around
/// every route. Observability and CORS layers are added by the binary.
///
/// The panic catcher sits inside the pipeline so even a crashed handler
/// produces a decorated, detail-free 500.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/healthz", get(health))
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/api-keys/generate", post(generate_api_key))
        .route("/protected", get(protected))
        .route("/rate-limit/status", get(rate_limit_status))
        .layer(CatchPanicLayer::custom(|_: Box<dyn std::any::Any + Send>| {
            error!("Handler panicked");
            GatewayError::Internal.into_response()
        }))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            security_pipeline,
        ))
        .with_state(state)
}

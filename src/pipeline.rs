// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Per-request security pipeline.
//!
//! Runs in front of every route: derives the rate-limit identifier, checks
//! the limiter, scans query and path parameters for threat signatures, then
//! hands the request downstream. On the way out every response (including
//! short-circuited rejections) is decorated with hardening headers and the
//! identifier's current rate-limit budget.

use crate::error::GatewayError;
use crate::handlers::AppState;
use crate::limiter::RateLimitResult;
use crate::validator::ScanResult;
use axum::extract::{ConnectInfo, RawPathParams, Request, State};
use axum::http::header::{HeaderName, HeaderValue};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// Principal established by an authentication layer ahead of the pipeline.
/// When present, rate limiting buckets by user instead of address.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub String);

/// Identifier the pipeline derived for this request; stashed as a request
/// extension so handlers can report usage for the same bucket.
#[derive(Debug, Clone)]
pub struct RequestIdentifier(pub String);

/// Derive the rate-limit identifier for a request.
///
/// Priority: authenticated user id, then the first address in
/// X-Forwarded-For, then the peer address.
fn derive_identifier(request: &Request, peer: SocketAddr) -> String {
    if let Some(user) = request.extensions().get::<AuthenticatedUser>() {
        return format!("user:{}", user.0);
    }
    if let Some(forwarded) = request
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
    {
        if let Some(first) = forwarded.split(',').next() {
            let first = first.trim();
            if !first.is_empty() {
                return format!("ip:{first}");
            }
        }
    }
    format!("ip:{}", peer.ip())
}

/// Run the admission checks. Recognized rejections come back as
/// `GatewayError` values and pass through to the boundary unmodified.
///
/// Takes the query string by value rather than borrowing the request: the
/// request body is not `Sync`, so holding a request borrow across the
/// limiter await would make the middleware future non-`Send`.
async fn admit(
    state: &AppState,
    identifier: &str,
    query: Option<String>,
    path_params: &RawPathParams,
) -> Result<(), GatewayError> {
    // Rate limit first: cheap, and a flooding caller never reaches the
    // signature scan.
    if let RateLimitResult::Limited { retry_after } = state.limiter.check(identifier).await {
        return Err(GatewayError::RateLimitExceeded { retry_after });
    }

    let query_pairs: Vec<(String, String)> = query
        .map(|q| {
            url::form_urlencoded::parse(q.as_bytes())
                .map(|(k, v)| (k.into_owned(), v.into_owned()))
                .collect()
        })
        .unwrap_or_default();

    let params = query_pairs
        .iter()
        .map(|(k, v)| (k.as_str(), v.as_str()))
        .chain(path_params.iter());

    if let ScanResult::Reject(violation) = state.validator.scan_params(params) {
        return Err(GatewayError::ThreatDetected(violation));
    }

    Ok(())
}

fn security_headers() -> [(HeaderName, HeaderValue); 4] {
    [
        (
            HeaderName::from_static("x-content-type-options"),
            HeaderValue::from_static("nosniff"),
        ),
        (
            HeaderName::from_static("x-frame-options"),
            HeaderValue::from_static("DENY"),
        ),
        (
            HeaderName::from_static("x-xss-protection"),
            HeaderValue::from_static("1; mode=block"),
        ),
        (
            HeaderName::from_static("strict-transport-security"),
            HeaderValue::from_static("max-age=31536000; includeSubDomains"),
        ),
    ]
}

/// Attach hardening headers, the current usage snapshot, and the request
/// timing to an outgoing response.
async fn decorate(response: &mut Response, state: &AppState, identifier: &str, started: Instant) {
    let headers = response.headers_mut();
    for (name, value) in security_headers() {
        headers.insert(name, value);
    }

    let usage = state.limiter.usage(identifier).await;
    for (name, value) in [
        ("x-ratelimit-limit", usage.limit.to_string()),
        ("x-ratelimit-remaining", usage.remaining.to_string()),
        ("x-ratelimit-reset", usage.reset_secs.to_string()),
        (
            "x-process-time",
            format!("{:.6}", started.elapsed().as_secs_f64()),
        ),
    ] {
        if let Ok(value) = HeaderValue::from_str(&value) {
            headers.insert(HeaderName::from_static(name), value);
        }
    }
}

/// The security pipeline middleware. Wraps every route.
pub async fn security_pipeline(
    State(state): State<Arc<AppState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    path_params: RawPathParams,
    mut request: Request,
    next: Next,
) -> Response {
    let started = Instant::now();
    let identifier = derive_identifier(&request, peer);
    debug!(identifier = %identifier, path = %request.uri().path(), "Security pipeline");

    let query = request.uri().query().map(str::to_owned);
    let mut response = match admit(&state, &identifier, query, &path_params).await {
        Ok(()) => {
            request
                .extensions_mut()
                .insert(RequestIdentifier(identifier.clone()));
            next.run(request).await
        }
        Err(rejection) => rejection.into_response(),
    };

    decorate(&mut response, &state, &identifier, started).await;
    response
}

// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Gateway error taxonomy and its HTTP mapping.
//!
//! Recognized rejections (429/400/401) pass through to the boundary
//! unmodified; anything else is converted to a detail-free 500 so internal
//! state never reaches the client. Store failures are internal only: they
//! route the limiter into fail-open and never surface as a status.

use crate::validator::ThreatDetected;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use tracing::error;

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_secs: Option<u64>,
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("rate limit exceeded, try again in {} seconds", retry_after.as_secs())]
    RateLimitExceeded { retry_after: Duration },

    #[error(transparent)]
    ThreatDetected(#[from] ThreatDetected),

    #[error("missing or invalid authorization")]
    AuthenticationInvalid,

    /// Internal only; mapped like `Internal` if it ever reaches the
    /// boundary, which the limiter's fail-open should prevent.
    #[error("counter store unavailable")]
    StoreUnavailable,

    #[error("internal server error")]
    Internal,
}

impl GatewayError {
    fn code(&self) -> &'static str {
        match self {
            Self::RateLimitExceeded { .. } => "RATE_LIMITED",
            Self::ThreatDetected(_) => "THREAT_DETECTED",
            Self::AuthenticationInvalid => "UNAUTHORIZED",
            Self::StoreUnavailable | Self::Internal => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        match self {
            Self::RateLimitExceeded { retry_after } => {
                let secs = retry_after.as_secs().max(1);
                (
                    StatusCode::TOO_MANY_REQUESTS,
                    [(header::RETRY_AFTER, secs.to_string())],
                    Json(ErrorResponse {
                        error: format!("Rate limit exceeded. Try again in {secs} seconds"),
                        code: self.code(),
                        retry_after_secs: Some(secs),
                    }),
                )
                    .into_response()
            }
            Self::ThreatDetected(ref violation) => (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse {
                    error: violation.to_string(),
                    code: self.code(),
                    retry_after_secs: None,
                }),
            )
                .into_response(),
            Self::AuthenticationInvalid => (
                StatusCode::UNAUTHORIZED,
                [(header::WWW_AUTHENTICATE, "Bearer")],
                Json(ErrorResponse {
                    error: "Could not validate credentials".to_string(),
                    code: self.code(),
                    retry_after_secs: None,
                }),
            )
                .into_response(),
            Self::StoreUnavailable | Self::Internal => {
                error!(error = %self, "Unexpected failure reached the boundary");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorResponse {
                        error: "Internal server error".to_string(),
                        code: self.code(),
                        retry_after_secs: None,
                    }),
                )
                    .into_response()
            }
        }
    }
}

impl From<crate::auth::AuthError> for GatewayError {
    fn from(err: crate::auth::AuthError) -> Self {
        match err {
            crate::auth::AuthError::InvalidToken => Self::AuthenticationInvalid,
            crate::auth::AuthError::Hashing => Self::Internal,
        }
    }
}

// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Bearer-token issuance and verification, password hashing, and API keys.
//!
//! Tokens are self-contained HS256 JWTs: verification is a pure function of
//! the signature and expiry, so the server holds no session state. There is
//! no revocation before natural expiry; that is an explicit limitation of
//! this design, not an oversight.
//!
//! Every verification failure (malformed, bad signature, expired) collapses
//! to the single [`AuthError::InvalidToken`] so callers cannot probe which
//! check failed.

use crate::config::SecurityConfig;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use tracing::warn;

/// API keys carry 32 bytes (256 bits) of entropy.
const API_KEY_BYTES: usize = 32;

#[derive(Debug, Error)]
pub enum AuthError {
    /// Missing, malformed, expired, or forged credential. Deliberately
    /// opaque.
    #[error("could not validate credentials")]
    InvalidToken,

    /// Hashing failed (bad cost parameter or malformed stored hash).
    #[error("password hashing failed")]
    Hashing,
}

/// Claims embedded in an access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (the authenticated principal)
    pub sub: String,
    /// Issued-at, Unix seconds
    pub iat: i64,
    /// Expiry, Unix seconds
    pub exp: i64,
    /// Any additional claims supplied at issuance
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

/// Issues and verifies tokens with a process-wide symmetric secret.
///
/// The secret is read-only after construction and shared by all concurrent
/// verifications without locking.
pub struct TokenManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    algorithm: Algorithm,
    token_ttl_secs: u64,
    bcrypt_cost: u32,
}

impl TokenManager {
    pub fn new(config: &SecurityConfig) -> Self {
        let algorithm = match config.algorithm.parse() {
            Ok(algorithm) => algorithm,
            Err(_) => {
                warn!(
                    algorithm = %config.algorithm,
                    "Unrecognized signing algorithm, using HS256"
                );
                Algorithm::HS256
            }
        };
        Self {
            encoding_key: EncodingKey::from_secret(config.secret_key.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.secret_key.as_bytes()),
            algorithm,
            token_ttl_secs: config.token_ttl_secs,
            bcrypt_cost: config.bcrypt_cost,
        }
    }

    /// Hash a password with bcrypt (adaptive, salted).
    pub fn hash_password(&self, password: &str) -> Result<String, AuthError> {
        bcrypt::hash(password, self.bcrypt_cost).map_err(|_| AuthError::Hashing)
    }

    /// Verify a password against a stored hash. bcrypt compares the full
    /// digest regardless of where a mismatch occurs.
    pub fn verify_password(&self, password: &str, hash: &str) -> Result<bool, AuthError> {
        bcrypt::verify(password, hash).map_err(|_| AuthError::Hashing)
    }

    /// Issue a signed token for `subject` with the default lifetime.
    pub fn issue(
        &self,
        subject: &str,
        extra: HashMap<String, serde_json::Value>,
    ) -> Result<String, AuthError> {
        self.issue_with_ttl(subject, extra, self.token_ttl_secs)
    }

    /// Issue a signed token with an explicit lifetime in seconds.
    pub fn issue_with_ttl(
        &self,
        subject: &str,
        extra: HashMap<String, serde_json::Value>,
        ttl_secs: u64,
    ) -> Result<String, AuthError> {
        let now = chrono::Utc::now().timestamp();
        let claims = Claims {
            sub: subject.to_string(),
            iat: now,
            exp: now + ttl_secs as i64,
            extra,
        };
        jsonwebtoken::encode(&Header::new(self.algorithm), &claims, &self.encoding_key)
            .map_err(|_| AuthError::InvalidToken)
    }

    /// Verify a token's signature and expiry, returning its claims.
    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        let validation = Validation::new(self.algorithm);
        jsonwebtoken::decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|_| AuthError::InvalidToken)
    }

    /// Default token lifetime in seconds, for `expires_in` responses.
    pub fn token_ttl_secs(&self) -> u64 {
        self.token_ttl_secs
    }

    /// Generate an opaque, URL-safe API key with 256 bits of entropy from
    /// the operating system's CSPRNG.
    pub fn generate_api_key(&self) -> String {
        let mut bytes = [0u8; API_KEY_BYTES];
        OsRng.fill_bytes(&mut bytes);
        URL_SAFE_NO_PAD.encode(bytes)
    }
}

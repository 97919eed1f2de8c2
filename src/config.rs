// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Configuration for the API security gateway.
//!
//! Built once at startup (environment overrides on top of serde defaults)
//! and passed by handle into each component's constructor. Components never
//! read the environment themselves.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Placeholder secret shipped for local development only.
pub const INSECURE_DEFAULT_SECRET: &str = "change-this-development-secret";

/// Top-level configuration for the gateway service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server bind address (default: 0.0.0.0:8080)
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Token issuance and password hashing configuration
    #[serde(default)]
    pub security: SecurityConfig,

    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// CORS configuration
    #[serde(default)]
    pub cors: CorsConfig,
}

/// Token signing and password hashing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// Symmetric signing secret for bearer tokens
    #[serde(default = "default_secret_key")]
    pub secret_key: String,

    /// Token signing algorithm (default: HS256). Only the HMAC family
    /// makes sense with a symmetric secret.
    #[serde(default = "default_algorithm")]
    pub algorithm: String,

    /// Access token lifetime in seconds (default: 1800 = 30 minutes)
    #[serde(default = "default_token_ttl_secs")]
    pub token_ttl_secs: u64,

    /// bcrypt work factor for password hashing
    #[serde(default = "default_bcrypt_cost")]
    pub bcrypt_cost: u32,
}

/// Fixed-window rate limiting settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Whether enforcement is active at all (default: true)
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Maximum requests per window per identifier (default: 100)
    #[serde(default = "default_max_requests")]
    pub max_requests: u32,

    /// Window length in seconds (default: 60)
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,

    /// Counter store address (default: memory://local)
    #[serde(default = "default_store_addr")]
    pub store_addr: String,

    /// Upper bound on any single store operation in milliseconds
    /// (default: 2000). Store unavailability degrades to fail-open within
    /// this bound instead of hanging the request.
    #[serde(default = "default_store_timeout_ms")]
    pub store_timeout_ms: u64,
}

/// CORS settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    /// Origins allowed to call the gateway
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,
}

// Default value functions
fn default_bind_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_secret_key() -> String {
    INSECURE_DEFAULT_SECRET.to_string()
}

fn default_algorithm() -> String {
    "HS256".to_string()
}

fn default_token_ttl_secs() -> u64 {
    1800
}

fn default_bcrypt_cost() -> u32 {
    bcrypt::DEFAULT_COST
}

fn default_max_requests() -> u32 {
    100
}

fn default_window_secs() -> u64 {
    60
}

fn default_store_addr() -> String {
    "memory://local".to_string()
}

fn default_store_timeout_ms() -> u64 {
    2000
}

fn default_allowed_origins() -> Vec<String> {
    vec![
        "http://localhost:3000".to_string(),
        "http://localhost:8000".to_string(),
    ]
}

fn default_true() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            security: SecurityConfig::default(),
            rate_limit: RateLimitConfig::default(),
            cors: CorsConfig::default(),
        }
    }
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            secret_key: default_secret_key(),
            algorithm: default_algorithm(),
            token_ttl_secs: default_token_ttl_secs(),
            bcrypt_cost: default_bcrypt_cost(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            max_requests: default_max_requests(),
            window_secs: default_window_secs(),
            store_addr: default_store_addr(),
            store_timeout_ms: default_store_timeout_ms(),
        }
    }
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: default_allowed_origins(),
        }
    }
}

impl SecurityConfig {
    /// Get the access token lifetime
    pub fn token_ttl(&self) -> Duration {
        Duration::from_secs(self.token_ttl_secs)
    }
}

impl RateLimitConfig {
    /// Get the rate window duration
    pub fn window_duration(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }

    /// Get the store operation timeout
    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }
}

fn env_parse<T: std::str::FromStr>(name: &str, fallback: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(fallback)
}

impl Config {
    /// Load configuration from environment variables on top of defaults.
    pub fn load_from_env() -> Self {
        let defaults = Config::default();
        Config {
            bind_addr: std::env::var("BIND_ADDR").unwrap_or(defaults.bind_addr),
            security: SecurityConfig {
                secret_key: std::env::var("SECRET_KEY").unwrap_or(defaults.security.secret_key),
                algorithm: std::env::var("ALGORITHM").unwrap_or(defaults.security.algorithm),
                token_ttl_secs: env_parse("TOKEN_TTL_SECS", defaults.security.token_ttl_secs),
                bcrypt_cost: env_parse("BCRYPT_COST", defaults.security.bcrypt_cost),
            },
            rate_limit: RateLimitConfig {
                enabled: env_parse("RATE_LIMIT_ENABLED", defaults.rate_limit.enabled),
                max_requests: env_parse("RATE_LIMIT_REQUESTS", defaults.rate_limit.max_requests),
                window_secs: env_parse("RATE_LIMIT_WINDOW_SECS", defaults.rate_limit.window_secs),
                store_addr: std::env::var("COUNTER_STORE_ADDR")
                    .unwrap_or(defaults.rate_limit.store_addr),
                store_timeout_ms: env_parse(
                    "STORE_TIMEOUT_MS",
                    defaults.rate_limit.store_timeout_ms,
                ),
            },
            cors: CorsConfig {
                allowed_origins: std::env::var("ALLOWED_ORIGINS")
                    .map(|v| {
                        v.split(',')
                            .map(|s| s.trim().to_string())
                            .filter(|s| !s.is_empty())
                            .collect()
                    })
                    .unwrap_or(defaults.cors.allowed_origins),
            },
        }
    }

    /// True when the signing secret is still the shipped placeholder.
    pub fn uses_insecure_secret(&self) -> bool {
        self.security.secret_key == INSECURE_DEFAULT_SECRET
    }
}

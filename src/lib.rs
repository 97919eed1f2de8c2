// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! API Security Gateway
//!
//! A gateway-side security pipeline that runs in front of application
//! logic and enforces three independent policies on every inbound request:
//!
//! - Fixed-window distributed rate limiting (fail-open when the counter
//!   store is unreachable)
//! - Threat-pattern inspection of query and path parameters (SQL injection
//!   and XSS signatures)
//! - Signed, time-bounded bearer tokens and high-entropy API keys
//!
//! The three components are independent and individually testable; the
//! pipeline middleware composes them around each request and decorates
//! responses with rate-limit and hardening headers.

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod limiter;
pub mod pipeline;
pub mod store;
pub mod validator;

pub use auth::{AuthError, Claims, TokenManager};
pub use config::Config;
pub use error::GatewayError;
pub use limiter::{RateLimitResult, RateLimiter, UsageSnapshot};
pub use store::{CounterStore, MemoryCounterStore, StoreHealth};
pub use validator::{ScanResult, ThreatValidator};

// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! API Security Gateway service.
//!
//! Stands in front of application logic and enforces rate limiting, threat
//! inspection, and bearer-token authentication on every inbound request.
//!
//! ## Configuration
//!
//! Environment variables (all optional):
//!
//! - `BIND_ADDR`: Server bind address (default: 0.0.0.0:8080)
//! - `SECRET_KEY`: Token signing secret
//! - `ALGORITHM`: Token signing algorithm (default: HS256)
//! - `TOKEN_TTL_SECS`: Access token lifetime (default: 1800)
//! - `RATE_LIMIT_ENABLED`: Enforcement flag (default: true)
//! - `RATE_LIMIT_REQUESTS`: Requests per window (default: 100)
//! - `RATE_LIMIT_WINDOW_SECS`: Window length (default: 60)
//! - `COUNTER_STORE_ADDR`: Counter store address (default: memory://local)
//! - `STORE_TIMEOUT_MS`: Store operation bound (default: 2000)
//! - `ALLOWED_ORIGINS`: Comma-separated CORS origins

use axum::http::{HeaderValue, Method};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use api_security_gateway::{
    auth::TokenManager,
    config::Config,
    handlers::{self, AppState},
    limiter::RateLimiter,
    store::MemoryCounterStore,
    validator::ThreatValidator,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer().json())
        .with(
            EnvFilter::builder()
                .with_default_directive(Level::INFO.into())
                .from_env_lossy(),
        )
        .init();

    // Load configuration
    let config = Config::load_from_env();
    info!(
        bind_addr = %config.bind_addr,
        max_requests = config.rate_limit.max_requests,
        window_secs = config.rate_limit.window_secs,
        store_addr = %config.rate_limit.store_addr,
        "Starting API security gateway"
    );
    if config.uses_insecure_secret() {
        warn!("SECRET_KEY not set, using the insecure development default");
    }

    // Build the counter store. The in-memory backend is the only one wired
    // in; an unrecognized address still boots the gateway, with the limiter
    // failing open.
    let store = Arc::new(MemoryCounterStore::new());
    let limiter = if config.rate_limit.store_addr.starts_with("memory://") {
        RateLimiter::connect(config.rate_limit.clone(), store.clone()).await
    } else {
        warn!(
            store_addr = %config.rate_limit.store_addr,
            "Unsupported counter store address, rate limiting disabled"
        );
        RateLimiter::connect(
            config.rate_limit.clone(),
            Arc::new(UnreachableStore(config.rate_limit.store_addr.clone())),
        )
        .await
    };

    let state = Arc::new(AppState {
        limiter,
        validator: ThreatValidator::new(),
        tokens: TokenManager::new(&config.security),
        config: config.clone(),
    });

    // Reap expired counters
    let cleanup_store = store.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(60));
        loop {
            interval.tick().await;
            cleanup_store.cleanup().await;
        }
    });

    // Build router
    let app = handlers::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&config));

    // Start server
    let addr: SocketAddr = config.bind_addr.parse()?;
    let listener = TcpListener::bind(addr).await?;
    info!(addr = %addr, "Server listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

fn cors_layer(config: &Config) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .cors
        .allowed_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers(tower_http::cors::Any)
        .allow_credentials(false)
}

/// Stand-in store for an address the binary cannot reach; every operation
/// fails so the limiter stays in fail-open.
struct UnreachableStore(String);

#[async_trait::async_trait]
impl api_security_gateway::store::CounterStore for UnreachableStore {
    async fn get(
        &self,
        _key: &str,
    ) -> Result<Option<u64>, api_security_gateway::store::StoreError> {
        Err(api_security_gateway::store::StoreError::Unreachable(
            self.0.clone(),
        ))
    }

    async fn set_ex(
        &self,
        _key: &str,
        _value: u64,
        _ttl: Duration,
    ) -> Result<(), api_security_gateway::store::StoreError> {
        Err(api_security_gateway::store::StoreError::Unreachable(
            self.0.clone(),
        ))
    }

    async fn incr(&self, _key: &str) -> Result<u64, api_security_gateway::store::StoreError> {
        Err(api_security_gateway::store::StoreError::Unreachable(
            self.0.clone(),
        ))
    }

    async fn ttl(
        &self,
        _key: &str,
    ) -> Result<Option<Duration>, api_security_gateway::store::StoreError> {
        Err(api_security_gateway::store::StoreError::Unreachable(
            self.0.clone(),
        ))
    }

    async fn ping(&self) -> Result<(), api_security_gateway::store::StoreError> {
        Err(api_security_gateway::store::StoreError::Unreachable(
            self.0.clone(),
        ))
    }
}

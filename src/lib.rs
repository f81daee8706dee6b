pub mod auth;
pub mod callback;
pub mod config;
pub mod cookies;
pub mod error;
pub mod guard;
pub mod metrics;
pub mod observability;
pub mod proxy;
pub mod router;

use crate::auth::HostedIdentityProvider;
use crate::callback::auth_callback_handler;
use crate::config::GateConfig;
use crate::error::{GateError, Result};
use crate::guard::{route_guard_middleware, RouteGuard};
use crate::metrics::{metrics_handler, MetricsService};
use crate::observability::{make_request_span, request_id_middleware};
use crate::proxy::{proxy_handler, ProxyState};
use axum::{middleware, routing::get, Router as AxumRouter};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;

pub use observability::init_tracing;

/// Where the identity provider sends users back after OAuth sign-in
pub const CALLBACK_PATH: &str = "/auth/callback";

/// Health endpoint, served without running the guard
pub const HEALTH_PATH: &str = "/health";

/// Assemble the HTTP application.
///
/// `/health` and the metrics endpoint bypass the guard; the auth callback and the
/// upstream fallback run behind it.
pub fn build_app(
    guard: Arc<RouteGuard>,
    proxy_state: ProxyState,
    metrics: Option<(String, MetricsService)>,
) -> AxumRouter {
    let guarded = AxumRouter::new()
        .route(CALLBACK_PATH, get(auth_callback_handler))
        .with_state(guard.clone())
        .merge(AxumRouter::new().fallback(proxy_handler).with_state(proxy_state))
        .layer(middleware::from_fn_with_state(guard, route_guard_middleware));

    let mut app = AxumRouter::new().route(HEALTH_PATH, get(health_handler));

    if let Some((path, service)) = metrics {
        app = app.merge(
            AxumRouter::new()
                .route(&path, get(metrics_handler))
                .with_state(service),
        );
    }

    app.merge(guarded)
        .layer(middleware::from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http().make_span_with(make_request_span))
}

async fn health_handler() -> &'static str {
    "OK"
}

/// Initialize the gate server
pub async fn init_gate(config: GateConfig) -> Result<()> {
    config.validate()?;

    info!("Starting dashboard gate");
    info!(
        "Server listening on {}:{}",
        config.server.host, config.server.port
    );

    // Missing provider settings stop the gate here, before it accepts traffic
    let provider = HostedIdentityProvider::new(&config.identity_provider)?;
    info!(cookie = %provider.cookie_name(), "Identity provider configured");

    let guard = Arc::new(RouteGuard::new(
        &config.routes,
        &config.guard,
        Arc::new(provider),
    ));
    let proxy_state = ProxyState::new(&config.upstream)?;
    info!(upstream = %proxy_state.upstream, "Upstream configured");

    let metrics = if config.metrics.enabled {
        Some((config.metrics.path.clone(), MetricsService::new()?))
    } else {
        None
    };

    let app = build_app(guard, proxy_state, metrics);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(GateError::Io)?;

    info!("Gate ready to accept connections");

    axum::serve(listener, app)
        .await
        .map_err(|e| GateError::Internal(format!("Server error: {}", e)))?;

    Ok(())
}

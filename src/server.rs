//! HTTP query API.
//!
//! Every request passes through [`record_request`], which feeds the ledger
//! and classifier. Query routes are additionally gated by [`require_access`]
//! when an API key or allowed networks are configured.

use crate::ledger::UNKNOWN_CLIENT;
use crate::monitor::NetworkMonitor;
use crate::stats::{BotBreakdown, ConnectionCount, SummaryStats, VendorBreakdown};
use axum::extract::{ConnectInfo, Request, State};
use axum::http::{header, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use ipnet::IpNet;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Router state.
#[derive(Clone)]
pub struct AppState {
    pub monitor: Arc<NetworkMonitor>,
    allowed_networks: Arc<[IpNet]>,
}

impl AppState {
    pub fn new(monitor: Arc<NetworkMonitor>) -> Self {
        let allowed_networks = monitor.config().auth.parsed_networks().into();
        Self {
            monitor,
            allowed_networks,
        }
    }
}

/// Build the API router.
pub fn router(monitor: Arc<NetworkMonitor>) -> Router {
    let state = AppState::new(monitor);

    let api = Router::new()
        .route("/api/v1/connections", get(connection_count))
        .route("/api/v1/connections/", get(connection_count))
        .route("/api/v1/bots", get(bot_breakdown))
        .route("/api/v1/bots/", get(bot_breakdown))
        .route("/api/v1/bots/vendors", get(vendor_breakdown))
        .route("/api/v1/summary", get(network_summary))
        .route("/api/v1/summary/", get(network_summary))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_access));

    Router::new()
        .route("/", get(root))
        .merge(api)
        .layer(middleware::from_fn_with_state(state.clone(), record_request))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind `listen` and serve until ctrl-c.
pub async fn serve(monitor: Arc<NetworkMonitor>, listen: &str) -> anyhow::Result<()> {
    let addr: SocketAddr = listen.parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(address = %addr, "Network monitor API listening");

    axum::serve(
        listener,
        router(monitor).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Network monitor API stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for ctrl-c, shutdown only by process exit");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

fn peer_ip(request: &Request) -> Option<IpAddr> {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
}

/// Record every inbound request in the ledger.
async fn record_request(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let client_id = peer_ip(&request)
        .map(|ip| ip.to_string())
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string());
    let user_agent = request
        .headers()
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    state
        .monitor
        .observe(&client_id, user_agent, request.uri().path());

    next.run(request).await
}

/// Enforce allowed networks and the API key.
async fn require_access(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let auth = &state.monitor.config().auth;

    if !state.allowed_networks.is_empty() {
        let allowed = peer_ip(&request)
            .is_some_and(|ip| state.allowed_networks.iter().any(|net| net.contains(&ip)));
        if !allowed {
            return error_response(StatusCode::FORBIDDEN, "client address not allowed");
        }
    }

    if let Some(expected) = &auth.api_key {
        let presented = request
            .headers()
            .get(auth.header.as_str())
            .and_then(|v| v.to_str().ok());
        if presented != Some(expected.as_str()) {
            return error_response(StatusCode::UNAUTHORIZED, "invalid or missing API key");
        }
    }

    next.run(request).await
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(serde_json::json!({ "error": message.into() }))).into_response()
}

async fn root(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "message": "Zentinel Network Monitor API",
        "version": env!("CARGO_PKG_VERSION"),
        "debug": state.monitor.config().debug,
        "total_connections_endpoint": "/api/v1/connections/",
        "bots_endpoint": "/api/v1/bots/",
        "summary_endpoint": "/api/v1/summary/",
    }))
}

async fn connection_count(State(state): State<AppState>) -> Result<Json<ConnectionCount>, Response> {
    match state.monitor.connection_count().await {
        Ok(count) => Ok(Json(count)),
        Err(e) => {
            warn!(error = %e, "Connection count unavailable");
            Err(error_response(StatusCode::SERVICE_UNAVAILABLE, e.to_string()))
        }
    }
}

async fn bot_breakdown(State(state): State<AppState>) -> Json<BotBreakdown> {
    Json(state.monitor.bot_breakdown())
}

async fn vendor_breakdown(State(state): State<AppState>) -> Json<VendorBreakdown> {
    Json(state.monitor.vendor_breakdown())
}

async fn network_summary(State(state): State<AppState>) -> Json<SummaryStats> {
    Json(state.monitor.summarize().await)
}

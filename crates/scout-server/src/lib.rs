//! Scout Server
//!
//! Self-hosted API server for the research assistant: accepts research
//! requests over HTTP, runs each session out of band, and streams progress,
//! clarification requests, and the final report over a per-session
//! WebSocket channel. This is a library crate — the server is started via
//! `start_server()`.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{http::Method, routing::get, Json, Router};
use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use scout_core::agents::{builtin_registry, AgentRegistry};
use scout_core::clarify::ClarificationBroker;
use scout_core::config::ScoutConfig;
use scout_core::notify::ChannelRegistry;
use scout_core::runtime::{AgentRuntime, HttpAgentRuntime, HttpRuntimeConfig};

pub mod error;
pub mod routes;
pub mod types;
pub mod ws;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ScoutConfig>,
    pub registry: Arc<AgentRegistry>,
    pub runtime: Arc<dyn AgentRuntime>,
    pub channels: Arc<ChannelRegistry>,
    pub broker: Arc<ClarificationBroker>,
    /// Per-session locks to prevent concurrent research jobs on the same session.
    pub session_locks: Arc<RwLock<HashMap<String, Arc<Mutex<()>>>>>,
}

/// Build the Axum router with all routes and shared state.
///
/// Fails when the built-in agent configuration is invalid — a bad handoff
/// graph is fatal at startup, never recovered at run time.
pub fn build_router(config: ScoutConfig) -> anyhow::Result<(Router, AppState)> {
    let registry = builtin_registry();
    registry.validate_handoff_graph()?;

    let runtime: Arc<dyn AgentRuntime> = Arc::new(HttpAgentRuntime::new(HttpRuntimeConfig {
        endpoint: config.runtime_endpoint.clone(),
        model: config.model.clone(),
    }));

    let channels = Arc::new(ChannelRegistry::new());
    let broker = Arc::new(ClarificationBroker::new(
        channels.clone(),
        config.clarification_timeout(),
    ));

    let state = AppState {
        config: Arc::new(config),
        registry: Arc::new(registry),
        runtime,
        channels,
        broker,
        session_locks: Arc::new(RwLock::new(HashMap::new())),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    let app = Router::new()
        .route("/health", get(health))
        .route("/ws/:session_id", get(ws::session::handler))
        .nest("/api", routes::api_router())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state.clone());

    Ok((app, state))
}

/// Start the Scout server and block until shutdown.
pub async fn start_server(config: ScoutConfig) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    let (app, _state) = build_router(config)?;

    tracing::info!("Scout server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

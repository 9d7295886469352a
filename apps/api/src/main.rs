mod chat;
mod classifier;
mod config;
mod errors;
mod fit;
mod guardrails;
mod llm_client;
mod middleware;
mod models;
mod retrieval;
mod routes;
mod session;
mod state;

use anyhow::Result;
use std::net::SocketAddr;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing or malformed env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}={}",
                env!("CARGO_PKG_NAME").replace('-', "_"),
                &config.rust_log
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Resume Chat API v{}", env!("CARGO_PKG_VERSION"));

    // Backends are fixed for the life of the process
    let state = AppState::new(config.clone());
    info!(
        retrieval_policy = ?state.retrieval.policy(),
        retrieval_url = %config.retrieval_url,
        llm_policy = ?state.llm.policy(),
        model = %state.llm.model(),
        "Backends initialized"
    );
    info!(
        ttl_secs = config.session_ttl.as_secs(),
        max_sessions = config.max_sessions,
        rate_limit_per_minute = config.rate_limit_per_minute,
        query_rewrite = config.query_rewrite_enabled,
        "Session store and limits configured"
    );

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

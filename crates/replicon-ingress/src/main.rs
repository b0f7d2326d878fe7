//! replicon-ingress entry point.
//!
//! Thin by design: sets up tracing, connects to Postgres, builds the
//! shared state, wires middleware, and starts the HTTP server. Route
//! handlers live in `webhook.rs`.

use std::sync::Arc;

use anyhow::Context;
use replicon_config::Settings;
use replicon_ingress::{build_router, state::AppState};
use tower_http::cors::CorsLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::{info, Level};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Dev convenience; silent if absent — production injects env vars directly.
    let _ = dotenvy::from_filename(".env.local");

    init_tracing();

    let settings = Settings::from_env().context("failed to load settings")?;

    let pool = replicon_db::connect(&settings.database_url, settings.db_pool_size)
        .await
        .context("failed to connect to Postgres")?;
    replicon_db::migrate(&pool).await.context("failed to run migrations")?;

    let state = Arc::new(AppState::new(pool));

    let app = build_router(state).layer(
        TraceLayer::new_for_http()
            .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
            .on_response(DefaultOnResponse::new().level(Level::INFO)),
    )
    .layer(CorsLayer::permissive());

    let listener = tokio::net::TcpListener::bind(&settings.ingress_addr)
        .await
        .with_context(|| format!("failed to bind {}", settings.ingress_addr))?;

    info!(addr = %settings.ingress_addr, "replicon-ingress listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server crashed")?;

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

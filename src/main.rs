use std::env;
use std::sync::Arc;

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;

use botforge_backend::core::config::{AppPaths, ConfigService};
use botforge_backend::core::logging;
use botforge_backend::server;
use botforge_backend::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let paths = Arc::new(AppPaths::new());
    logging::init(&paths);

    let config_service = ConfigService::new(paths.clone());
    let state = AppState::initialize(&config_service).await?;
    tracing::debug!(config = %config_service.redacted(&state.config), "Effective configuration");

    let port = env::var("PORT")
        .ok()
        .and_then(|val| val.parse::<u16>().ok())
        .unwrap_or(state.config.server.port);
    let bind_addr = format!("{}:{}", state.config.server.host, port);

    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", bind_addr))?;
    let addr = listener.local_addr()?;

    tracing::info!(
        chatbots = state.chatbots.len(),
        "Listening on {}",
        addr
    );

    let app: Router = server::router::router(state.clone());

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}

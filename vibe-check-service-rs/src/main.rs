//! Vibe Check service entry point

use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::EnvFilter;
use vibe_check::config::{bind_address, DEFAULT_PORT};
use vibe_sdk::config::{EnvConfigProvider, DEFAULT_PROVIDER};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let service =
        vibe_check::build_service(&**DEFAULT_PROVIDER).context("Failed to configure vibe check service")?;

    let addr = bind_address(&EnvConfigProvider::new(), DEFAULT_PORT);
    let app = Arc::new(service).create_router();

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    log::info!("Vibe Check service listening on {}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}

//! squalld entry point.
//!
//! Boots the offline gateway: loads config, opens the store, then runs the
//! precache pass before anything is served — the listener binds only once
//! initialization resolves. Logging goes to stderr as JSON.

use std::sync::Arc;

use anyhow::Result;
use squall_client::{FetchClient, FetchConfig, canonicalize};
use squall_core::{AppConfig, Interceptor, StoreDb};
use tracing_subscriber::EnvFilter;

mod error;
mod gateway;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load()?;
    let origin = canonicalize(&config.origin)?;

    let store = StoreDb::open(&config.db_path).await?;
    let fetcher = FetchClient::new(FetchConfig {
        user_agent: config.user_agent.clone(),
        max_bytes: config.max_bytes,
        timeout: config.timeout(),
        max_redirects: config.max_redirects,
    })?;
    let interceptor = Interceptor::new(store, Arc::new(fetcher));

    let manifest = gateway::manifest_from_config(&config, &origin)?;
    tracing::info!(origin = %origin, entries = manifest.len(), "starting precache pass");
    interceptor.initialize(&manifest).await?;

    let app = gateway::router(gateway::AppState { interceptor, origin });
    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    tracing::info!(addr = %listener.local_addr()?, "precache complete, intercepting requests");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}

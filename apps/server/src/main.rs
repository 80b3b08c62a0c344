mod api;
mod config;
mod error;
mod events;
mod main_lib;

use tracing::info;

use crate::config::ServerConfig;
use crate::main_lib::{app_router, build_state, init_tracing};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing()?;

    let config = ServerConfig::from_env()?;
    let listen_addr = config.listen_addr;
    let state = build_state(config).await?;

    let listener = tokio::net::TcpListener::bind(listen_addr).await?;
    info!("fieldsync server listening on {}", listen_addr);

    let shutdown_state = state.clone();
    axum::serve(listener, app_router(state))
        .with_graceful_shutdown(async move {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {}", err);
            }
            info!("Shutting down");
            shutdown_state.sync.stop_background().await;
        })
        .await?;
    Ok(())
}

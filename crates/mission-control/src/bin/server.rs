//! # Mission Control Server
//!
//! Thin wrapper binary for running Mission Control as a standalone service.
//!
//! ## Usage
//!
//! ```bash
//! # Run with default configuration
//! cargo run --bin mission-server
//!
//! # Point at a specific config file
//! MISSIONCTL_CONFIG=config/mission-control cargo run --bin mission-server
//! ```

use std::time::Duration;

use tracing::{error, info};

use mission_control::bootstrap::{self, MissionControlBootstrap};
use mission_shared::logging;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // .env is optional in every environment
    let _ = dotenvy::dotenv();
    logging::init_tracing();

    info!("Starting Mission Control...");
    info!("   Version: {}", env!("CARGO_PKG_VERSION"));
    info!(
        "   Build Mode: {}",
        if cfg!(debug_assertions) {
            "Debug"
        } else {
            "Release"
        }
    );

    let handle = MissionControlBootstrap::bootstrap()
        .await
        .map_err(|e| format!("Failed to bootstrap Mission Control: {e}"))?;

    info!("Mission Control started successfully!");
    info!("   Press Ctrl+C to shutdown gracefully");

    bootstrap::wait_for_shutdown_signal().await?;

    info!("Shutdown signal received, initiating graceful shutdown...");

    let shutdown_timeout_ms = handle.context.config.server.shutdown_timeout_ms;
    match tokio::time::timeout(Duration::from_millis(shutdown_timeout_ms), handle.stop()).await {
        Ok(Ok(())) => {
            info!("Mission Control stopped");
        }
        Ok(Err(e)) => {
            error!("Failed to stop Mission Control cleanly: {}", e);
        }
        Err(_) => {
            error!(
                timeout_ms = shutdown_timeout_ms,
                "Graceful shutdown timed out, forcing exit"
            );
        }
    }

    info!("Mission Control shutdown complete");
    Ok(())
}

//! glove-bridge: serial-to-WebSocket relay for the sign-language glove
//!
//! - Reads newline-delimited tokens from the glove's serial port
//! - Broadcasts each token, plus device status, to every WebSocket subscriber
//! - Keeps serving subscribers while the device is missing or failing

use std::sync::Arc;

use anyhow::Result;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use glove_bridge::config::BridgeConfig;
use glove_bridge::lifecycle::ShutdownSignal;
use glove_bridge::relay::{Hub, RelayMessage, Server};
use glove_bridge::source::{SerialSource, SourceEvent};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "glove-bridge starting");

    // Load configuration
    let config = BridgeConfig::load()?;
    info!(
        device = %config.device_path,
        baud = config.baud_rate,
        listen = %config.listen_addr(),
        "configuration loaded"
    );

    let shutdown = ShutdownSignal::new();
    let hub = Arc::new(Hub::new(config.queue_depth));

    // Listener first: subscribers must be served even without a glove
    let server = Server::bind(&config.listen_addr(), Arc::clone(&hub)).await?;

    // Serial reader thread -> relay
    let (source_tx, mut source_rx) = mpsc::channel::<SourceEvent>(256);
    let source = SerialSource::new(
        config.device_path.clone(),
        config.baud_rate,
        config.retry,
        source_tx,
    );
    if let Err(e) = source.start() {
        error!(?e, "failed to start serial reader");
        warn!("continuing without a glove - subscribers will only see relay status");
    }

    info!(
        "glove bridge running. WS: ws://{}  Serial: {}@{}",
        config.listen_addr(),
        config.device_path,
        config.baud_rate
    );

    tokio::select! {
        // Fan serial events out to subscribers
        _ = async {
            while let Some(event) = source_rx.recv().await {
                let message = RelayMessage::from(event);
                let delivered = hub.broadcast(&message);
                debug!(?message, delivered, "relayed");
            }
        } => {
            info!("serial reader exited");
        }

        // Accept subscriber connections
        result = server.run() => {
            if let Err(e) = result {
                error!(?e, "relay server error");
            }
        }

        _ = shutdown.wait() => {
            info!("shutdown signal received");
        }
    }

    info!("shutting down...");

    source.stop();
    server.shutdown().await;

    info!("glove-bridge stopped");

    Ok(())
}

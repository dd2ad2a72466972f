//! WebSocket listener for relay subscribers
//!
//! Each accepted connection becomes one hub subscriber. The connection task
//! forwards the subscriber's queued frames to the socket and watches the
//! socket for closure; whichever side ends first tears the pair down.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;
use tracing::{debug, error, info, warn};

use super::hub::{Hub, Subscription};
use super::protocol::RelayMessage;

/// How long shutdown waits for connections to flush
const SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

/// Relay server accepting WebSocket subscribers
pub struct Server {
    listener: TcpListener,
    hub: Arc<Hub>,
    shutdown_tx: broadcast::Sender<()>,
}

impl Server {
    /// Bind the listener
    pub async fn bind(addr: &str, hub: Arc<Hub>) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("failed to bind relay listener on {}", addr))?;

        let (shutdown_tx, _) = broadcast::channel(1);

        info!(addr = %listener.local_addr()?, "relay listening");

        Ok(Self {
            listener,
            hub,
            shutdown_tx,
        })
    }

    /// Address actually bound (useful with port 0)
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Run the server, accepting connections
    pub async fn run(&self) -> Result<()> {
        loop {
            match self.listener.accept().await {
                Ok((stream, peer)) => {
                    debug!(%peer, "client connected");
                    let hub = Arc::clone(&self.hub);
                    let shutdown_rx = self.shutdown_tx.subscribe();

                    tokio::spawn(async move {
                        if let Err(e) = Self::handle_client(stream, hub, shutdown_rx).await {
                            warn!(%peer, ?e, "client handler error");
                        }
                    });
                }
                Err(e) => {
                    error!(?e, "accept error");
                }
            }
        }
    }

    /// Handle a single client connection
    async fn handle_client(
        stream: TcpStream,
        hub: Arc<Hub>,
        shutdown_rx: broadcast::Receiver<()>,
    ) -> Result<()> {
        let ws = tokio_tungstenite::accept_async(stream)
            .await
            .context("websocket handshake failed")?;

        let mut subscription = hub.subscribe();
        let id = subscription.id();
        let result = Self::pump(ws, &mut subscription, shutdown_rx).await;
        hub.unsubscribe(id);

        debug!(subscriber = id, "client disconnected");
        result
    }

    /// Forward queued frames until either side closes
    async fn pump(
        ws: WebSocketStream<TcpStream>,
        subscription: &mut Subscription,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) -> Result<()> {
        let (mut sink, mut incoming) = ws.split();

        loop {
            tokio::select! {
                frame = subscription.recv() => match frame {
                    Some(frame) => {
                        sink.send(Message::Text(frame.to_string()))
                            .await
                            .context("failed to send frame")?;
                    }
                    None => {
                        // Dropped by the hub (queue overflow)
                        let _ = sink.close().await;
                        return Ok(());
                    }
                },
                msg = incoming.next() => match msg {
                    Some(Ok(Message::Close(_))) | None => return Ok(()),
                    Some(Ok(_)) => {
                        // Subscribers have nothing to say to the relay
                    }
                    Some(Err(e)) => return Err(e.into()),
                },
                _ = shutdown_rx.recv() => {
                    // Flush whatever was queued before shutdown, then close
                    while let Some(frame) = subscription.try_recv() {
                        sink.send(Message::Text(frame.to_string())).await?;
                    }
                    let _ = sink.close().await;
                    debug!("client handler shutting down");
                    return Ok(());
                }
            }
        }
    }

    /// Gracefully shutdown the server
    ///
    /// Subscribers are told the relay is going away, then every connection
    /// flushes its queue and closes. Waits up to `SHUTDOWN_GRACE` for them.
    pub async fn shutdown(&self) {
        let told = self.hub.broadcast(&RelayMessage::shutting_down());
        let _ = self.shutdown_tx.send(());

        // Each live connection task holds one shutdown receiver
        let deadline = tokio::time::Instant::now() + SHUTDOWN_GRACE;
        while self.shutdown_tx.receiver_count() > 0 && tokio::time::Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        info!(
            subscribers = told,
            lingering = self.shutdown_tx.receiver_count(),
            "relay shutdown complete"
        );
    }
}

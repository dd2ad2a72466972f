//! Subscriber-side connection to the relay
//!
//! Keeps one WebSocket connection open, reconnecting with exponential
//! backoff, and forwards raw text frames to the consumer. Frames are not
//! parsed here; malformed ones are the session's business.

use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use crate::config::RetryPolicy;
use crate::lifecycle::Backoff;

/// What the client reports to its consumer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// WebSocket connection established
    Connected,
    /// One text frame from the relay
    Frame(String),
    /// Connection failed or dropped; a reconnect follows
    Disconnected(String),
}

/// Reconnecting relay subscriber
pub struct RelayClient {
    url: String,
    retry: RetryPolicy,
}

impl RelayClient {
    pub fn new(url: impl Into<String>, retry: RetryPolicy) -> Self {
        Self {
            url: url.into(),
            retry,
        }
    }

    /// Connect and forward events until the receiver is dropped
    pub async fn run(&self, events: mpsc::Sender<ClientEvent>) {
        let mut backoff = Backoff::new(self.retry);

        loop {
            let reason = match connect_async(self.url.as_str()).await {
                Ok((mut ws, _)) => {
                    info!(url = %self.url, "connected to relay");
                    backoff.reset();
                    if events.send(ClientEvent::Connected).await.is_err() {
                        return;
                    }

                    let mut reason = "connection closed".to_string();
                    while let Some(msg) = ws.next().await {
                        let frame = match msg {
                            Ok(Message::Text(text)) => text,
                            Ok(Message::Binary(bytes)) => match String::from_utf8(bytes) {
                                Ok(text) => text,
                                Err(_) => {
                                    debug!("dropping non-UTF-8 binary frame");
                                    continue;
                                }
                            },
                            Ok(Message::Close(_)) => break,
                            Ok(_) => continue,
                            Err(e) => {
                                reason = e.to_string();
                                break;
                            }
                        };
                        if events.send(ClientEvent::Frame(frame)).await.is_err() {
                            return;
                        }
                    }
                    reason
                }
                Err(e) => e.to_string(),
            };

            warn!(url = %self.url, %reason, "relay connection lost");
            if events.send(ClientEvent::Disconnected(reason)).await.is_err() {
                return;
            }

            let delay = backoff.next_delay();
            debug!(delay_ms = delay.as_millis() as u64, "reconnecting to relay");
            tokio::time::sleep(delay).await;
        }
    }
}

//! Subscriber registry and fan-out
//!
//! Every subscriber owns a bounded queue of encoded frames. Fan-out never
//! waits: a frame is offered with `try_send`, and a subscriber whose queue
//! is closed or full is dropped from the registry on the spot. Registration
//! and fan-out take the same lock, so the set cannot change mid-iteration.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, info, warn};

use super::protocol::RelayMessage;

/// One encoded wire frame, shared by all subscribers
pub type Frame = Arc<str>;

/// Broadcast hub for relay messages
pub struct Hub {
    registry: Mutex<Registry>,
    queue_depth: usize,
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    subscribers: HashMap<u64, mpsc::Sender<Frame>>,
}

/// Receiving end handed to a connection task
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    rx: mpsc::Receiver<Frame>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Next frame, or `None` once the hub has dropped this subscriber
    pub async fn recv(&mut self) -> Option<Frame> {
        self.rx.recv().await
    }

    /// Next frame if one is already queued
    pub fn try_recv(&mut self) -> Option<Frame> {
        self.rx.try_recv().ok()
    }
}

impl Hub {
    /// Create a hub whose subscribers may fall `queue_depth` frames behind
    pub fn new(queue_depth: usize) -> Self {
        Self {
            registry: Mutex::new(Registry::default()),
            queue_depth: queue_depth.max(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Registry> {
        // A panic while holding the lock cannot leave the map half-updated
        self.registry.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Register a subscriber
    ///
    /// The new subscriber, and only it, is greeted with the
    /// `connected_to_bridge` status. It sees nothing broadcast earlier.
    pub fn subscribe(&self) -> Subscription {
        let (tx, rx) = mpsc::channel(self.queue_depth);
        let greeting: Frame = RelayMessage::connected().to_json().into();

        let mut registry = self.lock();
        let id = registry.next_id;
        registry.next_id += 1;

        // Fresh queue with capacity >= 1, so the greeting always fits
        let _ = tx.try_send(greeting);
        registry.subscribers.insert(id, tx);

        info!(subscriber = id, total = registry.subscribers.len(), "subscriber registered");
        Subscription { id, rx }
    }

    /// Remove a subscriber explicitly (its connection closed)
    pub fn unsubscribe(&self, id: u64) {
        let mut registry = self.lock();
        if registry.subscribers.remove(&id).is_some() {
            debug!(subscriber = id, total = registry.subscribers.len(), "subscriber removed");
        }
    }

    /// Deliver one message to every open subscriber
    ///
    /// Returns how many subscribers accepted it.
    pub fn broadcast(&self, message: &RelayMessage) -> usize {
        let frame: Frame = message.to_json().into();
        let mut delivered = 0;

        let mut registry = self.lock();
        registry.subscribers.retain(|id, tx| match tx.try_send(Arc::clone(&frame)) {
            Ok(()) => {
                delivered += 1;
                true
            }
            Err(TrySendError::Full(_)) => {
                warn!(subscriber = id, "subscriber queue full, dropping subscriber");
                false
            }
            Err(TrySendError::Closed(_)) => {
                debug!(subscriber = id, "subscriber closed, dropping");
                false
            }
        });

        delivered
    }

    /// Number of registered subscribers
    pub fn subscriber_count(&self) -> usize {
        self.lock().subscribers.len()
    }
}

//! Relay wire protocol
//!
//! One JSON object per WebSocket text frame, tagged by `type`:
//!
//! ```text
//! { "type": "status", "ok": true, "message": "connected_to_bridge" }
//! { "type": "glove",  "text": "A" }
//! ```

use serde::{Deserialize, Serialize};

use crate::source::SourceEvent;

/// Well-known status messages
pub mod status {
    /// Sent to each subscriber, and only to it, when it connects
    pub const CONNECTED: &str = "connected_to_bridge";
    /// Prefix of the device-open status
    pub const SERIAL_OPEN: &str = "serial_open";
    /// Prefix of device error statuses
    pub const SERIAL_ERROR: &str = "serial_error";
    /// Broadcast before the relay closes its sockets
    pub const SHUTTING_DOWN: &str = "bridge_shutting_down";
}

/// Messages broadcast by the relay
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RelayMessage {
    /// Relay or device lifecycle
    Status { ok: bool, message: String },
    /// One raw token from the glove
    Glove { text: String },
}

impl RelayMessage {
    pub fn connected() -> Self {
        RelayMessage::Status {
            ok: true,
            message: status::CONNECTED.to_string(),
        }
    }

    pub fn serial_open(path: &str, baud: u32) -> Self {
        RelayMessage::Status {
            ok: true,
            message: format!("{}:{}@{}", status::SERIAL_OPEN, path, baud),
        }
    }

    pub fn serial_error(description: &str) -> Self {
        RelayMessage::Status {
            ok: false,
            message: format!("{}:{}", status::SERIAL_ERROR, description),
        }
    }

    pub fn shutting_down() -> Self {
        RelayMessage::Status {
            ok: false,
            message: status::SHUTTING_DOWN.to_string(),
        }
    }

    /// Encode as one wire frame
    pub fn to_json(&self) -> String {
        // Both variants hold only strings and bools, which always serialize
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Decode one wire frame; `None` for anything that is not a relay message
    pub fn parse(frame: &str) -> Option<Self> {
        serde_json::from_str(frame).ok()
    }
}

impl From<SourceEvent> for RelayMessage {
    fn from(event: SourceEvent) -> Self {
        match event {
            SourceEvent::Opened { path, baud } => RelayMessage::serial_open(&path, baud),
            SourceEvent::Line(text) => RelayMessage::Glove { text },
            SourceEvent::Failed(e) => RelayMessage::serial_error(&e),
        }
    }
}

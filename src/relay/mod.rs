//! Relay between the serial source and WebSocket subscribers

mod client;
mod hub;
mod protocol;
mod server;

pub use client::{ClientEvent, RelayClient};
pub use hub::{Hub, Subscription};
pub use protocol::{status, RelayMessage};
pub use server::Server;

//! glove-bridge: sign-language glove to speech
//!
//! - [`source`]: serial reader producing glove tokens
//! - [`relay`]: broadcast hub and WebSocket transport for those tokens
//! - [`session`]: consumer-side word assembly and speech dispatch
//! - [`speech`]: ElevenLabs client and audio sinks

pub mod config;
pub mod events;
pub mod lifecycle;
pub mod relay;
pub mod session;
pub mod source;
pub mod speech;

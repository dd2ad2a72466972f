//! Speech collaborator boundary
//!
//! The core only needs "text + voice in, audio bytes or error out". The
//! ElevenLabs HTTP binding and the audio sinks live here so the session
//! code can be tested against an in-memory synthesizer.

mod elevenlabs;
mod request;
mod sink;
mod voices;

pub use elevenlabs::ElevenLabsClient;
pub use request::{SpeechError, SpeechRequest, SpeechSynthesizer, VoiceSettings};
pub use sink::{AudioSink, DirectorySink, DiscardSink};
pub use voices::{pick_first_voice, VoiceDescriptor};

//! Speech request types and the synthesizer trait

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Errors returned by a speech collaborator
#[derive(Debug, thiserror::Error)]
pub enum SpeechError {
    /// The API answered with a non-success status
    #[error("API error {status}: {body}")]
    Api { status: u16, body: String },

    /// Connection, TLS or timeout failure
    #[error("request failed: {0}")]
    Transport(String),

    /// The response could not be decoded
    #[error("failed to parse response: {0}")]
    Parse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for SpeechError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            SpeechError::Parse(e.to_string())
        } else {
            SpeechError::Transport(e.to_string())
        }
    }
}

/// Voice settings sent with every synthesis request
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VoiceSettings {
    pub stability: f32,
    pub similarity_boost: f32,
    pub style: f32,
    pub use_speaker_boost: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speed: Option<f32>,
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self {
            stability: 0.5,
            similarity_boost: 0.75,
            style: 0.0,
            use_speaker_boost: true,
            speed: None,
        }
    }
}

/// One outbound synthesis request
#[derive(Debug, Clone, PartialEq)]
pub struct SpeechRequest {
    pub text: String,
    pub voice_id: String,
    pub settings: VoiceSettings,
}

/// Something that turns text into audio bytes
///
/// Implementors must be `Send + Sync` so one instance can be shared by the
/// dispatch guard and its spawned request tasks.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, request: &SpeechRequest) -> Result<Vec<u8>, SpeechError>;
}

//! Events reported by a glove session
//!
//! Structured updates for whatever presents the session to the user:
//! connection status, the word being spelled, and speech progress.

use serde::{Deserialize, Serialize};

/// Events emitted by a session as it processes relay traffic
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    /// Connection status line changed
    Connection { status: String },

    /// Word buffer changed
    WordChanged { word: String },

    /// A synthesis request was issued
    SpeechStarted { text: String, voice_id: String },

    /// Synthesis succeeded
    SpeechFinished {
        text: String,
        /// Size of the returned audio
        bytes: usize,
    },

    /// Synthesis failed; `message` is the collaborator's error
    SpeechFailed { message: String },
}

impl std::fmt::Display for SessionEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionEvent::Connection { status } => write!(f, "GLOVE: {}", status),
            SessionEvent::WordChanged { word } => write!(f, "WORD: {}", word),
            SessionEvent::SpeechStarted { text, .. } => write!(f, "SPEAK: {}", text),
            SessionEvent::SpeechFinished { text, bytes } => {
                write!(f, "SPOKE: {} ({} bytes)", text, bytes)
            }
            SessionEvent::SpeechFailed { message } => write!(f, "TTS error: {}", message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization() {
        let event = SessionEvent::SpeechFinished {
            text: "HELLO".to_string(),
            bytes: 1500,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("speech_finished"));
        assert!(json.contains("1500"));
    }

    #[test]
    fn test_event_deserialization() {
        let json = r#"{"type":"word_changed","word":"HI"}"#;
        let event: SessionEvent = serde_json::from_str(json).unwrap();
        assert_eq!(
            event,
            SessionEvent::WordChanged {
                word: "HI".to_string()
            }
        );
    }

    #[test]
    fn test_failure_display() {
        let event = SessionEvent::SpeechFailed {
            message: "API error 401: bad key".to_string(),
        };
        assert_eq!(event.to_string(), "TTS error: API error 401: bad key");
    }
}

//! Destinations for synthesized audio

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use super::request::SpeechError;

/// Receives the audio bytes of one finished utterance
#[async_trait]
pub trait AudioSink: Send + Sync {
    async fn accept(&self, text: &str, audio: &[u8]) -> Result<(), SpeechError>;
}

/// Drops the audio; only its size is logged
#[derive(Debug, Default)]
pub struct DiscardSink;

#[async_trait]
impl AudioSink for DiscardSink {
    async fn accept(&self, text: &str, audio: &[u8]) -> Result<(), SpeechError> {
        debug!(text, bytes = audio.len(), "audio discarded");
        Ok(())
    }
}

/// Writes each utterance to `<dir>/<unix-millis>-<word>.mp3`
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn file_name(text: &str, millis: u128) -> String {
        let stem: String = text
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .take(40)
            .collect();
        format!("{}-{}.mp3", millis, stem)
    }
}

#[async_trait]
impl AudioSink for DirectorySink {
    async fn accept(&self, text: &str, audio: &[u8]) -> Result<(), SpeechError> {
        let millis = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default();

        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.dir.join(Self::file_name(text, millis));
        tokio::fs::write(&path, audio).await?;

        debug!(?path, bytes = audio.len(), "audio written");
        Ok(())
    }
}

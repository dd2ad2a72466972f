//! ElevenLabs HTTP client
//!
//! Covers the two remote calls the glove consumer needs: text-to-speech and
//! the similar-voices lookup. Connection details come from
//! [`SpeakerConfig`]; the base URL is overridable so tests and proxies can
//! point it elsewhere.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use tracing::{debug, info};

use crate::config::SpeakerConfig;

use super::request::{SpeechError, SpeechRequest, SpeechSynthesizer};
use super::voices::VoiceDescriptor;

/// Calls the ElevenLabs REST API
pub struct ElevenLabsClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model_id: String,
    output_format: String,
}

impl ElevenLabsClient {
    /// Build a client from the speaker configuration
    pub fn from_config(config: &SpeakerConfig) -> Result<Self, SpeechError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model_id: config.model_id.clone(),
            output_format: config.output_format.clone(),
        })
    }

    fn synthesis_url(&self, voice_id: &str) -> String {
        format!("{}/v1/text-to-speech/{}", self.base_url, voice_id)
    }

    fn synthesis_body(&self, request: &SpeechRequest) -> serde_json::Value {
        serde_json::json!({
            "text": request.text,
            "model_id": self.model_id,
            "output_format": self.output_format,
            "voice_settings": request.settings,
        })
    }

    /// Upload an audio sample and return voices that sound like it
    pub async fn find_similar_voices(
        &self,
        audio: Vec<u8>,
    ) -> Result<Vec<VoiceDescriptor>, SpeechError> {
        let part = Part::bytes(audio)
            .file_name("sample.webm")
            .mime_str("audio/webm")?;
        let form = Form::new().part("audio_file", part);

        let res = self
            .client
            .post(format!("{}/v1/similar-voices", self.base_url))
            .header("xi-api-key", &self.api_key)
            .multipart(form)
            .send()
            .await?;

        let status = res.status();
        let text = res.text().await?;
        if !status.is_success() {
            return Err(SpeechError::Api {
                status: status.as_u16(),
                body: text,
            });
        }

        let body: serde_json::Value =
            serde_json::from_str(&text).map_err(|e| SpeechError::Parse(e.to_string()))?;
        let voices = VoiceDescriptor::list_from_response(&body);
        info!(count = voices.len(), "similar voices found");
        Ok(voices)
    }
}

#[async_trait]
impl SpeechSynthesizer for ElevenLabsClient {
    async fn synthesize(&self, request: &SpeechRequest) -> Result<Vec<u8>, SpeechError> {
        debug!(voice_id = %request.voice_id, chars = request.text.len(), "synthesis request");

        let res = self
            .client
            .post(self.synthesis_url(&request.voice_id))
            .header("xi-api-key", &self.api_key)
            .header(reqwest::header::ACCEPT, "audio/mpeg")
            .json(&self.synthesis_body(request))
            .send()
            .await?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(SpeechError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let audio = res.bytes().await?;
        Ok(audio.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::speech::VoiceSettings;

    fn client() -> ElevenLabsClient {
        let config = SpeakerConfig::from_lookup(|key| match key {
            "ELEVENLABS_API_KEY" => Some("test-key".to_string()),
            "ELEVENLABS_BASE_URL" => Some("http://localhost:9999/".to_string()),
            _ => None,
        })
        .unwrap();
        ElevenLabsClient::from_config(&config).unwrap()
    }

    #[test]
    fn test_synthesis_url_trims_slash() {
        assert_eq!(
            client().synthesis_url("v1"),
            "http://localhost:9999/v1/text-to-speech/v1"
        );
    }

    #[test]
    fn test_synthesis_body() {
        let request = SpeechRequest {
            text: "HELLO".to_string(),
            voice_id: "v1".to_string(),
            settings: VoiceSettings::default(),
        };
        let body = client().synthesis_body(&request);
        assert_eq!(body["text"], "HELLO");
        assert_eq!(body["model_id"], "eleven_multilingual_v2");
        assert_eq!(body["output_format"], "mp3_44100_128");
        assert_eq!(body["voice_settings"]["stability"], 0.5);
        assert!(body.get("voice_id").is_none());
    }

    #[tokio::test]
    async fn test_transport_failure_is_reported() {
        // Nothing listens on port 9; the request must fail without panicking
        let config = SpeakerConfig::from_lookup(|key| match key {
            "ELEVENLABS_API_KEY" => Some("k".to_string()),
            "ELEVENLABS_BASE_URL" => Some("http://127.0.0.1:9".to_string()),
            _ => None,
        })
        .unwrap();
        let client = ElevenLabsClient::from_config(&config).unwrap();
        let request = SpeechRequest {
            text: "HI".to_string(),
            voice_id: "v1".to_string(),
            settings: VoiceSettings::default(),
        };
        let err = client.synthesize(&request).await.unwrap_err();
        assert!(matches!(err, SpeechError::Transport(_)));
    }
}

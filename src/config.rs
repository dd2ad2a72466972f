//! Configuration loading and management
//!
//! Both binaries read their settings from the environment once at startup.
//! Every variable has a documented default except `ELEVENLABS_API_KEY`.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::speech::VoiceSettings;

/// Errors raised while reading configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {value:?}")]
    Invalid { var: &'static str, value: String },

    #[error("{0} must be set")]
    Missing(&'static str),
}

/// Default serial device for the glove
#[cfg(windows)]
pub const DEFAULT_DEVICE: &str = "COM6";
#[cfg(not(windows))]
pub const DEFAULT_DEVICE: &str = "/dev/ttyUSB0";

pub const DEFAULT_BAUD: u32 = 115_200;
pub const DEFAULT_WS_PORT: u16 = 8787;

/// Exponential backoff bounds for reopening the device and reconnecting to the relay
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub initial: Duration,
    pub max: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial: Duration::from_millis(500),
            max: Duration::from_secs(30),
        }
    }
}

/// Relay (`glove-bridge`) configuration
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Serial device path (`GLOVE_PORT`)
    pub device_path: String,

    /// Serial baud rate (`GLOVE_BAUD`)
    pub baud_rate: u32,

    /// Interface the WebSocket listener binds to (`WS_HOST`)
    pub listen_host: String,

    /// WebSocket listen port (`WS_PORT`)
    pub listen_port: u16,

    /// Per-subscriber queue depth before the subscriber is dropped
    pub queue_depth: usize,

    pub retry: RetryPolicy,
}

impl BridgeConfig {
    /// Load configuration from environment and defaults
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let queue_depth = parse_or(&lookup, "GLOVE_QUEUE_DEPTH", 256usize)?;
        if queue_depth == 0 {
            return Err(ConfigError::Invalid {
                var: "GLOVE_QUEUE_DEPTH",
                value: "0".to_string(),
            });
        }

        Ok(Self {
            device_path: non_empty(&lookup, "GLOVE_PORT")
                .unwrap_or_else(|| DEFAULT_DEVICE.to_string()),
            baud_rate: parse_or(&lookup, "GLOVE_BAUD", DEFAULT_BAUD)?,
            listen_host: non_empty(&lookup, "WS_HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            listen_port: parse_or(&lookup, "WS_PORT", DEFAULT_WS_PORT)?,
            queue_depth,
            retry: retry_policy(&lookup)?,
        })
    }

    /// Socket address string for the listener
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.listen_host, self.listen_port)
    }
}

/// Consumer (`glove-speaker`) configuration
#[derive(Debug, Clone)]
pub struct SpeakerConfig {
    /// WebSocket URL of the relay (`GLOVE_BRIDGE_URL`)
    pub bridge_url: String,

    pub api_key: String,
    pub api_base_url: String,
    pub model_id: String,
    pub output_format: String,
    pub request_timeout: Duration,

    /// Voice to speak with, if chosen up front (`GLOVE_VOICE_ID`)
    pub voice_id: Option<String>,

    /// Audio sample used to look up a similar voice (`GLOVE_VOICE_SAMPLE`)
    pub voice_sample: Option<PathBuf>,

    /// Where synthesized audio is written; discarded when unset
    pub audio_dir: Option<PathBuf>,

    pub voice_settings: VoiceSettings,
    pub retry: RetryPolicy,
}

impl SpeakerConfig {
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key =
            non_empty(&lookup, "ELEVENLABS_API_KEY").ok_or(ConfigError::Missing("ELEVENLABS_API_KEY"))?;

        let defaults = VoiceSettings::default();
        let voice_settings = VoiceSettings {
            stability: parse_or(&lookup, "VOICE_STABILITY", defaults.stability)?,
            similarity_boost: parse_or(&lookup, "VOICE_SIMILARITY_BOOST", defaults.similarity_boost)?,
            style: parse_or(&lookup, "VOICE_STYLE", defaults.style)?,
            use_speaker_boost: parse_or(&lookup, "VOICE_SPEAKER_BOOST", defaults.use_speaker_boost)?,
            speed: parse_opt(&lookup, "VOICE_SPEED")?,
        };

        Ok(Self {
            bridge_url: non_empty(&lookup, "GLOVE_BRIDGE_URL")
                .unwrap_or_else(|| format!("ws://localhost:{}", DEFAULT_WS_PORT)),
            api_key,
            api_base_url: non_empty(&lookup, "ELEVENLABS_BASE_URL")
                .unwrap_or_else(|| "https://api.elevenlabs.io".to_string()),
            model_id: non_empty(&lookup, "ELEVENLABS_MODEL_ID")
                .unwrap_or_else(|| "eleven_multilingual_v2".to_string()),
            output_format: non_empty(&lookup, "ELEVENLABS_OUTPUT_FORMAT")
                .unwrap_or_else(|| "mp3_44100_128".to_string()),
            request_timeout: Duration::from_secs(parse_or(&lookup, "ELEVENLABS_TIMEOUT_SECS", 60u64)?),
            voice_id: non_empty(&lookup, "GLOVE_VOICE_ID"),
            voice_sample: non_empty(&lookup, "GLOVE_VOICE_SAMPLE").map(PathBuf::from),
            audio_dir: non_empty(&lookup, "GLOVE_AUDIO_DIR").map(PathBuf::from),
            voice_settings,
            retry: retry_policy(&lookup)?,
        })
    }
}

fn retry_policy<F>(lookup: &F) -> Result<RetryPolicy, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let defaults = RetryPolicy::default();
    let initial = parse_or(lookup, "GLOVE_RETRY_INITIAL_MS", defaults.initial.as_millis() as u64)?;
    let max = parse_or(lookup, "GLOVE_RETRY_MAX_MS", defaults.max.as_millis() as u64)?;

    Ok(RetryPolicy {
        initial: Duration::from_millis(initial.max(1)),
        max: Duration::from_millis(max.max(initial.max(1))),
    })
}

fn non_empty<F>(lookup: &F, var: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(var)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_opt<F, T>(lookup: &F, var: &'static str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match non_empty(lookup, var) {
        Some(raw) => raw
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { var, value: raw }),
        None => Ok(None),
    }
}

fn parse_or<F, T>(lookup: &F, var: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    Ok(parse_opt(lookup, var)?.unwrap_or(default))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use tokio_test::{assert_err, assert_ok};

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_bridge_defaults() {
        let config = assert_ok!(BridgeConfig::from_lookup(lookup(&[])));
        assert_eq!(config.device_path, DEFAULT_DEVICE);
        assert_eq!(config.baud_rate, 115_200);
        assert_eq!(config.listen_addr(), "127.0.0.1:8787");
        assert_eq!(config.queue_depth, 256);
        assert_eq!(config.retry, RetryPolicy::default());
    }

    #[test]
    fn test_bridge_overrides() {
        let config = BridgeConfig::from_lookup(lookup(&[
            ("GLOVE_PORT", "/dev/ttyACM0"),
            ("GLOVE_BAUD", "9600"),
            ("WS_HOST", "0.0.0.0"),
            ("WS_PORT", "9000"),
            ("GLOVE_RETRY_INITIAL_MS", "100"),
            ("GLOVE_RETRY_MAX_MS", "2000"),
        ]))
        .unwrap();
        assert_eq!(config.device_path, "/dev/ttyACM0");
        assert_eq!(config.baud_rate, 9600);
        assert_eq!(config.listen_addr(), "0.0.0.0:9000");
        assert_eq!(config.retry.initial, Duration::from_millis(100));
        assert_eq!(config.retry.max, Duration::from_secs(2));
    }

    #[test]
    fn test_bridge_rejects_bad_numbers() {
        let err = BridgeConfig::from_lookup(lookup(&[("GLOVE_BAUD", "fast")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: "GLOVE_BAUD", .. }));

        let err = BridgeConfig::from_lookup(lookup(&[("GLOVE_QUEUE_DEPTH", "0")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: "GLOVE_QUEUE_DEPTH", .. }));
    }

    #[test]
    fn test_blank_values_fall_back() {
        let config = BridgeConfig::from_lookup(lookup(&[("GLOVE_PORT", "  ")])).unwrap();
        assert_eq!(config.device_path, DEFAULT_DEVICE);
    }

    #[test]
    fn test_speaker_requires_api_key() {
        let err = assert_err!(SpeakerConfig::from_lookup(lookup(&[])));
        assert!(matches!(err, ConfigError::Missing("ELEVENLABS_API_KEY")));
    }

    #[test]
    fn test_speaker_defaults() {
        let config = SpeakerConfig::from_lookup(lookup(&[("ELEVENLABS_API_KEY", "k")])).unwrap();
        assert_eq!(config.bridge_url, "ws://localhost:8787");
        assert_eq!(config.model_id, "eleven_multilingual_v2");
        assert_eq!(config.output_format, "mp3_44100_128");
        assert_eq!(config.request_timeout, Duration::from_secs(60));
        assert!(config.voice_id.is_none());
        assert!(config.audio_dir.is_none());
        assert_eq!(config.voice_settings, VoiceSettings::default());
    }

    #[test]
    fn test_speaker_voice_settings() {
        let config = SpeakerConfig::from_lookup(lookup(&[
            ("ELEVENLABS_API_KEY", "k"),
            ("GLOVE_VOICE_ID", "v1"),
            ("VOICE_STABILITY", "0.3"),
            ("VOICE_SPEAKER_BOOST", "false"),
            ("VOICE_SPEED", "1.1"),
        ]))
        .unwrap();
        assert_eq!(config.voice_id.as_deref(), Some("v1"));
        assert_eq!(config.voice_settings.stability, 0.3);
        assert!(!config.voice_settings.use_speaker_boost);
        assert_eq!(config.voice_settings.speed, Some(1.1));
    }
}

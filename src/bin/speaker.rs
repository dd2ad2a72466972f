//! glove-speaker: speaks the words spelled on the glove
//!
//! Subscribes to a running glove-bridge, assembles letters into words and
//! sends each finished word to ElevenLabs text-to-speech with the selected
//! voice. Status lines are logged; audio is written to `GLOVE_AUDIO_DIR`
//! when set.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::{broadcast, mpsc};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use glove_bridge::config::SpeakerConfig;
use glove_bridge::events::SessionEvent;
use glove_bridge::lifecycle::ShutdownSignal;
use glove_bridge::relay::RelayClient;
use glove_bridge::session::{DispatchGuard, Session};
use glove_bridge::speech::{
    pick_first_voice, AudioSink, DirectorySink, DiscardSink, ElevenLabsClient,
};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "glove-speaker starting");

    let config = SpeakerConfig::load()?;
    info!(bridge = %config.bridge_url, "configuration loaded");

    let client = Arc::new(
        ElevenLabsClient::from_config(&config).context("failed to build ElevenLabs client")?,
    );
    let voice_id = select_voice(&config, &client).await;

    let sink: Arc<dyn AudioSink> = match &config.audio_dir {
        Some(dir) => {
            info!(?dir, "writing synthesized audio");
            Arc::new(DirectorySink::new(dir))
        }
        None => Arc::new(DiscardSink),
    };

    let (outcome_tx, outcome_rx) = mpsc::channel(8);
    let (event_tx, mut event_rx) = broadcast::channel::<SessionEvent>(64);
    let (client_tx, client_rx) = mpsc::channel(64);

    let guard = DispatchGuard::new(client, config.voice_settings, outcome_tx);
    let mut session = Session::new(guard, event_tx);
    session.set_voice(voice_id);

    let relay = RelayClient::new(config.bridge_url.clone(), config.retry);
    let shutdown = ShutdownSignal::new();

    tokio::select! {
        _ = relay.run(client_tx) => {
            info!("relay client exited");
        }

        _ = session.run(client_rx, outcome_rx, sink) => {
            info!("session exited");
        }

        // Status display
        _ = async {
            loop {
                match event_rx.recv().await {
                    Ok(event) => info!("{}", event),
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(skipped = n, "session event receiver lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        } => {}

        _ = shutdown.wait() => {
            info!("shutdown signal received");
        }
    }

    info!("glove-speaker stopped");
    Ok(())
}

/// Explicit voice id, else the first match for the configured sample
async fn select_voice(config: &SpeakerConfig, client: &ElevenLabsClient) -> Option<String> {
    if let Some(voice_id) = &config.voice_id {
        return Some(voice_id.clone());
    }

    let sample = config.voice_sample.as_ref()?;
    let audio = match tokio::fs::read(sample).await {
        Ok(audio) => audio,
        Err(e) => {
            error!(?sample, ?e, "failed to read voice sample");
            return None;
        }
    };

    match client.find_similar_voices(audio).await {
        Ok(voices) => {
            for voice in &voices {
                info!(name = voice.display_name(), tag = %voice.short_tag(), id = ?voice.voice_id, "candidate voice");
            }
            let picked = pick_first_voice(&voices)?;
            info!(name = picked.display_name(), "using first matching voice");
            picked.voice_id.clone()
        }
        Err(e) => {
            error!(error = %e, "voice lookup failed");
            None
        }
    }
}

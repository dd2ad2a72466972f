//! One glove session: word buffer, voice selection and dispatch guard
//!
//! Turns relay frames into buffer updates and guarded speech requests, and
//! reports everything user-visible as [`SessionEvent`]s. Sessions share
//! nothing, so several can follow the same relay independently.

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, trace, warn};

use crate::events::SessionEvent;
use crate::relay::{status, ClientEvent, RelayMessage};
use crate::speech::AudioSink;

use super::guard::{DispatchGuard, DispatchOutcome, SpeechOutcome};
use super::machine::{InputMachine, Transition};

/// Status line shown while connected
pub const STATUS_CONNECTED: &str = "Connected";

/// Map a relay status message to the connection status line
pub fn display_status(message: &str) -> String {
    if message.contains(status::CONNECTED) || message.contains(status::SERIAL_OPEN) {
        STATUS_CONNECTED.to_string()
    } else {
        message.to_string()
    }
}

/// Per-consumer session state
pub struct Session {
    machine: InputMachine,
    voice_id: Option<String>,
    guard: DispatchGuard,
    event_tx: broadcast::Sender<SessionEvent>,
}

impl Session {
    pub fn new(guard: DispatchGuard, event_tx: broadcast::Sender<SessionEvent>) -> Self {
        Self {
            machine: InputMachine::new(),
            voice_id: None,
            guard,
            event_tx,
        }
    }

    /// Current word buffer
    pub fn word(&self) -> &str {
        self.machine.word()
    }

    pub fn voice_id(&self) -> Option<&str> {
        self.voice_id.as_deref()
    }

    /// Select the voice used for the next dispatch (`None` to clear)
    pub fn set_voice(&mut self, voice_id: Option<String>) {
        info!(voice_id = ?voice_id, "voice selected");
        self.voice_id = voice_id;
    }

    /// Handle one text frame from the relay
    ///
    /// Frames that are not relay messages are dropped without touching the
    /// buffer; the link is expected to carry the odd bit of noise.
    pub fn handle_frame(&mut self, frame: &str) {
        match RelayMessage::parse(frame) {
            Some(message) => self.handle_message(message),
            None => trace!(frame, "dropping malformed frame"),
        }
    }

    pub fn handle_message(&mut self, message: RelayMessage) {
        match message {
            RelayMessage::Status { ok, message } => {
                debug!(ok, %message, "relay status");
                self.emit(SessionEvent::Connection {
                    status: display_status(&message),
                });
            }
            RelayMessage::Glove { text } => self.handle_token(&text),
        }
    }

    fn handle_token(&mut self, token: &str) {
        match self.machine.apply(token) {
            Transition::Ignored | Transition::Erased(false) => {}
            Transition::Appended(_) | Transition::Erased(true) | Transition::Overwritten => {
                self.emit_word();
            }
            Transition::Dispatch { word } => {
                if !word.is_empty() {
                    self.emit_word();
                }
                let voice = self.voice_id.as_deref().unwrap_or("");
                match self.guard.attempt_dispatch(&word, voice) {
                    DispatchOutcome::Dispatched => self.emit(SessionEvent::SpeechStarted {
                        text: word.trim().to_string(),
                        voice_id: voice.trim().to_string(),
                    }),
                    skipped => debug!(?skipped, "dispatch skipped"),
                }
            }
        }
    }

    /// Handle a connection change reported by the relay client
    pub fn handle_client_event(&mut self, event: ClientEvent) {
        match event {
            ClientEvent::Connected => self.emit(SessionEvent::Connection {
                status: STATUS_CONNECTED.to_string(),
            }),
            ClientEvent::Frame(frame) => self.handle_frame(&frame),
            ClientEvent::Disconnected(reason) => self.emit(SessionEvent::Connection {
                status: format!("Disconnected ({})", reason),
            }),
        }
    }

    /// Report the terminal result of a dispatched request
    pub fn handle_outcome(&mut self, outcome: &SpeechOutcome) {
        match &outcome.result {
            Ok(audio) => self.emit(SessionEvent::SpeechFinished {
                text: outcome.request.text.clone(),
                bytes: audio.len(),
            }),
            Err(e) => self.emit(SessionEvent::SpeechFailed {
                message: e.to_string(),
            }),
        }
    }

    /// Run the session until the relay client stops
    pub async fn run(
        &mut self,
        mut client_rx: mpsc::Receiver<ClientEvent>,
        mut outcome_rx: mpsc::Receiver<SpeechOutcome>,
        sink: Arc<dyn AudioSink>,
    ) {
        info!("session started");

        loop {
            tokio::select! {
                event = client_rx.recv() => match event {
                    Some(event) => self.handle_client_event(event),
                    None => break,
                },
                Some(outcome) = outcome_rx.recv() => {
                    self.handle_outcome(&outcome);
                    if let Ok(audio) = &outcome.result {
                        if let Err(e) = sink.accept(&outcome.request.text, audio).await {
                            warn!(?e, "failed to store synthesized audio");
                        }
                    }
                }
            }
        }

        info!("session stopped");
    }

    fn emit_word(&self) {
        self.emit(SessionEvent::WordChanged {
            word: self.machine.word().to_string(),
        });
    }

    fn emit(&self, event: SessionEvent) {
        debug!(%event, "session event");
        let _ = self.event_tx.send(event);
    }
}

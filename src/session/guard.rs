//! Single-flight speech dispatch
//!
//! At most one synthesis request is outstanding per guard. The in-flight
//! flag is claimed atomically before the request task is spawned and
//! released by a drop guard inside that task, so it is cleared on success,
//! API error, transport error and panic alike.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::speech::{SpeechError, SpeechRequest, SpeechSynthesizer, VoiceSettings};

/// Result of one dispatch attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Request issued; its result arrives as a [`SpeechOutcome`]
    Dispatched,
    /// Nothing to say
    EmptyWord,
    /// No voice selected
    NoVoice,
    /// A previous request is still outstanding
    InFlight,
}

/// Terminal result of a dispatched request
#[derive(Debug)]
pub struct SpeechOutcome {
    pub request: SpeechRequest,
    pub result: Result<Vec<u8>, SpeechError>,
}

/// Guards the synthesis collaborator for one session
pub struct DispatchGuard {
    synthesizer: Arc<dyn SpeechSynthesizer>,
    settings: VoiceSettings,
    in_flight: Arc<AtomicBool>,
    outcome_tx: mpsc::Sender<SpeechOutcome>,
}

impl DispatchGuard {
    pub fn new(
        synthesizer: Arc<dyn SpeechSynthesizer>,
        settings: VoiceSettings,
        outcome_tx: mpsc::Sender<SpeechOutcome>,
    ) -> Self {
        Self {
            synthesizer,
            settings,
            in_flight: Arc::new(AtomicBool::new(false)),
            outcome_tx,
        }
    }

    /// Whether a request is currently outstanding
    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Try to speak `word` with `voice_id`
    ///
    /// Preconditions are checked in order: non-empty word, non-empty voice,
    /// nothing in flight. Any failure is a no-op towards the synthesizer.
    /// Must be called from within a tokio runtime.
    pub fn attempt_dispatch(&self, word: &str, voice_id: &str) -> DispatchOutcome {
        let text = word.trim();
        if text.is_empty() {
            return DispatchOutcome::EmptyWord;
        }

        let voice_id = voice_id.trim();
        if voice_id.is_empty() {
            debug!("no voice selected, skipping dispatch");
            return DispatchOutcome::NoVoice;
        }

        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!(text, "speech already in flight, skipping dispatch");
            return DispatchOutcome::InFlight;
        }

        let request = SpeechRequest {
            text: text.to_string(),
            voice_id: voice_id.to_string(),
            settings: self.settings,
        };
        info!(text = %request.text, voice_id = %request.voice_id, "dispatching speech");

        let release = InFlightRelease(Arc::clone(&self.in_flight));
        let synthesizer = Arc::clone(&self.synthesizer);
        let outcome_tx = self.outcome_tx.clone();

        tokio::spawn(async move {
            let result = synthesizer.synthesize(&request).await;
            if let Err(e) = &result {
                warn!(error = %e, "speech synthesis failed");
            }

            // Clear before reporting, so the consumer never sees a finished
            // request while the guard still reads as busy
            drop(release);
            let _ = outcome_tx.send(SpeechOutcome { request, result }).await;
        });

        DispatchOutcome::Dispatched
    }
}

/// Clears the in-flight flag when dropped
struct InFlightRelease(Arc<AtomicBool>);

impl Drop for InFlightRelease {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use tokio::sync::Notify;

    use super::*;

    /// Records every request; optionally holds each one until released
    #[derive(Default)]
    pub(crate) struct RecordingSynth {
        pub calls: Mutex<Vec<SpeechRequest>>,
        pub gate: Option<Arc<Notify>>,
        pub fail: bool,
    }

    impl RecordingSynth {
        pub fn gated() -> (Arc<Self>, Arc<Notify>) {
            let gate = Arc::new(Notify::new());
            let synth = Arc::new(Self {
                gate: Some(Arc::clone(&gate)),
                ..Default::default()
            });
            (synth, gate)
        }

        pub fn calls(&self) -> Vec<SpeechRequest> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl SpeechSynthesizer for RecordingSynth {
        async fn synthesize(&self, request: &SpeechRequest) -> Result<Vec<u8>, SpeechError> {
            self.calls.lock().unwrap().push(request.clone());
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            if self.fail {
                return Err(SpeechError::Api {
                    status: 500,
                    body: "boom".to_string(),
                });
            }
            Ok(request.text.as_bytes().to_vec())
        }
    }

    fn guard(synth: Arc<RecordingSynth>) -> (DispatchGuard, mpsc::Receiver<SpeechOutcome>) {
        let (tx, rx) = mpsc::channel(8);
        (DispatchGuard::new(synth, VoiceSettings::default(), tx), rx)
    }

    #[tokio::test]
    async fn test_preconditions_in_order() {
        let synth = Arc::new(RecordingSynth::default());
        let (guard, _rx) = guard(Arc::clone(&synth));

        assert_eq!(guard.attempt_dispatch("  ", ""), DispatchOutcome::EmptyWord);
        assert_eq!(guard.attempt_dispatch("HI", " "), DispatchOutcome::NoVoice);
        assert!(synth.calls().is_empty());
        assert!(!guard.is_in_flight());
    }

    #[tokio::test]
    async fn test_dispatch_sends_trimmed_request() {
        let synth = Arc::new(RecordingSynth::default());
        let (guard, mut rx) = guard(Arc::clone(&synth));

        assert_eq!(guard.attempt_dispatch(" HELLO ", " v1 "), DispatchOutcome::Dispatched);
        let outcome = rx.recv().await.unwrap();
        assert_eq!(outcome.request.text, "HELLO");
        assert_eq!(outcome.request.voice_id, "v1");
        assert_eq!(outcome.result.unwrap(), b"HELLO".to_vec());
        assert!(!guard.is_in_flight());
    }

    #[tokio::test]
    async fn test_second_dispatch_while_in_flight_is_dropped() {
        let (synth, gate) = RecordingSynth::gated();
        let (guard, mut rx) = guard(Arc::clone(&synth));

        assert_eq!(guard.attempt_dispatch("ONE", "v1"), DispatchOutcome::Dispatched);
        assert!(guard.is_in_flight());
        assert_eq!(guard.attempt_dispatch("TWO", "v1"), DispatchOutcome::InFlight);
        assert_eq!(guard.attempt_dispatch("THREE", "v1"), DispatchOutcome::InFlight);

        gate.notify_one();
        let outcome = rx.recv().await.unwrap();
        assert_eq!(outcome.request.text, "ONE");
        assert_eq!(synth.calls().len(), 1);

        // Released: the next attempt goes through
        assert_eq!(guard.attempt_dispatch("FOUR", "v1"), DispatchOutcome::Dispatched);
        gate.notify_one();
        rx.recv().await.unwrap();
        assert_eq!(synth.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_failure_releases_guard() {
        let synth = Arc::new(RecordingSynth {
            fail: true,
            ..Default::default()
        });
        let (guard, mut rx) = guard(Arc::clone(&synth));

        assert_eq!(guard.attempt_dispatch("HI", "v1"), DispatchOutcome::Dispatched);
        let outcome = rx.recv().await.unwrap();
        assert!(matches!(outcome.result, Err(SpeechError::Api { status: 500, .. })));
        assert!(!guard.is_in_flight());
        assert_eq!(guard.attempt_dispatch("AGAIN", "v1"), DispatchOutcome::Dispatched);
    }
}

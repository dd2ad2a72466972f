//! Serial device reader
//!
//! Owns the glove's serial port on a dedicated thread, since the serial API
//! is blocking. Lines are forwarded to the async side through a bounded
//! channel; when it is full the event is dropped and the device is never
//! throttled. Device failures never end the thread: it reports them and
//! reopens the device with exponential backoff until `stop()` is called.

use std::io::{ErrorKind, Read};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, error, info, warn};

use crate::config::RetryPolicy;
use crate::lifecycle::Backoff;

use super::lines::LineSplitter;

/// How long a single read may block before the running flag is rechecked
const READ_TIMEOUT: Duration = Duration::from_millis(100);

/// Granularity of the interruptible backoff sleep
const SLEEP_SLICE: Duration = Duration::from_millis(50);

/// Events sent from the reader thread to the relay
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceEvent {
    /// Device opened successfully
    Opened { path: String, baud: u32 },
    /// One trimmed, non-empty line
    Line(String),
    /// Open or read failure; the reader will retry
    Failed(String),
}

/// Errors that can occur starting the serial source
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("serial source is already running")]
    AlreadyRunning,

    #[error("failed to spawn reader thread: {0}")]
    ThreadSpawn(String),
}

type DeviceStream = Box<dyn Read + Send>;
type Opener = Box<dyn FnMut() -> Result<DeviceStream, String> + Send>;

/// Reads newline-delimited tokens from one serial device
pub struct SerialSource {
    device_path: String,
    baud_rate: u32,
    retry: RetryPolicy,
    event_tx: mpsc::Sender<SourceEvent>,
    running: Arc<AtomicBool>,
}

impl SerialSource {
    pub fn new(
        device_path: impl Into<String>,
        baud_rate: u32,
        retry: RetryPolicy,
        event_tx: mpsc::Sender<SourceEvent>,
    ) -> Self {
        Self {
            device_path: device_path.into(),
            baud_rate,
            retry,
            event_tx,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Start the reader thread
    ///
    /// Returns immediately; the device is opened on the reader thread so a
    /// missing glove never delays the caller.
    pub fn start(&self) -> Result<(), SourceError> {
        let path = self.device_path.clone();
        let baud = self.baud_rate;
        let opener: Opener = Box::new(move || {
            serialport::new(path.as_str(), baud)
                .timeout(READ_TIMEOUT)
                .open()
                .map(|port| Box::new(port) as DeviceStream)
                .map_err(|e| e.to_string())
        });
        self.start_with(opener)
    }

    fn start_with(&self, opener: Opener) -> Result<(), SourceError> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(SourceError::AlreadyRunning);
        }

        let reader = Reader {
            path: self.device_path.clone(),
            baud: self.baud_rate,
            backoff: Backoff::new(self.retry),
            event_tx: self.event_tx.clone(),
            running: Arc::clone(&self.running),
        };
        let running = Arc::clone(&self.running);

        thread::Builder::new()
            .name("serial-reader".to_string())
            .spawn(move || {
                info!(path = %reader.path, baud = reader.baud, "serial reader thread started");
                reader.run(opener);
                running.store(false, Ordering::SeqCst);
                info!("serial reader thread stopped");
            })
            .map_err(|e| {
                self.running.store(false, Ordering::SeqCst);
                SourceError::ThreadSpawn(e.to_string())
            })?;

        Ok(())
    }

    /// Stop the reader thread; it exits after the current read times out
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Check if the reader thread is currently running
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

/// State owned by the reader thread
struct Reader {
    path: String,
    baud: u32,
    backoff: Backoff,
    event_tx: mpsc::Sender<SourceEvent>,
    running: Arc<AtomicBool>,
}

impl Reader {
    fn run(mut self, mut opener: Opener) {
        let mut splitter = LineSplitter::new();

        while self.is_running() {
            let mut device = match opener() {
                Ok(device) => device,
                Err(e) => {
                    warn!(path = %self.path, error = %e, "failed to open serial device");
                    if !self.emit(SourceEvent::Failed(e)) {
                        return;
                    }
                    self.pause();
                    continue;
                }
            };

            info!(path = %self.path, baud = self.baud, "serial device open");
            self.backoff.reset();
            splitter.clear();
            if !self.emit(SourceEvent::Opened {
                path: self.path.clone(),
                baud: self.baud,
            }) {
                return;
            }

            match self.read_lines(device.as_mut(), &mut splitter) {
                ReadEnd::Stopped => return,
                ReadEnd::Failed(e) => {
                    error!(path = %self.path, error = %e, "serial read failed");
                    if !self.emit(SourceEvent::Failed(e)) {
                        return;
                    }
                    self.pause();
                }
            }
        }
    }

    /// Read until the device fails, the thread is stopped, or the relay goes away
    fn read_lines(&self, device: &mut dyn Read, splitter: &mut LineSplitter) -> ReadEnd {
        let mut buf = [0u8; 256];

        while self.is_running() {
            match device.read(&mut buf) {
                Ok(0) => return ReadEnd::Failed("device closed".to_string()),
                Ok(n) => {
                    for line in splitter.push(&buf[..n]) {
                        debug!(token = %line, "serial line");
                        if !self.emit(SourceEvent::Line(line)) {
                            return ReadEnd::Stopped;
                        }
                    }
                }
                Err(e)
                    if matches!(
                        e.kind(),
                        ErrorKind::TimedOut | ErrorKind::WouldBlock | ErrorKind::Interrupted
                    ) => {}
                Err(e) => return ReadEnd::Failed(e.to_string()),
            }
        }

        ReadEnd::Stopped
    }

    /// Send an event without waiting; false means the receiving side is gone
    fn emit(&self, event: SourceEvent) -> bool {
        match self.event_tx.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(event)) => {
                warn!(?event, "relay not keeping up, dropping serial event");
                true
            }
            Err(TrySendError::Closed(_)) => {
                warn!("failed to send serial event - channel closed?");
                self.running.store(false, Ordering::SeqCst);
                false
            }
        }
    }

    /// Sleep for the next backoff delay, waking early on stop
    fn pause(&mut self) {
        let delay = self.backoff.next_delay();
        debug!(delay_ms = delay.as_millis() as u64, "waiting before reopening serial device");

        let mut slept = Duration::ZERO;
        while slept < delay && self.is_running() {
            let slice = SLEEP_SLICE.min(delay - slept);
            thread::sleep(slice);
            slept += slice;
        }
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

enum ReadEnd {
    Stopped,
    Failed(String),
}

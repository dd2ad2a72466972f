//! Process lifecycle: shutdown signals and reconnect backoff

mod backoff;
mod shutdown;

pub use backoff::Backoff;
pub use shutdown::ShutdownSignal;

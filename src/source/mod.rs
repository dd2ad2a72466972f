//! Token source: the glove's serial line stream
//!
//! A dedicated reader thread owns the serial device and forwards every
//! non-empty line as a token, plus open/error lifecycle signals.

mod lines;
mod serial;

pub use lines::{LineSplitter, MAX_LINE_LEN};
pub use serial::{SerialSource, SourceError, SourceEvent};

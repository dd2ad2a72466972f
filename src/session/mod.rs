//! Glove session: word assembly and guarded speech dispatch
//!
//! - [`InputMachine`]: pure reducer from glove tokens to a word buffer
//! - [`DispatchGuard`]: at most one synthesis request in flight
//! - [`Session`]: ties both to a relay connection and a selected voice

mod guard;
mod machine;
mod runner;

pub use guard::{DispatchGuard, DispatchOutcome, SpeechOutcome};
pub use machine::{InputMachine, Transition};
pub use runner::{display_status, Session, STATUS_CONNECTED};

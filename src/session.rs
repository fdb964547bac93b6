//! Session runtime
//!
//! Drives one conversation at a time: loads it from the transcript store,
//! feeds user input through the state machine, and executes the effects.

mod driver;
mod recovery;
pub mod traits;

#[cfg(test)]
pub mod testing;

pub use driver::{SessionDriver, SessionHandle, SessionUpdate};
pub use traits::TranscriptStore;

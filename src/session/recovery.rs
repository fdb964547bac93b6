//! Resume-state derivation for legacy transcripts
//!
//! Transcripts written before session states were persisted carry no state
//! record; the resting phase is re-derived from the trailing turns by exact
//! substring matching against the fixed marker texts the state machine
//! emits.

use crate::prompt::ACK;
use crate::state_machine::SessionState;
use crate::store::{Role, Turn};

const FEEDBACK_MARKER: &str = "Was this response helpful?";
const DESCRIPTION_MARKER: &str = "Please describe what went wrong";

/// Derive the resting state from a loaded history.
pub fn resume_state(turns: &[Turn]) -> SessionState {
    let Some(last) = turns.last() else {
        return SessionState::Initial;
    };
    if last.role != Role::System {
        return SessionState::Initial;
    }

    if last.content.contains(FEEDBACK_MARKER) {
        let (request, response) = current_round(turns);
        return SessionState::AwaitingFeedback { request, response };
    }
    if last.content.contains(DESCRIPTION_MARKER) {
        let (request, response) = current_round(turns);
        return SessionState::AwaitingDescription { request, response };
    }
    SessionState::Initial
}

/// Recover the request/response pair of the round in progress.
fn current_round(turns: &[Turn]) -> (String, String) {
    let response = turns
        .iter()
        .rev()
        .find(|t| t.role == Role::MainAgent && t.content != ACK)
        .map(|t| t.content.clone())
        .unwrap_or_default();
    (latest_request(turns), response)
}

/// The Programmer turn that opened the current round: the first Programmer
/// turn of the conversation, or the first one after the latest acceptance
/// acknowledgement.
fn latest_request(turns: &[Turn]) -> String {
    let round_start = turns
        .iter()
        .rposition(|t| t.role == Role::MainAgent && t.content == ACK)
        .map_or(0, |i| i + 1);
    turns
        .iter()
        .skip(round_start)
        .find(|t| t.role == Role::Programmer)
        .map(|t| t.content.clone())
        .unwrap_or_default()
}

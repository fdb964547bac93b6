//! Collaboration state types

use crate::budget::ContextWindowTable;
use serde::{Deserialize, Serialize};

// ============================================================================
// Agent Roster
// ============================================================================

/// The three agent seats of the collaboration loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentRole {
    Main,
    Helper1,
    Helper2,
}

/// Model ids selected for a session. Chosen at session start and never
/// persisted with the transcript.
#[derive(Debug, Clone)]
pub struct AgentRoster {
    pub main: String,
    pub helper1: String,
    pub helper2: String,
}

impl AgentRoster {
    pub fn new(
        main: impl Into<String>,
        helper1: impl Into<String>,
        helper2: impl Into<String>,
    ) -> Self {
        Self {
            main: main.into(),
            helper1: helper1.into(),
            helper2: helper2.into(),
        }
    }

    pub fn model_for(&self, agent: AgentRole) -> &str {
        match agent {
            AgentRole::Main => &self.main,
            AgentRole::Helper1 => &self.helper1,
            AgentRole::Helper2 => &self.helper2,
        }
    }
}

/// Immutable configuration for a session
#[derive(Debug, Clone)]
pub struct SessionContext {
    /// Persisted-record key for this conversation
    pub conversation: String,
    pub roster: AgentRoster,
    pub windows: ContextWindowTable,
}

impl SessionContext {
    pub fn new(conversation: impl Into<String>, roster: AgentRoster, windows: ContextWindowTable) -> Self {
        Self {
            conversation: conversation.into(),
            roster,
            windows,
        }
    }
}

// ============================================================================
// Session State
// ============================================================================

/// Collaboration state
///
/// Resting states carry the data of the round in progress so transitions
/// need no mutable fields outside the state value itself. The in-flight
/// states each represent exactly one outstanding model call; all of them
/// reject new submissions until the call settles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionState {
    /// Resting; the next submission opens a new request round
    #[default]
    Initial,

    /// An answer is on screen; expecting yes/no
    AwaitingFeedback { request: String, response: String },

    /// The answer was rejected; expecting a description of what went wrong
    AwaitingDescription { request: String, response: String },

    /// Initial-response call to the main agent in flight
    GeneratingResponse { request: String },

    /// Helper 1 call in flight
    ConsultingHelper1 {
        request: String,
        response: String,
        feedback: String,
        /// Prompt captured before helper 1's turn is appended; helper 2
        /// receives this exact prompt and never sees helper 1's answer.
        helper_prompt: String,
    },

    /// Helper 2 call in flight
    ConsultingHelper2 {
        request: String,
        response: String,
        feedback: String,
        helper1: String,
    },

    /// Over-budget fallback: helper 1 summarization call in flight
    SummarizingHelper1 {
        request: String,
        response: String,
        feedback: String,
    },

    /// Over-budget fallback: helper 2 summarization call in flight
    SummarizingHelper2 {
        request: String,
        response: String,
        feedback: String,
        summary1: String,
    },

    /// Improved-prompt call to the main agent in flight. `response` is the
    /// previous (rejected) answer, kept for the failure fallback.
    RevisingResponse { request: String, response: String },
}

impl SessionState {
    /// True while a model call is outstanding; `Submit` is rejected.
    pub fn is_busy(&self) -> bool {
        !matches!(
            self,
            SessionState::Initial
                | SessionState::AwaitingFeedback { .. }
                | SessionState::AwaitingDescription { .. }
        )
    }

    /// Collapse an interrupted in-flight state to the phase from which the
    /// user can retry. Identity on resting states.
    pub fn settle(self) -> SessionState {
        match self {
            SessionState::GeneratingResponse { .. } => SessionState::Initial,
            SessionState::ConsultingHelper1 {
                request, response, ..
            }
            | SessionState::ConsultingHelper2 {
                request, response, ..
            }
            | SessionState::SummarizingHelper1 {
                request, response, ..
            }
            | SessionState::SummarizingHelper2 {
                request, response, ..
            }
            | SessionState::RevisingResponse { request, response } => {
                SessionState::AwaitingDescription { request, response }
            }
            resting => resting,
        }
    }
}

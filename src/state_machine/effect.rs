//! Effects produced by state transitions

use super::AgentRole;
use crate::store::Role;

/// Side effects for the driver to execute after a transition, in order
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Append a turn to the conversation history
    Append { role: Role, content: String },

    /// Persist the current history and state
    Persist,

    /// Invoke a model in the background; the result comes back as an event
    Invoke { agent: AgentRole, prompt: String },

    /// Surface an error to the presentation layer
    NotifyError { message: String },
}

impl Effect {
    pub fn append(role: Role, content: impl Into<String>) -> Self {
        Effect::Append {
            role,
            content: content.into(),
        }
    }

    pub fn invoke(agent: AgentRole, prompt: impl Into<String>) -> Self {
        Effect::Invoke {
            agent,
            prompt: prompt.into(),
        }
    }
}

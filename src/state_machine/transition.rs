//! Pure state transition function
//!
//! Given the current state, the session configuration, the recorded history
//! and one event, produce the next state and an ordered list of effects.
//! No I/O happens here; the driver executes the effects.

use super::{AgentRole, Effect, SessionContext, SessionEvent, SessionState};
use crate::budget::exceeds_budget;
use crate::prompt;
use crate::store::{Role, Turn};
use thiserror::Error;

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_state: SessionState,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(state: SessionState) -> Self {
        Self {
            new_state: state,
            effects: vec![],
        }
    }

    #[must_use]
    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }
}

/// Errors that can occur during transition
#[derive(Debug, Error)]
pub enum TransitionError {
    #[error("a model call is in flight; wait for it to finish before submitting")]
    Busy,
    #[error("invalid transition: {0}")]
    InvalidTransition(String),
}

/// History extended by one not-yet-appended turn, for prompt rendering
fn extended(history: &[Turn], role: Role, content: &str) -> Vec<Turn> {
    let mut turns = history.to_vec();
    turns.push(Turn::new(role, content));
    turns
}

/// Pure transition function
#[allow(clippy::too_many_lines)] // One arm per edge of the state graph
pub fn transition(
    state: &SessionState,
    ctx: &SessionContext,
    history: &[Turn],
    event: SessionEvent,
) -> Result<TransitionResult, TransitionError> {
    match (state, event) {
        // ============================================================
        // Request intake
        // ============================================================

        // Initial + Submit -> record the request, ask the main agent
        (SessionState::Initial, SessionEvent::Submit { text }) => {
            let request = text.trim().to_string();
            if request.is_empty() {
                return Ok(TransitionResult::new(SessionState::Initial));
            }
            let initial_prompt = prompt::build_initial_prompt(
                &request,
                &extended(history, Role::Programmer, &request),
            );
            Ok(
                TransitionResult::new(SessionState::GeneratingResponse {
                    request: request.clone(),
                })
                .with_effect(Effect::append(Role::Programmer, request))
                .with_effect(Effect::Persist)
                .with_effect(Effect::invoke(AgentRole::Main, initial_prompt)),
            )
        }

        // ============================================================
        // Feedback intake
        // ============================================================

        (SessionState::AwaitingFeedback { request, response }, SessionEvent::Submit { text }) => {
            match text.trim().to_lowercase().as_str() {
                "yes" => Ok(TransitionResult::new(SessionState::Initial)
                    .with_effect(Effect::append(Role::Programmer, "Was this helpful? yes"))
                    .with_effect(Effect::Persist)
                    .with_effect(Effect::append(Role::MainAgent, prompt::ACK))
                    .with_effect(Effect::Persist)),
                "no" => Ok(TransitionResult::new(SessionState::AwaitingDescription {
                    request: request.clone(),
                    response: response.clone(),
                })
                .with_effect(Effect::append(Role::Programmer, "Was this helpful? no"))
                .with_effect(Effect::Persist)
                .with_effect(Effect::append(Role::System, prompt::DESCRIBE_PROMPT))
                .with_effect(Effect::Persist)),
                // Anything else is rejected with a corrective turn; the
                // answer must be resubmitted. No state change, no persist.
                _ => Ok(TransitionResult::new(state.clone())
                    .with_effect(Effect::append(Role::System, prompt::YES_NO_PROMPT))),
            }
        }

        // ============================================================
        // Description intake -> helper consultation begins
        // ============================================================

        (
            SessionState::AwaitingDescription { request, response },
            SessionEvent::Submit { text },
        ) => {
            let feedback = text.trim().to_string();
            let turn_content = if feedback.is_empty() {
                prompt::NO_FEEDBACK_TURN.to_string()
            } else {
                feedback.clone()
            };
            // Captured once here; both helpers receive this exact prompt.
            let helper_prompt = prompt::build_helper_prompt(
                request,
                response,
                &extended(history, Role::Programmer, &turn_content),
                &feedback,
            );
            Ok(
                TransitionResult::new(SessionState::ConsultingHelper1 {
                    request: request.clone(),
                    response: response.clone(),
                    feedback,
                    helper_prompt: helper_prompt.clone(),
                })
                .with_effect(Effect::append(Role::Programmer, turn_content))
                .with_effect(Effect::Persist)
                .with_effect(Effect::invoke(AgentRole::Helper1, helper_prompt)),
            )
        }

        // Single-flight guard: a submission while any call is outstanding
        (state, SessionEvent::Submit { .. }) if state.is_busy() => Err(TransitionError::Busy),

        // ============================================================
        // Initial-response completion
        // ============================================================

        (
            SessionState::GeneratingResponse { request },
            SessionEvent::InvokeCompleted {
                agent: AgentRole::Main,
                text,
            },
        ) => Ok(TransitionResult::new(SessionState::AwaitingFeedback {
            request: request.clone(),
            response: text.clone(),
        })
        .with_effect(Effect::append(Role::MainAgent, text))
        .with_effect(Effect::append(Role::System, prompt::HELPFUL_PROMPT))
        .with_effect(Effect::Persist)),

        // ============================================================
        // Helper consultation chain
        // ============================================================

        (
            SessionState::ConsultingHelper1 {
                request,
                response,
                feedback,
                helper_prompt,
            },
            SessionEvent::InvokeCompleted {
                agent: AgentRole::Helper1,
                text,
            },
        ) => Ok(
            TransitionResult::new(SessionState::ConsultingHelper2 {
                request: request.clone(),
                response: response.clone(),
                feedback: feedback.clone(),
                helper1: text.clone(),
            })
            .with_effect(Effect::append(Role::Helper1, text))
            .with_effect(Effect::Persist)
            .with_effect(Effect::invoke(AgentRole::Helper2, helper_prompt.clone())),
        ),

        (
            SessionState::ConsultingHelper2 {
                request,
                response,
                feedback,
                helper1,
            },
            SessionEvent::InvokeCompleted {
                agent: AgentRole::Helper2,
                text: helper2,
            },
        ) => {
            let improved = prompt::build_improved_prompt(
                request,
                &extended(history, Role::Helper2, &helper2),
                response,
                helper1,
                &helper2,
                feedback,
            );
            if exceeds_budget(&improved, &ctx.roster.main, &ctx.windows) {
                // Shrink the helper contributions before invoking the main
                // agent. The full helper turns stay in the history.
                Ok(
                    TransitionResult::new(SessionState::SummarizingHelper1 {
                        request: request.clone(),
                        response: response.clone(),
                        feedback: feedback.clone(),
                    })
                    .with_effect(Effect::append(Role::Helper2, helper2))
                    .with_effect(Effect::Persist)
                    .with_effect(Effect::invoke(AgentRole::Helper1, prompt::SUMMARY_PROMPT)),
                )
            } else {
                Ok(
                    TransitionResult::new(SessionState::RevisingResponse {
                        request: request.clone(),
                        response: response.clone(),
                    })
                    .with_effect(Effect::append(Role::Helper2, helper2))
                    .with_effect(Effect::Persist)
                    .with_effect(Effect::invoke(AgentRole::Main, improved)),
                )
            }
        }

        (
            SessionState::SummarizingHelper1 {
                request,
                response,
                feedback,
            },
            SessionEvent::InvokeCompleted {
                agent: AgentRole::Helper1,
                text,
            },
        ) => Ok(
            TransitionResult::new(SessionState::SummarizingHelper2 {
                request: request.clone(),
                response: response.clone(),
                feedback: feedback.clone(),
                summary1: text,
            })
            .with_effect(Effect::invoke(AgentRole::Helper2, prompt::SUMMARY_PROMPT)),
        ),

        (
            SessionState::SummarizingHelper2 {
                request,
                response,
                feedback,
                summary1,
            },
            SessionEvent::InvokeCompleted {
                agent: AgentRole::Helper2,
                text: summary2,
            },
        ) => {
            let improved = prompt::build_improved_prompt(
                request,
                history,
                response,
                summary1,
                &summary2,
                feedback,
            );
            Ok(
                TransitionResult::new(SessionState::RevisingResponse {
                    request: request.clone(),
                    response: response.clone(),
                })
                .with_effect(Effect::invoke(AgentRole::Main, improved)),
            )
        }

        (
            SessionState::RevisingResponse { request, .. },
            SessionEvent::InvokeCompleted {
                agent: AgentRole::Main,
                text,
            },
        ) => Ok(TransitionResult::new(SessionState::AwaitingFeedback {
            request: request.clone(),
            response: text.clone(),
        })
        .with_effect(Effect::append(Role::MainAgent, text))
        .with_effect(Effect::append(Role::System, prompt::HELPFUL_PROMPT))
        .with_effect(Effect::Persist)),

        // ============================================================
        // Invocation failure: abort the procedure, keep what is persisted
        // ============================================================

        (state, SessionEvent::InvokeFailed { message, .. }) if state.is_busy() => {
            Ok(TransitionResult::new(state.clone().settle())
                .with_effect(Effect::Persist)
                .with_effect(Effect::NotifyError { message }))
        }

        // ============================================================
        // Invalid transitions
        // ============================================================

        (state, event) => Err(TransitionError::InvalidTransition(format!(
            "no transition from {state:?} with event {event:?}"
        ))),
    }
}

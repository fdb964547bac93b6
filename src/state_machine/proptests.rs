//! Property-based tests for the state machine
//!
//! These tests verify key invariants hold across all possible inputs.

use super::*;
use crate::budget::ContextWindowTable;
use crate::store::Role;
use proptest::prelude::*;

// ============================================================================
// Test Helpers
// ============================================================================

fn test_context() -> SessionContext {
    SessionContext::new(
        "test-conv",
        AgentRoster::new("main-model", "helper-a", "helper-b"),
        ContextWindowTable::new(),
    )
}

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_agent() -> impl Strategy<Value = AgentRole> {
    prop_oneof![
        Just(AgentRole::Main),
        Just(AgentRole::Helper1),
        Just(AgentRole::Helper2),
    ]
}

fn arb_state() -> impl Strategy<Value = SessionState> {
    let text = "[a-z0-9 ]{0,24}";
    prop_oneof![
        Just(SessionState::Initial),
        (text, text).prop_map(|(request, response)| SessionState::AwaitingFeedback {
            request,
            response
        }),
        (text, text).prop_map(|(request, response)| SessionState::AwaitingDescription {
            request,
            response
        }),
        text.prop_map(|request| SessionState::GeneratingResponse { request }),
        (text, text, text, text).prop_map(|(request, response, feedback, helper_prompt)| {
            SessionState::ConsultingHelper1 {
                request,
                response,
                feedback,
                helper_prompt,
            }
        }),
        (text, text, text, text).prop_map(|(request, response, feedback, helper1)| {
            SessionState::ConsultingHelper2 {
                request,
                response,
                feedback,
                helper1,
            }
        }),
        (text, text, text).prop_map(|(request, response, feedback)| {
            SessionState::SummarizingHelper1 {
                request,
                response,
                feedback,
            }
        }),
        (text, text, text, text).prop_map(|(request, response, feedback, summary1)| {
            SessionState::SummarizingHelper2 {
                request,
                response,
                feedback,
                summary1,
            }
        }),
        (text, text).prop_map(|(request, response)| SessionState::RevisingResponse {
            request,
            response
        }),
    ]
}

fn arb_event() -> impl Strategy<Value = SessionEvent> {
    let text = "[a-zA-Z0-9 ]{0,24}";
    prop_oneof![
        text.prop_map(|text| SessionEvent::Submit { text }),
        (arb_agent(), text).prop_map(|(agent, text)| SessionEvent::InvokeCompleted {
            agent,
            text
        }),
        (arb_agent(), text).prop_map(|(agent, message)| SessionEvent::InvokeFailed {
            agent,
            message
        }),
    ]
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    /// The transition function never panics, whatever the state/event pair.
    #[test]
    fn transition_is_total(state in arb_state(), event in arb_event()) {
        let _ = transition(&state, &test_context(), &[], event);
    }

    /// Busy states reject every submission.
    #[test]
    fn busy_states_reject_submissions(state in arb_state(), text in ".{0,40}") {
        prop_assume!(state.is_busy());
        let result = transition(&state, &test_context(), &[], SessionEvent::Submit { text });
        prop_assert!(matches!(result, Err(TransitionError::Busy)));
    }

    /// A non-empty submission in Initial records exactly one Programmer turn
    /// and no agent turn.
    #[test]
    fn initial_submission_appends_one_programmer_turn(text in "[a-zA-Z0-9 ]{1,40}") {
        prop_assume!(!text.trim().is_empty());
        let result = transition(
            &SessionState::Initial,
            &test_context(),
            &[],
            SessionEvent::Submit { text: text.clone() },
        ).unwrap();

        let appends: Vec<_> = result.effects.iter().filter_map(|e| match e {
            Effect::Append { role, .. } => Some(*role),
            _ => None,
        }).collect();
        prop_assert_eq!(appends, vec![Role::Programmer]);
    }

    /// Failure of the outstanding call always lands in a resting state the
    /// user can act on, and never appends a turn.
    #[test]
    fn failures_settle_to_resting_states(state in arb_state(), agent in arb_agent(), message in ".{0,40}") {
        prop_assume!(state.is_busy());
        let result = transition(
            &state,
            &test_context(),
            &[],
            SessionEvent::InvokeFailed { agent, message },
        ).unwrap();

        prop_assert!(!result.new_state.is_busy());
        prop_assert!(!result.effects.iter().any(|e| matches!(e, Effect::Append { .. })), "failure transition must not append a turn");
    }

    /// Settle is idempotent.
    #[test]
    fn settle_is_idempotent(state in arb_state()) {
        let settled = state.settle();
        prop_assert_eq!(settled.clone().settle(), settled);
    }

    /// States survive a serde round trip (they are persisted as JSON).
    #[test]
    fn states_round_trip_through_json(state in arb_state()) {
        let json = serde_json::to_string(&state).unwrap();
        let back: SessionState = serde_json::from_str(&json).unwrap();
        prop_assert_eq!(back, state);
    }

    /// Any effects list a transition emits keeps appends ahead of the invoke
    /// that depends on them: an Invoke is never followed by an Append.
    #[test]
    fn invokes_come_after_appends(state in arb_state(), event in arb_event()) {
        if let Ok(result) = transition(&state, &test_context(), &[], event) {
            let first_invoke = result.effects.iter()
                .position(|e| matches!(e, Effect::Invoke { .. }));
            if let Some(pos) = first_invoke {
                let trailing_append = result.effects.iter().skip(pos).any(|e| {
                    matches!(e, Effect::Append { .. })
                });
                prop_assert!(!trailing_append);
            }
        }
    }
}

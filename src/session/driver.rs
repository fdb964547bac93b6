//! Session driver
//!
//! Owns the active conversation's turns and state. Receives events on an
//! mpsc channel, applies the pure transition, executes the resulting
//! effects. Model invocations run as background tasks and report back as
//! events, so the interactive surface never blocks on a model call.

use super::recovery;
use super::traits::TranscriptStore;
use crate::llm::ModelInvoker;
use crate::state_machine::{
    transition, Effect, SessionContext, SessionEvent, SessionState, TransitionError,
};
use crate::store::Turn;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};

/// Updates pushed to the presentation layer
#[derive(Debug, Clone)]
pub enum SessionUpdate {
    TurnAppended(Turn),
    StateChanged(SessionState),
    Error { message: String },
}

/// Handle to interact with a running session
#[derive(Clone)]
pub struct SessionHandle {
    event_tx: mpsc::Sender<SessionEvent>,
    update_tx: broadcast::Sender<SessionUpdate>,
}

impl SessionHandle {
    /// Submit user input to the state machine.
    pub async fn submit(&self, text: impl Into<String>) {
        let _ = self
            .event_tx
            .send(SessionEvent::Submit { text: text.into() })
            .await;
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionUpdate> {
        self.update_tx.subscribe()
    }
}

pub struct SessionDriver<S, I>
where
    S: TranscriptStore + 'static,
    I: ModelInvoker + 'static,
{
    ctx: SessionContext,
    state: SessionState,
    turns: Vec<Turn>,
    store: S,
    invoker: Arc<I>,
    event_rx: mpsc::Receiver<SessionEvent>,
    event_tx: mpsc::Sender<SessionEvent>,
    update_tx: broadcast::Sender<SessionUpdate>,
}

impl<S, I> SessionDriver<S, I>
where
    S: TranscriptStore + 'static,
    I: ModelInvoker + 'static,
{
    /// Open (or create) the named conversation and build its driver.
    ///
    /// The persisted state is authoritative; an interrupted in-flight state
    /// settles to its retryable phase. Transcripts without a persisted
    /// state fall back to marker-based derivation from the last turn.
    pub async fn open(ctx: SessionContext, store: S, invoker: I) -> (Self, SessionHandle) {
        let turns = store.load(&ctx.conversation).await;
        let state = match store.load_state(&ctx.conversation).await {
            Some(state) => state.settle(),
            None => recovery::resume_state(&turns),
        };

        tracing::info!(
            conversation = %ctx.conversation,
            turns = turns.len(),
            state = ?state,
            "opened conversation"
        );

        let (event_tx, event_rx) = mpsc::channel(32);
        let (update_tx, _) = broadcast::channel(128);
        let handle = SessionHandle {
            event_tx: event_tx.clone(),
            update_tx: update_tx.clone(),
        };

        (
            Self {
                ctx,
                state,
                turns,
                store,
                invoker: Arc::new(invoker),
                event_rx,
                event_tx,
                update_tx,
            },
            handle,
        )
    }

    #[allow(dead_code)] // Used in tests
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub async fn run(mut self) {
        tracing::info!(conversation = %self.ctx.conversation, "starting session driver");

        while let Some(event) = self.event_rx.recv().await {
            self.process_event(event).await;
        }

        tracing::info!(conversation = %self.ctx.conversation, "session driver stopped");
    }

    async fn process_event(&mut self, event: SessionEvent) {
        let result = match transition(&self.state, &self.ctx, &self.turns, event) {
            Ok(result) => result,
            Err(e @ TransitionError::Busy) => {
                let _ = self.update_tx.send(SessionUpdate::Error {
                    message: e.to_string(),
                });
                return;
            }
            Err(e) => {
                tracing::warn!(conversation = %self.ctx.conversation, error = %e, "rejected event");
                let _ = self.update_tx.send(SessionUpdate::Error {
                    message: e.to_string(),
                });
                return;
            }
        };

        self.state = result.new_state;

        for effect in result.effects {
            self.execute_effect(effect).await;
        }
    }

    async fn execute_effect(&mut self, effect: Effect) {
        match effect {
            Effect::Append { role, content } => {
                let turn = Turn::new(role, content);
                self.turns.push(turn.clone());
                let _ = self.update_tx.send(SessionUpdate::TurnAppended(turn));
            }

            Effect::Persist => {
                // Fail-soft: a failed save is logged and the in-memory
                // history keeps going.
                if let Err(e) = self
                    .store
                    .save(&self.ctx.conversation, &self.turns, &self.state)
                    .await
                {
                    tracing::warn!(
                        conversation = %self.ctx.conversation,
                        error = %e,
                        "failed to persist transcript"
                    );
                }
                let _ = self
                    .update_tx
                    .send(SessionUpdate::StateChanged(self.state.clone()));
            }

            Effect::Invoke { agent, prompt } => {
                let invoker = Arc::clone(&self.invoker);
                let model = self.ctx.roster.model_for(agent).to_string();
                let event_tx = self.event_tx.clone();

                tokio::spawn(async move {
                    let event = match invoker.invoke(&model, &prompt).await {
                        Ok(text) => SessionEvent::InvokeCompleted { agent, text },
                        Err(e) => SessionEvent::InvokeFailed {
                            agent,
                            message: e.to_string(),
                        },
                    };
                    let _ = event_tx.send(event).await;
                });
            }

            Effect::NotifyError { message } => {
                tracing::error!(
                    conversation = %self.ctx.conversation,
                    error = %message,
                    "model call failed"
                );
                let _ = self.update_tx.send(SessionUpdate::Error { message });
            }
        }
    }
}

//! Trait abstractions for session I/O
//!
//! These traits enable testing the driver with mock implementations.

use crate::state_machine::SessionState;
use crate::store::{StoreError, TranscriptDb, Turn};
use async_trait::async_trait;
use std::sync::Arc;

/// Durable storage for conversation transcripts
#[async_trait]
pub trait TranscriptStore: Send + Sync {
    /// Load all turns, oldest first. Read failures are logged and yield an
    /// empty history; they never propagate to the caller.
    async fn load(&self, name: &str) -> Vec<Turn>;

    /// Load the persisted session state, if one was recorded.
    async fn load_state(&self, name: &str) -> Option<SessionState>;

    /// Persist the full history and state for `name`, overwriting any
    /// previous record of the same name.
    async fn save(
        &self,
        name: &str,
        turns: &[Turn],
        state: &SessionState,
    ) -> Result<(), StoreError>;

    /// Remove the persisted record.
    async fn delete(&self, name: &str) -> Result<(), StoreError>;

    /// Names of all persisted conversations.
    async fn list(&self) -> Vec<String>;
}

#[async_trait]
impl<T: TranscriptStore + ?Sized> TranscriptStore for Arc<T> {
    async fn load(&self, name: &str) -> Vec<Turn> {
        (**self).load(name).await
    }

    async fn load_state(&self, name: &str) -> Option<SessionState> {
        (**self).load_state(name).await
    }

    async fn save(
        &self,
        name: &str,
        turns: &[Turn],
        state: &SessionState,
    ) -> Result<(), StoreError> {
        (**self).save(name, turns, state).await
    }

    async fn delete(&self, name: &str) -> Result<(), StoreError> {
        (**self).delete(name).await
    }

    async fn list(&self) -> Vec<String> {
        (**self).list().await
    }
}

// ============================================================================
// Production Adapter
// ============================================================================

#[async_trait]
impl TranscriptStore for TranscriptDb {
    async fn load(&self, name: &str) -> Vec<Turn> {
        match self.load_turns(name) {
            Ok(turns) => turns,
            Err(e) => {
                tracing::error!(
                    conversation = %name,
                    error = %e,
                    "failed to load transcript, starting empty"
                );
                Vec::new()
            }
        }
    }

    async fn load_state(&self, name: &str) -> Option<SessionState> {
        match self.stored_state(name) {
            Ok(state) => state,
            Err(e) => {
                tracing::error!(conversation = %name, error = %e, "failed to load session state");
                None
            }
        }
    }

    async fn save(
        &self,
        name: &str,
        turns: &[Turn],
        state: &SessionState,
    ) -> Result<(), StoreError> {
        self.save_transcript(name, turns, state)
    }

    async fn delete(&self, name: &str) -> Result<(), StoreError> {
        self.delete_conversation(name)
    }

    async fn list(&self) -> Vec<String> {
        match self.list_conversations() {
            Ok(names) => names,
            Err(e) => {
                tracing::error!(error = %e, "failed to list conversations");
                Vec::new()
            }
        }
    }
}

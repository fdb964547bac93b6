//! Mock implementations for testing
//!
//! These mocks enable driving a full session without real I/O.

use super::driver::{SessionDriver, SessionHandle, SessionUpdate};
use super::traits::TranscriptStore;
use crate::budget::ContextWindowTable;
use crate::llm::{InvokeError, ModelInvoker};
use crate::state_machine::{AgentRoster, SessionContext, SessionState};
use crate::store::{StoreError, Turn};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

// ============================================================================
// Mock Invoker
// ============================================================================

/// Mock invoker that returns queued completions
pub struct MockInvoker {
    responses: Mutex<VecDeque<Result<String, InvokeError>>>,
    /// Record of all calls made: (model id, prompt)
    pub calls: Mutex<Vec<(String, String)>>,
}

impl MockInvoker {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Queue a successful completion
    pub fn queue_response(&self, text: impl Into<String>) {
        self.responses.lock().unwrap().push_back(Ok(text.into()));
    }

    /// Queue a failed call
    pub fn queue_error(&self, error: InvokeError) {
        self.responses.lock().unwrap().push_back(Err(error));
    }

    /// Get recorded calls
    pub fn recorded_calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }
}

impl Default for MockInvoker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ModelInvoker for MockInvoker {
    async fn invoke(&self, model_id: &str, prompt: &str) -> Result<String, InvokeError> {
        self.calls
            .lock()
            .unwrap()
            .push((model_id.to_string(), prompt.to_string()));
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(InvokeError::network("no mock response queued")))
    }
}

// ============================================================================
// In-Memory Store
// ============================================================================

/// In-memory transcript store for testing
pub struct InMemoryStore {
    records: Mutex<HashMap<String, (Vec<Turn>, SessionState)>>,
    fail_saves: AtomicBool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
            fail_saves: AtomicBool::new(false),
        }
    }

    /// Make every subsequent save fail (for fail-soft tests)
    pub fn fail_saves(&self) {
        self.fail_saves.store(true, Ordering::SeqCst);
    }

    /// Get the persisted snapshot for a conversation
    pub fn snapshot(&self, name: &str) -> Option<(Vec<Turn>, SessionState)> {
        self.records.lock().unwrap().get(name).cloned()
    }

    /// Seed a persisted record (for resume tests)
    pub fn seed(&self, name: &str, turns: Vec<Turn>, state: SessionState) {
        self.records
            .lock()
            .unwrap()
            .insert(name.to_string(), (turns, state));
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TranscriptStore for InMemoryStore {
    async fn load(&self, name: &str) -> Vec<Turn> {
        self.records
            .lock()
            .unwrap()
            .get(name)
            .map(|(turns, _)| turns.clone())
            .unwrap_or_default()
    }

    async fn load_state(&self, name: &str) -> Option<SessionState> {
        self.records
            .lock()
            .unwrap()
            .get(name)
            .map(|(_, state)| state.clone())
    }

    async fn save(
        &self,
        name: &str,
        turns: &[Turn],
        state: &SessionState,
    ) -> Result<(), StoreError> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(StoreError::Sqlite(rusqlite::Error::InvalidQuery));
        }
        self.records
            .lock()
            .unwrap()
            .insert(name.to_string(), (turns.to_vec(), state.clone()));
        Ok(())
    }

    async fn delete(&self, name: &str) -> Result<(), StoreError> {
        self.records
            .lock()
            .unwrap()
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(name.to_string()))
    }

    async fn list(&self) -> Vec<String> {
        self.records.lock().unwrap().keys().cloned().collect()
    }
}

// ============================================================================
// Test Session Builder
// ============================================================================

pub const TEST_CONV: &str = "test-conv";

/// A running driver plus everything a test needs to poke at it
pub struct TestSession {
    pub store: Arc<InMemoryStore>,
    pub invoker: Arc<MockInvoker>,
    pub handle: SessionHandle,
    update_rx: tokio::sync::broadcast::Receiver<SessionUpdate>,
}

impl TestSession {
    pub async fn start() -> Self {
        Self::start_with(ContextWindowTable::new()).await
    }

    pub async fn start_with(windows: ContextWindowTable) -> Self {
        let store = Arc::new(InMemoryStore::new());
        let invoker = Arc::new(MockInvoker::new());
        Self::start_on(store, invoker, windows).await
    }

    pub async fn start_on(
        store: Arc<InMemoryStore>,
        invoker: Arc<MockInvoker>,
        windows: ContextWindowTable,
    ) -> Self {
        let ctx = SessionContext::new(
            TEST_CONV,
            AgentRoster::new("main-model", "helper-a", "helper-b"),
            windows,
        );
        let (driver, handle) = SessionDriver::open(ctx, store.clone(), invoker.clone()).await;
        let update_rx = handle.subscribe();
        tokio::spawn(driver.run());

        Self {
            store,
            invoker,
            handle,
            update_rx,
        }
    }

    pub async fn submit(&self, text: &str) {
        self.handle.submit(text).await;
    }

    /// Wait until a `StateChanged` update matches the predicate
    pub async fn wait_for_state(
        &mut self,
        pred: impl Fn(&SessionState) -> bool,
        timeout: std::time::Duration,
    ) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        while tokio::time::Instant::now() < deadline {
            match tokio::time::timeout(std::time::Duration::from_millis(50), self.update_rx.recv())
                .await
            {
                Ok(Ok(SessionUpdate::StateChanged(state))) if pred(&state) => return true,
                _ => continue,
            }
        }
        false
    }

    /// Wait until a turn with the given content is appended
    pub async fn wait_for_turn(
        &mut self,
        pred: impl Fn(&Turn) -> bool,
        timeout: std::time::Duration,
    ) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        while tokio::time::Instant::now() < deadline {
            match tokio::time::timeout(std::time::Duration::from_millis(50), self.update_rx.recv())
                .await
            {
                Ok(Ok(SessionUpdate::TurnAppended(turn))) if pred(&turn) => return true,
                _ => continue,
            }
        }
        false
    }

    /// Wait for an error update
    pub async fn wait_for_error(&mut self, timeout: std::time::Duration) -> Option<String> {
        let deadline = tokio::time::Instant::now() + timeout;
        while tokio::time::Instant::now() < deadline {
            match tokio::time::timeout(std::time::Duration::from_millis(50), self.update_rx.recv())
                .await
            {
                Ok(Ok(SessionUpdate::Error { message })) => return Some(message),
                _ => continue,
            }
        }
        None
    }

    /// Persisted turns, for assertions
    pub fn persisted_turns(&self) -> Vec<Turn> {
        self.store
            .snapshot(TEST_CONV)
            .map(|(turns, _)| turns)
            .unwrap_or_default()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompt;
    use crate::store::Role;
    use std::time::Duration;

    const WAIT: Duration = Duration::from_secs(2);

    fn awaiting_feedback(state: &SessionState) -> bool {
        matches!(state, SessionState::AwaitingFeedback { .. })
    }

    #[tokio::test]
    async fn initial_request_round() {
        let mut session = TestSession::start().await;
        session.invoker.queue_response("fn fib(n: u64) -> u64 { n }");

        session.submit("write a fibonacci function").await;
        assert!(session.wait_for_state(awaiting_feedback, WAIT).await);

        let turns = session.persisted_turns();
        let roles: Vec<Role> = turns.iter().map(|t| t.role).collect();
        assert_eq!(roles, vec![Role::Programmer, Role::MainAgent, Role::System]);
        assert_eq!(turns[0].content, "write a fibonacci function");
        assert_eq!(turns[2].content, prompt::HELPFUL_PROMPT);

        let calls = session.invoker.recorded_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "main-model");
        assert!(calls[0].1.contains("write a fibonacci function"));
    }

    #[tokio::test]
    async fn acceptance_acknowledges_and_rests() {
        let mut session = TestSession::start().await;
        session.invoker.queue_response("an answer");

        session.submit("a request").await;
        assert!(session.wait_for_state(awaiting_feedback, WAIT).await);

        session.submit("yes").await;
        assert!(
            session
                .wait_for_state(|s| matches!(s, SessionState::Initial), WAIT)
                .await
        );

        let turns = session.persisted_turns();
        assert_eq!(turns.len(), 5);
        assert_eq!(turns[3].content, "Was this helpful? yes");
        assert_eq!(turns[4].role, Role::MainAgent);
        assert_eq!(turns[4].content, prompt::ACK);
    }

    /// The end-to-end refinement scenario: request, rejection, feedback,
    /// helper consultation, revised answer.
    #[tokio::test]
    async fn rejection_consults_helpers_and_revises() {
        let mut session = TestSession::start().await;
        session.invoker.queue_response("slow answer");
        session.invoker.queue_response("helper one suggestion");
        session.invoker.queue_response("helper two suggestion");
        session.invoker.queue_response("fast answer");

        session.submit("write a fibonacci function").await;
        assert!(session.wait_for_state(awaiting_feedback, WAIT).await);

        session.submit("no").await;
        assert!(
            session
                .wait_for_state(|s| matches!(s, SessionState::AwaitingDescription { .. }), WAIT)
                .await
        );

        session.submit("it's too slow").await;
        assert!(session.wait_for_state(awaiting_feedback, WAIT).await);

        let turns = session.persisted_turns();
        let roles: Vec<Role> = turns.iter().map(|t| t.role).collect();
        assert_eq!(
            roles,
            vec![
                Role::Programmer,
                Role::MainAgent,
                Role::System,
                Role::Programmer,
                Role::System,
                Role::Programmer,
                Role::Helper1,
                Role::Helper2,
                Role::MainAgent,
                Role::System,
            ]
        );

        let calls = session.invoker.recorded_calls();
        let models: Vec<&str> = calls.iter().map(|(m, _)| m.as_str()).collect();
        assert_eq!(models, vec!["main-model", "helper-a", "helper-b", "main-model"]);

        // Both helpers got the same prompt; helper 2 never saw helper 1.
        assert_eq!(calls[1].1, calls[2].1);
        assert!(!calls[2].1.contains("helper one suggestion"));

        // The improved prompt carries both full helper texts.
        assert!(calls[3].1.contains("helper one suggestion"));
        assert!(calls[3].1.contains("helper two suggestion"));
    }

    #[tokio::test]
    async fn empty_description_uses_fallback_turn() {
        let mut session = TestSession::start().await;
        session.invoker.queue_response("answer");
        session.invoker.queue_response("h1");
        session.invoker.queue_response("h2");
        session.invoker.queue_response("revised");

        session.submit("request").await;
        assert!(session.wait_for_state(awaiting_feedback, WAIT).await);
        session.submit("no").await;
        assert!(
            session
                .wait_for_state(|s| matches!(s, SessionState::AwaitingDescription { .. }), WAIT)
                .await
        );

        session.submit("").await;
        assert!(session.wait_for_state(awaiting_feedback, WAIT).await);

        let turns = session.persisted_turns();
        assert!(turns
            .iter()
            .any(|t| t.role == Role::Programmer && t.content == prompt::NO_FEEDBACK_TURN));

        // The helper prompt uses the no-feedback sentence.
        let calls = session.invoker.recorded_calls();
        assert!(calls[1].1.contains("didn't provide specific feedback"));
    }

    #[tokio::test]
    async fn invalid_answer_reprompts_without_losing_state() {
        let mut session = TestSession::start().await;
        session.invoker.queue_response("answer");

        session.submit("request").await;
        assert!(session.wait_for_state(awaiting_feedback, WAIT).await);
        let persisted_before = session.persisted_turns().len();

        session.submit("maybe").await;
        assert!(
            session
                .wait_for_turn(
                    |t| t.role == Role::System && t.content == prompt::YES_NO_PROMPT,
                    WAIT
                )
                .await
        );

        // The corrective turn is not persisted and the state is unchanged:
        // answering "yes" still works.
        assert_eq!(session.persisted_turns().len(), persisted_before);
        session.submit("yes").await;
        assert!(
            session
                .wait_for_state(|s| matches!(s, SessionState::Initial), WAIT)
                .await
        );
    }

    #[tokio::test]
    async fn over_budget_prompt_is_rebuilt_from_summaries() {
        // A one-token window forces the summarization fallback.
        let windows = ContextWindowTable::new().with_window("main-model", 1);
        let mut session = TestSession::start_with(windows).await;
        session.invoker.queue_response("answer");
        session.invoker.queue_response("long helper one text");
        session.invoker.queue_response("long helper two text");
        session.invoker.queue_response("short summary one");
        session.invoker.queue_response("short summary two");
        session.invoker.queue_response("revised answer");

        session.submit("request").await;
        assert!(session.wait_for_state(awaiting_feedback, WAIT).await);
        session.submit("no").await;
        assert!(
            session
                .wait_for_state(|s| matches!(s, SessionState::AwaitingDescription { .. }), WAIT)
                .await
        );
        session.submit("feedback").await;
        assert!(session.wait_for_state(awaiting_feedback, WAIT).await);

        let calls = session.invoker.recorded_calls();
        let models: Vec<&str> = calls.iter().map(|(m, _)| m.as_str()).collect();
        assert_eq!(
            models,
            vec![
                "main-model",
                "helper-a",
                "helper-b",
                "helper-a",
                "helper-b",
                "main-model"
            ]
        );

        // Summarization calls use the fixed context-free prompt.
        assert_eq!(calls[3].1, prompt::SUMMARY_PROMPT);
        assert_eq!(calls[4].1, prompt::SUMMARY_PROMPT);

        // The final main prompt carries the summaries, not the full texts.
        let final_prompt = &calls[5].1;
        assert!(final_prompt.contains("short summary one"));
        assert!(final_prompt.contains("short summary two"));

        // The full helper texts remain in the persisted history.
        let turns = session.persisted_turns();
        assert!(turns
            .iter()
            .any(|t| t.role == Role::Helper1 && t.content == "long helper one text"));
        assert!(turns
            .iter()
            .any(|t| t.role == Role::Helper2 && t.content == "long helper two text"));
    }

    #[tokio::test]
    async fn initial_response_failure_surfaces_and_allows_retry() {
        let mut session = TestSession::start().await;
        session
            .invoker
            .queue_error(InvokeError::network("connection refused"));

        session.submit("request").await;
        let message = session.wait_for_error(WAIT).await;
        assert!(message.is_some());

        // Only the programmer turn was persisted; no fabricated response.
        let turns = session.persisted_turns();
        let roles: Vec<Role> = turns.iter().map(|t| t.role).collect();
        assert_eq!(roles, vec![Role::Programmer]);

        // Retrying the request works.
        session.invoker.queue_response("answer");
        session.submit("request").await;
        assert!(session.wait_for_state(awaiting_feedback, WAIT).await);
    }

    #[tokio::test]
    async fn helper_failure_keeps_persisted_prefix() {
        let mut session = TestSession::start().await;
        session.invoker.queue_response("answer");
        session.invoker.queue_response("helper one suggestion");
        session
            .invoker
            .queue_error(InvokeError::network("helper two unreachable"));

        session.submit("request").await;
        assert!(session.wait_for_state(awaiting_feedback, WAIT).await);
        session.submit("no").await;
        assert!(
            session
                .wait_for_state(|s| matches!(s, SessionState::AwaitingDescription { .. }), WAIT)
                .await
        );
        session.submit("feedback").await;

        let message = session.wait_for_error(WAIT).await;
        assert!(message.is_some());

        // Helper 1's turn survived; the procedure stopped before helper 2.
        let turns = session.persisted_turns();
        let roles: Vec<Role> = turns.iter().map(|t| t.role).collect();
        assert_eq!(
            roles,
            vec![
                Role::Programmer,
                Role::MainAgent,
                Role::System,
                Role::Programmer,
                Role::System,
                Role::Programmer,
                Role::Helper1,
            ]
        );

        // The user can resubmit feedback from AwaitingDescription.
        let (_, state) = session.store.snapshot(TEST_CONV).unwrap();
        assert!(matches!(state, SessionState::AwaitingDescription { .. }));
    }

    #[tokio::test]
    async fn submissions_during_a_round_are_rejected() {
        let mut session = TestSession::start().await;
        session.invoker.queue_response("answer");
        session.submit("request").await;
        session.submit("impatient second request").await;

        // The second submission lands either while the call is in flight
        // (rejected as busy) or after the answer arrived (rejected as a
        // non-yes/no answer). Neither starts a second round.
        assert!(session.wait_for_state(awaiting_feedback, WAIT).await);
        let turns = session.persisted_turns();
        let programmer_turns = turns.iter().filter(|t| t.role == Role::Programmer).count();
        assert_eq!(programmer_turns, 1);
        assert_eq!(session.invoker.recorded_calls().len(), 1);
    }

    #[tokio::test]
    async fn resumes_from_persisted_state() {
        let store = Arc::new(InMemoryStore::new());
        store.seed(
            TEST_CONV,
            vec![
                Turn::new(Role::Programmer, "request"),
                Turn::new(Role::MainAgent, "answer"),
                Turn::new(Role::System, prompt::HELPFUL_PROMPT),
            ],
            SessionState::AwaitingFeedback {
                request: "request".into(),
                response: "answer".into(),
            },
        );
        let invoker = Arc::new(MockInvoker::new());

        let ctx = SessionContext::new(
            TEST_CONV,
            AgentRoster::new("main-model", "helper-a", "helper-b"),
            ContextWindowTable::new(),
        );
        let (driver, _handle) = SessionDriver::open(ctx, store, invoker).await;

        assert!(matches!(
            driver.state(),
            SessionState::AwaitingFeedback { .. }
        ));
        assert_eq!(driver.turns().len(), 3);
    }

    #[tokio::test]
    async fn interrupted_in_flight_state_settles_on_resume() {
        let store = Arc::new(InMemoryStore::new());
        store.seed(
            TEST_CONV,
            vec![Turn::new(Role::Programmer, "request")],
            SessionState::GeneratingResponse {
                request: "request".into(),
            },
        );
        let invoker = Arc::new(MockInvoker::new());

        let ctx = SessionContext::new(
            TEST_CONV,
            AgentRoster::new("main-model", "helper-a", "helper-b"),
            ContextWindowTable::new(),
        );
        let (driver, _handle) = SessionDriver::open(ctx, store, invoker).await;

        // The lost call settles back to Initial so the request can be retried.
        assert_eq!(*driver.state(), SessionState::Initial);
    }

    /// A store that predates state persistence: turns only, no state record.
    struct LegacyStore(Arc<InMemoryStore>);

    #[async_trait]
    impl TranscriptStore for LegacyStore {
        async fn load(&self, name: &str) -> Vec<Turn> {
            self.0.load(name).await
        }
        async fn load_state(&self, _name: &str) -> Option<SessionState> {
            None
        }
        async fn save(
            &self,
            name: &str,
            turns: &[Turn],
            state: &SessionState,
        ) -> Result<(), StoreError> {
            self.0.save(name, turns, state).await
        }
        async fn delete(&self, name: &str) -> Result<(), StoreError> {
            self.0.delete(name).await
        }
        async fn list(&self) -> Vec<String> {
            self.0.list().await
        }
    }

    #[tokio::test]
    async fn legacy_transcript_without_state_derives_from_markers() {
        let inner = Arc::new(InMemoryStore::new());
        inner.seed(
            TEST_CONV,
            vec![
                Turn::new(Role::Programmer, "request"),
                Turn::new(Role::MainAgent, "answer"),
                Turn::new(Role::System, prompt::HELPFUL_PROMPT),
            ],
            SessionState::Initial,
        );
        let invoker = Arc::new(MockInvoker::new());
        let ctx = SessionContext::new(
            TEST_CONV,
            AgentRoster::new("main-model", "helper-a", "helper-b"),
            ContextWindowTable::new(),
        );
        let (driver, _handle) = SessionDriver::open(ctx, LegacyStore(inner), invoker).await;

        assert_eq!(
            *driver.state(),
            SessionState::AwaitingFeedback {
                request: "request".into(),
                response: "answer".into()
            }
        );
    }

    #[tokio::test]
    async fn save_failures_are_fail_soft() {
        let mut session = TestSession::start().await;
        session.store.fail_saves();
        session.invoker.queue_response("answer");

        session.submit("request").await;
        // The round still completes in memory despite every save failing.
        assert!(session.wait_for_state(awaiting_feedback, WAIT).await);
        assert!(session.store.snapshot(TEST_CONV).is_none());
    }
}

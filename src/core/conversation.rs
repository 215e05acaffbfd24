//! Conversation state shared between the pipeline and the presentation layer.
//!
//! History is kept newest-first. The store is a cheap, cloneable handle; the
//! mutex is never held across an `.await`, so step updates from a running
//! pipeline and `clear()` calls from the UI interleave freely. `submit` does
//! not serialize callers: two concurrent submissions race and the last step
//! update wins. Hosts with several callers should use `try_submit`.

use std::collections::VecDeque;
use std::error::Error;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::core::message::{ChatMessage, InputKind, StructuredResponse};
use crate::core::orchestrator::FeedbackOrchestrator;
use crate::core::processing::ProcessingStep;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ConversationState {
    pub messages: VecDeque<ChatMessage>,
    pub is_processing: bool,
    pub current_step: Option<ProcessingStep>,
    /// Submissions started and not yet settled. Survives `clear()`.
    in_flight: usize,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ConversationEvent {
    StepChanged(Option<ProcessingStep>),
    MessageAdded(ChatMessage),
    Cleared,
}

/// Returned by [`ConversationStore::try_submit`] while another submission is
/// still in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConversationBusy;

impl fmt::Display for ConversationBusy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("A request is already being processed")
    }
}

impl Error for ConversationBusy {}

#[derive(Clone)]
pub struct ConversationStore {
    state: Arc<Mutex<ConversationState>>,
    events: mpsc::UnboundedSender<ConversationEvent>,
}

impl ConversationStore {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ConversationEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        (
            Self {
                state: Arc::new(Mutex::new(ConversationState::default())),
                events,
            },
            rx,
        )
    }

    /// A store nobody observes; events are dropped.
    pub fn detached() -> Self {
        Self::new().0
    }

    fn lock(&self) -> MutexGuard<'_, ConversationState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: ConversationEvent) {
        let _ = self.events.send(event);
    }

    pub fn snapshot(&self) -> ConversationState {
        self.lock().clone()
    }

    /// Newest-first copy of the history.
    pub fn messages(&self) -> Vec<ChatMessage> {
        self.lock().messages.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().messages.is_empty()
    }

    pub fn is_processing(&self) -> bool {
        self.lock().is_processing
    }

    pub fn current_step(&self) -> Option<ProcessingStep> {
        self.lock().current_step
    }

    /// Structured response of the most recent assistant entry.
    pub fn latest_response(&self) -> Option<StructuredResponse> {
        self.lock()
            .messages
            .iter()
            .find(|message| message.is_assistant())
            .and_then(|message| message.response.clone())
    }

    /// Records the user entry, runs the pipeline, and records exactly one
    /// assistant entry whether the run succeeds or fails.
    pub async fn submit(
        &self,
        orchestrator: &FeedbackOrchestrator,
        content: &str,
        kind: InputKind,
    ) -> ChatMessage {
        {
            let mut state = self.lock();
            self.begin(&mut state, content);
        }
        self.run(orchestrator, content, kind).await
    }

    /// Like [`submit`](Self::submit), but refuses to start while another
    /// submission is in flight.
    pub async fn try_submit(
        &self,
        orchestrator: &FeedbackOrchestrator,
        content: &str,
        kind: InputKind,
    ) -> Result<ChatMessage, ConversationBusy> {
        {
            let mut state = self.lock();
            if state.in_flight > 0 {
                return Err(ConversationBusy);
            }
            self.begin(&mut state, content);
        }
        Ok(self.run(orchestrator, content, kind).await)
    }

    /// Empties the history and resets the visible progress. A run already in
    /// flight keeps going, still blocks `try_submit`, and records its answer
    /// when it settles.
    pub fn clear(&self) {
        {
            let mut state = self.lock();
            if state.in_flight > 0 {
                debug!(in_flight = state.in_flight, "Clearing history while a submission is in flight");
            }
            state.messages.clear();
            state.is_processing = false;
            state.current_step = None;
        }
        self.emit(ConversationEvent::Cleared);
    }

    fn begin(&self, state: &mut ConversationState, content: &str) {
        let message = ChatMessage::user(content);
        state.messages.push_front(message.clone());
        state.in_flight += 1;
        state.is_processing = true;
        state.current_step = Some(ProcessingStep::InitialAnalysis);
        self.emit(ConversationEvent::MessageAdded(message));
        self.emit(ConversationEvent::StepChanged(state.current_step));
    }

    fn set_step(&self, step: Option<ProcessingStep>) {
        let mut state = self.lock();
        if state.current_step != step {
            state.current_step = step;
            self.emit(ConversationEvent::StepChanged(step));
        }
    }

    async fn run(
        &self,
        orchestrator: &FeedbackOrchestrator,
        content: &str,
        kind: InputKind,
    ) -> ChatMessage {
        // The settled state is owned by `settle`, which knows about other runs.
        let on_step = |step: Option<ProcessingStep>| {
            if step.is_some() {
                self.set_step(step);
            }
        };
        let response = match orchestrator.process(content, kind, &on_step).await {
            Ok(response) => response,
            Err(err) => {
                warn!(error = %err, "Submission failed");
                StructuredResponse::apology()
            }
        };
        self.settle(response)
    }

    fn settle(&self, response: StructuredResponse) -> ChatMessage {
        let message = ChatMessage::assistant(response);
        let mut state = self.lock();
        state.messages.push_front(message.clone());
        state.in_flight = state.in_flight.saturating_sub(1);
        self.emit(ConversationEvent::MessageAdded(message.clone()));
        if state.in_flight == 0 {
            state.is_processing = false;
            if state.current_step.take().is_some() {
                self.emit(ConversationEvent::StepChanged(None));
            }
        }
        message
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::message::{MessageRole, ResponseKind, APOLOGY_TEXT};
    use crate::utils::test_utils::{orchestrator_with, FakeMedia, ScriptedInference, SQUAT_REPLY};
    use tokio::sync::Notify;

    fn drain(rx: &mut mpsc::UnboundedReceiver<ConversationEvent>) -> Vec<ConversationEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    async fn wait_until_processing(store: &ConversationStore) {
        while !store.is_processing() {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn successful_submission_adds_user_then_assistant() {
        let inference = Arc::new(ScriptedInference::replying(SQUAT_REPLY));
        let media = Arc::new(FakeMedia::new());
        let orchestrator = orchestrator_with(&inference, &media);
        let (store, mut rx) = ConversationStore::new();

        let reply = store
            .submit(&orchestrator, "How to do a proper squat?", InputKind::Text)
            .await;

        let messages = store.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, MessageRole::Assistant);
        assert_eq!(messages[0].content, "Great question!");
        assert_eq!(messages[0], reply);
        assert_eq!(messages[1].role, MessageRole::User);
        assert_eq!(messages[1].content, "How to do a proper squat?");
        assert!(!store.is_processing());
        assert_eq!(store.current_step(), None);

        let steps: Vec<Option<ProcessingStep>> = drain(&mut rx)
            .into_iter()
            .filter_map(|event| match event {
                ConversationEvent::StepChanged(step) => Some(step),
                _ => None,
            })
            .collect();
        let expected: Vec<Option<ProcessingStep>> = ProcessingStep::SEQUENCE
            .into_iter()
            .map(Some)
            .chain(std::iter::once(None))
            .collect();
        assert_eq!(steps, expected);
    }

    #[tokio::test]
    async fn failed_submission_records_apology() {
        let inference = Arc::new(ScriptedInference::failing_analysis("502 bad gateway"));
        let media = Arc::new(FakeMedia::new());
        let orchestrator = orchestrator_with(&inference, &media);
        let store = ConversationStore::detached();

        store.submit(&orchestrator, "first", InputKind::Text).await;
        store.submit(&orchestrator, "second", InputKind::Audio).await;

        assert_eq!(store.len(), 4);
        let latest = store.messages().remove(0);
        assert_eq!(latest.content, APOLOGY_TEXT);
        let response = latest.response.expect("apology carries a response");
        assert_eq!(response.kind, ResponseKind::Feedback);
        assert_eq!(response.text.as_deref(), Some(APOLOGY_TEXT));
        assert!(response.image_url.is_none());
        assert!(!store.is_processing());
        assert_eq!(store.current_step(), None);
    }

    #[tokio::test]
    async fn history_grows_by_two_per_settled_submission() {
        let inference = Arc::new(ScriptedInference::replying(SQUAT_REPLY));
        let media = Arc::new(FakeMedia::new());
        let orchestrator = orchestrator_with(&inference, &media);
        let store = ConversationStore::detached();

        for round in 1..=3 {
            let before = store.len();
            store
                .submit(&orchestrator, &format!("question {round}"), InputKind::Text)
                .await;
            assert_eq!(store.len(), before + 2);
        }
        assert_eq!(store.messages()[1].content, "question 3");
        assert_eq!(
            store.latest_response().and_then(|response| response.text),
            Some("Great question!".to_string())
        );
    }

    #[tokio::test]
    async fn clear_while_idle_resets_everything() {
        let inference = Arc::new(ScriptedInference::replying(SQUAT_REPLY));
        let media = Arc::new(FakeMedia::new());
        let orchestrator = orchestrator_with(&inference, &media);
        let (store, mut rx) = ConversationStore::new();

        store.submit(&orchestrator, "Squat?", InputKind::Text).await;
        drain(&mut rx);
        store.clear();

        assert_eq!(store.snapshot(), ConversationState::default());
        assert!(store.is_empty());
        assert_eq!(drain(&mut rx), vec![ConversationEvent::Cleared]);

        store.clear();
        assert_eq!(store.snapshot(), ConversationState::default());
    }

    #[tokio::test]
    async fn submission_marks_store_busy_until_settled() {
        let gate = Arc::new(Notify::new());
        let inference = Arc::new(ScriptedInference::replying(SQUAT_REPLY).gated(gate.clone()));
        let media = Arc::new(FakeMedia::new());
        let orchestrator = orchestrator_with(&inference, &media);
        let store = ConversationStore::detached();

        let task = {
            let store = store.clone();
            tokio::spawn(async move { store.submit(&orchestrator, "Squat?", InputKind::Text).await })
        };
        wait_until_processing(&store).await;

        assert_eq!(store.len(), 1);
        assert!(store.messages()[0].is_user());
        assert_eq!(store.current_step(), Some(ProcessingStep::InitialAnalysis));

        gate.notify_one();
        task.await.expect("submission task");
        assert!(!store.is_processing());
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn clear_during_flight_is_resurrected_by_late_reply() {
        let gate = Arc::new(Notify::new());
        let inference = Arc::new(ScriptedInference::replying(SQUAT_REPLY).gated(gate.clone()));
        let media = Arc::new(FakeMedia::new());
        let orchestrator = orchestrator_with(&inference, &media);
        let store = ConversationStore::detached();

        let task = {
            let store = store.clone();
            tokio::spawn(async move { store.submit(&orchestrator, "Squat?", InputKind::Text).await })
        };
        wait_until_processing(&store).await;

        store.clear();
        assert!(store.is_empty());
        assert!(!store.is_processing());

        gate.notify_one();
        task.await.expect("submission task");

        let messages = store.messages();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].is_assistant());
        assert!(!store.is_processing());
    }

    #[tokio::test]
    async fn try_submit_refuses_while_busy() {
        let gate = Arc::new(Notify::new());
        let inference = Arc::new(ScriptedInference::replying(SQUAT_REPLY).gated(gate.clone()));
        let media = Arc::new(FakeMedia::new());
        let orchestrator = orchestrator_with(&inference, &media);
        let store = ConversationStore::detached();

        let task = {
            let store = store.clone();
            let orchestrator = orchestrator.clone();
            tokio::spawn(async move { store.try_submit(&orchestrator, "first", InputKind::Text).await })
        };
        wait_until_processing(&store).await;

        let refused = store.try_submit(&orchestrator, "second", InputKind::Text).await;
        assert_eq!(refused, Err(ConversationBusy));
        assert_eq!(store.len(), 1);

        gate.notify_one();
        task.await
            .expect("submission task")
            .expect("first submission runs");
        assert_eq!(store.len(), 2);

        gate.notify_one();
        store
            .try_submit(&orchestrator, "third", InputKind::Text)
            .await
            .expect("idle store accepts submissions");
        assert_eq!(store.len(), 4);
    }

    #[tokio::test]
    async fn clear_does_not_reopen_try_submit_while_a_run_is_in_flight() {
        let gate = Arc::new(Notify::new());
        let inference = Arc::new(ScriptedInference::replying(SQUAT_REPLY).gated(gate.clone()));
        let media = Arc::new(FakeMedia::new());
        let orchestrator = orchestrator_with(&inference, &media);
        let store = ConversationStore::detached();

        let task = {
            let store = store.clone();
            let orchestrator = orchestrator.clone();
            tokio::spawn(async move { store.try_submit(&orchestrator, "first", InputKind::Text).await })
        };
        wait_until_processing(&store).await;

        store.clear();
        assert!(!store.is_processing());
        let refused = store.try_submit(&orchestrator, "second", InputKind::Text).await;
        assert_eq!(refused, Err(ConversationBusy));
        assert!(store.is_empty());

        gate.notify_one();
        task.await
            .expect("submission task")
            .expect("first submission runs");
        assert_eq!(store.len(), 1);

        gate.notify_one();
        store
            .try_submit(&orchestrator, "third", InputKind::Text)
            .await
            .expect("settled store accepts submissions");
        assert_eq!(store.len(), 3);
    }

    #[tokio::test]
    async fn store_stays_busy_until_the_last_overlapping_run_settles() {
        let gate = Arc::new(Notify::new());
        let inference = Arc::new(ScriptedInference::replying(SQUAT_REPLY).gated(gate.clone()));
        let media = Arc::new(FakeMedia::new());
        let orchestrator = orchestrator_with(&inference, &media);
        let store = ConversationStore::detached();

        let spawn_submit = |content: &'static str| {
            let store = store.clone();
            let orchestrator = orchestrator.clone();
            tokio::spawn(async move { store.submit(&orchestrator, content, InputKind::Text).await })
        };
        let first = spawn_submit("first");
        let second = spawn_submit("second");
        while store.len() < 2 {
            tokio::task::yield_now().await;
        }

        gate.notify_one();
        while store.len() < 3 {
            tokio::task::yield_now().await;
        }
        assert!(store.is_processing());
        assert!(store.current_step().is_some());

        gate.notify_one();
        first.await.expect("first task");
        second.await.expect("second task");
        assert_eq!(store.len(), 4);
        assert!(!store.is_processing());
        assert_eq!(store.current_step(), None);
    }

    #[tokio::test]
    async fn concurrent_submits_both_settle() {
        let inference = Arc::new(ScriptedInference::replying(SQUAT_REPLY));
        let media = Arc::new(FakeMedia::new());
        let orchestrator = orchestrator_with(&inference, &media);
        let store = ConversationStore::detached();

        tokio::join!(
            store.submit(&orchestrator, "one", InputKind::Text),
            store.submit(&orchestrator, "two", InputKind::Text),
        );

        assert_eq!(store.len(), 4);
        assert!(!store.is_processing());
        assert_eq!(store.current_step(), None);
    }
}

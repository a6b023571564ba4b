use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use agent_protocol::{
    CancelSignal, ChatRequest, ChatTransport, HistoryMessage, MessageContent, MessageRequest,
    ResumeCommand, ResumeRequest, TransportError, WireEvent,
};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::conversation::{ConversationState, Message};
use crate::error::SessionError;
use crate::hitl::{InterruptDescriptor, InterruptView};
use crate::reducer::{begin_stream, end_stream, fail_stream, new_id, reduce, ReduceOutcome};

/// Request parameters shared by every stream of a session.
///
/// An empty `model` or a zero `max_iterations` leaves the value to the transport.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionConfig {
    pub model: String,
    pub max_iterations: u32,
    pub thread_id: Option<String>,
}

impl SessionConfig {
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_thread_id(mut self, thread_id: impl Into<String>) -> Self {
        self.thread_id = Some(thread_id.into());
        self
    }
}

/// How a submit-class call ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamOutcome {
    /// A stream was already active, or there was nothing to send. No request was made.
    Ignored,
    Completed,
    /// The agent paused for review; see [`ChatSession::interrupt_view`].
    Interrupted,
    /// The agent reported an `error` chunk.
    Failed { error: String },
    /// Stopped by [`ChatSession::stop`] or superseded by a thread switch.
    Cancelled,
}

#[derive(Debug, Default)]
struct SessionInner {
    state: ConversationState,
    pending_interrupt: Option<Value>,
    thread_id: Option<String>,
    generation: u64,
    /// Cancel handle of the stream in flight. Guarded together with `state`
    /// so `stop` cannot observe `is_streaming` without the handle.
    active: Option<ActiveStream>,
}

#[derive(Debug)]
struct ActiveStream {
    generation: u64,
    cancel: CancelSignal,
}

/// One conversation with a remote agent.
///
/// At most one stream is in flight. Submit-class calls block the calling
/// thread until the stream ends; [`ChatSession::stop`] may be called from any
/// other thread.
pub struct ChatSession {
    transport: Arc<dyn ChatTransport>,
    model: String,
    max_iterations: u32,
    inner: Mutex<SessionInner>,
}

impl ChatSession {
    pub fn new(transport: Arc<dyn ChatTransport>, config: SessionConfig) -> Self {
        Self {
            transport,
            model: config.model,
            max_iterations: config.max_iterations,
            inner: Mutex::new(SessionInner {
                thread_id: config.thread_id,
                ..SessionInner::default()
            }),
        }
    }

    /// Snapshot of the conversation state.
    pub fn state(&self) -> ConversationState {
        lock_unpoisoned(&self.inner).state.clone()
    }

    pub fn is_streaming(&self) -> bool {
        lock_unpoisoned(&self.inner).state.is_streaming
    }

    pub fn thread_id(&self) -> Option<String> {
        lock_unpoisoned(&self.inner).thread_id.clone()
    }

    /// Raw payload of the interrupt awaiting review.
    pub fn pending_interrupt(&self) -> Option<Value> {
        lock_unpoisoned(&self.inner).pending_interrupt.clone()
    }

    pub fn interrupt_view(&self) -> Option<InterruptView> {
        self.pending_interrupt()
            .map(|value| InterruptView::from_value(&value))
    }

    /// Sends a human message and streams the agent's reply into the state.
    ///
    /// The human message is appended before the request is issued and is kept
    /// if the request fails.
    pub fn submit(&self, input: impl Into<MessageContent>) -> Result<StreamOutcome, SessionError> {
        let inner = lock_unpoisoned(&self.inner);
        if inner.state.is_streaming {
            debug!("submit ignored; a stream is already active");
            return Ok(StreamOutcome::Ignored);
        }

        let content = input.into();
        let human = Message::human(new_id(), content.clone());
        let request = self.message_request(&inner, content, inner.state.history());
        self.launch(inner, request, Some(human))
    }

    /// Re-issues the last human message with the history that preceded it,
    /// discarding everything after it.
    pub fn regenerate(&self) -> Result<StreamOutcome, SessionError> {
        let mut inner = lock_unpoisoned(&self.inner);
        if inner.state.is_streaming {
            debug!("regenerate ignored; a stream is already active");
            return Ok(StreamOutcome::Ignored);
        }
        let Some(index) = inner.state.last_human_index() else {
            debug!("regenerate ignored; no human message to re-send");
            return Ok(StreamOutcome::Ignored);
        };

        let human = inner.state.messages[index].clone();
        inner.state.messages.truncate(index);
        let request = self.message_request(&inner, human.content.clone(), inner.state.history());
        self.launch(inner, request, Some(human))
    }

    /// Resumes a paused agent with one decision per reviewed action, in order.
    pub fn resume(&self, command: ResumeCommand) -> Result<StreamOutcome, SessionError> {
        let inner = lock_unpoisoned(&self.inner);
        if inner.state.is_streaming {
            debug!("resume ignored; a stream is already active");
            return Ok(StreamOutcome::Ignored);
        }

        let pending = inner
            .pending_interrupt
            .as_ref()
            .ok_or(SessionError::NoPendingInterrupt)?;
        let descriptor = InterruptDescriptor::parse(pending)?;
        descriptor.reviewed_actions()?;
        if command.decisions().len() != descriptor.len() {
            return Err(SessionError::DecisionCountMismatch {
                expected: descriptor.len(),
                actual: command.decisions().len(),
            });
        }

        let request = ChatRequest::Resume(ResumeRequest {
            command,
            thread_id: inner.thread_id.clone(),
        });
        self.launch(inner, request, None)
    }

    /// Aborts the active stream. Content received so far stays in the state.
    pub fn stop(&self) -> bool {
        let mut inner = lock_unpoisoned(&self.inner);
        let active = inner.active.take();
        if let Some(active) = &active {
            active.cancel.store(true, Ordering::Release);
        }

        let was_streaming = inner.state.is_streaming;
        if was_streaming {
            end_stream(&mut inner.state);
            info!("stream stopped");
        }
        was_streaming || active.is_some()
    }

    /// Replaces the state with the stored records of `thread_id`.
    pub fn load_history(&self, thread_id: &str) -> Result<usize, SessionError> {
        if self.is_streaming() {
            return Err(SessionError::StreamActive);
        }

        let records = self.transport.fetch_thread(thread_id)?;
        let count = records.len();

        let mut inner = lock_unpoisoned(&self.inner);
        if inner.state.is_streaming {
            return Err(SessionError::StreamActive);
        }
        inner.state = ConversationState::from_history(records);
        inner.pending_interrupt = None;
        inner.thread_id = Some(thread_id.to_string());
        inner.generation += 1;
        info!(thread_id, messages = count, "history loaded");
        Ok(count)
    }

    /// Starts over on another thread, stopping any active stream.
    pub fn switch_thread(&self, thread_id: Option<String>) {
        self.stop();

        let mut inner = lock_unpoisoned(&self.inner);
        inner.state = ConversationState::new();
        inner.pending_interrupt = None;
        inner.thread_id = thread_id;
        inner.generation += 1;
    }

    fn message_request(
        &self,
        inner: &SessionInner,
        message: MessageContent,
        conversation_history: Vec<HistoryMessage>,
    ) -> ChatRequest {
        ChatRequest::Message(MessageRequest {
            message,
            conversation_history,
            model: self.model.clone(),
            max_iterations: self.max_iterations,
            thread_id: inner.thread_id.clone(),
        })
    }

    fn launch(
        &self,
        mut inner: MutexGuard<'_, SessionInner>,
        request: ChatRequest,
        human: Option<Message>,
    ) -> Result<StreamOutcome, SessionError> {
        inner.generation += 1;
        let generation = inner.generation;
        let cancel: CancelSignal = Arc::new(AtomicBool::new(false));

        begin_stream(&mut inner.state, human);
        inner.pending_interrupt = None;
        inner.active = Some(ActiveStream {
            generation,
            cancel: Arc::clone(&cancel),
        });
        drop(inner);

        info!(generation, "stream started");
        let mut emit = |event: WireEvent| self.apply_event(generation, event);
        let result = self.transport.open_stream(request, Arc::clone(&cancel), &mut emit);
        self.finish(generation, &cancel, result)
    }

    fn apply_event(&self, generation: u64, event: WireEvent) {
        let mut inner = lock_unpoisoned(&self.inner);
        if inner.generation != generation || !inner.state.is_streaming {
            debug!(generation, "event for an inactive stream dropped");
            return;
        }

        match event {
            WireEvent::Chunk(chunk) => {
                if reduce(&mut inner.state, chunk) == ReduceOutcome::Terminal {
                    debug!(generation, "terminal chunk applied");
                }
            }
            WireEvent::Interrupt { value } => {
                info!(generation, "agent paused for review");
                inner.pending_interrupt = Some(value);
            }
        }
    }

    fn finish(
        &self,
        generation: u64,
        cancel: &CancelSignal,
        result: Result<(), TransportError>,
    ) -> Result<StreamOutcome, SessionError> {
        let mut inner = lock_unpoisoned(&self.inner);
        if inner
            .active
            .as_ref()
            .is_some_and(|active| active.generation == generation)
        {
            inner.active = None;
        }

        if inner.generation != generation || cancel.load(Ordering::Acquire) {
            if inner.generation == generation && inner.state.is_streaming {
                end_stream(&mut inner.state);
            }
            return Ok(StreamOutcome::Cancelled);
        }

        match result {
            Err(error) if error.is_abort() => {
                end_stream(&mut inner.state);
                info!(generation, "stream cancelled");
                Ok(StreamOutcome::Cancelled)
            }
            Err(error) => {
                warn!(generation, %error, "stream failed");
                fail_stream(&mut inner.state, error.to_string());
                Err(SessionError::Transport(error))
            }
            Ok(()) => {
                if inner.state.is_streaming {
                    if inner.pending_interrupt.is_none() {
                        debug!(generation, "stream ended without a terminal chunk");
                    }
                    end_stream(&mut inner.state);
                }

                if let Some(error) = inner.state.last_error.clone() {
                    return Ok(StreamOutcome::Failed { error });
                }
                if inner.pending_interrupt.is_some() {
                    return Ok(StreamOutcome::Interrupted);
                }
                info!(generation, "stream completed");
                Ok(StreamOutcome::Completed)
            }
        }
    }
}

fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

//! Deterministic scripted implementation of the `agent_protocol` transport contract.
//!
//! This crate contains no network code. Each `open_stream` call consumes the next
//! scripted response in order and every request is recorded for assertions.

use std::collections::VecDeque;
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use agent_protocol::{
    CancelSignal, ChatRequest, ChatTransport, HistoryMessage, StreamChunk, TransportError,
    WireEvent,
};
use serde_json::Value;

/// One scripted reply to an `open_stream` call.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptedStream {
    /// Emits the events in order, then ends the stream successfully.
    Events(Vec<WireEvent>),
    /// Emits the events in order, then fails with `error`.
    FailAfter {
        events: Vec<WireEvent>,
        error: TransportError,
    },
    /// Emits the events with `delay` between them, observing cancellation.
    Paced {
        events: Vec<WireEvent>,
        delay: Duration,
    },
}

impl ScriptedStream {
    /// Convenience for a chunk-only script.
    #[must_use]
    pub fn chunks(chunks: Vec<StreamChunk>) -> Self {
        Self::Events(chunks.into_iter().map(WireEvent::Chunk).collect())
    }

    /// Chunks followed by an interrupt payload, the way a paused agent ends a stream.
    #[must_use]
    pub fn chunks_then_interrupt(chunks: Vec<StreamChunk>, interrupt: Value) -> Self {
        let mut events: Vec<WireEvent> = chunks.into_iter().map(WireEvent::Chunk).collect();
        events.push(WireEvent::Interrupt { value: interrupt });
        Self::Events(events)
    }
}

#[derive(Debug, Default)]
struct TransportState {
    scripts: VecDeque<ScriptedStream>,
    threads: Vec<(String, Vec<HistoryMessage>)>,
    requests: Vec<ChatRequest>,
    fetched_threads: Vec<String>,
}

/// Scripted transport used by session tests and local runs.
#[derive(Debug, Default, Clone)]
pub struct ScriptedTransport {
    state: Arc<Mutex<TransportState>>,
}

impl ScriptedTransport {
    #[must_use]
    pub fn new(scripts: Vec<ScriptedStream>) -> Self {
        let transport = Self::default();
        lock_unpoisoned(&transport.state).scripts = scripts.into();
        transport
    }

    /// Appends a scripted reply for a later `open_stream` call.
    pub fn push_script(&self, script: ScriptedStream) {
        lock_unpoisoned(&self.state).scripts.push_back(script);
    }

    /// Registers the records returned for `fetch_thread(thread_id)`.
    pub fn insert_thread(&self, thread_id: impl Into<String>, records: Vec<HistoryMessage>) {
        lock_unpoisoned(&self.state)
            .threads
            .push((thread_id.into(), records));
    }

    /// Every request passed to `open_stream`, in call order.
    #[must_use]
    pub fn requests(&self) -> Vec<ChatRequest> {
        lock_unpoisoned(&self.state).requests.clone()
    }

    #[must_use]
    pub fn request_count(&self) -> usize {
        lock_unpoisoned(&self.state).requests.len()
    }

    #[must_use]
    pub fn fetched_threads(&self) -> Vec<String> {
        lock_unpoisoned(&self.state).fetched_threads.clone()
    }
}

impl ChatTransport for ScriptedTransport {
    fn open_stream(
        &self,
        request: ChatRequest,
        cancel: CancelSignal,
        emit: &mut dyn FnMut(WireEvent),
    ) -> Result<(), TransportError> {
        let script = {
            let mut state = lock_unpoisoned(&self.state);
            state.requests.push(request);
            state.scripts.pop_front()
        };

        let Some(script) = script else {
            return Err(TransportError::Request(
                "no scripted response left for this request".to_string(),
            ));
        };

        match script {
            ScriptedStream::Events(events) => emit_all(events, &cancel, Duration::ZERO, emit),
            ScriptedStream::FailAfter { events, error } => {
                emit_all(events, &cancel, Duration::ZERO, emit)?;
                Err(error)
            }
            ScriptedStream::Paced { events, delay } => emit_all(events, &cancel, delay, emit),
        }
    }

    fn fetch_thread(&self, thread_id: &str) -> Result<Vec<HistoryMessage>, TransportError> {
        let mut state = lock_unpoisoned(&self.state);
        state.fetched_threads.push(thread_id.to_string());
        state
            .threads
            .iter()
            .find(|(id, _)| id == thread_id)
            .map(|(_, records)| records.clone())
            .ok_or_else(|| TransportError::Status {
                status: 404,
                message: format!("thread '{thread_id}' not found"),
            })
    }
}

fn emit_all(
    events: Vec<WireEvent>,
    cancel: &CancelSignal,
    delay: Duration,
    emit: &mut dyn FnMut(WireEvent),
) -> Result<(), TransportError> {
    for event in events {
        if cancel.load(Ordering::Acquire) {
            return Err(TransportError::Cancelled);
        }
        if !delay.is_zero() {
            thread::sleep(delay);
            if cancel.load(Ordering::Acquire) {
                return Err(TransportError::Cancelled);
            }
        }
        emit(event);
    }

    if cancel.load(Ordering::Acquire) {
        return Err(TransportError::Cancelled);
    }
    Ok(())
}

fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

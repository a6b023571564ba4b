//! Streaming conversation engine for remote language-model agents.
//!
//! A [`ChatSession`] submits messages through a [`ChatTransport`], folds the
//! streamed chunks into a [`ConversationState`] with [`reduce`], and records
//! HITL interrupts for review.
//!
//! # Public API Overview
//! - Derive display structure with [`group_turns`] and [`AgentTurn::process_trail`].
//! - Split tagged agent text with [`parse_segments`].
//! - Review paused actions with [`InterruptView`], [`DecisionBuilder`] and
//!   [`BatchCoordinator`], then pass the resulting [`ResumeCommand`] to
//!   [`ChatSession::resume`].
//!
//! Wire types live in `agent_protocol` and are re-exported here.

pub mod conversation;
pub mod correlate;
pub mod error;
pub mod hitl;
pub mod reducer;
pub mod session;
pub mod tags;
pub mod turns;

pub use agent_protocol::{
    CancelSignal, ChatRequest, ChatTransport, ContentBlock, Decision, DecisionKind, EditedAction,
    HistoryMessage, HistoryRole, HistoryToolCall, MessageContent, MessageRequest, ResumeCommand,
    ResumeRequest, StreamChunk, TransportError, WireEvent,
};

pub use crate::conversation::{ConversationState, Message, MessageKind, ToolCall, ToolCallStatus};
pub use crate::correlate::{complete_tool_call, Correlation};
pub use crate::error::{BatchError, InterruptShapeError, SessionError, ValidationError};
pub use crate::hitl::{
    ActionRequest, ActionStatus, BatchCoordinator, DecisionBuilder, Draft, InterruptDescriptor,
    InterruptView, ReviewConfig,
};
pub use crate::reducer::{begin_stream, end_stream, fail_stream, reduce, ReduceOutcome};
pub use crate::session::{ChatSession, SessionConfig, StreamOutcome};
pub use crate::tags::{contains_tags, parse_segments, Segment, StepLabel};
pub use crate::turns::{group_turns, AgentTurn, ProcessTrail, TrailStep, Turn};

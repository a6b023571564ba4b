//! Transport-neutral contract between the conversation engine and a remote agent.
//!
//! This crate defines the wire-level value types (stream chunks, request bodies,
//! history records, HITL decisions) and the [`ChatTransport`] trait. It contains
//! no HTTP code and no conversation state.

use std::sync::{atomic::AtomicBool, Arc};

use base64::{engine::general_purpose, Engine as _};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Shared cancellation flag for one in-flight stream.
pub type CancelSignal = Arc<AtomicBool>;

/// One decoded unit of the streamed response, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamChunk {
    /// Text delta for the open assistant message.
    Response { content: String },
    ToolCall {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        tool_name: String,
        #[serde(default)]
        tool_input: Value,
    },
    ToolResult {
        tool_name: String,
        #[serde(default)]
        tool_output: Value,
    },
    /// Reasoning delta. Never rendered as visible content.
    Thought { content: String },
    Error { content: String },
    Done,
}

impl StreamChunk {
    /// Returns true when this chunk closes the stream.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Error { .. } | Self::Done)
    }
}

/// Event surfaced by a transport while a stream is open.
#[derive(Debug, Clone, PartialEq)]
pub enum WireEvent {
    Chunk(StreamChunk),
    /// Raw HITL interrupt payload; shape validation belongs to the engine.
    Interrupt { value: Value },
}

/// Multimodal content block used for human input and history records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    Image {
        #[serde(rename = "mimeType")]
        mime_type: String,
        data: String,
    },
    File {
        #[serde(rename = "mimeType")]
        mime_type: String,
        #[serde(default)]
        metadata: Value,
    },
}

impl ContentBlock {
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// Builds an image block from raw bytes, base64-encoding the payload.
    #[must_use]
    pub fn image_from_bytes(mime_type: impl Into<String>, bytes: &[u8]) -> Self {
        Self::Image {
            mime_type: mime_type.into(),
            data: general_purpose::STANDARD.encode(bytes),
        }
    }
}

/// Message body: plain text or an ordered list of content blocks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

impl Default for MessageContent {
    fn default() -> Self {
        Self::Text(String::new())
    }
}

impl From<&str> for MessageContent {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for MessageContent {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<Vec<ContentBlock>> for MessageContent {
    fn from(value: Vec<ContentBlock>) -> Self {
        Self::Blocks(value)
    }
}

impl MessageContent {
    /// Concatenated text of all text blocks.
    #[must_use]
    pub fn text(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Blocks(blocks) => blocks
                .iter()
                .filter_map(|block| match block {
                    ContentBlock::Text { text } => Some(text.as_str()),
                    _ => None,
                })
                .collect::<Vec<_>>()
                .join(""),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Text(text) => text.is_empty(),
            Self::Blocks(blocks) => blocks.is_empty(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryRole {
    User,
    Assistant,
    Tool,
}

/// Tool call as carried in history records and request history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryToolCall {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub args: Value,
}

/// One record of a stored thread, also used as a `conversation_history` entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryMessage {
    pub role: HistoryRole,
    #[serde(default)]
    pub content: MessageContent,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<HistoryToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Body of a new-message request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageRequest {
    pub message: MessageContent,
    pub conversation_history: Vec<HistoryMessage>,
    pub model: String,
    pub max_iterations: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
}

/// Body of a resume request after a HITL pause.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResumeRequest {
    pub command: ResumeCommand,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResumeCommand {
    pub resume: ResumeDecisions,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResumeDecisions {
    pub decisions: Vec<Decision>,
}

impl ResumeCommand {
    #[must_use]
    pub fn new(decisions: Vec<Decision>) -> Self {
        Self {
            resume: ResumeDecisions { decisions },
        }
    }

    #[must_use]
    pub fn decisions(&self) -> &[Decision] {
        &self.resume.decisions
    }
}

/// Either request shape a transport may be asked to stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChatRequest {
    Message(MessageRequest),
    Resume(ResumeRequest),
}

/// Action the agent proposed, as edited by the reviewer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditedAction {
    pub name: String,
    pub args: Value,
}

/// Serialized outcome of one HITL action review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Decision {
    Approve,
    Reject { message: String },
    Edit { edited_action: EditedAction },
}

impl Decision {
    #[must_use]
    pub fn kind(&self) -> DecisionKind {
        match self {
            Self::Approve => DecisionKind::Approve,
            Self::Reject { .. } => DecisionKind::Reject,
            Self::Edit { .. } => DecisionKind::Edit,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionKind {
    Approve,
    Edit,
    Reject,
}

impl DecisionKind {
    pub fn parse(value: &str) -> Option<Self> {
        Some(match value {
            "approve" => Self::Approve,
            "edit" => Self::Edit,
            "reject" => Self::Reject,
            _ => return None,
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Approve => "approve",
            Self::Edit => "edit",
            Self::Reject => "reject",
        }
    }
}

/// Failure reported by a transport.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Request(String),
    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },
    #[error("stream read failed: {0}")]
    Stream(String),
    /// The caller aborted the request. Not a failure from the user's perspective.
    #[error("request was cancelled")]
    Cancelled,
}

impl TransportError {
    #[must_use]
    pub fn is_abort(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Transport interface for streaming agent responses and fetching stored threads.
pub trait ChatTransport: Send + Sync + 'static {
    /// Issues `request` and emits decoded events in wire order.
    ///
    /// `emit` is called synchronously for each event; the next read happens only
    /// after it returns. Implementations must observe `cancel` within one pending
    /// read and return [`TransportError::Cancelled`].
    fn open_stream(
        &self,
        request: ChatRequest,
        cancel: CancelSignal,
        emit: &mut dyn FnMut(WireEvent),
    ) -> Result<(), TransportError>;

    /// Fetches the ordered message records of a stored thread.
    fn fetch_thread(&self, thread_id: &str) -> Result<Vec<HistoryMessage>, TransportError>;
}

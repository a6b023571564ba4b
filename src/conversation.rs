use agent_protocol::{HistoryMessage, HistoryRole, HistoryToolCall, MessageContent};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Human,
    Assistant,
    Tool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolCallStatus {
    Pending,
    Completed,
}

/// A tool invocation owned by exactly one assistant message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub args: Value,
    pub status: ToolCallStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub kind: MessageKind,
    pub content: MessageContent,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Accumulated `thought` deltas; never part of the visible content.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub reasoning: String,
}

impl Message {
    pub fn human(id: impl Into<String>, content: impl Into<MessageContent>) -> Self {
        Self::with_kind(id, MessageKind::Human, content.into())
    }

    pub fn assistant(id: impl Into<String>, content: impl Into<MessageContent>) -> Self {
        Self::with_kind(id, MessageKind::Assistant, content.into())
    }

    pub fn tool(
        id: impl Into<String>,
        tool_call_id: impl Into<String>,
        name: impl Into<String>,
        content: impl Into<MessageContent>,
    ) -> Self {
        Self {
            tool_call_id: Some(tool_call_id.into()),
            name: Some(name.into()),
            ..Self::with_kind(id, MessageKind::Tool, content.into())
        }
    }

    fn with_kind(id: impl Into<String>, kind: MessageKind, content: MessageContent) -> Self {
        Self {
            id: id.into(),
            kind,
            content,
            tool_calls: Vec::new(),
            tool_call_id: None,
            name: None,
            reasoning: String::new(),
        }
    }

    /// Visible text of the message.
    pub fn text(&self) -> String {
        self.content.text()
    }

    /// Appends a text delta, keeping block-shaped content block-shaped.
    pub(crate) fn push_text(&mut self, delta: &str) {
        match &mut self.content {
            MessageContent::Text(text) => text.push_str(delta),
            MessageContent::Blocks(blocks) => {
                if let Some(agent_protocol::ContentBlock::Text { text }) = blocks.last_mut() {
                    text.push_str(delta);
                } else {
                    blocks.push(agent_protocol::ContentBlock::text(delta));
                }
            }
        }
    }

    pub fn is_empty_turn_output(&self) -> bool {
        self.content.is_empty() && self.tool_calls.is_empty()
    }

    /// Model-facing history record for this message.
    pub fn to_history(&self) -> HistoryMessage {
        let role = match self.kind {
            MessageKind::Human => HistoryRole::User,
            MessageKind::Assistant => HistoryRole::Assistant,
            MessageKind::Tool => HistoryRole::Tool,
        };

        HistoryMessage {
            role,
            content: self.content.clone(),
            tool_calls: self
                .tool_calls
                .iter()
                .map(|call| HistoryToolCall {
                    id: Some(call.id.clone()),
                    name: call.name.clone(),
                    args: call.args.clone(),
                })
                .collect(),
            tool_call_id: self.tool_call_id.clone(),
            name: self.name.clone(),
        }
    }

    /// Maps one stored record 1:1 into a message. Stored tool calls are complete.
    pub fn from_history(id: impl Into<String>, record: HistoryMessage) -> Self {
        let kind = match record.role {
            HistoryRole::User => MessageKind::Human,
            HistoryRole::Assistant => MessageKind::Assistant,
            HistoryRole::Tool => MessageKind::Tool,
        };
        let id = id.into();

        let tool_calls = record
            .tool_calls
            .into_iter()
            .enumerate()
            .map(|(index, call)| ToolCall {
                id: call.id.unwrap_or_else(|| format!("{id}-call-{index}")),
                name: call.name,
                args: call.args,
                status: ToolCallStatus::Completed,
            })
            .collect();

        Self {
            tool_calls,
            tool_call_id: record.tool_call_id,
            name: record.name,
            ..Self::with_kind(id, kind, record.content)
        }
    }
}

/// Per-session conversation state.
///
/// While `is_streaming` is true, `active_assistant_message_id` names an
/// assistant message at the tail of `messages`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConversationState {
    pub messages: Vec<Message>,
    pub active_assistant_message_id: Option<String>,
    pub is_streaming: bool,
    pub last_error: Option<String>,
}

impl ConversationState {
    pub fn new() -> Self {
        Self::default()
    }

    /// State rebuilt from stored thread records.
    pub fn from_history(records: Vec<HistoryMessage>) -> Self {
        let messages = records
            .into_iter()
            .enumerate()
            .map(|(index, record)| Message::from_history(format!("history-{index}"), record))
            .collect();

        Self {
            messages,
            ..Self::default()
        }
    }

    pub fn active_assistant(&self) -> Option<&Message> {
        let id = self.active_assistant_message_id.as_deref()?;
        self.messages
            .iter()
            .rev()
            .find(|message| message.kind == MessageKind::Assistant && message.id == id)
    }

    /// Appends an empty assistant message and makes it the streaming target.
    pub(crate) fn open_assistant(&mut self, id: String) {
        self.messages.push(Message::assistant(id.clone(), ""));
        self.active_assistant_message_id = Some(id);
    }

    /// History records for every message, in order.
    pub fn history(&self) -> Vec<HistoryMessage> {
        self.messages.iter().map(Message::to_history).collect()
    }

    pub fn last_human_index(&self) -> Option<usize> {
        self.messages
            .iter()
            .rposition(|message| message.kind == MessageKind::Human)
    }
}

//! Tool-call correlation for incoming `tool_result` chunks.

use serde_json::Value;
use tracing::warn;

use crate::conversation::{Message, ToolCall, ToolCallStatus};

/// How a tool result was attached to a call on the active assistant message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Correlation {
    /// Most recently added pending call with the same name.
    Matched { call_id: String },
    /// No pending call with that name; the oldest pending call of any name was used.
    OldestPending { call_id: String, call_name: String },
    /// The message had no pending calls; a completed call was recorded for the result.
    Synthesized { call_id: String },
}

impl Correlation {
    pub fn call_id(&self) -> &str {
        match self {
            Self::Matched { call_id }
            | Self::OldestPending { call_id, .. }
            | Self::Synthesized { call_id } => call_id,
        }
    }
}

/// Marks the call a result for `tool_name` belongs to as completed and returns its id.
///
/// `new_call_id` is invoked only when a call has to be synthesized.
pub fn complete_tool_call(
    message: &mut Message,
    tool_name: &str,
    new_call_id: impl FnOnce() -> String,
) -> Correlation {
    let pending = |call: &&mut ToolCall| call.status == ToolCallStatus::Pending;

    if let Some(call) = message
        .tool_calls
        .iter_mut()
        .rev()
        .filter(pending)
        .find(|call| call.name == tool_name)
    {
        call.status = ToolCallStatus::Completed;
        return Correlation::Matched {
            call_id: call.id.clone(),
        };
    }

    if let Some(call) = message
        .tool_calls
        .iter_mut()
        .find(|call| call.status == ToolCallStatus::Pending)
    {
        warn!(
            tool_name,
            fallback_call = %call.name,
            call_id = %call.id,
            "tool result matches no pending call by name; attaching to oldest pending call"
        );
        call.status = ToolCallStatus::Completed;
        return Correlation::OldestPending {
            call_id: call.id.clone(),
            call_name: call.name.clone(),
        };
    }

    let call_id = new_call_id();
    warn!(tool_name, call_id = %call_id, "tool result arrived with no pending call; recording one");
    message.tool_calls.push(ToolCall {
        id: call_id.clone(),
        name: tool_name.to_string(),
        args: Value::Null,
        status: ToolCallStatus::Completed,
    });
    Correlation::Synthesized { call_id }
}

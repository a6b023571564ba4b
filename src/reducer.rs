//! State transitions for streamed chunks.
//!
//! Every function here takes the conversation state by mutable reference and
//! performs no I/O. The session feeds chunks in wire order, one at a time.

use agent_protocol::{MessageContent, StreamChunk};
use serde_json::Value;
use tracing::debug;

use crate::conversation::{ConversationState, Message, MessageKind, ToolCall, ToolCallStatus};
use crate::correlate::complete_tool_call;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReduceOutcome {
    Applied,
    /// `done` or `error` closed the stream.
    Terminal,
    /// The state was not streaming; nothing changed.
    Ignored,
}

pub(crate) fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Opens a stream: optionally appends the human message, then opens the
/// assistant message that receives the response.
pub fn begin_stream(state: &mut ConversationState, human: Option<Message>) {
    if let Some(human) = human {
        state.messages.push(human);
    }
    state.open_assistant(new_id());
    state.is_streaming = true;
    state.last_error = None;
}

/// Closes the stream without an error. Partial content stays in place.
pub fn end_stream(state: &mut ConversationState) {
    state.is_streaming = false;
    state.active_assistant_message_id = None;
}

/// Closes the stream with an error. Partial content stays in place.
pub fn fail_stream(state: &mut ConversationState, error: impl Into<String>) {
    state.last_error = Some(error.into());
    end_stream(state);
}

pub fn reduce(state: &mut ConversationState, chunk: StreamChunk) -> ReduceOutcome {
    if !state.is_streaming {
        debug!(?chunk, "chunk received while not streaming; ignored");
        return ReduceOutcome::Ignored;
    }

    match chunk {
        StreamChunk::Response { content } => {
            active_assistant(state).push_text(&content);
            ReduceOutcome::Applied
        }
        StreamChunk::ToolCall {
            id,
            tool_name,
            tool_input,
        } => {
            active_assistant(state).tool_calls.push(ToolCall {
                id: id.unwrap_or_else(new_id),
                name: tool_name,
                args: tool_input,
                status: ToolCallStatus::Pending,
            });
            ReduceOutcome::Applied
        }
        StreamChunk::ToolResult {
            tool_name,
            tool_output,
        } => {
            handle_tool_result(state, tool_name, tool_output);
            ReduceOutcome::Applied
        }
        StreamChunk::Thought { content } => {
            active_assistant(state).reasoning.push_str(&content);
            ReduceOutcome::Applied
        }
        StreamChunk::Error { content } => {
            fail_stream(state, content);
            ReduceOutcome::Terminal
        }
        StreamChunk::Done => {
            end_stream(state);
            ReduceOutcome::Terminal
        }
    }
}

fn handle_tool_result(state: &mut ConversationState, tool_name: String, tool_output: Value) {
    let correlation = complete_tool_call(active_assistant(state), &tool_name, new_id);

    state.messages.push(Message::tool(
        new_id(),
        correlation.call_id(),
        tool_name,
        tool_output_content(tool_output),
    ));
    state.open_assistant(new_id());
}

fn tool_output_content(output: Value) -> MessageContent {
    match output {
        Value::String(text) => MessageContent::Text(text),
        Value::Null => MessageContent::default(),
        other => MessageContent::Text(other.to_string()),
    }
}

fn active_assistant(state: &mut ConversationState) -> &mut Message {
    let index = active_index(state);
    &mut state.messages[index]
}

fn active_index(state: &mut ConversationState) -> usize {
    let found = state.active_assistant_message_id.as_deref().and_then(|id| {
        state
            .messages
            .iter()
            .rposition(|message| message.kind == MessageKind::Assistant && message.id == id)
    });

    match found {
        Some(index) => index,
        None => {
            debug!("streaming without an open assistant message; opening one");
            state.open_assistant(new_id());
            state.messages.len() - 1
        }
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    fn streaming_state() -> ConversationState {
        let mut state = ConversationState::new();
        begin_stream(&mut state, Some(Message::human("h1", "find it")));
        state
    }

    fn tool_call(name: &str) -> StreamChunk {
        StreamChunk::ToolCall {
            id: None,
            tool_name: name.to_string(),
            tool_input: json!({"q": name}),
        }
    }

    fn tool_result(name: &str, output: Value) -> StreamChunk {
        StreamChunk::ToolResult {
            tool_name: name.to_string(),
            tool_output: output,
        }
    }

    fn response(content: &str) -> StreamChunk {
        StreamChunk::Response {
            content: content.to_string(),
        }
    }

    fn apply_all(state: &mut ConversationState, chunks: Vec<StreamChunk>) -> Vec<ReduceOutcome> {
        chunks.into_iter().map(|chunk| reduce(state, chunk)).collect()
    }

    #[test]
    fn tool_round_trip_produces_assistant_tool_assistant_chain() {
        let mut state = streaming_state();
        let outcomes = apply_all(
            &mut state,
            vec![
                tool_call("search"),
                tool_result("search", json!("X")),
                response("Y"),
                StreamChunk::Done,
            ],
        );

        assert_eq!(outcomes.last(), Some(&ReduceOutcome::Terminal));
        assert!(!state.is_streaming);

        let kinds: Vec<MessageKind> = state.messages.iter().map(|message| message.kind).collect();
        assert_eq!(
            kinds,
            vec![
                MessageKind::Human,
                MessageKind::Assistant,
                MessageKind::Tool,
                MessageKind::Assistant,
            ]
        );

        let call = &state.messages[1].tool_calls[0];
        assert_eq!(call.name, "search");
        assert_eq!(call.status, ToolCallStatus::Completed);
        assert_eq!(state.messages[2].text(), "X");
        assert_eq!(state.messages[2].tool_call_id.as_deref(), Some(call.id.as_str()));
        assert_eq!(state.messages[3].text(), "Y");
    }

    #[test]
    fn response_deltas_concatenate_on_active_message() {
        let mut state = streaming_state();
        apply_all(&mut state, vec![response("Hel"), response("lo"), response(" there")]);

        assert!(state.is_streaming);
        assert_eq!(state.active_assistant().map(Message::text).as_deref(), Some("Hello there"));
    }

    #[test]
    fn repeated_same_name_calls_correlate_each_result_to_its_own_tool_message() {
        let mut state = streaming_state();
        apply_all(
            &mut state,
            vec![
                StreamChunk::ToolCall {
                    id: Some("c1".to_string()),
                    tool_name: "search".to_string(),
                    tool_input: json!({}),
                },
                StreamChunk::ToolCall {
                    id: Some("c2".to_string()),
                    tool_name: "search".to_string(),
                    tool_input: json!({}),
                },
                tool_result("search", json!("second")),
                StreamChunk::Done,
            ],
        );

        let assistant = &state.messages[1];
        assert_eq!(assistant.tool_calls[0].status, ToolCallStatus::Pending);
        assert_eq!(assistant.tool_calls[1].status, ToolCallStatus::Completed);
        assert_eq!(state.messages[2].tool_call_id.as_deref(), Some("c2"));
    }

    #[test]
    fn every_tool_message_points_at_completed_call_on_preceding_assistant() {
        let mut state = streaming_state();
        apply_all(
            &mut state,
            vec![
                tool_call("search"),
                tool_result("search", json!({"hits": 2})),
                tool_call("fetch"),
                tool_call("lookup"),
                tool_result("unknown_tool", json!("orphan")),
                tool_result("lookup", Value::Null),
                tool_result("late", json!("no call at all")),
                StreamChunk::Done,
            ],
        );

        let tool_results = 4;
        let tool_messages: Vec<usize> = state
            .messages
            .iter()
            .enumerate()
            .filter(|(_, message)| message.kind == MessageKind::Tool)
            .map(|(index, _)| index)
            .collect();
        assert_eq!(tool_messages.len(), tool_results);

        for index in tool_messages {
            let tool = &state.messages[index];
            let owner = &state.messages[index - 1];
            assert_eq!(owner.kind, MessageKind::Assistant);
            let call_id = tool.tool_call_id.as_deref().expect("tool call id");
            assert_ne!(call_id, "unknown");
            let call = owner
                .tool_calls
                .iter()
                .find(|call| call.id == call_id)
                .expect("call on preceding assistant");
            assert_eq!(call.status, ToolCallStatus::Completed);
        }
    }

    #[test]
    fn object_tool_output_is_serialized_into_tool_content() {
        let mut state = streaming_state();
        apply_all(&mut state, vec![tool_call("search"), tool_result("search", json!({"hits": 2}))]);
        assert_eq!(state.messages[2].text(), r#"{"hits":2}"#);
    }

    #[test]
    fn thought_is_hidden_from_visible_content() {
        let mut state = streaming_state();
        apply_all(
            &mut state,
            vec![
                StreamChunk::Thought {
                    content: "pondering".to_string(),
                },
                response("answer"),
            ],
        );

        let assistant = state.active_assistant().expect("active assistant");
        assert_eq!(assistant.text(), "answer");
        assert_eq!(assistant.reasoning, "pondering");
    }

    #[test]
    fn error_preserves_partial_content_and_stops() {
        let mut state = streaming_state();
        let outcomes = apply_all(
            &mut state,
            vec![
                response("partial"),
                StreamChunk::Error {
                    content: "model overloaded".to_string(),
                },
            ],
        );

        assert_eq!(outcomes, vec![ReduceOutcome::Applied, ReduceOutcome::Terminal]);
        assert!(!state.is_streaming);
        assert_eq!(state.last_error.as_deref(), Some("model overloaded"));
        assert_eq!(state.messages[1].text(), "partial");
    }

    #[test]
    fn done_retains_empty_assistant_message() {
        let mut state = streaming_state();
        reduce(&mut state, StreamChunk::Done);

        assert_eq!(state.messages.len(), 2);
        assert_eq!(state.messages[1].kind, MessageKind::Assistant);
        assert!(state.messages[1].is_empty_turn_output());
        assert_eq!(state.active_assistant_message_id, None);
    }

    #[test]
    fn chunks_after_terminal_are_ignored() {
        let mut state = streaming_state();
        reduce(&mut state, StreamChunk::Done);
        let before = state.clone();

        assert_matches!(reduce(&mut state, response("late")), ReduceOutcome::Ignored);
        assert_eq!(state, before);
    }

    #[test]
    fn begin_stream_clears_previous_error() {
        let mut state = streaming_state();
        fail_stream(&mut state, "boom");

        begin_stream(&mut state, None);
        assert!(state.is_streaming);
        assert_eq!(state.last_error, None);
        assert_eq!(
            state.active_assistant().map(|message| message.kind),
            Some(MessageKind::Assistant)
        );
    }
}

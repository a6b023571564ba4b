//! Derived turn view over the flat message list.

use serde_json::Value;

use crate::conversation::{Message, MessageKind, ToolCallStatus};
use crate::tags::{parse_segments, Segment};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Turn<'a> {
    Human(&'a Message),
    Agent(AgentTurn<'a>),
}

impl<'a> Turn<'a> {
    pub fn messages(&self) -> &'a [Message] {
        match self {
            Self::Human(message) => std::slice::from_ref(*message),
            Self::Agent(turn) => turn.messages,
        }
    }
}

/// One or more consecutive assistant and tool messages. Never empty.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AgentTurn<'a> {
    messages: &'a [Message],
}

/// Groups messages into alternating human and agent turns.
///
/// Flattening the result yields the input in order.
pub fn group_turns(messages: &[Message]) -> Vec<Turn<'_>> {
    let mut turns = Vec::new();
    let mut agent_start: Option<usize> = None;

    for (index, message) in messages.iter().enumerate() {
        match message.kind {
            MessageKind::Human => {
                if let Some(start) = agent_start.take() {
                    turns.push(Turn::Agent(AgentTurn {
                        messages: &messages[start..index],
                    }));
                }
                turns.push(Turn::Human(message));
            }
            MessageKind::Assistant | MessageKind::Tool => {
                agent_start.get_or_insert(index);
            }
        }
    }

    if let Some(start) = agent_start {
        turns.push(Turn::Agent(AgentTurn {
            messages: &messages[start..],
        }));
    }

    turns
}

#[derive(Debug, Clone, PartialEq)]
pub enum TrailStep {
    Segment(Segment),
    ToolCall {
        id: String,
        name: String,
        args: Value,
        status: ToolCallStatus,
    },
    ToolResult {
        tool_call_id: Option<String>,
        name: Option<String>,
        content: String,
    },
}

/// Process steps of an agent turn, separated from its final answer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProcessTrail {
    pub steps: Vec<TrailStep>,
    pub answer: Option<String>,
}

impl<'a> AgentTurn<'a> {
    pub fn messages(&self) -> &'a [Message] {
        self.messages
    }

    pub fn last(&self) -> Option<&'a Message> {
        self.messages.last()
    }

    pub fn process_trail(&self) -> ProcessTrail {
        let mut trail = ProcessTrail::default();
        let last_index = self.messages.len().saturating_sub(1);

        for (index, message) in self.messages.iter().enumerate() {
            match message.kind {
                MessageKind::Assistant => {
                    for segment in parse_segments(&message.text(), index == last_index) {
                        match segment {
                            Segment::FinalAnswer { markdown } => match &mut trail.answer {
                                Some(answer) => {
                                    answer.push_str("\n\n");
                                    answer.push_str(&markdown);
                                }
                                None => trail.answer = Some(markdown),
                            },
                            other => trail.steps.push(TrailStep::Segment(other)),
                        }
                    }
                    trail
                        .steps
                        .extend(message.tool_calls.iter().map(|call| TrailStep::ToolCall {
                            id: call.id.clone(),
                            name: call.name.clone(),
                            args: call.args.clone(),
                            status: call.status,
                        }));
                }
                MessageKind::Tool => trail.steps.push(TrailStep::ToolResult {
                    tool_call_id: message.tool_call_id.clone(),
                    name: message.name.clone(),
                    content: message.text(),
                }),
                MessageKind::Human => {}
            }
        }

        trail
    }
}

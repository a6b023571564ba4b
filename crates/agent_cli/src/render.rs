use std::io::{self, Write};

use agent_stream::{
    group_turns, Message, ProcessTrail, Segment, StepLabel, ToolCallStatus, TrailStep, Turn,
};

const RESULT_PREVIEW_CHARS: usize = 200;

/// Writes the process trail and answer of every agent turn in `messages`.
pub fn render_agent_turns(messages: &[Message], output: &mut impl Write) -> io::Result<()> {
    for turn in group_turns(messages) {
        if let Turn::Agent(agent) = turn {
            render_trail(&agent.process_trail(), output)?;
        }
    }
    Ok(())
}

pub fn render_trail(trail: &ProcessTrail, output: &mut impl Write) -> io::Result<()> {
    for step in &trail.steps {
        match step {
            TrailStep::Segment(Segment::ProcessMarkdown { label, markdown }) => {
                let label = match label {
                    Some(StepLabel::Thinking) => "thinking",
                    Some(StepLabel::UsingTool(_)) => "tool input",
                    Some(StepLabel::Observation) => "observation",
                    None => "note",
                };
                writeln!(output, "  · {label}: {markdown}")?;
            }
            TrailStep::Segment(Segment::ProcessTool { tool_name }) => {
                writeln!(output, "  · using tool {tool_name}")?;
            }
            TrailStep::Segment(Segment::FinalAnswer { markdown }) => {
                writeln!(output, "{markdown}")?;
            }
            TrailStep::ToolCall {
                name, args, status, ..
            } => {
                let marker = match status {
                    ToolCallStatus::Pending => "pending",
                    ToolCallStatus::Completed => "done",
                };
                writeln!(output, "  → {name}({args}) [{marker}]")?;
            }
            TrailStep::ToolResult { name, content, .. } => {
                let name = name.as_deref().unwrap_or("tool");
                writeln!(output, "  ← {name}: {}", preview(content))?;
            }
        }
    }

    if let Some(answer) = &trail.answer {
        if !trail.steps.is_empty() {
            writeln!(output)?;
        }
        writeln!(output, "{answer}")?;
    }
    Ok(())
}

fn preview(content: &str) -> String {
    let single_line = content.replace('\n', " ");
    let mut chars = single_line.chars();
    let head: String = chars.by_ref().take(RESULT_PREVIEW_CHARS).collect();
    if chars.next().is_some() {
        format!("{head}…")
    } else {
        head
    }
}

#[cfg(test)]
mod tests {
    use agent_stream::ToolCall;
    use serde_json::json;

    use super::*;

    fn rendered(messages: &[Message]) -> String {
        let mut output = Vec::new();
        render_agent_turns(messages, &mut output).expect("render");
        String::from_utf8(output).expect("utf8")
    }

    #[test]
    fn renders_steps_then_answer() {
        let mut first = Message::assistant("a1", "[Thinking] look it up");
        first.tool_calls.push(ToolCall {
            id: "c1".to_string(),
            name: "search".to_string(),
            args: json!({"q": "rust"}),
            status: ToolCallStatus::Completed,
        });
        let messages = vec![
            Message::human("h1", "question"),
            first,
            Message::tool("t1", "c1", "search", "hit one\nhit two"),
            Message::assistant("a2", "Two hits."),
        ];

        assert_eq!(
            rendered(&messages),
            concat!(
                "  · thinking: look it up\n",
                "  → search({\"q\":\"rust\"}) [done]\n",
                "  ← search: hit one hit two\n",
                "\nTwo hits.\n",
            )
        );
    }

    #[test]
    fn long_results_are_truncated() {
        let long = "x".repeat(RESULT_PREVIEW_CHARS + 10);
        let shown = preview(&long);
        assert_eq!(shown.chars().count(), RESULT_PREVIEW_CHARS + 1);
        assert!(shown.ends_with('…'));
    }

    #[test]
    fn human_only_history_renders_nothing() {
        assert_eq!(rendered(&[Message::human("h1", "hi")]), "");
    }
}

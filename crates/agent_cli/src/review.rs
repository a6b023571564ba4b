//! Line-oriented review of paused agent actions.

use std::io::{BufRead, Write};

use agent_stream::{BatchCoordinator, DecisionKind, InterruptView, ResumeCommand};
use anyhow::Result;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq)]
pub enum ReviewCommand {
    Approve,
    Reject(String),
    Edit { key: String, value: Value },
    /// Save the currently selected draft.
    Save,
    ApproveAll,
    Quit,
}

/// Parses one input line. Values after `e key=` are read as JSON, falling back
/// to a plain string.
pub fn parse_command(line: &str) -> Option<ReviewCommand> {
    let line = line.trim();
    let (head, rest) = match line.split_once(char::is_whitespace) {
        Some((head, rest)) => (head, rest.trim()),
        None => (line, ""),
    };

    Some(match head {
        "a" | "approve" => ReviewCommand::Approve,
        "A" | "approve-all" => ReviewCommand::ApproveAll,
        "r" | "reject" => ReviewCommand::Reject(rest.to_string()),
        "s" | "save" => ReviewCommand::Save,
        "q" | "quit" => ReviewCommand::Quit,
        "e" | "edit" => {
            let (key, raw) = rest.split_once('=')?;
            let key = key.trim();
            if key.is_empty() {
                return None;
            }
            let raw = raw.trim();
            let value =
                serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
            ReviewCommand::Edit {
                key: key.to_string(),
                value,
            }
        }
        _ => return None,
    })
}

/// Walks the reviewer through every action and returns the command to resume
/// with, or `None` when the interrupt cannot be answered or the reviewer quits.
pub fn review_interrupt(
    view: InterruptView,
    auto_approve: bool,
    input: &mut impl BufRead,
    output: &mut impl Write,
) -> Result<Option<ResumeCommand>> {
    let mut batch = match view {
        InterruptView::Review(batch) => batch,
        InterruptView::Generic { raw, reason } => {
            writeln!(output, "The agent paused but its request cannot be reviewed ({reason}):")?;
            writeln!(output, "{}", serde_json::to_string_pretty(&raw)?)?;
            return Ok(None);
        }
    };

    if auto_approve && batch.can_approve_all() {
        writeln!(output, "Approving {} action(s).", batch.len())?;
        return Ok(Some(batch.approve_all()?));
    }

    while !batch.can_submit_all() {
        print_current(&batch, output)?;
        write!(output, "> ")?;
        output.flush()?;

        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            return Ok(None);
        }

        let Some(command) = parse_command(&line) else {
            writeln!(output, "Commands: a | r <reason> | e <key>=<value> | s | A | q")?;
            continue;
        };

        let result = match command {
            ReviewCommand::Approve => batch
                .current_mut()
                .select(DecisionKind::Approve)
                .map_err(anyhow::Error::from)
                .and_then(|()| batch.save_decision().map_err(anyhow::Error::from)),
            ReviewCommand::Reject(reason) => {
                let builder = batch.current_mut();
                builder
                    .set_feedback(reason)
                    .and_then(|()| builder.select(DecisionKind::Reject))
                    .map_err(anyhow::Error::from)
                    .and_then(|()| batch.save_decision().map_err(anyhow::Error::from))
            }
            ReviewCommand::Edit { key, value } => batch
                .current_mut()
                .edit_field(key, value)
                .map_err(anyhow::Error::from),
            ReviewCommand::Save => batch.save_decision().map_err(anyhow::Error::from),
            ReviewCommand::ApproveAll => match batch.approve_all() {
                Ok(command) => return Ok(Some(command)),
                Err(error) => Err(error.into()),
            },
            ReviewCommand::Quit => return Ok(None),
        };

        if let Err(error) = result {
            writeln!(output, "{error}")?;
        }
    }

    Ok(Some(batch.submit_all()?))
}

fn print_current(batch: &BatchCoordinator, output: &mut impl Write) -> Result<()> {
    let builder = batch.current();
    let action = builder.action();
    writeln!(
        output,
        "\nAction {}/{}: {}",
        batch.current_index() + 1,
        batch.len(),
        action.name
    )?;
    if let Some(description) = &action.description {
        writeln!(output, "  {description}")?;
    }
    writeln!(
        output,
        "  args: {}",
        serde_json::to_string(&Value::Object(builder.edited_args().clone()))?
    )?;

    let allowed: Vec<&str> = [DecisionKind::Approve, DecisionKind::Edit, DecisionKind::Reject]
        .into_iter()
        .filter(|kind| builder.allows(*kind))
        .map(|kind| kind.as_str())
        .collect();
    writeln!(
        output,
        "  allowed: {}  selected: {}",
        allowed.join(", "),
        builder.selected().as_str()
    )?;
    if builder.edits_made() {
        writeln!(output, "  changed: {}", builder.changed_fields().join(", "))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use agent_stream::Decision;
    use serde_json::json;

    use super::*;

    fn view() -> InterruptView {
        InterruptView::from_value(&json!({
            "action_requests": [
                {"name": "write_file", "args": {"path": "a.txt"}},
                {"name": "shell", "args": {"cmd": "rm -rf /tmp/x"}}
            ],
            "review_configs": [
                {"action_name": "write_file", "allowed_decisions": ["approve", "edit", "reject"]},
                {"action_name": "shell", "allowed_decisions": ["approve", "reject"]}
            ]
        }))
    }

    fn run(
        view: InterruptView,
        auto_approve: bool,
        script: &str,
    ) -> (Option<ResumeCommand>, String) {
        let mut input = Cursor::new(script.as_bytes().to_vec());
        let mut output = Vec::new();
        let command =
            review_interrupt(view, auto_approve, &mut input, &mut output).expect("review");
        (command, String::from_utf8(output).expect("utf8"))
    }

    #[test]
    fn parses_commands() {
        assert_eq!(parse_command("a"), Some(ReviewCommand::Approve));
        assert_eq!(
            parse_command("r  not now "),
            Some(ReviewCommand::Reject("not now".to_string()))
        );
        assert_eq!(
            parse_command("e retries=3"),
            Some(ReviewCommand::Edit {
                key: "retries".to_string(),
                value: json!(3),
            })
        );
        assert_eq!(
            parse_command("e path = b.txt"),
            Some(ReviewCommand::Edit {
                key: "path".to_string(),
                value: json!("b.txt"),
            })
        );
        assert_eq!(parse_command("e =1"), None);
        assert_eq!(parse_command("x"), None);
    }

    #[test]
    fn walks_actions_in_order() {
        let (command, output) = run(view(), false, "e path=b.txt\ns\nr\nr too risky\n");
        let command = command.expect("command");

        assert!(output.contains("Action 1/2: write_file"));
        assert!(output.contains("changed: path"));
        assert!(output.contains("a rejection requires a non-empty reason"));
        assert_eq!(command.decisions().len(), 2);
        assert!(matches!(command.decisions()[0], Decision::Edit { .. }));
        assert_eq!(
            command.decisions()[1],
            Decision::Reject {
                message: "too risky".to_string(),
            }
        );
    }

    #[test]
    fn auto_approve_skips_prompts() {
        let (command, output) = run(view(), true, "");
        assert_eq!(
            command.map(|command| command.decisions().to_vec()),
            Some(vec![Decision::Approve, Decision::Approve])
        );
        assert!(!output.contains(">"));
    }

    #[test]
    fn end_of_input_abandons_review() {
        let (command, _) = run(view(), false, "a\n");
        assert_eq!(command, None);
    }

    #[test]
    fn generic_view_cannot_be_answered() {
        let (command, output) = run(InterruptView::from_value(&json!({"ask": "?"})), false, "a\n");
        assert_eq!(command, None);
        assert!(output.contains("cannot be reviewed"));
    }
}

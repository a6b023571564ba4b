//! Splits agent text on inline state tags into process steps and a final answer.
//!
//! Recognized tags: `[Thinking]`, `[Using Tool: <name>]`, `[Observation]` and
//! `[Answer]`. Tags open a labeled section; they do not nest.

use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

fn tag_regex() -> &'static Regex {
    static CACHED: OnceLock<Regex> = OnceLock::new();
    CACHED.get_or_init(|| {
        Regex::new(r"\[(?:(Thinking)|Using Tool:\s*([^\]]*)|(Observation)|(Answer))\]")
            .expect("tag regex must compile")
    })
}

/// Tag that opened a process step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "tag", content = "tool_name", rename_all = "snake_case")]
pub enum StepLabel {
    Thinking,
    UsingTool(String),
    Observation,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Segment {
    /// Markdown belonging to the process trail. `label` is `None` for text that
    /// precedes any tag or for untagged intermediate messages.
    ProcessMarkdown {
        label: Option<StepLabel>,
        markdown: String,
    },
    /// A `[Using Tool: <name>]` marker.
    ProcessTool { tool_name: String },
    FinalAnswer { markdown: String },
}

impl Segment {
    pub fn is_final_answer(&self) -> bool {
        matches!(self, Self::FinalAnswer { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Tag {
    Thinking,
    UsingTool(String),
    Observation,
    Answer,
}

pub fn contains_tags(text: &str) -> bool {
    tag_regex().is_match(text)
}

/// Parses the full text of one assistant message.
///
/// Untagged text becomes a single final answer when the message is the last of
/// its turn and a single process step otherwise. Whitespace-only sections are
/// dropped.
pub fn parse_segments(text: &str, last_in_turn: bool) -> Vec<Segment> {
    if !contains_tags(text) {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Vec::new();
        }
        let markdown = trimmed.to_string();
        return vec![if last_in_turn {
            Segment::FinalAnswer { markdown }
        } else {
            Segment::ProcessMarkdown {
                label: None,
                markdown,
            }
        }];
    }

    let mut segments = Vec::new();
    let mut current: Option<Tag> = None;
    let mut cursor = 0;

    for captures in tag_regex().captures_iter(text) {
        let Some(whole) = captures.get(0) else {
            continue;
        };
        push_section(&mut segments, current.as_ref(), &text[cursor..whole.start()]);
        cursor = whole.end();

        let tag = if captures.get(1).is_some() {
            Tag::Thinking
        } else if let Some(name) = captures.get(2) {
            Tag::UsingTool(name.as_str().trim().to_string())
        } else if captures.get(3).is_some() {
            Tag::Observation
        } else {
            Tag::Answer
        };

        if let Tag::UsingTool(tool_name) = &tag {
            segments.push(Segment::ProcessTool {
                tool_name: tool_name.clone(),
            });
        }
        current = Some(tag);
    }
    push_section(&mut segments, current.as_ref(), &text[cursor..]);

    segments
}

fn push_section(segments: &mut Vec<Segment>, tag: Option<&Tag>, section: &str) {
    let trimmed = section.trim();
    if trimmed.is_empty() {
        return;
    }
    let markdown = trimmed.to_string();

    let label = match tag {
        Some(Tag::Answer) => {
            segments.push(Segment::FinalAnswer { markdown });
            return;
        }
        Some(Tag::Thinking) => Some(StepLabel::Thinking),
        Some(Tag::UsingTool(name)) => Some(StepLabel::UsingTool(name.clone())),
        Some(Tag::Observation) => Some(StepLabel::Observation),
        None => None,
    };
    segments.push(Segment::ProcessMarkdown { label, markdown });
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn process(label: Option<StepLabel>, markdown: &str) -> Segment {
        Segment::ProcessMarkdown {
            label,
            markdown: markdown.to_string(),
        }
    }

    #[test]
    fn full_tag_sequence_splits_into_four_segments() {
        let segments = parse_segments(
            "[Thinking] checking...[Using Tool: search][Observation] found it[Answer] Here it is",
            true,
        );

        assert_eq!(
            segments,
            vec![
                process(Some(StepLabel::Thinking), "checking..."),
                Segment::ProcessTool {
                    tool_name: "search".to_string(),
                },
                process(Some(StepLabel::Observation), "found it"),
                Segment::FinalAnswer {
                    markdown: "Here it is".to_string(),
                },
            ]
        );
    }

    #[test]
    fn untagged_text_depends_on_turn_position() {
        assert_eq!(
            parse_segments("  plain answer \n", true),
            vec![Segment::FinalAnswer {
                markdown: "plain answer".to_string(),
            }]
        );
        assert_eq!(
            parse_segments("  plain answer \n", false),
            vec![process(None, "plain answer")]
        );
    }

    #[test]
    fn empty_text_has_no_segments() {
        assert!(parse_segments("", true).is_empty());
        assert!(parse_segments("   \n", false).is_empty());
    }

    #[test]
    fn text_before_first_tag_is_unlabeled_process() {
        let segments = parse_segments("Let me look.\n[Using Tool: web search]\n{\"q\": 1}", false);

        assert_eq!(
            segments,
            vec![
                process(None, "Let me look."),
                Segment::ProcessTool {
                    tool_name: "web search".to_string(),
                },
                process(
                    Some(StepLabel::UsingTool("web search".to_string())),
                    "{\"q\": 1}"
                ),
            ]
        );
    }

    #[test]
    fn tags_without_answer_stay_in_process_trail() {
        let segments = parse_segments("[Thinking] a [Thinking] b", true);
        assert_eq!(
            segments,
            vec![
                process(Some(StepLabel::Thinking), "a"),
                process(Some(StepLabel::Thinking), "b"),
            ]
        );
        assert!(!segments.iter().any(Segment::is_final_answer));
    }

    #[test]
    fn unknown_bracket_text_is_not_a_tag() {
        assert!(!contains_tags("[Plan] do things"));
        assert_eq!(
            parse_segments("[Plan] do things", true),
            vec![Segment::FinalAnswer {
                markdown: "[Plan] do things".to_string(),
            }]
        );
    }
}

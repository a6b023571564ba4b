use agent_protocol::{StreamChunk, WireEvent};
use serde_json::Value;

const DATA_MARKER: &str = "data:";
const INTERRUPT_KEY: &str = "__interrupt__";

/// Incremental decoder for `data: <json>\n\n` framed streams.
///
/// Bytes are decoded as UTF-8 across read boundaries; a code point or frame
/// split between two reads is held until the rest arrives.
#[derive(Debug, Default)]
pub struct FrameParser {
    pending_bytes: Vec<u8>,
    buffer: String,
    skipped: usize,
}

impl FrameParser {
    /// Feed arbitrary bytes into the parser and drain complete events.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<WireEvent> {
        self.decode_utf8(bytes);
        let mut events = Vec::new();

        while let Some(split) = self.buffer.find("\n\n") {
            let frame = self.buffer[..split].to_string();
            self.buffer.drain(0..split + 2);

            let Some(payload) = extract_data_payload(&frame) else {
                continue;
            };
            if payload == "[DONE]" {
                continue;
            }

            match serde_json::from_str::<Value>(&payload) {
                Ok(value) => match map_event(value) {
                    Some(event) => events.push(event),
                    None => self.skipped += 1,
                },
                Err(error) => {
                    self.skipped += 1;
                    tracing::warn!(%error, frame = %payload, "skipping malformed stream frame");
                }
            }
        }

        events
    }

    /// Parse a complete stream body in one shot.
    pub fn parse_frames(input: &str) -> Vec<WireEvent> {
        let mut parser = Self::default();
        parser.feed(input.as_bytes())
    }

    /// True when no partial frame or partial code point is buffered.
    pub fn is_empty_buffer(&self) -> bool {
        self.pending_bytes.is_empty() && self.buffer.trim().is_empty()
    }

    /// Number of frames dropped as malformed or of unknown type.
    pub fn skipped_frames(&self) -> usize {
        self.skipped
    }

    fn decode_utf8(&mut self, bytes: &[u8]) {
        self.pending_bytes.extend_from_slice(bytes);

        loop {
            match std::str::from_utf8(&self.pending_bytes) {
                Ok(text) => {
                    push_normalized(&mut self.buffer, text);
                    self.pending_bytes.clear();
                    return;
                }
                Err(error) => {
                    let valid = error.valid_up_to();
                    let text = String::from_utf8_lossy(&self.pending_bytes[..valid]).into_owned();
                    push_normalized(&mut self.buffer, &text);
                    match error.error_len() {
                        // Incomplete trailing sequence: wait for the next read.
                        None => {
                            self.pending_bytes.drain(..valid);
                            return;
                        }
                        Some(len) => {
                            self.buffer.push(char::REPLACEMENT_CHARACTER);
                            self.pending_bytes.drain(..valid + len);
                        }
                    }
                }
            }
        }
    }
}

fn push_normalized(buffer: &mut String, text: &str) {
    buffer.push_str(text);
    if buffer.contains('\r') {
        *buffer = buffer.replace("\r\n", "\n");
    }
}

fn extract_data_payload(frame: &str) -> Option<String> {
    let data_lines: Vec<&str> = frame
        .lines()
        .filter_map(|line| line.strip_prefix(DATA_MARKER))
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
        .collect();

    if data_lines.is_empty() {
        None
    } else {
        Some(data_lines.join("\n"))
    }
}

fn map_event(value: Value) -> Option<WireEvent> {
    if let Some(interrupt) = value.get(INTERRUPT_KEY) {
        return interrupt_event(interrupt);
    }

    let event_type = value.get("type")?.as_str()?;
    let chunk = match event_type {
        "response" => StreamChunk::Response {
            content: string_field(&value, "content"),
        },
        "thought" => StreamChunk::Thought {
            content: string_field(&value, "content"),
        },
        "tool_call" => StreamChunk::ToolCall {
            id: value
                .get("tool_call_id")
                .or_else(|| value.get("id"))
                .and_then(Value::as_str)
                .map(ToString::to_string),
            tool_name: string_field(&value, "tool_name"),
            tool_input: value.get("tool_input").cloned().unwrap_or(Value::Null),
        },
        "tool_result" => StreamChunk::ToolResult {
            tool_name: string_field(&value, "tool_name"),
            tool_output: value
                .get("tool_output")
                .or_else(|| value.get("content"))
                .cloned()
                .unwrap_or(Value::Null),
        },
        "error" => StreamChunk::Error {
            content: value
                .get("content")
                .or_else(|| value.get("message"))
                .and_then(Value::as_str)
                .unwrap_or("agent reported an error")
                .to_string(),
        },
        "done" => StreamChunk::Done,
        "interrupt" => return interrupt_event(&value),
        other => {
            tracing::debug!(event_type = other, "ignoring unknown stream event type");
            return None;
        }
    };

    Some(WireEvent::Chunk(chunk))
}

/// Accepts `{"value": {...}}`, a list of such entries, or a bare descriptor.
fn interrupt_event(raw: &Value) -> Option<WireEvent> {
    let entry = match raw {
        Value::Array(entries) => entries.first()?,
        other => other,
    };
    let value = entry.get("value").cloned().unwrap_or_else(|| entry.clone());
    Some(WireEvent::Interrupt { value })
}

fn string_field(value: &Value, key: &str) -> String {
    value
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_owned()
}

#[cfg(test)]
mod tests {
    use super::FrameParser;
    use agent_protocol::{StreamChunk, WireEvent};

    #[test]
    fn parse_frames_incrementally() {
        let mut parser = FrameParser::default();
        let mut events = Vec::new();

        events.extend(parser.feed(b"data: {\"type\":\"response\",\"content\":\"Hello\"}\n\n"));
        assert_eq!(events.len(), 1);

        events.extend(parser.feed(b"data: [DONE]\n\n"));
        assert_eq!(events.len(), 1);
        assert!(parser.is_empty_buffer());
    }

    #[test]
    fn multibyte_code_point_split_across_reads_is_preserved() {
        let frame = "data: {\"type\":\"response\",\"content\":\"caf\u{e9}\"}\n\n".as_bytes();
        let split = frame
            .iter()
            .position(|byte| *byte == 0xC3)
            .expect("frame should contain a two-byte code point")
            + 1;

        let mut parser = FrameParser::default();
        assert!(parser.feed(&frame[..split]).is_empty());
        assert!(!parser.is_empty_buffer());
        let events = parser.feed(&frame[split..]);

        assert_eq!(
            events,
            vec![WireEvent::Chunk(StreamChunk::Response {
                content: "caf\u{e9}".to_string(),
            })]
        );
    }

    #[test]
    fn crlf_framing_is_normalized() {
        let events = FrameParser::parse_frames("data: {\"type\":\"done\"}\r\n\r\n");
        assert_eq!(events, vec![WireEvent::Chunk(StreamChunk::Done)]);
    }
}

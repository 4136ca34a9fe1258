//! Server-sent event decoding for streamed Messages API responses.

use serde_json::Value;

use crate::Result;

/// One dispatched server-sent event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    pub event: Option<String>,
    pub data: String,
}

/// Incremental SSE decoder.
///
/// Bytes may arrive split anywhere, including inside a UTF-8 sequence;
/// lines are only decoded once complete.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    event: Option<String>,
    data: Vec<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume a chunk and return every event it completes.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend_from_slice(chunk);

        let mut events = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&raw);
            let line = line.trim_end_matches(['\n', '\r']);
            if let Some(event) = self.process_line(line) {
                events.push(event);
            }
        }
        events
    }

    /// Dispatch whatever is left once the stream ends.
    pub fn finish(&mut self) -> Option<SseEvent> {
        if !self.buffer.is_empty() {
            let raw = std::mem::take(&mut self.buffer);
            let line = String::from_utf8_lossy(&raw).trim_end_matches('\r').to_string();
            if let Some(event) = self.process_line(&line) {
                return Some(event);
            }
        }
        self.dispatch()
    }

    fn process_line(&mut self, line: &str) -> Option<SseEvent> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => self.data.push(value.to_string()),
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        let event = self.event.take();
        if self.data.is_empty() {
            return None;
        }
        let data = std::mem::take(&mut self.data).join("\n");
        Some(SseEvent { event, data })
    }
}

/// The parts of a Messages stream the transport cares about.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// Text appended to the current content block.
    TextDelta(String),
    MessageStop,
    /// The service reported an error mid-stream.
    Error(String),
    Other,
}

/// Interpret the JSON payload of one event.
pub fn parse_stream_event(data: &str) -> Result<StreamEvent> {
    let value: Value = serde_json::from_str(data)?;
    let kind = value.get("type").and_then(Value::as_str).unwrap_or_default();

    Ok(match kind {
        "content_block_delta" => match value
            .get("delta")
            .and_then(|delta| delta.get("text"))
            .and_then(Value::as_str)
        {
            Some(text) => StreamEvent::TextDelta(text.to_string()),
            None => StreamEvent::Other,
        },
        "message_stop" => StreamEvent::MessageStop,
        "error" => StreamEvent::Error(
            value
                .pointer("/error/message")
                .and_then(Value::as_str)
                .unwrap_or("unknown stream error")
                .to_string(),
        ),
        _ => StreamEvent::Other,
    })
}

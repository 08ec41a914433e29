//! UI message stream decoding.
//!
//! Chat endpoints answer with Server-Sent Events whose `data:` payloads are
//! JSON chunks (`text-delta`, `finish`, ...) terminated by `data: [DONE]`.
//! This module provides:
//! - [`SseDecoder`] - line-oriented SSE event framing
//! - [`UiStreamChunk`] - the chunk types the assistant message is built from
//! - [`MessageAssembler`] - folds chunks into a [`UiMessage`]

use std::collections::HashMap;

use serde::Deserialize;

use crate::message::{MessagePart, PartState, UiMessage};
use crate::transport::ChatError;

/// A single SSE event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    /// The event type, if the server sent an `event:` field.
    pub event: Option<String>,
    /// The event data (multiple `data:` lines joined by newlines).
    pub data: String,
}

/// Incremental SSE framer fed one line at a time.
#[derive(Debug, Default)]
pub struct SseDecoder {
    event: Option<String>,
    data: String,
    has_data: bool,
}

impl SseDecoder {
    /// Create a new decoder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one line (without its terminator). Returns an event when the
    /// line completes one.
    pub fn feed_line(&mut self, line: &str) -> Option<SseEvent> {
        let line = line.strip_suffix('\r').unwrap_or(line);

        if line.is_empty() {
            return self.take_event();
        }

        // Comment lines keep connections alive
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => {
                if self.has_data {
                    self.data.push('\n');
                }
                self.data.push_str(value);
                self.has_data = true;
            }
            // id:, retry: and unknown fields are not used
            _ => {}
        }

        None
    }

    /// Flush a trailing event that was not followed by a blank line.
    pub fn finish(&mut self) -> Option<SseEvent> {
        self.take_event()
    }

    fn take_event(&mut self) -> Option<SseEvent> {
        if !self.has_data {
            self.event = None;
            return None;
        }
        self.has_data = false;
        Some(SseEvent {
            event: self.event.take(),
            data: std::mem::take(&mut self.data),
        })
    }
}

/// A chunk of the UI message stream.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum UiStreamChunk {
    Start {
        #[serde(rename = "messageId", default)]
        message_id: Option<String>,
    },
    StartStep,
    FinishStep,
    TextStart {
        id: String,
    },
    TextDelta {
        id: String,
        delta: String,
    },
    TextEnd {
        id: String,
    },
    ReasoningStart {
        id: String,
    },
    ReasoningDelta {
        id: String,
        delta: String,
    },
    ReasoningEnd {
        id: String,
    },
    Error {
        #[serde(rename = "errorText")]
        error_text: String,
    },
    Abort,
    Finish,
    /// Tool, source, file and data chunks are not modelled.
    #[serde(other)]
    Unknown,
}

/// Marker the server sends after the last chunk.
const DONE_MARKER: &str = "[DONE]";

/// Parse the data of one SSE event.
///
/// Returns `Ok(None)` for the `[DONE]` terminator.
pub fn parse_chunk(data: &str) -> Result<Option<UiStreamChunk>, ChatError> {
    let data = data.trim();
    if data == DONE_MARKER {
        return Ok(None);
    }
    serde_json::from_str(data)
        .map(Some)
        .map_err(|e| ChatError::Decode(format!("{e}: {data}")))
}

/// What the stream consumer should do after a chunk was applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamOutcome {
    /// Keep reading.
    Continue,
    /// The server finished the message.
    Finished,
    /// The server aborted the message.
    Aborted,
    /// The server reported an error.
    Failed(String),
}

/// Builds an assistant message from stream chunks.
#[derive(Debug)]
pub struct MessageAssembler {
    message: UiMessage,
    active_text: HashMap<String, usize>,
    active_reasoning: HashMap<String, usize>,
}

impl MessageAssembler {
    /// Start assembling a message with the given ID.
    ///
    /// A `start` chunk carrying a `messageId` replaces it.
    pub fn new(message_id: impl Into<String>) -> Self {
        Self {
            message: UiMessage::assistant(message_id),
            active_text: HashMap::new(),
            active_reasoning: HashMap::new(),
        }
    }

    /// The message built so far.
    pub fn message(&self) -> &UiMessage {
        &self.message
    }

    /// Apply one chunk.
    pub fn apply(&mut self, chunk: UiStreamChunk) -> StreamOutcome {
        match chunk {
            UiStreamChunk::Start { message_id } => {
                if let Some(id) = message_id {
                    self.message.id = id;
                }
            }
            UiStreamChunk::StartStep => self.message.parts.push(MessagePart::StepStart),
            UiStreamChunk::FinishStep => {
                self.active_text.clear();
                self.active_reasoning.clear();
            }
            UiStreamChunk::TextStart { id } => {
                let index = self.push_part(MessagePart::Text {
                    text: String::new(),
                    state: Some(PartState::Streaming),
                });
                self.active_text.insert(id, index);
            }
            UiStreamChunk::TextDelta { id, delta } => {
                let index = self.text_index(id);
                if let Some(MessagePart::Text { text, .. }) = self.message.parts.get_mut(index) {
                    text.push_str(&delta);
                }
            }
            UiStreamChunk::TextEnd { id } => {
                if let Some(index) = self.active_text.remove(&id) {
                    if let Some(MessagePart::Text { state, .. }) = self.message.parts.get_mut(index)
                    {
                        *state = Some(PartState::Done);
                    }
                }
            }
            UiStreamChunk::ReasoningStart { id } => {
                let index = self.push_part(MessagePart::Reasoning {
                    text: String::new(),
                    state: Some(PartState::Streaming),
                });
                self.active_reasoning.insert(id, index);
            }
            UiStreamChunk::ReasoningDelta { id, delta } => {
                let index = self.reasoning_index(id);
                if let Some(MessagePart::Reasoning { text, .. }) =
                    self.message.parts.get_mut(index)
                {
                    text.push_str(&delta);
                }
            }
            UiStreamChunk::ReasoningEnd { id } => {
                if let Some(index) = self.active_reasoning.remove(&id) {
                    if let Some(MessagePart::Reasoning { state, .. }) =
                        self.message.parts.get_mut(index)
                    {
                        *state = Some(PartState::Done);
                    }
                }
            }
            UiStreamChunk::Error { error_text } => return StreamOutcome::Failed(error_text),
            UiStreamChunk::Abort => return StreamOutcome::Aborted,
            UiStreamChunk::Finish => {
                self.close_open_parts();
                return StreamOutcome::Finished;
            }
            UiStreamChunk::Unknown => {}
        }
        StreamOutcome::Continue
    }

    fn push_part(&mut self, part: MessagePart) -> usize {
        self.message.parts.push(part);
        self.message.parts.len() - 1
    }

    /// Index of the active text part, opening one if the server skipped `text-start`.
    fn text_index(&mut self, id: String) -> usize {
        if let Some(&index) = self.active_text.get(&id) {
            return index;
        }
        let index = self.push_part(MessagePart::Text {
            text: String::new(),
            state: Some(PartState::Streaming),
        });
        self.active_text.insert(id, index);
        index
    }

    fn reasoning_index(&mut self, id: String) -> usize {
        if let Some(&index) = self.active_reasoning.get(&id) {
            return index;
        }
        let index = self.push_part(MessagePart::Reasoning {
            text: String::new(),
            state: Some(PartState::Streaming),
        });
        self.active_reasoning.insert(id, index);
        index
    }

    fn close_open_parts(&mut self) {
        for index in self
            .active_text
            .drain()
            .chain(self.active_reasoning.drain())
            .map(|(_, index)| index)
        {
            match self.message.parts.get_mut(index) {
                Some(MessagePart::Text { state, .. } | MessagePart::Reasoning { state, .. }) => {
                    *state = Some(PartState::Done);
                }
                _ => {}
            }
        }
    }
}

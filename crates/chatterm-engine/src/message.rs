//! Message model for chat conversations.
//!
//! Messages follow the UI message shape used by streaming chat endpoints:
//! an identifier, a role, and an ordered list of typed parts.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Role of a message author.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System message (instructions to the model).
    System,
    /// User message.
    User,
    /// Assistant (model) response.
    Assistant,
}

/// Streaming state of a text-like part.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartState {
    /// Deltas are still arriving.
    Streaming,
    /// The part is complete.
    Done,
}

/// A typed fragment of a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum MessagePart {
    /// Plain text content.
    Text {
        text: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        state: Option<PartState>,
    },
    /// Model reasoning, never shown by the widget.
    Reasoning {
        text: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        state: Option<PartState>,
    },
    /// Marks the start of a model step.
    StepStart,
    /// Any part type this crate does not model (tools, files, sources, ...).
    #[serde(other)]
    Unknown,
}

impl MessagePart {
    /// Create a completed text part.
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text {
            text: text.into(),
            state: None,
        }
    }

    /// Text content if this is a text part.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { text, .. } => Some(text),
            _ => None,
        }
    }

    /// Whether the part can be sent back to the endpoint.
    fn is_known(&self) -> bool {
        !matches!(self, Self::Unknown)
    }
}

/// A single message in a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UiMessage {
    /// Unique message ID.
    pub id: String,
    /// Role of the message author.
    pub role: Role,
    /// Ordered content parts.
    #[serde(default)]
    pub parts: Vec<MessagePart>,
}

impl UiMessage {
    /// Create a user message with a single text part and a fresh ID.
    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            id: generate_id(),
            role: Role::User,
            parts: vec![MessagePart::text(text)],
        }
    }

    /// Create an empty assistant message.
    pub fn assistant(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role: Role::Assistant,
            parts: Vec::new(),
        }
    }

    /// Iterate over the text parts in order.
    pub fn text_parts(&self) -> impl Iterator<Item = &str> {
        self.parts.iter().filter_map(MessagePart::as_text)
    }

    /// All text parts concatenated.
    pub fn text(&self) -> String {
        self.text_parts().collect()
    }

    /// Copy of this message without parts the endpoint would not understand.
    pub(crate) fn for_request(&self) -> Self {
        Self {
            id: self.id.clone(),
            role: self.role,
            parts: self
                .parts
                .iter()
                .filter(|p| p.is_known())
                .cloned()
                .collect(),
        }
    }
}

/// Generate a new message or chat ID.
pub fn generate_id() -> String {
    Uuid::new_v4().simple().to_string()
}

//! Conversation rendering.
//!
//! The message list is a pure function of the conversation, the current
//! error and the available width: every message becomes a role label line
//! followed by its wrapped text parts, and the error (if any) goes last.

use chatterm_engine::{Role, UiMessage};
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    text::{Line, Span},
    widgets::{Paragraph, Widget},
};

use crate::text::wrap_text;
use crate::theme::Theme;

/// Label shown before a message from `role`.
pub fn role_label(role: Role) -> &'static str {
    match role {
        Role::User => "User: ",
        _ => "AI: ",
    }
}

/// Display data for one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageEntry {
    pub role: Role,
    pub label: &'static str,
    /// One block per text part, in order.
    pub blocks: Vec<String>,
}

impl MessageEntry {
    pub fn from_message(message: &UiMessage) -> Self {
        Self {
            role: message.role,
            label: role_label(message.role),
            blocks: message.text_parts().map(str::to_string).collect(),
        }
    }

    fn lines(&self, width: usize, theme: &Theme) -> Vec<Line<'static>> {
        let label_style = if self.role == Role::User {
            theme.user_label()
        } else {
            theme.assistant_label()
        };
        let mut lines = vec![Line::from(Span::styled(self.label, label_style))];
        for block in &self.blocks {
            lines.extend(
                wrap_text(block, width)
                    .into_iter()
                    .map(|line| Line::from(Span::styled(line, theme.body()))),
            );
        }
        lines
    }
}

/// Wrapped lines for the whole conversation plus the error, if any.
pub fn conversation_lines(
    messages: &[UiMessage],
    error: Option<&str>,
    width: u16,
    theme: &Theme,
) -> Vec<Line<'static>> {
    let width = usize::from(width);
    let mut lines = Vec::new();

    for (i, message) in messages.iter().enumerate() {
        if i > 0 {
            lines.push(Line::default());
        }
        lines.extend(MessageEntry::from_message(message).lines(width, theme));
    }

    if let Some(error) = error {
        if !lines.is_empty() {
            lines.push(Line::default());
        }
        lines.extend(
            wrap_text(error, width)
                .into_iter()
                .map(|line| Line::from(Span::styled(line, theme.error_text()))),
        );
    }

    lines
}

/// Scrolled view over pre-wrapped conversation lines.
pub struct MessageList<'a> {
    lines: &'a [Line<'static>],
    offset: u16,
}

impl<'a> MessageList<'a> {
    pub fn new(lines: &'a [Line<'static>]) -> Self {
        Self { lines, offset: 0 }
    }

    #[must_use]
    pub fn offset(mut self, offset: u16) -> Self {
        self.offset = offset;
        self
    }
}

impl Widget for MessageList<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        Paragraph::new(self.lines.to_vec())
            .scroll((self.offset, 0))
            .render(area, buf);
    }
}

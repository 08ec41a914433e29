//! Frame layout and drawing.

use ratatui::{
    layout::{Constraint, Layout, Rect},
    widgets::{Block, BorderType, Borders},
    Frame,
};

use crate::affordance::{Affordance, AffordanceButton};
use crate::app::ChatApp;
use crate::messages::{conversation_lines, MessageList};

/// Widest the conversation column gets.
const MAX_COLUMN_WIDTH: u16 = 100;

/// Where the parts of the chat were placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ViewLayout {
    pub messages: Rect,
    pub input: Rect,
}

/// Measurements taken while drawing, consumed by after-render hooks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RenderReport {
    pub layout: ViewLayout,
    /// Wrapped line count of the conversation.
    pub content_height: u16,
    /// Rows available to the conversation.
    pub viewport_height: u16,
}

/// Split `area` into the message list and an input box of `input_rows` text rows.
pub fn layout(area: Rect, input_rows: u16) -> ViewLayout {
    let width = area.width.min(MAX_COLUMN_WIDTH);
    let column = Rect {
        x: area.x + (area.width - width) / 2,
        width,
        ..area
    };
    let [messages, input] = Layout::vertical([
        Constraint::Min(1),
        Constraint::Length(input_rows.saturating_add(2)),
    ])
    .areas(column);
    ViewLayout { messages, input }
}

/// Draw the chat and report what was measured.
pub fn draw(frame: &mut Frame, app: &ChatApp) -> RenderReport {
    let area = frame.area();
    let theme = app.theme();
    let ui = app.ui_config();

    let inner_width = area.width.min(MAX_COLUMN_WIDTH).saturating_sub(2);
    let input_rows = app
        .input()
        .desired_height(inner_width, ui.min_input_rows, ui.max_input_rows);
    let layout = layout(area, input_rows);

    let messages = app.controller().messages();
    let error = app.controller().error().map(|e| e.to_string());
    let lines = conversation_lines(&messages, error.as_deref(), layout.messages.width, theme);
    frame.render_widget(
        MessageList::new(&lines).offset(app.scroll().offset()),
        layout.messages,
    );

    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(ratatui::style::Style::default().fg(theme.border_focused));
    let input = app
        .input()
        .widget(theme)
        .block(block)
        .placeholder(&ui.placeholder);
    let cursor = input.cursor_screen_position(layout.input);
    frame.render_widget(input, layout.input);
    if let Some(cursor) = cursor {
        frame.set_cursor_position(cursor);
    }

    let affordance = app.affordance();
    let enabled = affordance == Affordance::Stop || !app.input().content().trim().is_empty();
    frame.render_widget(
        AffordanceButton::new(affordance, theme).enabled(enabled),
        affordance.area(layout.input),
    );

    RenderReport {
        layout,
        content_height: u16::try_from(lines.len()).unwrap_or(u16::MAX),
        viewport_height: layout.messages.height,
    }
}

//! Send/Stop control drawn on the input box border.

use chatterm_engine::ChatStatus;
use ratatui::{
    buffer::Buffer,
    layout::{Position, Rect},
    style::{Modifier, Style},
    widgets::Widget,
};

use crate::text::visual_width;
use crate::theme::Theme;

/// What activating the control does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Affordance {
    Send,
    Stop,
}

impl Affordance {
    /// Stop while a response is streaming, Send otherwise.
    pub fn for_status(status: ChatStatus) -> Self {
        if status == ChatStatus::Streaming {
            Self::Stop
        } else {
            Self::Send
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Send => "[ Send ]",
            Self::Stop => "[ Stop ]",
        }
    }

    /// Rect the label occupies on the bottom border of `input_area`.
    pub fn area(self, input_area: Rect) -> Rect {
        let width = u16::try_from(visual_width(self.label()))
            .unwrap_or(u16::MAX)
            .min(input_area.width.saturating_sub(2));
        let x = input_area.right().saturating_sub(width + 1);
        let y = input_area.bottom().saturating_sub(1);
        Rect::new(x.max(input_area.x), y, width, 1)
    }

    /// Whether a click at (column, row) lands on the control.
    pub fn hit(self, input_area: Rect, column: u16, row: u16) -> bool {
        self.area(input_area).contains(Position::new(column, row))
    }
}

/// Widget drawing an [`Affordance`] label.
pub struct AffordanceButton<'a> {
    affordance: Affordance,
    theme: &'a Theme,
    enabled: bool,
}

impl<'a> AffordanceButton<'a> {
    pub fn new(affordance: Affordance, theme: &'a Theme) -> Self {
        Self {
            affordance,
            theme,
            enabled: true,
        }
    }

    /// Dim the label (Send with an empty draft).
    #[must_use]
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

impl Widget for AffordanceButton<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let style = match (self.affordance, self.enabled) {
            (Affordance::Stop, _) => Style::default()
                .fg(self.theme.error)
                .add_modifier(Modifier::BOLD),
            (Affordance::Send, true) => Style::default()
                .fg(self.theme.primary)
                .add_modifier(Modifier::BOLD),
            (Affordance::Send, false) => Style::default().fg(self.theme.muted),
        };
        buf.set_stringn(
            area.x,
            area.y,
            self.affordance.label(),
            usize::from(area.width),
            style,
        );
    }
}

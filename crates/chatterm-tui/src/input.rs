//! Multi-line draft input: editing state, wrapped layout and the input box widget.

use ratatui::{
    buffer::Buffer,
    layout::{Position, Rect},
    style::Style,
    text::Line,
    widgets::{Block, Paragraph, Widget},
};

use crate::text::char_width;
use crate::theme::Theme;

/// Tabs are stored as this many spaces so width and wrapping stay exact.
const TAB: &str = "    ";

/// State for the draft, managing content and cursor position.
#[derive(Debug, Clone, Default)]
pub struct InputState {
    /// The text content.
    content: String,
    /// Cursor position (character index).
    cursor: usize,
    /// Previously submitted drafts for up/down recall.
    history: Vec<String>,
    /// Entry being recalled, counted back from the newest.
    recalled: Option<usize>,
    /// Saved current input when navigating history.
    saved_input: String,
}

impl InputState {
    /// Create a new empty input state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the current content.
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Cursor position as a character index.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Check if the content is empty.
    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    /// Whether up/down is currently walking through history.
    pub fn is_browsing_history(&self) -> bool {
        self.recalled.is_some()
    }

    fn char_count(&self) -> usize {
        self.content.chars().count()
    }

    /// Byte offset of a character index.
    fn byte_index(&self, char_idx: usize) -> usize {
        self.content
            .char_indices()
            .nth(char_idx)
            .map_or(self.content.len(), |(i, _)| i)
    }

    /// Insert a character at the cursor position.
    pub fn insert(&mut self, ch: char) {
        if ch == '\t' {
            self.insert_str(TAB);
            return;
        }
        let at = self.byte_index(self.cursor);
        self.content.insert(at, ch);
        self.cursor += 1;
    }

    /// Insert a string at the cursor position.
    ///
    /// Carriage returns are normalized to newlines and tabs expanded.
    pub fn insert_str(&mut self, s: &str) {
        let normalized = s
            .replace("\r\n", "\n")
            .replace('\r', "\n")
            .replace('\t', TAB);
        let at = self.byte_index(self.cursor);
        self.content.insert_str(at, &normalized);
        self.cursor += normalized.chars().count();
    }

    /// Delete the character before the cursor (backspace).
    pub fn backspace(&mut self) {
        if self.cursor > 0 {
            self.cursor -= 1;
            let at = self.byte_index(self.cursor);
            self.content.remove(at);
        }
    }

    /// Delete the character at the cursor (delete).
    pub fn delete(&mut self) {
        if self.cursor < self.char_count() {
            let at = self.byte_index(self.cursor);
            self.content.remove(at);
        }
    }

    pub fn move_left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn move_right(&mut self) {
        if self.cursor < self.char_count() {
            self.cursor += 1;
        }
    }

    pub fn move_home(&mut self) {
        self.cursor = 0;
    }

    pub fn move_end(&mut self) {
        self.cursor = self.char_count();
    }

    /// Record the submitted draft in history and clear it.
    pub fn commit(&mut self, submitted: &str) {
        self.content.clear();
        self.cursor = 0;
        self.history.push(submitted.to_string());
        self.recalled = None;
        self.saved_input.clear();
    }

    /// Recall the next older history entry.
    pub fn history_prev(&mut self) {
        let next = self.recalled.map_or(0, |n| n + 1);
        let Some(entry) = self.history.iter().rev().nth(next) else {
            return;
        };
        if self.recalled.is_none() {
            self.saved_input = std::mem::take(&mut self.content);
        }
        self.content = entry.clone();
        self.recalled = Some(next);
        self.move_end();
    }

    /// Step back towards the newest entry, then to the draft that was saved.
    pub fn history_next(&mut self) {
        match self.recalled {
            None => return,
            Some(0) => {
                self.content = std::mem::take(&mut self.saved_input);
                self.recalled = None;
            }
            Some(n) => {
                self.content = self.history[self.history.len() - n].clone();
                self.recalled = Some(n - 1);
            }
        }
        self.move_end();
    }

    /// Wrapped rows of the draft at `width` columns.
    pub fn rows(&self, width: u16) -> Vec<VisualRow> {
        layout_rows(&self.content, usize::from(width.max(1)))
    }

    /// Cursor as (row, column) within the wrapped rows.
    pub fn cursor_position(&self, width: u16) -> (u16, u16) {
        let rows = self.rows(width);
        let row = rows
            .iter()
            .rposition(|r| r.start <= self.cursor)
            .unwrap_or(0);
        let col: usize = rows.get(row).map_or(0, |r| {
            self.content
                .chars()
                .skip(r.start)
                .take(self.cursor - r.start)
                .map(char_width)
                .sum()
        });
        (clamp_u16(row), clamp_u16(col))
    }

    /// Rows the input box needs for the current draft, within `[min_rows, max_rows]`.
    pub fn desired_height(&self, width: u16, min_rows: u16, max_rows: u16) -> u16 {
        let rows = clamp_u16(self.rows(width).len());
        rows.clamp(min_rows, max_rows.max(min_rows))
    }

    /// Create a widget rendering this state.
    pub fn widget<'a>(&'a self, theme: &'a Theme) -> InputBox<'a> {
        InputBox {
            state: self,
            theme,
            block: None,
            placeholder: "",
        }
    }
}

fn clamp_u16(n: usize) -> u16 {
    u16::try_from(n).unwrap_or(u16::MAX)
}

/// One wrapped row of the draft, as a half-open character range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VisualRow {
    pub start: usize,
    pub end: usize,
}

/// Hard-wrap `content` by display width.
///
/// When the draft ends on a row that exactly fills `width`, an empty row
/// follows so the cursor has somewhere to sit after the last character.
fn layout_rows(content: &str, width: usize) -> Vec<VisualRow> {
    let mut rows = Vec::new();
    let mut start = 0;
    let mut col = 0;
    let mut idx = 0;

    for ch in content.chars() {
        if ch == '\n' {
            rows.push(VisualRow { start, end: idx });
            start = idx + 1;
            col = 0;
        } else {
            let w = char_width(ch);
            if col + w > width && col > 0 {
                rows.push(VisualRow { start, end: idx });
                start = idx;
                col = 0;
            }
            col += w;
        }
        idx += 1;
    }

    rows.push(VisualRow { start, end: idx });
    if col == width {
        rows.push(VisualRow { start: idx, end: idx });
    }
    rows
}

/// The bordered draft box. Scrolls internally to keep the cursor row visible.
#[derive(Debug, Clone)]
pub struct InputBox<'a> {
    state: &'a InputState,
    theme: &'a Theme,
    block: Option<Block<'a>>,
    placeholder: &'a str,
}

impl<'a> InputBox<'a> {
    #[must_use]
    pub fn block(mut self, block: Block<'a>) -> Self {
        self.block = Some(block);
        self
    }

    #[must_use]
    pub fn placeholder(mut self, placeholder: &'a str) -> Self {
        self.placeholder = placeholder;
        self
    }

    /// First visible row for an inner area of `height` rows.
    fn scroll_offset(&self, width: u16, height: u16) -> u16 {
        let (cursor_row, _) = self.state.cursor_position(width);
        cursor_row.saturating_sub(height.saturating_sub(1))
    }

    /// Where the terminal cursor belongs when the box is drawn in `area`.
    pub fn cursor_screen_position(&self, area: Rect) -> Option<Position> {
        let inner = self.inner(area);
        if inner.width == 0 || inner.height == 0 {
            return None;
        }
        let (row, col) = self.state.cursor_position(inner.width);
        let offset = self.scroll_offset(inner.width, inner.height);
        Some(Position::new(
            inner.x + col.min(inner.width - 1),
            inner.y + row - offset,
        ))
    }

    fn inner(&self, area: Rect) -> Rect {
        self.block.as_ref().map_or(area, |block| block.inner(area))
    }
}

impl Widget for InputBox<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let inner = self.inner(area);
        if let Some(block) = &self.block {
            block.clone().render(area, buf);
        }

        if inner.height < 1 || inner.width < 1 {
            return;
        }

        if self.state.is_empty() {
            Paragraph::new(self.placeholder)
                .style(Style::default().fg(self.theme.muted))
                .render(inner, buf);
            return;
        }

        let offset = usize::from(self.scroll_offset(inner.width, inner.height));
        let chars: Vec<char> = self.state.content.chars().collect();
        let lines: Vec<Line> = self
            .state
            .rows(inner.width)
            .into_iter()
            .skip(offset)
            .take(usize::from(inner.height))
            .map(|row| Line::from(chars[row.start..row.end].iter().collect::<String>()))
            .collect();

        Paragraph::new(lines).style(self.theme.body()).render(inner, buf);
    }
}

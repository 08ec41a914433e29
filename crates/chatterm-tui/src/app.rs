//! Widget state and input handling.

use std::sync::Arc;

use chatterm_engine::{ChatController, UiConfig};
use crossterm::event::{KeyEvent, MouseButton, MouseEvent, MouseEventKind};
use tokio::sync::watch;
use tracing::debug;

use crate::affordance::Affordance;
use crate::event::{key_to_action, Action, Event};
use crate::input::InputState;
use crate::scroll::{ScrollBehavior, ScrollState};
use crate::theme::Theme;
use crate::view::{RenderReport, ViewLayout};

/// Lines moved by one mouse wheel notch.
const WHEEL_LINES: u16 = 3;

/// The chat widget: draft, scroll position and a handle to the collaborator.
///
/// Conversation, status and error are never copied into the app; they are
/// read from the controller each time a frame is drawn.
pub struct ChatApp {
    controller: Arc<dyn ChatController>,
    input: InputState,
    scroll: ScrollState,
    theme: Theme,
    ui: UiConfig,
    should_quit: bool,
    /// Layout of the last frame, for mouse hit testing.
    last_layout: ViewLayout,
}

impl ChatApp {
    pub fn new(controller: Arc<dyn ChatController>, ui: UiConfig) -> Self {
        Self {
            controller,
            input: InputState::new(),
            scroll: ScrollState::new(),
            theme: Theme::from_name(ui.theme),
            ui,
            should_quit: false,
            last_layout: ViewLayout::default(),
        }
    }

    pub fn controller(&self) -> &dyn ChatController {
        self.controller.as_ref()
    }

    pub fn input(&self) -> &InputState {
        &self.input
    }

    pub fn scroll(&self) -> &ScrollState {
        &self.scroll
    }

    pub fn theme(&self) -> &Theme {
        &self.theme
    }

    pub fn ui_config(&self) -> &UiConfig {
        &self.ui
    }

    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    /// Receiver that fires when the collaborator's state changes.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.controller.subscribe()
    }

    /// Control currently shown next to the input.
    pub fn affordance(&self) -> Affordance {
        Affordance::for_status(self.controller.status())
    }

    /// Send the trimmed draft. Returns false (and changes nothing) if it is blank.
    pub fn submit(&mut self) -> bool {
        let text = self.input.content().trim().to_string();
        if text.is_empty() {
            return false;
        }
        debug!(chars = text.chars().count(), "submitting message");
        self.controller.send_message(&text);
        self.input.commit(&text);
        self.scroll.request_scroll_to_bottom(ScrollBehavior::Smooth);
        true
    }

    /// Activate the Send/Stop control.
    pub fn activate(&mut self) {
        match self.affordance() {
            Affordance::Send => {
                self.submit();
            }
            Affordance::Stop => self.stop(),
        }
    }

    /// Stop the response if one is streaming.
    pub fn stop(&mut self) {
        if self.affordance() == Affordance::Stop {
            debug!("stopping response");
            self.controller.stop();
        }
    }

    /// Insert pasted text. Pastes never submit, even when they contain newlines.
    pub fn paste(&mut self, text: &str) {
        self.input.insert_str(text);
    }

    pub fn handle_event(&mut self, event: Event) {
        match event {
            Event::Key { key, composing } => self.handle_key(key, composing),
            Event::Paste(text) => self.paste(&text),
            Event::Mouse(mouse) => self.handle_mouse(mouse),
            Event::Tick => {
                self.tick();
            }
            Event::Resize(_, _) => {}
        }
    }

    pub fn handle_key(&mut self, key: KeyEvent, composing: bool) {
        self.handle_action(key_to_action(key, composing));
    }

    pub fn handle_action(&mut self, action: Action) {
        let page = self.last_layout.messages.height.saturating_sub(1).max(1);
        match action {
            Action::Quit => self.should_quit = true,
            Action::Submit => {
                self.submit();
            }
            Action::Activate => self.activate(),
            Action::Stop => self.stop(),
            Action::InsertChar(c) => self.input.insert(c),
            Action::InsertNewline => self.input.insert('\n'),
            Action::Backspace => self.input.backspace(),
            Action::Delete => self.input.delete(),
            Action::Left => self.input.move_left(),
            Action::Right => self.input.move_right(),
            Action::Home => self.input.move_home(),
            Action::End => self.input.move_end(),
            Action::HistoryPrev => {
                if self.input.is_empty() || self.input.is_browsing_history() {
                    self.input.history_prev();
                }
            }
            Action::HistoryNext => {
                if self.input.is_browsing_history() {
                    self.input.history_next();
                }
            }
            Action::PageUp => self.scroll.scroll_up(page),
            Action::PageDown => self.scroll.scroll_down(page),
            Action::ScrollTop => self.scroll.scroll_to_top(),
            Action::ScrollBottom => self.scroll.scroll_to_bottom(ScrollBehavior::Instant),
            Action::None => {}
        }
    }

    pub fn handle_mouse(&mut self, mouse: MouseEvent) {
        match mouse.kind {
            MouseEventKind::ScrollUp => self.scroll.scroll_up(WHEEL_LINES),
            MouseEventKind::ScrollDown => self.scroll.scroll_down(WHEEL_LINES),
            MouseEventKind::Down(MouseButton::Left) => {
                if self
                    .affordance()
                    .hit(self.last_layout.input, mouse.column, mouse.row)
                {
                    self.activate();
                }
            }
            _ => {}
        }
    }

    /// Advance animations. Returns true if a redraw is needed.
    pub fn tick(&mut self) -> bool {
        self.scroll.tick()
    }

    /// Post-render hook: apply deferred scroll requests against the new layout.
    pub fn after_render(&mut self, report: RenderReport) {
        self.last_layout = report.layout;
        self.scroll
            .after_render(report.content_height, report.viewport_height);
    }
}

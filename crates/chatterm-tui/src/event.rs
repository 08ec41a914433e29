//! Event handling for the chatterm TUI.

use crossterm::event::{
    self, Event as CrosstermEvent, KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseEvent,
};
use std::time::Duration;
use tokio::sync::mpsc;

/// Events that can occur in the TUI.
#[derive(Debug, Clone)]
pub enum Event {
    /// A key was pressed.
    ///
    /// `composing` is set when the key arrived as part of a burst (another
    /// event was already queued right behind it, or it was queued behind the
    /// previous key). Input methods and unbracketed pastes deliver committed
    /// text this way, so an Enter inside a burst must not submit.
    Key { key: KeyEvent, composing: bool },
    /// Bracketed paste payload.
    Paste(String),
    /// A mouse event occurred.
    Mouse(MouseEvent),
    /// A tick event for UI updates.
    Tick,
    /// Terminal was resized.
    Resize(u16, u16),
}

/// Event handler that runs in a background thread.
pub struct EventHandler {
    rx: mpsc::UnboundedReceiver<Event>,
    _tx: mpsc::UnboundedSender<Event>,
}

impl EventHandler {
    /// Create a new event handler with the specified tick rate.
    pub fn new(tick_rate_ms: u64) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let tx_clone = tx.clone();

        // crossterm reads are blocking, so poll on a plain thread
        std::thread::spawn(move || {
            let tick_rate = Duration::from_millis(tick_rate_ms);
            let mut in_burst = false;
            loop {
                if event::poll(tick_rate).unwrap_or(false) {
                    let Ok(evt) = event::read() else { continue };
                    let event = match evt {
                        CrosstermEvent::Key(key) if key.kind != KeyEventKind::Release => {
                            let pending = event::poll(Duration::ZERO).unwrap_or(false);
                            let composing = pending || in_burst;
                            in_burst = pending;
                            Some(Event::Key { key, composing })
                        }
                        CrosstermEvent::Paste(text) => Some(Event::Paste(text)),
                        CrosstermEvent::Mouse(mouse) => Some(Event::Mouse(mouse)),
                        CrosstermEvent::Resize(w, h) => Some(Event::Resize(w, h)),
                        _ => None,
                    };
                    if let Some(e) = event {
                        if tx_clone.send(e).is_err() {
                            break;
                        }
                    }
                } else {
                    in_burst = false;
                    if tx_clone.send(Event::Tick).is_err() {
                        break;
                    }
                }
            }
        });

        Self { rx, _tx: tx }
    }

    /// Get the next event, blocking until one is available.
    pub async fn next(&mut self) -> Option<Event> {
        self.rx.recv().await
    }
}

/// Key action that can be performed in the TUI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Quit,
    /// Submit the draft.
    Submit,
    /// Activate the Send/Stop control.
    Activate,
    /// Stop the streaming response.
    Stop,
    InsertChar(char),
    InsertNewline,
    Backspace,
    Delete,
    Left,
    Right,
    Home,
    End,
    HistoryPrev,
    HistoryNext,
    PageUp,
    PageDown,
    ScrollTop,
    ScrollBottom,
    None,
}

/// Convert a key event to an action.
pub fn key_to_action(key: KeyEvent, composing: bool) -> Action {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);

    if ctrl {
        return match key.code {
            KeyCode::Char('c') => Action::Quit,
            KeyCode::Char('s') => Action::Activate,
            KeyCode::Char('j') => Action::InsertNewline,
            KeyCode::Home => Action::ScrollTop,
            KeyCode::End => Action::ScrollBottom,
            _ => Action::None,
        };
    }

    match key.code {
        KeyCode::Enter => {
            // Many terminals cannot report Shift+Enter, so Alt+Enter works too
            if composing || key.modifiers.intersects(KeyModifiers::SHIFT | KeyModifiers::ALT) {
                Action::InsertNewline
            } else {
                Action::Submit
            }
        }
        KeyCode::Esc => Action::Stop,
        KeyCode::Char(c) => Action::InsertChar(c),
        KeyCode::Tab => Action::InsertChar('\t'),
        KeyCode::Backspace => Action::Backspace,
        KeyCode::Delete => Action::Delete,
        KeyCode::Left => Action::Left,
        KeyCode::Right => Action::Right,
        KeyCode::Home => Action::Home,
        KeyCode::End => Action::End,
        KeyCode::Up => Action::HistoryPrev,
        KeyCode::Down => Action::HistoryNext,
        KeyCode::PageUp => Action::PageUp,
        KeyCode::PageDown => Action::PageDown,
        _ => Action::None,
    }
}

//! chatterm-tui: Terminal chat widget
//!
//! This crate provides the interactive layer of chatterm:
//! - Message list with role labels and the collaborator's error
//! - Auto-growing multi-line input box
//! - Send/Stop control driven by the streaming status
//! - Deferred scroll-to-bottom after submitting

mod affordance;
mod app;
mod event;
mod input;
mod messages;
mod scroll;
#[cfg(test)]
pub mod test_utils;
mod text;
mod theme;
mod view;

pub use affordance::Affordance;
pub use app::ChatApp;
pub use chatterm_engine;
pub use event::{key_to_action, Action, Event, EventHandler};
pub use input::InputState;
pub use messages::{conversation_lines, role_label, MessageEntry};
pub use scroll::{ScrollBehavior, ScrollState};
pub use theme::Theme;
pub use view::{draw, RenderReport, ViewLayout};

use std::io::{self, stdout};
use std::sync::Arc;

use chatterm_engine::{ChatController, UiConfig};
use crossterm::{
    cursor::Show as ShowCursor,
    event::{DisableBracketedPaste, DisableMouseCapture, EnableBracketedPaste, EnableMouseCapture},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::Backend, backend::CrosstermBackend, Terminal};
use tracing::{debug, info};

/// Errors from running the terminal UI.
#[derive(Debug, thiserror::Error)]
pub enum TuiError {
    /// Terminal I/O failed.
    #[error("Terminal error: {0}")]
    Io(#[from] io::Error),
}

/// RAII guard for terminal state restoration.
struct TerminalGuard;

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = execute!(
            stdout(),
            DisableBracketedPaste,
            DisableMouseCapture,
            LeaveAlternateScreen,
            ShowCursor
        );
    }
}

/// Run the chat widget until the user quits.
///
/// Sets up the terminal, runs the event loop, and restores the terminal on
/// exit (also when the loop fails).
pub async fn run_tui(controller: Arc<dyn ChatController>, ui: UiConfig) -> Result<(), TuiError> {
    enable_raw_mode()?;
    let _guard = TerminalGuard;

    let mut stdout = stdout();
    execute!(
        stdout,
        EnterAlternateScreen,
        EnableMouseCapture,
        EnableBracketedPaste
    )?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut events = EventHandler::new(ui.tick_rate_ms);
    let mut app = ChatApp::new(controller, ui);
    info!("chat widget started");

    let result = run_loop(&mut terminal, &mut app, &mut events).await;

    terminal.show_cursor()?;
    info!("chat widget stopped");
    result
}

/// Draw, run after-render hooks, then wait for input or a state change.
async fn run_loop<B: Backend>(
    terminal: &mut Terminal<B>,
    app: &mut ChatApp,
    events: &mut EventHandler,
) -> Result<(), TuiError> {
    let mut changes = app.subscribe();
    let mut watching = true;

    loop {
        let mut report = RenderReport::default();
        terminal.draw(|frame| report = view::draw(frame, app))?;
        app.after_render(report);

        if app.should_quit() {
            return Ok(());
        }

        tokio::select! {
            event = events.next() => match event {
                Some(event) => app.handle_event(event),
                None => return Ok(()),
            },
            changed = changes.changed(), if watching => {
                if changed.is_err() {
                    debug!("controller dropped its change feed");
                    watching = false;
                }
            }
        }
    }
}

//! Test utilities for chatterm-tui rendering and interaction tests.

use std::sync::{Arc, Mutex};

use chatterm_engine::{ChatController, ChatError, ChatStatus, Conversation, UiConfig, UiMessage};
use ratatui::{backend::TestBackend, buffer::Buffer, Terminal};
use tokio::sync::watch;

use crate::app::ChatApp;
use crate::view::{self, RenderReport};

/// Convert a buffer to a string, one line per row, trailing spaces trimmed.
pub fn buffer_to_string(buffer: &Buffer) -> String {
    let area = buffer.area;
    let mut result = String::new();

    for y in area.y..area.y + area.height {
        for x in area.x..area.x + area.width {
            let cell = buffer.cell((x, y)).unwrap();
            result.push_str(cell.symbol());
        }
        while result.ends_with(' ') {
            result.pop();
        }
        result.push('\n');
    }

    if result.ends_with('\n') {
        result.pop();
    }

    result
}

/// Draw `app` on a fresh test terminal and return the screen plus the render report.
pub fn render_app(app: &ChatApp, width: u16, height: u16) -> (String, RenderReport) {
    let mut terminal = Terminal::new(TestBackend::new(width, height)).unwrap();
    let mut report = RenderReport::default();
    terminal
        .draw(|frame| report = view::draw(frame, app))
        .unwrap();
    (buffer_to_string(terminal.backend().buffer()), report)
}

/// App over a fresh [`RecordingController`].
pub fn test_app() -> (ChatApp, Arc<RecordingController>) {
    test_app_with(RecordingController::new())
}

/// App over a prepared controller.
pub fn test_app_with(controller: RecordingController) -> (ChatApp, Arc<RecordingController>) {
    let controller = Arc::new(controller);
    let app = ChatApp::new(controller.clone(), UiConfig::default());
    (app, controller)
}

#[derive(Default)]
struct Recorded {
    messages: Vec<UiMessage>,
    status: ChatStatus,
    error: Option<ChatError>,
    sent: Vec<String>,
    stops: usize,
}

/// Controller fake that records calls and serves fixed state.
pub struct RecordingController {
    state: Mutex<Recorded>,
    changes: watch::Sender<u64>,
}

impl RecordingController {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(Recorded::default()),
            changes: watch::Sender::new(0),
        }
    }

    fn update(&self, f: impl FnOnce(&mut Recorded)) {
        f(&mut self.state.lock().unwrap());
        self.changes.send_modify(|rev| *rev += 1);
    }

    pub fn set_messages(&self, messages: Vec<UiMessage>) {
        self.update(|s| s.messages = messages);
    }

    pub fn set_status(&self, status: ChatStatus) {
        self.update(|s| s.status = status);
    }

    pub fn set_error(&self, error: Option<ChatError>) {
        self.update(|s| s.error = error);
    }

    pub fn sent(&self) -> Vec<String> {
        self.state.lock().unwrap().sent.clone()
    }

    pub fn stop_count(&self) -> usize {
        self.state.lock().unwrap().stops
    }
}

impl ChatController for RecordingController {
    fn messages(&self) -> Conversation {
        Arc::new(self.state.lock().unwrap().messages.clone())
    }

    fn status(&self) -> ChatStatus {
        self.state.lock().unwrap().status
    }

    fn error(&self) -> Option<ChatError> {
        self.state.lock().unwrap().error.clone()
    }

    fn send_message(&self, text: &str) {
        self.update(|s| {
            s.sent.push(text.to_string());
            s.messages.push(UiMessage::user_text(text));
        });
    }

    fn stop(&self) {
        self.update(|s| s.stops += 1);
    }

    fn subscribe(&self) -> watch::Receiver<u64> {
        self.changes.subscribe()
    }
}

//! Chat session state.
//!
//! [`ChatSession`] owns a conversation and drives exchanges through a
//! [`ChatTransport`]. Conversation, status and error live in independent
//! `watch` cells so observers can read the latest value of each at any time;
//! a revision counter wakes observers when any of them changes.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use futures_util::StreamExt;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::message::{generate_id, UiMessage};
use crate::stream::{MessageAssembler, StreamOutcome};
use crate::transport::{ChatError, ChatRequest, ChatTransport};

/// Snapshot of the conversation, newest message last.
pub type Conversation = Arc<Vec<UiMessage>>;

/// State of the current exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChatStatus {
    /// No exchange in flight.
    #[default]
    Ready,
    /// Request sent, no response chunk yet.
    Submitted,
    /// Response chunks are arriving.
    Streaming,
    /// The last exchange failed.
    Error,
}

impl ChatStatus {
    /// Whether an exchange is in flight.
    pub fn is_busy(self) -> bool {
        matches!(self, Self::Submitted | Self::Streaming)
    }
}

/// The operations a chat widget needs from its collaborator.
pub trait ChatController: Send + Sync {
    /// Current conversation snapshot.
    fn messages(&self) -> Conversation;

    /// Current exchange status.
    fn status(&self) -> ChatStatus;

    /// Error raised by the last exchange, if any.
    fn error(&self) -> Option<ChatError>;

    /// Append a user message and start an exchange.
    fn send_message(&self, text: &str);

    /// Cancel the exchange in flight, if any.
    fn stop(&self);

    /// Receiver that changes whenever conversation, status or error change.
    fn subscribe(&self) -> watch::Receiver<u64>;
}

/// A conversation bound to a transport.
#[derive(Clone)]
pub struct ChatSession {
    inner: Arc<Inner>,
}

struct Inner {
    id: String,
    transport: Arc<dyn ChatTransport>,
    messages: watch::Sender<Conversation>,
    status: watch::Sender<ChatStatus>,
    error: watch::Sender<Option<ChatError>>,
    revision: watch::Sender<u64>,
    generation: AtomicU64,
    active: Mutex<Option<CancellationToken>>,
}

impl ChatSession {
    /// Create an empty session with a fresh chat ID.
    pub fn new(transport: Arc<dyn ChatTransport>) -> Self {
        Self::with_id(generate_id(), transport)
    }

    /// Create an empty session with a specific chat ID.
    pub fn with_id(id: impl Into<String>, transport: Arc<dyn ChatTransport>) -> Self {
        Self {
            inner: Arc::new(Inner {
                id: id.into(),
                transport,
                messages: watch::Sender::new(Arc::new(Vec::new())),
                status: watch::Sender::new(ChatStatus::Ready),
                error: watch::Sender::new(None),
                revision: watch::Sender::new(0),
                generation: AtomicU64::new(0),
                active: Mutex::new(None),
            }),
        }
    }

    /// Chat ID sent with every request.
    pub fn id(&self) -> &str {
        &self.inner.id
    }

    /// Append a user message and start an exchange, returning its task.
    ///
    /// Must be called from within a tokio runtime. An exchange already in
    /// flight is cancelled first.
    pub fn submit(&self, text: &str) -> JoinHandle<()> {
        let inner = &self.inner;
        let token = CancellationToken::new();
        let generation = inner.generation.fetch_add(1, Ordering::SeqCst) + 1;

        if let Some(previous) = inner.replace_active(Some(token.clone())) {
            previous.cancel();
        }

        inner.messages.send_modify(|messages| {
            Arc::make_mut(messages).push(UiMessage::user_text(text));
        });
        inner.error.send_replace(None);
        inner.status.send_replace(ChatStatus::Submitted);
        inner.notify();
        info!(chat = %inner.id, generation, "submitting message");

        tokio::spawn(run_exchange(Arc::clone(inner), token, generation))
    }
}

impl ChatController for ChatSession {
    fn messages(&self) -> Conversation {
        self.inner.messages.borrow().clone()
    }

    fn status(&self) -> ChatStatus {
        *self.inner.status.borrow()
    }

    fn error(&self) -> Option<ChatError> {
        self.inner.error.borrow().clone()
    }

    fn send_message(&self, text: &str) {
        drop(self.submit(text));
    }

    fn stop(&self) {
        if let Some(token) = self.inner.replace_active(None) {
            debug!(chat = %self.inner.id, "stop requested");
            token.cancel();
        }
    }

    fn subscribe(&self) -> watch::Receiver<u64> {
        self.inner.revision.subscribe()
    }
}

impl Inner {
    fn replace_active(&self, token: Option<CancellationToken>) -> Option<CancellationToken> {
        let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *active, token)
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    fn notify(&self) {
        self.revision.send_modify(|revision| *revision += 1);
    }

    fn set_status(&self, generation: u64, status: ChatStatus) {
        if self.is_current(generation) {
            self.status.send_replace(status);
            self.notify();
        }
    }

    fn fail(&self, generation: u64, error: ChatError) {
        if !self.is_current(generation) {
            return;
        }
        warn!(chat = %self.id, %error, "exchange failed");
        self.replace_active(None);
        self.error.send_replace(Some(error));
        self.status.send_replace(ChatStatus::Error);
        self.notify();
    }

    /// Insert the assistant message or replace the previous copy of it.
    ///
    /// The generation is checked under the conversation's write lock, so a
    /// message pushed by a newer submit can never be overwritten. Returns
    /// false when the exchange is stale.
    fn upsert(&self, generation: u64, message: &UiMessage) -> bool {
        let applied = self.messages.send_if_modified(|messages| {
            if !self.is_current(generation) {
                return false;
            }
            let messages = Arc::make_mut(messages);
            match messages.last_mut() {
                Some(last) if last.id == message.id => *last = message.clone(),
                _ => messages.push(message.clone()),
            }
            true
        });
        if applied {
            self.notify();
        }
        applied
    }

    fn finish(&self, generation: u64) {
        if self.is_current(generation) {
            self.replace_active(None);
        }
        self.set_status(generation, ChatStatus::Ready);
    }
}

async fn run_exchange(inner: Arc<Inner>, token: CancellationToken, generation: u64) {
    let history = inner.messages.borrow().clone();
    let request = ChatRequest::submit(inner.id.clone(), &history);

    let response = tokio::select! {
        () = token.cancelled() => {
            inner.finish(generation);
            return;
        }
        response = inner.transport.send_messages(request) => response,
    };

    let mut chunks = match response {
        Ok(chunks) => chunks,
        Err(error) => {
            inner.fail(generation, error);
            return;
        }
    };

    let mut assembler = MessageAssembler::new(generate_id());

    loop {
        let next = tokio::select! {
            () = token.cancelled() => {
                debug!(chat = %inner.id, generation, "exchange cancelled");
                break;
            }
            next = chunks.next() => next,
        };

        let chunk = match next {
            Some(Ok(chunk)) => chunk,
            Some(Err(error)) => {
                inner.fail(generation, error);
                return;
            }
            None => break,
        };

        if !inner.is_current(generation) {
            return;
        }
        if *inner.status.borrow() != ChatStatus::Streaming {
            inner.set_status(generation, ChatStatus::Streaming);
        }

        match assembler.apply(chunk) {
            StreamOutcome::Continue => {}
            StreamOutcome::Finished | StreamOutcome::Aborted => {
                if !inner.upsert(generation, assembler.message()) {
                    return;
                }
                break;
            }
            StreamOutcome::Failed(message) => {
                inner.fail(generation, ChatError::Server(message));
                return;
            }
        }

        if !inner.upsert(generation, assembler.message()) {
            return;
        }
    }

    inner.finish(generation);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Role;
    use crate::stream::UiStreamChunk;
    use crate::transport::ChunkStream;
    use async_trait::async_trait;
    use futures_util::stream;
    use std::time::Duration;

    /// Transport replaying a fixed chunk list, recording requests.
    struct ScriptedTransport {
        chunks: Vec<Result<UiStreamChunk, ChatError>>,
        hang_after: bool,
        requests: Mutex<Vec<ChatRequest>>,
    }

    impl ScriptedTransport {
        fn new(chunks: Vec<Result<UiStreamChunk, ChatError>>) -> Arc<Self> {
            Arc::new(Self {
                chunks,
                hang_after: false,
                requests: Mutex::new(Vec::new()),
            })
        }

        fn hanging(chunks: Vec<Result<UiStreamChunk, ChatError>>) -> Arc<Self> {
            Arc::new(Self {
                chunks,
                hang_after: true,
                requests: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl ChatTransport for ScriptedTransport {
        async fn send_messages(&self, request: ChatRequest) -> Result<ChunkStream, ChatError> {
            self.requests.lock().unwrap().push(request);
            let replay = stream::iter(self.chunks.clone());
            if self.hang_after {
                Ok(Box::pin(replay.chain(stream::pending())))
            } else {
                Ok(Box::pin(replay))
            }
        }
    }

    struct FailingTransport;

    #[async_trait]
    impl ChatTransport for FailingTransport {
        async fn send_messages(&self, _request: ChatRequest) -> Result<ChunkStream, ChatError> {
            Err(ChatError::Status {
                status: 503,
                body: "busy".into(),
            })
        }
    }

    fn text_reply(text: &str) -> Vec<Result<UiStreamChunk, ChatError>> {
        vec![
            Ok(UiStreamChunk::Start { message_id: None }),
            Ok(UiStreamChunk::TextStart { id: "0".into() }),
            Ok(UiStreamChunk::TextDelta {
                id: "0".into(),
                delta: text.into(),
            }),
            Ok(UiStreamChunk::TextEnd { id: "0".into() }),
            Ok(UiStreamChunk::Finish),
        ]
    }

    async fn wait_until(session: &ChatSession, condition: impl Fn(&ChatSession) -> bool) {
        let mut updates = session.subscribe();
        tokio::time::timeout(Duration::from_secs(2), async {
            while !condition(session) {
                updates.changed().await.unwrap();
            }
        })
        .await
        .expect("condition not reached");
    }

    #[tokio::test]
    async fn test_submit_appends_user_and_assistant() {
        let transport = ScriptedTransport::new(text_reply("Hello!"));
        let session = ChatSession::with_id("chat-1", transport.clone());

        session.submit("Hi").await.unwrap();

        let messages = session.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::User);
        assert_eq!(messages[0].text(), "Hi");
        assert_eq!(messages[1].role, Role::Assistant);
        assert_eq!(messages[1].text(), "Hello!");
        assert_eq!(session.status(), ChatStatus::Ready);
        assert!(session.error().is_none());

        let requests = transport.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].id, "chat-1");
        assert_eq!(requests[0].messages.len(), 1);
    }

    #[tokio::test]
    async fn test_second_exchange_sends_full_history() {
        let transport = ScriptedTransport::new(text_reply("ok"));
        let session = ChatSession::new(transport.clone());

        session.submit("one").await.unwrap();
        session.submit("two").await.unwrap();

        assert_eq!(session.messages().len(), 4);
        let requests = transport.requests.lock().unwrap();
        assert_eq!(requests[1].messages.len(), 3);
        assert_eq!(requests[1].messages[2].text(), "two");
    }

    #[tokio::test]
    async fn test_transport_error_sets_error_status() {
        let session = ChatSession::new(Arc::new(FailingTransport));

        session.submit("Hi").await.unwrap();

        assert_eq!(session.status(), ChatStatus::Error);
        let error = session.error().unwrap();
        assert_eq!(error.to_string(), "Request failed with status 503: busy");
        // The user message stays in the conversation
        assert_eq!(session.messages().len(), 1);
    }

    #[tokio::test]
    async fn test_stream_error_chunk_surfaces_message() {
        let transport = ScriptedTransport::new(vec![
            Ok(UiStreamChunk::Start { message_id: None }),
            Ok(UiStreamChunk::Error {
                error_text: "An error occurred.".into(),
            }),
        ]);
        let session = ChatSession::new(transport);

        session.submit("Hi").await.unwrap();

        assert_eq!(session.status(), ChatStatus::Error);
        assert_eq!(session.error().unwrap().to_string(), "An error occurred.");
    }

    #[tokio::test]
    async fn test_new_submit_clears_error() {
        let transport = ScriptedTransport::new(vec![Ok(UiStreamChunk::Error {
            error_text: "boom".into(),
        })]);
        let session = ChatSession::new(transport);

        session.submit("first").await.unwrap();
        assert!(session.error().is_some());

        let handle = session.submit("second");
        assert!(session.error().is_none());
        assert_eq!(session.status(), ChatStatus::Submitted);
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_stop_cancels_streaming_exchange() {
        let transport = ScriptedTransport::hanging(vec![
            Ok(UiStreamChunk::Start { message_id: None }),
            Ok(UiStreamChunk::TextDelta {
                id: "0".into(),
                delta: "partial".into(),
            }),
        ]);
        let session = ChatSession::new(transport);

        let handle = session.submit("Hi");
        wait_until(&session, |s| {
            s.status() == ChatStatus::Streaming
                && s.messages().last().is_some_and(|m| m.text() == "partial")
        })
        .await;

        session.stop();
        handle.await.unwrap();

        assert_eq!(session.status(), ChatStatus::Ready);
        let messages = session.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].text(), "partial");
    }

    #[tokio::test]
    async fn test_stop_when_idle_is_noop() {
        let session = ChatSession::new(ScriptedTransport::new(Vec::new()));
        let before = *session.subscribe().borrow();
        session.stop();
        assert_eq!(session.status(), ChatStatus::Ready);
        assert_eq!(*session.subscribe().borrow(), before);
    }

    #[tokio::test]
    async fn test_stale_exchange_cannot_overwrite_newer_message() {
        let transport = ScriptedTransport::hanging(vec![
            Ok(UiStreamChunk::Start { message_id: None }),
            Ok(UiStreamChunk::TextDelta {
                id: "0".into(),
                delta: "first reply".into(),
            }),
        ]);
        let session = ChatSession::new(transport);

        let first = session.submit("one");
        wait_until(&session, |s| {
            s.messages().last().is_some_and(|m| m.text() == "first reply")
        })
        .await;
        let stale_generation = session.inner.generation.load(Ordering::SeqCst);
        let stale_reply = session.messages().last().cloned().unwrap();

        let second = session.submit("two");
        first.await.unwrap();

        // The old exchange lost the race: its write is refused.
        let mut late = stale_reply.clone();
        late.parts = vec![crate::message::MessagePart::text("late delta")];
        assert!(!session.inner.upsert(stale_generation, &late));

        let messages = session.messages();
        assert_eq!(messages[0].text(), "one");
        assert_eq!(messages[1].id, stale_reply.id);
        assert_eq!(messages[1].text(), "first reply");
        assert_eq!(messages[2].role, Role::User);
        assert_eq!(messages[2].text(), "two");

        session.stop();
        second.await.unwrap();
    }

    #[test]
    fn test_status_busy() {
        assert!(ChatStatus::Submitted.is_busy());
        assert!(ChatStatus::Streaming.is_busy());
        assert!(!ChatStatus::Ready.is_busy());
        assert!(!ChatStatus::Error.is_busy());
    }
}

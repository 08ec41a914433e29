//! Chat transports.
//!
//! A transport turns a [`ChatRequest`] into a stream of [`UiStreamChunk`]s.
//! [`HttpChatTransport`] posts the conversation to a configured endpoint and
//! decodes the SSE response body.

use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::{self, Stream, StreamExt};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT};
use serde::Serialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};
use tokio_util::io::StreamReader;
use tracing::debug;

use crate::config::ChatConfig;
use crate::message::UiMessage;
use crate::stream::{parse_chunk, SseDecoder, UiStreamChunk};

/// Stream of decoded chunks for one exchange.
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<UiStreamChunk, ChatError>> + Send>>;

/// What caused a request to be sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Trigger {
    /// A new user message was submitted.
    SubmitMessage,
}

/// Body posted to the chat endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    /// Chat (conversation) ID.
    pub id: String,
    /// Full conversation so far, newest last.
    pub messages: Vec<UiMessage>,
    /// Why the request was sent.
    pub trigger: Trigger,
}

impl ChatRequest {
    /// Build a submit request from the current conversation.
    pub fn submit(id: impl Into<String>, messages: &[UiMessage]) -> Self {
        Self {
            id: id.into(),
            messages: messages.iter().map(UiMessage::for_request).collect(),
            trigger: Trigger::SubmitMessage,
        }
    }
}

/// Something that can stream chat responses.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Send the conversation and return the response chunk stream.
    async fn send_messages(&self, request: ChatRequest) -> Result<ChunkStream, ChatError>;
}

/// Transport that talks to an HTTP endpoint streaming UI message chunks.
#[derive(Debug, Clone)]
pub struct HttpChatTransport {
    client: reqwest::Client,
    url: String,
}

impl HttpChatTransport {
    /// Create a transport for the endpoint and headers in `config`.
    pub fn new(config: &ChatConfig) -> Result<Self, ChatError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("text/event-stream"));
        for (name, value) in &config.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| ChatError::InvalidHeader(format!("{name}: {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| ChatError::InvalidHeader(format!("{name}: {e}")))?;
            headers.insert(name, value);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .connect_timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            url: config.endpoint(),
        })
    }

    /// The URL requests are posted to.
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl ChatTransport for HttpChatTransport {
    async fn send_messages(&self, request: ChatRequest) -> Result<ChunkStream, ChatError> {
        debug!(url = %self.url, messages = request.messages.len(), "posting chat request");

        let response = self.client.post(&self.url).json(&request).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ChatError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response
            .bytes_stream()
            .map(|result| result.map_err(std::io::Error::other));
        let lines = BufReader::new(StreamReader::new(bytes)).lines();

        let chunks = stream::try_unfold((lines, SseDecoder::new()), |(lines, decoder)| {
            next_chunk(lines, decoder)
        });

        Ok(Box::pin(chunks))
    }
}

/// Read lines until the next chunk; `Ok(None)` ends the stream.
async fn next_chunk<R>(
    mut lines: Lines<R>,
    mut decoder: SseDecoder,
) -> Result<Option<(UiStreamChunk, (Lines<R>, SseDecoder))>, ChatError>
where
    R: AsyncBufRead + Unpin,
{
    loop {
        let line = lines
            .next_line()
            .await
            .map_err(|e| ChatError::Stream(e.to_string()))?;
        let event = match line {
            Some(line) => decoder.feed_line(&line),
            None => match decoder.finish() {
                Some(event) => Some(event),
                None => return Ok(None),
            },
        };
        let Some(event) = event else { continue };
        return match parse_chunk(&event.data)? {
            Some(chunk) => Ok(Some((chunk, (lines, decoder)))),
            None => Ok(None),
        };
    }
}

/// Errors surfaced by a chat exchange.
///
/// Values are cloneable so they can be published to observers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChatError {
    /// The request could not be sent.
    #[error("Request failed: {0}")]
    Http(String),

    /// The endpoint answered with a non-success status.
    #[error("Request failed with status {status}: {body}")]
    Status { status: u16, body: String },

    /// Reading the response body failed.
    #[error("Stream interrupted: {0}")]
    Stream(String),

    /// A chunk could not be decoded.
    #[error("Invalid stream chunk: {0}")]
    Decode(String),

    /// The server reported an error inside the stream.
    #[error("{0}")]
    Server(String),

    /// A configured header is not valid HTTP.
    #[error("Invalid header {0}")]
    InvalidHeader(String),
}

impl From<reqwest::Error> for ChatError {
    fn from(err: reqwest::Error) -> Self {
        Self::Http(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{MessagePart, Role};
    use futures_util::TryStreamExt;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(server: &MockServer) -> ChatConfig {
        ChatConfig {
            base_url: server.uri(),
            ..ChatConfig::default()
        }
    }

    const SSE_BODY: &str = concat!(
        "data: {\"type\":\"start\",\"messageId\":\"srv\"}\n\n",
        "data: {\"type\":\"text-start\",\"id\":\"0\"}\n\n",
        "data: {\"type\":\"text-delta\",\"id\":\"0\",\"delta\":\"Hi\"}\n\n",
        "data: {\"type\":\"text-end\",\"id\":\"0\"}\n\n",
        "data: {\"type\":\"finish\"}\n\n",
        "data: [DONE]\n\n",
    );

    #[test]
    fn test_submit_request_serialization() {
        let messages = vec![UiMessage::user_text("Hello")];
        let request = ChatRequest::submit("chat-1", &messages);
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["id"], "chat-1");
        assert_eq!(json["trigger"], "submit-message");
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["messages"][0]["parts"][0]["text"], "Hello");
    }

    #[test]
    fn test_invalid_header_rejected() {
        let mut config = ChatConfig::default();
        config.headers.insert("bad header".into(), "x".into());
        let err = HttpChatTransport::new(&config).unwrap_err();
        assert!(matches!(err, ChatError::InvalidHeader(_)));
    }

    #[tokio::test]
    async fn test_http_transport_streams_chunks() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .and(body_partial_json(serde_json::json!({"trigger": "submit-message"})))
            .respond_with(ResponseTemplate::new(200).set_body_raw(SSE_BODY, "text/event-stream"))
            .expect(1)
            .mount(&server)
            .await;

        let transport = HttpChatTransport::new(&config_for(&server)).unwrap();
        let request = ChatRequest::submit("chat", &[UiMessage::user_text("Hello")]);
        let chunks: Vec<UiStreamChunk> = transport
            .send_messages(request)
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();

        assert_eq!(chunks.len(), 5);
        assert_eq!(
            chunks[2],
            UiStreamChunk::TextDelta {
                id: "0".into(),
                delta: "Hi".into()
            }
        );
        assert_eq!(chunks[4], UiStreamChunk::Finish);
    }

    #[tokio::test]
    async fn test_http_transport_sends_configured_headers() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(wiremock::matchers::header("x-api-key", "secret"))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw("data: [DONE]\n\n", "text/event-stream"),
            )
            .expect(1)
            .mount(&server)
            .await;

        let mut config = config_for(&server);
        config.headers.insert("x-api-key".into(), "secret".into());
        let transport = HttpChatTransport::new(&config).unwrap();
        let chunks: Vec<UiStreamChunk> = transport
            .send_messages(ChatRequest::submit("chat", &[]))
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();
        assert!(chunks.is_empty());
    }

    #[tokio::test]
    async fn test_http_transport_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("model unavailable"))
            .mount(&server)
            .await;

        let transport = HttpChatTransport::new(&config_for(&server)).unwrap();
        let result = transport
            .send_messages(ChatRequest::submit("chat", &[]))
            .await;

        match result {
            Err(ChatError::Status { status, body }) => {
                assert_eq!(status, 500);
                assert_eq!(body, "model unavailable");
            }
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("expected error status"),
        }
    }

    #[tokio::test]
    async fn test_http_transport_reports_bad_chunk() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw("data: {oops}\n\n", "text/event-stream"),
            )
            .mount(&server)
            .await;

        let transport = HttpChatTransport::new(&config_for(&server)).unwrap();
        let result: Result<Vec<UiStreamChunk>, ChatError> = transport
            .send_messages(ChatRequest::submit("chat", &[]))
            .await
            .unwrap()
            .try_collect()
            .await;
        assert!(matches!(result, Err(ChatError::Decode(_))));
    }

    #[test]
    fn test_request_keeps_assistant_text() {
        let messages = vec![UiMessage {
            id: "a".into(),
            role: Role::Assistant,
            parts: vec![MessagePart::text("earlier answer")],
        }];
        let request = ChatRequest::submit("chat", &messages);
        assert_eq!(request.messages[0].text(), "earlier answer");
    }
}

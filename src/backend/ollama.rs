use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use super::{FragmentStream, ModelBackend};
use crate::errors::AppError;
use crate::models::Message;

#[derive(Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message>,
    stream: bool,
}

/// One line of the `/api/chat` streaming response. Only the fields the relay
/// reads are modelled; everything else (`done`, timings, ...) is ignored.
#[derive(Deserialize)]
struct OllamaChatChunk {
    #[serde(default)]
    message: Option<OllamaChunkMessage>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Deserialize)]
struct OllamaChunkMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Local Ollama server speaking newline-delimited JSON on `/api/chat`.
#[derive(Clone)]
pub struct OllamaBackend {
    client: Client,
    base_url: String,
    model: String,
}

impl OllamaBackend {
    pub fn new(base_url: &str, model: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        }
    }

    fn chat_url(&self) -> String {
        format!("{}/api/chat", self.base_url)
    }
}

#[async_trait]
impl ModelBackend for OllamaBackend {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn open_stream(&self, message: &str) -> Result<FragmentStream, AppError> {
        let request = OllamaChatRequest {
            model: &self.model,
            messages: vec![Message::user(message)],
            stream: true,
        };

        let response = self
            .client
            .post(self.chat_url())
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                error!(host = %self.base_url, "Ollama request failed: {e}");
                AppError::UpstreamUnavailable { host: self.base_url.clone(), message: e.to_string() }
            })?;

        let status = response.status();
        if !status.is_success() {
            error!(host = %self.base_url, model = %self.model, %status, "Ollama rejected chat request");
            return Err(AppError::UpstreamStatus { status: status.as_u16() });
        }

        debug!(model = %self.model, "Ollama stream opened");
        Ok(content_stream(response.bytes_stream()))
    }
}

/// Turns a raw NDJSON byte stream into the sequence of `message.content` values.
pub(crate) fn content_stream<S, E>(upstream: S) -> FragmentStream
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    Box::pin(async_stream::stream! {
        let mut lines = LineBuffer::default();
        futures_util::pin_mut!(upstream);

        while let Some(chunk) = upstream.next().await {
            let bytes = match chunk {
                Ok(bytes) => bytes,
                Err(e) => {
                    yield Err(AppError::inference(format!("upstream stream interrupted: {e}")));
                    return;
                }
            };
            lines.push(&bytes);
            while let Some(line) = lines.next_line() {
                match parse_line(&line) {
                    Ok(Some(content)) => yield Ok(content),
                    Ok(None) => {}
                    Err(e) => {
                        yield Err(e);
                        return;
                    }
                }
            }
        }

        if let Some(line) = lines.finish() {
            match parse_line(&line) {
                Ok(Some(content)) => yield Ok(content),
                Ok(None) => {}
                Err(e) => yield Err(e),
            }
        }
    })
}

/// Accumulates raw bytes and hands out complete `\n`-terminated lines.
///
/// Splitting happens on bytes, before UTF-8 decoding: `\n` never occurs inside
/// a multi-byte sequence, so a character split across two reads is whole again
/// once its line is complete.
#[derive(Debug, Default)]
pub(crate) struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    pub fn push(&mut self, bytes: &[u8]) {
        self.pending.extend_from_slice(bytes);
    }

    pub fn next_line(&mut self) -> Option<Vec<u8>> {
        let pos = self.pending.iter().position(|&b| b == b'\n')?;
        let mut line: Vec<u8> = self.pending.drain(..=pos).collect();
        line.pop();
        Some(line)
    }

    /// Returns whatever is left once the upstream has ended.
    pub fn finish(&mut self) -> Option<Vec<u8>> {
        if self.pending.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.pending))
        }
    }
}

/// Parses one NDJSON line.
///
/// Blank lines and lines without content yield `Ok(None)`. Malformed lines are
/// logged and skipped. An `error` object from Ollama ends the stream.
fn parse_line(line: &[u8]) -> Result<Option<String>, AppError> {
    let line = line.trim_ascii();
    if line.is_empty() {
        return Ok(None);
    }

    let chunk: OllamaChatChunk = match serde_json::from_slice(line) {
        Ok(chunk) => chunk,
        Err(e) => {
            warn!(line = %String::from_utf8_lossy(line), "Skipping malformed Ollama chunk: {e}");
            return Ok(None);
        }
    };

    if let Some(message) = chunk.error {
        return Err(AppError::inference(message));
    }

    Ok(chunk
        .message
        .and_then(|m| m.content)
        .filter(|content| !content.is_empty()))
}

#[cfg(test)]
mod tests {
    use std::convert::Infallible;

    use axum::body::Body;
    use axum::http::StatusCode;
    use axum::response::IntoResponse;
    use axum::routing::post;
    use axum::{Json, Router};
    use futures_util::stream;
    use serde_json::Value;

    use super::*;

    async fn collect(mut fragments: FragmentStream) -> (String, Option<AppError>) {
        let mut text = String::new();
        let mut failure = None;
        while let Some(item) = fragments.next().await {
            match item {
                Ok(fragment) => text.push_str(&fragment),
                Err(e) => failure = Some(e),
            }
        }
        (text, failure)
    }

    fn from_chunks(chunks: Vec<&'static str>) -> FragmentStream {
        content_stream(stream::iter(
            chunks.into_iter().map(|c| Ok::<_, Infallible>(Bytes::from_static(c.as_bytes()))),
        ))
    }

    /// Serves a fake `/api/chat` that answers with `chunks` as separate body frames.
    async fn spawn_fake_ollama(status: StatusCode, chunks: Vec<&'static str>) -> String {
        let app = Router::new().route(
            "/api/chat",
            post(move |Json(body): Json<Value>| {
                let chunks = chunks.clone();
                async move {
                    assert_eq!(body["stream"], true);
                    assert_eq!(body["messages"][0]["role"], "user");
                    let frames = stream::iter(
                        chunks.into_iter().map(|c| Ok::<_, Infallible>(Bytes::from_static(c.as_bytes()))),
                    );
                    (status, Body::from_stream(frames)).into_response()
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[test]
    fn line_buffer_reassembles_split_multibyte_characters() {
        let line = "{\"message\":{\"content\":\"héllo ✓\"}}\n".as_bytes();
        // Split inside the three-byte check mark.
        let split = line.len() - 6;
        let mut lines = LineBuffer::default();
        lines.push(&line[..split]);
        assert!(lines.next_line().is_none());
        lines.push(&line[split..]);

        let complete = lines.next_line().unwrap();
        assert_eq!(parse_line(&complete).unwrap().as_deref(), Some("héllo ✓"));
        assert!(lines.finish().is_none());
    }

    #[test]
    fn parse_line_skips_blank_malformed_and_contentless_lines() {
        assert_eq!(parse_line(b"   \r").unwrap(), None);
        assert_eq!(parse_line(b"not-json").unwrap(), None);
        assert_eq!(parse_line(br#"{"done":true}"#).unwrap(), None);
        assert_eq!(parse_line(br#"{"message":{"role":"assistant"}}"#).unwrap(), None);
        assert_eq!(parse_line(br#"{"message":{"content":""}}"#).unwrap(), None);
        assert_eq!(parse_line(b"{\"message\":{\"content\":\"ok\"}}\r").unwrap().as_deref(), Some("ok"));
    }

    #[test]
    fn parse_line_reports_upstream_error_objects() {
        let err = parse_line(br#"{"error":"model 'nope' not found"}"#).unwrap_err();
        assert!(matches!(err, AppError::Inference { ref message } if message.contains("not found")));
    }

    #[tokio::test]
    async fn content_stream_concatenates_fragments_in_order() {
        let fragments = from_chunks(vec![
            "{\"message\":{\"content\":\"Hel\"}}\n{\"mess",
            "age\":{\"content\":\"lo\"}}\n",
            "{\"message\":{\"content\":\"\"},\"done\":true}\n",
        ]);
        let (text, failure) = collect(fragments).await;
        assert_eq!(text, "Hello");
        assert!(failure.is_none());
    }

    #[tokio::test]
    async fn content_stream_decodes_characters_split_across_reads() {
        let body = "{\"message\":{\"content\":\"naïve 🦀\"}}\n".as_bytes();
        // Cut through the four-byte crab.
        let (head, tail) = body.split_at(body.len() - 5);
        let upstream = stream::iter(vec![
            Ok::<_, Infallible>(Bytes::copy_from_slice(head)),
            Ok(Bytes::copy_from_slice(tail)),
        ]);
        let (text, failure) = collect(content_stream(upstream)).await;
        assert_eq!(text, "naïve 🦀");
        assert!(failure.is_none());
    }

    #[tokio::test]
    async fn content_stream_survives_malformed_lines() {
        let fragments = from_chunks(vec![
            "{\"message\":{\"content\":\"before \"}}\n",
            "not-json\n",
            "\n",
            "{\"message\":{\"content\":\"after\"}}\n",
        ]);
        let (text, failure) = collect(fragments).await;
        assert_eq!(text, "before after");
        assert!(failure.is_none());
    }

    #[tokio::test]
    async fn content_stream_parses_unterminated_final_line() {
        let (text, _) = collect(from_chunks(vec!["{\"message\":{\"content\":\"tail\"}}"])).await;
        assert_eq!(text, "tail");
    }

    #[tokio::test]
    async fn content_stream_ends_with_error_when_upstream_breaks() {
        let upstream = stream::iter(vec![
            Ok(Bytes::from_static(b"{\"message\":{\"content\":\"partial\"}}\n")),
            Err("connection reset"),
        ]);
        let (text, failure) = collect(content_stream(upstream)).await;
        assert_eq!(text, "partial");
        assert!(matches!(failure, Some(AppError::Inference { .. })));
    }

    #[tokio::test]
    async fn open_stream_relays_content_from_http_upstream() {
        let base_url = spawn_fake_ollama(
            StatusCode::OK,
            vec![
                "{\"message\":{\"content\":\"Grüß \"}}\n",
                "{\"message\":{\"content\":\"Gott\"}}\n{\"done\":true}\n",
            ],
        )
        .await;

        let backend = OllamaBackend::new(&base_url, "llama3.2");
        let fragments = backend.open_stream("hi").await.unwrap();
        let (text, failure) = collect(fragments).await;
        assert_eq!(text, "Grüß Gott");
        assert!(failure.is_none());
    }

    #[tokio::test]
    async fn open_stream_rejects_non_success_status() {
        let base_url = spawn_fake_ollama(StatusCode::NOT_FOUND, vec!["{\"error\":\"model not found\"}"]).await;

        let backend = OllamaBackend::new(&format!("{base_url}/"), "missing");
        let result = backend.open_stream("hi").await;
        assert!(matches!(result, Err(AppError::UpstreamStatus { status: 404 })));
    }

    #[tokio::test]
    async fn open_stream_reports_unreachable_upstream() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let backend = OllamaBackend::new(&format!("http://{addr}"), "llama3.2");
        let result = backend.open_stream("hi").await;
        assert!(matches!(result, Err(AppError::UpstreamUnavailable { .. })));
    }
}

//! LLM client trait and the OpenAI-compatible chat client.

use async_trait::async_trait;
use chrono::Utc;
use futures::{Stream, StreamExt};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::pin::Pin;
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::context::{Message, Role};
use crate::error::{Error, Result};

use super::types::{CompletionRequest, CompletionResponse, StopReason, StreamChunk};

/// Incremental response text, in order.
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<StreamChunk>> + Send>>;

/// Receives response text as it arrives.
pub type ChunkSink = Box<dyn FnMut(&str) + Send>;

/// Language-model service used by a session.
#[async_trait]
pub trait LLMClient: Send + Sync {
    /// Complete a prompt in one exchange.
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse>;

    /// Complete a prompt as a stream of chunks.
    ///
    /// Clients without native streaming yield the whole completion as a
    /// single chunk.
    async fn stream(&self, request: CompletionRequest) -> Result<ChunkStream> {
        let response = self.complete(request).await?;
        let chunk = StreamChunk::new(response.content);
        Ok(Box::pin(futures::stream::once(async move { Ok(chunk) })))
    }

    /// Model used when a request does not name one.
    fn model_id(&self) -> &str;
}

/// Concatenate a chunk stream into the full response text.
pub async fn collect_stream(stream: ChunkStream) -> Result<String> {
    collect_stream_with(stream, |_| {}).await
}

/// Like [`collect_stream`], handing each chunk to `on_chunk` as it arrives.
pub async fn collect_stream_with<F>(mut stream: ChunkStream, mut on_chunk: F) -> Result<String>
where
    F: FnMut(&str) + Send,
{
    let mut text = String::new();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        on_chunk(&chunk.content);
        text.push_str(&chunk.content);
    }
    Ok(text)
}

/// Configuration for [`OpenAICompatibleClient`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Service root, without the `/v1/...` path
    pub base_url: String,
    /// Bearer token, if the endpoint wants one
    pub api_key: Option<String>,
    /// Default model
    pub default_model: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>, default_model: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: None,
            default_model: default_model.into(),
            timeout_secs: 120,
        }
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }
}

fn build_http_client(timeout_secs: u64) -> Result<Client> {
    let timeout = Duration::from_secs(timeout_secs);

    // Proxy auto-detection can panic in some sandboxed environments.
    match catch_unwind(AssertUnwindSafe(|| Client::builder().timeout(timeout).build())) {
        Ok(Ok(client)) => Ok(client),
        Ok(Err(_)) | Err(_) => Client::builder()
            .no_proxy()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("failed to create HTTP client: {}", e))),
    }
}

/// Client for any endpoint speaking the OpenAI chat-completions protocol.
pub struct OpenAICompatibleClient {
    config: ClientConfig,
    http: Client,
}

impl OpenAICompatibleClient {
    const PROVIDER: &'static str = "openai-compatible";

    pub fn new(config: ClientConfig) -> Result<Self> {
        let http = build_http_client(config.timeout_secs)?;
        Ok(Self { config, http })
    }

    fn url(&self) -> String {
        format!(
            "{}/v1/chat/completions",
            self.config.base_url.trim_end_matches('/')
        )
    }

    fn wire_request<'a>(&'a self, request: &'a CompletionRequest, stream: bool) -> ChatRequest<'a> {
        ChatRequest {
            model: request
                .model
                .as_deref()
                .unwrap_or(&self.config.default_model),
            messages: request.messages.iter().map(WireMessage::from).collect(),
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            top_p: request.top_p,
            stream,
        }
    }

    async fn send(&self, request: &CompletionRequest, stream: bool) -> Result<reqwest::Response> {
        let body = self.wire_request(request, stream);
        debug!(
            model = body.model,
            messages = body.messages.len(),
            stream,
            "Sending chat completion request"
        );

        let mut builder = self
            .http
            .post(self.url())
            .header("content-type", "application/json")
            .json(&body);
        if let Some(key) = &self.config.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| Error::llm_api(Self::PROVIDER, format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(api_error(status, &body));
        }
        Ok(response)
    }
}

// Wire types
#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f64>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: Role,
    content: &'a str,
}

impl<'a> From<&'a Message> for WireMessage<'a> {
    fn from(message: &'a Message) -> Self {
        Self {
            role: message.role,
            content: &message.content,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    id: Option<String>,
    model: Option<String>,
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatStreamChunk {
    choices: Vec<ChatStreamChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatStreamChoice {
    delta: ChatDelta,
}

#[derive(Debug, Deserialize)]
struct ChatDelta {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

fn api_error(status: StatusCode, body: &str) -> Error {
    match serde_json::from_str::<ApiError>(body) {
        Ok(error) => Error::llm_api(
            OpenAICompatibleClient::PROVIDER,
            format!("{} ({})", error.error.message, status),
        ),
        Err(_) => Error::llm_api(
            OpenAICompatibleClient::PROVIDER,
            format!("request failed ({}): {}", status, body),
        ),
    }
}

#[async_trait]
impl LLMClient for OpenAICompatibleClient {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        let response = self.send(&request, false).await?;
        let body = response.text().await.map_err(|e| {
            Error::llm_api(Self::PROVIDER, format!("Failed to read response: {}", e))
        })?;

        let api_response: ChatResponse = serde_json::from_str(&body).map_err(|e| {
            Error::llm_api(Self::PROVIDER, format!("Failed to parse response: {}", e))
        })?;

        let choice = api_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| Error::llm_api(Self::PROVIDER, "No choices in response"))?;

        Ok(CompletionResponse {
            id: api_response
                .id
                .unwrap_or_else(|| format!("chatcmpl-{}", Uuid::new_v4())),
            model: api_response.model.unwrap_or_else(|| {
                request
                    .model
                    .clone()
                    .unwrap_or_else(|| self.config.default_model.clone())
            }),
            content: choice.message.content.unwrap_or_default(),
            stop_reason: choice
                .finish_reason
                .as_deref()
                .map(StopReason::from_finish_reason),
            timestamp: Utc::now(),
        })
    }

    async fn stream(&self, request: CompletionRequest) -> Result<ChunkStream> {
        let response = self.send(&request, true).await?;
        Ok(sse_chunks(Box::pin(response.bytes_stream())))
    }

    fn model_id(&self) -> &str {
        &self.config.default_model
    }
}

/// One parsed server-sent-events line.
#[derive(Debug, PartialEq, Eq)]
enum SseEvent {
    Chunk(String),
    Done,
    Error(String),
    Skip,
}

/// Message of an `error` object sent in place of a chunk.
fn stream_error_message(payload: &serde_json::Value) -> Option<String> {
    let error = payload.get("error")?;
    if let Some(message) = error.get("message").and_then(|m| m.as_str()) {
        return Some(message.to_string());
    }
    if let Some(message) = error.as_str() {
        return Some(message.to_string());
    }
    Some("error reported during streaming".to_string())
}

fn parse_sse_line(line: &str) -> SseEvent {
    let Some(data) = line.strip_prefix("data:") else {
        return SseEvent::Skip;
    };
    let data = data.trim();
    if data == "[DONE]" {
        return SseEvent::Done;
    }

    let payload: serde_json::Value = match serde_json::from_str(data) {
        Ok(payload) => payload,
        Err(e) => {
            warn!(error = %e, "Skipping unparseable stream payload");
            return SseEvent::Skip;
        }
    };
    if let Some(message) = stream_error_message(&payload) {
        return SseEvent::Error(message);
    }

    match serde_json::from_value::<ChatStreamChunk>(payload) {
        Ok(chunk) => {
            let content: String = chunk
                .choices
                .into_iter()
                .filter_map(|c| c.delta.content)
                .collect();
            if content.is_empty() {
                SseEvent::Skip
            } else {
                SseEvent::Chunk(content)
            }
        }
        Err(e) => {
            warn!(error = %e, "Skipping non-chunk stream payload");
            SseEvent::Skip
        }
    }
}

struct SseState<S> {
    bytes: S,
    buffer: Vec<u8>,
    exhausted: bool,
    failed: bool,
}

fn stream_failure(message: impl Into<String>) -> Error {
    Error::llm_api(OpenAICompatibleClient::PROVIDER, message)
}

/// Turn a raw SSE byte stream into content chunks.
///
/// The stream ends cleanly only on `[DONE]`. An error payload, a transport
/// failure or a body that stops early yields one `Err` and then ends.
fn sse_chunks<S, B, E>(bytes: S) -> ChunkStream
where
    S: Stream<Item = std::result::Result<B, E>> + Send + Unpin + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: fmt::Display + Send + 'static,
{
    let state = SseState {
        bytes,
        buffer: Vec::new(),
        exhausted: false,
        failed: false,
    };

    Box::pin(futures::stream::unfold(state, |mut state| async move {
        if state.failed {
            return None;
        }
        loop {
            if let Some(pos) = state.buffer.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = state.buffer.drain(..=pos).collect();
                let line = String::from_utf8_lossy(&line).into_owned();
                match parse_sse_line(line.trim()) {
                    SseEvent::Chunk(content) => {
                        return Some((Ok(StreamChunk::new(content)), state))
                    }
                    SseEvent::Done => return None,
                    SseEvent::Error(message) => {
                        state.failed = true;
                        return Some((Err(stream_failure(message)), state));
                    }
                    SseEvent::Skip => continue,
                }
            }

            if state.exhausted {
                state.failed = true;
                let err = stream_failure("stream closed before response completed");
                return Some((Err(err), state));
            }

            match state.bytes.next().await {
                Some(Ok(bytes)) => state.buffer.extend_from_slice(bytes.as_ref()),
                Some(Err(e)) => {
                    state.failed = true;
                    let err = stream_failure(format!("stream interrupted: {}", e));
                    return Some((Err(err), state));
                }
                None => {
                    state.exhausted = true;
                    if !state.buffer.is_empty() {
                        // Flush a final line sent without a newline.
                        state.buffer.push(b'\n');
                    }
                }
            }
        }
    }))
}

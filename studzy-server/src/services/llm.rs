//! Hosted LLM provider
//!
//! Chat completions and embeddings go through the [`LlmProvider`] trait so the
//! chat and ingestion paths can run against any OpenAI-compatible endpoint
//! (OpenAI, Ollama, vLLM, ...) or a test double.

use async_trait::async_trait;
use futures::stream::{Stream, StreamExt};
use reqwest::{header, Client};
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use std::time::Duration;
use studzy_common::config::LlmConfig;
use thiserror::Error;
use tracing::debug;

use crate::error::ApiError;

/// Stream of completion tokens
pub type TokenStream = Pin<Box<dyn Stream<Item = Result<String, LlmError>> + Send>>;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("Provider returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Malformed provider response: {0}")]
    Parse(String),

    #[error("Provider error: {0}")]
    Provider(String),
}

impl From<LlmError> for ApiError {
    fn from(err: LlmError) -> Self {
        ApiError::Upstream(err.to_string())
    }
}

/// One message of a chat-completion prompt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptMessage {
    pub role: String,
    pub content: String,
}

impl PromptMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Model or backend identifier for logging
    fn id(&self) -> &str;

    /// Embed each input; output order matches input order
    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, LlmError>;

    /// Start a streamed chat completion
    async fn chat_stream(&self, messages: Vec<PromptMessage>) -> Result<TokenStream, LlmError>;
}

/// OpenAI-compatible backend
pub struct OpenAiProvider {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    chat_model: String,
    embedding_model: String,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [PromptMessage],
    temperature: f32,
    max_tokens: u32,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

impl OpenAiProvider {
    pub fn new(config: &LlmConfig) -> Result<Self, LlmError> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );

        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| LlmError::Http(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            chat_model: config.chat_model.clone(),
            embedding_model: config.embedding_model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        let request = self.client.post(format!("{}/{}", self.base_url, path));
        match &self.api_key {
            Some(key) => request.header(header::AUTHORIZATION, format!("Bearer {}", key)),
            None => request,
        }
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, LlmError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(LlmError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn id(&self) -> &str {
        &self.chat_model
    }

    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }

        debug!(count = inputs.len(), model = %self.embedding_model, "Requesting embeddings");
        let response = self
            .post("embeddings")
            .json(&EmbeddingRequest {
                model: &self.embedding_model,
                input: inputs,
            })
            .send()
            .await
            .map_err(|e| LlmError::Http(e.to_string()))?;

        let response = Self::check_status(response).await?;
        let mut parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Parse(e.to_string()))?;

        if parsed.data.len() != inputs.len() {
            return Err(LlmError::Parse(format!(
                "expected {} embeddings, got {}",
                inputs.len(),
                parsed.data.len()
            )));
        }

        parsed.data.sort_by_key(|d| d.index);
        Ok(parsed.data.into_iter().map(|d| d.embedding).collect())
    }

    async fn chat_stream(&self, messages: Vec<PromptMessage>) -> Result<TokenStream, LlmError> {
        debug!(messages = messages.len(), model = %self.chat_model, "Starting chat completion");
        let response = self
            .post("chat/completions")
            .json(&ChatRequest {
                model: &self.chat_model,
                messages: &messages,
                temperature: self.temperature,
                max_tokens: self.max_tokens,
                stream: true,
            })
            .send()
            .await
            .map_err(|e| LlmError::Http(e.to_string()))?;

        let response = Self::check_status(response).await?;
        let mut bytes = response.bytes_stream();

        let stream = async_stream::try_stream! {
            let mut parser = CompletionStreamParser::default();
            'read: while let Some(chunk) = bytes.next().await {
                let chunk = chunk.map_err(|e| LlmError::Http(e.to_string()))?;
                for event in parser.push(&chunk)? {
                    match event {
                        StreamEvent::Token(token) => yield token,
                        StreamEvent::Done => break 'read,
                    }
                }
            }
        };

        Ok(Box::pin(stream))
    }
}

/// Event decoded from a streamed chat completion
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Token(String),
    Done,
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    error: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: Option<StreamDelta>,
}

#[derive(Debug, Deserialize)]
struct StreamDelta {
    content: Option<String>,
}

/// Incremental decoder for `text/event-stream` completion bodies
///
/// Network chunks can split lines (and UTF-8 sequences) anywhere, so bytes
/// are buffered until a full line is available.
#[derive(Debug, Default)]
pub struct CompletionStreamParser {
    buffer: Vec<u8>,
}

impl CompletionStreamParser {
    pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<StreamEvent>, LlmError> {
        self.buffer.extend_from_slice(chunk);
        let mut events = Vec::new();

        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8(line)
                .map_err(|e| LlmError::Parse(format!("invalid UTF-8 in stream: {}", e)))?;
            if let Some(event) = Self::parse_line(line.trim_end_matches(['\r', '\n']))? {
                events.push(event);
            }
        }

        Ok(events)
    }

    fn parse_line(line: &str) -> Result<Option<StreamEvent>, LlmError> {
        let Some(payload) = line.strip_prefix("data:") else {
            // Blank separators, comments and other fields carry no tokens
            return Ok(None);
        };
        let payload = payload.trim();

        if payload == "[DONE]" {
            return Ok(Some(StreamEvent::Done));
        }
        if payload.is_empty() {
            return Ok(None);
        }

        let chunk: StreamChunk =
            serde_json::from_str(payload).map_err(|e| LlmError::Parse(e.to_string()))?;
        if let Some(error) = chunk.error {
            return Err(LlmError::Provider(error.to_string()));
        }

        let token = chunk
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.delta)
            .and_then(|d| d.content)
            .filter(|t| !t.is_empty());

        Ok(token.map(StreamEvent::Token))
    }
}

//! OpenAI embedding and chat providers using the OpenAI HTTP API.
//!
//! This module is only available when the `openai` feature is enabled.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::embedding::{EmbeddingProvider, ensure_batch_len};
use crate::error::{RagError, Result};
use crate::generation::{GenerationProvider, GenerationRequest};

/// The default OpenAI API base URL.
pub const OPENAI_API_BASE: &str = "https://api.openai.com/v1";

/// Environment variables consulted for the API key, in order.
pub const API_KEY_ENV_VARS: [&str; 2] = ["AI_INTEGRATIONS_OPENAI_API_KEY", "OPENAI_API_KEY"];

/// The default model for embeddings.
const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";

/// The default dimensionality for `text-embedding-3-small`.
const DEFAULT_DIMENSIONS: usize = 1536;

/// Largest number of inputs sent in one embeddings request.
const DEFAULT_MAX_BATCH_SIZE: usize = 100;

/// The default chat model.
const DEFAULT_CHAT_MODEL: &str = "gpt-4o";

const PROVIDER: &str = "OpenAI";

/// Read the API key from the first set variable in [`API_KEY_ENV_VARS`].
pub fn api_key_from_env() -> Option<String> {
    API_KEY_ENV_VARS
        .iter()
        .filter_map(|name| std::env::var(name).ok())
        .find(|value| !value.trim().is_empty())
}

fn validate_api_key(api_key: String) -> Result<String> {
    if api_key.trim().is_empty() {
        return Err(RagError::ConfigError("OpenAI API key must not be empty".into()));
    }
    Ok(api_key)
}

fn key_from_env() -> Result<String> {
    api_key_from_env().ok_or_else(|| {
        RagError::ConfigError(format!(
            "none of {} is set",
            API_KEY_ENV_VARS.join(", ")
        ))
    })
}

// ── OpenAI API request/response types ─────────────────────────

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

/// POST `body` to `url` and decode a successful JSON response.
async fn post_json<B, R>(client: &reqwest::Client, url: &str, api_key: &str, body: &B) -> Result<R>
where
    B: Serialize + ?Sized,
    R: for<'de> Deserialize<'de>,
{
    let response = client.post(url).bearer_auth(api_key).json(body).send().await.map_err(|e| {
        error!(provider = PROVIDER, url, error = %e, "request failed");
        RagError::provider(PROVIDER, format!("request failed: {e}"))
    })?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let detail =
            serde_json::from_str::<ErrorResponse>(&body).map(|e| e.error.message).unwrap_or(body);

        error!(provider = PROVIDER, url, %status, "API error");
        return Err(RagError::provider(PROVIDER, format!("API returned {status}: {detail}")));
    }

    response.json().await.map_err(|e| {
        error!(provider = PROVIDER, url, error = %e, "failed to parse response");
        RagError::provider(PROVIDER, format!("failed to parse response: {e}"))
    })
}

/// An [`EmbeddingProvider`] backed by the OpenAI embeddings API.
///
/// Inputs larger than `max_batch_size` are sent as several sequential
/// requests and the results concatenated in input order.
///
/// # Example
///
/// ```rust,ignore
/// use cartera_rag::openai::OpenAIEmbeddingProvider;
///
/// let provider = OpenAIEmbeddingProvider::from_env()?;
/// let embedding = provider.embed("public sector employee").await?;
/// ```
pub struct OpenAIEmbeddingProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    dimensions: usize,
    /// If set, passed to the API for Matryoshka dimension truncation.
    request_dimensions: Option<usize>,
    max_batch_size: usize,
}

impl OpenAIEmbeddingProvider {
    /// Create a new provider with the given API key.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Ok(Self {
            client: reqwest::Client::new(),
            api_key: validate_api_key(api_key.into())?,
            base_url: OPENAI_API_BASE.into(),
            model: DEFAULT_EMBEDDING_MODEL.into(),
            dimensions: DEFAULT_DIMENSIONS,
            request_dimensions: None,
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
        })
    }

    /// Create a new provider using the key from [`API_KEY_ENV_VARS`].
    pub fn from_env() -> Result<Self> {
        Self::new(key_from_env()?)
    }

    /// Point the provider at an OpenAI-compatible endpoint.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the model name (e.g. `text-embedding-3-large`).
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the output dimensions (Matryoshka support).
    pub fn with_dimensions(mut self, dims: usize) -> Self {
        self.dimensions = dims;
        self.request_dimensions = Some(dims);
        self
    }

    /// Set the largest number of inputs per request. Zero is treated as one.
    pub fn with_max_batch_size(mut self, size: usize) -> Self {
        self.max_batch_size = size.max(1);
        self
    }

    async fn embed_request(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let url = format!("{}/embeddings", self.base_url);
        let body = EmbeddingRequest {
            model: &self.model,
            input: texts,
            dimensions: self.request_dimensions,
        };
        let response: EmbeddingResponse =
            post_json(&self.client, &url, &self.api_key, &body).await?;

        let mut data = response.data;
        ensure_batch_len(PROVIDER, texts.len(), data.len())?;
        data.sort_by_key(|d| d.index);
        Ok(data.into_iter().map(|d| d.embedding).collect())
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAIEmbeddingProvider {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut embeddings = Vec::with_capacity(texts.len());
        for request in texts.chunks(self.max_batch_size) {
            debug!(
                provider = PROVIDER,
                batch_size = request.len(),
                model = %self.model,
                "embedding batch"
            );
            embeddings.extend(self.embed_request(request).await?);
        }
        Ok(embeddings)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

/// A [`GenerationProvider`] backed by the OpenAI chat completions API.
pub struct OpenAIChatProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl OpenAIChatProvider {
    /// Create a new provider with the given API key and the default model (`gpt-4o`).
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Ok(Self {
            client: reqwest::Client::new(),
            api_key: validate_api_key(api_key.into())?,
            base_url: OPENAI_API_BASE.into(),
            model: DEFAULT_CHAT_MODEL.into(),
        })
    }

    /// Create a new provider using the key from [`API_KEY_ENV_VARS`].
    pub fn from_env() -> Result<Self> {
        Self::new(key_from_env()?)
    }

    /// Point the provider at an OpenAI-compatible endpoint.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the chat model name.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

#[async_trait]
impl GenerationProvider for OpenAIChatProvider {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        debug!(
            provider = PROVIDER,
            model = %self.model,
            temperature = request.temperature,
            max_tokens = request.max_output_tokens,
            "chat completion"
        );

        let url = format!("{}/chat/completions", self.base_url);
        let body = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage { role: "system", content: &request.system_instruction },
                ChatMessage { role: "user", content: &request.user_message },
            ],
            temperature: request.temperature,
            max_tokens: request.max_output_tokens,
        };
        let response: ChatResponse = post_json(&self.client, &url, &self.api_key, &body).await?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| RagError::provider(PROVIDER, "response contained no message content"))
    }
}

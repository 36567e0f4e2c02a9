//! OpenAI-compatible LLM client
//!
//! Provides the [`LlmApi`] trait describing the remote service and the
//! reqwest-backed [`OpenAiClient`] implementation. The helpers in
//! [`crate::assistant`] and [`crate::language`] take the trait as a trait
//! object, so tests can substitute a deterministic fake.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client as HttpClient;
use tracing::debug;

use super::types::{ChatRequest, ChatResponse, EmbeddingRequest, EmbeddingResponse, Message};
use crate::config::LlmConfig;
use crate::error::{Error, Result};

/// OpenAI API base URL
const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Remote chat completion and embedding service
#[async_trait]
pub trait LlmApi: Send + Sync {
    /// Run a chat completion and return the raw reply content.
    async fn complete_chat(
        &self,
        messages: Vec<Message>,
        temperature: f32,
        max_tokens: u32,
    ) -> Result<String>;

    /// Create an embedding vector for a single input text.
    async fn create_embedding(&self, input: &str) -> Result<Vec<f32>>;
}

/// HTTP client for an OpenAI-compatible API
///
/// Thread-safe client for chat completion and embedding requests. Errors are
/// classified into the two retry classes via [`Error::is_transient`]: transport
/// and provider failures are transient, structurally unexpected responses are
/// terminal.
#[derive(Clone)]
pub struct OpenAiClient {
    /// HTTP client for making requests
    http_client: HttpClient,
    /// LLM configuration (models, timeout)
    config: LlmConfig,
    /// API key for authentication
    api_key: String,
    /// Base URL for the API
    base_url: String,
}

impl std::fmt::Debug for OpenAiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiClient")
            .field("base_url", &self.base_url)
            .field("model", &self.config.model)
            .field("embedding_model", &self.config.embedding_model)
            .finish()
    }
}

/// Builder for creating an OpenAiClient
pub struct OpenAiClientBuilder {
    config: Option<LlmConfig>,
    api_key: Option<String>,
    base_url: Option<String>,
    timeout_secs: Option<u64>,
}

impl Default for OpenAiClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl OpenAiClientBuilder {
    /// Create a new builder
    pub fn new() -> Self {
        Self {
            config: None,
            api_key: None,
            base_url: None,
            timeout_secs: None,
        }
    }

    /// Set the LLM configuration
    pub fn config(mut self, config: LlmConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the API key
    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Set the base URL (defaults to OpenAI)
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Set the request timeout
    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    /// Build the OpenAiClient
    pub fn build(self) -> Result<OpenAiClient> {
        let config = self.config.unwrap_or_default();
        let api_key = self.api_key.ok_or_else(|| {
            Error::Config(
                "API key is required. Set ARANDU_API_KEY or OPENAI_API_KEY.".to_string(),
            )
        })?;

        let timeout_secs = self.timeout_secs.unwrap_or(config.timeout_secs);

        let http_client = HttpClient::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(Error::Network)?;

        Ok(OpenAiClient {
            http_client,
            config,
            api_key,
            base_url: self.base_url.unwrap_or_else(|| OPENAI_BASE_URL.to_string()),
        })
    }
}

impl OpenAiClient {
    /// Create a new OpenAiClient with the given configuration and API key
    pub fn new(config: LlmConfig, api_key: impl Into<String>) -> Result<Self> {
        OpenAiClientBuilder::new()
            .config(config)
            .api_key(api_key)
            .build()
    }

    /// Create a new builder for OpenAiClient
    pub fn builder() -> OpenAiClientBuilder {
        OpenAiClientBuilder::new()
    }

    /// Get the chat model from configuration
    pub fn model(&self) -> &str {
        &self.config.model
    }

    /// Get the embedding model from configuration
    pub fn embedding_model(&self) -> &str {
        &self.config.embedding_model
    }
}

#[async_trait]
impl LlmApi for OpenAiClient {
    async fn complete_chat(
        &self,
        messages: Vec<Message>,
        temperature: f32,
        max_tokens: u32,
    ) -> Result<String> {
        let request = ChatRequest::new(&self.config.model, messages)
            .with_temperature(temperature)
            .with_max_tokens(max_tokens);

        let url = format!("{}/chat/completions", self.base_url);

        debug!(
            model = %request.model,
            messages = request.messages.len(),
            "Sending chat completion request"
        );

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(Error::Network)?;

        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Api(format!("HTTP {}: {}", status, body)));
        }

        let chat_response: ChatResponse = response
            .json()
            .await
            .map_err(|e| Error::Api(format!("Failed to parse response: {}", e)))?;

        chat_response
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| {
                Error::UnexpectedResponse("no choices in chat completion".to_string())
            })
    }

    async fn create_embedding(&self, input: &str) -> Result<Vec<f32>> {
        let request = EmbeddingRequest::new(&self.config.embedding_model, input);

        let url = format!("{}/embeddings", self.base_url);

        debug!(
            model = %request.model,
            "Sending embedding request"
        );

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(Error::Network)?;

        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Api(format!("HTTP {}: {}", status, body)));
        }

        let embedding_response: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| Error::Api(format!("Failed to parse response: {}", e)))?;

        embedding_response
            .data
            .into_iter()
            .next()
            .map(|data| data.embedding)
            .ok_or_else(|| Error::UnexpectedResponse("no embedding data".to_string()))
    }
}

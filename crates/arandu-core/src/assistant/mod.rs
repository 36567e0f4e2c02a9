//! Bounded-retry request wrapper around the LLM API
//!
//! Every remote call goes through the same loop: attempt the operation, retry
//! transient failures up to a fixed bound, stop immediately on anything else.
//! Chat queries degrade to a fixed fallback reply and never surface an error;
//! embedding generation signals failure upward so the caller can decide.

mod sanitize;

pub use sanitize::{DEFAULT_MAX_INPUT_LEN, sanitize_embedding_input};

use std::sync::Arc;

use tracing::error;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::llm::{LlmApi, Message};

/// Maximum failed attempts before a request gives up
pub const MAX_RETRY_ATTEMPTS: u32 = 5;

/// Reply returned to the user when a chat query cannot be served
pub const FALLBACK_REPLY: &str = "Something went wrong, contact support.";

/// Output token cap for yes/no classification replies
pub const YES_NO_MAX_TOKENS: u32 = 2;

/// Output token cap for single-word language detection replies
pub const LANGUAGE_MAX_TOKENS: u32 = 3;

/// Output token cap for keyword list replies
pub const KEYWORDS_MAX_TOKENS: u32 = 60;

/// Output token cap for summary replies
pub const SUMMARY_MAX_TOKENS: u32 = 250;

/// Output token cap for general chat replies
pub const CHAT_MAX_TOKENS: u32 = 1000;

/// Default sampling temperature for general chat queries
const CHAT_TEMPERATURE: f32 = 0.2;

/// Front door for chat queries and embedding generation
///
/// Holds the injected [`LlmApi`] implementation and the retry policy. Each
/// call is self-contained: the attempt counter lives on the stack and nothing
/// is shared between invocations.
pub struct Assistant {
    api: Arc<dyn LlmApi>,
    temperature: f32,
    max_tokens: u32,
    embedding_max_len: usize,
}

impl Assistant {
    /// Create an assistant with default chat settings
    pub fn new(api: Arc<dyn LlmApi>) -> Self {
        Self {
            api,
            temperature: CHAT_TEMPERATURE,
            max_tokens: CHAT_MAX_TOKENS,
            embedding_max_len: DEFAULT_MAX_INPUT_LEN,
        }
    }

    /// Create an assistant taking chat and embedding settings from `config`
    pub fn from_config(api: Arc<dyn LlmApi>, config: &Config) -> Self {
        Self {
            api,
            temperature: config.llm.temperature,
            max_tokens: config.llm.max_tokens,
            embedding_max_len: config.embedding.max_input_len,
        }
    }

    /// Override the cap applied to sanitized embedding input
    pub fn with_embedding_max_len(mut self, max_len: usize) -> Self {
        self.embedding_max_len = max_len;
        self
    }

    /// Run a chat query with the default temperature and token cap.
    ///
    /// Never fails from the caller's perspective: transient errors are retried
    /// up to [`MAX_RETRY_ATTEMPTS`] times and anything unrecoverable yields
    /// [`FALLBACK_REPLY`].
    pub async fn query(&self, messages: Vec<Message>) -> String {
        self.query_with(messages, self.temperature, self.max_tokens)
            .await
    }

    /// Run a chat query with an explicit temperature and output token cap.
    ///
    /// Callers pick the cap matching the expected answer shape; see the
    /// `*_MAX_TOKENS` constants.
    pub async fn query_with(
        &self,
        messages: Vec<Message>,
        temperature: f32,
        max_tokens: u32,
    ) -> String {
        let mut attempts = 0;

        while attempts < MAX_RETRY_ATTEMPTS {
            match self
                .api
                .complete_chat(messages.clone(), temperature, max_tokens)
                .await
            {
                Ok(reply) => return reply.trim().to_string(),
                Err(e) if e.is_transient() => {
                    error!(error = %e, "Chat completion failed");
                    attempts += 1;
                }
                Err(e) => {
                    error!(error = %e, "Server error in chat query");
                    return FALLBACK_REPLY.to_string();
                }
            }
        }

        FALLBACK_REPLY.to_string()
    }

    /// Generate an embedding for `text` and serialize it as a bracketed
    /// comma-joined literal, e.g. `[0.1,-0.2,0.33]`.
    ///
    /// The input is sanitized exactly once before the retry loop; a sanitize
    /// failure aborts without any remote call. After [`MAX_RETRY_ATTEMPTS`]
    /// transient failures the call yields [`Error::EmbeddingFailed`].
    pub async fn generate_embedding(&self, text: &str) -> Result<String> {
        let sanitized = sanitize_embedding_input(text, self.embedding_max_len)?;

        let mut attempts = 0;

        while attempts < MAX_RETRY_ATTEMPTS {
            match self.api.create_embedding(&sanitized).await {
                Ok(vector) => return Ok(embedding_literal(&vector)),
                Err(e) if e.is_transient() => {
                    error!(error = %e, "Embedding generation failed");
                    attempts += 1;
                }
                Err(e) => {
                    error!(error = %e, "Server error in embedding generation");
                    return Err(e);
                }
            }
        }

        Err(Error::EmbeddingFailed)
    }

    /// Decide whether a question is general enough to answer from a summary.
    ///
    /// Single attempt, deterministic sampling, two-token reply.
    pub async fn need_to_summarize(&self, question: &str, summary: &str) -> Result<bool> {
        let messages = vec![
            Message::system(
                "You are an assistant answering questions about a large content. \
                 You will receive a content summary and a user question. \
                 If the question is specific, meaning it asks you about a part of the content \
                 or a subject of the content, answer \"No\". \
                 If the question is general, meaning it lacks precision, asks to create content \
                 and could be answered with the summary received, answer \"Yes\". \
                 Answer strictly with \"Yes\" or \"No\".",
            ),
            Message::user(format!("Summary: \"{summary}\" Question: \"{question}\".")),
        ];

        let reply = self
            .api
            .complete_chat(messages, 0.0, YES_NO_MAX_TOKENS)
            .await?;

        Ok(reply.trim().to_lowercase().contains("yes"))
    }
}

/// Estimate the token count of a text from its byte length.
///
/// Roughly four bytes per token; good enough for prompt budget checks.
pub fn estimate_token_count(text: &str) -> usize {
    text.len() / 4
}

/// Serialize an embedding vector as `[v1,v2,...]` with no spaces.
pub fn embedding_literal(vector: &[f32]) -> String {
    let values: Vec<String> = vector.iter().map(|v| v.to_string()).collect();
    format!("[{}]", values.join(","))
}

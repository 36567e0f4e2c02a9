//! Error types for Arandu

use thiserror::Error;

/// Result type alias using Arandu's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Arandu error types
#[derive(Error, Debug)]
pub enum Error {
    // Transport errors
    #[error("Network error: {0}. Check your internet connection.")]
    Network(#[from] reqwest::Error),

    // Provider-side errors (non-success status, undecodable body)
    #[error("LLM API error: {0}")]
    Api(String),

    // The provider answered, but the payload is missing the expected content
    #[error("Unexpected response from LLM API: {0}")]
    UnexpectedResponse(String),

    // Embedding input errors
    #[error("Embedding input rejected: {0}")]
    Sanitize(String),

    #[error("Server error in embedding generation")]
    EmbeddingFailed,

    // Token errors
    #[error("Unique token generation failed after {0} attempts")]
    TokenExhausted(u32),

    // Database errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    // Config errors
    #[error("Configuration error: {0}")]
    Config(String),

    // Input errors
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether retrying the failed request may succeed.
    ///
    /// Transport failures and provider-side errors are transient; everything
    /// else is terminal. Rate limits, timeouts, and auth failures are all one
    /// class here - the retry loop does not distinguish them.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Api(_))
    }
}

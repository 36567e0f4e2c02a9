//! LLM integration - OpenAI-compatible API
//!
//! This module provides:
//! - The [`LlmApi`] trait describing the remote chat/embedding service
//! - An HTTP client for chat completions and embeddings
//! - Request/response types matching the OpenAI-compatible API

mod client;
mod types;

pub use client::{LlmApi, OpenAiClient, OpenAiClientBuilder};
pub use types::{
    ChatRequest, ChatResponse, Choice, EmbeddingData, EmbeddingRequest, EmbeddingResponse,
    EmbeddingUsage, Message, MessageRole, Usage,
};

//! Arandu Core Integration Tests

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;

use arandu_core::assistant::{Assistant, FALLBACK_REPLY, MAX_RETRY_ATTEMPTS};
use arandu_core::config::Config;
use arandu_core::error::{Error, Result};
use arandu_core::language::{DEFAULT_KEYWORD_LANGUAGE, DEFAULT_LANGUAGE, LanguageAnalyzer};
use arandu_core::llm::{LlmApi, Message};
use arandu_core::storage::Database;
use arandu_core::token::{
    MAX_TOKEN_ATTEMPTS, SqliteTokenStore, TokenStore, generate_unique_token,
};

/// Scripted stand-in for the remote API.
///
/// Pops one outcome per call and counts how many calls were made. An
/// exhausted script fails the test loudly rather than looping forever.
#[derive(Default)]
struct FakeApi {
    chat_script: Mutex<VecDeque<Result<String>>>,
    embed_script: Mutex<VecDeque<Result<Vec<f32>>>>,
    last_embed_input: Mutex<Option<String>>,
    calls: AtomicU32,
}

impl FakeApi {
    fn chat(script: Vec<Result<String>>) -> Self {
        Self {
            chat_script: Mutex::new(script.into()),
            ..Default::default()
        }
    }

    fn embeddings(script: Vec<Result<Vec<f32>>>) -> Self {
        Self {
            embed_script: Mutex::new(script.into()),
            ..Default::default()
        }
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LlmApi for FakeApi {
    async fn complete_chat(
        &self,
        _messages: Vec<Message>,
        _temperature: f32,
        _max_tokens: u32,
    ) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.chat_script
            .lock()
            .unwrap()
            .pop_front()
            .expect("chat script exhausted")
    }

    async fn create_embedding(&self, input: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_embed_input.lock().unwrap() = Some(input.to_string());
        self.embed_script
            .lock()
            .unwrap()
            .pop_front()
            .expect("embedding script exhausted")
    }
}

fn transient() -> Error {
    Error::Api("HTTP 503 Service Unavailable: upstream overloaded".to_string())
}

fn unexpected() -> Error {
    Error::UnexpectedResponse("no choices in chat completion".to_string())
}

fn hello() -> Vec<Message> {
    vec![Message::user("Hello")]
}

// --- Chat query retry behavior ---

#[tokio::test]
async fn first_attempt_success_makes_exactly_one_call() {
    let api = Arc::new(FakeApi::chat(vec![Ok("  All good.  ".to_string())]));
    let assistant = Assistant::new(api.clone());

    let reply = assistant.query(hello()).await;

    assert_eq!(reply, "All good.");
    assert_eq!(api.calls(), 1);
}

#[tokio::test]
async fn transient_failures_are_retried_until_success() {
    let api = Arc::new(FakeApi::chat(vec![
        Err(transient()),
        Err(transient()),
        Err(transient()),
        Ok("answer".to_string()),
    ]));
    let assistant = Assistant::new(api.clone());

    let reply = assistant.query(hello()).await;

    assert_eq!(reply, "answer");
    assert_eq!(api.calls(), 4);
}

#[tokio::test]
async fn retry_exhaustion_returns_fallback_after_exactly_five_calls() {
    // Script six failures; the sixth must never be reached
    let script = (0..6).map(|_| Err(transient())).collect();
    let api = Arc::new(FakeApi::chat(script));
    let assistant = Assistant::new(api.clone());

    let reply = assistant.query(hello()).await;

    assert_eq!(reply, FALLBACK_REPLY);
    assert_eq!(api.calls(), MAX_RETRY_ATTEMPTS);
}

#[tokio::test]
async fn unexpected_error_short_circuits_to_fallback() {
    let api = Arc::new(FakeApi::chat(vec![Err(unexpected())]));
    let assistant = Assistant::new(api.clone());

    let reply = assistant.query(hello()).await;

    assert_eq!(reply, FALLBACK_REPLY);
    assert_eq!(api.calls(), 1);
}

#[tokio::test]
async fn unexpected_error_after_transient_failures_stops_retrying() {
    let api = Arc::new(FakeApi::chat(vec![
        Err(transient()),
        Err(unexpected()),
    ]));
    let assistant = Assistant::new(api.clone());

    let reply = assistant.query(hello()).await;

    assert_eq!(reply, FALLBACK_REPLY);
    assert_eq!(api.calls(), 2);
}

#[tokio::test]
async fn empty_success_is_returned_as_is_without_retry() {
    let api = Arc::new(FakeApi::chat(vec![Ok("   ".to_string())]));
    let assistant = Assistant::new(api.clone());

    let reply = assistant.query(hello()).await;

    assert_eq!(reply, "");
    assert_eq!(api.calls(), 1);
}

// --- Embedding generation ---

#[tokio::test]
async fn embedding_success_serializes_vector_literal() {
    let api = Arc::new(FakeApi::embeddings(vec![Ok(vec![0.1, -0.2, 0.33])]));
    let assistant = Assistant::new(api.clone());

    let literal = assistant.generate_embedding("some text").await.unwrap();

    assert_eq!(literal, "[0.1,-0.2,0.33]");
    assert_eq!(api.calls(), 1);
}

#[tokio::test]
async fn embedding_exhaustion_raises_terminal_error() {
    let script = (0..6).map(|_| Err(transient())).collect();
    let api = Arc::new(FakeApi::embeddings(script));
    let assistant = Assistant::new(api.clone());

    let result = assistant.generate_embedding("some text").await;

    assert!(matches!(result, Err(Error::EmbeddingFailed)));
    assert_eq!(api.calls(), MAX_RETRY_ATTEMPTS);
}

#[tokio::test]
async fn embedding_unexpected_error_is_terminal_immediately() {
    let api = Arc::new(FakeApi::embeddings(vec![Err(unexpected())]));
    let assistant = Assistant::new(api.clone());

    let result = assistant.generate_embedding("some text").await;

    assert!(matches!(result, Err(Error::UnexpectedResponse(_))));
    assert_eq!(api.calls(), 1);
}

#[tokio::test]
async fn embedding_sanitize_failure_skips_remote_calls() {
    let api = Arc::new(FakeApi::embeddings(vec![Ok(vec![0.0])]));
    let assistant = Assistant::new(api.clone());

    let result = assistant.generate_embedding("\x01\x02   ").await;

    assert!(matches!(result, Err(Error::Sanitize(_))));
    assert_eq!(api.calls(), 0);
}

#[tokio::test]
async fn embedding_input_is_sanitized_before_the_request() {
    let api = Arc::new(FakeApi::embeddings(vec![Ok(vec![1.0])]));
    let assistant = Assistant::new(api.clone()).with_embedding_max_len(3);

    let literal = assistant
        .generate_embedding("  abcdef   ghi  ")
        .await
        .unwrap();

    assert_eq!(literal, "[1]");
    assert_eq!(api.calls(), 1);
    assert_eq!(
        api.last_embed_input.lock().unwrap().as_deref(),
        Some("abc")
    );
}

#[tokio::test]
async fn assistant_from_config_applies_embedding_cap() {
    let mut config = Config::default();
    config.embedding.max_input_len = 4;

    let api = Arc::new(FakeApi::embeddings(vec![Ok(vec![0.25])]));
    let assistant = Assistant::from_config(api.clone(), &config);

    let literal = assistant.generate_embedding("abcdefgh").await.unwrap();

    assert_eq!(literal, "[0.25]");
    assert_eq!(
        api.last_embed_input.lock().unwrap().as_deref(),
        Some("abcd")
    );
}

// --- Yes/no classification ---

#[tokio::test]
async fn need_to_summarize_detects_yes() {
    let api = Arc::new(FakeApi::chat(vec![Ok(" Yes. ".to_string())]));
    let assistant = Assistant::new(api.clone());

    let verdict = assistant
        .need_to_summarize("What is this about?", "A story about rivers.")
        .await
        .unwrap();

    assert!(verdict);
    assert_eq!(api.calls(), 1);
}

#[tokio::test]
async fn need_to_summarize_detects_no() {
    let api = Arc::new(FakeApi::chat(vec![Ok("No".to_string())]));
    let assistant = Assistant::new(api);

    let verdict = assistant
        .need_to_summarize("What does chapter 3 say?", "A story about rivers.")
        .await
        .unwrap();

    assert!(!verdict);
}

// --- Language helpers ---

#[tokio::test]
async fn detect_language_returns_trimmed_word() {
    let api = Arc::new(FakeApi::chat(vec![Ok(" Portuguese \n".to_string())]));
    let analyzer = LanguageAnalyzer::new(api.clone());

    let language = analyzer.detect_language("Olá, tudo bem?", DEFAULT_LANGUAGE).await;

    assert_eq!(language, "Portuguese");
    assert_eq!(api.calls(), 1);
}

#[tokio::test]
async fn detect_language_degrades_to_empty_on_failure() {
    let api = Arc::new(FakeApi::chat(vec![Err(transient())]));
    let analyzer = LanguageAnalyzer::new(api.clone());

    let language = analyzer.detect_language("Olá, tudo bem?", DEFAULT_LANGUAGE).await;

    assert_eq!(language, "");
    // A single attempt, no retry loop for detection
    assert_eq!(api.calls(), 1);
}

#[tokio::test]
async fn generate_keywords_filters_reply() {
    let api = Arc::new(FakeApi::chat(vec![Ok(
        "1. casa, 2. árvore, 3. sol!".to_string(),
    )]));
    let analyzer = LanguageAnalyzer::new(api);

    let keywords = analyzer
        .generate_keywords("texto de exemplo", DEFAULT_KEYWORD_LANGUAGE)
        .await
        .unwrap();

    assert_eq!(keywords, " casa,  árvore,  sol");
}

#[tokio::test]
async fn summarize_trims_reply() {
    let api = Arc::new(FakeApi::chat(vec![Ok(
        "\n A short summary. \n".to_string(),
    )]));
    let analyzer = LanguageAnalyzer::new(api);

    let summary = analyzer.summarize("a very long text").await.unwrap();

    assert_eq!(summary, "A short summary.");
}

#[tokio::test]
async fn summarize_propagates_errors() {
    let api = Arc::new(FakeApi::chat(vec![Err(transient())]));
    let analyzer = LanguageAnalyzer::new(api);

    let result = analyzer.summarize("a very long text").await;

    assert!(matches!(result, Err(Error::Api(_))));
}

// --- Unique token generation ---

/// Store whose answer never changes, counting uniqueness checks
struct FixedStore {
    taken: bool,
    checks: AtomicU32,
}

impl FixedStore {
    fn new(taken: bool) -> Self {
        Self {
            taken,
            checks: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl TokenStore for FixedStore {
    async fn exists(&self, _token: &str) -> Result<bool> {
        self.checks.fetch_add(1, Ordering::SeqCst);
        Ok(self.taken)
    }
}

#[tokio::test]
async fn token_generation_succeeds_on_first_unique_candidate() {
    let store = FixedStore::new(false);

    let token = generate_unique_token(&store).await.unwrap();

    assert_eq!(token.len(), 43);
    assert!(
        token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    );
    assert_eq!(store.checks.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn token_generation_gives_up_after_ten_failed_checks() {
    let store = FixedStore::new(true);

    let result = generate_unique_token(&store).await;

    assert!(matches!(result, Err(Error::TokenExhausted(_))));
    assert_eq!(store.checks.load(Ordering::SeqCst), MAX_TOKEN_ATTEMPTS);
}

#[tokio::test]
async fn token_generation_propagates_store_errors() {
    struct BrokenStore;

    #[async_trait]
    impl TokenStore for BrokenStore {
        async fn exists(&self, _token: &str) -> Result<bool> {
            Err(Error::InvalidInput("store offline".to_string()))
        }
    }

    let result = generate_unique_token(&BrokenStore).await;

    assert!(matches!(result, Err(Error::InvalidInput(_))));
}

#[tokio::test]
async fn sqlite_token_store_roundtrip() {
    let db = Database::in_memory().await.unwrap();
    let store = SqliteTokenStore::new(db.pool().clone());

    let token = generate_unique_token(&store).await.unwrap();
    assert!(!store.exists(&token).await.unwrap());

    store.insert(&token).await.unwrap();
    assert!(store.exists(&token).await.unwrap());

    // A fresh token can still be generated once one is taken
    let other = generate_unique_token(&store).await.unwrap();
    assert_ne!(token, other);
}

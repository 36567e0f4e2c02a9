//! Language-oriented prompt helpers
//!
//! Thin prompt templates over the chat API: single-word language detection,
//! keyword generation, and summarization. Each helper issues one attempt with
//! the temperature and output token cap matching its answer shape.

use std::sync::Arc;

use tracing::error;

use crate::assistant::{KEYWORDS_MAX_TOKENS, LANGUAGE_MAX_TOKENS, SUMMARY_MAX_TOKENS};
use crate::error::Result;
use crate::llm::{LlmApi, Message};

/// Language assumed when detection is unsure
pub const DEFAULT_LANGUAGE: &str = "Portuguese";

/// Language used for generated keywords when none is given
pub const DEFAULT_KEYWORD_LANGUAGE: &str = "Brazilian Portuguese";

/// Prompt helpers for working with the language of user text
pub struct LanguageAnalyzer {
    api: Arc<dyn LlmApi>,
}

impl LanguageAnalyzer {
    /// Create an analyzer over the given API
    pub fn new(api: Arc<dyn LlmApi>) -> Self {
        Self { api }
    }

    /// Detect the language of `text`, returned as a single word.
    ///
    /// `default` is the language the model falls back to when unsure.
    /// Returns an empty string when no reply can be obtained; callers treat
    /// that as "unknown" rather than an error.
    pub async fn detect_language(&self, text: &str, default: &str) -> String {
        let messages = vec![
            Message::system(format!(
                "You will receive a Text. Please respond with just one word, \
                 the language of the Text provided. If you are unsure reply with: \"{default}\"."
            )),
            Message::user(format!("Text: \"{text}\"")),
        ];

        match self
            .api
            .complete_chat(messages, 0.0, LANGUAGE_MAX_TOKENS)
            .await
        {
            Ok(reply) => reply.trim().to_string(),
            Err(e) => {
                error!(error = %e, "Language detection failed");
                String::new()
            }
        }
    }

    /// Generate up to ten comma-separated keywords for `text` in `language`.
    ///
    /// The reply is filtered down to letters, commas, and spaces before being
    /// returned.
    pub async fn generate_keywords(&self, text: &str, language: &str) -> Result<String> {
        let messages = vec![
            Message::system("You are an assistant that generates keywords from the provided Text."),
            Message::system(
                "Answer strictly with a string containing words separated by commas. \
                 No extra characters or explanations.",
            ),
            Message::system(format!("Answer strictly in {language}.")),
            Message::user(format!("Generate up to ten keywords for this text:\n\n{text}")),
        ];

        let reply = self
            .api
            .complete_chat(messages, 0.5, KEYWORDS_MAX_TOKENS)
            .await?;

        Ok(filter_keywords(reply.trim()))
    }

    /// Summarize `text` as concisely as possible.
    pub async fn summarize(&self, text: &str) -> Result<String> {
        let messages = vec![
            Message::system("You are an assistant that summarizes text."),
            Message::user(format!(
                "Summarize this text as concisely as possible:\n\n{text}"
            )),
        ];

        let reply = self
            .api
            .complete_chat(messages, 0.5, SUMMARY_MAX_TOKENS)
            .await?;

        Ok(reply.trim().to_string())
    }
}

/// Keep letters (ASCII and Latin-1 accented), commas, and spaces.
fn filter_keywords(reply: &str) -> String {
    reply
        .chars()
        .filter(|c| {
            c.is_ascii_alphabetic() || ('\u{C0}'..='\u{FF}').contains(c) || *c == ',' || *c == ' '
        })
        .collect()
}

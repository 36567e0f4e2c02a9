//! Unique token generation against a persistence layer
//!
//! Tokens are 32 random bytes, base64 URL-safe encoded without padding.
//! Uniqueness is checked through the [`TokenStore`] trait so the generator
//! stays independent of where issued tokens live.

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngCore;
use sqlx::SqlitePool;
use tracing::warn;

use crate::error::{Error, Result};

/// Number of random bytes in a generated token
const TOKEN_BYTES: usize = 32;

/// Maximum uniqueness checks before token generation gives up
pub const MAX_TOKEN_ATTEMPTS: u32 = 10;

/// Uniqueness check against wherever issued tokens are stored
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Whether `token` has already been issued.
    async fn exists(&self, token: &str) -> Result<bool>;
}

/// Generate a URL-safe token not yet present in `store`.
///
/// Gives up with [`Error::TokenExhausted`] after [`MAX_TOKEN_ATTEMPTS`]
/// failed uniqueness checks instead of looping until the keyspace
/// cooperates. Store failures propagate unchanged.
pub async fn generate_unique_token(store: &dyn TokenStore) -> Result<String> {
    for attempt in 1..=MAX_TOKEN_ATTEMPTS {
        let token = random_token();

        if !store.exists(&token).await? {
            return Ok(token);
        }

        warn!(attempt, "Generated token already exists");
    }

    Err(Error::TokenExhausted(MAX_TOKEN_ATTEMPTS))
}

fn random_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Token store backed by the `api_tokens` table
pub struct SqliteTokenStore {
    pool: SqlitePool,
}

impl SqliteTokenStore {
    /// Create a store over an existing connection pool
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Record an issued token.
    pub async fn insert(&self, token: &str) -> Result<()> {
        sqlx::query("INSERT INTO api_tokens (token) VALUES (?)")
            .bind(token)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl TokenStore for SqliteTokenStore {
    async fn exists(&self, token: &str) -> Result<bool> {
        let found: i64 =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM api_tokens WHERE token = ?)")
                .bind(token)
                .fetch_one(&self.pool)
                .await?;

        Ok(found != 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_token_shape() {
        let token = random_token();

        // 32 bytes encode to 43 base64 characters without padding
        assert_eq!(token.len(), 43);
        assert!(
            token
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        );
    }

    #[test]
    fn test_random_tokens_differ() {
        assert_ne!(random_token(), random_token());
    }
}

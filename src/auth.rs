use async_trait::async_trait;
use sha2::{Digest, Sha256};
use sqlx::SqlitePool;

use crate::db;
use crate::error::AuthError;

/// Resolves a presented credential to the identity it was issued for.
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<String, AuthError>;
}

/// Verifies tokens against the `user_tokens` table.
#[derive(Clone)]
pub struct SqliteTokenVerifier {
    pool: SqlitePool,
}

impl SqliteTokenVerifier {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TokenVerifier for SqliteTokenVerifier {
    async fn verify(&self, token: &str) -> Result<String, AuthError> {
        let token = token.strip_prefix("Bearer ").unwrap_or(token);
        let record = db::tokens::find_token(&self.pool, token)
            .await?
            .ok_or(AuthError::InvalidToken)?;

        if record.is_expired() {
            return Err(AuthError::Expired);
        }
        Ok(record.user_id)
    }
}

pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Generate a random token string.
pub fn generate_token() -> String {
    let ts = chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default();
    let random: u64 = rand::random();
    let salt: u64 = rand::random();
    format!("{ts:x}.{random:x}{salt:x}")
}

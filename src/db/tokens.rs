use chrono::{Duration, Utc};
use sqlx::SqlitePool;

use crate::auth::{generate_token, hash_token};

/// Session tokens handed out at login live this long unless stated otherwise.
pub fn default_token_ttl() -> Duration {
    Duration::minutes(30)
}

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

fn now() -> String {
    Utc::now().format(TIMESTAMP_FORMAT).to_string()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenRecord {
    pub user_id: String,
    pub expires_at: String,
}

impl TokenRecord {
    pub fn is_expired(&self) -> bool {
        self.expires_at < now()
    }
}

/// Mint a token for `user_id`. Only the hash is stored; the raw token is
/// returned once.
pub async fn issue_token(
    pool: &SqlitePool,
    user_id: &str,
    ttl: Duration,
) -> Result<String, sqlx::Error> {
    let token = generate_token();
    let expires_at = (Utc::now() + ttl).format(TIMESTAMP_FORMAT).to_string();

    sqlx::query("INSERT INTO user_tokens (token_hash, user_id, expires_at) VALUES (?, ?, ?)")
        .bind(hash_token(&token))
        .bind(user_id)
        .bind(&expires_at)
        .execute(pool)
        .await?;

    Ok(token)
}

pub async fn find_token(pool: &SqlitePool, token: &str) -> Result<Option<TokenRecord>, sqlx::Error> {
    let row = sqlx::query_as::<_, (String, String)>(
        "SELECT user_id, expires_at FROM user_tokens WHERE token_hash = ?",
    )
    .bind(hash_token(token))
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|(user_id, expires_at)| TokenRecord {
        user_id,
        expires_at,
    }))
}

/// Returns whether a token was actually removed.
pub async fn revoke_token(pool: &SqlitePool, token: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM user_tokens WHERE token_hash = ?")
        .bind(hash_token(token))
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Delete every expired token. Returns how many were removed.
pub async fn purge_expired(pool: &SqlitePool) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM user_tokens WHERE expires_at < ?")
        .bind(now())
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

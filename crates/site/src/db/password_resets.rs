//! Password reset token storage.
//!
//! Only the SHA-256 hex digest of a token is stored, so a leaked table cannot
//! be replayed against the reset endpoint.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use quill_core::UserId;

use super::RepositoryError;

pub struct PasswordResetRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> PasswordResetRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create(
        &self,
        user_id: UserId,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO password_reset (token_hash, user_id, expires_at) VALUES ($1, $2, $3)",
        )
        .bind(token_hash)
        .bind(user_id)
        .bind(expires_at)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// Whether the token is unused and unexpired.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn is_valid(&self, token_hash: &str) -> Result<bool, RepositoryError> {
        let valid: bool = sqlx::query_scalar(
            r"
            SELECT EXISTS (
                SELECT 1 FROM password_reset
                WHERE token_hash = $1 AND used_at IS NULL AND expires_at > NOW()
            )
            ",
        )
        .bind(token_hash)
        .fetch_one(self.pool)
        .await?;
        Ok(valid)
    }

    /// Mark the token used and return its owner.
    ///
    /// Returns `None` for unknown, expired, or already used tokens.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn consume(&self, token_hash: &str) -> Result<Option<UserId>, RepositoryError> {
        let user_id = sqlx::query_scalar(
            r"
            UPDATE password_reset
            SET used_at = NOW()
            WHERE token_hash = $1 AND used_at IS NULL AND expires_at > NOW()
            RETURNING user_id
            ",
        )
        .bind(token_hash)
        .fetch_optional(self.pool)
        .await?;
        Ok(user_id)
    }
}

//! Mailing list repository.

use sqlx::PgPool;

use quill_core::{Email, UserId};

use super::RepositoryError;

pub struct MailingListRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> MailingListRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Add or re-subscribe an address.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the upsert fails.
    pub async fn subscribe(
        &self,
        email: &Email,
        name: &str,
        user_id: Option<UserId>,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO mailing_list (email, name, user_id, subscribed)
            VALUES ($1, $2, $3, TRUE)
            ON CONFLICT (email) DO UPDATE
            SET subscribed = TRUE,
                name = EXCLUDED.name,
                user_id = COALESCE(EXCLUDED.user_id, mailing_list.user_id)
            ",
        )
        .bind(email)
        .bind(name)
        .bind(user_id)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// Mark an address unsubscribed. Returns `false` if it was never listed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn unsubscribe(&self, email: &Email) -> Result<bool, RepositoryError> {
        let result = sqlx::query("UPDATE mailing_list SET subscribed = FALSE WHERE email = $1")
            .bind(email)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Every subscribed address.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::DataCorruption` if a stored address no longer
    /// parses.
    pub async fn subscribed_emails(&self) -> Result<Vec<Email>, RepositoryError> {
        let rows: Vec<String> = sqlx::query_scalar(
            "SELECT email FROM mailing_list WHERE subscribed ORDER BY id ASC",
        )
        .fetch_all(self.pool)
        .await?;

        rows.iter()
            .map(|raw| {
                Email::parse(raw).map_err(|e| {
                    RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
                })
            })
            .collect()
    }
}

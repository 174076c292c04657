//! Poem request repository.

use sqlx::PgPool;
use tracing::instrument;

use quill_core::{PoemRequestId, RequestStatus};

use super::RepositoryError;
use crate::models::{NewPoemRequest, PoemRequest};

const REQUEST_COLUMNS: &str =
    "id, user_id, user_name, title, content, status, created_at, reviewed_at";

pub struct PoemRequestRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> PoemRequestRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Store a new pending request.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    #[instrument(skip(self, request), fields(user_id = %request.user_id))]
    pub async fn create(&self, request: &NewPoemRequest) -> Result<PoemRequest, RepositoryError> {
        let row = sqlx::query_as::<_, PoemRequest>(&format!(
            r"
            INSERT INTO poem_requests (user_id, user_name, title, content)
            VALUES ($1, $2, $3, $4)
            RETURNING {REQUEST_COLUMNS}
            "
        ))
        .bind(request.user_id)
        .bind(&request.user_name)
        .bind(&request.title)
        .bind(&request.content)
        .fetch_one(self.pool)
        .await?;
        Ok(row)
    }

    /// Pending requests, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn pending(&self) -> Result<Vec<PoemRequest>, RepositoryError> {
        let rows = sqlx::query_as::<_, PoemRequest>(&format!(
            r"
            SELECT {REQUEST_COLUMNS}
            FROM poem_requests
            WHERE status = 'pending'
            ORDER BY created_at ASC, id ASC
            "
        ))
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: PoemRequestId) -> Result<Option<PoemRequest>, RepositoryError> {
        let row = sqlx::query_as::<_, PoemRequest>(&format!(
            "SELECT {REQUEST_COLUMNS} FROM poem_requests WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;
        Ok(row)
    }

    /// Move a pending request to `status`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the request was already reviewed
    /// and `RepositoryError::NotFound` if it doesn't exist.
    #[instrument(skip(self))]
    pub async fn review(
        &self,
        id: PoemRequestId,
        status: RequestStatus,
    ) -> Result<PoemRequest, RepositoryError> {
        let row = sqlx::query_as::<_, PoemRequest>(&format!(
            r"
            UPDATE poem_requests
            SET status = $2, reviewed_at = NOW()
            WHERE id = $1 AND status = 'pending'
            RETURNING {REQUEST_COLUMNS}
            "
        ))
        .bind(id)
        .bind(status)
        .fetch_optional(self.pool)
        .await?;

        match row {
            Some(request) => Ok(request),
            None if self.get(id).await?.is_some() => Err(RepositoryError::Conflict(
                "request was already reviewed".to_owned(),
            )),
            None => Err(RepositoryError::NotFound),
        }
    }

    /// Put an approved request back to pending after a failed publish.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn reopen(&self, id: PoemRequestId) -> Result<(), RepositoryError> {
        sqlx::query(
            "UPDATE poem_requests SET status = 'pending', reviewed_at = NULL WHERE id = $1",
        )
        .bind(id)
        .execute(self.pool)
        .await?;
        Ok(())
    }
}

//! `PostgreSQL` comment storage.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::instrument;

use quill_core::{CommentId, PoemId};

use super::RepositoryError;
use crate::models::{Comment, NewComment};
use crate::services::comments::{CommentStore, Cursor};

const COMMENT_COLUMNS: &str =
    "id, poem_id, content, author_name, user_id, parent_id, admin_reply, created_at";

/// [`CommentStore`] backed by the `comments` table.
pub struct PgCommentStore<'a> {
    pool: &'a PgPool,
}

impl<'a> PgCommentStore<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }
}

impl CommentStore for PgCommentStore<'_> {
    #[instrument(skip(self))]
    async fn top_level_page(
        &self,
        poem_id: PoemId,
        after: Option<Cursor>,
        limit: usize,
    ) -> Result<Vec<Comment>, RepositoryError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let (after_at, after_id): (Option<DateTime<Utc>>, Option<CommentId>) =
            after.map_or((None, None), |c| (Some(c.created_at), Some(c.id)));

        let rows = sqlx::query_as::<_, Comment>(&format!(
            r"
            SELECT {COMMENT_COLUMNS}
            FROM comments
            WHERE poem_id = $1
              AND parent_id IS NULL
              AND ($2::timestamptz IS NULL OR (created_at, id) < ($2, $3::int4))
            ORDER BY created_at DESC, id DESC
            LIMIT $4
            "
        ))
        .bind(poem_id)
        .bind(after_at)
        .bind(after_id)
        .bind(limit)
        .fetch_all(self.pool)
        .await?;

        Ok(rows)
    }

    #[instrument(skip(self, parents), fields(batch = parents.len()))]
    async fn reply_counts(
        &self,
        parents: &[CommentId],
    ) -> Result<HashMap<CommentId, i64>, RepositoryError> {
        if parents.is_empty() {
            return Ok(HashMap::new());
        }

        let rows: Vec<(CommentId, i64)> = sqlx::query_as(
            r"
            SELECT parent_id, COUNT(*)
            FROM comments
            WHERE parent_id = ANY($1)
            GROUP BY parent_id
            ",
        )
        .bind(parents)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().collect())
    }

    #[instrument(skip(self))]
    async fn replies(&self, parent: CommentId) -> Result<Vec<Comment>, RepositoryError> {
        let rows = sqlx::query_as::<_, Comment>(&format!(
            r"
            SELECT {COMMENT_COLUMNS}
            FROM comments
            WHERE parent_id = $1
            ORDER BY created_at ASC, id ASC
            "
        ))
        .bind(parent)
        .fetch_all(self.pool)
        .await?;

        Ok(rows)
    }

    async fn get(&self, id: CommentId) -> Result<Option<Comment>, RepositoryError> {
        let row = sqlx::query_as::<_, Comment>(&format!(
            "SELECT {COMMENT_COLUMNS} FROM comments WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row)
    }

    #[instrument(skip(self, comment), fields(poem_id = %comment.poem_id))]
    async fn insert(&self, comment: NewComment) -> Result<Comment, RepositoryError> {
        let row = sqlx::query_as::<_, Comment>(&format!(
            r"
            INSERT INTO comments (poem_id, content, author_name, user_id, parent_id)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {COMMENT_COLUMNS}
            "
        ))
        .bind(comment.poem_id)
        .bind(&comment.content)
        .bind(&comment.author_name)
        .bind(comment.user_id)
        .bind(comment.parent_id)
        .fetch_one(self.pool)
        .await?;

        Ok(row)
    }

    #[instrument(skip(self))]
    async fn delete(&self, id: CommentId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM comments WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self))]
    async fn delete_replies(&self, parent: CommentId) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM comments WHERE parent_id = $1")
            .bind(parent)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    #[instrument(skip(self, reply))]
    async fn set_admin_reply(
        &self,
        id: CommentId,
        reply: Option<String>,
    ) -> Result<Option<Comment>, RepositoryError> {
        let row = sqlx::query_as::<_, Comment>(&format!(
            "UPDATE comments SET admin_reply = $2 WHERE id = $1 RETURNING {COMMENT_COLUMNS}"
        ))
        .bind(id)
        .bind(reply)
        .fetch_optional(self.pool)
        .await?;

        Ok(row)
    }
}

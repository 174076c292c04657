//! Persistence seam for comments.

use std::collections::HashMap;
use std::future::Future;

use quill_core::{CommentId, PoemId};

use super::Cursor;
use crate::db::RepositoryError;
use crate::models::{Comment, NewComment};

/// Storage operations needed by [`super::CommentThread`].
pub trait CommentStore: Send + Sync {
    /// Top-level comments for a poem, newest first, strictly after `after`.
    fn top_level_page(
        &self,
        poem_id: PoemId,
        after: Option<Cursor>,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<Comment>, RepositoryError>> + Send;

    /// Reply counts for the given parents in one round trip. Parents without
    /// replies may be absent from the map.
    fn reply_counts(
        &self,
        parents: &[CommentId],
    ) -> impl Future<Output = Result<HashMap<CommentId, i64>, RepositoryError>> + Send;

    /// Replies to one parent, oldest first.
    fn replies(
        &self,
        parent: CommentId,
    ) -> impl Future<Output = Result<Vec<Comment>, RepositoryError>> + Send;

    fn get(
        &self,
        id: CommentId,
    ) -> impl Future<Output = Result<Option<Comment>, RepositoryError>> + Send;

    fn insert(
        &self,
        comment: NewComment,
    ) -> impl Future<Output = Result<Comment, RepositoryError>> + Send;

    /// Returns `false` if nothing was deleted.
    fn delete(&self, id: CommentId) -> impl Future<Output = Result<bool, RepositoryError>> + Send;

    /// Delete every reply to `parent`, returning how many were removed.
    fn delete_replies(
        &self,
        parent: CommentId,
    ) -> impl Future<Output = Result<u64, RepositoryError>> + Send;

    /// Set or clear the admin reply. Returns the updated comment.
    fn set_admin_reply(
        &self,
        id: CommentId,
        reply: Option<String>,
    ) -> impl Future<Output = Result<Option<Comment>, RepositoryError>> + Send;
}

//! In-memory [`CommentStore`] for thread tests.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Duration, TimeZone, Utc};

use quill_core::{CommentId, PoemId, UserId};

use super::{CommentStore, Cursor};
use crate::db::RepositoryError;
use crate::models::{Comment, NewComment};

/// Keyset predicate: `comment` sorts strictly after `cursor`, newest first.
fn is_after(cursor: &Cursor, comment: &Comment) -> bool {
    (comment.created_at, comment.id) < (cursor.created_at, cursor.id)
}

/// Queries issued against the store so far.
#[derive(Debug, Clone, Default)]
pub struct QueryLog {
    pub top_level_queries: usize,
    pub count_queries: usize,
    pub reply_queries: HashMap<CommentId, usize>,
}

impl QueryLog {
    pub fn reply_queries_for(&self, parent: CommentId) -> usize {
        self.reply_queries.get(&parent).copied().unwrap_or(0)
    }
}

#[derive(Default)]
struct Inner {
    rows: Vec<Comment>,
    next_id: i32,
    tick: i64,
    log: QueryLog,
}

impl Inner {
    fn push(&mut self, comment: NewComment) -> Comment {
        self.next_id += 1;
        self.tick += 1;
        let row = Comment {
            id: CommentId::new(self.next_id),
            poem_id: comment.poem_id,
            content: comment.content,
            author_name: comment.author_name,
            user_id: Some(comment.user_id),
            parent_id: comment.parent_id,
            admin_reply: None,
            created_at: epoch() + Duration::seconds(self.tick),
        };
        self.rows.push(row.clone());
        row
    }
}

fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0)
        .single()
        .unwrap_or_default()
}

/// Comments held in a `Vec`, ordered the way the `PostgreSQL` store orders
/// them. Every insert gets a strictly later timestamp.
#[derive(Default)]
pub struct MemoryCommentStore {
    inner: Mutex<Inner>,
}

#[allow(clippy::unwrap_used)]
impl MemoryCommentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn log(&self) -> QueryLog {
        self.inner.lock().unwrap().log.clone()
    }

    pub fn seed_top_level(&self, poem_id: PoemId, count: usize) -> Vec<CommentId> {
        self.seed_top_level_owned(poem_id, count, UserId::new(1))
    }

    pub fn seed_top_level_owned(
        &self,
        poem_id: PoemId,
        count: usize,
        owner: UserId,
    ) -> Vec<CommentId> {
        self.seed(poem_id, None, count, owner)
    }

    pub fn seed_replies(&self, poem_id: PoemId, parent: CommentId, count: usize) -> Vec<CommentId> {
        self.seed(poem_id, Some(parent), count, UserId::new(2))
    }

    fn seed(
        &self,
        poem_id: PoemId,
        parent_id: Option<CommentId>,
        count: usize,
        owner: UserId,
    ) -> Vec<CommentId> {
        let mut inner = self.inner.lock().unwrap();
        (0..count)
            .map(|n| {
                inner
                    .push(NewComment {
                        poem_id,
                        content: format!("comment {n}"),
                        author_name: "Seeded".to_string(),
                        user_id: owner,
                        parent_id,
                    })
                    .id
            })
            .collect()
    }
}

#[allow(clippy::unwrap_used)]
impl CommentStore for MemoryCommentStore {
    async fn top_level_page(
        &self,
        poem_id: PoemId,
        after: Option<Cursor>,
        limit: usize,
    ) -> Result<Vec<Comment>, RepositoryError> {
        let mut inner = self.inner.lock().unwrap();
        inner.log.top_level_queries += 1;
        let mut page: Vec<Comment> = inner
            .rows
            .iter()
            .filter(|c| c.poem_id == poem_id && c.parent_id.is_none())
            .filter(|c| after.is_none_or(|cursor| is_after(&cursor, c)))
            .cloned()
            .collect();
        page.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        page.truncate(limit);
        Ok(page)
    }

    async fn reply_counts(
        &self,
        parents: &[CommentId],
    ) -> Result<HashMap<CommentId, i64>, RepositoryError> {
        let mut inner = self.inner.lock().unwrap();
        inner.log.count_queries += 1;
        let mut counts = HashMap::new();
        for parent in inner.rows.iter().filter_map(|c| c.parent_id) {
            if parents.contains(&parent) {
                *counts.entry(parent).or_insert(0) += 1;
            }
        }
        Ok(counts)
    }

    async fn replies(&self, parent: CommentId) -> Result<Vec<Comment>, RepositoryError> {
        let mut inner = self.inner.lock().unwrap();
        *inner.log.reply_queries.entry(parent).or_insert(0) += 1;
        let mut replies: Vec<Comment> = inner
            .rows
            .iter()
            .filter(|c| c.parent_id == Some(parent))
            .cloned()
            .collect();
        replies.sort_by_key(|c| (c.created_at, c.id));
        Ok(replies)
    }

    async fn get(&self, id: CommentId) -> Result<Option<Comment>, RepositoryError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.rows.iter().find(|c| c.id == id).cloned())
    }

    async fn insert(&self, comment: NewComment) -> Result<Comment, RepositoryError> {
        Ok(self.inner.lock().unwrap().push(comment))
    }

    async fn delete(&self, id: CommentId) -> Result<bool, RepositoryError> {
        let mut inner = self.inner.lock().unwrap();
        let before = inner.rows.len();
        inner.rows.retain(|c| c.id != id);
        Ok(inner.rows.len() < before)
    }

    async fn delete_replies(&self, parent: CommentId) -> Result<u64, RepositoryError> {
        let mut inner = self.inner.lock().unwrap();
        let before = inner.rows.len();
        inner.rows.retain(|c| c.parent_id != Some(parent));
        Ok((before - inner.rows.len()) as u64)
    }

    async fn set_admin_reply(
        &self,
        id: CommentId,
        reply: Option<String>,
    ) -> Result<Option<Comment>, RepositoryError> {
        let mut inner = self.inner.lock().unwrap();
        let Some(row) = inner.rows.iter_mut().find(|c| c.id == id) else {
            return Ok(None);
        };
        row.admin_reply = reply;
        Ok(Some(row.clone()))
    }
}

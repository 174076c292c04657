//! Comment domain types.

use chrono::{DateTime, Utc};

use quill_core::{CommentId, PoemId, UserId};

use super::{format_timestamp, non_blank};

/// A comment or reply on a poem.
///
/// Top-level comments have no `parent_id`. Replies point at a top-level
/// comment on the same poem.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Comment {
    pub id: CommentId,
    pub poem_id: PoemId,
    pub content: String,
    pub author_name: String,
    pub user_id: Option<UserId>,
    pub parent_id: Option<CommentId>,
    pub admin_reply: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Comment {
    #[must_use]
    pub const fn is_reply(&self) -> bool {
        self.parent_id.is_some()
    }

    /// The admin reply, if it has visible content.
    #[must_use]
    pub fn visible_admin_reply(&self) -> Option<&str> {
        non_blank(self.admin_reply.as_deref())
    }

    #[must_use]
    pub fn posted_label(&self) -> String {
        format_timestamp(self.created_at)
    }
}

/// A comment about to be written.
#[derive(Debug, Clone)]
pub struct NewComment {
    pub poem_id: PoemId,
    pub content: String,
    pub author_name: String,
    pub user_id: UserId,
    pub parent_id: Option<CommentId>,
}

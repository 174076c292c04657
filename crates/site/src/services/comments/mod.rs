//! Threaded comments for the poem detail page.
//!
//! Top-level comments are paged newest-first with an opaque keyset cursor.
//! Replies are one level deep, loaded lazily per parent and cached for the
//! lifetime of a [`CommentThread`]. Reply counts for a page of top-level
//! comments come from a single grouped query.
//!
//! Persistence sits behind [`CommentStore`]; the `PostgreSQL` implementation
//! lives in [`crate::db::comments`].

mod author;
mod cursor;
#[cfg(test)]
pub(crate) mod memory;
mod store;
mod thread;

use thiserror::Error;

use quill_core::{UserId, UserRole};

use crate::db::RepositoryError;

pub use author::{ANONYMOUS, AuthorProfile};
pub use cursor::Cursor;
pub use store::CommentStore;
pub use thread::{CommentPage, CommentThread};

/// Longest comment body accepted, in characters.
pub const MAX_COMMENT_CHARS: usize = 2000;

/// Errors raised by comment operations.
#[derive(Debug, Error)]
pub enum CommentError {
    #[error("comment cannot be empty")]
    EmptyContent,

    #[error("comment must be at most {MAX_COMMENT_CHARS} characters")]
    TooLong,

    #[error("invalid cursor")]
    InvalidCursor,

    #[error("comment not found")]
    NotFound,

    /// The reply target is missing, on another poem, or itself a reply.
    #[error("invalid reply target: {0}")]
    InvalidParent(&'static str),

    #[error("not allowed to modify this comment")]
    Forbidden,

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// What happens to replies when their parent is deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrphanPolicy {
    /// Replies stay in the store, reachable only by querying the old parent id.
    #[default]
    Retain,
    /// Replies are deleted together with their parent.
    Cascade,
}

impl std::str::FromStr for OrphanPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "retain" => Ok(Self::Retain),
            "cascade" => Ok(Self::Cascade),
            other => Err(format!("expected `retain` or `cascade`, got `{other}`")),
        }
    }
}

/// The user acting on a comment.
#[derive(Debug, Clone, Copy)]
pub struct Actor {
    pub user_id: UserId,
    pub role: UserRole,
}

impl Actor {
    /// Owners and admins may delete a comment.
    #[must_use]
    pub fn can_delete(&self, owner: Option<UserId>) -> bool {
        self.role.is_admin() || owner == Some(self.user_id)
    }
}

/// Trim and validate a comment body.
///
/// # Errors
///
/// Returns [`CommentError::EmptyContent`] or [`CommentError::TooLong`].
pub fn validate_content(raw: &str) -> Result<String, CommentError> {
    let content = raw.trim();
    if content.is_empty() {
        return Err(CommentError::EmptyContent);
    }
    if content.chars().count() > MAX_COMMENT_CHARS {
        return Err(CommentError::TooLong);
    }
    Ok(content.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn orphan_policy_parses_case_insensitively() {
        assert_eq!("Cascade".parse::<OrphanPolicy>(), Ok(OrphanPolicy::Cascade));
        assert_eq!(" retain ".parse::<OrphanPolicy>(), Ok(OrphanPolicy::Retain));
        assert!("tombstone".parse::<OrphanPolicy>().is_err());
    }

    #[test]
    fn owner_or_admin_may_delete() {
        let reader = Actor {
            user_id: UserId::new(1),
            role: UserRole::User,
        };
        let admin = Actor {
            user_id: UserId::new(9),
            role: UserRole::Admin,
        };
        assert!(reader.can_delete(Some(UserId::new(1))));
        assert!(!reader.can_delete(Some(UserId::new(2))));
        assert!(!reader.can_delete(None));
        assert!(admin.can_delete(Some(UserId::new(2))));
    }

    #[test]
    fn content_is_trimmed_and_bounded() {
        assert_eq!(validate_content("  lovely  ").ok().as_deref(), Some("lovely"));
        assert!(matches!(validate_content(" \n "), Err(CommentError::EmptyContent)));
        let long = "w".repeat(MAX_COMMENT_CHARS + 1);
        assert!(matches!(validate_content(&long), Err(CommentError::TooLong)));
    }
}

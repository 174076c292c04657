//! Opaque keyset cursor for top-level comment pages.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Utc};

use quill_core::CommentId;

use super::CommentError;
use crate::models::Comment;

/// Position after the last comment of a page.
///
/// Pages are ordered by `(created_at DESC, id DESC)`; the next page holds
/// everything strictly below this pair, so comments sharing a timestamp are
/// neither skipped nor repeated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor {
    pub created_at: DateTime<Utc>,
    pub id: CommentId,
}

impl Cursor {
    #[must_use]
    pub fn after(comment: &Comment) -> Self {
        Self {
            created_at: comment.created_at,
            id: comment.id,
        }
    }

    /// URL-safe token for query strings.
    #[must_use]
    pub fn encode(&self) -> String {
        let raw = format!("{}:{}", self.created_at.timestamp_micros(), self.id);
        URL_SAFE_NO_PAD.encode(raw)
    }

    /// Parse a token produced by [`Cursor::encode`].
    ///
    /// # Errors
    ///
    /// Returns [`CommentError::InvalidCursor`] for anything else.
    pub fn decode(token: &str) -> Result<Self, CommentError> {
        let bytes = URL_SAFE_NO_PAD
            .decode(token.trim())
            .map_err(|_| CommentError::InvalidCursor)?;
        let raw = String::from_utf8(bytes).map_err(|_| CommentError::InvalidCursor)?;
        let (micros, id) = raw.split_once(':').ok_or(CommentError::InvalidCursor)?;
        let micros = micros
            .parse::<i64>()
            .map_err(|_| CommentError::InvalidCursor)?;
        let created_at =
            DateTime::from_timestamp_micros(micros).ok_or(CommentError::InvalidCursor)?;
        let id = id
            .parse::<CommentId>()
            .map_err(|_| CommentError::InvalidCursor)?;
        Ok(Self { created_at, id })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn token_decodes_to_same_position() {
        let cursor = Cursor {
            created_at: Utc.timestamp_micros(1_735_000_000_123_456).unwrap(),
            id: CommentId::new(88),
        };
        assert_eq!(Cursor::decode(&cursor.encode()).unwrap(), cursor);
    }

    #[test]
    fn rejects_garbage() {
        for token in ["", "!!!", "bm9jb2xvbg", "YWJjOjEy", "MTIzOmFiYw"] {
            assert!(
                matches!(Cursor::decode(token), Err(CommentError::InvalidCursor)),
                "accepted {token:?}"
            );
        }
    }
}

//! Poem domain types.

use chrono::{DateTime, Utc};

use quill_core::{PoemId, Slug};

use super::format_timestamp;

/// Characters of poem body shown on listing cards.
pub const PREVIEW_CHARS: usize = 100;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Poem {
    pub id: PoemId,
    pub title: String,
    pub author: String,
    pub content: String,
    pub slug: Slug,
    pub posted_at: DateTime<Utc>,
    pub views: i32,
    pub likes: i32,
}

impl Poem {
    /// First [`PREVIEW_CHARS`] characters of the body, with `...` when cut.
    #[must_use]
    pub fn preview(&self) -> String {
        preview(&self.content, PREVIEW_CHARS)
    }

    #[must_use]
    pub fn posted_label(&self) -> String {
        format_timestamp(self.posted_at)
    }

    #[must_use]
    pub fn path(&self) -> String {
        format!("/poem/{}", self.slug)
    }
}

/// Title and slug only, for the sidebar and navbar search.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PoemTitle {
    pub title: String,
    pub slug: Slug,
}

/// Fields needed to publish a poem.
#[derive(Debug, Clone)]
pub struct NewPoem {
    pub title: String,
    pub author: String,
    pub content: String,
}

/// Cut `text` to at most `max` characters on a char boundary.
#[must_use]
pub fn preview(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((cut, _)) => format!("{}...", text.get(..cut).unwrap_or(text)),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_untouched() {
        assert_eq!(preview("a quiet line", 100), "a quiet line");
    }

    #[test]
    fn long_text_gets_ellipsis() {
        let body = "x".repeat(150);
        let cut = preview(&body, 100);
        assert_eq!(cut.len(), 103);
        assert!(cut.ends_with("..."));
    }

    #[test]
    fn cuts_on_char_boundary() {
        let body = "é".repeat(120);
        let cut = preview(&body, 100);
        assert_eq!(cut.chars().count(), 103);
    }
}

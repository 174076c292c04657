//! Poem submission requests.

use chrono::{DateTime, Utc};

use quill_core::{PoemRequestId, RequestStatus, UserId};

use super::format_timestamp;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PoemRequest {
    pub id: PoemRequestId,
    pub user_id: Option<UserId>,
    pub user_name: String,
    pub title: String,
    pub content: String,
    pub status: RequestStatus,
    pub created_at: DateTime<Utc>,
    pub reviewed_at: Option<DateTime<Utc>>,
}

impl PoemRequest {
    #[must_use]
    pub fn submitted_label(&self) -> String {
        format_timestamp(self.created_at)
    }
}

#[derive(Debug, Clone)]
pub struct NewPoemRequest {
    pub user_id: UserId,
    pub user_name: String,
    pub title: String,
    pub content: String,
}

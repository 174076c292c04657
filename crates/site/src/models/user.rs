//! User domain types.

use chrono::{DateTime, Utc};

use quill_core::{Email, UserId, UserRole};

use crate::services::comments::AuthorProfile;

/// A registered reader.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    pub id: UserId,
    pub email: Email,
    /// Name the user chose on signup or in their profile.
    pub name: Option<String>,
    /// Name reported by the federated identity provider.
    pub display_name: Option<String>,
    pub role: UserRole,
    pub google_subject: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl User {
    #[must_use]
    pub fn author_profile(&self) -> AuthorProfile {
        AuthorProfile {
            name: self.name.clone(),
            display_name: self.display_name.clone(),
        }
    }
}

//! Session-related types.
//!
//! Types stored in the session for authentication state.

use serde::{Deserialize, Serialize};

use quill_core::{Email, UserId, UserRole};

use super::User;

/// Session-stored user identity.
///
/// Resolved by the auth extractors before any handler renders, so a page
/// never observes a half-initialized login state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentUser {
    pub id: UserId,
    pub email: Email,
    /// Name shown in the navbar, already resolved through the author fallback.
    pub display_name: String,
    pub role: UserRole,
}

impl CurrentUser {
    #[must_use]
    pub const fn is_admin(&self) -> bool {
        self.role.is_admin()
    }
}

impl From<&User> for CurrentUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            display_name: user.author_profile().resolve(),
            role: user.role,
        }
    }
}

/// Session keys for authentication data.
pub mod keys {
    /// Key for storing the current logged-in user.
    pub const CURRENT_USER: &str = "current_user";

    /// Key for Google OAuth state (CSRF protection).
    pub const GOOGLE_OAUTH_STATE: &str = "google_oauth_state";

    /// Key for Google OAuth nonce (`OpenID` Connect replay protection).
    pub const GOOGLE_OAUTH_NONCE: &str = "google_oauth_nonce";
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;

    use super::*;

    #[test]
    fn session_user_uses_resolved_name() {
        let user = User {
            id: UserId::new(3),
            email: Email::parse("g@example.com").unwrap(),
            name: Some("   ".to_string()),
            display_name: Some("Gale".to_string()),
            role: UserRole::Admin,
            google_subject: Some("sub-1".to_string()),
            created_at: Utc::now(),
        };
        let current = CurrentUser::from(&user);
        assert_eq!(current.display_name, "Gale");
        assert!(current.is_admin());
        assert_eq!(current.id, user.id);
    }
}

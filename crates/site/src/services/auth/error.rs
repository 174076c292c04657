//! Account and credential errors.

use thiserror::Error;

use crate::db::RepositoryError;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] quill_core::EmailError),

    /// Wrong password, or no password set for a federated-only account.
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("user not found")]
    UserNotFound,

    #[error("user already exists")]
    UserAlreadyExists,

    #[error("password validation failed: {0}")]
    WeakPassword(String),

    #[error("invalid name: {0}")]
    InvalidName(String),

    /// Unknown, expired, or already consumed.
    #[error("reset link is invalid or has expired")]
    InvalidResetToken,

    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("password hashing error")]
    PasswordHash,
}

impl AuthError {
    /// Text to show next to the form that failed.
    ///
    /// `None` means the failure is ours, not the visitor's, and should surface
    /// as a server error instead. Unknown accounts read the same as a wrong
    /// password so the login form does not reveal which emails exist.
    #[must_use]
    pub fn form_message(&self) -> Option<String> {
        match self {
            Self::InvalidCredentials | Self::UserNotFound => {
                Some("Incorrect email or password.".to_string())
            }
            Self::UserAlreadyExists => {
                Some("An account with this email already exists.".to_string())
            }
            Self::InvalidEmail(_) => Some("Please enter a valid email address.".to_string()),
            Self::WeakPassword(msg) | Self::InvalidName(msg) => Some(msg.clone()),
            Self::InvalidResetToken => Some(self.to_string()),
            Self::Repository(_) | Self::PasswordHash => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_failures_have_no_form_message() {
        assert!(AuthError::PasswordHash.form_message().is_none());
        assert!(
            AuthError::Repository(RepositoryError::NotFound)
                .form_message()
                .is_none()
        );
    }

    #[test]
    fn unknown_account_reads_like_wrong_password() {
        assert_eq!(
            AuthError::UserNotFound.form_message(),
            AuthError::InvalidCredentials.form_message()
        );
        assert_eq!(
            AuthError::WeakPassword("too short".to_string())
                .form_message()
                .as_deref(),
            Some("too short")
        );
    }
}

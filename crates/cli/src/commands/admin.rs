//! Admin role management.
//!
//! Accounts are created through the site; these commands only flip the
//! role of an account that already exists.

use quill_core::{Email, UserRole};
use quill_site::db::{RepositoryError, UserRepository};
use thiserror::Error;

use super::{ConnectError, connect};

#[derive(Debug, Error)]
pub enum AdminError {
    #[error(transparent)]
    Connect(#[from] ConnectError),

    #[error("Invalid email: {0}")]
    InvalidEmail(String),

    #[error("No account with email: {0}")]
    UnknownAccount(String),

    #[error("Database error: {0}")]
    Repository(RepositoryError),
}

/// Promote an account to admin.
///
/// # Errors
///
/// Returns an error if the email is malformed or no account uses it.
pub async fn grant(email: &str) -> Result<(), AdminError> {
    set_role(email, UserRole::Admin).await
}

/// Demote an admin back to a regular user.
///
/// # Errors
///
/// Returns an error if the email is malformed or no account uses it.
pub async fn revoke(email: &str) -> Result<(), AdminError> {
    set_role(email, UserRole::User).await
}

async fn set_role(email: &str, role: UserRole) -> Result<(), AdminError> {
    let parsed = Email::parse(email).map_err(|_| AdminError::InvalidEmail(email.to_owned()))?;
    let pool = connect().await?;

    UserRepository::new(&pool)
        .set_role(&parsed, role)
        .await
        .map_err(|e| match e {
            RepositoryError::NotFound => AdminError::UnknownAccount(email.to_owned()),
            other => AdminError::Repository(other),
        })?;

    tracing::info!("{email} is now {role}");
    Ok(())
}

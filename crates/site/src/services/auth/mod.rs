//! Authentication service.
//!
//! Password accounts, Google sign-in account resolution, password reset
//! tokens, and profile maintenance.

mod error;

pub use error::AuthError;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{Duration, Utc};
use rand::RngCore;
use sha2::{Digest, Sha256};
use sqlx::PgPool;
use tracing::instrument;

use quill_core::{Email, UserId};

use crate::db::{MailingListRepository, PasswordResetRepository, RepositoryError, UserRepository};
use crate::models::User;

/// Minimum password length.
const MIN_PASSWORD_LENGTH: usize = 8;
/// Maximum password length, bounding Argon2 work per request.
const MAX_PASSWORD_LENGTH: usize = 128;
const MAX_NAME_LENGTH: usize = 80;
/// How long a reset link stays valid.
const RESET_TOKEN_TTL_MINUTES: i64 = 60;
const RESET_TOKEN_BYTES: usize = 32;

/// A Google account as reported by the userinfo endpoint.
#[derive(Debug, Clone)]
pub struct FederatedProfile {
    pub subject: String,
    pub email: Email,
    pub name: Option<String>,
}

/// Result of a Google sign-in.
#[derive(Debug)]
pub struct FederatedLogin {
    pub user: User,
    /// `true` when this sign-in created the account.
    pub created: bool,
}

/// A freshly issued reset token. Only the owner sees the plain token.
#[derive(Debug)]
pub struct ResetGrant {
    pub user: User,
    pub token: String,
}

/// Authentication service.
pub struct AuthService<'a> {
    users: UserRepository<'a>,
    mailing_list: MailingListRepository<'a>,
    resets: PasswordResetRepository<'a>,
}

impl<'a> AuthService<'a> {
    /// Create a new authentication service.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            users: UserRepository::new(pool),
            mailing_list: MailingListRepository::new(pool),
            resets: PasswordResetRepository::new(pool),
        }
    }

    // =========================================================================
    // Password Authentication
    // =========================================================================

    /// Register a new user and subscribe them to announcements.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidEmail` if the email format is invalid.
    /// Returns `AuthError::InvalidName` if the name is blank or too long.
    /// Returns `AuthError::WeakPassword` if the password doesn't meet requirements.
    /// Returns `AuthError::UserAlreadyExists` if the email is already registered.
    #[instrument(skip(self, password))]
    pub async fn register_with_password(
        &self,
        email: &str,
        name: &str,
        password: &str,
    ) -> Result<User, AuthError> {
        let email = Email::parse(email)?;
        let name = validate_name(name)?;
        validate_password(password)?;
        let password_hash = hash_password(password)?;

        let user = self
            .users
            .create_with_password(&email, name, &password_hash)
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => AuthError::UserAlreadyExists,
                other => AuthError::Repository(other),
            })?;

        self.mailing_list
            .subscribe(&user.email, name, Some(user.id))
            .await?;

        Ok(user)
    }

    /// Login with email and password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if the email/password is wrong.
    pub async fn login_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<User, AuthError> {
        let email = Email::parse(email).map_err(|_| AuthError::InvalidCredentials)?;

        let (user, password_hash) = self
            .users
            .get_password_hash(&email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        verify_password(password, &password_hash)?;

        Ok(user)
    }

    // =========================================================================
    // Google Sign-In
    // =========================================================================

    /// Resolve a Google profile to a local account.
    ///
    /// Known subjects sign straight in. An unknown subject whose email
    /// matches an existing account is linked to it. Otherwise a new account
    /// is created and subscribed to announcements.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Repository` if a database operation fails.
    #[instrument(skip(self, profile), fields(email = %profile.email))]
    pub async fn sign_in_federated(
        &self,
        profile: &FederatedProfile,
    ) -> Result<FederatedLogin, AuthError> {
        if let Some(user) = self.users.get_by_google_subject(&profile.subject).await? {
            return Ok(FederatedLogin {
                user,
                created: false,
            });
        }

        let display_name = crate::models::non_blank(profile.name.as_deref());

        if let Some(existing) = self.users.get_by_email(&profile.email).await? {
            let user = self
                .users
                .link_google(existing.id, &profile.subject, display_name)
                .await?;
            tracing::info!(user_id = %user.id, "linked google account to existing user");
            return Ok(FederatedLogin {
                user,
                created: false,
            });
        }

        let user = self
            .users
            .create_federated(&profile.email, display_name, &profile.subject)
            .await?;
        self.mailing_list
            .subscribe(&user.email, display_name.unwrap_or_default(), Some(user.id))
            .await?;

        Ok(FederatedLogin {
            user,
            created: true,
        })
    }

    // =========================================================================
    // Password Reset
    // =========================================================================

    /// Issue a reset token for `email`.
    ///
    /// Returns `None` for unknown or malformed addresses so callers can
    /// report success either way.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Repository` if a database operation fails.
    #[instrument(skip(self, email))]
    pub async fn request_password_reset(
        &self,
        email: &str,
    ) -> Result<Option<ResetGrant>, AuthError> {
        let Ok(email) = Email::parse(email) else {
            return Ok(None);
        };
        let Some(user) = self.users.get_by_email(&email).await? else {
            return Ok(None);
        };

        let token = generate_reset_token();
        let expires_at = Utc::now() + Duration::minutes(RESET_TOKEN_TTL_MINUTES);
        self.resets
            .create(user.id, &hash_reset_token(&token), expires_at)
            .await?;

        Ok(Some(ResetGrant { user, token }))
    }

    /// Whether a reset link can still be used.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Repository` if the lookup fails.
    pub async fn reset_token_is_valid(&self, token: &str) -> Result<bool, AuthError> {
        Ok(self.resets.is_valid(&hash_reset_token(token)).await?)
    }

    /// Consume a reset token and set a new password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::WeakPassword` before touching the token, and
    /// `AuthError::InvalidResetToken` if the token cannot be used.
    #[instrument(skip_all)]
    pub async fn reset_password(&self, token: &str, password: &str) -> Result<UserId, AuthError> {
        validate_password(password)?;
        let password_hash = hash_password(password)?;

        let user_id = self
            .resets
            .consume(&hash_reset_token(token))
            .await?
            .ok_or(AuthError::InvalidResetToken)?;
        self.users.set_password(user_id, &password_hash).await?;

        Ok(user_id)
    }

    // =========================================================================
    // Profile
    // =========================================================================

    /// Get a user by ID.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::UserNotFound` if the user doesn't exist.
    pub async fn get_user(&self, user_id: UserId) -> Result<User, AuthError> {
        self.users
            .get_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)
    }

    /// # Errors
    ///
    /// Returns `AuthError::InvalidName` for blank or oversized names.
    pub async fn update_name(&self, user_id: UserId, name: &str) -> Result<User, AuthError> {
        let name = validate_name(name)?;
        self.users.update_name(user_id, name).await.map_err(|e| match e {
            RepositoryError::NotFound => AuthError::UserNotFound,
            other => AuthError::Repository(other),
        })
    }

    /// # Errors
    ///
    /// Returns `AuthError::UserNotFound` if the account is already gone.
    pub async fn delete_account(&self, user_id: UserId) -> Result<(), AuthError> {
        self.users.delete(user_id).await.map_err(|e| match e {
            RepositoryError::NotFound => AuthError::UserNotFound,
            other => AuthError::Repository(other),
        })
    }
}

fn validate_password(password: &str) -> Result<(), AuthError> {
    let length = password.chars().count();
    if length < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }
    if length > MAX_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "password must be at most {MAX_PASSWORD_LENGTH} characters"
        )));
    }
    Ok(())
}

fn validate_name(name: &str) -> Result<&str, AuthError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AuthError::InvalidName("name is required".to_string()));
    }
    if name.chars().count() > MAX_NAME_LENGTH {
        return Err(AuthError::InvalidName(format!(
            "name must be at most {MAX_NAME_LENGTH} characters"
        )));
    }
    Ok(name)
}

/// Hash a password using Argon2id.
fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::PasswordHash)
}

/// Verify a password against a hash.
fn verify_password(password: &str, hash: &str) -> Result<(), AuthError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| AuthError::InvalidCredentials)?;
    let argon2 = Argon2::default();

    argon2
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AuthError::InvalidCredentials)
}

fn generate_reset_token() -> String {
    let mut bytes = [0u8; RESET_TOKEN_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Hex SHA-256 of a reset token, the form stored in `password_reset`.
fn hash_reset_token(token: &str) -> String {
    let digest = Sha256::digest(token.trim().as_bytes());
    format!("{digest:x}")
}

//! Profile page: edit display name, delete account.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::State,
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use crate::error::AppError;
use crate::filters;
use crate::middleware::{RequireAuth, clear_current_user};
use crate::models::{CurrentUser, User, session_keys};
use crate::services::auth::{AuthError, AuthService};
use crate::state::AppState;

use super::PageContext;

#[derive(Debug, Deserialize)]
pub struct ProfileForm {
    pub name: String,
}

#[derive(Template, WebTemplate)]
#[template(path = "profile.html")]
pub struct ProfileTemplate {
    pub page: PageContext,
    pub user: User,
    pub name: String,
    pub status: Option<String>,
    pub error: Option<String>,
}

/// # Errors
///
/// Returns `AppError::Auth` if the account no longer exists.
#[instrument(skip_all, fields(user_id = %current.id))]
pub async fn show(
    State(state): State<AppState>,
    page: PageContext,
    RequireAuth(current): RequireAuth,
) -> Result<impl IntoResponse, AppError> {
    let user = AuthService::new(state.pool()).get_user(current.id).await?;
    Ok(ProfileTemplate {
        page,
        name: user.name.clone().unwrap_or_default(),
        user,
        status: None,
        error: None,
    })
}

/// # Errors
///
/// Returns `AppError` for database or session failures. An invalid name
/// re-renders the form.
#[instrument(skip_all, fields(user_id = %current.id))]
pub async fn update(
    State(state): State<AppState>,
    page: PageContext,
    session: Session,
    RequireAuth(current): RequireAuth,
    Form(form): Form<ProfileForm>,
) -> Result<Response, AppError> {
    let auth = AuthService::new(state.pool());
    match auth.update_name(current.id, &form.name).await {
        Ok(user) => {
            session
                .insert(session_keys::CURRENT_USER, CurrentUser::from(&user))
                .await?;
            Ok(ProfileTemplate {
                page,
                name: user.name.clone().unwrap_or_default(),
                user,
                status: Some("SUCCESS".to_string()),
                error: None,
            }
            .into_response())
        }
        Err(AuthError::InvalidName(msg)) => {
            let user = auth.get_user(current.id).await?;
            Ok(ProfileTemplate {
                page,
                user,
                name: form.name,
                status: Some("ERROR".to_string()),
                error: Some(msg),
            }
            .into_response())
        }
        Err(e) => Err(e.into()),
    }
}

/// Remove the account, its password and its mailing-list entry.
///
/// Comments stay with their author name; their `user_id` is cleared.
///
/// # Errors
///
/// Returns `AppError` for database or session failures.
#[instrument(skip_all, fields(user_id = %current.id))]
pub async fn delete(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(current): RequireAuth,
) -> Result<Redirect, AppError> {
    AuthService::new(state.pool())
        .delete_account(current.id)
        .await?;

    if let Err(e) = state.mail().unsubscribe(&current.email).await {
        tracing::warn!(error = %e, "Failed to unsubscribe deleted account from mail service");
    }

    clear_current_user(&session).await?;
    tracing::info!("Account deleted");
    Ok(Redirect::to("/auth/login?notice=deleted"))
}

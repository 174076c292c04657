//! Password authentication handlers: login, signup, logout, password reset.
//!
//! Failed form submissions re-render the form with an inline message
//! instead of redirecting.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Path, Query, State},
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use crate::error::AppError;
use crate::filters;
use crate::middleware::{clear_current_user, set_current_user};
use crate::models::CurrentUser;
use crate::services::auth::{AuthError, AuthService};
use crate::state::AppState;

use super::{PageContext, safe_next};

// =============================================================================
// Forms and queries
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub next: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SignupForm {
    pub email: String,
    pub name: String,
    pub password: String,
    pub password_confirm: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetRequestForm {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct NewPasswordForm {
    pub password: String,
    pub password_confirm: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct LoginQuery {
    pub next: Option<String>,
    pub notice: Option<String>,
}

// =============================================================================
// Templates
// =============================================================================

#[derive(Template, WebTemplate)]
#[template(path = "auth/login.html")]
pub struct LoginTemplate {
    pub page: PageContext,
    pub next: String,
    pub email: String,
    pub error: Option<String>,
    pub notice: Option<String>,
    pub google_enabled: bool,
}

#[derive(Template, WebTemplate)]
#[template(path = "auth/signup.html")]
pub struct SignupTemplate {
    pub page: PageContext,
    pub email: String,
    pub name: String,
    pub error: Option<String>,
    pub google_enabled: bool,
}

#[derive(Template, WebTemplate)]
#[template(path = "auth/reset_request.html")]
pub struct ResetRequestTemplate {
    pub page: PageContext,
    pub sent: bool,
}

#[derive(Template, WebTemplate)]
#[template(path = "auth/reset_password.html")]
pub struct ResetPasswordTemplate {
    pub page: PageContext,
    pub token: String,
    pub valid: bool,
    pub error: Option<String>,
}

fn notice_text(code: Option<&str>) -> Option<String> {
    match code? {
        "reset" => Some("Your password was updated. Please sign in.".to_string()),
        "deleted" => Some("Your account was deleted.".to_string()),
        "google" => Some("Google sign-in failed. Please try again.".to_string()),
        _ => None,
    }
}

// =============================================================================
// Login / logout
// =============================================================================

pub async fn login_page(
    State(state): State<AppState>,
    page: PageContext,
    Query(query): Query<LoginQuery>,
) -> Response {
    if page.user.is_some() {
        return Redirect::to(safe_next(query.next.as_deref())).into_response();
    }
    LoginTemplate {
        page,
        next: safe_next(query.next.as_deref()).to_string(),
        email: String::new(),
        error: None,
        notice: notice_text(query.notice.as_deref()),
        google_enabled: state.google().is_some(),
    }
    .into_response()
}

/// # Errors
///
/// Returns `AppError` for database or session failures. Bad credentials
/// re-render the form.
#[instrument(skip(state, page, session, form), fields(email = %form.email))]
pub async fn login(
    State(state): State<AppState>,
    page: PageContext,
    session: Session,
    Form(form): Form<LoginForm>,
) -> Result<Response, AppError> {
    let next = safe_next(form.next.as_deref()).to_string();

    match AuthService::new(state.pool())
        .login_with_password(&form.email, &form.password)
        .await
    {
        Ok(user) => {
            set_current_user(&session, &CurrentUser::from(&user)).await?;
            tracing::info!(user_id = %user.id, "User signed in");
            Ok(Redirect::to(&next).into_response())
        }
        Err(e) => {
            let Some(error) = e.form_message() else {
                return Err(e.into());
            };
            tracing::debug!(error = %e, "Login rejected");
            Ok(LoginTemplate {
                page,
                next,
                email: form.email,
                error: Some(error),
                notice: None,
                google_enabled: state.google().is_some(),
            }
            .into_response())
        }
    }
}

/// # Errors
///
/// Returns `AppError::Session` if the session cannot be flushed.
pub async fn logout(session: Session) -> Result<Redirect, AppError> {
    clear_current_user(&session).await?;
    Ok(Redirect::to("/"))
}

// =============================================================================
// Signup
// =============================================================================

pub async fn signup_page(State(state): State<AppState>, page: PageContext) -> Response {
    if page.user.is_some() {
        return Redirect::to("/").into_response();
    }
    SignupTemplate {
        page,
        email: String::new(),
        name: String::new(),
        error: None,
        google_enabled: state.google().is_some(),
    }
    .into_response()
}

/// Create an account, sign in, and send a welcome email.
///
/// # Errors
///
/// Returns `AppError` for database or session failures. Validation
/// failures re-render the form.
#[instrument(skip(state, page, session, form), fields(email = %form.email))]
pub async fn signup(
    State(state): State<AppState>,
    page: PageContext,
    session: Session,
    Form(form): Form<SignupForm>,
) -> Result<Response, AppError> {
    let rerender = |page: PageContext, form: SignupForm, error: String| SignupTemplate {
        page,
        email: form.email,
        name: form.name,
        error: Some(error),
        google_enabled: state.google().is_some(),
    };

    if form.password != form.password_confirm {
        return Ok(rerender(page, form, "Passwords do not match.".to_string()).into_response());
    }

    let user = match AuthService::new(state.pool())
        .register_with_password(&form.email, &form.name, &form.password)
        .await
    {
        Ok(user) => user,
        Err(e) => {
            let Some(error) = e.form_message() else {
                return Err(e.into());
            };
            return Ok(rerender(page, form, error).into_response());
        }
    };

    let current = CurrentUser::from(&user);
    if let Err(e) = state
        .mail()
        .send_welcome(&user.email, &current.display_name)
        .await
    {
        tracing::warn!(error = %e, "Failed to send welcome email");
    }

    set_current_user(&session, &current).await?;
    tracing::info!(user_id = %user.id, "User signed up");
    Ok(Redirect::to("/").into_response())
}

// =============================================================================
// Password reset
// =============================================================================

pub async fn request_reset_page(page: PageContext) -> impl IntoResponse {
    ResetRequestTemplate { page, sent: false }
}

/// Always reports success so the form does not reveal which emails exist.
///
/// # Errors
///
/// Returns `AppError` only for database failures.
#[instrument(skip(state, page, form))]
pub async fn request_reset(
    State(state): State<AppState>,
    page: PageContext,
    Form(form): Form<ResetRequestForm>,
) -> Result<impl IntoResponse, AppError> {
    let grant = AuthService::new(state.pool())
        .request_password_reset(&form.email)
        .await?;

    if let Some(grant) = grant {
        let url = state
            .config()
            .absolute_url(&format!("/auth/reset-password/{}", grant.token));
        if let Err(e) = state
            .mail()
            .send_password_reset(&grant.user.email, &url)
            .await
        {
            tracing::warn!(error = %e, user_id = %grant.user.id, "Failed to send reset email");
        }
    }

    Ok(ResetRequestTemplate { page, sent: true })
}

/// # Errors
///
/// Returns `AppError` for database failures.
pub async fn reset_password_page(
    State(state): State<AppState>,
    page: PageContext,
    Path(token): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let valid = AuthService::new(state.pool())
        .reset_token_is_valid(&token)
        .await?;
    Ok(ResetPasswordTemplate {
        page,
        token,
        valid,
        error: None,
    })
}

/// # Errors
///
/// Returns `AppError` for database failures. Weak passwords and spent
/// tokens re-render the form.
#[instrument(skip_all)]
pub async fn reset_password(
    State(state): State<AppState>,
    page: PageContext,
    Path(token): Path<String>,
    Form(form): Form<NewPasswordForm>,
) -> Result<Response, AppError> {
    let rerender = |page: PageContext, token: String, valid: bool, error: String| {
        ResetPasswordTemplate {
            page,
            token,
            valid,
            error: Some(error),
        }
        .into_response()
    };

    if form.password != form.password_confirm {
        return Ok(rerender(page, token, true, "Passwords do not match.".to_string()));
    }

    match AuthService::new(state.pool())
        .reset_password(&token, &form.password)
        .await
    {
        Ok(user_id) => {
            tracing::info!(%user_id, "Password reset");
            Ok(Redirect::to("/auth/login?notice=reset").into_response())
        }
        Err(e) => {
            let valid = !matches!(e, AuthError::InvalidResetToken);
            let Some(error) = e.form_message() else {
                return Err(e.into());
            };
            Ok(rerender(page, token, valid, error))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notices() {
        assert!(notice_text(Some("reset")).is_some());
        assert!(notice_text(Some("bogus")).is_none());
        assert!(notice_text(None).is_none());
    }
}

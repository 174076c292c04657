//! Authentication extractors.
//!
//! The current user is read from the server-side session before a handler
//! runs. A page never renders with the login state still unresolved.

use axum::{
    extract::FromRequestParts,
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Redirect, Response},
};
use tower_sessions::Session;

use crate::db::UserRepository;
use crate::models::{CurrentUser, session_keys};
use crate::state::AppState;

/// Extractor that requires a signed-in user.
///
/// Page requests are redirected to the login page with a `next` parameter;
/// fragment requests (sent by comments.js with `HX-Request`) get a bare 401.
///
/// # Example
///
/// ```rust,ignore
/// async fn profile(RequireAuth(user): RequireAuth) -> impl IntoResponse {
///     format!("Hello, {}!", user.display_name)
/// }
/// ```
pub struct RequireAuth(pub CurrentUser);

/// Extractor for admin-only handlers.
///
/// The role is re-read from the database so a revoked admin loses access
/// without signing out.
pub struct RequireAdmin(pub CurrentUser);

/// Extractor that never rejects.
pub struct OptionalAuth(pub Option<CurrentUser>);

pub enum AuthRejection {
    RedirectToLogin(String),
    Unauthorized,
    Forbidden,
    Internal,
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        match self {
            Self::RedirectToLogin(next) => Redirect::to(&format!(
                "/auth/login?next={}",
                urlencoding::encode(&next)
            ))
            .into_response(),
            Self::Unauthorized => StatusCode::UNAUTHORIZED.into_response(),
            Self::Forbidden => (StatusCode::FORBIDDEN, "Admins only").into_response(),
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
        }
    }
}

async fn session_user(parts: &Parts) -> Option<CurrentUser> {
    let session = parts.extensions.get::<Session>()?;
    session
        .get::<CurrentUser>(session_keys::CURRENT_USER)
        .await
        .ok()
        .flatten()
}

fn is_fragment_request(parts: &Parts) -> bool {
    parts.headers.contains_key("hx-request")
}

fn login_rejection(parts: &Parts) -> AuthRejection {
    if is_fragment_request(parts) || parts.method != axum::http::Method::GET {
        AuthRejection::Unauthorized
    } else {
        let next = parts
            .uri
            .path_and_query()
            .map_or("/", axum::http::uri::PathAndQuery::as_str);
        AuthRejection::RedirectToLogin(next.to_owned())
    }
}

impl<S> FromRequestParts<S> for RequireAuth
where
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match session_user(parts).await {
            Some(user) => Ok(Self(user)),
            None => Err(login_rejection(parts)),
        }
    }
}

impl<S> FromRequestParts<S> for OptionalAuth
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(session_user(parts).await))
    }
}

impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = AuthRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Some(mut user) = session_user(parts).await else {
            return Err(login_rejection(parts));
        };

        let role = UserRepository::new(state.pool())
            .role(user.id)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Failed to re-check admin role");
                AuthRejection::Internal
            })?;

        match role {
            Some(role) if role.is_admin() => {
                user.role = role;
                Ok(Self(user))
            }
            _ => {
                tracing::warn!(user_id = %user.id, "Non-admin attempted admin action");
                Err(AuthRejection::Forbidden)
            }
        }
    }
}

/// Store the signed-in user, rotating the session ID first.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn set_current_user(
    session: &Session,
    user: &CurrentUser,
) -> Result<(), tower_sessions::session::Error> {
    session.cycle_id().await?;
    session.insert(session_keys::CURRENT_USER, user).await?;
    crate::error::set_sentry_user(&user.id, Some(user.email.as_str()));
    Ok(())
}

/// Drop everything in the session (logout).
///
/// # Errors
///
/// Returns an error if the session cannot be flushed.
pub async fn clear_current_user(session: &Session) -> Result<(), tower_sessions::session::Error> {
    session.flush().await?;
    crate::error::clear_sentry_user();
    Ok(())
}

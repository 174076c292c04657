//! Google OAuth 2.0 sign-in handlers.
//!
//! `login` stores a CSRF state and an `OpenID` nonce in the session and
//! redirects to Google. `callback` checks the state, exchanges the code,
//! and signs the user in, creating the account on first visit.

use axum::{
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
};
use rand::Rng;
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use crate::middleware::set_current_user;
use crate::models::{CurrentUser, session_keys};
use crate::services::auth::AuthService;
use crate::state::AppState;

const CALLBACK_PATH: &str = "/auth/google/callback";
const FAILURE_REDIRECT: &str = "/auth/login?notice=google";

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

/// Cryptographically secure alphanumeric string.
fn generate_random_string(length: usize) -> String {
    const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
    let mut rng = rand::rng();
    (0..length)
        .filter_map(|_| CHARSET.get(rng.random_range(0..CHARSET.len())))
        .map(|&b| char::from(b))
        .collect()
}

/// `GET /auth/google`
pub async fn login(State(state): State<AppState>, session: Session) -> Response {
    let Some(google) = state.google() else {
        return Redirect::to("/auth/login").into_response();
    };

    let oauth_state = generate_random_string(32);
    let nonce = generate_random_string(32);

    let stored = async {
        session
            .insert(session_keys::GOOGLE_OAUTH_STATE, &oauth_state)
            .await?;
        session.insert(session_keys::GOOGLE_OAUTH_NONCE, &nonce).await
    };
    if let Err(e) = stored.await {
        tracing::error!("Failed to store OAuth state in session: {}", e);
        return Redirect::to(FAILURE_REDIRECT).into_response();
    }

    let redirect_uri = state.config().absolute_url(CALLBACK_PATH);
    Redirect::to(&google.authorization_url(&redirect_uri, &oauth_state, &nonce)).into_response()
}

/// `GET /auth/google/callback`
#[instrument(skip_all)]
pub async fn callback(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<CallbackQuery>,
) -> Response {
    let Some(google) = state.google() else {
        return Redirect::to("/auth/login").into_response();
    };

    if let Some(error) = query.error {
        tracing::warn!("Google OAuth error: {}", error);
        return Redirect::to(FAILURE_REDIRECT).into_response();
    }

    let (Some(code), Some(returned_state)) = (query.code, query.state) else {
        tracing::warn!("Google OAuth callback missing code or state");
        return Redirect::to(FAILURE_REDIRECT).into_response();
    };

    let stored_state: Option<String> = session
        .remove(session_keys::GOOGLE_OAUTH_STATE)
        .await
        .ok()
        .flatten();
    let nonce: Option<String> = session
        .remove(session_keys::GOOGLE_OAUTH_NONCE)
        .await
        .ok()
        .flatten();

    let Some(nonce) = nonce.filter(|_| stored_state.as_ref() == Some(&returned_state)) else {
        tracing::warn!("Google OAuth state mismatch");
        return Redirect::to(FAILURE_REDIRECT).into_response();
    };

    let redirect_uri = state.config().absolute_url(CALLBACK_PATH);
    let profile = match google.exchange_code(&code, &redirect_uri, &nonce).await {
        Ok(profile) => profile,
        Err(e) => {
            tracing::error!("Failed to complete Google sign-in: {}", e);
            return Redirect::to(FAILURE_REDIRECT).into_response();
        }
    };

    let login = match AuthService::new(state.pool()).sign_in_federated(&profile).await {
        Ok(login) => login,
        Err(e) => {
            tracing::error!("Failed to resolve Google account: {}", e);
            return Redirect::to(FAILURE_REDIRECT).into_response();
        }
    };

    let current = CurrentUser::from(&login.user);
    if login.created {
        tracing::info!(user_id = %login.user.id, "Account created via Google");
        if let Err(e) = state
            .mail()
            .send_welcome(&login.user.email, &current.display_name)
            .await
        {
            tracing::warn!(error = %e, "Failed to send welcome email");
        }
    }

    if let Err(e) = set_current_user(&session, &current).await {
        tracing::error!("Failed to store user in session: {}", e);
        return Redirect::to(FAILURE_REDIRECT).into_response();
    }

    Redirect::to("/").into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_strings_are_alphanumeric() {
        let s = generate_random_string(32);
        assert_eq!(s.len(), 32);
        assert!(s.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(s, generate_random_string(32));
    }
}

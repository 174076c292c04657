//! HTTP route handlers for the site.
//!
//! # Route Structure
//!
//! ```text
//! GET  /                                       - Latest poems and title list
//! GET  /poem                                   - Listing (?sort=&page=)
//! GET  /poem/{slug}                            - Poem with first comment page
//! GET  /poem/{slug}/comments                   - Next comment page fragment (?cursor=)
//! POST /poem/{slug}/comments                   - Post comment or reply
//! GET  /poem/{slug}/comments/{id}/replies      - Replies fragment
//! POST /poem/{slug}/comments/{id}/delete       - Delete (owner or admin)
//! POST /poem/{slug}/comments/{id}/admin-reply  - Set or clear admin reply
//! GET  /search                                 - Search page (?q=)
//! GET  /search/suggest                         - Navbar suggestions fragment
//!
//! # Accounts
//! GET  /auth/login, /auth/signup               - Forms
//! POST /auth/login, /auth/signup, /auth/logout
//! GET  /auth/google, /auth/google/callback     - Google OAuth
//! GET  /auth/reset-password[/{token}]          - Reset request and new password forms
//! POST /auth/reset-password[/{token}]
//! GET  /profile, POST /profile, POST /profile/delete
//!
//! # Requests
//! GET  /submit-poem-request, POST /submit-poem-request
//! GET  /admin/requests
//! POST /admin/requests/{id}/approve, /admin/requests/{id}/reject
//!
//! # Other
//! GET  /unsubscribe?email=
//! GET  /contact, POST /contact
//! GET  /about, /everything-about-project
//! ```

pub mod admin;
pub mod auth;
pub mod comments;
pub mod contact;
pub mod google_auth;
pub mod home;
pub mod pages;
pub mod poems;
pub mod profile;
pub mod requests;
pub mod search;
pub mod unsubscribe;

use axum::{
    Router,
    extract::FromRequestParts,
    http::request::Parts,
    routing::{get, post},
};

use crate::middleware::{
    CspNonce, OptionalAuth, auth_rate_limiter, comment_rate_limiter,
};
use crate::models::CurrentUser;
use crate::state::AppState;

/// What every full page needs for the navbar and inline scripts.
pub struct PageContext {
    pub user: Option<CurrentUser>,
    pub nonce: String,
}

impl PageContext {
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.user.as_ref().is_some_and(CurrentUser::is_admin)
    }
}

impl<S> FromRequestParts<S> for PageContext
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let OptionalAuth(user) = OptionalAuth::from_request_parts(parts, state).await?;
        let nonce = CspNonce::from_request_parts(parts, state).await?;
        Ok(Self {
            user,
            nonce: nonce.0,
        })
    }
}

/// Only local paths may be used as a post-login destination.
#[must_use]
pub fn safe_next(next: Option<&str>) -> &str {
    match next {
        Some(path) if path.starts_with('/') && !path.starts_with("//") && !path.contains('\\') => {
            path
        }
        _ => "/",
    }
}

fn poem_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(poems::index))
        .route("/{slug}", get(poems::show))
        .route("/{slug}/comments", get(comments::more))
        .route("/{slug}/comments/{id}/replies", get(comments::replies))
}

fn comment_write_routes() -> Router<AppState> {
    Router::new()
        .route("/{slug}/comments", post(comments::create))
        .route("/{slug}/comments/{id}/delete", post(comments::delete))
        .route("/{slug}/comments/{id}/admin-reply", post(comments::admin_reply))
        .layer(comment_rate_limiter())
}

fn auth_routes() -> Router<AppState> {
    let limited = Router::new()
        .route("/login", post(auth::login))
        .route("/signup", post(auth::signup))
        .route("/reset-password", post(auth::request_reset))
        .route("/reset-password/{token}", post(auth::reset_password))
        .layer(auth_rate_limiter());

    Router::new()
        .route("/login", get(auth::login_page))
        .route("/signup", get(auth::signup_page))
        .route("/logout", post(auth::logout))
        .route("/reset-password", get(auth::request_reset_page))
        .route("/reset-password/{token}", get(auth::reset_password_page))
        .route("/google", get(google_auth::login))
        .route("/google/callback", get(google_auth::callback))
        .merge(limited)
}

fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/requests", get(admin::requests))
        .route("/requests/{id}/approve", post(admin::approve))
        .route("/requests/{id}/reject", post(admin::reject))
}

/// All routes for the site.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(home::home))
        .nest("/poem", poem_routes().merge(comment_write_routes()))
        .route("/search", get(search::search_page))
        .route("/search/suggest", get(search::suggest))
        .nest("/auth", auth_routes())
        .route("/profile", get(profile::show).post(profile::update))
        .route("/profile/delete", post(profile::delete))
        .route("/submit-poem-request", get(requests::form))
        .nest("/admin", admin_routes())
        .route("/unsubscribe", get(unsubscribe::unsubscribe))
        .route("/contact", get(contact::form))
        .route("/about", get(pages::about))
        .route("/everything-about-project", get(pages::everything_about_project))
        .merge(limited_form_routes())
}

fn limited_form_routes() -> Router<AppState> {
    Router::new()
        .route("/submit-poem-request", post(requests::submit))
        .layer(comment_rate_limiter())
        .merge(
            Router::new()
                .route("/contact", post(contact::submit))
                .layer(auth_rate_limiter()),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_must_be_local() {
        assert_eq!(safe_next(Some("/poem/ode?x=1")), "/poem/ode?x=1");
        assert_eq!(safe_next(Some("https://evil.example")), "/");
        assert_eq!(safe_next(Some("//evil.example")), "/");
        assert_eq!(safe_next(Some("/\\evil.example")), "/");
        assert_eq!(safe_next(None), "/");
    }
}

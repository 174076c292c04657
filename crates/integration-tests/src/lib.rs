//! Integration tests for Quill.
//!
//! Every test talks HTTP to a running site and is `#[ignore]`d by default.
//!
//! # Running Tests
//!
//! ```bash
//! quill migrate && quill seed
//! cargo run -p quill-site &
//! QUILL_BASE_URL=http://localhost:3000 cargo test -p quill-integration-tests -- --ignored
//! ```

#![allow(clippy::missing_panics_doc, clippy::expect_used)]

use reqwest::{Client, StatusCode, redirect::Policy};

/// Base URL of the site under test.
#[must_use]
pub fn base_url() -> String {
    std::env::var("QUILL_BASE_URL").unwrap_or_else(|_| "http://localhost:3000".to_string())
}

/// Client that keeps cookies and does not follow redirects, so tests can
/// assert on `Location`.
#[must_use]
pub fn client() -> Client {
    Client::builder()
        .cookie_store(true)
        .redirect(Policy::none())
        .build()
        .expect("Failed to create HTTP client")
}

/// A fresh, unique email address for a throwaway account.
#[must_use]
pub fn unique_email() -> String {
    format!("it-{}@example.com", uuid::Uuid::new_v4().simple())
}

/// Sign up a new account; the client's cookie jar holds its session.
pub async fn signed_in_client(name: &str) -> (Client, String) {
    let client = client();
    let email = unique_email();
    let resp = client
        .post(format!("{}/auth/signup", base_url()))
        .form(&[
            ("email", email.as_str()),
            ("name", name),
            ("password", "correct horse battery staple"),
            ("password_confirm", "correct horse battery staple"),
        ])
        .send()
        .await
        .expect("Failed to sign up");
    assert_eq!(resp.status(), StatusCode::SEE_OTHER, "signup should redirect");
    (client, email)
}

/// Slug of the first poem linked from the listing page.
pub async fn first_poem_slug(client: &Client) -> String {
    let body = client
        .get(format!("{}/poem", base_url()))
        .send()
        .await
        .expect("Failed to load listing")
        .text()
        .await
        .expect("Failed to read listing");
    let start = body
        .find("href=\"/poem/")
        .map(|i| i + "href=\"/poem/".len())
        .expect("listing should link at least one poem (run `quill seed`)");
    body.get(start..)
        .and_then(|rest| rest.split('"').next())
        .map(str::to_owned)
        .expect("unterminated poem link")
}

/// `Location` header of a redirect response.
#[must_use]
pub fn location(resp: &reqwest::Response) -> String {
    resp.headers()
        .get(reqwest::header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_owned()
}

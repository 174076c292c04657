//! Google OAuth 2.0 / OpenID Connect client.
//!
//! Authorization-code flow: the site redirects to Google with a random
//! `state` and `nonce`, exchanges the returned code at the token endpoint,
//! checks the ID token's `nonce` and `aud`, then reads the profile from the
//! userinfo endpoint.

use std::sync::Arc;
use std::time::Duration;

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;
use tracing::instrument;

use quill_core::Email;

use crate::config::GoogleOAuthConfig;
use crate::services::auth::FederatedProfile;

const AUTHORIZE_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const USERINFO_URL: &str = "https://openidconnect.googleapis.com/v1/userinfo";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum GoogleAuthError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Token or userinfo endpoint returned an error.
    #[error("OAuth error: {0}")]
    OAuth(String),

    /// ID token could not be decoded or failed a claim check.
    #[error("invalid ID token: {0}")]
    InvalidIdToken(String),

    /// Google has not verified the account's email address.
    #[error("email address is not verified")]
    UnverifiedEmail,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    id_token: String,
}

#[derive(Debug, Deserialize)]
struct IdTokenClaims {
    aud: String,
    nonce: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UserInfo {
    sub: String,
    email: String,
    #[serde(default)]
    email_verified: bool,
    name: Option<String>,
}

/// Google sign-in client.
#[derive(Clone)]
pub struct GoogleClient {
    inner: Arc<GoogleClientInner>,
}

struct GoogleClientInner {
    client: reqwest::Client,
    client_id: String,
    client_secret: SecretString,
}

impl GoogleClient {
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &GoogleOAuthConfig) -> Result<Self, GoogleAuthError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            inner: Arc::new(GoogleClientInner {
                client,
                client_id: config.client_id.clone(),
                client_secret: config.client_secret.clone(),
            }),
        })
    }

    /// Build the authorization URL for the login redirect.
    #[must_use]
    pub fn authorization_url(&self, redirect_uri: &str, state: &str, nonce: &str) -> String {
        format!(
            "{AUTHORIZE_URL}?\
            client_id={}&\
            response_type=code&\
            redirect_uri={}&\
            scope=openid%20email%20profile&\
            state={}&\
            nonce={}&\
            prompt=select_account",
            urlencoding::encode(&self.inner.client_id),
            urlencoding::encode(redirect_uri),
            urlencoding::encode(state),
            urlencoding::encode(nonce)
        )
    }

    /// Exchange an authorization code and return the verified profile.
    ///
    /// # Errors
    ///
    /// Returns `GoogleAuthError::OAuth` if an endpoint rejects the request,
    /// `GoogleAuthError::InvalidIdToken` on a nonce or audience mismatch, and
    /// `GoogleAuthError::UnverifiedEmail` for unverified addresses.
    #[instrument(skip_all)]
    pub async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
        expected_nonce: &str,
    ) -> Result<FederatedProfile, GoogleAuthError> {
        let params = [
            ("grant_type", "authorization_code"),
            ("client_id", self.inner.client_id.as_str()),
            ("client_secret", self.inner.client_secret.expose_secret()),
            ("code", code),
            ("redirect_uri", redirect_uri),
        ];

        let response = self.inner.client.post(TOKEN_URL).form(&params).send().await?;
        if !response.status().is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(GoogleAuthError::OAuth(format!(
                "Token exchange failed: {text}"
            )));
        }
        let tokens: TokenResponse = response.json().await?;

        let claims = decode_id_token(&tokens.id_token)?;
        check_claims(&claims, &self.inner.client_id, expected_nonce)?;

        let info = self.fetch_userinfo(&tokens.access_token).await?;
        into_profile(info)
    }

    async fn fetch_userinfo(&self, access_token: &str) -> Result<UserInfo, GoogleAuthError> {
        let response = self
            .inner
            .client
            .get(USERINFO_URL)
            .bearer_auth(access_token)
            .send()
            .await?;
        if !response.status().is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(GoogleAuthError::OAuth(format!("Userinfo failed: {text}")));
        }
        Ok(response.json().await?)
    }
}

/// Decode the payload segment of a JWT.
///
/// The token comes straight from Google's token endpoint over TLS, so only
/// the claims are checked, not the signature.
fn decode_id_token(token: &str) -> Result<IdTokenClaims, GoogleAuthError> {
    let payload = token
        .split('.')
        .nth(1)
        .ok_or_else(|| GoogleAuthError::InvalidIdToken("not a JWT".to_string()))?;
    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|e| GoogleAuthError::InvalidIdToken(e.to_string()))?;
    serde_json::from_slice(&bytes).map_err(|e| GoogleAuthError::InvalidIdToken(e.to_string()))
}

fn check_claims(
    claims: &IdTokenClaims,
    client_id: &str,
    expected_nonce: &str,
) -> Result<(), GoogleAuthError> {
    if claims.aud != client_id {
        return Err(GoogleAuthError::InvalidIdToken("audience mismatch".to_string()));
    }
    if claims.nonce.as_deref() != Some(expected_nonce) {
        return Err(GoogleAuthError::InvalidIdToken("nonce mismatch".to_string()));
    }
    Ok(())
}

fn into_profile(info: UserInfo) -> Result<FederatedProfile, GoogleAuthError> {
    if !info.email_verified {
        return Err(GoogleAuthError::UnverifiedEmail);
    }
    let email = Email::parse(&info.email)
        .map_err(|e| GoogleAuthError::OAuth(format!("unusable email: {e}")))?;
    Ok(FederatedProfile {
        subject: info.sub,
        email,
        name: info.name,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn jwt(payload: &serde_json::Value) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256"}"#);
        let body = URL_SAFE_NO_PAD.encode(payload.to_string());
        format!("{header}.{body}.signature")
    }

    fn client() -> GoogleClient {
        GoogleClient::new(&GoogleOAuthConfig {
            client_id: "client id".to_string(),
            client_secret: SecretString::from("s3cr3t"),
        })
        .unwrap()
    }

    #[test]
    fn authorization_url_encodes_parameters() {
        let url = client().authorization_url(
            "http://localhost:3000/auth/google/callback",
            "st ate",
            "n0nce",
        );
        assert!(url.starts_with(AUTHORIZE_URL));
        assert!(url.contains("client_id=client%20id"));
        assert!(url.contains("redirect_uri=http%3A%2F%2Flocalhost%3A3000%2Fauth%2Fgoogle%2Fcallback"));
        assert!(url.contains("state=st%20ate"));
        assert!(url.contains("nonce=n0nce"));
        assert!(url.contains("scope=openid%20email%20profile"));
    }

    #[test]
    fn id_token_claims_are_checked() {
        let token = jwt(&serde_json::json!({"aud": "cid", "nonce": "abc", "sub": "1"}));
        let claims = decode_id_token(&token).unwrap();
        assert!(check_claims(&claims, "cid", "abc").is_ok());
        assert!(check_claims(&claims, "other", "abc").is_err());
        assert!(check_claims(&claims, "cid", "xyz").is_err());

        assert!(decode_id_token("garbage").is_err());
        assert!(decode_id_token("a.!!!.c").is_err());
    }

    #[test]
    fn unverified_email_is_refused() {
        let info = UserInfo {
            sub: "42".to_string(),
            email: "poet@poems.test".to_string(),
            email_verified: false,
            name: Some("Poet".to_string()),
        };
        assert!(matches!(into_profile(info), Err(GoogleAuthError::UnverifiedEmail)));

        let verified = UserInfo {
            sub: "42".to_string(),
            email: "Poet@Poems.test".to_string(),
            email_verified: true,
            name: None,
        };
        let profile = into_profile(verified).unwrap();
        assert_eq!(profile.email.as_str(), "poet@poems.test");
        assert_eq!(profile.subject, "42");
    }
}

//! Client for the external transactional mail service.
//!
//! The service owns templates and delivery; the site only posts JSON to its
//! `/api/*` endpoints. Nothing is retried here.

use std::time::Duration;

use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use secrecy::ExposeSecret;
use serde::Serialize;
use thiserror::Error;
use tracing::instrument;

use quill_core::Email;

use crate::config::MailServiceConfig;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors that can occur when calling the mail service.
#[derive(Debug, Error)]
pub enum MailError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Service returned a non-success status.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Client could not be configured.
    #[error("configuration error: {0}")]
    Config(String),
}

#[derive(Debug, Serialize)]
struct WelcomeEmail<'a> {
    email: &'a str,
    name: &'a str,
}

#[derive(Debug, Serialize)]
struct ApprovalEmail<'a> {
    email: &'a str,
    name: &'a str,
    title: &'a str,
}

#[derive(Debug, Serialize)]
struct Announcement<'a> {
    emails: Vec<&'a str>,
    title: &'a str,
    slug: &'a str,
    url: &'a str,
}

#[derive(Debug, Serialize)]
struct PasswordResetEmail<'a> {
    email: &'a str,
    url: &'a str,
}

#[derive(Debug, Serialize)]
struct Unsubscribe<'a> {
    email: &'a str,
}

/// Mail service API client.
#[derive(Clone)]
pub struct MailClient {
    client: reqwest::Client,
    base_url: String,
}

impl MailClient {
    /// Create a new mail service client.
    ///
    /// # Errors
    ///
    /// Returns error if the API key is not a valid header value or the HTTP
    /// client fails to build.
    pub fn new(config: &MailServiceConfig) -> Result<Self, MailError> {
        let mut headers = HeaderMap::new();
        if let Some(key) = &config.api_key {
            let value = HeaderValue::from_str(&format!("Bearer {}", key.expose_secret()))
                .map_err(|e| MailError::Config(format!("invalid API key format: {e}")))?;
            headers.insert(AUTHORIZATION, value);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/api/{path}", self.base_url)
    }

    async fn post<T: Serialize + Sync>(&self, path: &str, body: &T) -> Result<(), MailError> {
        let response = self
            .client
            .post(self.endpoint(path))
            .json(body)
            .send()
            .await?;
        let status = response.status();

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(MailError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(())
    }

    /// # Errors
    ///
    /// Returns error if the request fails or the service rejects it.
    #[instrument(skip(self, name), fields(email = %email))]
    pub async fn send_welcome(&self, email: &Email, name: &str) -> Result<(), MailError> {
        self.post(
            "send-welcome-email",
            &WelcomeEmail {
                email: email.as_str(),
                name,
            },
        )
        .await
    }

    /// Tell a submitter their poem was published.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the service rejects it.
    #[instrument(skip(self, name), fields(email = %email))]
    pub async fn send_approval(
        &self,
        email: &Email,
        name: &str,
        title: &str,
    ) -> Result<(), MailError> {
        self.post(
            "send-approval-email",
            &ApprovalEmail {
                email: email.as_str(),
                name,
                title,
            },
        )
        .await
    }

    /// Announce a newly published poem to every subscriber in one request.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the service rejects it.
    #[instrument(skip(self, emails), fields(recipients = emails.len()))]
    pub async fn send_announcement(
        &self,
        emails: &[Email],
        title: &str,
        slug: &str,
        url: &str,
    ) -> Result<(), MailError> {
        if emails.is_empty() {
            return Ok(());
        }
        self.post(
            "send-announcement",
            &Announcement {
                emails: emails.iter().map(Email::as_str).collect(),
                title,
                slug,
                url,
            },
        )
        .await
    }

    /// # Errors
    ///
    /// Returns error if the request fails or the service rejects it.
    #[instrument(skip(self, url), fields(email = %email))]
    pub async fn send_password_reset(&self, email: &Email, url: &str) -> Result<(), MailError> {
        self.post(
            "send-password-reset",
            &PasswordResetEmail {
                email: email.as_str(),
                url,
            },
        )
        .await
    }

    /// Remove an address from the service's own audience.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the service rejects it.
    #[instrument(skip(self), fields(email = %email))]
    pub async fn unsubscribe(&self, email: &Email) -> Result<(), MailError> {
        self.post(
            "unsubscribe",
            &Unsubscribe {
                email: email.as_str(),
            },
        )
        .await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use secrecy::SecretString;

    use super::*;

    fn client(base_url: &str) -> MailClient {
        MailClient::new(&MailServiceConfig {
            base_url: base_url.to_string(),
            api_key: Some(SecretString::from("mail-key")),
        })
        .unwrap()
    }

    #[test]
    fn endpoints_join_without_double_slash() {
        let mail = client("http://mail.local/");
        assert_eq!(
            mail.endpoint("send-welcome-email"),
            "http://mail.local/api/send-welcome-email"
        );
    }

    #[test]
    fn rejects_unprintable_api_key() {
        let result = MailClient::new(&MailServiceConfig {
            base_url: "http://mail.local".to_string(),
            api_key: Some(SecretString::from("bad\nkey")),
        });
        assert!(matches!(result, Err(MailError::Config(_))));
    }

    #[test]
    fn announcement_payload_lists_every_recipient() {
        let a = Email::parse("a@poems.test").unwrap();
        let b = Email::parse("b@poems.test").unwrap();
        let body = Announcement {
            emails: [&a, &b].into_iter().map(Email::as_str).collect(),
            title: "tide",
            slug: "tide",
            url: "http://localhost:3000/poem/tide",
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["emails"], serde_json::json!(["a@poems.test", "b@poems.test"]));
        assert_eq!(json["url"], "http://localhost:3000/poem/tide");
    }

    #[tokio::test]
    async fn empty_announcement_is_a_no_op() {
        let mail = client("http://127.0.0.1:9");
        assert!(
            mail.send_announcement(&[], "tide", "tide", "http://x/poem/tide")
                .await
                .is_ok()
        );
    }
}

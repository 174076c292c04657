//! Contact form relay.
//!
//! Submissions are forwarded as JSON to a hosted form endpoint, which
//! answers `{"success": bool, "message": "..."}`.

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::instrument;

use quill_core::Email;

use crate::config::ContactFormConfig;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const MAX_MESSAGE_CHARS: usize = 5000;
const SUBJECT: &str = "New message from the Quill contact form";

#[derive(Debug, Error)]
pub enum ContactError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Endpoint answered but reported failure.
    #[error("form endpoint rejected the submission: {0}")]
    Rejected(String),

    /// Submission failed local validation.
    #[error("{0}")]
    Invalid(String),
}

/// A validated contact form submission.
#[derive(Debug, Clone)]
pub struct ContactMessage {
    pub name: String,
    pub email: Email,
    pub message: String,
}

impl ContactMessage {
    /// Validate raw form fields.
    ///
    /// # Errors
    ///
    /// Returns `ContactError::Invalid` when a field is missing or malformed.
    pub fn parse(name: &str, email: &str, message: &str) -> Result<Self, ContactError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ContactError::Invalid("name is required".to_string()));
        }
        let email =
            Email::parse(email).map_err(|e| ContactError::Invalid(format!("email: {e}")))?;
        let message = message.trim();
        if message.is_empty() {
            return Err(ContactError::Invalid("message is required".to_string()));
        }
        if message.chars().count() > MAX_MESSAGE_CHARS {
            return Err(ContactError::Invalid(format!(
                "message must be at most {MAX_MESSAGE_CHARS} characters"
            )));
        }
        Ok(Self {
            name: name.to_string(),
            email,
            message: message.to_string(),
        })
    }
}

#[derive(Serialize)]
struct Submission<'a> {
    access_key: &'a str,
    name: &'a str,
    email: &'a str,
    message: &'a str,
    subject: &'a str,
}

#[derive(Deserialize)]
struct SubmissionResponse {
    success: bool,
    #[serde(default)]
    message: String,
}

#[derive(Clone)]
pub struct ContactClient {
    client: reqwest::Client,
    endpoint: String,
    access_key: SecretString,
}

impl ContactClient {
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &ContactFormConfig) -> Result<Self, ContactError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            access_key: config.access_key.clone(),
        })
    }

    /// Relay one message.
    ///
    /// # Errors
    ///
    /// Returns `ContactError::Rejected` when the endpoint reports failure,
    /// including non-JSON error pages.
    #[instrument(skip(self, message), fields(email = %message.email))]
    pub async fn submit(&self, message: &ContactMessage) -> Result<(), ContactError> {
        let body = Submission {
            access_key: self.access_key.expose_secret(),
            name: &message.name,
            email: message.email.as_str(),
            message: &message.message,
            subject: SUBJECT,
        };

        let response = self.client.post(&self.endpoint).json(&body).send().await?;
        let status = response.status();
        let text = response.text().await?;
        interpret_response(status.as_u16(), &text)
    }
}

fn interpret_response(status: u16, body: &str) -> Result<(), ContactError> {
    match serde_json::from_str::<SubmissionResponse>(body) {
        Ok(parsed) if parsed.success => Ok(()),
        Ok(parsed) => Err(ContactError::Rejected(parsed.message)),
        Err(_) => Err(ContactError::Rejected(format!("unexpected response (status {status})"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_trims_and_validates() {
        let msg = ContactMessage::parse(" Lin ", "LIN@Poems.test", "  hello  ");
        let msg = msg.ok();
        assert_eq!(msg.as_ref().map(|m| m.name.as_str()), Some("Lin"));
        assert_eq!(msg.as_ref().map(|m| m.email.as_str()), Some("lin@poems.test"));
        assert_eq!(msg.as_ref().map(|m| m.message.as_str()), Some("hello"));

        assert!(ContactMessage::parse("", "a@b.test", "hi").is_err());
        assert!(ContactMessage::parse("Lin", "nope", "hi").is_err());
        assert!(ContactMessage::parse("Lin", "a@b.test", "   ").is_err());
    }

    #[test]
    fn success_flag_decides_outcome() {
        assert!(interpret_response(200, r#"{"success":true,"message":"ok"}"#).is_ok());
        assert!(matches!(
            interpret_response(200, r#"{"success":false,"message":"bad key"}"#),
            Err(ContactError::Rejected(m)) if m == "bad key"
        ));
        assert!(matches!(
            interpret_response(502, "<html>Bad Gateway</html>"),
            Err(ContactError::Rejected(_))
        ));
    }
}

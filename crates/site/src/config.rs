//! Site configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `QUILL_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `QUILL_BASE_URL` - Public URL of the site, used for share links and OAuth redirects
//! - `QUILL_SESSION_SECRET` - Session signing secret (min 32 chars, high entropy)
//! - `MAIL_SERVICE_URL` - Base URL of the transactional mail service
//! - `CONTACT_FORM_URL` - Form-submission endpoint for the contact page
//! - `CONTACT_ACCESS_KEY` - Access key sent with every contact submission
//!
//! ## Optional
//! - `QUILL_HOST` - Bind address (default: 127.0.0.1)
//! - `QUILL_PORT` - Listen port (default: 3000)
//! - `QUILL_CONTENT_DIR` - Markdown pages directory (default: crates/site/content)
//! - `QUILL_STATIC_DIR` - Static assets directory (default: crates/site/static)
//! - `MAIL_SERVICE_API_KEY` - Bearer token for the mail service
//! - `GOOGLE_CLIENT_ID` / `GOOGLE_CLIENT_SECRET` - Enables Google sign-in (both or neither)
//! - `COMMENTS_PAGE_SIZE` - Top-level comments per page (default: 50)
//! - `COMMENT_ORPHAN_POLICY` - `retain` or `cascade` (default: retain)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment tag
//! - `SENTRY_SAMPLE_RATE` / `SENTRY_TRACES_SAMPLE_RATE` - Sentry sampling (0.0 - 1.0)

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

use crate::services::comments::OrphanPolicy;

const MIN_SESSION_SECRET_LENGTH: usize = 32;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;
const DEFAULT_COMMENTS_PAGE_SIZE: usize = 50;
const MAX_COMMENTS_PAGE_SIZE: usize = 200;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Site application configuration.
#[derive(Debug, Clone)]
pub struct SiteConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    pub host: IpAddr,
    pub port: u16,
    /// Public base URL, without trailing slash
    pub base_url: String,
    pub session_secret: SecretString,
    pub content_dir: PathBuf,
    pub static_dir: PathBuf,
    pub mail: MailServiceConfig,
    pub contact: ContactFormConfig,
    /// `None` when Google sign-in is not configured
    pub google: Option<GoogleOAuthConfig>,
    pub comments: CommentsConfig,
    pub sentry_dsn: Option<String>,
    pub sentry_environment: Option<String>,
    pub sentry_sample_rate: f32,
    pub sentry_traces_sample_rate: f32,
}

/// Transactional mail service configuration.
#[derive(Clone)]
pub struct MailServiceConfig {
    pub base_url: String,
    pub api_key: Option<SecretString>,
}

impl std::fmt::Debug for MailServiceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MailServiceConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// Contact form relay configuration.
#[derive(Clone)]
pub struct ContactFormConfig {
    pub endpoint: String,
    pub access_key: SecretString,
}

impl std::fmt::Debug for ContactFormConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContactFormConfig")
            .field("endpoint", &self.endpoint)
            .field("access_key", &"[REDACTED]")
            .finish()
    }
}

/// Google OAuth client credentials.
#[derive(Clone)]
pub struct GoogleOAuthConfig {
    pub client_id: String,
    pub client_secret: SecretString,
}

impl std::fmt::Debug for GoogleOAuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoogleOAuthConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .finish()
    }
}

/// Comment thread behavior.
#[derive(Debug, Clone, Copy)]
pub struct CommentsConfig {
    pub page_size: usize,
    pub orphan_policy: OrphanPolicy,
}

impl Default for CommentsConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_COMMENTS_PAGE_SIZE,
            orphan_policy: OrphanPolicy::default(),
        }
    }
}

impl SiteConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();

        let database_url = get_database_url("QUILL_DATABASE_URL")?;
        let host = get_env_or_default("QUILL_HOST", "127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|e| ConfigError::InvalidEnvVar("QUILL_HOST".to_string(), e.to_string()))?;
        let port = get_env_or_default("QUILL_PORT", "3000")
            .parse::<u16>()
            .map_err(|e| ConfigError::InvalidEnvVar("QUILL_PORT".to_string(), e.to_string()))?;
        let base_url = normalize_base_url(&get_required_env("QUILL_BASE_URL")?)?;
        let session_secret = get_validated_secret("QUILL_SESSION_SECRET")?;
        validate_session_secret(&session_secret, "QUILL_SESSION_SECRET")?;

        let mail = MailServiceConfig {
            base_url: normalize_base_url(&get_required_env("MAIL_SERVICE_URL")?)?,
            api_key: get_optional_env("MAIL_SERVICE_API_KEY").map(SecretString::from),
        };
        let contact = ContactFormConfig {
            endpoint: get_required_env("CONTACT_FORM_URL")?,
            access_key: get_required_secret("CONTACT_ACCESS_KEY")?,
        };
        let google = GoogleOAuthConfig::from_env()?;
        let comments = CommentsConfig::from_env()?;

        Ok(Self {
            database_url,
            host,
            port,
            base_url,
            session_secret,
            content_dir: get_env_or_default("QUILL_CONTENT_DIR", "crates/site/content").into(),
            static_dir: get_env_or_default("QUILL_STATIC_DIR", "crates/site/static").into(),
            mail,
            contact,
            google,
            comments,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
            sentry_sample_rate: parse_rate("SENTRY_SAMPLE_RATE", 1.0)?,
            sentry_traces_sample_rate: parse_rate("SENTRY_TRACES_SAMPLE_RATE", 0.1)?,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Whether cookies should carry the `Secure` flag.
    #[must_use]
    pub fn is_https(&self) -> bool {
        self.base_url.starts_with("https://")
    }

    /// Absolute URL for a site path such as `/poem/ode`.
    #[must_use]
    pub fn absolute_url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}

impl GoogleOAuthConfig {
    fn from_env() -> Result<Option<Self>, ConfigError> {
        match (
            get_optional_env("GOOGLE_CLIENT_ID"),
            get_optional_env("GOOGLE_CLIENT_SECRET"),
        ) {
            (None, None) => Ok(None),
            (Some(client_id), Some(_)) => Ok(Some(Self {
                client_id,
                client_secret: get_validated_secret("GOOGLE_CLIENT_SECRET")?,
            })),
            (Some(_), None) => Err(ConfigError::MissingEnvVar(
                "GOOGLE_CLIENT_SECRET".to_string(),
            )),
            (None, Some(_)) => Err(ConfigError::MissingEnvVar("GOOGLE_CLIENT_ID".to_string())),
        }
    }
}

impl CommentsConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let page_size = match get_optional_env("COMMENTS_PAGE_SIZE") {
            Some(raw) => parse_page_size(&raw)?,
            None => DEFAULT_COMMENTS_PAGE_SIZE,
        };
        let orphan_policy = match get_optional_env("COMMENT_ORPHAN_POLICY") {
            Some(raw) => raw
                .parse::<OrphanPolicy>()
                .map_err(|e| ConfigError::InvalidEnvVar("COMMENT_ORPHAN_POLICY".to_string(), e))?,
            None => OrphanPolicy::default(),
        };
        Ok(Self {
            page_size,
            orphan_policy,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

fn get_required_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    Ok(SecretString::from(value))
}

/// Get database URL with fallback to generic `DATABASE_URL`.
fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an optional environment variable, treating blank values as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn normalize_base_url(raw: &str) -> Result<String, ConfigError> {
    let parsed = url::Url::parse(raw.trim())
        .map_err(|e| ConfigError::InvalidEnvVar(raw.to_string(), e.to_string()))?;
    Ok(parsed.as_str().trim_end_matches('/').to_string())
}

fn parse_page_size(raw: &str) -> Result<usize, ConfigError> {
    let size = raw.trim().parse::<usize>().map_err(|e| {
        ConfigError::InvalidEnvVar("COMMENTS_PAGE_SIZE".to_string(), e.to_string())
    })?;
    if size == 0 || size > MAX_COMMENTS_PAGE_SIZE {
        return Err(ConfigError::InvalidEnvVar(
            "COMMENTS_PAGE_SIZE".to_string(),
            format!("must be between 1 and {MAX_COMMENTS_PAGE_SIZE}"),
        ));
    }
    Ok(size)
}

fn parse_rate(key: &str, default: f32) -> Result<f32, ConfigError> {
    let Some(raw) = get_optional_env(key) else {
        return Ok(default);
    };
    let rate = raw
        .trim()
        .parse::<f32>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;
    if !(0.0..=1.0).contains(&rate) {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            "must be between 0.0 and 1.0".to_string(),
        ));
    }
    Ok(rate)
}

/// Validate that a session secret meets minimum length requirements.
fn validate_session_secret(secret: &SecretString, var_name: &str) -> Result<(), ConfigError> {
    let value = secret.expose_secret();
    if value.len() < MIN_SESSION_SECRET_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {} characters (got {})",
                MIN_SESSION_SECRET_LENGTH,
                value.len()
            ),
        ));
    }
    Ok(())
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)]
    let len = s.chars().count() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)]
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated secret."
            ),
        ));
    }

    Ok(())
}

fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use super::*;

    /// A fully populated config for tests that need one.
    pub(crate) fn test_config() -> SiteConfig {
        SiteConfig {
            database_url: SecretString::from("postgres://localhost/quill_test"),
            host: "127.0.0.1".parse().unwrap(),
            port: 3000,
            base_url: "http://localhost:3000".to_string(),
            session_secret: SecretString::from("k7#Qm2!vR9@wT4$yU8%zX1^aB6&cD3*e"),
            content_dir: PathBuf::from("content"),
            static_dir: PathBuf::from("static"),
            mail: MailServiceConfig {
                base_url: "http://localhost:4000".to_string(),
                api_key: Some(SecretString::from("mail_key_value_9f8e7d")),
            },
            contact: ContactFormConfig {
                endpoint: "http://localhost:4001/submit".to_string(),
                access_key: SecretString::from("contact_key_value_1a2b3c"),
            },
            google: Some(GoogleOAuthConfig {
                client_id: "google-client-id".to_string(),
                client_secret: SecretString::from("google_secret_value_4d5e6f"),
            }),
            comments: CommentsConfig::default(),
            sentry_dsn: None,
            sentry_environment: None,
            sentry_sample_rate: 1.0,
            sentry_traces_sample_rate: 0.0,
        }
    }

    #[test]
    fn test_shannon_entropy_empty() {
        assert!((shannon_entropy("") - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_shannon_entropy_two_chars() {
        let entropy = shannon_entropy("ab");
        assert!((entropy - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_validate_secret_strength_placeholder() {
        let result = validate_secret_strength("your-session-key-here", "TEST_VAR");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_low_entropy() {
        let result = validate_secret_strength(&"ab".repeat(20), "TEST_VAR");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_valid() {
        let result = validate_secret_strength("aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6", "TEST_VAR");
        assert!(result.is_ok());
    }

    #[test]
    fn test_validate_session_secret_too_short() {
        let secret = SecretString::from("short");
        assert!(validate_session_secret(&secret, "TEST_SESSION").is_err());
    }

    #[test]
    fn test_page_size_bounds() {
        assert_eq!(parse_page_size("50").unwrap(), 50);
        assert_eq!(parse_page_size(" 10 ").unwrap(), 10);
        assert!(parse_page_size("0").is_err());
        assert!(parse_page_size("201").is_err());
        assert!(parse_page_size("fifty").is_err());
    }

    #[test]
    fn test_normalize_base_url_strips_trailing_slash() {
        assert_eq!(
            normalize_base_url("https://poems.example.org/").unwrap(),
            "https://poems.example.org"
        );
        assert!(normalize_base_url("not a url").is_err());
    }

    #[test]
    fn test_absolute_url_and_https() {
        let mut config = test_config();
        assert_eq!(
            config.absolute_url("/poem/ode-to-rain"),
            "http://localhost:3000/poem/ode-to-rain"
        );
        assert!(!config.is_https());
        config.base_url = "https://poems.example.org".to_string();
        assert!(config.is_https());
    }

    #[test]
    fn test_socket_addr() {
        let addr = test_config().socket_addr();
        assert_eq!(addr.ip().to_string(), "127.0.0.1");
        assert_eq!(addr.port(), 3000);
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let debug_output = format!("{:?}", test_config());

        assert!(debug_output.contains("google-client-id"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("mail_key_value_9f8e7d"));
        assert!(!debug_output.contains("contact_key_value_1a2b3c"));
        assert!(!debug_output.contains("google_secret_value_4d5e6f"));
    }
}

//! `PostgreSQL`-backed sessions.
//!
//! The session cookie is signed with a key derived from
//! `QUILL_SESSION_SECRET`.

use secrecy::ExposeSecret;
use sha2::{Digest, Sha512};
use sqlx::PgPool;
use tower_sessions::cookie::Key;
use tower_sessions::service::SignedCookie;
use tower_sessions::{Expiry, SessionManagerLayer};
use tower_sessions_sqlx_store::PostgresStore;

use crate::config::SiteConfig;

pub const SESSION_COOKIE_NAME: &str = "quill_session";

/// 7 days of inactivity.
const SESSION_EXPIRY_SECONDS: i64 = 7 * 24 * 60 * 60;

/// The session table is created by `PostgresStore::migrate` from the CLI.
#[must_use]
pub fn create_session_layer(
    pool: &PgPool,
    config: &SiteConfig,
) -> SessionManagerLayer<PostgresStore, SignedCookie> {
    let store = PostgresStore::new(pool.clone());

    SessionManagerLayer::new(store)
        .with_name(SESSION_COOKIE_NAME)
        .with_expiry(Expiry::OnInactivity(
            tower_sessions::cookie::time::Duration::seconds(SESSION_EXPIRY_SECONDS),
        ))
        .with_secure(config.is_https())
        .with_same_site(tower_sessions::cookie::SameSite::Lax)
        .with_http_only(true)
        .with_path("/")
        .with_signed(signing_key(config.session_secret.expose_secret()))
}

/// Stretch the secret to the 64 bytes `Key` requires.
fn signing_key(secret: &str) -> Key {
    let digest = Sha512::digest(secret.as_bytes());
    Key::from(digest.as_slice())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signing_key_is_deterministic() {
        let a = signing_key("k7#Qm2!vRx9@Lp4$Wn8&Zt3*Hy6^Bc1%");
        let b = signing_key("k7#Qm2!vRx9@Lp4$Wn8&Zt3*Hy6^Bc1%");
        let c = signing_key("another-secret-of-reasonable-size!!");
        assert_eq!(a.master(), b.master());
        assert_ne!(a.master(), c.master());
    }
}

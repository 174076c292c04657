//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::SiteConfig;
use crate::content::{ContentError, ContentStore};
use crate::search::{SearchIndex, build_index_async};
use crate::services::contact::{ContactClient, ContactError};
use crate::services::google::{GoogleAuthError, GoogleClient};
use crate::services::mail::{MailClient, MailError};
use crate::services::poems::PoemCatalog;

/// Error building application state.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("mail client: {0}")]
    Mail(#[from] MailError),
    #[error("contact client: {0}")]
    Contact(#[from] ContactError),
    #[error("google client: {0}")]
    Google(#[from] GoogleAuthError),
    #[error("content: {0}")]
    Content(#[from] ContentError),
}

/// Application state shared across all handlers.
///
/// Cheaply cloneable via `Arc`.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: SiteConfig,
    pool: PgPool,
    poems: PoemCatalog,
    search: SearchIndex,
    content: ContentStore,
    mail: MailClient,
    contact: ContactClient,
    google: Option<GoogleClient>,
}

impl AppState {
    /// Build state from configuration and a connected pool.
    ///
    /// Pages under `config.content_dir` are loaded here. The search index
    /// starts empty; call [`Self::start_search_indexing`] to fill it.
    ///
    /// # Errors
    ///
    /// Returns an error if an HTTP client cannot be built or the content
    /// directory cannot be read.
    pub fn new(config: SiteConfig, pool: PgPool) -> Result<Self, StateError> {
        let mail = MailClient::new(&config.mail)?;
        let contact = ContactClient::new(&config.contact)?;
        let google = config.google.as_ref().map(GoogleClient::new).transpose()?;
        let content = ContentStore::load(&config.content_dir)?;
        tracing::info!(pages = content.len(), "Content loaded");

        Ok(Self {
            inner: Arc::new(AppStateInner {
                poems: PoemCatalog::new(pool.clone()),
                search: SearchIndex::new(),
                config,
                pool,
                content,
                mail,
                contact,
                google,
            }),
        })
    }

    #[must_use]
    pub fn config(&self) -> &SiteConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// Cached poem queries.
    #[must_use]
    pub fn poems(&self) -> &PoemCatalog {
        &self.inner.poems
    }

    #[must_use]
    pub fn search(&self) -> &SearchIndex {
        &self.inner.search
    }

    #[must_use]
    pub fn content(&self) -> &ContentStore {
        &self.inner.content
    }

    #[must_use]
    pub fn mail(&self) -> &MailClient {
        &self.inner.mail
    }

    #[must_use]
    pub fn contact(&self) -> &ContactClient {
        &self.inner.contact
    }

    /// `None` when Google sign-in is not configured.
    #[must_use]
    pub fn google(&self) -> Option<&GoogleClient> {
        self.inner.google.as_ref()
    }

    /// Build the search index in the background.
    pub fn start_search_indexing(&self) {
        build_index_async(self.inner.search.clone(), self.inner.pool.clone());
    }
}

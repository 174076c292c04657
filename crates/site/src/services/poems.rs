//! Cached read access to published poems.
//!
//! Home, listing, and sidebar queries are cached for one minute with
//! `moka`. Publishing a poem invalidates everything.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use sqlx::PgPool;
use tracing::debug;

use quill_core::{PoemSort, Slug};

use crate::db::{PoemRepository, RepositoryError};
use crate::models::{Poem, PoemTitle};

/// Poems on the home page.
pub const LATEST_COUNT: i64 = 4;
/// Poems per listing page.
pub const PAGE_SIZE: u32 = 10;

#[derive(Debug, Clone, Hash, PartialEq, Eq)]
enum CacheKey {
    Latest,
    Titles,
    Page { sort: PoemSort, page: u32 },
}

#[derive(Debug, Clone)]
enum CacheValue {
    Poems(Arc<Vec<Poem>>),
    Titles(Arc<Vec<PoemTitle>>),
    Page(Arc<PoemListing>),
}

/// One page of the poem listing.
#[derive(Debug, Clone)]
pub struct PoemListing {
    pub poems: Vec<Poem>,
    pub sort: PoemSort,
    pub page: u32,
    pub total: i64,
}

impl PoemListing {
    #[must_use]
    pub fn total_pages(&self) -> u32 {
        let pages = (self.total + i64::from(PAGE_SIZE) - 1) / i64::from(PAGE_SIZE);
        u32::try_from(pages).unwrap_or(u32::MAX).max(1)
    }

    #[must_use]
    pub const fn has_previous(&self) -> bool {
        self.page > 1
    }

    #[must_use]
    pub fn has_next(&self) -> bool {
        self.page < self.total_pages()
    }
}

/// Cached poem queries.
#[derive(Clone)]
pub struct PoemCatalog {
    inner: Arc<PoemCatalogInner>,
}

struct PoemCatalogInner {
    pool: PgPool,
    cache: Cache<CacheKey, CacheValue>,
}

impl PoemCatalog {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        let cache = Cache::builder()
            .max_capacity(500)
            .time_to_live(Duration::from_secs(60))
            .build();
        Self {
            inner: Arc::new(PoemCatalogInner { pool, cache }),
        }
    }

    fn repo(&self) -> PoemRepository<'_> {
        PoemRepository::new(&self.inner.pool)
    }

    /// The newest poems for the home page.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the query fails.
    pub async fn latest(&self) -> Result<Arc<Vec<Poem>>, RepositoryError> {
        if let Some(CacheValue::Poems(poems)) = self.inner.cache.get(&CacheKey::Latest).await {
            debug!("Cache hit for latest poems");
            return Ok(poems);
        }
        let poems = Arc::new(self.repo().latest(LATEST_COUNT).await?);
        self.inner
            .cache
            .insert(CacheKey::Latest, CacheValue::Poems(Arc::clone(&poems)))
            .await;
        Ok(poems)
    }

    /// Every title for the sidebar.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the query fails.
    pub async fn titles(&self) -> Result<Arc<Vec<PoemTitle>>, RepositoryError> {
        if let Some(CacheValue::Titles(titles)) = self.inner.cache.get(&CacheKey::Titles).await {
            debug!("Cache hit for poem titles");
            return Ok(titles);
        }
        let titles = Arc::new(self.repo().titles().await?);
        self.inner
            .cache
            .insert(CacheKey::Titles, CacheValue::Titles(Arc::clone(&titles)))
            .await;
        Ok(titles)
    }

    /// One listing page; `page` is clamped to at least 1.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the query fails.
    pub async fn page(&self, sort: PoemSort, page: u32) -> Result<Arc<PoemListing>, RepositoryError> {
        let page = page.max(1);
        let key = CacheKey::Page { sort, page };
        if let Some(CacheValue::Page(listing)) = self.inner.cache.get(&key).await {
            debug!(?sort, page, "Cache hit for poem listing");
            return Ok(listing);
        }

        let (poems, total) = self.repo().list(sort, page, PAGE_SIZE).await?;
        let listing = Arc::new(PoemListing {
            poems,
            sort,
            page,
            total,
        });
        self.inner
            .cache
            .insert(key, CacheValue::Page(Arc::clone(&listing)))
            .await;
        Ok(listing)
    }

    /// Load a poem for its detail page and count the view.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if a query fails.
    pub async fn open(&self, slug: &Slug) -> Result<Option<Poem>, RepositoryError> {
        let repo = self.repo();
        let Some(mut poem) = repo.get_by_slug(slug).await? else {
            return Ok(None);
        };
        poem.views = repo.increment_views(poem.id).await?;
        Ok(Some(poem))
    }

    /// Drop every cached query.
    pub async fn invalidate_all(&self) {
        self.inner.cache.invalidate_all();
        self.inner.cache.run_pending_tasks().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listing(total: i64, page: u32) -> PoemListing {
        PoemListing {
            poems: Vec::new(),
            sort: PoemSort::Newest,
            page,
            total,
        }
    }

    #[test]
    fn total_pages_rounds_up() {
        assert_eq!(listing(0, 1).total_pages(), 1);
        assert_eq!(listing(10, 1).total_pages(), 1);
        assert_eq!(listing(11, 1).total_pages(), 2);
        assert_eq!(listing(95, 1).total_pages(), 10);
    }

    #[test]
    fn navigation_flags() {
        let first = listing(25, 1);
        assert!(!first.has_previous());
        assert!(first.has_next());

        let last = listing(25, 3);
        assert!(last.has_previous());
        assert!(!last.has_next());
    }
}

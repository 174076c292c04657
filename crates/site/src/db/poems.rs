//! Poem repository.

use sha2::{Digest, Sha256};
use sqlx::PgPool;
use tracing::instrument;

use quill_core::{PoemId, PoemSort, Slug};

use super::{RepositoryError, conflict_on_unique};
use crate::models::{NewPoem, Poem, PoemTitle};

const POEM_COLUMNS: &str = "id, title, author, content, slug, posted_at, views, likes";

/// Highest numeric suffix tried before giving up on a unique slug.
const MAX_SLUG_ATTEMPTS: u32 = 50;

/// Slug base for a newly published poem.
///
/// Titles with no ASCII letters or digits fall back to `poem-` plus the
/// first 8 hex digits of the title's SHA-256.
fn slug_for_title(title: &str) -> Result<Slug, RepositoryError> {
    if let Some(slug) = Slug::from_title(title) {
        return Ok(slug);
    }
    let digest = format!("{:x}", Sha256::digest(title.trim().as_bytes()));
    let short = digest.get(..8).unwrap_or(&digest);
    Slug::parse(&format!("poem-{short}"))
        .map_err(|e| RepositoryError::DataCorruption(format!("fallback slug: {e}")))
}

/// Repository for poem database operations.
pub struct PoemRepository<'a> {
    pool: &'a PgPool,
}

const fn order_clause(sort: PoemSort) -> &'static str {
    match sort {
        PoemSort::Newest => "posted_at DESC, id DESC",
        PoemSort::Oldest => "posted_at ASC, id ASC",
        PoemSort::Alphabetical => "LOWER(title) ASC, id ASC",
    }
}

impl<'a> PoemRepository<'a> {
    /// Create a new poem repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// The most recently posted poems.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn latest(&self, limit: i64) -> Result<Vec<Poem>, RepositoryError> {
        let rows = sqlx::query_as::<_, Poem>(&format!(
            "SELECT {POEM_COLUMNS} FROM poems ORDER BY posted_at DESC, id DESC LIMIT $1"
        ))
        .bind(limit)
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }

    /// One page of poems in the given order, plus the total poem count.
    ///
    /// `page` is 1-based.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if either query fails.
    #[instrument(skip(self))]
    pub async fn list(
        &self,
        sort: PoemSort,
        page: u32,
        per_page: u32,
    ) -> Result<(Vec<Poem>, i64), RepositoryError> {
        let offset = i64::from(page.saturating_sub(1)) * i64::from(per_page);
        let rows = sqlx::query_as::<_, Poem>(&format!(
            "SELECT {POEM_COLUMNS} FROM poems ORDER BY {} LIMIT $1 OFFSET $2",
            order_clause(sort)
        ))
        .bind(i64::from(per_page))
        .bind(offset)
        .fetch_all(self.pool)
        .await?;

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM poems")
            .fetch_one(self.pool)
            .await?;

        Ok((rows, total))
    }

    /// Every poem title, alphabetically, for the sidebar.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn titles(&self) -> Result<Vec<PoemTitle>, RepositoryError> {
        let rows = sqlx::query_as::<_, PoemTitle>(
            "SELECT title, slug FROM poems ORDER BY LOWER(title) ASC, id ASC",
        )
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }

    /// Every poem, for building the search index.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn all(&self) -> Result<Vec<Poem>, RepositoryError> {
        let rows = sqlx::query_as::<_, Poem>(&format!(
            "SELECT {POEM_COLUMNS} FROM poems ORDER BY id ASC"
        ))
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_slug(&self, slug: &Slug) -> Result<Option<Poem>, RepositoryError> {
        let row = sqlx::query_as::<_, Poem>(&format!(
            "SELECT {POEM_COLUMNS} FROM poems WHERE slug = $1"
        ))
        .bind(slug)
        .fetch_optional(self.pool)
        .await?;
        Ok(row)
    }

    /// Bump the view counter and return the new value.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the poem no longer exists.
    pub async fn increment_views(&self, id: PoemId) -> Result<i32, RepositoryError> {
        let views: Option<i32> =
            sqlx::query_scalar("UPDATE poems SET views = views + 1 WHERE id = $1 RETURNING views")
                .bind(id)
                .fetch_optional(self.pool)
                .await?;
        views.ok_or(RepositoryError::NotFound)
    }

    /// Publish a poem under a slug derived from its title.
    ///
    /// When the slug is taken, `-2`, `-3`, ... are tried in turn.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if every suffix is taken.
    #[instrument(skip(self, poem), fields(title = %poem.title))]
    pub async fn insert(&self, poem: &NewPoem) -> Result<Poem, RepositoryError> {
        let base = slug_for_title(&poem.title)?;

        for attempt in 1..=MAX_SLUG_ATTEMPTS {
            let slug = if attempt == 1 {
                base.clone()
            } else {
                base.with_suffix(attempt)
            };

            let result = sqlx::query_as::<_, Poem>(&format!(
                r"
                INSERT INTO poems (title, author, content, slug)
                VALUES ($1, $2, $3, $4)
                RETURNING {POEM_COLUMNS}
                "
            ))
            .bind(&poem.title)
            .bind(&poem.author)
            .bind(&poem.content)
            .bind(&slug)
            .fetch_one(self.pool)
            .await
            .map_err(|e| conflict_on_unique(e, "slug already exists"));

            match result {
                Ok(row) => return Ok(row),
                Err(RepositoryError::Conflict(_)) => {
                    tracing::debug!(%slug, "slug taken, trying next suffix");
                }
                Err(e) => return Err(e),
            }
        }

        Err(RepositoryError::Conflict(format!(
            "no free slug for `{base}` after {MAX_SLUG_ATTEMPTS} attempts"
        )))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn every_sort_has_a_stable_tiebreak() {
        for sort in PoemSort::ALL {
            assert!(order_clause(sort).ends_with("id DESC") || order_clause(sort).ends_with("id ASC"));
        }
        assert!(order_clause(PoemSort::Newest).starts_with("posted_at DESC"));
        assert!(order_clause(PoemSort::Alphabetical).starts_with("LOWER(title)"));
    }

    #[test]
    fn latin_titles_keep_their_words() {
        let slug = slug_for_title("the road not taken").unwrap();
        assert_eq!(slug.as_str(), "the-road-not-taken");
    }

    #[test]
    fn non_latin_titles_still_get_a_slug() {
        let hindi = slug_for_title("माँ की याद").unwrap();
        let japanese = slug_for_title("月の光").unwrap();
        let russian = slug_for_title("Лунный свет").unwrap();

        for slug in [&hindi, &japanese, &russian] {
            assert!(slug.as_str().starts_with("poem-"));
            assert_eq!(slug.as_str().len(), "poem-".len() + 8);
            assert!(Slug::parse(slug.as_str()).is_ok());
        }
        assert_ne!(hindi, japanese);
        assert_ne!(japanese, russian);
        assert_eq!(slug_for_title("月の光").unwrap(), japanese);
    }

    #[test]
    fn fallback_slug_accepts_suffixes() {
        let base = slug_for_title("月の光").unwrap();
        assert!(Slug::parse(base.with_suffix(2).as_str()).is_ok());
    }
}

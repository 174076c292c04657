//! Poem listing and detail handlers.

use std::sync::Arc;

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
};
use serde::Deserialize;
use tracing::instrument;

use quill_core::{PoemSort, Slug};

use crate::db::PgCommentStore;
use crate::error::AppError;
use crate::filters;
use crate::models::{Poem, PoemTitle};
use crate::services::comments::CommentThread;
use crate::services::poems::PoemListing;
use crate::state::AppState;

use super::PageContext;
use super::comments::{CommentView, top_level_views};

#[derive(Debug, Default, Deserialize)]
pub struct ListingQuery {
    #[serde(default)]
    pub sort: Option<String>,
    #[serde(default)]
    pub page: Option<String>,
}

impl ListingQuery {
    /// Unknown sorts fall back to newest; bad page numbers to 1.
    fn resolve(&self) -> (PoemSort, u32) {
        let sort = PoemSort::parse(self.sort.as_deref().unwrap_or_default());
        let page = self
            .page
            .as_deref()
            .and_then(|p| p.parse::<u32>().ok())
            .unwrap_or(1)
            .max(1);
        (sort, page)
    }
}

#[derive(Template, WebTemplate)]
#[template(path = "poems/index.html")]
pub struct ListingTemplate {
    pub page: PageContext,
    pub listing: Arc<PoemListing>,
    pub sorts: &'static [PoemSort],
    pub titles: Arc<Vec<PoemTitle>>,
}

#[derive(Template, WebTemplate)]
#[template(path = "poems/show.html")]
pub struct PoemTemplate {
    pub page: PageContext,
    pub poem: Poem,
    pub share_url: String,
    pub titles: Arc<Vec<PoemTitle>>,
    pub comments: Vec<CommentView>,
    pub next_cursor: Option<String>,
}

/// `/poem?sort=&page=`
///
/// # Errors
///
/// Returns `AppError::Database` if the listing query fails.
#[instrument(skip(state, page))]
pub async fn index(
    State(state): State<AppState>,
    page: PageContext,
    Query(query): Query<ListingQuery>,
) -> Result<impl IntoResponse, AppError> {
    let (sort, number) = query.resolve();
    let listing = state.poems().page(sort, number).await?;
    let titles = state.poems().titles().await?;

    Ok(ListingTemplate {
        page,
        listing,
        sorts: &PoemSort::ALL,
        titles,
    })
}

/// A poem with its first page of comments. Counts a view.
///
/// # Errors
///
/// 404 for an unknown slug.
#[instrument(skip(state, page))]
pub async fn show(
    State(state): State<AppState>,
    page: PageContext,
    Path(slug): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let not_found = || AppError::NotFound(format!("poem {slug}"));
    let parsed = Slug::parse(&slug).map_err(|_| not_found())?;
    let poem = state.poems().open(&parsed).await?.ok_or_else(not_found)?;

    let store = PgCommentStore::new(state.pool());
    let mut thread = CommentThread::new(&store, poem.id, state.config().comments);
    thread.load_initial().await?;

    let comments = top_level_views(&thread, page.user.as_ref());
    let next_cursor = thread.next_cursor().map(|c| c.encode());
    let titles = state.poems().titles().await?;

    Ok(PoemTemplate {
        share_url: state.config().absolute_url(&poem.path()),
        page,
        poem,
        titles,
        comments,
        next_cursor,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(sort: Option<&str>, page: Option<&str>) -> ListingQuery {
        ListingQuery {
            sort: sort.map(str::to_string),
            page: page.map(str::to_string),
        }
    }

    #[test]
    fn listing_defaults() {
        assert_eq!(query(None, None).resolve(), (PoemSort::Newest, 1));
    }

    #[test]
    fn listing_unknown_sort_falls_back() {
        assert_eq!(
            query(Some("popular"), Some("3")).resolve(),
            (PoemSort::Newest, 3)
        );
    }

    #[test]
    fn listing_bad_page_is_first() {
        assert_eq!(
            query(Some("alphabetical"), Some("0")).resolve(),
            (PoemSort::Alphabetical, 1)
        );
        assert_eq!(
            query(Some("oldest"), Some("-2")).resolve(),
            (PoemSort::Oldest, 1)
        );
    }
}

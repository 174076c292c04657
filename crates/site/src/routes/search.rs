//! Search handlers.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Query, State},
    response::IntoResponse,
};
use serde::Deserialize;
use tracing::instrument;

use crate::error::AppError;
use crate::filters;
use crate::search::SearchResults;
use crate::state::AppState;

use super::PageContext;

const PAGE_LIMIT: usize = 30;
const SUGGEST_LIMIT: usize = 6;

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
}

#[derive(Template, WebTemplate)]
#[template(path = "search.html")]
pub struct SearchPageTemplate {
    pub page: PageContext,
    pub query: String,
    pub results: SearchResults,
    pub is_ready: bool,
}

/// Navbar dropdown fragment.
#[derive(Template, WebTemplate)]
#[template(path = "partials/search_suggestions.html")]
pub struct SuggestionsTemplate {
    pub results: SearchResults,
    pub is_ready: bool,
}

/// # Errors
///
/// Returns `AppError` if the index cannot be queried.
#[instrument(skip(state, page))]
pub async fn search_page(
    State(state): State<AppState>,
    page: PageContext,
    Query(query): Query<SearchQuery>,
) -> Result<impl IntoResponse, AppError> {
    let results = state.search().search(&query.q, PAGE_LIMIT)?;
    Ok(SearchPageTemplate {
        page,
        query: query.q,
        results,
        is_ready: state.search().is_ready(),
    })
}

/// # Errors
///
/// Returns `AppError` if the index cannot be queried.
#[instrument(skip(state))]
pub async fn suggest(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<impl IntoResponse, AppError> {
    let results = state.search().search(&query.q, SUGGEST_LIMIT)?;
    Ok(SuggestionsTemplate {
        results,
        is_ready: state.search().is_ready(),
    })
}

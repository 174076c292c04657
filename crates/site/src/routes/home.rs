//! Home page route handler.

use std::sync::Arc;

use askama::Template;
use askama_web::WebTemplate;
use axum::{extract::State, response::IntoResponse};
use tracing::instrument;

use crate::error::AppError;
use crate::filters;
use crate::models::{Poem, PoemTitle};
use crate::state::AppState;

use super::PageContext;

#[derive(Template, WebTemplate)]
#[template(path = "index.html")]
pub struct HomeTemplate {
    pub page: PageContext,
    pub latest: Arc<Vec<Poem>>,
    pub titles: Arc<Vec<PoemTitle>>,
}

/// Latest poems and the sidebar title list.
///
/// # Errors
///
/// Returns `AppError::Database` if either query fails.
#[instrument(skip(state, page))]
pub async fn home(
    State(state): State<AppState>,
    page: PageContext,
) -> Result<impl IntoResponse, AppError> {
    let latest = state.poems().latest().await?;
    let titles = state.poems().titles().await?;

    Ok(HomeTemplate {
        page,
        latest,
        titles,
    })
}

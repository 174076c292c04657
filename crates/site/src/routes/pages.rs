//! Markdown informational pages.

use askama::Template;
use askama_web::WebTemplate;
use axum::{extract::State, response::IntoResponse};
use chrono::NaiveDate;
use tracing::instrument;

use crate::error::AppError;
use crate::filters;
use crate::state::AppState;

use super::PageContext;

#[derive(Template, WebTemplate)]
#[template(path = "pages/content.html")]
pub struct ContentPageTemplate {
    pub page: PageContext,
    pub title: String,
    pub description: String,
    pub updated_at: Option<NaiveDate>,
    pub content_html: String,
}

fn serve_content_page(
    state: &AppState,
    page: PageContext,
    slug: &str,
) -> Result<ContentPageTemplate, AppError> {
    let content = state
        .content()
        .get_page(slug)
        .ok_or_else(|| AppError::NotFound(format!("page {slug}")))?;

    Ok(ContentPageTemplate {
        page,
        title: content.meta.title.clone(),
        description: content.meta.description.clone().unwrap_or_default(),
        updated_at: content.meta.updated_at,
        content_html: content.content_html.clone(),
    })
}

/// # Errors
///
/// Returns 404 if the page is missing from the content directory.
#[instrument(skip_all)]
pub async fn about(
    State(state): State<AppState>,
    page: PageContext,
) -> Result<impl IntoResponse, AppError> {
    serve_content_page(&state, page, "about")
}

/// # Errors
///
/// Returns 404 if the page is missing from the content directory.
#[instrument(skip_all)]
pub async fn everything_about_project(
    State(state): State<AppState>,
    page: PageContext,
) -> Result<impl IntoResponse, AppError> {
    serve_content_page(&state, page, "everything-about-project")
}

//! Admin review of poem requests.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Path, State},
    response::{IntoResponse, Redirect},
};
use tracing::instrument;

use quill_core::PoemRequestId;

use crate::error::{AppError, add_breadcrumb};
use crate::filters;
use crate::middleware::RequireAdmin;
use crate::models::PoemRequest;
use crate::services::requests::RequestService;
use crate::state::AppState;

use super::PageContext;

#[derive(Template, WebTemplate)]
#[template(path = "admin/requests.html")]
pub struct RequestsTemplate {
    pub page: PageContext,
    pub requests: Vec<PoemRequest>,
}

/// Pending requests, oldest first.
///
/// # Errors
///
/// Returns `AppError::Database` if the query fails.
#[instrument(skip_all, fields(user_id = %admin.id))]
pub async fn requests(
    State(state): State<AppState>,
    page: PageContext,
    RequireAdmin(admin): RequireAdmin,
) -> Result<impl IntoResponse, AppError> {
    let requests = RequestService::new(state.pool()).pending().await?;
    Ok(RequestsTemplate { page, requests })
}

/// Publish a request and notify the submitter and the mailing list.
///
/// # Errors
///
/// 404 for an unknown request, 409 if it was already reviewed.
#[instrument(skip(state, admin), fields(user_id = %admin.id))]
pub async fn approve(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<PoemRequestId>,
) -> Result<impl IntoResponse, AppError> {
    let approval = RequestService::new(state.pool())
        .approve(
            id,
            state.mail(),
            state.poems(),
            state.search(),
            &state.config().base_url,
        )
        .await?;

    add_breadcrumb(
        "admin",
        "Approved poem request",
        Some(&[("slug", approval.poem.slug.as_str())]),
    );
    Ok(Redirect::to("/admin/requests"))
}

/// # Errors
///
/// 404 for an unknown request, 409 if it was already reviewed.
#[instrument(skip(state, admin), fields(user_id = %admin.id))]
pub async fn reject(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<PoemRequestId>,
) -> Result<impl IntoResponse, AppError> {
    RequestService::new(state.pool()).reject(id).await?;
    Ok(Redirect::to("/admin/requests"))
}

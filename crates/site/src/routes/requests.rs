//! Poem request submission.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::State,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tracing::instrument;

use crate::db::UserRepository;
use crate::error::AppError;
use crate::filters;
use crate::middleware::RequireAuth;
use crate::services::requests::{RequestDraft, RequestError, RequestService};
use crate::state::AppState;

use super::PageContext;

#[derive(Debug, Deserialize)]
pub struct RequestForm {
    pub title: String,
    pub content: String,
}

#[derive(Template, WebTemplate)]
#[template(path = "requests/form.html")]
pub struct RequestFormTemplate {
    pub page: PageContext,
    pub title: String,
    pub content: String,
    pub status: Option<String>,
    pub error: Option<String>,
}

pub async fn form(page: PageContext, RequireAuth(_user): RequireAuth) -> impl IntoResponse {
    RequestFormTemplate {
        page,
        title: String::new(),
        content: String::new(),
        status: None,
        error: None,
    }
}

/// # Errors
///
/// Returns `AppError` for database failures. Validation errors re-render
/// the form with the draft kept.
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn submit(
    State(state): State<AppState>,
    page: PageContext,
    RequireAuth(user): RequireAuth,
    Form(form): Form<RequestForm>,
) -> Result<Response, AppError> {
    let draft = match RequestDraft::parse(&form.title, &form.content) {
        Ok(draft) => draft,
        Err(RequestError::Invalid(msg)) => {
            return Ok(RequestFormTemplate {
                page,
                title: form.title,
                content: form.content,
                status: Some("ERROR".to_string()),
                error: Some(msg.to_string()),
            }
            .into_response());
        }
        Err(e) => return Err(e.into()),
    };

    let author = UserRepository::new(state.pool())
        .get_by_id(user.id)
        .await?
        .ok_or_else(|| AppError::Unauthorized("account no longer exists".to_string()))?
        .author_profile();

    RequestService::new(state.pool())
        .submit(user.id, &author, draft)
        .await?;

    Ok(RequestFormTemplate {
        page,
        title: String::new(),
        content: String::new(),
        status: Some("SUCCESS".to_string()),
        error: None,
    }
    .into_response())
}

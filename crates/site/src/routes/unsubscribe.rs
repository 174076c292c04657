//! Mailing list opt-out.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Query, State},
    response::IntoResponse,
};
use serde::Deserialize;
use tracing::instrument;

use quill_core::Email;

use crate::db::MailingListRepository;
use crate::filters;
use crate::state::AppState;

use super::PageContext;

#[derive(Debug, Deserialize)]
pub struct UnsubscribeQuery {
    pub email: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnsubscribeState {
    Invalid,
    Success,
    Error,
}

impl UnsubscribeState {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Invalid => "invalid",
            Self::Success => "success",
            Self::Error => "error",
        }
    }
}

#[derive(Template, WebTemplate)]
#[template(path = "unsubscribe.html")]
pub struct UnsubscribeTemplate {
    pub page: PageContext,
    pub state: UnsubscribeState,
    pub email: String,
}

/// `GET /unsubscribe?email=`
///
/// Marks the local entry unsubscribed, then tells the mail service.
#[instrument(skip(state, page, query))]
pub async fn unsubscribe(
    State(state): State<AppState>,
    page: PageContext,
    Query(query): Query<UnsubscribeQuery>,
) -> impl IntoResponse {
    let Some(email) = query.email.as_deref().and_then(|e| Email::parse(e).ok()) else {
        return UnsubscribeTemplate {
            page,
            state: UnsubscribeState::Invalid,
            email: String::new(),
        };
    };

    let outcome = match MailingListRepository::new(state.pool())
        .unsubscribe(&email)
        .await
    {
        Ok(_) => match state.mail().unsubscribe(&email).await {
            Ok(()) => UnsubscribeState::Success,
            Err(e) => {
                tracing::error!(error = %e, "Mail service unsubscribe failed");
                UnsubscribeState::Error
            }
        },
        Err(e) => {
            tracing::error!(error = %e, "Failed to update mailing list");
            UnsubscribeState::Error
        }
    };

    UnsubscribeTemplate {
        page,
        state: outcome,
        email: email.into_inner(),
    }
}

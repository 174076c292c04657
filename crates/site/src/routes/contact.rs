//! Contact form, relayed to the hosted form endpoint.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::State,
    response::IntoResponse,
};
use serde::Deserialize;
use tracing::instrument;

use crate::filters;
use crate::services::contact::{ContactError, ContactMessage};
use crate::state::AppState;

use super::PageContext;

#[derive(Debug, Deserialize)]
pub struct ContactForm {
    pub name: String,
    pub email: String,
    pub message: String,
}

#[derive(Template, WebTemplate)]
#[template(path = "contact.html")]
pub struct ContactTemplate {
    pub page: PageContext,
    pub name: String,
    pub email: String,
    pub message: String,
    /// `SUCCESS` or `ERROR` after a submission.
    pub status: Option<&'static str>,
    pub error: Option<String>,
}

pub async fn form(page: PageContext) -> impl IntoResponse {
    ContactTemplate {
        page,
        name: String::new(),
        email: String::new(),
        message: String::new(),
        status: None,
        error: None,
    }
}

/// Failures keep the typed message in the form.
#[instrument(skip_all)]
pub async fn submit(
    State(state): State<AppState>,
    page: PageContext,
    Form(form): Form<ContactForm>,
) -> impl IntoResponse {
    let result = match ContactMessage::parse(&form.name, &form.email, &form.message) {
        Ok(message) => state.contact().submit(&message).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(()) => ContactTemplate {
            page,
            name: String::new(),
            email: String::new(),
            message: String::new(),
            status: Some("SUCCESS"),
            error: None,
        },
        Err(e) => {
            let error = match &e {
                ContactError::Invalid(msg) => msg.clone(),
                ContactError::Http(_) | ContactError::Rejected(_) => {
                    tracing::error!(error = %e, "Contact form relay failed");
                    "Your message could not be sent. Please try again later.".to_string()
                }
            };
            ContactTemplate {
                page,
                name: form.name,
                email: form.email,
                message: form.message,
                status: Some("ERROR"),
                error: Some(error),
            }
        }
    }
}

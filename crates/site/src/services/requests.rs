//! Poem submissions and their review.
//!
//! Readers submit drafts that land as `pending` requests. Approving a
//! request publishes it as a poem, notifies the submitter and the mailing
//! list, and rebuilds the search index. Mail failures are logged and never
//! undo a publication.

use sqlx::PgPool;
use thiserror::Error;
use tracing::{info, instrument, warn};

use quill_core::{PoemRequestId, RequestStatus, UserId};

use crate::db::{
    MailingListRepository, PoemRepository, PoemRequestRepository, RepositoryError,
    UserRepository,
};
use crate::models::{NewPoem, NewPoemRequest, Poem, PoemRequest};
use crate::search::{SearchIndex, build_index_async};
use crate::services::comments::AuthorProfile;
use crate::services::mail::MailClient;
use crate::services::poems::PoemCatalog;

pub const MAX_TITLE_CHARS: usize = 200;
pub const MAX_CONTENT_CHARS: usize = 20_000;

#[derive(Debug, Error)]
pub enum RequestError {
    #[error("{0}")]
    Invalid(&'static str),

    #[error("request not found")]
    NotFound,

    #[error("request was already reviewed")]
    AlreadyReviewed,

    #[error(transparent)]
    Repository(RepositoryError),
}

impl From<RepositoryError> for RequestError {
    fn from(e: RepositoryError) -> Self {
        match e {
            RepositoryError::NotFound => Self::NotFound,
            RepositoryError::Conflict(_) => Self::AlreadyReviewed,
            other => Self::Repository(other),
        }
    }
}

/// A validated submission. The title is stored lowercased.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestDraft {
    pub title: String,
    pub content: String,
}

impl RequestDraft {
    /// # Errors
    ///
    /// Returns `RequestError::Invalid` when either field is blank or too long.
    pub fn parse(title: &str, content: &str) -> Result<Self, RequestError> {
        let title = title.trim();
        let content = content.trim();
        if title.is_empty() || content.is_empty() {
            return Err(RequestError::Invalid("Title and content are required"));
        }
        if title.chars().count() > MAX_TITLE_CHARS {
            return Err(RequestError::Invalid("Title is too long"));
        }
        if content.chars().count() > MAX_CONTENT_CHARS {
            return Err(RequestError::Invalid("Poem is too long"));
        }
        Ok(Self {
            title: title.to_lowercase(),
            content: content.to_owned(),
        })
    }
}

/// Outcome of an approval.
#[derive(Debug)]
pub struct Approval {
    pub request: PoemRequest,
    pub poem: Poem,
}

pub struct RequestService<'a> {
    pool: &'a PgPool,
}

impl<'a> RequestService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Store a pending request under the submitter's resolved author name.
    ///
    /// # Errors
    ///
    /// Returns `RequestError::Repository` if the insert fails.
    #[instrument(skip(self, author, draft), fields(user_id = %user_id))]
    pub async fn submit(
        &self,
        user_id: UserId,
        author: &AuthorProfile,
        draft: RequestDraft,
    ) -> Result<PoemRequest, RequestError> {
        let request = PoemRequestRepository::new(self.pool)
            .create(&NewPoemRequest {
                user_id,
                user_name: author.resolve(),
                title: draft.title,
                content: draft.content,
            })
            .await?;
        info!(request_id = %request.id, "Poem request submitted");
        Ok(request)
    }

    /// # Errors
    ///
    /// Returns `RequestError::Repository` if the query fails.
    pub async fn pending(&self) -> Result<Vec<PoemRequest>, RequestError> {
        Ok(PoemRequestRepository::new(self.pool).pending().await?)
    }

    /// Publish a pending request.
    ///
    /// The request is claimed first so two admins approving at once cannot
    /// publish it twice.
    ///
    /// # Errors
    ///
    /// Returns `RequestError::NotFound` for an unknown id,
    /// `RequestError::AlreadyReviewed` if it is no longer pending, and
    /// `RequestError::Repository` on database failure.
    #[instrument(skip(self, mail, catalog, search, base_url))]
    pub async fn approve(
        &self,
        id: PoemRequestId,
        mail: &MailClient,
        catalog: &PoemCatalog,
        search: &SearchIndex,
        base_url: &str,
    ) -> Result<Approval, RequestError> {
        let requests = PoemRequestRepository::new(self.pool);
        let request = requests.review(id, RequestStatus::Approved).await?;

        let poem = match PoemRepository::new(self.pool)
            .insert(&NewPoem {
                title: request.title.clone(),
                author: request.user_name.clone(),
                content: request.content.clone(),
            })
            .await
        {
            Ok(poem) => poem,
            Err(e) => {
                if let Err(revert) = requests.reopen(id).await {
                    warn!(error = %revert, "Failed to reopen request after publish error");
                }
                return Err(RequestError::Repository(e));
            }
        };
        info!(request_id = %id, poem_id = %poem.id, slug = %poem.slug, "Poem published");

        catalog.invalidate_all().await;
        build_index_async(search.clone(), self.pool.clone());

        self.notify(mail, &request, &poem, base_url).await;

        Ok(Approval { request, poem })
    }

    /// # Errors
    ///
    /// Returns `RequestError::NotFound` or `RequestError::AlreadyReviewed`.
    #[instrument(skip(self))]
    pub async fn reject(&self, id: PoemRequestId) -> Result<PoemRequest, RequestError> {
        let request = PoemRequestRepository::new(self.pool)
            .review(id, RequestStatus::Rejected)
            .await?;
        info!(request_id = %id, "Poem request rejected");
        Ok(request)
    }

    async fn notify(&self, mail: &MailClient, request: &PoemRequest, poem: &Poem, base_url: &str) {
        if let Some(user_id) = request.user_id {
            match UserRepository::new(self.pool).get_by_id(user_id).await {
                Ok(Some(user)) => {
                    if let Err(e) = mail
                        .send_approval(&user.email, &request.user_name, &poem.title)
                        .await
                    {
                        warn!(error = %e, "Failed to send approval email");
                    }
                }
                Ok(None) => {}
                Err(e) => warn!(error = %e, "Failed to look up submitter"),
            }
        }

        let url = format!("{}{}", base_url.trim_end_matches('/'), poem.path());
        match MailingListRepository::new(self.pool).subscribed_emails().await {
            Ok(emails) => {
                if let Err(e) = mail
                    .send_announcement(&emails, &poem.title, poem.slug.as_str(), &url)
                    .await
                {
                    warn!(error = %e, "Failed to send announcement");
                }
            }
            Err(e) => warn!(error = %e, "Failed to load mailing list"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn draft_lowercases_title() {
        let draft = RequestDraft::parse("  The Road Not Taken ", "Two roads diverged").ok();
        assert_eq!(
            draft,
            Some(RequestDraft {
                title: "the road not taken".to_owned(),
                content: "Two roads diverged".to_owned(),
            })
        );
    }

    #[test]
    fn draft_requires_both_fields() {
        assert!(matches!(
            RequestDraft::parse("", "body"),
            Err(RequestError::Invalid(_))
        ));
        assert!(matches!(
            RequestDraft::parse("title", "  \n "),
            Err(RequestError::Invalid(_))
        ));
    }

    #[test]
    fn draft_limits_length() {
        let long_title = "a".repeat(MAX_TITLE_CHARS + 1);
        assert!(RequestDraft::parse(&long_title, "body").is_err());
        let long_body = "a".repeat(MAX_CONTENT_CHARS + 1);
        assert!(RequestDraft::parse("title", &long_body).is_err());
    }

    #[test]
    fn repository_errors_map_to_review_outcomes() {
        assert!(matches!(
            RequestError::from(RepositoryError::NotFound),
            RequestError::NotFound
        ));
        assert!(matches!(
            RequestError::from(RepositoryError::Conflict("x".to_owned())),
            RequestError::AlreadyReviewed
        ));
    }
}

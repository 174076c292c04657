//! Comment thread handlers.
//!
//! The poem page renders the first page of comments. Later pages and reply
//! lists are fragments fetched by `comments.js`, which keeps each reply list
//! it has loaded and only toggles its visibility afterwards.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Path, Query, State},
    response::{IntoResponse, Redirect},
};
use serde::Deserialize;
use tracing::instrument;

use quill_core::{CommentId, Slug};

use crate::db::{PgCommentStore, PoemRepository, UserRepository};
use crate::error::{AppError, add_breadcrumb};
use crate::filters;
use crate::middleware::{OptionalAuth, RequireAdmin, RequireAuth};
use crate::models::{Comment, CurrentUser, Poem};
use crate::services::comments::{Actor, CommentStore, CommentThread, Cursor};
use crate::state::AppState;

/// A comment with what the viewer may do to it.
pub struct CommentView {
    pub comment: Comment,
    pub reply_count: i64,
    pub can_delete: bool,
    pub can_moderate: bool,
}

impl CommentView {
    #[must_use]
    pub fn new(comment: Comment, reply_count: i64, viewer: Option<&CurrentUser>) -> Self {
        let actor = viewer.map(actor_for);
        Self {
            can_delete: actor.is_some_and(|a| a.can_delete(comment.user_id)),
            can_moderate: viewer.is_some_and(CurrentUser::is_admin),
            reply_count,
            comment,
        }
    }
}

/// Top-level comments of a thread as views, in display order.
pub fn top_level_views<S: CommentStore>(
    thread: &CommentThread<'_, S>,
    viewer: Option<&CurrentUser>,
) -> Vec<CommentView> {
    thread
        .comments()
        .iter()
        .map(|c| CommentView::new(c.clone(), thread.reply_count(c.id), viewer))
        .collect()
}

const fn actor_for(user: &CurrentUser) -> Actor {
    Actor {
        user_id: user.id,
        role: user.role,
    }
}

/// Fragment: one page of top-level comments plus the next "load more" link.
#[derive(Template, WebTemplate)]
#[template(path = "partials/comment_page.html")]
pub struct CommentPageTemplate {
    pub slug: String,
    pub comments: Vec<CommentView>,
    pub next_cursor: Option<String>,
    pub signed_in: bool,
}

/// Fragment: replies to one comment, oldest first.
#[derive(Template, WebTemplate)]
#[template(path = "partials/replies.html")]
pub struct RepliesTemplate {
    pub slug: String,
    pub parent_id: CommentId,
    pub replies: Vec<CommentView>,
}

#[derive(Debug, Deserialize)]
pub struct MoreQuery {
    pub cursor: String,
}

#[derive(Debug, Deserialize)]
pub struct CommentForm {
    pub content: String,
    /// Empty for a top-level comment.
    #[serde(default)]
    pub parent_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AdminReplyForm {
    #[serde(default)]
    pub admin_reply: String,
}

async fn find_poem(state: &AppState, slug: &str) -> Result<Poem, AppError> {
    let not_found = || AppError::NotFound(format!("poem {slug}"));
    let slug = Slug::parse(slug).map_err(|_| not_found())?;
    PoemRepository::new(state.pool())
        .get_by_slug(&slug)
        .await?
        .ok_or_else(not_found)
}

fn parse_parent(raw: Option<&str>) -> Result<Option<CommentId>, AppError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(id) => id
            .parse::<CommentId>()
            .map(Some)
            .map_err(|_| AppError::BadRequest("invalid parent comment".to_string())),
    }
}

/// Next page of top-level comments after `cursor`.
///
/// # Errors
///
/// 400 for a malformed cursor, 404 for an unknown poem.
#[instrument(skip(state, viewer, query))]
pub async fn more(
    State(state): State<AppState>,
    OptionalAuth(viewer): OptionalAuth,
    Path(slug): Path<String>,
    Query(query): Query<MoreQuery>,
) -> Result<impl IntoResponse, AppError> {
    let cursor = Cursor::decode(&query.cursor)?;
    let poem = find_poem(&state, &slug).await?;

    let store = PgCommentStore::new(state.pool());
    let mut thread = CommentThread::resume(&store, poem.id, state.config().comments, cursor);
    let page = thread.next_page().await?;

    let comments = page
        .comments
        .into_iter()
        .map(|c| {
            let count = thread.reply_count(c.id);
            CommentView::new(c, count, viewer.as_ref())
        })
        .collect();

    Ok(CommentPageTemplate {
        slug: poem.slug.to_string(),
        comments,
        next_cursor: page.next_cursor.map(|c| c.encode()),
        signed_in: viewer.is_some(),
    })
}

/// Replies to one top-level comment.
///
/// # Errors
///
/// 404 for an unknown poem or a comment that is not on it.
#[instrument(skip(state, viewer))]
pub async fn replies(
    State(state): State<AppState>,
    OptionalAuth(viewer): OptionalAuth,
    Path((slug, id)): Path<(String, CommentId)>,
) -> Result<impl IntoResponse, AppError> {
    let poem = find_poem(&state, &slug).await?;
    let store = PgCommentStore::new(state.pool());

    match store.get(id).await? {
        Some(parent) if parent.poem_id == poem.id => {}
        _ => return Err(AppError::NotFound("comment".to_string())),
    }

    let mut thread = CommentThread::new(&store, poem.id, state.config().comments);
    let replies = thread
        .toggle_replies(id)
        .await?
        .map(<[Comment]>::to_vec)
        .unwrap_or_default()
        .into_iter()
        .map(|c| CommentView::new(c, 0, viewer.as_ref()))
        .collect();

    Ok(RepliesTemplate {
        slug: poem.slug.to_string(),
        parent_id: id,
        replies,
    })
}

/// Post a comment or a reply, then return to the thread.
///
/// # Errors
///
/// 400 for invalid content or reply target, 401 if the account is gone.
#[instrument(skip(state, user, form), fields(user_id = %user.id))]
pub async fn create(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(slug): Path<String>,
    Form(form): Form<CommentForm>,
) -> Result<impl IntoResponse, AppError> {
    let poem = find_poem(&state, &slug).await?;
    let parent = parse_parent(form.parent_id.as_deref())?;

    let profile = UserRepository::new(state.pool())
        .get_by_id(user.id)
        .await?
        .ok_or_else(|| AppError::Unauthorized("account no longer exists".to_string()))?
        .author_profile();

    let store = PgCommentStore::new(state.pool());
    let mut thread = CommentThread::new(&store, poem.id, state.config().comments);
    let comment = thread
        .post(actor_for(&user), &profile, &form.content, parent)
        .await?;

    add_breadcrumb("comments", "Posted comment", Some(&[("poem", poem.slug.as_str())]));

    let anchor = parent.unwrap_or(comment.id);
    Ok(Redirect::to(&format!("{}#comment-{anchor}", poem.path())))
}

/// Delete a comment (owner or admin).
///
/// # Errors
///
/// 403 when the viewer is neither, 404 for an unknown comment.
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn delete(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path((slug, id)): Path<(String, CommentId)>,
) -> Result<impl IntoResponse, AppError> {
    let poem = find_poem(&state, &slug).await?;
    let store = PgCommentStore::new(state.pool());
    let mut thread = CommentThread::new(&store, poem.id, state.config().comments);
    thread.delete(actor_for(&user), id).await?;

    tracing::info!(comment_id = %id, "Comment deleted");
    Ok(Redirect::to(&format!("{}#comments", poem.path())))
}

/// Set or clear (blank) the admin reply on a comment.
///
/// # Errors
///
/// 404 for an unknown comment.
#[instrument(skip(state, admin, form), fields(user_id = %admin.id))]
pub async fn admin_reply(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path((slug, id)): Path<(String, CommentId)>,
    Form(form): Form<AdminReplyForm>,
) -> Result<impl IntoResponse, AppError> {
    let poem = find_poem(&state, &slug).await?;
    let store = PgCommentStore::new(state.pool());
    let mut thread = CommentThread::new(&store, poem.id, state.config().comments);
    thread
        .set_admin_reply(actor_for(&admin), id, &form.admin_reply)
        .await?;

    Ok(Redirect::to(&format!("{}#comment-{id}", poem.path())))
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use quill_core::{Email, PoemId, UserId, UserRole};

    use super::*;

    fn comment(owner: Option<i32>) -> Comment {
        Comment {
            id: CommentId::new(1),
            poem_id: PoemId::new(1),
            content: "lovely".to_string(),
            author_name: "Mira".to_string(),
            user_id: owner.map(UserId::new),
            parent_id: None,
            admin_reply: None,
            created_at: Utc::now(),
        }
    }

    fn viewer(id: i32, role: UserRole) -> Option<CurrentUser> {
        Some(CurrentUser {
            id: UserId::new(id),
            email: Email::parse("reader@example.com").ok()?,
            display_name: "Reader".to_string(),
            role,
        })
    }

    #[test]
    fn owner_may_delete() {
        let user = viewer(7, UserRole::User);
        let view = CommentView::new(comment(Some(7)), 0, user.as_ref());
        assert!(view.can_delete);
        assert!(!view.can_moderate);
    }

    #[test]
    fn stranger_may_not_delete() {
        let user = viewer(8, UserRole::User);
        assert!(!CommentView::new(comment(Some(7)), 0, user.as_ref()).can_delete);
        assert!(!CommentView::new(comment(None), 0, user.as_ref()).can_delete);
        assert!(!CommentView::new(comment(Some(7)), 0, None).can_delete);
    }

    #[test]
    fn admin_may_delete_and_moderate() {
        let admin = viewer(1, UserRole::Admin);
        let view = CommentView::new(comment(None), 3, admin.as_ref());
        assert!(view.can_delete);
        assert!(view.can_moderate);
        assert_eq!(view.reply_count, 3);
    }

    #[test]
    fn parent_parsing() {
        assert!(matches!(parse_parent(None), Ok(None)));
        assert!(matches!(parse_parent(Some("  ")), Ok(None)));
        assert!(matches!(parse_parent(Some("42")), Ok(Some(id)) if id == CommentId::new(42)));
        assert!(matches!(parse_parent(Some("x")), Err(AppError::BadRequest(_))));
    }
}

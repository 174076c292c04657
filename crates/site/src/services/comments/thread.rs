//! Per-view comment state: loaded pages, reply cache, reply counts.

use std::collections::{HashMap, HashSet};

use tracing::instrument;

use quill_core::{CommentId, PoemId};

use super::{Actor, AuthorProfile, CommentError, CommentStore, Cursor, OrphanPolicy};
use crate::config::CommentsConfig;
use crate::models::{Comment, NewComment, non_blank};

/// One page of top-level comments handed to a "load more" fragment.
#[derive(Debug, Clone)]
pub struct CommentPage {
    pub comments: Vec<Comment>,
    pub next_cursor: Option<Cursor>,
    pub has_more: bool,
}

/// Comment state for one poem as seen by one viewer.
///
/// A thread lives for one view: built from a fresh [`CommentThread::load_initial`]
/// or resumed from a cursor for "load more". Replies fetched through
/// [`CommentThread::toggle_replies`] are cached, so toggling a parent closed
/// and open again does not query the store twice.
pub struct CommentThread<'s, S> {
    store: &'s S,
    poem_id: PoemId,
    settings: CommentsConfig,
    comments: Vec<Comment>,
    cursor: Option<Cursor>,
    has_more: bool,
    loaded: bool,
    reply_counts: HashMap<CommentId, i64>,
    replies: HashMap<CommentId, Vec<Comment>>,
    expanded: HashSet<CommentId>,
}

impl<'s, S: CommentStore> CommentThread<'s, S> {
    #[must_use]
    pub fn new(store: &'s S, poem_id: PoemId, settings: CommentsConfig) -> Self {
        Self {
            store,
            poem_id,
            settings,
            comments: Vec::new(),
            cursor: None,
            has_more: false,
            loaded: false,
            reply_counts: HashMap::new(),
            replies: HashMap::new(),
            expanded: HashSet::new(),
        }
    }

    /// A thread positioned after `cursor`, ready for [`CommentThread::load_more`].
    #[must_use]
    pub fn resume(store: &'s S, poem_id: PoemId, settings: CommentsConfig, cursor: Cursor) -> Self {
        let mut thread = Self::new(store, poem_id, settings);
        thread.cursor = Some(cursor);
        thread.has_more = true;
        thread.loaded = true;
        thread
    }

    /// Replace the top-level list with the newest page.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    #[instrument(skip(self), fields(poem_id = %self.poem_id))]
    pub async fn load_initial(&mut self) -> Result<(), CommentError> {
        let page = self
            .store
            .top_level_page(self.poem_id, None, self.settings.page_size)
            .await?;

        self.comments.clear();
        self.reply_counts.clear();
        self.cursor = None;
        self.loaded = true;
        self.accept_page(page).await?;
        Ok(())
    }

    /// Append the next page after the stored cursor.
    ///
    /// Returns the newly appended comments, empty when the list is exhausted.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    #[instrument(skip(self), fields(poem_id = %self.poem_id))]
    pub async fn load_more(&mut self) -> Result<&[Comment], CommentError> {
        if !self.loaded {
            self.load_initial().await?;
            return Ok(&self.comments);
        }
        if !self.has_more {
            return Ok(&[]);
        }

        let page = self
            .store
            .top_level_page(self.poem_id, self.cursor, self.settings.page_size)
            .await?;
        let start = self.comments.len();
        self.accept_page(page).await?;
        Ok(self.comments.get(start..).unwrap_or_default())
    }

    /// [`CommentThread::load_more`], packaged with the continuation state.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub async fn next_page(&mut self) -> Result<CommentPage, CommentError> {
        let comments = self.load_more().await?.to_vec();
        Ok(CommentPage {
            comments,
            next_cursor: self.next_cursor(),
            has_more: self.has_more,
        })
    }

    async fn accept_page(&mut self, page: Vec<Comment>) -> Result<(), CommentError> {
        // A short page means the list is exhausted. An exact multiple of the
        // page size costs one extra, empty request.
        self.has_more = page.len() == self.settings.page_size;
        if let Some(last) = page.last() {
            self.cursor = Some(Cursor::after(last));
        }

        if !page.is_empty() {
            let ids: Vec<CommentId> = page.iter().map(|c| c.id).collect();
            let counts = self.store.reply_counts(&ids).await?;
            for id in ids {
                let count = counts.get(&id).copied().unwrap_or(0);
                self.reply_counts.insert(id, count);
            }
        }

        self.comments.extend(page);
        Ok(())
    }

    /// Show or hide the replies of `parent`.
    ///
    /// Returns the replies when the parent is now expanded and `None` when it
    /// was collapsed. The store is queried only the first time a parent is
    /// expanded.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub async fn toggle_replies(
        &mut self,
        parent: CommentId,
    ) -> Result<Option<&[Comment]>, CommentError> {
        if self.expanded.remove(&parent) {
            return Ok(None);
        }

        if !self.replies.contains_key(&parent) {
            let fetched = self.store.replies(parent).await?;
            tracing::debug!(%parent, count = fetched.len(), "fetched replies");
            self.replies.insert(parent, fetched);
        }
        self.expanded.insert(parent);
        Ok(self.replies.get(&parent).map(Vec::as_slice))
    }

    /// Write a comment, or a reply when `parent` is set.
    ///
    /// A top-level comment reloads the list from the newest page. A reply is
    /// merged into the cached replies of its parent (if cached) and bumps the
    /// parent's reply count without reloading.
    ///
    /// # Errors
    ///
    /// Returns a validation error for empty or oversized content and
    /// [`CommentError::InvalidParent`] when the parent is missing, belongs to
    /// another poem, or is itself a reply.
    #[instrument(skip(self, author, content), fields(poem_id = %self.poem_id))]
    pub async fn post(
        &mut self,
        actor: Actor,
        author: &AuthorProfile,
        content: &str,
        parent: Option<CommentId>,
    ) -> Result<Comment, CommentError> {
        let content = super::validate_content(content)?;

        if let Some(parent_id) = parent {
            let target = self
                .store
                .get(parent_id)
                .await?
                .ok_or(CommentError::InvalidParent("parent comment does not exist"))?;
            if target.poem_id != self.poem_id {
                return Err(CommentError::InvalidParent("parent belongs to another poem"));
            }
            if target.is_reply() {
                return Err(CommentError::InvalidParent("replies cannot be nested"));
            }
        }

        let created = self
            .store
            .insert(NewComment {
                poem_id: self.poem_id,
                content,
                author_name: author.resolve(),
                user_id: actor.user_id,
                parent_id: parent,
            })
            .await?;

        match parent {
            None => self.load_initial().await?,
            Some(parent_id) => {
                if let Some(cached) = self.replies.get_mut(&parent_id) {
                    cached.push(created.clone());
                }
                *self.reply_counts.entry(parent_id).or_insert(0) += 1;
            }
        }

        Ok(created)
    }

    /// Delete a comment as `actor`.
    ///
    /// The comment is pruned from the top-level list, from every cached reply
    /// list, and from the reply counts. Under [`OrphanPolicy::Retain`] its own
    /// replies stay in the store and in this thread's cache.
    ///
    /// # Errors
    ///
    /// Returns [`CommentError::NotFound`] for unknown ids or ids on another
    /// poem and [`CommentError::Forbidden`] when `actor` is neither the owner
    /// nor an admin.
    #[instrument(skip(self), fields(poem_id = %self.poem_id))]
    pub async fn delete(&mut self, actor: Actor, id: CommentId) -> Result<(), CommentError> {
        let target = self
            .store
            .get(id)
            .await?
            .filter(|c| c.poem_id == self.poem_id)
            .ok_or(CommentError::NotFound)?;
        if !actor.can_delete(target.user_id) {
            return Err(CommentError::Forbidden);
        }

        if !self.store.delete(id).await? {
            return Err(CommentError::NotFound);
        }
        if self.settings.orphan_policy == OrphanPolicy::Cascade {
            let removed = self.store.delete_replies(id).await?;
            tracing::info!(%id, removed, "cascaded reply deletion");
            self.replies.remove(&id);
            self.expanded.remove(&id);
        }

        self.comments.retain(|c| c.id != id);
        for cached in self.replies.values_mut() {
            cached.retain(|c| c.id != id);
        }
        self.reply_counts.remove(&id);
        if let Some(parent_id) = target.parent_id
            && let Some(count) = self.reply_counts.get_mut(&parent_id)
        {
            *count = (*count - 1).max(0);
        }
        Ok(())
    }

    /// Set the admin reply on a comment; a blank reply clears it.
    ///
    /// # Errors
    ///
    /// Returns [`CommentError::Forbidden`] for non-admins and
    /// [`CommentError::NotFound`] for unknown ids or ids on another poem.
    pub async fn set_admin_reply(
        &mut self,
        actor: Actor,
        id: CommentId,
        reply: &str,
    ) -> Result<Comment, CommentError> {
        if !actor.role.is_admin() {
            return Err(CommentError::Forbidden);
        }
        let existing = self
            .store
            .get(id)
            .await?
            .filter(|c| c.poem_id == self.poem_id)
            .ok_or(CommentError::NotFound)?;

        let reply = non_blank(Some(reply)).map(str::to_string);
        let updated = self
            .store
            .set_admin_reply(existing.id, reply)
            .await?
            .ok_or(CommentError::NotFound)?;

        let cached = self
            .comments
            .iter_mut()
            .chain(self.replies.values_mut().flatten())
            .filter(|c| c.id == id);
        for comment in cached {
            comment.admin_reply.clone_from(&updated.admin_reply);
        }
        Ok(updated)
    }

    /// Loaded top-level comments, newest first.
    #[must_use]
    pub fn comments(&self) -> &[Comment] {
        &self.comments
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.comments.is_empty()
    }

    #[must_use]
    pub const fn has_more(&self) -> bool {
        self.has_more
    }

    /// Cursor for the next page, if another page may exist.
    #[must_use]
    pub fn next_cursor(&self) -> Option<Cursor> {
        self.cursor.filter(|_| self.has_more)
    }

    #[must_use]
    pub fn reply_count(&self, parent: CommentId) -> i64 {
        self.reply_counts.get(&parent).copied().unwrap_or(0)
    }

    #[must_use]
    pub fn cached_replies(&self, parent: CommentId) -> Option<&[Comment]> {
        self.replies.get(&parent).map(Vec::as_slice)
    }

    #[must_use]
    pub fn is_expanded(&self, parent: CommentId) -> bool {
        self.expanded.contains(&parent)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use std::collections::HashSet;

    use quill_core::{UserId, UserRole};

    use super::*;
    use crate::services::comments::memory::MemoryCommentStore;

    const POEM: PoemId = PoemId::new(1);
    const OTHER_POEM: PoemId = PoemId::new(2);

    fn settings(page_size: usize) -> CommentsConfig {
        CommentsConfig {
            page_size,
            orphan_policy: OrphanPolicy::Retain,
        }
    }

    fn reader(id: i32) -> Actor {
        Actor {
            user_id: UserId::new(id),
            role: UserRole::User,
        }
    }

    fn admin() -> Actor {
        Actor {
            user_id: UserId::new(99),
            role: UserRole::Admin,
        }
    }

    fn named(name: &str) -> AuthorProfile {
        AuthorProfile {
            name: Some(name.to_string()),
            display_name: None,
        }
    }

    #[tokio::test]
    async fn empty_poem_issues_no_count_query() {
        let store = MemoryCommentStore::new();
        let mut thread = CommentThread::new(&store, POEM, settings(50));

        thread.load_initial().await.unwrap();

        assert!(thread.is_empty());
        assert!(!thread.has_more());
        assert_eq!(store.log().count_queries, 0);
    }

    #[tokio::test]
    async fn reply_counts_use_one_query_per_page() {
        let store = MemoryCommentStore::new();
        let parents = store.seed_top_level(POEM, 5);
        store.seed_replies(POEM, parents[0], 3);
        store.seed_replies(POEM, parents[4], 1);

        let mut thread = CommentThread::new(&store, POEM, settings(50));
        thread.load_initial().await.unwrap();

        assert_eq!(store.log().count_queries, 1);
        assert_eq!(thread.reply_count(parents[0]), 3);
        assert_eq!(thread.reply_count(parents[4]), 1);
        assert_eq!(thread.reply_count(parents[2]), 0);
    }

    #[tokio::test]
    async fn pages_through_120_comments_without_duplicates() {
        let store = MemoryCommentStore::new();
        store.seed_top_level(POEM, 120);
        let mut thread = CommentThread::new(&store, POEM, settings(50));

        thread.load_initial().await.unwrap();
        assert_eq!(thread.comments().len(), 50);
        assert!(thread.has_more());

        assert_eq!(thread.load_more().await.unwrap().len(), 50);
        assert!(thread.has_more());

        assert_eq!(thread.load_more().await.unwrap().len(), 20);
        assert!(!thread.has_more());
        assert!(thread.next_cursor().is_none());
        assert!(thread.load_more().await.unwrap().is_empty());

        let ids: HashSet<CommentId> = thread.comments().iter().map(|c| c.id).collect();
        assert_eq!(ids.len(), 120);
        assert!(
            thread
                .comments()
                .windows(2)
                .all(|w| w[0].created_at >= w[1].created_at)
        );
        assert_eq!(store.log().top_level_queries, 3);
    }

    #[tokio::test]
    async fn resumed_thread_continues_after_cursor() {
        let store = MemoryCommentStore::new();
        store.seed_top_level(POEM, 120);

        let mut first = CommentThread::new(&store, POEM, settings(50));
        first.load_initial().await.unwrap();
        let cursor = first.next_cursor().unwrap();
        let seen: HashSet<CommentId> = first.comments().iter().map(|c| c.id).collect();

        let mut resumed = CommentThread::resume(&store, POEM, settings(50), cursor);
        let next = resumed.load_more().await.unwrap();
        assert_eq!(next.len(), 50);
        assert!(next.iter().all(|c| !seen.contains(&c.id)));
    }

    #[tokio::test]
    async fn next_page_reports_continuation() {
        let store = MemoryCommentStore::new();
        store.seed_top_level(POEM, 7);
        let mut first = CommentThread::new(&store, POEM, settings(5));
        first.load_initial().await.unwrap();

        let mut resumed =
            CommentThread::resume(&store, POEM, settings(5), first.next_cursor().unwrap());
        let page = resumed.next_page().await.unwrap();
        assert_eq!(page.comments.len(), 2);
        assert!(!page.has_more);
        assert!(page.next_cursor.is_none());
    }

    #[tokio::test]
    async fn exact_multiple_reports_one_extra_page() {
        let store = MemoryCommentStore::new();
        store.seed_top_level(POEM, 100);
        let mut thread = CommentThread::new(&store, POEM, settings(50));

        thread.load_initial().await.unwrap();
        thread.load_more().await.unwrap();
        assert!(thread.has_more());
        assert!(thread.load_more().await.unwrap().is_empty());
        assert!(!thread.has_more());
    }

    #[tokio::test]
    async fn posted_comment_appears_once_at_top() {
        let store = MemoryCommentStore::new();
        store.seed_top_level(POEM, 3);
        let mut thread = CommentThread::new(&store, POEM, settings(50));
        thread.load_initial().await.unwrap();

        let posted = thread
            .post(reader(7), &named("Mira"), "  the last stanza undid me  ", None)
            .await
            .unwrap();

        assert_eq!(posted.content, "the last stanza undid me");
        assert_eq!(posted.author_name, "Mira");
        let comments = thread.comments();
        assert_eq!(comments.len(), 4);
        assert_eq!(comments[0].id, posted.id);
        assert_eq!(comments.iter().filter(|c| c.id == posted.id).count(), 1);
        assert!(comments.windows(2).all(|w| w[0].created_at >= w[1].created_at));
    }

    #[tokio::test]
    async fn replies_are_ascending_and_fetched_once() {
        let store = MemoryCommentStore::new();
        let parents = store.seed_top_level(POEM, 2);
        store.seed_replies(POEM, parents[0], 4);
        let mut thread = CommentThread::new(&store, POEM, settings(50));
        thread.load_initial().await.unwrap();

        let shown = thread.toggle_replies(parents[0]).await.unwrap().unwrap();
        assert_eq!(shown.len(), 4);
        assert!(shown.windows(2).all(|w| w[0].created_at <= w[1].created_at));

        assert!(thread.toggle_replies(parents[0]).await.unwrap().is_none());
        assert!(!thread.is_expanded(parents[0]));
        assert!(thread.toggle_replies(parents[0]).await.unwrap().is_some());
        assert!(thread.is_expanded(parents[0]));

        assert_eq!(store.log().reply_queries_for(parents[0]), 1);
    }

    #[tokio::test]
    async fn reply_is_merged_into_cache_and_counted() {
        let store = MemoryCommentStore::new();
        let parents = store.seed_top_level(POEM, 1);
        store.seed_replies(POEM, parents[0], 2);
        let mut thread = CommentThread::new(&store, POEM, settings(50));
        thread.load_initial().await.unwrap();
        thread.toggle_replies(parents[0]).await.unwrap();
        let top_level_before = store.log().top_level_queries;

        let reply = thread
            .post(reader(3), &AuthorProfile::default(), "agreed", Some(parents[0]))
            .await
            .unwrap();

        assert_eq!(reply.author_name, "Anonymous");
        assert_eq!(thread.reply_count(parents[0]), 3);
        let cached = thread.cached_replies(parents[0]).unwrap();
        assert_eq!(cached.last().map(|c| c.id), Some(reply.id));
        assert_eq!(store.log().top_level_queries, top_level_before);
        assert_eq!(store.log().reply_queries_for(parents[0]), 1);
    }

    #[tokio::test]
    async fn reply_targets_are_validated() {
        let store = MemoryCommentStore::new();
        let parents = store.seed_top_level(POEM, 1);
        let foreign = store.seed_top_level(OTHER_POEM, 1);
        let nested = store.seed_replies(POEM, parents[0], 1);
        let mut thread = CommentThread::new(&store, POEM, settings(50));

        let missing = thread
            .post(reader(1), &named("a"), "hi", Some(CommentId::new(9999)))
            .await;
        assert!(matches!(missing, Err(CommentError::InvalidParent(_))));

        let other_poem = thread
            .post(reader(1), &named("a"), "hi", Some(foreign[0]))
            .await;
        assert!(matches!(other_poem, Err(CommentError::InvalidParent(_))));

        let too_deep = thread
            .post(reader(1), &named("a"), "hi", Some(nested[0]))
            .await;
        assert!(matches!(too_deep, Err(CommentError::InvalidParent(_))));

        let empty = thread.post(reader(1), &named("a"), "   ", None).await;
        assert!(matches!(empty, Err(CommentError::EmptyContent)));
    }

    #[tokio::test]
    async fn delete_prunes_lists_but_keeps_orphaned_replies() {
        let store = MemoryCommentStore::new();
        let parents = store.seed_top_level_owned(POEM, 2, UserId::new(5));
        let replies = store.seed_replies(POEM, parents[0], 2);
        let mut thread = CommentThread::new(&store, POEM, settings(50));
        thread.load_initial().await.unwrap();
        thread.toggle_replies(parents[0]).await.unwrap();

        thread.delete(reader(5), parents[0]).await.unwrap();

        assert!(thread.comments().iter().all(|c| c.id != parents[0]));
        assert_eq!(thread.reply_count(parents[0]), 0);
        assert_eq!(thread.cached_replies(parents[0]).map(<[_]>::len), Some(2));
        let orphans = store.replies(parents[0]).await.unwrap();
        assert_eq!(
            orphans.iter().map(|c| c.id).collect::<Vec<_>>(),
            replies
        );
    }

    #[tokio::test]
    async fn deleting_a_reply_removes_it_from_cache() {
        let store = MemoryCommentStore::new();
        let parents = store.seed_top_level(POEM, 1);
        let replies = store.seed_replies(POEM, parents[0], 3);
        let mut thread = CommentThread::new(&store, POEM, settings(50));
        thread.load_initial().await.unwrap();
        thread.toggle_replies(parents[0]).await.unwrap();

        thread.delete(admin(), replies[1]).await.unwrap();

        let cached = thread.cached_replies(parents[0]).unwrap();
        assert_eq!(cached.len(), 2);
        assert!(cached.iter().all(|c| c.id != replies[1]));
        assert_eq!(thread.reply_count(parents[0]), 2);
    }

    #[tokio::test]
    async fn cascade_policy_removes_replies() {
        let store = MemoryCommentStore::new();
        let parents = store.seed_top_level_owned(POEM, 1, UserId::new(5));
        store.seed_replies(POEM, parents[0], 2);
        let cascade = CommentsConfig {
            page_size: 50,
            orphan_policy: OrphanPolicy::Cascade,
        };
        let mut thread = CommentThread::new(&store, POEM, cascade);
        thread.load_initial().await.unwrap();
        thread.toggle_replies(parents[0]).await.unwrap();

        thread.delete(reader(5), parents[0]).await.unwrap();

        assert!(thread.cached_replies(parents[0]).is_none());
        assert!(store.replies(parents[0]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn only_owner_or_admin_may_delete() {
        let store = MemoryCommentStore::new();
        let parents = store.seed_top_level_owned(POEM, 1, UserId::new(5));
        let mut thread = CommentThread::new(&store, POEM, settings(50));
        thread.load_initial().await.unwrap();

        let denied = thread.delete(reader(6), parents[0]).await;
        assert!(matches!(denied, Err(CommentError::Forbidden)));
        assert_eq!(thread.comments().len(), 1);

        let wrong_poem = CommentThread::new(&store, OTHER_POEM, settings(50))
            .delete(admin(), parents[0])
            .await;
        assert!(matches!(wrong_poem, Err(CommentError::NotFound)));
    }

    #[tokio::test]
    async fn admin_reply_is_admin_only_and_blank_clears() {
        let store = MemoryCommentStore::new();
        let parents = store.seed_top_level(POEM, 1);
        let mut thread = CommentThread::new(&store, POEM, settings(50));
        thread.load_initial().await.unwrap();

        let denied = thread.set_admin_reply(reader(1), parents[0], "thanks").await;
        assert!(matches!(denied, Err(CommentError::Forbidden)));

        let set = thread
            .set_admin_reply(admin(), parents[0], "  Thank you for reading.  ")
            .await
            .unwrap();
        assert_eq!(set.visible_admin_reply(), Some("Thank you for reading."));
        assert_eq!(
            thread.comments()[0].admin_reply.as_deref(),
            Some("Thank you for reading.")
        );

        let cleared = thread.set_admin_reply(admin(), parents[0], "   ").await.unwrap();
        assert!(cleared.admin_reply.is_none());
    }
}

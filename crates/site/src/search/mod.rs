//! Full-text poem search using Tantivy.
//!
//! The app starts with an empty index. A background task builds the real
//! index from the `poems` table and swaps it in when ready; publishing a
//! poem triggers the same rebuild.

mod indexer;

use std::sync::{Arc, RwLock};

use tantivy::collector::TopDocs;
use tantivy::query::{BooleanQuery, FuzzyTermQuery, Occur, Query, RegexQuery, TermQuery};
use tantivy::schema::{
    Field, IndexRecordOption, STORED, Schema, TextFieldIndexing, TextOptions, Value,
};
use tantivy::{Index, IndexReader, ReloadPolicy, Term};
use tracing::instrument;

pub use indexer::{build_index, build_index_async};

/// Terms shorter than this are matched as title/author prefixes.
const PREFIX_TERM_LEN: usize = 3;

/// A matching poem.
#[derive(Debug, Clone)]
pub struct PoemHit {
    pub slug: String,
    pub title: String,
    pub author: String,
    pub excerpt: String,
    pub score: f32,
}

impl PoemHit {
    #[must_use]
    pub fn path(&self) -> String {
        format!("/poem/{}", self.slug)
    }
}

/// Schema field handles for the search index.
#[derive(Clone)]
pub struct SearchFields {
    // Stored fields (returned in results)
    pub slug: Field,
    pub title: Field,
    pub author: Field,
    pub excerpt: Field,
    // Indexed text fields
    pub title_text: Field,
    pub author_text: Field,
    pub content_text: Field,
}

struct ReadyIndex {
    reader: IndexReader,
    fields: SearchFields,
}

/// The search index.
///
/// Starts empty and is populated asynchronously by a background task.
#[derive(Clone)]
pub struct SearchIndex {
    inner: Arc<RwLock<Option<ReadyIndex>>>,
}

impl Default for SearchIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl SearchIndex {
    /// Create a new empty search index.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(None)),
        }
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.inner
            .read()
            .map(|guard| guard.is_some())
            .unwrap_or(false)
    }

    /// Swap in a freshly built index.
    ///
    /// # Errors
    ///
    /// Returns `SearchError::Index` if the reader cannot be created or the
    /// lock is poisoned.
    pub fn set_ready(&self, index: &Index, fields: SearchFields) -> Result<(), SearchError> {
        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()
            .map_err(|e| SearchError::Index(format!("Failed to create reader: {e}")))?;

        *self
            .inner
            .write()
            .map_err(|_| SearchError::Index("Lock poisoned".to_string()))? =
            Some(ReadyIndex { reader, fields });

        Ok(())
    }

    /// Build the schema for the search index.
    pub(crate) fn build_schema() -> (Schema, SearchFields) {
        let mut schema_builder = Schema::builder();

        let slug = schema_builder.add_text_field("slug", STORED);
        let title = schema_builder.add_text_field("title", STORED);
        let author = schema_builder.add_text_field("author", STORED);
        let excerpt = schema_builder.add_text_field("excerpt", STORED);

        let text_indexing = TextFieldIndexing::default()
            .set_tokenizer("en_stem")
            .set_index_option(IndexRecordOption::WithFreqsAndPositions);
        let text_options = TextOptions::default().set_indexing_options(text_indexing);

        let title_text = schema_builder.add_text_field("title_text", text_options.clone());
        let author_text = schema_builder.add_text_field("author_text", text_options.clone());
        let content_text = schema_builder.add_text_field("content_text", text_options);

        let schema = schema_builder.build();
        let fields = SearchFields {
            slug,
            title,
            author,
            excerpt,
            title_text,
            author_text,
            content_text,
        };

        (schema, fields)
    }

    /// Search poems by title, author and body.
    ///
    /// Returns empty results if the index isn't ready yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the index lock is poisoned or the search query fails.
    #[instrument(skip(self))]
    // The read guard must outlive `ready`, which borrows from it.
    #[allow(clippy::significant_drop_tightening)]
    pub fn search(&self, query_str: &str, limit: usize) -> Result<SearchResults, SearchError> {
        let query_str = query_str.trim().to_lowercase();
        if query_str.is_empty() {
            return Ok(SearchResults::default());
        }

        let guard = self
            .inner
            .read()
            .map_err(|_| SearchError::Index("Lock poisoned".to_string()))?;

        let Some(ready) = guard.as_ref() else {
            return Ok(SearchResults {
                query: query_str,
                ..Default::default()
            });
        };

        let searcher = ready.reader.searcher();
        let query = build_query(&ready.fields, &query_str);

        let top_docs = searcher
            .search(&query, &TopDocs::with_limit(limit.max(1)))
            .map_err(|e| SearchError::Query(format!("Search failed: {e}")))?;

        let mut poems = Vec::with_capacity(top_docs.len());
        for (score, doc_address) in top_docs {
            let doc = searcher
                .doc::<tantivy::TantivyDocument>(doc_address)
                .map_err(|e| SearchError::Query(format!("Failed to retrieve doc: {e}")))?;
            poems.push(doc_to_hit(&ready.fields, &doc, score));
        }

        Ok(SearchResults {
            poems,
            query: query_str,
        })
    }

    /// Get the number of documents in the index, or 0 if not ready.
    #[must_use]
    pub fn num_docs(&self) -> u64 {
        self.inner
            .read()
            .ok()
            .and_then(|guard| guard.as_ref().map(|r| r.reader.searcher().num_docs()))
            .unwrap_or(0)
    }
}

/// Short terms become prefix matches; longer terms match exactly or within
/// one edit.
fn build_query(fields: &SearchFields, query_str: &str) -> BooleanQuery {
    let mut subqueries: Vec<(Occur, Box<dyn Query>)> = Vec::new();

    for term in query_str.split_whitespace() {
        if term.chars().count() < PREFIX_TERM_LEN {
            let prefix_pattern = format!("{}.*", escape_regex(term));
            for field in [fields.title_text, fields.author_text] {
                if let Ok(regex_query) = RegexQuery::from_pattern(&prefix_pattern, field) {
                    subqueries.push((Occur::Should, Box::new(regex_query)));
                }
            }
        } else {
            let title_term = Term::from_field_text(fields.title_text, term);
            subqueries.push((
                Occur::Should,
                Box::new(TermQuery::new(title_term.clone(), IndexRecordOption::Basic)),
            ));
            subqueries.push((
                Occur::Should,
                Box::new(FuzzyTermQuery::new(title_term, 1, true)),
            ));

            let author_term = Term::from_field_text(fields.author_text, term);
            subqueries.push((
                Occur::Should,
                Box::new(TermQuery::new(author_term, IndexRecordOption::Basic)),
            ));

            let content_term = Term::from_field_text(fields.content_text, term);
            subqueries.push((
                Occur::Should,
                Box::new(FuzzyTermQuery::new(content_term, 1, true)),
            ));
        }
    }

    BooleanQuery::new(subqueries)
}

fn escape_regex(term: &str) -> String {
    term.chars()
        .flat_map(|c| match c {
            '.' | '*' | '+' | '?' | '^' | '$' | '(' | ')' | '[' | ']' | '{' | '}' | '|' | '\\' => {
                vec!['\\', c]
            }
            _ => vec![c],
        })
        .collect()
}

fn doc_to_hit(fields: &SearchFields, doc: &tantivy::TantivyDocument, score: f32) -> PoemHit {
    let get_text = |field: Field| -> String {
        doc.get_first(field)
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string()
    };

    PoemHit {
        slug: get_text(fields.slug),
        title: get_text(fields.title),
        author: get_text(fields.author),
        excerpt: get_text(fields.excerpt),
        score,
    }
}

/// Poems matching a query.
#[derive(Debug, Default)]
pub struct SearchResults {
    pub poems: Vec<PoemHit>,
    pub query: String,
}

impl SearchResults {
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.poems.is_empty()
    }
}

/// Search errors.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("Index error: {0}")]
    Index(String),
    #[error("Query error: {0}")]
    Query(String),
    #[error("Build error: {0}")]
    Build(String),
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use chrono::Utc;

    use quill_core::{PoemId, Slug};

    use super::*;
    use crate::models::Poem;

    fn poem(id: i32, title: &str, author: &str, content: &str) -> Poem {
        Poem {
            id: PoemId::new(id),
            title: title.to_string(),
            author: author.to_string(),
            content: content.to_string(),
            slug: Slug::from_title(title).unwrap(),
            posted_at: Utc::now(),
            views: 0,
            likes: 0,
        }
    }

    fn ready_index() -> SearchIndex {
        let poems = vec![
            poem(1, "The River Song", "Amara Eze", "Water carries every name downstream."),
            poem(2, "Harbour Lights", "Tomas Reyes", "Boats asleep beneath a lantern sky."),
            poem(3, "Winter Orchard", "Amara Eze", "Frost settles on the apple branches."),
        ];
        let (index, fields) = build_index(&poems).unwrap();
        let search = SearchIndex::new();
        search.set_ready(&index, fields).unwrap();
        search
    }

    #[test]
    fn empty_index_returns_no_results() {
        let search = SearchIndex::new();
        assert!(!search.is_ready());
        let results = search.search("river", 10).unwrap();
        assert!(results.is_empty());
        assert_eq!(results.query, "river");
    }

    #[test]
    fn matches_title_terms() {
        let results = ready_index().search("River", 10).unwrap();
        assert_eq!(results.poems[0].slug, "the-river-song");
        assert_eq!(results.poems[0].path(), "/poem/the-river-song");
    }

    #[test]
    fn matches_body_with_typo() {
        let results = ready_index().search("lanterm", 10).unwrap();
        assert_eq!(results.poems.len(), 1);
        assert_eq!(results.poems[0].title, "Harbour Lights");
    }

    #[test]
    fn short_terms_match_prefixes() {
        let results = ready_index().search("wi", 10).unwrap();
        assert!(results.poems.iter().any(|p| p.slug == "winter-orchard"));
    }

    #[test]
    fn matches_author_names() {
        let results = ready_index().search("amara", 10).unwrap();
        assert_eq!(results.poems.len(), 2);
    }

    #[test]
    fn blank_query_short_circuits() {
        assert!(ready_index().search("   ", 10).unwrap().is_empty());
    }

    #[test]
    fn regex_metacharacters_are_escaped() {
        assert_eq!(escape_regex("a.b"), "a\\.b");
        assert_eq!(escape_regex("(x"), "\\(x");
        assert_eq!(escape_regex("ok"), "ok");
    }
}

//! Search index builder.

use sqlx::PgPool;
use tantivy::Index;
use tracing::{error, info, instrument, warn};

use crate::db::PoemRepository;
use crate::models::Poem;
use crate::models::poem::preview;

use super::{SearchError, SearchFields, SearchIndex};

const EXCERPT_CHARS: usize = 160;

/// Spawn a background task that rebuilds the index from the database.
///
/// Until the first build completes, `SearchIndex::search()` returns empty
/// results. Later calls replace the live index when they finish.
pub fn build_index_async(search_index: SearchIndex, pool: PgPool) {
    info!("Spawning background search index build task");
    tokio::spawn(async move {
        let poems = match PoemRepository::new(&pool).all().await {
            Ok(poems) => poems,
            Err(e) => {
                error!(error = %e, "Failed to load poems for indexing");
                return;
            }
        };

        let built = tokio::task::spawn_blocking(move || build_index(&poems)).await;
        match built {
            Ok(Ok((index, fields))) => {
                if let Err(e) = search_index.set_ready(&index, fields) {
                    error!(error = %e, "Failed to set search index as ready");
                } else {
                    info!(docs = search_index.num_docs(), "Search index is now ready");
                }
            }
            Ok(Err(e)) => error!(error = %e, "Failed to build search index"),
            Err(e) => error!(error = %e, "Search index build task panicked"),
        }
    });
}

/// Build an in-memory index over `poems`.
///
/// # Errors
///
/// Returns `SearchError::Build` if the writer cannot be created or the
/// commit fails.
#[instrument(skip_all, fields(poems = poems.len()))]
pub fn build_index(poems: &[Poem]) -> Result<(Index, SearchFields), SearchError> {
    let (schema, fields) = SearchIndex::build_schema();
    let index = Index::create_in_ram(schema);

    index.tokenizers().register(
        "en_stem",
        tantivy::tokenizer::TextAnalyzer::builder(tantivy::tokenizer::SimpleTokenizer::default())
            .filter(tantivy::tokenizer::RemoveLongFilter::limit(40))
            .filter(tantivy::tokenizer::LowerCaser)
            .filter(tantivy::tokenizer::Stemmer::new(
                tantivy::tokenizer::Language::English,
            ))
            .build(),
    );

    let mut writer = index
        .writer(50_000_000)
        .map_err(|e| SearchError::Build(format!("Failed to create writer: {e}")))?;

    let mut count = 0usize;
    for poem in poems {
        let doc = tantivy::doc!(
            fields.slug => poem.slug.as_str(),
            fields.title => poem.title.clone(),
            fields.author => poem.author.clone(),
            fields.excerpt => preview(&poem.content, EXCERPT_CHARS),
            fields.title_text => poem.title.clone(),
            fields.author_text => poem.author.clone(),
            fields.content_text => poem.content.clone()
        );

        if let Err(e) = writer.add_document(doc) {
            warn!(error = %e, slug = %poem.slug, "Failed to index poem");
        } else {
            count += 1;
        }
    }

    writer
        .commit()
        .map_err(|e| SearchError::Build(format!("Failed to commit index: {e}")))?;

    info!(count, "Search index built");
    Ok((index, fields))
}

//! Seed the poems table from a YAML file.
//!
//! ```yaml
//! - title: The Tyger
//!   author: William Blake
//!   content: |
//!     Tyger Tyger, burning bright,
//!     In the forests of the night;
//! ```
//!
//! Poems go through the same insert path as approved requests, so slugs
//! are derived and de-duplicated the same way. Search picks them up on
//! the next site start.

use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use quill_site::db::{PoemRepository, RepositoryError};
use quill_site::models::NewPoem;

use super::{ConnectError, connect};

pub const DEFAULT_SEED_FILE: &str = "crates/cli/seed/poems.yaml";

#[derive(Debug, Error)]
pub enum SeedError {
    #[error(transparent)]
    Connect(#[from] ConnectError),

    #[error("Failed to read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("Invalid seed file: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Seed entry {0} has an empty title or content")]
    EmptyEntry(usize),

    #[error("Database error: {0}")]
    Repository(#[from] RepositoryError),
}

#[derive(Debug, Deserialize)]
struct SeedPoem {
    title: String,
    author: String,
    content: String,
}

fn parse_seed(raw: &str) -> Result<Vec<NewPoem>, SeedError> {
    let entries: Vec<SeedPoem> = serde_yaml::from_str(raw)?;
    entries
        .into_iter()
        .enumerate()
        .map(|(i, entry)| {
            let title = entry.title.trim();
            let content = entry.content.trim_end();
            if title.is_empty() || content.trim().is_empty() {
                return Err(SeedError::EmptyEntry(i + 1));
            }
            Ok(NewPoem {
                title: title.to_owned(),
                author: entry.author.trim().to_owned(),
                content: content.to_owned(),
            })
        })
        .collect()
}

/// Insert every poem in `file_path`, returning how many were added.
///
/// # Errors
///
/// Returns an error if the file is unreadable or malformed, or an insert fails.
pub async fn poems(file_path: &str) -> Result<usize, SeedError> {
    let raw = std::fs::read_to_string(Path::new(file_path)).map_err(|source| SeedError::Read {
        path: file_path.to_owned(),
        source,
    })?;
    let poems = parse_seed(&raw)?;
    tracing::info!("Loaded {} poems from {file_path}", poems.len());

    let pool = connect().await?;
    let repo = PoemRepository::new(&pool);
    for poem in &poems {
        let inserted = repo.insert(poem).await?;
        tracing::info!(slug = %inserted.slug, "Inserted \"{}\"", inserted.title);
    }
    Ok(poems.len())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn parses_entries_and_trims() {
        let raw = "- title: '  Ode  '\n  author: Anon\n  content: |\n    line one\n    line two\n";
        let poems = parse_seed(raw).unwrap();
        assert_eq!(poems.len(), 1);
        assert_eq!(poems[0].title, "Ode");
        assert_eq!(poems[0].content, "line one\nline two");
    }

    #[test]
    fn rejects_empty_content() {
        let raw = "- title: Ode\n  author: Anon\n  content: '   '\n";
        assert!(matches!(parse_seed(raw), Err(SeedError::EmptyEntry(1))));
    }

    #[test]
    fn shipped_seed_file_parses() {
        let raw = include_str!("../../seed/poems.yaml");
        assert!(!parse_seed(raw).unwrap().is_empty());
    }
}

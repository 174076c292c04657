//! Markdown informational pages.
//!
//! Every `*.md` file under the content directory is loaded at startup,
//! its YAML frontmatter parsed, and its body rendered to HTML. The file
//! stem becomes the page slug, so `about.md` serves `/about`.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use chrono::NaiveDate;
use comrak::{Options, markdown_to_html};
use gray_matter::{Matter, ParsedEntity, engine::YAML};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct PageMeta {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub updated_at: Option<NaiveDate>,
}

/// A rendered page with metadata and HTML content
#[derive(Debug, Clone)]
pub struct Page {
    pub slug: String,
    pub meta: PageMeta,
    pub content_html: String,
}

/// Pages held in memory for the life of the process.
#[derive(Debug, Clone, Default)]
pub struct ContentStore {
    pages: Arc<HashMap<String, Page>>,
}

impl ContentStore {
    /// Load every page in `content_dir`.
    ///
    /// A missing directory yields an empty store. Files that fail to parse
    /// are logged and skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory exists but cannot be read.
    pub fn load(content_dir: &Path) -> Result<Self, ContentError> {
        let mut pages = HashMap::new();

        if !content_dir.exists() {
            tracing::warn!("Content directory does not exist: {:?}", content_dir);
            return Ok(Self::default());
        }

        let entries =
            std::fs::read_dir(content_dir).map_err(|e| ContentError::Io(e.to_string()))?;

        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().is_none_or(|ext| ext != "md") {
                continue;
            }
            match Self::load_page(&path) {
                Ok(page) => {
                    tracing::info!("Loaded page: {}", page.slug);
                    pages.insert(page.slug.clone(), page);
                }
                Err(e) => tracing::error!("Failed to load page {:?}: {}", path, e),
            }
        }

        Ok(Self {
            pages: Arc::new(pages),
        })
    }

    fn load_page(path: &Path) -> Result<Page, ContentError> {
        let raw = std::fs::read_to_string(path).map_err(|e| ContentError::Io(e.to_string()))?;
        let slug = path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| ContentError::Parse("Invalid filename".to_string()))?;
        parse_page(slug, &raw)
    }

    #[must_use]
    pub fn get_page(&self, slug: &str) -> Option<&Page> {
        self.pages.get(slug)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.pages.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }
}

/// Parse frontmatter and render one page.
///
/// # Errors
///
/// Returns `ContentError::Parse` if the frontmatter is missing or invalid.
pub fn parse_page(slug: &str, raw: &str) -> Result<Page, ContentError> {
    let matter = Matter::<YAML>::new();
    let parsed: ParsedEntity<PageMeta> = matter
        .parse(raw)
        .map_err(|e| ContentError::Parse(format!("Failed to parse frontmatter: {e}")))?;
    let meta = parsed
        .data
        .ok_or_else(|| ContentError::Parse("Missing frontmatter".to_string()))?;

    Ok(Page {
        slug: slug.to_string(),
        meta,
        content_html: render_markdown(&parsed.content),
    })
}

/// Render markdown to HTML with GitHub Flavored Markdown extensions.
///
/// Raw HTML in the source is escaped.
fn render_markdown(content: &str) -> String {
    let mut options = Options::default();

    options.extension.strikethrough = true;
    options.extension.table = true;
    options.extension.autolink = true;
    options.extension.header_ids = Some(String::new());
    options.extension.footnotes = true;

    markdown_to_html(content, &options)
}

/// Content loading errors
#[derive(Debug, thiserror::Error)]
pub enum ContentError {
    #[error("IO error: {0}")]
    Io(String),
    #[error("Parse error: {0}")]
    Parse(String),
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const ABOUT: &str = "---\ntitle: About Quill\ndescription: Who we are\nupdated_at: 2025-02-01\n---\n\n# Hello\n\nA home for **short** poems.\n";

    #[test]
    fn parses_frontmatter_and_renders_body() {
        let page = parse_page("about", ABOUT).unwrap();
        assert_eq!(page.slug, "about");
        assert_eq!(page.meta.title, "About Quill");
        assert_eq!(page.meta.description.as_deref(), Some("Who we are"));
        assert_eq!(
            page.meta.updated_at,
            NaiveDate::from_ymd_opt(2025, 2, 1)
        );
        assert!(page.content_html.contains("<strong>short</strong>"));
        assert!(page.content_html.contains("<h1"));
    }

    #[test]
    fn missing_frontmatter_is_an_error() {
        assert!(matches!(
            parse_page("bare", "# just markdown"),
            Err(ContentError::Parse(_))
        ));
    }

    #[test]
    fn raw_html_is_not_passed_through() {
        let page = parse_page("x", "---\ntitle: X\n---\n<script>alert(1)</script>\n").unwrap();
        assert!(!page.content_html.contains("<script>"));
    }

    #[test]
    fn loads_shipped_pages() {
        let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("content");
        let store = ContentStore::load(&dir).unwrap();
        assert!(store.get_page("about").is_some());
        assert!(store.get_page("everything-about-project").is_some());
    }

    #[test]
    fn missing_directory_is_empty() {
        let store = ContentStore::load(Path::new("/nonexistent/quill-content")).unwrap();
        assert!(store.is_empty());
    }
}

//! Idempotent batch sync of all publishable content into the search index.
//!
//! The convergence mechanism after degraded publishes and corpus resets:
//! safe to run any number of times, never deletes documents (deletion is an
//! explicit operation on unpublish).

use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::error::StoreError;
use crate::config::Config;
use crate::kernel::retry::{with_retries, DEFAULT_ATTEMPTS};
use crate::kernel::search_index::is_transient_search_error;
use crate::kernel::traits::SearchDocument;
use crate::kernel::ServerKernel;

/// Upsert batch bound; keeps individual requests to the hosted service small.
pub const REINDEX_BATCH_SIZE: usize = 50;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReindexReport {
    pub indexed: usize,
    pub failed: usize,
}

pub struct ReindexJob {
    kernel: Arc<ServerKernel>,
    article_index: String,
    static_pages_index: String,
    static_pages_dir: Option<PathBuf>,
}

impl ReindexJob {
    pub fn new(
        kernel: Arc<ServerKernel>,
        article_index: impl Into<String>,
        static_pages_index: impl Into<String>,
        static_pages_dir: Option<PathBuf>,
    ) -> Self {
        Self {
            kernel,
            article_index: article_index.into(),
            static_pages_index: static_pages_index.into(),
            static_pages_dir,
        }
    }

    pub fn from_config(kernel: Arc<ServerKernel>, config: &Config) -> Self {
        Self::new(
            kernel,
            config.article_index.clone(),
            config.static_pages_index.clone(),
            config.static_pages_dir.clone().map(PathBuf::from),
        )
    }

    /// Enumerates static pages and live published snapshots, builds one
    /// document per item and upserts in bounded batches. Batch failures are
    /// counted and logged, never abort the run.
    #[tracing::instrument(skip(self))]
    pub async fn run(&self) -> Result<ReindexReport, StoreError> {
        let mut report = ReindexReport::default();

        if let Some(dir) = &self.static_pages_dir {
            match load_static_pages(dir) {
                Ok(docs) => {
                    self.upsert_batches(&self.static_pages_index, &docs, &mut report)
                        .await
                }
                Err(error) => {
                    tracing::warn!(dir = %dir.display(), error = %error, "skipping static pages")
                }
            }
        }

        let articles = self.kernel.articles.list_published().await?;
        let docs: Vec<SearchDocument> = articles
            .iter()
            .filter(|a| a.live)
            .map(|a| a.search_document())
            .collect();
        self.upsert_batches(&self.article_index, &docs, &mut report)
            .await;

        tracing::info!(
            indexed = report.indexed,
            failed = report.failed,
            "reindex complete"
        );
        Ok(report)
    }

    async fn upsert_batches(
        &self,
        index: &str,
        docs: &[SearchDocument],
        report: &mut ReindexReport,
    ) {
        for batch in docs.chunks(REINDEX_BATCH_SIZE) {
            let result = with_retries(
                "reindex batch",
                DEFAULT_ATTEMPTS,
                is_transient_search_error,
                || self.kernel.search.upsert(index, batch),
            )
            .await;

            match result {
                Ok(accepted) => report.indexed += accepted,
                Err(error) => {
                    tracing::warn!(index, batch_len = batch.len(), error = %error, "batch upsert failed");
                    report.failed += batch.len();
                }
            }
        }
    }
}

/// Reads `*.md` files from the static pages directory, splits each on
/// second-level headings and builds a document per section with the stable
/// id `{page}-{section_index}`.
fn load_static_pages(dir: &Path) -> anyhow::Result<Vec<SearchDocument>> {
    let mut docs = Vec::new();
    let mut entries: Vec<_> = std::fs::read_dir(dir)?
        .collect::<Result<Vec<_>, _>>()?
        .into_iter()
        .map(|e| e.path())
        .filter(|p| p.extension().is_some_and(|ext| ext == "md"))
        .collect();
    entries.sort();

    for path in entries {
        let Some(page) = path.file_stem().and_then(|s| s.to_str()).map(String::from) else {
            continue;
        };
        let markdown = std::fs::read_to_string(&path)?;
        for (i, section) in split_sections(&markdown).into_iter().enumerate() {
            docs.push(SearchDocument {
                object_id: format!("{page}-{i}"),
                title: page.clone(),
                url: format!("/{page}"),
                text: section,
                published_at_ms: 0,
                year: String::new(),
                author_ids: vec![],
            });
        }
    }
    Ok(docs)
}

/// Splits markdown into sections at `## ` headings; the heading starts the
/// next section.
fn split_sections(markdown: &str) -> Vec<String> {
    let mut sections = Vec::new();
    let mut current = String::new();

    for line in markdown.lines() {
        if line.starts_with("## ") && !current.trim().is_empty() {
            sections.push(current.trim().to_string());
            current.clear();
        }
        current.push_str(line);
        current.push('\n');
    }
    if !current.trim().is_empty() {
        sections.push(current.trim().to_string());
    }
    sections
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sections_split_on_second_level_headings() {
        let md = "# Page\n\nintro text\n\n## First\n\nbody one\n\n## Second\n\nbody two\n";
        let sections = split_sections(md);
        assert_eq!(sections.len(), 3);
        assert!(sections[0].starts_with("# Page"));
        assert!(sections[1].starts_with("## First"));
        assert!(sections[2].starts_with("## Second"));
    }

    #[test]
    fn heading_only_documents_produce_one_section() {
        let sections = split_sections("## Only\ntext");
        assert_eq!(sections, vec!["## Only\ntext".to_string()]);
    }

    #[test]
    fn blank_markdown_produces_no_sections() {
        assert!(split_sections("\n\n").is_empty());
    }
}

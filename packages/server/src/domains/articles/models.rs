use chrono::{DateTime, Datelike, Utc};
use serde::Serialize;
use sqlx::FromRow;

use crate::common::ArticleContent;
use crate::kernel::traits::SearchDocument;

/// A mutable article owned by the editing workflow.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct DraftArticle {
    pub id: i64,
    pub title: String,
    pub canonical_url: String,
    #[sqlx(json)]
    pub content: ArticleContent,
    pub author_ids: Vec<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An immutable published snapshot. Lives in an identity space independent
/// from drafts; `draft_id` is a back-reference only.
///
/// `live` is false between the snapshot commit and the confirmation that
/// every referenced asset exists in the published bucket.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct PublishedArticle {
    pub id: i64,
    pub draft_id: i64,
    pub title: String,
    pub canonical_url: String,
    #[sqlx(json)]
    pub content: ArticleContent,
    pub author_ids: Vec<i64>,
    pub live: bool,
    pub published_at: DateTime<Utc>,
}

impl PublishedArticle {
    /// The search document derived from this snapshot. Identifiers are
    /// stable, so repeated upserts converge to one document.
    pub fn search_document(&self) -> SearchDocument {
        SearchDocument {
            object_id: self.id.to_string(),
            title: self.title.clone(),
            url: self.canonical_url.clone(),
            text: self.content.preview_text(),
            published_at_ms: self.published_at.timestamp_millis(),
            year: self.published_at.year().to_string(),
            author_ids: self.author_ids.clone(),
        }
    }
}

/// Insert payload for a new draft.
#[derive(Debug, Clone)]
pub struct NewDraftArticle {
    pub title: String,
    pub canonical_url: String,
    pub content: ArticleContent,
    pub author_ids: Vec<i64>,
}

/// Insert payload for a new published snapshot (committed not-yet-live).
#[derive(Debug, Clone)]
pub struct NewPublishedArticle {
    pub draft_id: i64,
    pub title: String,
    pub canonical_url: String,
    pub content: ArticleContent,
    pub author_ids: Vec<i64>,
}

/// Row counts of both metadata tables, used by the reset report and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableCounts {
    pub drafts: i64,
    pub published: i64,
}

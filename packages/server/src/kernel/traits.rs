// Trait definitions for dependency injection
//
// These are INFRASTRUCTURE traits only - no business logic.
// Business logic (like publishing) lives in domain code that uses these traits.
//
// Naming convention: Base* for trait names (e.g., BaseArticleStore)

use std::fmt;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::object_storage::StorageError;
use crate::common::ArticleContent;
use crate::domains::articles::error::StoreError;
use crate::domains::articles::models::{
    DraftArticle, NewDraftArticle, NewPublishedArticle, PublishedArticle, TableCounts,
};

// =============================================================================
// Metadata Store (Infrastructure - Postgres in production)
// =============================================================================

/// CRUD over draft/published article rows. The source of truth for identity
/// and publish-state; canonical-URL uniqueness is enforced here (store-level
/// constraint), never check-then-insert in callers.
#[async_trait]
pub trait BaseArticleStore: Send + Sync {
    async fn create_draft(&self, new: NewDraftArticle) -> Result<DraftArticle, StoreError>;

    async fn get_draft(&self, draft_id: i64) -> Result<Option<DraftArticle>, StoreError>;

    async fn list_drafts(&self) -> Result<Vec<DraftArticle>, StoreError>;

    async fn update_draft_content(
        &self,
        draft_id: i64,
        content: &ArticleContent,
    ) -> Result<(), StoreError>;

    /// Returns false when no such draft existed.
    async fn delete_draft(&self, draft_id: i64) -> Result<bool, StoreError>;

    /// Commits a new published snapshot with `live = false`. Fails with
    /// `UniqueViolation` on a colliding canonical url or an already-published
    /// draft id.
    async fn insert_published(
        &self,
        new: NewPublishedArticle,
    ) -> Result<PublishedArticle, StoreError>;

    async fn get_published(&self, id: i64) -> Result<Option<PublishedArticle>, StoreError>;

    async fn find_published_by_draft(
        &self,
        draft_id: i64,
    ) -> Result<Option<PublishedArticle>, StoreError>;

    async fn list_published(&self) -> Result<Vec<PublishedArticle>, StoreError>;

    /// Flips a snapshot live once its assets are confirmed in the published
    /// bucket.
    async fn mark_live(&self, id: i64) -> Result<(), StoreError>;

    async fn delete_published(&self, id: i64) -> Result<bool, StoreError>;

    /// Destructive: empties both tables and restarts identity sequences.
    async fn truncate_all(&self) -> Result<(), StoreError>;

    async fn counts(&self) -> Result<TableCounts, StoreError>;
}

// =============================================================================
// Object Storage (Infrastructure - S3 buckets in production)
// =============================================================================

/// The two bucket namespaces asset objects live in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bucket {
    Draft,
    Published,
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Bucket::Draft => f.write_str("draft"),
            Bucket::Published => f.write_str("published"),
        }
    }
}

/// Whether a copy wrote the destination or found it already there.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyOutcome {
    Copied,
    AlreadyPresent,
}

/// Per-item binary assets in draft/published bucket namespaces.
#[async_trait]
pub trait BaseObjectStorage: Send + Sync {
    async fn exists(&self, bucket: Bucket, key: &str) -> Result<bool, StorageError>;

    /// Copies one object between buckets. Checks destination existence first
    /// and skips already-copied objects, so re-running after partial failure
    /// is safe.
    async fn copy(
        &self,
        src: Bucket,
        src_key: &str,
        dst: Bucket,
        dst_key: &str,
    ) -> Result<CopyOutcome, StorageError>;

    /// Recursively deletes every object under the prefix, paginating
    /// exhaustively. A mid-pagination failure surfaces as
    /// `StorageError::IncompleteDeletion`, never as success. Returns the
    /// number of deleted objects.
    async fn delete_prefix(&self, bucket: Bucket, prefix: &str) -> Result<u64, StorageError>;

    /// Public URL for an object.
    fn url_for(&self, bucket: Bucket, key: &str) -> String;
}

// =============================================================================
// Search Index (Infrastructure - hosted text-search service)
// =============================================================================

/// One document in the text-search index. A fully derivable cache, never
/// authoritative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchDocument {
    #[serde(rename = "objectID")]
    pub object_id: String,
    pub title: String,
    pub url: String,
    pub text: String,
    pub published_at_ms: i64,
    pub year: String,
    pub author_ids: Vec<i64>,
}

/// Upserts/deletes documents in the remote index.
///
/// Upsert is idempotent on the document identifier. The remote commit is
/// asynchronous: this adapter never guarantees read-after-write, and callers
/// must not depend on immediate queryability.
#[async_trait]
pub trait BaseSearchIndex: Send + Sync {
    /// Returns the number of accepted documents.
    async fn upsert(&self, index: &str, documents: &[SearchDocument]) -> Result<usize>;

    async fn delete(&self, index: &str, ids: &[String]) -> Result<()>;
}

use std::fmt;

use thiserror::Error;

use crate::kernel::object_storage::StorageError;

/// Metadata-store errors. Unique violations are constraint outcomes and are
/// never retried; everything else is a database failure.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("unique constraint {constraint} violated")]
    UniqueViolation { constraint: String },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl StoreError {
    pub fn is_transient(&self) -> bool {
        match self {
            StoreError::UniqueViolation { .. } => false,
            StoreError::Database(e) => matches!(
                e,
                sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed
            ),
        }
    }
}

/// The independently-resumable steps of the publish pipeline. Reported in
/// `PublishError::StepFailed` so a retry knows where the previous attempt
/// stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishStep {
    Snapshot,
    AssetCopy,
    MarkLive,
    SearchUpsert,
    SearchDelete,
    DraftRestore,
}

impl fmt::Display for PublishStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PublishStep::Snapshot => "snapshot",
            PublishStep::AssetCopy => "asset-copy",
            PublishStep::MarkLive => "mark-live",
            PublishStep::SearchUpsert => "search-upsert",
            PublishStep::SearchDelete => "search-delete",
            PublishStep::DraftRestore => "draft-restore",
        };
        f.write_str(name)
    }
}

/// Errors of the publish orchestrator and its administrative operations.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("draft article {0} not found")]
    DraftNotFound(i64),

    #[error("published article {0} not found")]
    PublishedNotFound(i64),

    #[error("draft article {0} has an empty canonical url")]
    EmptyCanonicalUrl(i64),

    #[error("canonical url {url:?} is already used by another published article")]
    DuplicateCanonicalUrl { url: String },

    #[error("draft article {draft_id} is already published as article {published_id}")]
    AlreadyPublished { draft_id: i64, published_id: i64 },

    #[error("publish step {step} failed for article {article_id}")]
    StepFailed {
        step: PublishStep,
        article_id: i64,
        #[source]
        source: anyhow::Error,
    },

    #[error("corpus reset requires an explicit confirmation")]
    ResetNotConfirmed,

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

//! Article domain: draft/published lifecycle, cross-store publish pipeline,
//! duplicate detection and search reindexing.

pub mod duplicates;
pub mod error;
pub mod models;
pub mod publish;
pub mod reindex;
pub mod store;

pub use duplicates::{find_duplicates, ArticleRef};
pub use error::{PublishError, PublishStep, StoreError};
pub use models::{DraftArticle, NewDraftArticle, NewPublishedArticle, PublishedArticle, TableCounts};
pub use publish::{PublishOrchestrator, PublishOutcome, ResetConfirmation, ResetReport};
pub use reindex::{ReindexJob, ReindexReport};
pub use store::PostgresArticleStore;

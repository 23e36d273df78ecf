//! The publish orchestrator: Draft -> Published transitions and full-corpus
//! reset across the metadata store, the bucket pair and the search index.
//!
//! There is no distributed transaction. The published row commit is the
//! durability boundary; every later step is idempotent and id-keyed, so an
//! interrupted publish leaves partial, resumable state and a retry completes
//! only the remaining steps.

use std::sync::Arc;

use crate::kernel::retry::{with_retries, DEFAULT_ATTEMPTS};
use crate::kernel::search_index::is_transient_search_error;
use crate::kernel::traits::{Bucket, CopyOutcome};
use crate::kernel::{ServerKernel, StorageError};

use super::error::{PublishError, PublishStep, StoreError};
use super::models::{DraftArticle, NewDraftArticle, NewPublishedArticle, PublishedArticle};
use crate::common::normalize_canonical_url;

/// Result of a publish call. `search_synced == false` is a degraded success:
/// the article is live but its search document was not accepted; the caller
/// should schedule a reindex rather than treat the publish as failed.
#[derive(Debug)]
pub struct PublishOutcome {
    pub article: PublishedArticle,
    pub search_synced: bool,
}

/// Explicit confirmation for the destructive corpus reset. Constructed only
/// from the exact confirmation phrase; `reset_all` refuses to run without it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetConfirmation {
    EraseAllContent,
}

impl ResetConfirmation {
    pub const PHRASE: &'static str = "erase-all-content";

    pub fn from_phrase(phrase: &str) -> Option<Self> {
        (phrase == Self::PHRASE).then_some(Self::EraseAllContent)
    }
}

/// What a corpus reset removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResetReport {
    pub draft_objects_deleted: u64,
    pub published_objects_deleted: u64,
}

pub struct PublishOrchestrator {
    kernel: Arc<ServerKernel>,
    article_index: String,
}

impl PublishOrchestrator {
    pub fn new(kernel: Arc<ServerKernel>, article_index: impl Into<String>) -> Self {
        Self {
            kernel,
            article_index: article_index.into(),
        }
    }

    /// Publishes a draft. Steps, each independently resumable:
    ///
    /// 1. Commit the published snapshot (`live = false`), keyed by draft id.
    /// 2. Copy referenced assets into the published bucket, skipping objects
    ///    already there, then flip the row live.
    /// 3. Upsert the search document (best-effort; degrades the outcome).
    ///
    /// Asset copy and search upsert run concurrently; both resolve before
    /// this returns. Publishing an already-live draft fails with
    /// `AlreadyPublished`, never a duplicate row.
    #[tracing::instrument(skip(self))]
    pub async fn publish(&self, draft_id: i64) -> Result<PublishOutcome, PublishError> {
        let store = &self.kernel.articles;

        let mut article = match store.find_published_by_draft(draft_id).await? {
            Some(existing) if existing.live => {
                return Err(PublishError::AlreadyPublished {
                    draft_id,
                    published_id: existing.id,
                });
            }
            Some(existing) => {
                tracing::info!(published_id = existing.id, "resuming interrupted publish");
                existing
            }
            None => self.snapshot(draft_id).await?,
        };

        let copy_and_flip = async {
            if !article.live {
                self.copy_assets(&article).await?;
                self.mark_live(&article).await?;
            }
            Ok::<(), PublishError>(())
        };
        let upsert = self.upsert_search_document(&article);

        let (copy_result, search_result) = tokio::join!(copy_and_flip, upsert);
        copy_result?;
        article.live = true;

        let search_synced = match search_result {
            Ok(()) => true,
            Err(error) => {
                tracing::warn!(
                    article_id = article.id,
                    error = %error,
                    "search upsert failed, article is live; reindex will converge"
                );
                false
            }
        };

        tracing::info!(
            article_id = article.id,
            canonical_url = %article.canonical_url,
            search_synced,
            "article published"
        );
        Ok(PublishOutcome {
            article,
            search_synced,
        })
    }

    /// Step 1: commit the snapshot. The unique indexes on `draft_id` and the
    /// normalized canonical url close both publish races at the store level.
    async fn snapshot(&self, draft_id: i64) -> Result<PublishedArticle, PublishError> {
        let store = &self.kernel.articles;
        let storage = &self.kernel.storage;

        let draft = store
            .get_draft(draft_id)
            .await?
            .ok_or(PublishError::DraftNotFound(draft_id))?;

        let canonical_url = normalize_canonical_url(&draft.canonical_url);
        if canonical_url.is_empty() {
            return Err(PublishError::EmptyCanonicalUrl(draft_id));
        }

        let mut content = draft.content.clone();
        content.rewrite_asset_urls(|name| {
            storage.url_for(Bucket::Published, &format!("{canonical_url}/{name}"))
        });

        let new = NewPublishedArticle {
            draft_id,
            title: draft.title,
            canonical_url: canonical_url.clone(),
            content,
            author_ids: draft.author_ids,
        };

        match store.insert_published(new).await {
            Ok(article) => Ok(article),
            Err(StoreError::UniqueViolation { constraint }) if constraint.contains("draft_id") => {
                // A concurrent publish of the same draft committed first;
                // continue against its row.
                store
                    .find_published_by_draft(draft_id)
                    .await?
                    .ok_or(PublishError::Store(StoreError::UniqueViolation {
                        constraint,
                    }))
            }
            Err(StoreError::UniqueViolation { .. }) => {
                Err(PublishError::DuplicateCanonicalUrl { url: canonical_url })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Step 2a: copy every referenced asset draft -> published. Destination
    /// existence is checked per object, so re-runs skip completed copies.
    async fn copy_assets(&self, article: &PublishedArticle) -> Result<(), PublishError> {
        let storage = &self.kernel.storage;

        for file in article.content.asset_refs() {
            let src_key = format!("{}/{}", article.draft_id, file.name);
            let dst_key = format!("{}/{}", article.canonical_url, file.name);

            let outcome = with_retries(
                "asset copy",
                DEFAULT_ATTEMPTS,
                StorageError::is_transient,
                || storage.copy(Bucket::Draft, &src_key, Bucket::Published, &dst_key),
            )
            .await
            .map_err(|source| PublishError::StepFailed {
                step: PublishStep::AssetCopy,
                article_id: article.id,
                source: source.into(),
            })?;

            if outcome == CopyOutcome::AlreadyPresent {
                tracing::debug!(key = %dst_key, "asset already in published bucket, skipping");
            }
        }
        Ok(())
    }

    /// Step 2b: assets confirmed, flip the row live.
    async fn mark_live(&self, article: &PublishedArticle) -> Result<(), PublishError> {
        self.kernel
            .articles
            .mark_live(article.id)
            .await
            .map_err(|source| PublishError::StepFailed {
                step: PublishStep::MarkLive,
                article_id: article.id,
                source: source.into(),
            })
    }

    /// Step 3: best-effort search upsert; the caller decides what a failure
    /// means (publish degrades, unpublish fails).
    async fn upsert_search_document(&self, article: &PublishedArticle) -> anyhow::Result<()> {
        let doc = article.search_document();
        with_retries(
            "search upsert",
            DEFAULT_ATTEMPTS,
            is_transient_search_error,
            || {
                self.kernel
                    .search
                    .upsert(&self.article_index, std::slice::from_ref(&doc))
            },
        )
        .await?;
        Ok(())
    }

    /// Destructive, non-resumable corpus reset: truncate both metadata
    /// tables (restarting identity sequences), then recursively empty the
    /// draft and published buckets. Search convergence is the reindex job's
    /// contract, not this call's.
    ///
    /// Refuses to run without the explicit confirmation; absence is a misuse
    /// error, never a silent no-op. Never reachable from a request path.
    #[tracing::instrument(skip(self, confirm))]
    pub async fn reset_all(
        &self,
        confirm: Option<ResetConfirmation>,
    ) -> Result<ResetReport, PublishError> {
        if confirm.is_none() {
            return Err(PublishError::ResetNotConfirmed);
        }

        tracing::warn!("corpus reset: truncating metadata tables");
        self.kernel.articles.truncate_all().await?;

        tracing::warn!("corpus reset: emptying draft bucket");
        let draft_objects_deleted = self.kernel.storage.delete_prefix(Bucket::Draft, "").await?;

        tracing::warn!("corpus reset: emptying published bucket");
        let published_objects_deleted = self
            .kernel
            .storage
            .delete_prefix(Bucket::Published, "")
            .await?;

        tracing::warn!(
            draft_objects_deleted,
            published_objects_deleted,
            "corpus reset complete"
        );
        Ok(ResetReport {
            draft_objects_deleted,
            published_objects_deleted,
        })
    }

    /// Takes a published article back to a mutable draft: restore the draft
    /// row and its assets, then synchronously delete the search document
    /// before the published row and prefix go away, so no orphan index entry
    /// outlives the article.
    #[tracing::instrument(skip(self))]
    pub async fn unpublish(&self, published_id: i64) -> Result<DraftArticle, PublishError> {
        let store = &self.kernel.articles;
        let storage = &self.kernel.storage;

        let published = store
            .get_published(published_id)
            .await?
            .ok_or(PublishError::PublishedNotFound(published_id))?;

        // Reuse the original draft row when it still exists.
        let draft = match store.get_draft(published.draft_id).await? {
            Some(existing) => existing,
            None => {
                store
                    .create_draft(NewDraftArticle {
                        title: published.title.clone(),
                        canonical_url: published.canonical_url.clone(),
                        content: published.content.clone(),
                        author_ids: published.author_ids.clone(),
                    })
                    .await?
            }
        };

        for file in published.content.asset_refs() {
            let src_key = format!("{}/{}", published.canonical_url, file.name);
            let dst_key = format!("{}/{}", draft.id, file.name);
            with_retries(
                "asset restore",
                DEFAULT_ATTEMPTS,
                StorageError::is_transient,
                || storage.copy(Bucket::Published, &src_key, Bucket::Draft, &dst_key),
            )
            .await
            .map_err(|source| PublishError::StepFailed {
                step: PublishStep::DraftRestore,
                article_id: published.id,
                source: source.into(),
            })?;
        }

        let mut content = published.content.clone();
        content.rewrite_asset_urls(|name| {
            storage.url_for(Bucket::Draft, &format!("{}/{}", draft.id, name))
        });
        store.update_draft_content(draft.id, &content).await?;

        self.kernel
            .search
            .delete(&self.article_index, &[published.id.to_string()])
            .await
            .map_err(|source| PublishError::StepFailed {
                step: PublishStep::SearchDelete,
                article_id: published.id,
                source,
            })?;

        storage
            .delete_prefix(Bucket::Published, &published.canonical_url)
            .await?;
        store.delete_published(published.id).await?;

        tracing::info!(
            article_id = published.id,
            draft_id = draft.id,
            "article unpublished"
        );
        store
            .get_draft(draft.id)
            .await?
            .ok_or(PublishError::DraftNotFound(draft.id))
    }

    /// Explicit draft deletion: the row first, then its bucket prefix.
    #[tracing::instrument(skip(self))]
    pub async fn delete_draft(&self, draft_id: i64) -> Result<(), PublishError> {
        let deleted = self.kernel.articles.delete_draft(draft_id).await?;
        if !deleted {
            return Err(PublishError::DraftNotFound(draft_id));
        }
        self.kernel
            .storage
            .delete_prefix(Bucket::Draft, &draft_id.to_string())
            .await?;
        Ok(())
    }
}

// TestDependencies - in-memory implementations for testing
//
// Provides store adapters that can be wired into a ServerKernel for tests:
// an in-memory metadata store enforcing the same unique constraints as the
// Postgres schema, a call-capturing search index with failure injection, and
// a storage wrapper that fails chosen copies to exercise partial-failure
// resume paths.

use std::collections::BTreeMap;
use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;

use super::object_storage::StorageError;
use super::traits::{
    BaseArticleStore, BaseObjectStorage, BaseSearchIndex, Bucket, CopyOutcome, SearchDocument,
};
use crate::common::{normalize_canonical_url, ArticleContent};
use crate::domains::articles::error::StoreError;
use crate::domains::articles::models::{
    DraftArticle, NewDraftArticle, NewPublishedArticle, PublishedArticle, TableCounts,
};

// =============================================================================
// In-Memory Article Store
// =============================================================================

struct StoreState {
    drafts: BTreeMap<i64, DraftArticle>,
    published: BTreeMap<i64, PublishedArticle>,
    next_draft_id: i64,
    next_published_id: i64,
}

impl Default for StoreState {
    fn default() -> Self {
        Self {
            drafts: BTreeMap::new(),
            published: BTreeMap::new(),
            next_draft_id: 1,
            next_published_id: 1,
        }
    }
}

/// Metadata store backed by process memory. Mirrors the Postgres schema's
/// unique constraints (normalized canonical url, one published row per
/// draft) so constraint outcomes behave the same in tests.
#[derive(Default)]
pub struct InMemoryArticleStore {
    state: Mutex<StoreState>,
}

impl InMemoryArticleStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BaseArticleStore for InMemoryArticleStore {
    async fn create_draft(&self, new: NewDraftArticle) -> Result<DraftArticle, StoreError> {
        let mut state = self.state.lock().unwrap();
        let id = state.next_draft_id;
        state.next_draft_id += 1;
        let now = Utc::now();
        let draft = DraftArticle {
            id,
            title: new.title,
            canonical_url: new.canonical_url,
            content: new.content,
            author_ids: new.author_ids,
            created_at: now,
            updated_at: now,
        };
        state.drafts.insert(id, draft.clone());
        Ok(draft)
    }

    async fn get_draft(&self, draft_id: i64) -> Result<Option<DraftArticle>, StoreError> {
        Ok(self.state.lock().unwrap().drafts.get(&draft_id).cloned())
    }

    async fn list_drafts(&self) -> Result<Vec<DraftArticle>, StoreError> {
        Ok(self.state.lock().unwrap().drafts.values().cloned().collect())
    }

    async fn update_draft_content(
        &self,
        draft_id: i64,
        content: &ArticleContent,
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock().unwrap();
        let draft = state
            .drafts
            .get_mut(&draft_id)
            .ok_or(StoreError::Database(sqlx::Error::RowNotFound))?;
        draft.content = content.clone();
        draft.updated_at = Utc::now();
        Ok(())
    }

    async fn delete_draft(&self, draft_id: i64) -> Result<bool, StoreError> {
        Ok(self.state.lock().unwrap().drafts.remove(&draft_id).is_some())
    }

    async fn insert_published(
        &self,
        new: NewPublishedArticle,
    ) -> Result<PublishedArticle, StoreError> {
        let mut state = self.state.lock().unwrap();

        if state.published.values().any(|p| p.draft_id == new.draft_id) {
            return Err(StoreError::UniqueViolation {
                constraint: "published_article_draft_id_key".to_string(),
            });
        }
        let url = normalize_canonical_url(&new.canonical_url);
        if state
            .published
            .values()
            .any(|p| normalize_canonical_url(&p.canonical_url) == url)
        {
            return Err(StoreError::UniqueViolation {
                constraint: "published_article_canonical_url_key".to_string(),
            });
        }

        let id = state.next_published_id;
        state.next_published_id += 1;
        let article = PublishedArticle {
            id,
            draft_id: new.draft_id,
            title: new.title,
            canonical_url: new.canonical_url,
            content: new.content,
            author_ids: new.author_ids,
            live: false,
            published_at: Utc::now(),
        };
        state.published.insert(id, article.clone());
        Ok(article)
    }

    async fn get_published(&self, id: i64) -> Result<Option<PublishedArticle>, StoreError> {
        Ok(self.state.lock().unwrap().published.get(&id).cloned())
    }

    async fn find_published_by_draft(
        &self,
        draft_id: i64,
    ) -> Result<Option<PublishedArticle>, StoreError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .published
            .values()
            .find(|p| p.draft_id == draft_id)
            .cloned())
    }

    async fn list_published(&self) -> Result<Vec<PublishedArticle>, StoreError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .published
            .values()
            .cloned()
            .collect())
    }

    async fn mark_live(&self, id: i64) -> Result<(), StoreError> {
        let mut state = self.state.lock().unwrap();
        let article = state
            .published
            .get_mut(&id)
            .ok_or(StoreError::Database(sqlx::Error::RowNotFound))?;
        article.live = true;
        Ok(())
    }

    async fn delete_published(&self, id: i64) -> Result<bool, StoreError> {
        Ok(self.state.lock().unwrap().published.remove(&id).is_some())
    }

    async fn truncate_all(&self) -> Result<(), StoreError> {
        // Identity sequences restart, like TRUNCATE ... RESTART IDENTITY.
        *self.state.lock().unwrap() = StoreState::default();
        Ok(())
    }

    async fn counts(&self) -> Result<TableCounts, StoreError> {
        let state = self.state.lock().unwrap();
        Ok(TableCounts {
            drafts: state.drafts.len() as i64,
            published: state.published.len() as i64,
        })
    }
}

// =============================================================================
// Mock Search Index
// =============================================================================

/// Search index held in memory, with per-call failure injection for
/// degraded-publish tests. Documents are keyed by (index, object id), so
/// upserts are idempotent exactly like the remote service.
#[derive(Default)]
pub struct MockSearchIndex {
    documents: Mutex<BTreeMap<(String, String), SearchDocument>>,
    upsert_failures: Mutex<u32>,
    upsert_rejections: Mutex<u32>,
    upsert_calls: Mutex<Vec<(String, usize)>>,
}

impl MockSearchIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` upsert calls fail with a transient error.
    pub fn fail_next_upserts(&self, n: u32) {
        *self.upsert_failures.lock().unwrap() = n;
    }

    /// Make the next `n` upsert calls fail with an outright rejection, the
    /// kind a retry cannot fix.
    pub fn reject_next_upserts(&self, n: u32) {
        *self.upsert_rejections.lock().unwrap() = n;
    }

    pub fn document_count(&self, index: &str) -> usize {
        self.documents
            .lock()
            .unwrap()
            .keys()
            .filter(|(i, _)| i == index)
            .count()
    }

    pub fn contains(&self, index: &str, object_id: &str) -> bool {
        self.documents
            .lock()
            .unwrap()
            .contains_key(&(index.to_string(), object_id.to_string()))
    }

    pub fn document(&self, index: &str, object_id: &str) -> Option<SearchDocument> {
        self.documents
            .lock()
            .unwrap()
            .get(&(index.to_string(), object_id.to_string()))
            .cloned()
    }

    /// All (index, batch size) pairs seen by `upsert`.
    pub fn upsert_calls(&self) -> Vec<(String, usize)> {
        self.upsert_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl BaseSearchIndex for MockSearchIndex {
    async fn upsert(&self, index: &str, documents: &[SearchDocument]) -> Result<usize> {
        self.upsert_calls
            .lock()
            .unwrap()
            .push((index.to_string(), documents.len()));

        {
            let mut rejections = self.upsert_rejections.lock().unwrap();
            if *rejections > 0 {
                *rejections -= 1;
                return Err(super::search_index::SearchRejected {
                    status: 403,
                    body: "injected rejection".to_string(),
                }
                .into());
            }
        }
        {
            let mut failures = self.upsert_failures.lock().unwrap();
            if *failures > 0 {
                *failures -= 1;
                anyhow::bail!("injected search outage");
            }
        }

        let mut docs = self.documents.lock().unwrap();
        for doc in documents {
            docs.insert((index.to_string(), doc.object_id.clone()), doc.clone());
        }
        Ok(documents.len())
    }

    async fn delete(&self, index: &str, ids: &[String]) -> Result<()> {
        let mut docs = self.documents.lock().unwrap();
        for id in ids {
            docs.remove(&(index.to_string(), id.clone()));
        }
        Ok(())
    }
}

// =============================================================================
// Failure-Injecting Storage
// =============================================================================

/// Wraps a real storage adapter and fails copies to chosen destination keys,
/// for exercising the resume path after a partial publish failure.
pub struct FlakyStorage {
    inner: std::sync::Arc<dyn BaseObjectStorage>,
    fail_copies: Mutex<BTreeMap<String, u32>>,
    outcomes: Mutex<Vec<(String, CopyOutcome)>>,
}

impl FlakyStorage {
    pub fn new(inner: std::sync::Arc<dyn BaseObjectStorage>) -> Self {
        Self {
            inner,
            fail_copies: Mutex::new(BTreeMap::new()),
            outcomes: Mutex::new(Vec::new()),
        }
    }

    /// Fail the next `times` copies targeting `dst_key`. Set `times` at least
    /// as high as the retry budget to make the failure stick.
    pub fn fail_copies_to(&self, dst_key: &str, times: u32) {
        self.fail_copies
            .lock()
            .unwrap()
            .insert(dst_key.to_string(), times);
    }

    /// Destination keys and outcomes of every successful copy, in order.
    pub fn copy_outcomes(&self) -> Vec<(String, CopyOutcome)> {
        self.outcomes.lock().unwrap().clone()
    }

    fn injected_failure(bucket: Bucket) -> StorageError {
        StorageError::Backend {
            bucket: bucket.to_string(),
            source: object_store::Error::Generic {
                store: "flaky",
                source: "injected storage outage".into(),
            },
        }
    }
}

#[async_trait]
impl BaseObjectStorage for FlakyStorage {
    async fn exists(&self, bucket: Bucket, key: &str) -> Result<bool, StorageError> {
        self.inner.exists(bucket, key).await
    }

    async fn copy(
        &self,
        src: Bucket,
        src_key: &str,
        dst: Bucket,
        dst_key: &str,
    ) -> Result<CopyOutcome, StorageError> {
        {
            let mut failures = self.fail_copies.lock().unwrap();
            if let Some(remaining) = failures.get_mut(dst_key) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(Self::injected_failure(dst));
                }
            }
        }

        let outcome = self.inner.copy(src, src_key, dst, dst_key).await?;
        self.outcomes
            .lock()
            .unwrap()
            .push((dst_key.to_string(), outcome));
        Ok(outcome)
    }

    async fn delete_prefix(&self, bucket: Bucket, prefix: &str) -> Result<u64, StorageError> {
        self.inner.delete_prefix(bucket, prefix).await
    }

    fn url_for(&self, bucket: Bucket, key: &str) -> String {
        self.inner.url_for(bucket, key)
    }
}

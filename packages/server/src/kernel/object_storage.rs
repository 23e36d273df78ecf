//! Object-storage adapter over the draft and published buckets.
//!
//! Production uses S3; tests run the same adapter against in-memory stores,
//! so copy/delete semantics are exercised for real rather than mocked.

use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use object_store::aws::AmazonS3Builder;
use object_store::memory::InMemory;
use object_store::path::Path;
use object_store::ObjectStore;
use thiserror::Error;

use super::traits::{BaseObjectStorage, Bucket, CopyOutcome};
use crate::config::Config;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("object {bucket}/{key} not found")]
    NotFound { bucket: String, key: String },

    /// A prefix deletion that stopped part-way. The prefix is in a partially
    /// deleted state and the operation must be re-run.
    #[error("deletion under {bucket}/{prefix:?} incomplete: {deleted} objects removed before failure")]
    IncompleteDeletion {
        bucket: String,
        prefix: String,
        deleted: u64,
        #[source]
        source: object_store::Error,
    },

    #[error("object store error on bucket {bucket}")]
    Backend {
        bucket: String,
        #[source]
        source: object_store::Error,
    },
}

impl StorageError {
    pub fn is_transient(&self) -> bool {
        match self {
            StorageError::NotFound { .. } => false,
            StorageError::IncompleteDeletion { .. } => true,
            StorageError::Backend { source, .. } => !matches!(
                source,
                object_store::Error::NotFound { .. }
                    | object_store::Error::AlreadyExists { .. }
                    | object_store::Error::Precondition { .. }
                    | object_store::Error::NotSupported { .. }
            ),
        }
    }
}

/// The draft/published bucket pair.
pub struct BucketStorage {
    draft: Arc<dyn ObjectStore>,
    published: Arc<dyn ObjectStore>,
    draft_bucket: String,
    published_bucket: String,
    region: String,
}

impl BucketStorage {
    /// S3-backed storage; credentials come from the environment.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let draft = AmazonS3Builder::from_env()
            .with_region(&config.aws_region)
            .with_bucket_name(&config.draft_bucket)
            .build()
            .context("Failed to build draft bucket client")?;
        let published = AmazonS3Builder::from_env()
            .with_region(&config.aws_region)
            .with_bucket_name(&config.published_bucket)
            .build()
            .context("Failed to build published bucket client")?;

        Ok(Self {
            draft: Arc::new(draft),
            published: Arc::new(published),
            draft_bucket: config.draft_bucket.clone(),
            published_bucket: config.published_bucket.clone(),
            region: config.aws_region.clone(),
        })
    }

    /// In-memory bucket pair for tests.
    pub fn in_memory() -> Self {
        Self {
            draft: Arc::new(InMemory::new()),
            published: Arc::new(InMemory::new()),
            draft_bucket: "draft".to_string(),
            published_bucket: "published".to_string(),
            region: "test".to_string(),
        }
    }

    fn store(&self, bucket: Bucket) -> &Arc<dyn ObjectStore> {
        match bucket {
            Bucket::Draft => &self.draft,
            Bucket::Published => &self.published,
        }
    }

    fn bucket_name(&self, bucket: Bucket) -> &str {
        match bucket {
            Bucket::Draft => &self.draft_bucket,
            Bucket::Published => &self.published_bucket,
        }
    }

    fn backend_error(&self, bucket: Bucket, source: object_store::Error) -> StorageError {
        StorageError::Backend {
            bucket: self.bucket_name(bucket).to_string(),
            source,
        }
    }

    /// Uploads one object. Used by the upload path and test seeding.
    pub async fn put(&self, bucket: Bucket, key: &str, bytes: Bytes) -> Result<(), StorageError> {
        self.store(bucket)
            .put(&Path::from(key), bytes.into())
            .await
            .map_err(|source| self.backend_error(bucket, source))?;
        Ok(())
    }

    /// Lists all keys under a prefix (empty prefix lists the whole bucket).
    pub async fn list_keys(&self, bucket: Bucket, prefix: &str) -> Result<Vec<String>, StorageError> {
        let store = self.store(bucket);
        let path = (!prefix.is_empty()).then(|| Path::from(prefix));
        let mut listing = store.list(path.as_ref());

        let mut keys = Vec::new();
        while let Some(entry) = listing.next().await {
            let meta = entry.map_err(|source| self.backend_error(bucket, source))?;
            keys.push(meta.location.to_string());
        }
        keys.sort();
        Ok(keys)
    }
}

#[async_trait]
impl BaseObjectStorage for BucketStorage {
    async fn exists(&self, bucket: Bucket, key: &str) -> Result<bool, StorageError> {
        match self.store(bucket).head(&Path::from(key)).await {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(source) => Err(self.backend_error(bucket, source)),
        }
    }

    async fn copy(
        &self,
        src: Bucket,
        src_key: &str,
        dst: Bucket,
        dst_key: &str,
    ) -> Result<CopyOutcome, StorageError> {
        if self.exists(dst, dst_key).await? {
            return Ok(CopyOutcome::AlreadyPresent);
        }

        let result = self
            .store(src)
            .get(&Path::from(src_key))
            .await
            .map_err(|source| match source {
                object_store::Error::NotFound { .. } => StorageError::NotFound {
                    bucket: self.bucket_name(src).to_string(),
                    key: src_key.to_string(),
                },
                source => self.backend_error(src, source),
            })?;
        let bytes = result
            .bytes()
            .await
            .map_err(|source| self.backend_error(src, source))?;

        self.store(dst)
            .put(&Path::from(dst_key), bytes.into())
            .await
            .map_err(|source| self.backend_error(dst, source))?;
        Ok(CopyOutcome::Copied)
    }

    async fn delete_prefix(&self, bucket: Bucket, prefix: &str) -> Result<u64, StorageError> {
        let store = self.store(bucket);
        let path = (!prefix.is_empty()).then(|| Path::from(prefix));
        let mut listing = store.list(path.as_ref());

        let mut deleted: u64 = 0;
        while let Some(entry) = listing.next().await {
            let meta = entry.map_err(|source| StorageError::IncompleteDeletion {
                bucket: self.bucket_name(bucket).to_string(),
                prefix: prefix.to_string(),
                deleted,
                source,
            })?;
            store
                .delete(&meta.location)
                .await
                .map_err(|source| StorageError::IncompleteDeletion {
                    bucket: self.bucket_name(bucket).to_string(),
                    prefix: prefix.to_string(),
                    deleted,
                    source,
                })?;
            deleted += 1;
        }
        Ok(deleted)
    }

    fn url_for(&self, bucket: Bucket, key: &str) -> String {
        format!(
            "https://{}.s3.{}.amazonaws.com/{}",
            self.bucket_name(bucket),
            self.region,
            key
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn copy_writes_destination_once() {
        let storage = BucketStorage::in_memory();
        storage
            .put(Bucket::Draft, "1/photo.jpg", Bytes::from_static(b"jpeg"))
            .await
            .unwrap();

        let first = storage
            .copy(Bucket::Draft, "1/photo.jpg", Bucket::Published, "slug/photo.jpg")
            .await
            .unwrap();
        assert_eq!(first, CopyOutcome::Copied);
        assert!(storage.exists(Bucket::Published, "slug/photo.jpg").await.unwrap());

        // Re-running the same copy skips the already-present destination.
        let second = storage
            .copy(Bucket::Draft, "1/photo.jpg", Bucket::Published, "slug/photo.jpg")
            .await
            .unwrap();
        assert_eq!(second, CopyOutcome::AlreadyPresent);
    }

    #[tokio::test]
    async fn copy_of_missing_source_is_not_found() {
        let storage = BucketStorage::in_memory();
        let err = storage
            .copy(Bucket::Draft, "1/missing.jpg", Bucket::Published, "slug/missing.jpg")
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::NotFound { .. }));
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn delete_prefix_removes_only_the_prefix() {
        let storage = BucketStorage::in_memory();
        storage
            .put(Bucket::Draft, "1/a.jpg", Bytes::from_static(b"a"))
            .await
            .unwrap();
        storage
            .put(Bucket::Draft, "1/b.jpg", Bytes::from_static(b"b"))
            .await
            .unwrap();
        storage
            .put(Bucket::Draft, "2/c.jpg", Bytes::from_static(b"c"))
            .await
            .unwrap();

        let deleted = storage.delete_prefix(Bucket::Draft, "1").await.unwrap();
        assert_eq!(deleted, 2);
        assert_eq!(
            storage.list_keys(Bucket::Draft, "").await.unwrap(),
            vec!["2/c.jpg".to_string()]
        );
    }

    #[tokio::test]
    async fn delete_with_empty_prefix_empties_the_bucket() {
        let storage = BucketStorage::in_memory();
        storage
            .put(Bucket::Published, "x/a", Bytes::from_static(b"a"))
            .await
            .unwrap();
        storage
            .put(Bucket::Published, "y/b", Bytes::from_static(b"b"))
            .await
            .unwrap();

        let deleted = storage.delete_prefix(Bucket::Published, "").await.unwrap();
        assert_eq!(deleted, 2);
        assert!(storage.list_keys(Bucket::Published, "").await.unwrap().is_empty());
    }

    #[test]
    fn url_for_uses_bucket_and_region() {
        let storage = BucketStorage::in_memory();
        assert_eq!(
            storage.url_for(Bucket::Published, "slug/photo.jpg"),
            "https://published.s3.test.amazonaws.com/slug/photo.jpg"
        );
    }
}

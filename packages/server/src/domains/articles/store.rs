//! Postgres-backed metadata store.
//!
//! All statements are short and store-serialized; uniqueness of the
//! canonical url and of the draft back-reference is enforced by unique
//! indexes (see migrations), so concurrent publishes race safely.

use async_trait::async_trait;
use sqlx::types::Json;
use sqlx::PgPool;

use super::error::StoreError;
use super::models::{
    DraftArticle, NewDraftArticle, NewPublishedArticle, PublishedArticle, TableCounts,
};
use crate::common::ArticleContent;
use crate::kernel::traits::BaseArticleStore;

pub struct PostgresArticleStore {
    pool: PgPool,
}

impl PostgresArticleStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn map_db_error(e: sqlx::Error) -> StoreError {
    if let Some(db) = e.as_database_error() {
        if db.code().as_deref() == Some("23505") {
            return StoreError::UniqueViolation {
                constraint: db.constraint().unwrap_or("unknown").to_string(),
            };
        }
    }
    StoreError::Database(e)
}

const DRAFT_COLUMNS: &str = "id, title, canonical_url, content, author_ids, created_at, updated_at";
const PUBLISHED_COLUMNS: &str =
    "id, draft_id, title, canonical_url, content, author_ids, live, published_at";

#[async_trait]
impl BaseArticleStore for PostgresArticleStore {
    async fn create_draft(&self, new: NewDraftArticle) -> Result<DraftArticle, StoreError> {
        let sql = format!(
            "INSERT INTO draft_article (title, canonical_url, content, author_ids) \
             VALUES ($1, $2, $3, $4) \
             RETURNING {DRAFT_COLUMNS}"
        );
        sqlx::query_as::<_, DraftArticle>(&sql)
            .bind(&new.title)
            .bind(&new.canonical_url)
            .bind(Json(&new.content))
            .bind(&new.author_ids)
            .fetch_one(&self.pool)
            .await
            .map_err(map_db_error)
    }

    async fn get_draft(&self, draft_id: i64) -> Result<Option<DraftArticle>, StoreError> {
        let sql = format!("SELECT {DRAFT_COLUMNS} FROM draft_article WHERE id = $1");
        sqlx::query_as::<_, DraftArticle>(&sql)
            .bind(draft_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_error)
    }

    async fn list_drafts(&self) -> Result<Vec<DraftArticle>, StoreError> {
        let sql = format!("SELECT {DRAFT_COLUMNS} FROM draft_article ORDER BY id");
        sqlx::query_as::<_, DraftArticle>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(map_db_error)
    }

    async fn update_draft_content(
        &self,
        draft_id: i64,
        content: &ArticleContent,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE draft_article SET content = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(draft_id)
        .bind(Json(content))
        .execute(&self.pool)
        .await
        .map_err(map_db_error)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Database(sqlx::Error::RowNotFound));
        }
        Ok(())
    }

    async fn delete_draft(&self, draft_id: i64) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM draft_article WHERE id = $1")
            .bind(draft_id)
            .execute(&self.pool)
            .await
            .map_err(map_db_error)?;
        Ok(result.rows_affected() > 0)
    }

    async fn insert_published(
        &self,
        new: NewPublishedArticle,
    ) -> Result<PublishedArticle, StoreError> {
        let sql = format!(
            "INSERT INTO published_article (draft_id, title, canonical_url, content, author_ids) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING {PUBLISHED_COLUMNS}"
        );
        sqlx::query_as::<_, PublishedArticle>(&sql)
            .bind(new.draft_id)
            .bind(&new.title)
            .bind(&new.canonical_url)
            .bind(Json(&new.content))
            .bind(&new.author_ids)
            .fetch_one(&self.pool)
            .await
            .map_err(map_db_error)
    }

    async fn get_published(&self, id: i64) -> Result<Option<PublishedArticle>, StoreError> {
        let sql = format!("SELECT {PUBLISHED_COLUMNS} FROM published_article WHERE id = $1");
        sqlx::query_as::<_, PublishedArticle>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_error)
    }

    async fn find_published_by_draft(
        &self,
        draft_id: i64,
    ) -> Result<Option<PublishedArticle>, StoreError> {
        let sql = format!("SELECT {PUBLISHED_COLUMNS} FROM published_article WHERE draft_id = $1");
        sqlx::query_as::<_, PublishedArticle>(&sql)
            .bind(draft_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_error)
    }

    async fn list_published(&self) -> Result<Vec<PublishedArticle>, StoreError> {
        let sql = format!("SELECT {PUBLISHED_COLUMNS} FROM published_article ORDER BY id");
        sqlx::query_as::<_, PublishedArticle>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(map_db_error)
    }

    async fn mark_live(&self, id: i64) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE published_article SET live = TRUE WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(map_db_error)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Database(sqlx::Error::RowNotFound));
        }
        Ok(())
    }

    async fn delete_published(&self, id: i64) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM published_article WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(map_db_error)?;
        Ok(result.rows_affected() > 0)
    }

    async fn truncate_all(&self) -> Result<(), StoreError> {
        sqlx::query("TRUNCATE TABLE draft_article, published_article RESTART IDENTITY CASCADE")
            .execute(&self.pool)
            .await
            .map_err(map_db_error)?;
        Ok(())
    }

    async fn counts(&self) -> Result<TableCounts, StoreError> {
        let drafts: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM draft_article")
            .fetch_one(&self.pool)
            .await
            .map_err(map_db_error)?;
        let published: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM published_article")
            .fetch_one(&self.pool)
            .await
            .map_err(map_db_error)?;
        Ok(TableCounts { drafts, published })
    }
}

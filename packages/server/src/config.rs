use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub aws_region: String,
    pub draft_bucket: String,
    pub published_bucket: String,
    pub search_app_id: String,
    pub search_admin_key: String,
    pub article_index: String,
    pub static_pages_index: String,
    pub static_pages_dir: Option<String>,
}

impl Config {
    /// Load configuration from environment variables.
    /// Missing required variables are fatal at startup.
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        Ok(Self {
            database_url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .context("PORT must be a valid number")?,
            aws_region: env::var("AWS_REGION").context("AWS_REGION must be set")?,
            draft_bucket: env::var("AWS_DRAFT_BUCKET_NAME")
                .context("AWS_DRAFT_BUCKET_NAME must be set")?,
            published_bucket: env::var("AWS_PUBLISHED_BUCKET_NAME")
                .context("AWS_PUBLISHED_BUCKET_NAME must be set")?,
            search_app_id: env::var("SEARCH_APP_ID").context("SEARCH_APP_ID must be set")?,
            search_admin_key: env::var("SEARCH_ADMIN_KEY")
                .context("SEARCH_ADMIN_KEY must be set")?,
            article_index: env::var("SEARCH_ARTICLE_INDEX")
                .unwrap_or_else(|_| "published_article".to_string()),
            static_pages_index: env::var("SEARCH_STATIC_PAGES_INDEX")
                .unwrap_or_else(|_| "static_pages".to_string()),
            static_pages_dir: env::var("STATIC_PAGES_DIR").ok(),
        })
    }
}

// Common types and utilities shared across the application

pub mod content;
pub mod urls;

pub use content::{ArticleContent, ContentBlock, FileRef};
pub use urls::{normalize_canonical_url, slug_from_title};

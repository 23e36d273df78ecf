//! Canonical-URL normalization and title slugging.

use uuid::Uuid;

/// Normalize a canonical URL for comparison and uniqueness checks:
/// lower-case, trimmed, trailing slash stripped.
///
/// Every collision check in the pipeline goes through this function so the
/// in-process grouping and the store-level unique index agree.
pub fn normalize_canonical_url(url: &str) -> String {
    let trimmed = url.trim().to_lowercase();
    trimmed.trim_end_matches('/').to_string()
}

/// Derive a canonical URL slug from an article title.
///
/// Keeps alphanumerics (plus Slovene č/ž/š) and collapses whitespace into
/// dashes. Titles that sanitize down to nothing get a random slug so the
/// article is still addressable.
pub fn slug_from_title(title: &str) -> String {
    let kept: String = title
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || c.is_whitespace() || "čČžŽšŠ".contains(*c))
        .collect();

    let slug = kept
        .trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-");

    if slug.is_empty() {
        Uuid::new_v4().to_string()
    } else {
        slug
    }
}

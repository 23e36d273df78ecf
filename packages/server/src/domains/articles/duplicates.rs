//! Read-only canonical-URL collision scan.
//!
//! Always computed from the authoritative store, never from a cache: callers
//! may cache the result with a long validity window (stale duplicates are
//! tolerable), but a false positive from a derived source is not.

use std::collections::BTreeMap;

use serde::Serialize;

use super::error::StoreError;
use crate::common::normalize_canonical_url;
use crate::kernel::traits::BaseArticleStore;

/// An article id tagged with its table; drafts and published snapshots live
/// in independent identity spaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ArticleRef {
    Draft(i64),
    Published(i64),
}

/// Groups draft and published articles by normalized canonical url and
/// returns only the groups with at least two members.
pub async fn find_duplicates(
    store: &dyn BaseArticleStore,
) -> Result<BTreeMap<String, Vec<ArticleRef>>, StoreError> {
    let mut groups: BTreeMap<String, Vec<ArticleRef>> = BTreeMap::new();

    for draft in store.list_drafts().await? {
        let url = normalize_canonical_url(&draft.canonical_url);
        if url.is_empty() {
            continue;
        }
        groups.entry(url).or_default().push(ArticleRef::Draft(draft.id));
    }
    for article in store.list_published().await? {
        let url = normalize_canonical_url(&article.canonical_url);
        groups
            .entry(url)
            .or_default()
            .push(ArticleRef::Published(article.id));
    }

    groups.retain(|_, refs| refs.len() >= 2);
    Ok(groups)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::ArticleContent;
    use crate::domains::articles::models::{NewDraftArticle, NewPublishedArticle};
    use crate::kernel::InMemoryArticleStore;

    fn draft(url: &str) -> NewDraftArticle {
        NewDraftArticle {
            title: "t".to_string(),
            canonical_url: url.to_string(),
            content: ArticleContent::default(),
            author_ids: vec![],
        }
    }

    #[tokio::test]
    async fn groups_by_normalized_url_across_both_tables() {
        let store = InMemoryArticleStore::new();
        // Canonical urls "a", "A " and "a" normalize to one group; published
        // rows cannot collide among themselves (store constraint), so the
        // third member comes from the published table.
        let d1 = store.create_draft(draft("a")).await.unwrap();
        let d2 = store.create_draft(draft("A ")).await.unwrap();
        let other = store.create_draft(draft("unrelated")).await.unwrap();
        let p = store
            .insert_published(NewPublishedArticle {
                draft_id: other.id,
                title: "t".to_string(),
                canonical_url: "a".to_string(),
                content: ArticleContent::default(),
                author_ids: vec![],
            })
            .await
            .unwrap();

        let groups = find_duplicates(&store).await.unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(
            groups["a"],
            vec![
                ArticleRef::Draft(d1.id),
                ArticleRef::Draft(d2.id),
                ArticleRef::Published(p.id)
            ]
        );
    }

    #[tokio::test]
    async fn unique_urls_produce_no_groups() {
        let store = InMemoryArticleStore::new();
        store.create_draft(draft("one")).await.unwrap();
        store.create_draft(draft("two")).await.unwrap();

        let groups = find_duplicates(&store).await.unwrap();
        assert!(groups.is_empty());
    }

    #[tokio::test]
    async fn empty_draft_urls_are_ignored() {
        let store = InMemoryArticleStore::new();
        store.create_draft(draft("")).await.unwrap();
        store.create_draft(draft(" ")).await.unwrap();

        let groups = find_duplicates(&store).await.unwrap();
        assert!(groups.is_empty());
    }
}

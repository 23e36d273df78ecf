// End-to-end publish pipeline tests against in-memory adapters: the real
// orchestrator, the real bucket copy/delete semantics, an in-memory metadata
// store enforcing the Postgres unique constraints, and failure injection for
// the partial-failure and degraded-search paths.

use std::sync::Arc;

use cms_core::common::{ArticleContent, ContentBlock, FileRef};
use cms_core::domains::articles::{
    NewDraftArticle, PublishError, PublishOrchestrator, PublishStep, ReindexJob,
    ResetConfirmation,
};
use cms_core::kernel::{
    BaseArticleStore, BaseObjectStorage, Bucket, BucketStorage, CopyOutcome, FlakyStorage,
    InMemoryArticleStore, MockSearchIndex, ServerKernel,
};

const ARTICLE_INDEX: &str = "published_article";
const STATIC_INDEX: &str = "static_pages";

struct Harness {
    store: Arc<InMemoryArticleStore>,
    buckets: Arc<BucketStorage>,
    flaky: Arc<FlakyStorage>,
    search: Arc<MockSearchIndex>,
    kernel: Arc<ServerKernel>,
    orchestrator: PublishOrchestrator,
}

impl Harness {
    fn new() -> Self {
        let store = Arc::new(InMemoryArticleStore::new());
        let buckets = Arc::new(BucketStorage::in_memory());
        let flaky = Arc::new(FlakyStorage::new(
            Arc::clone(&buckets) as Arc<dyn BaseObjectStorage>
        ));
        let search = Arc::new(MockSearchIndex::new());
        let kernel = Arc::new(ServerKernel::new(
            Arc::clone(&store) as Arc<dyn BaseArticleStore>,
            Arc::clone(&flaky) as Arc<dyn BaseObjectStorage>,
            Arc::clone(&search) as _,
        ));
        let orchestrator = PublishOrchestrator::new(Arc::clone(&kernel), ARTICLE_INDEX);
        Self {
            store,
            buckets,
            flaky,
            search,
            kernel,
            orchestrator,
        }
    }

    /// Creates a draft referencing `assets` and seeds the corresponding
    /// objects into the draft bucket.
    async fn seed_draft(&self, title: &str, canonical_url: &str, assets: &[&str]) -> i64 {
        let mut blocks = vec![ContentBlock::Paragraph {
            text: format!("Body of {title}."),
        }];
        for name in assets {
            blocks.push(ContentBlock::Image {
                file: FileRef {
                    name: (*name).to_string(),
                    url: format!("https://draft.s3.test.amazonaws.com/pending/{name}"),
                },
                caption: None,
            });
        }

        let draft = self
            .store
            .create_draft(NewDraftArticle {
                title: title.to_string(),
                canonical_url: canonical_url.to_string(),
                content: ArticleContent { blocks },
                author_ids: vec![7],
            })
            .await
            .unwrap();

        for name in assets {
            self.buckets
                .put(
                    Bucket::Draft,
                    &format!("{}/{}", draft.id, name),
                    bytes::Bytes::from(format!("asset {name}")),
                )
                .await
                .unwrap();
        }
        draft.id
    }
}

#[tokio::test]
async fn publish_copies_assets_rewrites_urls_and_indexes() {
    let h = Harness::new();
    let draft_id = h.seed_draft("Potop 2026", "potop-2026", &["dam.jpg", "map.pdf"]).await;

    let outcome = h.orchestrator.publish(draft_id).await.unwrap();
    assert!(outcome.article.live);
    assert!(outcome.search_synced);

    // Assets landed under the canonical url in the published bucket.
    assert_eq!(
        h.buckets.list_keys(Bucket::Published, "").await.unwrap(),
        vec![
            "potop-2026/dam.jpg".to_string(),
            "potop-2026/map.pdf".to_string()
        ]
    );

    // The snapshot's asset urls point at the published bucket.
    let urls: Vec<_> = outcome
        .article
        .content
        .asset_refs()
        .map(|f| f.url.clone())
        .collect();
    assert_eq!(
        urls,
        vec![
            "https://published.s3.test.amazonaws.com/potop-2026/dam.jpg".to_string(),
            "https://published.s3.test.amazonaws.com/potop-2026/map.pdf".to_string()
        ]
    );

    // One search document keyed by the published id.
    let doc = h
        .search
        .document(ARTICLE_INDEX, &outcome.article.id.to_string())
        .unwrap();
    assert_eq!(doc.title, "Potop 2026");
    assert_eq!(doc.url, "potop-2026");
    assert_eq!(doc.text, "Body of Potop 2026.");

    // The draft row survives publishing.
    assert!(h.store.get_draft(draft_id).await.unwrap().is_some());
}

#[tokio::test]
async fn republishing_a_live_article_conflicts() {
    let h = Harness::new();
    let draft_id = h.seed_draft("One", "one", &[]).await;

    let first = h.orchestrator.publish(draft_id).await.unwrap();
    let err = h.orchestrator.publish(draft_id).await.unwrap_err();
    match err {
        PublishError::AlreadyPublished {
            draft_id: d,
            published_id,
        } => {
            assert_eq!(d, draft_id);
            assert_eq!(published_id, first.article.id);
        }
        other => panic!("expected AlreadyPublished, got {other:?}"),
    }
    assert_eq!(h.store.counts().await.unwrap().published, 1);
}

#[tokio::test]
async fn publishing_a_missing_draft_is_not_found() {
    let h = Harness::new();
    assert!(matches!(
        h.orchestrator.publish(999).await.unwrap_err(),
        PublishError::DraftNotFound(999)
    ));
}

#[tokio::test]
async fn canonical_url_collisions_are_case_and_whitespace_insensitive() {
    let h = Harness::new();
    let first = h.seed_draft("First", "potop-2026", &[]).await;
    let second = h.seed_draft("Second", " Potop-2026 ", &[]).await;

    h.orchestrator.publish(first).await.unwrap();
    match h.orchestrator.publish(second).await.unwrap_err() {
        PublishError::DuplicateCanonicalUrl { url } => assert_eq!(url, "potop-2026"),
        other => panic!("expected DuplicateCanonicalUrl, got {other:?}"),
    }
    assert_eq!(h.store.counts().await.unwrap().published, 1);
}

#[tokio::test]
async fn empty_canonical_url_is_rejected_before_any_side_effect() {
    let h = Harness::new();
    let draft_id = h.seed_draft("No url", "  /  ", &[]).await;

    assert!(matches!(
        h.orchestrator.publish(draft_id).await.unwrap_err(),
        PublishError::EmptyCanonicalUrl(_)
    ));
    assert_eq!(h.store.counts().await.unwrap().published, 0);
    assert_eq!(h.search.document_count(ARTICLE_INDEX), 0);
}

#[tokio::test]
async fn interrupted_publish_resumes_without_duplicating_work() {
    let h = Harness::new();
    let draft_id = h.seed_draft("Potop", "potop", &["a.jpg", "b.jpg"]).await;

    // Fail every attempt of the second asset's copy, exhausting the retry
    // budget.
    h.flaky.fail_copies_to("potop/b.jpg", 3);

    let err = h.orchestrator.publish(draft_id).await.unwrap_err();
    match err {
        PublishError::StepFailed { step, .. } => assert_eq!(step, PublishStep::AssetCopy),
        other => panic!("expected StepFailed, got {other:?}"),
    }

    // The snapshot committed but never went live; only the first asset made
    // it across.
    let row = h
        .store
        .find_published_by_draft(draft_id)
        .await
        .unwrap()
        .unwrap();
    assert!(!row.live);
    assert_eq!(
        h.buckets.list_keys(Bucket::Published, "").await.unwrap(),
        vec!["potop/a.jpg".to_string()]
    );

    // The retry picks up the same row and completes only the missing copy.
    let outcome = h.orchestrator.publish(draft_id).await.unwrap();
    assert!(outcome.article.live);
    assert_eq!(outcome.article.id, row.id);
    assert_eq!(h.store.counts().await.unwrap().published, 1);

    let outcomes = h.flaky.copy_outcomes();
    assert_eq!(
        outcomes.last().unwrap(),
        &("potop/b.jpg".to_string(), CopyOutcome::Copied)
    );
    assert!(outcomes.contains(&("potop/a.jpg".to_string(), CopyOutcome::AlreadyPresent)));
}

#[tokio::test]
async fn search_outage_degrades_publish_and_reindex_converges() {
    let h = Harness::new();
    let draft_id = h.seed_draft("Degraded", "degraded", &[]).await;

    // Outlast the retry budget so the upsert fails for good.
    h.search.fail_next_upserts(3);

    let outcome = h.orchestrator.publish(draft_id).await.unwrap();
    assert!(outcome.article.live);
    assert!(!outcome.search_synced);
    assert_eq!(h.search.document_count(ARTICLE_INDEX), 0);
    // Transient failures were retried up to the budget.
    assert_eq!(h.search.upsert_calls().len(), 3);

    let report = ReindexJob::new(Arc::clone(&h.kernel), ARTICLE_INDEX, STATIC_INDEX, None)
        .run()
        .await
        .unwrap();
    assert_eq!(report.indexed, 1);
    assert_eq!(report.failed, 0);
    assert!(h
        .search
        .contains(ARTICLE_INDEX, &outcome.article.id.to_string()));
}

#[tokio::test]
async fn rejected_search_upsert_degrades_without_retrying() {
    let h = Harness::new();
    let draft_id = h.seed_draft("Rejected", "rejected", &[]).await;

    // An outright rejection (e.g. bad credentials) cannot be fixed by
    // retrying the same request.
    h.search.reject_next_upserts(1);

    let outcome = h.orchestrator.publish(draft_id).await.unwrap();
    assert!(outcome.article.live);
    assert!(!outcome.search_synced);

    // One attempt, no backoff budget spent on a permanent failure.
    assert_eq!(h.search.upsert_calls().len(), 1);
}

#[tokio::test]
async fn reindex_is_idempotent() {
    let h = Harness::new();
    for (title, url) in [("A", "a"), ("B", "b")] {
        let id = h.seed_draft(title, url, &[]).await;
        h.orchestrator.publish(id).await.unwrap();
    }

    let job = ReindexJob::new(Arc::clone(&h.kernel), ARTICLE_INDEX, STATIC_INDEX, None);
    let first = job.run().await.unwrap();
    let second = job.run().await.unwrap();
    assert_eq!(first.indexed, 2);
    assert_eq!(second.indexed, 2);
    assert_eq!(h.search.document_count(ARTICLE_INDEX), 2);
}

#[tokio::test]
async fn reindex_indexes_static_pages_by_section() {
    let dir = std::env::temp_dir().join(format!("static-pages-{}", uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(
        dir.join("about.md"),
        "# About\n\nintro\n\n## Team\n\npeople\n\n## Contact\n\nmail\n",
    )
    .unwrap();

    let h = Harness::new();
    let report = ReindexJob::new(
        Arc::clone(&h.kernel),
        ARTICLE_INDEX,
        STATIC_INDEX,
        Some(dir.clone()),
    )
    .run()
    .await
    .unwrap();
    std::fs::remove_dir_all(&dir).unwrap();

    assert_eq!(report.indexed, 3);
    assert!(h.search.contains(STATIC_INDEX, "about-0"));
    assert!(h.search.contains(STATIC_INDEX, "about-2"));
    let doc = h.search.document(STATIC_INDEX, "about-1").unwrap();
    assert_eq!(doc.url, "/about");
    assert!(doc.text.starts_with("## Team"));
}

#[tokio::test]
async fn reset_refuses_to_run_without_confirmation() {
    let h = Harness::new();
    let draft_id = h.seed_draft("Keep me", "keep-me", &["a.jpg"]).await;
    h.orchestrator.publish(draft_id).await.unwrap();

    assert!(matches!(
        h.orchestrator.reset_all(None).await.unwrap_err(),
        PublishError::ResetNotConfirmed
    ));

    let counts = h.store.counts().await.unwrap();
    assert_eq!(counts.drafts, 1);
    assert_eq!(counts.published, 1);
    assert!(!h.buckets.list_keys(Bucket::Draft, "").await.unwrap().is_empty());
}

#[tokio::test]
async fn confirmed_reset_erases_rows_and_both_buckets() {
    let h = Harness::new();
    let draft_id = h.seed_draft("Gone", "gone", &["a.jpg", "b.jpg"]).await;
    h.orchestrator.publish(draft_id).await.unwrap();

    let confirmation = ResetConfirmation::from_phrase("erase-all-content").unwrap();
    let report = h.orchestrator.reset_all(Some(confirmation)).await.unwrap();
    assert_eq!(report.draft_objects_deleted, 2);
    assert_eq!(report.published_objects_deleted, 2);

    let counts = h.store.counts().await.unwrap();
    assert_eq!(counts.drafts, 0);
    assert_eq!(counts.published, 0);
    assert!(h.buckets.list_keys(Bucket::Draft, "").await.unwrap().is_empty());
    assert!(h.buckets.list_keys(Bucket::Published, "").await.unwrap().is_empty());

    // Identity restarts: the next draft takes id 1 again.
    let next = h.seed_draft("Fresh", "fresh", &[]).await;
    assert_eq!(next, 1);
}

#[test]
fn reset_confirmation_accepts_only_the_exact_phrase() {
    assert!(ResetConfirmation::from_phrase("erase-all-content").is_some());
    assert!(ResetConfirmation::from_phrase("erase all content").is_none());
    assert!(ResetConfirmation::from_phrase("").is_none());
}

#[tokio::test]
async fn unpublish_restores_the_draft_and_removes_every_trace() {
    let h = Harness::new();
    let draft_id = h.seed_draft("Back to draft", "back-to-draft", &["dam.jpg"]).await;
    let outcome = h.orchestrator.publish(draft_id).await.unwrap();
    let published_id = outcome.article.id;

    let draft = h.orchestrator.unpublish(published_id).await.unwrap();
    assert_eq!(draft.id, draft_id);

    // Draft content points back at the draft bucket, and the asset is there.
    let urls: Vec<_> = draft.content.asset_refs().map(|f| f.url.clone()).collect();
    assert_eq!(
        urls,
        vec![format!(
            "https://draft.s3.test.amazonaws.com/{draft_id}/dam.jpg"
        )]
    );
    assert!(h
        .buckets
        .exists(Bucket::Draft, &format!("{draft_id}/dam.jpg"))
        .await
        .unwrap());

    // Published row, published prefix and search document are all gone.
    assert!(h.store.get_published(published_id).await.unwrap().is_none());
    assert!(h
        .buckets
        .list_keys(Bucket::Published, "back-to-draft")
        .await
        .unwrap()
        .is_empty());
    assert!(!h.search.contains(ARTICLE_INDEX, &published_id.to_string()));

    // The draft can be published again.
    let again = h.orchestrator.publish(draft_id).await.unwrap();
    assert!(again.article.live);
}

#[tokio::test]
async fn unpublishing_a_missing_article_is_not_found() {
    let h = Harness::new();
    assert!(matches!(
        h.orchestrator.unpublish(42).await.unwrap_err(),
        PublishError::PublishedNotFound(42)
    ));
}

#[tokio::test]
async fn delete_draft_removes_the_row_and_its_assets() {
    let h = Harness::new();
    let keep = h.seed_draft("Keep", "keep", &["k.jpg"]).await;
    let gone = h.seed_draft("Gone", "gone", &["g.jpg"]).await;

    h.orchestrator.delete_draft(gone).await.unwrap();

    assert!(h.store.get_draft(gone).await.unwrap().is_none());
    assert!(h.store.get_draft(keep).await.unwrap().is_some());
    assert_eq!(
        h.buckets.list_keys(Bucket::Draft, "").await.unwrap(),
        vec![format!("{keep}/k.jpg")]
    );

    assert!(matches!(
        h.orchestrator.delete_draft(gone).await.unwrap_err(),
        PublishError::DraftNotFound(_)
    ));
}

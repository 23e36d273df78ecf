// ServerKernel - core infrastructure with all dependencies
//
// The ServerKernel holds the three store adapters behind traits and is
// constructed once at process start; no component reaches for ambient global
// client handles.

use std::sync::Arc;

use super::traits::{BaseArticleStore, BaseObjectStorage, BaseSearchIndex};

/// ServerKernel holds the metadata store, object storage and search index
/// adapters, each independently failing and independently replaceable in
/// tests.
pub struct ServerKernel {
    pub articles: Arc<dyn BaseArticleStore>,
    pub storage: Arc<dyn BaseObjectStorage>,
    pub search: Arc<dyn BaseSearchIndex>,
}

impl ServerKernel {
    pub fn new(
        articles: Arc<dyn BaseArticleStore>,
        storage: Arc<dyn BaseObjectStorage>,
        search: Arc<dyn BaseSearchIndex>,
    ) -> Self {
        Self {
            articles,
            storage,
            search,
        }
    }
}

//! Kernel module - server infrastructure and dependencies.

pub mod object_storage;
pub mod retry;
pub mod search_index;
pub mod server_kernel;
pub mod test_dependencies;
pub mod traits;

pub use object_storage::{BucketStorage, StorageError};
pub use retry::{with_retries, DEFAULT_ATTEMPTS};
pub use search_index::{is_transient_search_error, AlgoliaClient, SearchRejected};
pub use server_kernel::ServerKernel;
pub use test_dependencies::{FlakyStorage, InMemoryArticleStore, MockSearchIndex};
pub use traits::*;

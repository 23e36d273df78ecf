pub mod articles;
pub mod health;

pub use articles::{duplicate_urls_handler, publish_handler};
pub use health::health_handler;

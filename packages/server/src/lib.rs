// Newsroom CMS - publishing core
//
// This crate moves editorial articles from mutable drafts to immutable
// published snapshots while keeping the metadata store, the draft/published
// object buckets and the search index consistent without a distributed
// transaction.

pub mod common;
pub mod config;
pub mod domains;
pub mod kernel;
pub mod server;

pub use config::*;

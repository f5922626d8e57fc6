//! Content ingestion core for a tech-news aggregator.
//!
//! Polls a registry of RSS/Atom sources, normalizes and gates each entry,
//! persists accepted articles to SQLite, and periodically evicts old content
//! without ever touching articles a user has liked.

pub mod classify;
pub mod config;
pub mod content;
pub mod feed;
pub mod filter;
pub mod ingest;
pub mod logging;
pub mod retention;
pub mod scheduler;
pub mod storage;
pub mod util;

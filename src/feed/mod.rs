//! Feed retrieval: HTTP fetching with retry and size limits, and parsing of
//! RSS/Atom documents into raw [`Entry`](crate::content::Entry) values.
//!
//! - [`parser`] - feed parsing using the `feed-rs` crate
//! - [`fetcher`] - HTTP fetching behind the [`FeedFetcher`] seam

mod fetcher;
mod parser;

use async_trait::async_trait;

use crate::content::Entry;
use crate::storage::Source;

pub use fetcher::{FetchError, HttpFeedFetcher};
pub use parser::{parse_feed, ParseResult};

/// Pulls up to `limit` most-recent entries for one source.
#[async_trait]
pub trait FeedFetcher: Send + Sync {
    async fn fetch(&self, source: &Source, limit: usize) -> Result<Vec<Entry>, FetchError>;
}

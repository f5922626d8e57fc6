//! Round-robin ingestion: fetch every source, then process one entry per
//! source per round through sanitize → filter → classify → persist.

mod pipeline;
mod report;
mod rounds;

use thiserror::Error;

use crate::storage::DatabaseError;

pub use pipeline::{IngestSettings, Ingestor};
pub use report::{EntryOutcome, IngestReport};
pub use rounds::RoundRobin;

/// Setup failures that abort a whole run
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Store unavailable: {0}")]
    StoreUnavailable(#[from] DatabaseError),
    #[error("Failed to list sources: {0}")]
    SourceRegistry(String),
}

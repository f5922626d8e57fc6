//! Topic classification behind an accept/reject contract.
//!
//! [`Classifier`] is the pluggable capability (keyword rules, a model, a
//! hosted API). [`ClassifierGate`] wraps one and enforces the closed topic
//! set: the catch-all label, unknown labels, errors and timeouts all reject.

mod gate;
mod keyword;

use async_trait::async_trait;
use thiserror::Error;

pub use gate::{ClassifierGate, RejectReason, Verdict};
pub use keyword::{KeywordClassifier, DEFAULT_TOPICS, EMERGING_TECH_TOPIC};

/// Label reserved for "none of the topics"; never persisted
pub const DEFAULT_CATCH_ALL: &str = "Other";

#[derive(Debug, Error)]
pub enum ClassifyError {
    #[error("Classifier unavailable: {0}")]
    Unavailable(String),
    #[error("Malformed classifier input: {0}")]
    MalformedInput(String),
    #[error("Invalid classifier pattern: {0}")]
    Pattern(#[from] regex::Error),
}

/// Maps `(title, text)` to a topic label. `None` means reject.
#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(&self, title: &str, text: &str) -> Result<Option<String>, ClassifyError>;
}

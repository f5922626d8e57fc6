//! Retention/eviction: decides how much old content to delete without
//! letting the catalog run empty, and never deletes liked content.
//!
//! - [`policy`] - the pure threshold table
//! - [`engine`] - one transactional count-decide-delete pass
//! - [`sweep`] - re-classification of stored content (`pulse prune`)

mod engine;
mod policy;
mod sweep;

pub use engine::{day_bounds, RetentionDecision, RetentionEngine};
pub use policy::{decide, Plan, RetentionAction, RetentionPolicy};
pub use sweep::{RelevanceSweep, SweepReport};

//! Tracing setup for the binary.
//!
//! The subscriber is installed before configuration is read, so warnings
//! raised while loading it are not lost. The configured level is applied
//! afterwards through a reload handle. `RUST_LOG`, when set, wins over both.

use tracing_subscriber::prelude::*;
use tracing_subscriber::{reload, EnvFilter, Registry};

/// Level used until the configuration has been read
pub const BOOTSTRAP_LEVEL: &str = "info";

/// Swaps the active filter once the configured level is known
pub struct LogLevelHandle {
    handle: Option<reload::Handle<EnvFilter, Registry>>,
}

impl LogLevelHandle {
    /// Apply the configured level unless `RUST_LOG` already chose one.
    /// An unparsable level keeps the bootstrap filter and logs a warning.
    pub fn apply(&self, level: &str) {
        let Some(handle) = &self.handle else {
            return;
        };
        match EnvFilter::try_new(level) {
            Ok(filter) => {
                if let Err(e) = handle.reload(filter) {
                    tracing::warn!(error = %e, "Failed to apply configured log level");
                }
            }
            Err(e) => {
                tracing::warn!(
                    level = %level,
                    error = %e,
                    "Invalid log_level in config, keeping {BOOTSTRAP_LEVEL}"
                );
            }
        }
    }
}

/// Install the global subscriber, writing to stderr so stdout carries only
/// JSON reports.
pub fn init() -> LogLevelHandle {
    let from_env = EnvFilter::try_from_default_env().ok();
    let env_chosen = from_env.is_some();
    let (filter, handle) =
        reload::Layer::new(from_env.unwrap_or_else(|| EnvFilter::new(BOOTSTRAP_LEVEL)));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    LogLevelHandle {
        handle: (!env_chosen).then_some(handle),
    }
}

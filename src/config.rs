//! Configuration file parser for `pulse.toml`.
//!
//! The config file is optional; a missing file yields `Config::default()`,
//! which has no sources. Unknown keys are ignored by serde but logged as
//! warnings, since they are usually typos.
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::classify::{DEFAULT_CATCH_ALL, DEFAULT_TOPICS};
use crate::storage::SourceSeed;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Config file too large: {0}")]
    TooLarge(String),

    /// A value parsed but is out of range
    #[error("Invalid config value: {0}")]
    Invalid(String),
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Top-level configuration.
///
/// Every field uses `#[serde(default)]` so any subset of keys can be given.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// SQLite file path, or `":memory:"`
    pub database_path: PathBuf,

    /// Default tracing filter; `RUST_LOG` takes precedence
    pub log_level: String,

    pub ingest: IngestConfig,
    pub retention: RetentionConfig,
    pub classifier: ClassifierConfig,

    /// Source registry seed, synced into the store at startup
    pub sources: Vec<SourceConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Entries taken per source per run (most recent first)
    pub per_source_limit: usize,
    pub max_concurrent_fetches: usize,
    /// Entries processed concurrently within one round
    pub max_concurrent_entries: usize,
    pub fetch_timeout_secs: u64,
    pub reachability_timeout_secs: u64,
    pub classifier_timeout_secs: u64,
    /// Check article URLs are reachable before persisting them
    pub check_reachability: bool,
    /// Allow feeds and article links on localhost/private networks
    pub allow_private_hosts: bool,
    /// Scheduler cadence for `pulse serve`
    pub interval_minutes: u64,
    pub user_agent: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetentionConfig {
    /// Fresh-today count at or above which a full cleanup runs
    pub min_articles: i64,
    /// Total eligible count above which a conservative cleanup may run
    pub conservative_min_total: i64,
    pub full_window_hours: i64,
    pub conservative_window_hours: i64,
    pub interval_hours: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Closed set of accepted topic labels
    pub topics: Vec<String>,
    /// Label treated as reject
    pub catch_all: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    pub name: String,
    pub url: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("pulse.db"),
            log_level: "info".to_string(),
            ingest: IngestConfig::default(),
            retention: RetentionConfig::default(),
            classifier: ClassifierConfig::default(),
            sources: Vec::new(),
        }
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            per_source_limit: 10,
            max_concurrent_fetches: 8,
            max_concurrent_entries: 8,
            fetch_timeout_secs: 10,
            reachability_timeout_secs: 5,
            classifier_timeout_secs: 5,
            check_reachability: true,
            allow_private_hosts: false,
            interval_minutes: 60,
            user_agent: concat!("pulse/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            min_articles: 10,
            conservative_min_total: 20,
            full_window_hours: 24,
            conservative_window_hours: 48,
            interval_hours: 24,
        }
    }
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            topics: DEFAULT_TOPICS.iter().map(|t| t.to_string()).collect(),
            catch_all: DEFAULT_CATCH_ALL.to_string(),
        }
    }
}

impl IngestConfig {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn reachability_timeout(&self) -> Duration {
        Duration::from_secs(self.reachability_timeout_secs)
    }

    pub fn classifier_timeout(&self) -> Duration {
        Duration::from_secs(self.classifier_timeout_secs)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_minutes.saturating_mul(60))
    }
}

impl RetentionConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_hours.saturating_mul(3600))
    }
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    /// Upper bound for retention windows (100 years).
    pub const MAX_WINDOW_HOURS: i64 = 24 * 365 * 100;

    const KNOWN_KEYS: &'static [&'static str] = &[
        "database_path",
        "log_level",
        "ingest",
        "retention",
        "classifier",
        "sources",
    ];
    const INGEST_KEYS: &'static [&'static str] = &[
        "per_source_limit",
        "max_concurrent_fetches",
        "max_concurrent_entries",
        "fetch_timeout_secs",
        "reachability_timeout_secs",
        "classifier_timeout_secs",
        "check_reachability",
        "allow_private_hosts",
        "interval_minutes",
        "user_agent",
    ];
    const RETENTION_KEYS: &'static [&'static str] = &[
        "min_articles",
        "conservative_min_total",
        "full_window_hours",
        "conservative_window_hours",
        "interval_hours",
    ];
    const CLASSIFIER_KEYS: &'static [&'static str] = &["topics", "catch_all"];

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Out-of-range values → `Err(ConfigError::Invalid)`
    /// - Unknown keys → accepted, logged as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        // Size check before reading
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // Deleted between metadata and read
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        Self::from_toml(&content)
    }

    /// Parse configuration from TOML text. Blank text gives defaults.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        if content.trim().is_empty() {
            tracing::debug!("Config is empty, using defaults");
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            warn_unknown_keys(&raw, "", Self::KNOWN_KEYS);
            for (section, known) in [
                ("ingest", Self::INGEST_KEYS),
                ("retention", Self::RETENTION_KEYS),
                ("classifier", Self::CLASSIFIER_KEYS),
            ] {
                if let Some(toml::Value::Table(table)) = raw.get(section) {
                    warn_unknown_keys(table, section, known);
                }
            }
        }

        let config: Config = toml::from_str(content)?;
        config.validate()?;
        tracing::info!(
            sources = config.sources.len(),
            database = %config.database_path.display(),
            "Loaded configuration"
        );
        Ok(config)
    }

    /// Reject values that would stall or disable the pipeline.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let ingest = &self.ingest;
        for (name, value) in [
            ("ingest.per_source_limit", ingest.per_source_limit as u64),
            ("ingest.max_concurrent_fetches", ingest.max_concurrent_fetches as u64),
            ("ingest.max_concurrent_entries", ingest.max_concurrent_entries as u64),
            ("ingest.fetch_timeout_secs", ingest.fetch_timeout_secs),
            ("ingest.reachability_timeout_secs", ingest.reachability_timeout_secs),
            ("ingest.classifier_timeout_secs", ingest.classifier_timeout_secs),
            ("ingest.interval_minutes", ingest.interval_minutes),
            ("retention.interval_hours", self.retention.interval_hours),
        ] {
            if value == 0 {
                return Err(ConfigError::Invalid(format!("{name} must be greater than 0")));
            }
        }

        let retention = &self.retention;
        if retention.min_articles < 1 {
            return Err(ConfigError::Invalid(
                "retention.min_articles must be at least 1".into(),
            ));
        }
        if retention.full_window_hours < 1
            || retention.conservative_window_hours < retention.full_window_hours
        {
            return Err(ConfigError::Invalid(
                "retention windows must satisfy 1 <= full_window_hours <= conservative_window_hours"
                    .into(),
            ));
        }
        if retention.conservative_window_hours > Self::MAX_WINDOW_HOURS {
            return Err(ConfigError::Invalid(format!(
                "retention windows must not exceed {} hours",
                Self::MAX_WINDOW_HOURS
            )));
        }

        if self.classifier.topics.is_empty() {
            return Err(ConfigError::Invalid("classifier.topics must not be empty".into()));
        }

        for source in &self.sources {
            if source.url.trim().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "source '{}' has an empty url",
                    source.name
                )));
            }
        }

        Ok(())
    }

    /// Source registry entries for `Database::sync_sources`
    pub fn source_seeds(&self) -> Vec<SourceSeed> {
        self.sources
            .iter()
            .map(|s| SourceSeed {
                name: s.name.trim().to_string(),
                feed_url: s.url.trim().to_string(),
            })
            .collect()
    }
}

fn warn_unknown_keys(table: &toml::Table, section: &str, known: &[&str]) {
    for key in table.keys() {
        if !known.contains(&key.as_str()) {
            if section.is_empty() {
                tracing::warn!(key = %key, "Unknown key in config file, ignoring");
            } else {
                tracing::warn!(section = %section, key = %key, "Unknown key in config file, ignoring");
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.database_path, PathBuf::from("pulse.db"));
        assert_eq!(config.ingest.per_source_limit, 10);
        assert_eq!(config.ingest.max_concurrent_fetches, 8);
        assert!(config.ingest.check_reachability);
        assert!(!config.ingest.allow_private_hosts);
        assert_eq!(config.retention.min_articles, 10);
        assert_eq!(config.retention.conservative_min_total, 20);
        assert_eq!(config.retention.full_window_hours, 24);
        assert_eq!(config.retention.conservative_window_hours, 48);
        assert_eq!(config.classifier.topics.len(), 9);
        assert_eq!(config.classifier.catch_all, "Other");
        assert!(config.sources.is_empty());
        config.validate().unwrap();
    }

    #[test]
    fn test_missing_file_returns_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.ingest.interval_minutes, 60);
    }

    #[test]
    fn test_whitespace_only_file_returns_default() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "   \n\t").unwrap();
        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.retention.interval_hours, 24);
    }

    #[test]
    fn test_partial_config_uses_defaults_for_missing() {
        let config = Config::from_toml(
            r#"
            database_path = "/var/lib/pulse/pulse.db"

            [ingest]
            per_source_limit = 2
            "#,
        )
        .unwrap();
        assert_eq!(config.database_path, PathBuf::from("/var/lib/pulse/pulse.db"));
        assert_eq!(config.ingest.per_source_limit, 2);
        assert_eq!(config.ingest.max_concurrent_fetches, 8);
        assert_eq!(config.retention.min_articles, 10);
    }

    #[test]
    fn test_sources_and_classifier() {
        let config = Config::from_toml(
            r#"
            [classifier]
            topics = ["Open Source", "AI & ML"]
            catch_all = "Misc"

            [[sources]]
            name = " Hacker News "
            url = "https://news.ycombinator.com/rss"

            [[sources]]
            name = "LWN"
            url = "https://lwn.net/headlines/rss"
            "#,
        )
        .unwrap();
        assert_eq!(config.classifier.catch_all, "Misc");
        let seeds = config.source_seeds();
        assert_eq!(seeds.len(), 2);
        assert_eq!(seeds[0].name, "Hacker News");
        assert_eq!(seeds[1].feed_url, "https://lwn.net/headlines/rss");
    }

    #[test]
    fn test_invalid_toml_returns_error() {
        let result = Config::from_toml("[ingest\nper_source_limit = 3");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_wrong_type_returns_error() {
        let result = Config::from_toml("[ingest]\nper_source_limit = \"ten\"");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_unknown_keys_accepted() {
        let config = Config::from_toml("theme = \"dark\"\n[ingest]\nturbo = true").unwrap();
        assert_eq!(config.ingest.per_source_limit, 10);
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let result = Config::from_toml("[ingest]\nmax_concurrent_fetches = 0");
        assert!(matches!(result, Err(ConfigError::Invalid(msg)) if msg.contains("max_concurrent_fetches")));
    }

    #[test]
    fn test_inverted_windows_rejected() {
        let result =
            Config::from_toml("[retention]\nfull_window_hours = 72\nconservative_window_hours = 48");
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_oversized_windows_rejected() {
        let result = Config::from_toml(
            "[retention]\nfull_window_hours = 10000000000000000\nconservative_window_hours = 10000000000000000",
        );
        assert!(matches!(result, Err(ConfigError::Invalid(_))));

        let at_limit = format!(
            "[retention]\nconservative_window_hours = {}",
            Config::MAX_WINDOW_HOURS
        );
        assert!(Config::from_toml(&at_limit).is_ok());
    }

    #[test]
    fn test_too_large_file_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let filler = "# padding\n".repeat(110_000);
        file.write_all(filler.as_bytes()).unwrap();
        assert!(matches!(
            Config::load(file.path()),
            Err(ConfigError::TooLarge(_))
        ));
    }
}

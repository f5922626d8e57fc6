use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;

use super::report::{EntryOutcome, IngestReport};
use super::rounds::RoundRobin;
use super::IngestError;
use crate::classify::{ClassifierGate, Verdict};
use crate::config::IngestConfig;
use crate::content::{sanitize, Entry};
use crate::feed::FeedFetcher;
use crate::filter::{Admission, AdmissionFilter};
use crate::storage::{
    Database, DatabaseError, InsertOutcome, NewContent, Source, INGEST_LAST_REPORT,
    INGEST_LAST_RUN,
};

/// Per-run limits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestSettings {
    /// K: entries taken per source per run
    pub per_source_limit: usize,
    pub max_concurrent_fetches: usize,
    pub max_concurrent_entries: usize,
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self::from(&IngestConfig::default())
    }
}

impl From<&IngestConfig> for IngestSettings {
    fn from(config: &IngestConfig) -> Self {
        Self {
            per_source_limit: config.per_source_limit,
            max_concurrent_fetches: config.max_concurrent_fetches.max(1),
            max_concurrent_entries: config.max_concurrent_entries.max(1),
        }
    }
}

/// Runs one ingestion pass per call. Holds no state between runs.
pub struct Ingestor {
    db: Database,
    fetcher: Arc<dyn FeedFetcher>,
    filter: AdmissionFilter,
    gate: ClassifierGate,
    settings: IngestSettings,
}

impl Ingestor {
    pub fn new(
        db: Database,
        fetcher: Arc<dyn FeedFetcher>,
        filter: AdmissionFilter,
        gate: ClassifierGate,
        settings: IngestSettings,
    ) -> Self {
        Self {
            db,
            fetcher,
            filter,
            gate,
            settings,
        }
    }

    /// Run one full pass.
    pub async fn run_once(&self) -> IngestReport {
        let (_tx, rx) = watch::channel(false);
        self.run_until(rx).await
    }

    /// Run one pass, stopping between rounds once `shutdown` reads `true`.
    ///
    /// Entries already persisted stay persisted; there is no multi-entry
    /// batch to roll back.
    pub async fn run_until(&self, shutdown: watch::Receiver<bool>) -> IngestReport {
        let started = Instant::now();
        let started_at = chrono::Utc::now().to_rfc3339();

        let mut report = match self.prepare().await {
            Ok(sources) => self.run_sources(sources, &shutdown).await,
            Err(e) => {
                tracing::error!(error = %e, "Ingestion run aborted");
                IngestReport::failed(started_at.clone(), e.to_string())
            }
        };
        report.started_at = started_at;
        report.duration_ms = started.elapsed().as_millis() as u64;

        if report.success {
            self.record(&report).await;
        }

        tracing::info!(
            success = report.success,
            articles_added = report.articles_added,
            sources = report.sources_total,
            sources_failed = report.sources_failed,
            attempted = report.entries_attempted,
            duplicates = report.duplicates,
            rejected = report.rejected,
            unreachable = report.unreachable,
            failed = report.failed_entries,
            rounds = report.rounds,
            interrupted = report.interrupted,
            duration_ms = report.duration_ms,
            "Ingestion run complete"
        );
        report
    }

    /// Shared setup. Failing here is the only way a run fails as a whole.
    async fn prepare(&self) -> Result<Vec<Source>, IngestError> {
        self.db.ping().await?;
        self.db.list_sources().await.map_err(|e| {
            match e.downcast::<sqlx::Error>() {
                Ok(sqlx_err) => IngestError::StoreUnavailable(DatabaseError::from_sqlx(sqlx_err)),
                Err(other) => IngestError::SourceRegistry(other.to_string()),
            }
        })
    }

    async fn run_sources(&self, sources: Vec<Source>, shutdown: &watch::Receiver<bool>) -> IngestReport {
        let mut report = IngestReport {
            success: true,
            sources_total: sources.len(),
            ..Default::default()
        };

        let lanes = self.fetch_all(sources, &mut report).await;
        let mut rounds = RoundRobin::new(lanes);

        loop {
            if *shutdown.borrow() {
                tracing::info!(
                    round = rounds.round(),
                    remaining = rounds.remaining(),
                    "Shutdown requested, stopping ingestion between rounds"
                );
                report.interrupted = true;
                break;
            }

            let round = rounds.round();
            let Some(batch) = rounds.next_round() else {
                break;
            };

            let outcomes: Vec<EntryOutcome> = stream::iter(batch)
                .map(|(source_id, entry)| self.process_entry(source_id, entry))
                .buffer_unordered(self.settings.max_concurrent_entries)
                .collect()
                .await;

            tracing::debug!(round = round, entries = outcomes.len(), "Round complete");
            for outcome in &outcomes {
                report.record(outcome);
            }
            report.rounds += 1;
        }

        report
    }

    /// Fetch every source with bounded concurrency, in registry order.
    /// Failed sources are logged, recorded and left out of the run.
    async fn fetch_all(&self, sources: Vec<Source>, report: &mut IngestReport) -> Vec<(i64, Vec<Entry>)> {
        let limit = self.settings.per_source_limit;
        let results: Vec<_> = stream::iter(sources)
            .map(|source| async move {
                let result = self.fetcher.fetch(&source, limit).await;
                (source, result)
            })
            .buffered(self.settings.max_concurrent_fetches)
            .collect()
            .await;

        let mut lanes = Vec::with_capacity(results.len());
        for (source, result) in results {
            match result {
                Ok(entries) => {
                    tracing::debug!(
                        source_id = source.id,
                        name = %source.name,
                        entries = entries.len(),
                        "Source fetched"
                    );
                    if let Err(e) = self.db.mark_source_fetched(source.id).await {
                        tracing::warn!(source_id = source.id, error = %e, "Failed to record fetch time");
                    }
                    lanes.push((source.id, entries));
                }
                Err(e) => {
                    tracing::warn!(
                        source_id = source.id,
                        feed = %source.feed_url,
                        error = %e,
                        "Source fetch failed, skipping for this run"
                    );
                    report.sources_failed += 1;
                    if let Err(db_err) = self.db.set_source_error(source.id, &e.to_string()).await {
                        tracing::warn!(source_id = source.id, error = %db_err, "Failed to record source error");
                    }
                }
            }
        }
        lanes
    }

    /// Sanitize → filter → classify → persist for one entry.
    ///
    /// Never fails: every problem becomes an outcome local to this entry.
    async fn process_entry(&self, source_id: i64, entry: Entry) -> EntryOutcome {
        let extracted = sanitize(&entry);
        let url = entry.link.as_str();

        match self.filter.admit(url).await {
            Ok(Admission::Accept) => {}
            Ok(Admission::Duplicate) => return EntryOutcome::Duplicate,
            Ok(Admission::Unreachable) => {
                tracing::debug!(source_id = source_id, url = %url, "Article unreachable, skipping");
                return EntryOutcome::Unreachable;
            }
            Err(e) => {
                tracing::warn!(source_id = source_id, url = %url, error = %e, "Duplicate check failed");
                return EntryOutcome::Failed(e.to_string());
            }
        }

        let topic = match self.gate.check(&extracted.title, &extracted.excerpt).await {
            Verdict::Accept(topic) => topic,
            Verdict::Reject(reason) => {
                tracing::debug!(source_id = source_id, url = %url, reason = ?reason, "Entry rejected by classifier");
                return EntryOutcome::Rejected(reason);
            }
        };

        let published_at = entry
            .published_at
            .unwrap_or_else(chrono::Utc::now)
            .timestamp();

        let record = NewContent {
            source_id,
            title: extracted.title,
            excerpt: extracted.excerpt,
            article_url: entry.link.clone(),
            published_at,
            topic,
            image_url: extracted.image_url,
        };

        match self.db.insert_content(&record).await {
            Ok(InsertOutcome::Inserted(id)) => {
                tracing::debug!(source_id = source_id, content_id = id, topic = %record.topic, "Article stored");
                EntryOutcome::Inserted(id)
            }
            Ok(InsertOutcome::AlreadyExists) => EntryOutcome::AlreadyExists,
            Err(e) => {
                tracing::warn!(source_id = source_id, url = %url, error = %e, "Failed to store article");
                EntryOutcome::Failed(e.to_string())
            }
        }
    }

    async fn record(&self, report: &IngestReport) {
        let json = match serde_json::to_string(report) {
            Ok(json) => json,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to serialize ingestion report");
                return;
            }
        };
        let finished_at = chrono::Utc::now().to_rfc3339();
        if let Err(e) = self
            .db
            .record_run(INGEST_LAST_RUN, INGEST_LAST_REPORT, &finished_at, &json)
            .await
        {
            tracing::warn!(error = %e, "Failed to record ingestion run");
        }
    }
}

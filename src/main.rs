use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;

use pulse::classify::{ClassifierGate, KeywordClassifier};
use pulse::config::Config;
use pulse::feed::HttpFeedFetcher;
use pulse::filter::{AdmissionFilter, HttpReachability, Reachability};
use pulse::ingest::{IngestSettings, Ingestor};
use pulse::logging;
use pulse::retention::{RelevanceSweep, RetentionAction, RetentionEngine, RetentionPolicy};
use pulse::scheduler::Scheduler;
use pulse::storage::{ContentStats, Database, Source};
use pulse::util::UrlPolicy;

#[derive(Parser, Debug)]
#[command(
    name = "pulse",
    version,
    about = "Tech-news ingestion: round-robin feed polling, topic gating and favorite-safe retention"
)]
struct Args {
    /// Configuration file
    #[arg(long, short, value_name = "FILE", default_value = "pulse.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one ingestion pass and print its report
    Ingest,
    /// Run one retention pass and print its decision
    Cleanup,
    /// Re-classify stored content and delete what no longer fits
    Prune,
    /// Run ingestion and cleanup on their schedules until Ctrl-C
    Serve,
    /// Print catalog and source statistics
    Status,
}

#[derive(Serialize)]
struct Status {
    #[serde(flatten)]
    stats: ContentStats,
    source_list: Vec<Source>,
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize report")?;
    println!("{json}");
    Ok(())
}

fn url_policy(config: &Config) -> UrlPolicy {
    UrlPolicy {
        allow_private_hosts: config.ingest.allow_private_hosts,
    }
}

fn http_client(config: &Config) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(&config.ingest.user_agent)
        .connect_timeout(config.ingest.fetch_timeout())
        .build()
        .context("Failed to build HTTP client")
}

fn classifier_gate(config: &Config) -> Result<ClassifierGate> {
    let classifier = KeywordClassifier::new(config.classifier.catch_all.clone())
        .context("Failed to build keyword classifier")?;
    Ok(ClassifierGate::new(
        Arc::new(classifier),
        config.classifier.topics.iter().cloned(),
        config.classifier.catch_all.clone(),
        config.ingest.classifier_timeout(),
    ))
}

fn build_ingestor(config: &Config, db: &Database) -> Result<Ingestor> {
    let client = http_client(config)?;
    let policy = url_policy(config);

    let fetcher = HttpFeedFetcher::new(client.clone(), config.ingest.fetch_timeout(), policy);
    let reachability = config.ingest.check_reachability.then(|| {
        Arc::new(HttpReachability::new(client, policy)) as Arc<dyn Reachability>
    });
    let filter = AdmissionFilter::new(
        db.clone(),
        reachability,
        config.ingest.reachability_timeout(),
    );

    Ok(Ingestor::new(
        db.clone(),
        Arc::new(fetcher),
        filter,
        classifier_gate(config)?,
        IngestSettings::from(&config.ingest),
    ))
}

/// Open the store and seed the source registry from configuration
async fn open_database(config: &Config) -> Result<Database> {
    let path = config
        .database_path
        .to_str()
        .ok_or_else(|| anyhow::anyhow!("Invalid UTF-8 in database path"))?;
    let db = Database::open(path)
        .await
        .with_context(|| format!("Failed to open database '{path}'"))?;
    db.sync_sources(&config.source_seeds())
        .await
        .context("Failed to sync sources")?;
    Ok(db)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let log_level = logging::init();
    let config = Config::load(&args.config)
        .with_context(|| format!("Failed to load config '{}'", args.config.display()))?;
    log_level.apply(&config.log_level);

    let db = open_database(&config).await?;

    let result = run(args.command, &config, &db).await;
    db.close().await;
    result
}

async fn run(command: Command, config: &Config, db: &Database) -> Result<()> {
    match command {
        Command::Ingest => {
            let report = build_ingestor(config, db)?.run_once().await;
            print_json(&report)?;
            if !report.success {
                anyhow::bail!(
                    "Ingestion failed: {}",
                    report.error.as_deref().unwrap_or("unknown error")
                );
            }
        }
        Command::Cleanup => {
            let engine = RetentionEngine::new(db.clone(), RetentionPolicy::from(&config.retention));
            let decision = engine.run_once().await;
            print_json(&decision)?;
            if decision.action == RetentionAction::Error {
                anyhow::bail!("Cleanup failed: {}", decision.reason);
            }
        }
        Command::Prune => {
            let sweep = RelevanceSweep::new(
                db.clone(),
                classifier_gate(config)?,
                config.ingest.max_concurrent_entries,
            );
            let report = sweep.run_once().await.context("Relevance sweep failed")?;
            print_json(&report)?;
        }
        Command::Serve => {
            let ingestor = Arc::new(build_ingestor(config, db)?);
            let engine = Arc::new(RetentionEngine::new(
                db.clone(),
                RetentionPolicy::from(&config.retention),
            ));

            let (shutdown_tx, shutdown_rx) = watch::channel(false);
            tokio::spawn(async move {
                match tokio::signal::ctrl_c().await {
                    Ok(()) => tracing::info!("Ctrl-C received, shutting down"),
                    Err(e) => tracing::error!(error = %e, "Failed to listen for Ctrl-C"),
                }
                let _ = shutdown_tx.send(true);
            });

            Scheduler::new()
                .every(config.ingest.interval(), true, ingestor)
                .every(config.retention.interval(), false, engine)
                .run(shutdown_rx)
                .await;
        }
        Command::Status => {
            let stats = db.content_stats().await.context("Failed to read stats")?;
            let source_list = db.list_sources().await.context("Failed to list sources")?;
            print_json(&Status { stats, source_list })?;
        }
    }
    Ok(())
}

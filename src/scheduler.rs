//! Periodic triggers for `pulse serve`.
//!
//! Ingestion and cleanup run as two independent tasks on their own
//! intervals. Neither waits for the other; the store's transactions are the
//! only coordination between them.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Duration, Instant, MissedTickBehavior};

use crate::ingest::Ingestor;
use crate::retention::{RetentionAction, RetentionEngine};

/// One unit of background work triggered on a timer
#[async_trait]
pub trait ScheduledJob: Send + Sync {
    fn name(&self) -> &'static str;

    /// Run once. `shutdown` flips to `true` when the process is stopping;
    /// long jobs should check it between units of work.
    async fn run(&self, shutdown: watch::Receiver<bool>);
}

#[async_trait]
impl ScheduledJob for Ingestor {
    fn name(&self) -> &'static str {
        "ingest"
    }

    async fn run(&self, shutdown: watch::Receiver<bool>) {
        let report = self.run_until(shutdown).await;
        if !report.success {
            tracing::error!(error = ?report.error, "Scheduled ingestion failed");
        }
    }
}

#[async_trait]
impl ScheduledJob for RetentionEngine {
    fn name(&self) -> &'static str {
        "cleanup"
    }

    async fn run(&self, _shutdown: watch::Receiver<bool>) {
        let decision = self.run_once().await;
        if decision.action == RetentionAction::Error {
            tracing::error!(reason = %decision.reason, "Scheduled cleanup failed");
        }
    }
}

struct Trigger {
    job: Arc<dyn ScheduledJob>,
    period: Duration,
    run_immediately: bool,
}

/// Background scheduler. Add jobs, then [`Scheduler::run`] until shutdown.
#[derive(Default)]
pub struct Scheduler {
    triggers: Vec<Trigger>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `job` every `period`; the first run happens right away when
    /// `run_immediately` is set, otherwise after one period.
    pub fn every(mut self, period: Duration, run_immediately: bool, job: Arc<dyn ScheduledJob>) -> Self {
        self.triggers.push(Trigger {
            job,
            period,
            run_immediately,
        });
        self
    }

    /// Drive every job until `shutdown` reads `true` (or its sender is
    /// dropped). A job already running finishes its current unit of work.
    pub async fn run(self, shutdown: watch::Receiver<bool>) {
        let handles: Vec<JoinHandle<()>> = self
            .triggers
            .into_iter()
            .map(|trigger| tokio::spawn(drive(trigger, shutdown.clone())))
            .collect();

        for handle in handles {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Scheduled task panicked");
            }
        }
        tracing::info!("Scheduler stopped");
    }
}

async fn drive(trigger: Trigger, mut shutdown: watch::Receiver<bool>) {
    let name = trigger.job.name();
    let start = if trigger.run_immediately {
        Instant::now()
    } else {
        Instant::now() + trigger.period
    };
    let mut timer = interval_at(start, trigger.period);
    timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

    tracing::info!(
        job = name,
        interval_secs = trigger.period.as_secs(),
        "Scheduled job started"
    );

    loop {
        if *shutdown.borrow() {
            break;
        }
        tokio::select! {
            _ = timer.tick() => {
                tracing::debug!(job = name, "Running scheduled job");
                trigger.job.run(shutdown.clone()).await;
            }
            changed = shutdown.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }

    tracing::info!(job = name, "Scheduled job stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Counting {
        runs: AtomicUsize,
    }

    #[async_trait]
    impl ScheduledJob for Counting {
        fn name(&self) -> &'static str {
            "counting"
        }

        async fn run(&self, _: watch::Receiver<bool>) {
            self.runs.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_jobs_run_on_their_own_cadence() {
        let hourly = Arc::new(Counting::default());
        let daily = Arc::new(Counting::default());
        let (tx, rx) = watch::channel(false);

        let scheduler = Scheduler::new()
            .every(Duration::from_secs(3600), true, hourly.clone())
            .every(Duration::from_secs(86_400), false, daily.clone());
        let task = tokio::spawn(scheduler.run(rx));

        // Just past one day: hourly ran at t=0..=24h, daily once at 24h
        tokio::time::sleep(Duration::from_secs(86_400 + 60)).await;
        tx.send(true).unwrap();
        task.await.unwrap();

        assert_eq!(hourly.runs.load(Ordering::SeqCst), 25);
        assert_eq!(daily.runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_before_first_tick_runs_nothing() {
        let job = Arc::new(Counting::default());
        let (tx, rx) = watch::channel(false);
        tx.send(true).unwrap();

        Scheduler::new()
            .every(Duration::from_secs(60), true, job.clone())
            .run(rx)
            .await;

        assert_eq!(job.runs.load(Ordering::SeqCst), 0);
    }
}

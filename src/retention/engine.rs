use anyhow::{anyhow, Result};
use chrono::{DateTime, Local, NaiveDate, TimeDelta, TimeZone};
use serde::Serialize;

use super::policy::{decide, RetentionAction, RetentionPolicy};
use crate::storage::{Database, DayBounds, CLEANUP_LAST_REPORT, CLEANUP_LAST_RUN};

/// Observable record of one retention run
#[derive(Debug, Clone, Serialize)]
pub struct RetentionDecision {
    pub action: RetentionAction,
    pub deleted_count: u64,
    pub reason: String,
    pub fresh_today: i64,
    pub yesterday_count: i64,
    pub total_eligible: i64,
    /// Unix seconds; rows published before it were eligible for deletion
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cutoff: Option<i64>,
    pub ran_at: String,
}

impl RetentionDecision {
    fn error(ran_at: String, reason: String) -> Self {
        Self {
            action: RetentionAction::Error,
            deleted_count: 0,
            reason,
            fresh_today: 0,
            yesterday_count: 0,
            total_eligible: 0,
            cutoff: None,
            ran_at,
        }
    }
}

/// First instant of `date` in local time. A midnight skipped by a DST jump
/// falls back to 01:00.
fn local_day_start(date: NaiveDate) -> Result<i64> {
    [0, 1]
        .into_iter()
        .filter_map(|hour| date.and_hms_opt(hour, 0, 0))
        .find_map(|naive| Local.from_local_datetime(&naive).earliest())
        .map(|dt| dt.timestamp())
        .ok_or_else(|| anyhow!("no local start of day for {date}"))
}

/// Unix-second instant `hours` before `now`
fn cutoff_before(now: DateTime<Local>, hours: i64) -> Result<i64> {
    TimeDelta::try_hours(hours)
        .and_then(|window| now.checked_sub_signed(window))
        .map(|cutoff| cutoff.timestamp())
        .ok_or_else(|| anyhow!("retention window of {hours}h is out of range"))
}

/// Local calendar-day boundaries around `now`
pub fn day_bounds(now: DateTime<Local>) -> Result<DayBounds> {
    let today = now.date_naive();
    let yesterday = today
        .pred_opt()
        .ok_or_else(|| anyhow!("date out of range: {today}"))?;
    let tomorrow = today
        .succ_opt()
        .ok_or_else(|| anyhow!("date out of range: {today}"))?;

    Ok(DayBounds {
        yesterday_start: local_day_start(yesterday)?,
        today_start: local_day_start(today)?,
        tomorrow_start: local_day_start(tomorrow)?,
    })
}

/// Runs one count-decide-delete pass per call.
#[derive(Clone)]
pub struct RetentionEngine {
    db: Database,
    policy: RetentionPolicy,
}

impl RetentionEngine {
    pub fn new(db: Database, policy: RetentionPolicy) -> Self {
        Self { db, policy }
    }

    pub async fn run_once(&self) -> RetentionDecision {
        self.run_at(Local::now()).await
    }

    /// Run as if the wall clock read `now`.
    ///
    /// Never returns an error: a store failure becomes
    /// [`RetentionAction::Error`] with the transaction rolled back.
    pub async fn run_at(&self, now: DateTime<Local>) -> RetentionDecision {
        let ran_at = now.to_rfc3339();
        let decision = match self.execute(now, ran_at.clone()).await {
            Ok(decision) => decision,
            Err(e) => {
                tracing::error!(error = %e, "Retention run failed, nothing deleted");
                RetentionDecision::error(ran_at, e.to_string())
            }
        };

        tracing::info!(
            action = ?decision.action,
            deleted = decision.deleted_count,
            fresh_today = decision.fresh_today,
            yesterday = decision.yesterday_count,
            total_eligible = decision.total_eligible,
            reason = %decision.reason,
            "Retention run complete"
        );

        if decision.action != RetentionAction::Error {
            self.record(&decision).await;
        }
        decision
    }

    async fn execute(&self, now: DateTime<Local>, ran_at: String) -> Result<RetentionDecision> {
        let days = day_bounds(now)?;

        // Counts and delete share one write transaction; an early return
        // drops it, which rolls back.
        let mut tx = self.db.begin_retention().await?;
        let counts = tx.eligible_counts(&days).await?;
        let plan = decide(&counts, &self.policy);

        let cutoff = plan.window_hours.map(|hours| cutoff_before(now, hours)).transpose()?;
        let deleted_count = match cutoff {
            Some(cutoff) => tx.delete_eligible_older_than(cutoff).await?,
            None => 0,
        };
        tx.commit().await?;

        Ok(RetentionDecision {
            action: plan.action,
            deleted_count,
            reason: plan.reason,
            fresh_today: counts.fresh_today,
            yesterday_count: counts.yesterday,
            total_eligible: counts.total_eligible,
            cutoff,
            ran_at,
        })
    }

    async fn record(&self, decision: &RetentionDecision) {
        let json = match serde_json::to_string(decision) {
            Ok(json) => json,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to serialize retention decision");
                return;
            }
        };
        if let Err(e) = self
            .db
            .record_run(CLEANUP_LAST_RUN, CLEANUP_LAST_REPORT, &decision.ran_at, &json)
            .await
        {
            tracing::warn!(error = %e, "Failed to record retention run");
        }
    }
}

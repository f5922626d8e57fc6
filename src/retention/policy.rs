use serde::Serialize;

use crate::config::RetentionConfig;
use crate::storage::EligibleCounts;

/// Terminal state of one retention run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RetentionAction {
    /// Enough fresh content: delete eligible content older than the full window
    FullCleanup,
    /// Some fresh content and plenty overall: delete past the wider window
    ConservativeCleanup,
    Skipped,
    /// Store failure; the transaction was rolled back
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    pub min_articles: i64,
    pub conservative_min_total: i64,
    pub full_window_hours: i64,
    pub conservative_window_hours: i64,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self::from(&RetentionConfig::default())
    }
}

impl From<&RetentionConfig> for RetentionPolicy {
    fn from(config: &RetentionConfig) -> Self {
        Self {
            min_articles: config.min_articles,
            conservative_min_total: config.conservative_min_total,
            full_window_hours: config.full_window_hours,
            conservative_window_hours: config.conservative_window_hours,
        }
    }
}

/// What a run intends to do, before anything is deleted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    pub action: RetentionAction,
    /// Delete eligible content older than this many hours; `None` deletes nothing
    pub window_hours: Option<i64>,
    pub reason: String,
}

/// Apply the threshold table to one snapshot of eligible counts.
///
/// | condition                                             | action       |
/// |-------------------------------------------------------|--------------|
/// | `fresh_today >= min_articles`                         | full         |
/// | `0 < fresh_today < min` and `total > conservative_min`| conservative |
/// | otherwise                                             | skip         |
///
/// `yesterday` is diagnostic only.
pub fn decide(counts: &EligibleCounts, policy: &RetentionPolicy) -> Plan {
    let fresh = counts.fresh_today;
    let total = counts.total_eligible;

    if fresh >= policy.min_articles {
        return Plan {
            action: RetentionAction::FullCleanup,
            window_hours: Some(policy.full_window_hours),
            reason: format!(
                "{fresh} fresh articles today (>= {}); removing content older than {}h",
                policy.min_articles, policy.full_window_hours
            ),
        };
    }

    if fresh > 0 && total > policy.conservative_min_total {
        return Plan {
            action: RetentionAction::ConservativeCleanup,
            window_hours: Some(policy.conservative_window_hours),
            reason: format!(
                "only {fresh} fresh articles today but {total} eligible in total; \
                 removing content older than {}h",
                policy.conservative_window_hours
            ),
        };
    }

    let reason = if fresh == 0 {
        "no fresh articles today; keeping existing content".to_string()
    } else {
        format!(
            "only {fresh} fresh articles and {total} eligible in total (<= {}); keeping existing content",
            policy.conservative_min_total
        )
    };
    Plan {
        action: RetentionAction::Skipped,
        window_hours: None,
        reason,
    }
}

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use super::Classifier;

/// Outcome of gating one entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Accept(String),
    Reject(RejectReason),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    /// Classifier returned no label
    NoLabel,
    /// Classifier returned the catch-all label
    CatchAll,
    /// Label outside the configured topic set
    UnknownLabel(String),
    Timeout,
    Failed(String),
}

/// Hard filter in front of a [`Classifier`].
///
/// Never fails: every classifier problem becomes a `Reject`.
#[derive(Clone)]
pub struct ClassifierGate {
    inner: Arc<dyn Classifier>,
    topics: HashSet<String>,
    catch_all: String,
    timeout: Duration,
}

impl ClassifierGate {
    pub fn new(
        inner: Arc<dyn Classifier>,
        topics: impl IntoIterator<Item = String>,
        catch_all: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        let catch_all = catch_all.into();
        let topics = topics.into_iter().filter(|t| *t != catch_all).collect();
        Self {
            inner,
            topics,
            catch_all,
            timeout,
        }
    }

    pub async fn check(&self, title: &str, text: &str) -> Verdict {
        if title.trim().is_empty() && text.trim().is_empty() {
            return Verdict::Reject(RejectReason::Failed("empty input".into()));
        }

        let label = match tokio::time::timeout(self.timeout, self.inner.classify(title, text)).await
        {
            Ok(Ok(label)) => label,
            Ok(Err(e)) => {
                tracing::warn!(title = %title, error = %e, "Classifier failed, rejecting entry");
                return Verdict::Reject(RejectReason::Failed(e.to_string()));
            }
            Err(_) => {
                tracing::warn!(
                    title = %title,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Classifier timed out, rejecting entry"
                );
                return Verdict::Reject(RejectReason::Timeout);
            }
        };

        match label {
            None => Verdict::Reject(RejectReason::NoLabel),
            Some(label) if label == self.catch_all => Verdict::Reject(RejectReason::CatchAll),
            Some(label) if self.topics.contains(&label) => Verdict::Accept(label),
            Some(label) => {
                tracing::warn!(title = %title, label = %label, "Classifier returned unknown label");
                Verdict::Reject(RejectReason::UnknownLabel(label))
            }
        }
    }
}

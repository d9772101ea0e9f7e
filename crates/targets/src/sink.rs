use purge_relay_core::{PublishEvent, PurgeOutcome};
use serde::Serialize;
use std::sync::Mutex;
use tracing::{info, warn};

/// Consumer of per-target outcomes.
///
/// Outcomes flow only into sinks; nothing on the publishing side branches
/// on them.
pub trait OutcomeSink: Send + Sync {
    fn record(&self, target: &str, event: &PublishEvent, outcome: &PurgeOutcome);
}

/// Logs every outcome with the affected URL
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl OutcomeSink for TracingSink {
    fn record(&self, target: &str, event: &PublishEvent, outcome: &PurgeOutcome) {
        let content_id = event.content_id.as_deref().unwrap_or("-");
        match outcome {
            PurgeOutcome::Success => {
                info!(purge_target = target, url = %event.url, content_id, "cache purged")
            }
            PurgeOutcome::Skipped(reason) => {
                info!(purge_target = target, url = %event.url, content_id, reason = %reason, "purge skipped")
            }
            PurgeOutcome::Failed(failure) => {
                warn!(purge_target = target, url = %event.url, content_id, error = %failure, "purge failed")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TargetReport {
    pub target: String,
    pub url: String,
    pub outcome: PurgeOutcome,
}

/// Keeps outcomes in memory until taken
#[derive(Debug, Default)]
pub struct MemorySink {
    reports: Mutex<Vec<TargetReport>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drain everything recorded so far
    pub fn take(&self) -> Vec<TargetReport> {
        match self.reports.lock() {
            Ok(mut reports) => std::mem::take(&mut *reports),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        }
    }
}

impl OutcomeSink for MemorySink {
    fn record(&self, target: &str, event: &PublishEvent, outcome: &PurgeOutcome) {
        let report = TargetReport {
            target: target.to_string(),
            url: event.url.clone(),
            outcome: outcome.clone(),
        };
        match self.reports.lock() {
            Ok(mut reports) => reports.push(report),
            Err(poisoned) => poisoned.into_inner().push(report),
        }
    }
}

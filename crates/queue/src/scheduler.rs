//! Periodic lifecycle jobs.
//!
//! Each job runs on its own tokio interval. A run that fails is logged and the
//! job simply waits for its next tick.

#![allow(missing_docs)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sawab_common::{AppResult, SchedulerConfig};
use sawab_core::{JobReport, LifecycleJobs};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};

/// Scheduled job types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduledJob {
    /// Complete requests left in `pending_completion` past the grace period.
    AutoComplete,
    /// Delete old read notifications.
    CleanupNotifications,
    /// Remind staff about stale disputes.
    EscalateDisputes,
    /// Nudge helpers on quiet requests.
    RemindInactive,
}

impl ScheduledJob {
    pub const ALL: [Self; 4] = [
        Self::AutoComplete,
        Self::CleanupNotifications,
        Self::EscalateDisputes,
        Self::RemindInactive,
    ];

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::AutoComplete => "auto_complete",
            Self::CleanupNotifications => "cleanup_notifications",
            Self::EscalateDisputes => "escalate_disputes",
            Self::RemindInactive => "remind_inactive",
        }
    }

    /// Configured period of this job, never shorter than one second.
    #[must_use]
    pub const fn period(self, config: &SchedulerConfig) -> Duration {
        let secs = match self {
            Self::AutoComplete => config.auto_complete_interval_secs,
            Self::CleanupNotifications => config.cleanup_interval_secs,
            Self::EscalateDisputes => config.dispute_escalation_interval_secs,
            Self::RemindInactive => config.inactivity_reminder_interval_secs,
        };
        // tokio's interval panics on a zero period
        Duration::from_secs(if secs == 0 { 1 } else { secs })
    }
}

/// Job executor trait for scheduled jobs.
#[async_trait]
pub trait JobExecutor: Send + Sync {
    async fn auto_complete(&self) -> AppResult<JobReport>;

    async fn cleanup_notifications(&self) -> AppResult<JobReport>;

    async fn escalate_disputes(&self) -> AppResult<JobReport>;

    async fn remind_inactive(&self) -> AppResult<JobReport>;

    /// Dispatch by job type.
    async fn execute(&self, job: ScheduledJob) -> AppResult<JobReport> {
        match job {
            ScheduledJob::AutoComplete => self.auto_complete().await,
            ScheduledJob::CleanupNotifications => self.cleanup_notifications().await,
            ScheduledJob::EscalateDisputes => self.escalate_disputes().await,
            ScheduledJob::RemindInactive => self.remind_inactive().await,
        }
    }
}

#[async_trait]
impl JobExecutor for LifecycleJobs {
    async fn auto_complete(&self) -> AppResult<JobReport> {
        Self::auto_complete(self).await
    }

    async fn cleanup_notifications(&self) -> AppResult<JobReport> {
        Self::cleanup_notifications(self).await
    }

    async fn escalate_disputes(&self) -> AppResult<JobReport> {
        Self::escalate_disputes(self).await
    }

    async fn remind_inactive(&self) -> AppResult<JobReport> {
        Self::remind_inactive(self).await
    }
}

/// Spawn one task per job. Returns no handles when the scheduler is disabled.
pub fn run_scheduler<E: JobExecutor + 'static>(
    config: &SchedulerConfig,
    executor: Arc<E>,
) -> Vec<JoinHandle<()>> {
    if !config.enabled {
        tracing::info!("Scheduler disabled");
        return Vec::new();
    }

    ScheduledJob::ALL
        .into_iter()
        .map(|job| spawn_job(job, job.period(config), executor.clone()))
        .collect()
}

fn spawn_job<E: JobExecutor + 'static>(
    job: ScheduledJob,
    period: Duration,
    executor: Arc<E>,
) -> JoinHandle<()> {
    tracing::info!(job = job.name(), period_secs = period.as_secs(), "Scheduling job");

    tokio::spawn(async move {
        let mut interval = interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            match executor.execute(job).await {
                Ok(report) => {
                    tracing::info!(
                        job = job.name(),
                        candidates = report.candidates,
                        succeeded = report.succeeded,
                        skipped = report.skipped,
                        failed = report.failed,
                        "Scheduled job finished"
                    );
                }
                Err(e) => {
                    tracing::error!(job = job.name(), error = %e, "Scheduled job failed");
                }
            }
        }
    })
}

//! Periodic lifecycle jobs.
//!
//! Each job selects its candidates, handles them one by one and returns a
//! [`JobReport`]. A failing item is logged and counted; it never aborts the
//! rest of the batch. Running a job twice in a row is harmless: the second
//! run finds nothing left to do or skips what was already handled.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{Duration, Utc};
use sawab_common::{AppError, AppResult, LifecycleConfig};
use sawab_db::{
    entities::{
        notification::{Notifiable, NotificationAction},
        request::{self, RequestStatus},
    },
    repositories::{NotificationRepository, OfferRepository, RequestRepository, UserRepository},
};
use sea_orm::{DatabaseConnection, entity::prelude::DateTimeWithTimeZone};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::services::notification::{NotificationIntent, NotificationService};
use crate::services::request::{CompletionTrigger, RequestService};

/// Outcome of one job run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct JobReport {
    /// Items selected by the job's query.
    pub candidates: usize,
    pub succeeded: usize,
    /// Items left alone on purpose (already handled, lost a race, cooling down).
    pub skipped: usize,
    pub failed: usize,
}

enum Outcome {
    Done,
    Skipped,
}

impl JobReport {
    fn record(&mut self, job: &'static str, item: &str, result: AppResult<Outcome>) {
        match result {
            Ok(Outcome::Done) => self.succeeded += 1,
            Ok(Outcome::Skipped) => self.skipped += 1,
            Err(e) => {
                self.failed += 1;
                error!(job, item, error = %e, "Job item failed");
            }
        }
    }
}

/// The four background jobs of the request lifecycle.
#[derive(Clone)]
pub struct LifecycleJobs {
    db: Arc<DatabaseConnection>,
    request_service: RequestService,
    notification_service: NotificationService,
    request_repo: RequestRepository,
    offer_repo: OfferRepository,
    user_repo: UserRepository,
    notification_repo: NotificationRepository,
    config: LifecycleConfig,
}

fn days_ago(days: i64) -> DateTimeWithTimeZone {
    (Utc::now() - Duration::days(days)).into()
}

impl LifecycleJobs {
    #[must_use]
    pub fn new(
        db: Arc<DatabaseConnection>,
        request_service: RequestService,
        notification_service: NotificationService,
        config: LifecycleConfig,
    ) -> Self {
        Self {
            request_repo: RequestRepository::new(db.clone()),
            offer_repo: OfferRepository::new(db.clone()),
            user_repo: UserRepository::new(db.clone()),
            notification_repo: NotificationRepository::new(db.clone()),
            db,
            request_service,
            notification_service,
            config,
        }
    }

    /// Complete requests left in `pending_completion` past the grace period.
    ///
    /// Each request goes through the regular locked completion, so a request
    /// disputed or completed in the meantime is skipped.
    pub async fn auto_complete(&self) -> AppResult<JobReport> {
        let cutoff = days_ago(self.config.auto_complete_after_days);
        let candidates = self
            .request_repo
            .find_pending_completion_before(cutoff)
            .await?;

        let mut report = JobReport {
            candidates: candidates.len(),
            ..JobReport::default()
        };
        info!(count = report.candidates, "Auto-complete candidates selected");

        for request in &candidates {
            let result = match self
                .request_service
                .complete(CompletionTrigger::Scheduler, &request.id)
                .await
            {
                Ok(completion) => {
                    info!(
                        request_id = %request.id,
                        helper_id = %completion.helper_id,
                        "Request auto-completed"
                    );
                    Ok(Outcome::Done)
                }
                Err(AppError::InvalidState(reason)) => {
                    debug!(request_id = %request.id, %reason, "Skipping auto-complete");
                    Ok(Outcome::Skipped)
                }
                Err(e) => Err(e),
            };
            report.record("auto_complete", &request.id, result);
        }

        info!(?report, "Auto-complete finished");
        Ok(report)
    }

    /// Delete read notifications past the retention period, in batches.
    ///
    /// Unread notifications are never deleted. `succeeded` counts deleted rows.
    pub async fn cleanup_notifications(&self) -> AppResult<JobReport> {
        let cutoff = days_ago(self.config.notification_retention_days);
        let batch_size = self.config.cleanup_batch_size.max(1);
        let pause = StdDuration::from_millis(self.config.cleanup_pause_ms);

        let mut deleted: u64 = 0;
        let mut batches = 0_usize;
        loop {
            let removed = self
                .notification_repo
                .delete_read_before(cutoff, batch_size)
                .await?;
            deleted += removed;
            batches += 1;
            debug!(batch = batches, removed, "Notification cleanup batch");

            if removed < batch_size {
                break;
            }
            tokio::time::sleep(pause).await;
        }

        let deleted = usize::try_from(deleted).unwrap_or(usize::MAX);
        let report = JobReport {
            candidates: deleted,
            succeeded: deleted,
            ..JobReport::default()
        };
        info!(deleted, batches, "Notification cleanup finished");
        Ok(report)
    }

    /// Ping every staff member about disputes nobody touched for a while.
    ///
    /// A staff member who already got `dispute_created` or
    /// `dispute_escalation` about the request within the window is skipped.
    pub async fn escalate_disputes(&self) -> AppResult<JobReport> {
        let cutoff = days_ago(self.config.dispute_escalation_after_days);
        let disputes = self
            .request_repo
            .find_inactive(RequestStatus::Disputed, cutoff)
            .await?;
        let staff = self.user_repo.find_staff().await?;

        let mut report = JobReport {
            candidates: disputes.len(),
            ..JobReport::default()
        };
        info!(
            count = report.candidates,
            staff = staff.len(),
            "Stale disputes selected"
        );

        let window_start: DateTimeWithTimeZone =
            (Utc::now() - Duration::hours(self.config.dispute_escalation_window_hours)).into();
        for request in &disputes {
            for admin in &staff {
                let result = self.escalate_one(request, &admin.id, window_start).await;
                report.record("escalate_disputes", &request.id, result);
            }
        }

        info!(?report, "Dispute escalation finished");
        Ok(report)
    }

    async fn escalate_one(
        &self,
        request: &request::Model,
        staff_id: &str,
        window_start: DateTimeWithTimeZone,
    ) -> AppResult<Outcome> {
        let target = Notifiable::Request(request.id.clone());
        if self
            .notification_service
            .received_since(
                staff_id,
                &[
                    NotificationAction::DisputeCreated,
                    NotificationAction::DisputeEscalation,
                ],
                &target,
                window_start,
            )
            .await?
        {
            return Ok(Outcome::Skipped);
        }

        self.deliver(NotificationIntent::new(
            NotificationAction::DisputeEscalation,
            staff_id,
            target,
        ))
        .await
    }

    /// Remind helpers of `in_progress` requests that went quiet.
    pub async fn remind_inactive(&self) -> AppResult<JobReport> {
        let cutoff = days_ago(self.config.inactivity_reminder_after_days);
        let requests = self
            .request_repo
            .find_inactive(RequestStatus::InProgress, cutoff)
            .await?;

        let mut report = JobReport {
            candidates: requests.len(),
            ..JobReport::default()
        };
        info!(count = report.candidates, "Inactive requests selected");

        let cooldown_start = days_ago(self.config.inactivity_reminder_cooldown_days);
        for request in &requests {
            let result = self.remind_one(request, cooldown_start).await;
            report.record("remind_inactive", &request.id, result);
        }

        info!(?report, "Inactivity reminders finished");
        Ok(report)
    }

    async fn remind_one(
        &self,
        request: &request::Model,
        cooldown_start: DateTimeWithTimeZone,
    ) -> AppResult<Outcome> {
        let Some(helper) = self
            .offer_repo
            .find_accepted(self.db.as_ref(), &request.id)
            .await?
        else {
            warn!(request_id = %request.id, "In-progress request without accepted offer");
            return Ok(Outcome::Skipped);
        };

        let target = Notifiable::Request(request.id.clone());
        if self
            .notification_service
            .received_since(
                &helper.user_id,
                &[NotificationAction::InactiveRequestReminder],
                &target,
                cooldown_start,
            )
            .await?
        {
            return Ok(Outcome::Skipped);
        }

        self.deliver(
            NotificationIntent::new(
                NotificationAction::InactiveRequestReminder,
                helper.user_id,
                target,
            )
            .by(request.user_id.clone()),
        )
        .await
    }

    async fn deliver(&self, intent: NotificationIntent) -> AppResult<Outcome> {
        let action = intent.action;
        self.notification_service
            .notify(intent)
            .await
            .map(|_| Outcome::Done)
            .ok_or_else(|| AppError::Internal(format!("{action:?} notification was not stored")))
    }
}

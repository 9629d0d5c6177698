//! Moderation reports.

use std::sync::Arc;

use chrono::Utc;
use sawab_common::{AppError, AppResult, IdGenerator};
use sawab_db::{
    entities::{
        notification::{Notifiable, NotificationAction},
        report::{self, ReportStatus, ReportType, ReportableKind},
        user,
    },
    repositories::{
        ConversationRepository, InstitutionRepository, OfferRepository, ReportRepository,
        RequestRepository, UserRepository,
    },
};
use sea_orm::{DatabaseConnection, Set, TransactionTrait};
use serde::Deserialize;
use tracing::info;
use validator::Validate;

use crate::services::notification::{NotificationIntent, NotificationService};

/// Input for filing a report.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateReportInput {
    pub reportable_type: ReportableKind,
    pub reportable_id: String,
    pub report_type: ReportType,
    #[validate(length(min = 10, max = 500, message = "must be between 10 and 500 characters"))]
    pub reason: String,
    /// Defaults to the owner of the reported content.
    pub reported_user_id: Option<String>,
}

/// Side effect carried out when a report is resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionAction {
    WarnUser,
    BanUser,
    DeleteContent,
}

/// Input for resolving a report.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct ResolveReportInput {
    #[validate(length(max = 1000, message = "must be at most 1000 characters"))]
    pub note: Option<String>,
    pub action: Option<ResolutionAction>,
}

/// Report service for business logic.
#[derive(Clone)]
pub struct ReportService {
    db: Arc<DatabaseConnection>,
    report_repo: ReportRepository,
    user_repo: UserRepository,
    request_repo: RequestRepository,
    offer_repo: OfferRepository,
    conversation_repo: ConversationRepository,
    institution_repo: InstitutionRepository,
    notification_service: NotificationService,
    id_gen: IdGenerator,
}

fn require_staff(actor: &user::Model) -> AppResult<()> {
    if actor.is_staff() {
        Ok(())
    } else {
        Err(AppError::Forbidden("Staff only".to_string()))
    }
}

impl ReportService {
    /// Create a new report service.
    #[must_use]
    pub fn new(db: Arc<DatabaseConnection>, notification_service: NotificationService) -> Self {
        Self {
            report_repo: ReportRepository::new(db.clone()),
            user_repo: UserRepository::new(db.clone()),
            request_repo: RequestRepository::new(db.clone()),
            offer_repo: OfferRepository::new(db.clone()),
            conversation_repo: ConversationRepository::new(db.clone()),
            institution_repo: InstitutionRepository::new(db.clone()),
            db,
            notification_service,
            id_gen: IdGenerator::new(),
        }
    }

    /// Owner of the reported content. Fails if the content does not exist.
    async fn content_owner(&self, kind: ReportableKind, id: &str) -> AppResult<Option<String>> {
        let owner = match kind {
            ReportableKind::Request => Some(self.request_repo.get_by_id(id).await?.user_id),
            ReportableKind::Offer => Some(self.offer_repo.get_by_id(id).await?.user_id),
            ReportableKind::User => Some(self.user_repo.get_by_id(id).await?.id),
            ReportableKind::Message => Some(
                self.conversation_repo
                    .find_message(id)
                    .await?
                    .ok_or_else(|| AppError::NotFound(format!("Message {id}")))?
                    .user_id,
            ),
            ReportableKind::Institution => {
                self.institution_repo.get_by_id(id).await?;
                self.institution_repo
                    .first_admin(id)
                    .await?
                    .map(|member| member.user_id)
            }
        };
        Ok(owner)
    }

    /// File a report.
    pub async fn create(
        &self,
        reporter_id: &str,
        input: CreateReportInput,
    ) -> AppResult<report::Model> {
        input.validate()?;

        let owner = self
            .content_owner(input.reportable_type, &input.reportable_id)
            .await?;
        let reported_user_id = match input.reported_user_id {
            Some(id) => Some(self.user_repo.get_by_id(&id).await?.id),
            None => owner,
        };

        let now = Utc::now().into();
        let report = self
            .report_repo
            .create(report::ActiveModel {
                id: Set(self.id_gen.generate()),
                reporter_id: Set(reporter_id.to_string()),
                reported_user_id: Set(reported_user_id),
                reportable_type: Set(input.reportable_type),
                reportable_id: Set(input.reportable_id),
                report_type: Set(input.report_type),
                reason: Set(input.reason),
                status: Set(ReportStatus::Pending),
                resolver_id: Set(None),
                resolution_note: Set(None),
                resolved_at: Set(None),
                created_at: Set(now),
                updated_at: Set(now),
            })
            .await?;

        info!(report_id = %report.id, reporter_id, "Report filed");
        Ok(report)
    }

    /// Get a report. Staff only.
    pub async fn get(&self, actor: &user::Model, id: &str) -> AppResult<report::Model> {
        require_staff(actor)?;
        self.report_repo.get_by_id(id).await
    }

    /// List reports, newest first. Staff only.
    pub async fn list(
        &self,
        actor: &user::Model,
        status: Option<ReportStatus>,
        limit: u64,
        until_id: Option<&str>,
    ) -> AppResult<Vec<report::Model>> {
        require_staff(actor)?;
        self.report_repo.list(status, limit, until_id).await
    }

    async fn get_open(&self, id: &str) -> AppResult<report::Model> {
        let report = self.report_repo.get_by_id(id).await?;
        if report.status.is_terminal() {
            return Err(AppError::InvalidState(
                "Report is already closed".to_string(),
            ));
        }
        Ok(report)
    }

    /// Take a pending report under investigation.
    pub async fn investigate(&self, actor: &user::Model, id: &str) -> AppResult<report::Model> {
        require_staff(actor)?;
        let report = self.get_open(id).await?;
        if report.status != ReportStatus::Pending {
            return Err(AppError::InvalidState(
                "Report is already under investigation".to_string(),
            ));
        }

        let mut active: report::ActiveModel = report.into();
        active.status = Set(ReportStatus::Investigating);
        active.resolver_id = Set(Some(actor.id.clone()));
        active.updated_at = Set(Utc::now().into());
        let report = self.report_repo.update(active).await?;

        info!(report_id = %report.id, staff_id = %actor.id, "Report under investigation");
        Ok(report)
    }

    /// Resolve a report, applying the chosen action.
    pub async fn resolve(
        &self,
        actor: &user::Model,
        id: &str,
        input: ResolveReportInput,
    ) -> AppResult<report::Model> {
        require_staff(actor)?;
        input.validate()?;
        let report = self.get_open(id).await?;

        if let Some(action) = input.action {
            self.apply_action(&report, action, input.note.as_deref())
                .await?;
        }

        let report = self
            .close(actor, report, ReportStatus::Resolved, input.note)
            .await?;

        let mut intents = vec![
            NotificationIntent::new(
                NotificationAction::ReportResolved,
                report.reporter_id.clone(),
                Notifiable::Report(report.id.clone()),
            )
            .by(actor.id.clone()),
        ];
        if let (Some(ResolutionAction::WarnUser), Some(reported)) =
            (input.action, report.reported_user_id.clone())
        {
            intents.push(
                NotificationIntent::new(
                    NotificationAction::UserWarned,
                    reported,
                    Notifiable::Report(report.id.clone()),
                )
                .by(actor.id.clone()),
            );
        }
        self.notification_service.notify_all(intents).await;

        Ok(report)
    }

    /// Dismiss a report without action.
    pub async fn dismiss(
        &self,
        actor: &user::Model,
        id: &str,
        note: Option<String>,
    ) -> AppResult<report::Model> {
        require_staff(actor)?;
        let report = self.get_open(id).await?;
        let report = self
            .close(actor, report, ReportStatus::Dismissed, note)
            .await?;

        self.notification_service
            .notify(
                NotificationIntent::new(
                    NotificationAction::ReportDismissed,
                    report.reporter_id.clone(),
                    Notifiable::Report(report.id.clone()),
                )
                .by(actor.id.clone()),
            )
            .await;

        Ok(report)
    }

    async fn close(
        &self,
        actor: &user::Model,
        report: report::Model,
        status: ReportStatus,
        note: Option<String>,
    ) -> AppResult<report::Model> {
        let now = Utc::now().into();
        let mut active: report::ActiveModel = report.into();
        active.status = Set(status);
        active.resolver_id = Set(Some(actor.id.clone()));
        active.resolution_note = Set(note);
        active.resolved_at = Set(Some(now));
        active.updated_at = Set(now);
        let report = self.report_repo.update(active).await?;

        info!(report_id = %report.id, status = ?report.status, staff_id = %actor.id, "Report closed");
        Ok(report)
    }

    async fn apply_action(
        &self,
        report: &report::Model,
        action: ResolutionAction,
        note: Option<&str>,
    ) -> AppResult<()> {
        match action {
            ResolutionAction::WarnUser => {
                if report.reported_user_id.is_none() {
                    return Err(AppError::InvalidState(
                        "Report has no reported user".to_string(),
                    ));
                }
            }
            ResolutionAction::BanUser => {
                let user_id = report.reported_user_id.as_deref().ok_or_else(|| {
                    AppError::InvalidState("Report has no reported user".to_string())
                })?;
                self.user_repo
                    .ban(user_id, note.unwrap_or(&report.reason))
                    .await?;
                info!(user_id, report_id = %report.id, "User banned");
            }
            ResolutionAction::DeleteContent => self.delete_content(report).await?,
        }
        Ok(())
    }

    async fn delete_content(&self, report: &report::Model) -> AppResult<()> {
        let id = report.reportable_id.as_str();
        match report.reportable_type {
            ReportableKind::Request => {
                if let Some(request) = self.request_repo.find_by_id(id).await? {
                    self.request_repo.delete(request).await?;
                }
            }
            ReportableKind::Offer => {
                if let Some(offer) = self.offer_repo.find_by_id(id).await? {
                    let request_id = offer.request_id.clone();
                    let txn = self
                        .db
                        .begin()
                        .await
                        .map_err(|e| AppError::Database(e.to_string()))?;
                    self.offer_repo.delete_in(&txn, offer).await?;
                    self.request_repo
                        .decrement_offers_count(&txn, &request_id)
                        .await?;
                    txn.commit()
                        .await
                        .map_err(|e| AppError::Database(e.to_string()))?;
                }
            }
            ReportableKind::Message => {
                if let Some(message) = self.conversation_repo.find_message(id).await? {
                    self.conversation_repo.delete_message(message).await?;
                }
            }
            ReportableKind::User | ReportableKind::Institution => {
                return Err(AppError::InvalidState(
                    "Content of this kind cannot be deleted".to_string(),
                ));
            }
        }
        info!(report_id = %report.id, reportable_id = id, "Reported content deleted");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_resolution_action_deserializes_snake_case() {
        let input: ResolveReportInput =
            serde_json::from_str(r#"{"note":"spam link","action":"delete_content"}"#).unwrap();
        assert_eq!(input.action, Some(ResolutionAction::DeleteContent));
        assert_eq!(input.note.as_deref(), Some("spam link"));
    }

    #[test]
    fn test_reason_length() {
        let input = CreateReportInput {
            reportable_type: ReportableKind::User,
            reportable_id: "u1".to_string(),
            report_type: ReportType::Spam,
            reason: "bad".to_string(),
            reported_user_id: None,
        };
        assert!(input.validate().is_err());
    }
}

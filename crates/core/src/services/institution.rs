//! Institution service.

use std::sync::Arc;

use chrono::Utc;
use sawab_common::{AppError, AppResult, IdGenerator};
use sawab_db::{
    entities::{
        institution::{self, InstitutionType},
        institution_member::{self, MemberRole},
        notification::{Notifiable, NotificationAction},
        user,
    },
    repositories::{InstitutionRepository, UserRepository},
};
use sea_orm::{DatabaseConnection, Set};
use serde::Deserialize;
use tracing::info;
use validator::Validate;

use crate::services::notification::{NotificationIntent, NotificationService};

/// Input for registering an institution.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateInstitutionInput {
    #[validate(length(min = 2, max = 100, message = "must be between 2 and 100 characters"))]
    pub name: String,
    pub institution_type: InstitutionType,
    #[validate(length(min = 1, message = "can't be blank"))]
    pub address: String,
    #[validate(length(min = 1, message = "can't be blank"))]
    pub city: String,
    #[validate(length(min = 1, message = "can't be blank"))]
    pub region: String,
    #[validate(length(min = 1, max = 32, message = "must be between 1 and 32 characters"))]
    pub phone: String,
    #[validate(length(min = 1, message = "can't be blank"))]
    pub director_name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct AddMemberInput {
    pub user_id: String,
    pub role: MemberRole,
    #[validate(length(max = 100, message = "must be at most 100 characters"))]
    pub position: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateMemberInput {
    pub role: Option<MemberRole>,
    #[validate(length(max = 100, message = "must be at most 100 characters"))]
    pub position: Option<String>,
}

/// Institution service for business logic.
#[derive(Clone)]
pub struct InstitutionService {
    institution_repo: InstitutionRepository,
    user_repo: UserRepository,
    notification_service: NotificationService,
    id_gen: IdGenerator,
}

impl InstitutionService {
    /// Create a new institution service.
    #[must_use]
    pub fn new(db: Arc<DatabaseConnection>, notification_service: NotificationService) -> Self {
        Self {
            institution_repo: InstitutionRepository::new(db.clone()),
            user_repo: UserRepository::new(db),
            notification_service,
            id_gen: IdGenerator::new(),
        }
    }

    pub async fn get(&self, id: &str) -> AppResult<institution::Model> {
        self.institution_repo.get_by_id(id).await
    }

    pub async fn list(&self, verified_only: bool) -> AppResult<Vec<institution::Model>> {
        self.institution_repo.list(verified_only).await
    }

    pub async fn members(&self, institution_id: &str) -> AppResult<Vec<institution_member::Model>> {
        self.institution_repo.get_by_id(institution_id).await?;
        self.institution_repo.find_members(institution_id).await
    }

    /// Register an institution. The creator becomes its admin and staff
    /// are asked to verify it.
    pub async fn create(
        &self,
        creator_id: &str,
        input: CreateInstitutionInput,
    ) -> AppResult<institution::Model> {
        input.validate()?;

        let now = Utc::now().into();
        let institution = self
            .institution_repo
            .create(institution::ActiveModel {
                id: Set(self.id_gen.generate()),
                name: Set(input.name),
                institution_type: Set(input.institution_type),
                address: Set(input.address),
                city: Set(input.city),
                region: Set(input.region),
                phone: Set(input.phone),
                director_name: Set(input.director_name),
                description: Set(input.description),
                verified: Set(false),
                verified_at: Set(None),
                created_at: Set(now),
                updated_at: Set(now),
            })
            .await?;

        self.institution_repo
            .add_member(institution_member::ActiveModel {
                id: Set(self.id_gen.generate()),
                institution_id: Set(institution.id.clone()),
                user_id: Set(creator_id.to_string()),
                role: Set(MemberRole::Admin),
                position: Set(None),
                created_at: Set(now),
            })
            .await?;

        info!(institution_id = %institution.id, creator_id, "Institution registered");

        let staff = self.user_repo.find_staff().await?;
        self.notification_service
            .notify_all(staff.into_iter().map(|admin| {
                NotificationIntent::new(
                    NotificationAction::InstitutionPendingVerification,
                    admin.id,
                    Notifiable::Institution(institution.id.clone()),
                )
                .by(creator_id)
            }))
            .await;

        Ok(institution)
    }

    /// Mark an institution verified and tell its admin. Staff only.
    pub async fn verify(&self, actor: &user::Model, id: &str) -> AppResult<institution::Model> {
        Self::require_staff(actor)?;
        let institution = self.institution_repo.get_by_id(id).await?;
        if institution.verified {
            return Ok(institution);
        }

        let now = Utc::now().into();
        let mut active: institution::ActiveModel = institution.into();
        active.verified = Set(true);
        active.verified_at = Set(Some(now));
        active.updated_at = Set(now);
        let institution = self.institution_repo.update(active).await?;

        info!(institution_id = %institution.id, staff_id = %actor.id, "Institution verified");

        if let Some(admin) = self.institution_repo.first_admin(&institution.id).await? {
            self.notification_service
                .notify(NotificationIntent::new(
                    NotificationAction::InstitutionVerified,
                    admin.user_id,
                    Notifiable::Institution(institution.id.clone()),
                ))
                .await;
        }

        Ok(institution)
    }

    /// Withdraw verification. Staff only.
    pub async fn unverify(&self, actor: &user::Model, id: &str) -> AppResult<institution::Model> {
        Self::require_staff(actor)?;
        let institution = self.institution_repo.get_by_id(id).await?;

        let mut active: institution::ActiveModel = institution.into();
        active.verified = Set(false);
        active.verified_at = Set(None);
        active.updated_at = Set(Utc::now().into());
        let institution = self.institution_repo.update(active).await?;

        info!(institution_id = %institution.id, staff_id = %actor.id, "Institution unverified");
        Ok(institution)
    }

    /// Add a member. Institution admins and staff only.
    pub async fn add_member(
        &self,
        actor: &user::Model,
        institution_id: &str,
        input: AddMemberInput,
    ) -> AppResult<institution_member::Model> {
        input.validate()?;
        self.require_manager(actor, institution_id).await?;
        let user = self.user_repo.get_by_id(&input.user_id).await?;

        if self
            .institution_repo
            .find_member(institution_id, &user.id)
            .await?
            .is_some()
        {
            return Err(AppError::Conflict(
                "User is already a member of this institution".to_string(),
            ));
        }

        let member = self
            .institution_repo
            .add_member(institution_member::ActiveModel {
                id: Set(self.id_gen.generate()),
                institution_id: Set(institution_id.to_string()),
                user_id: Set(user.id),
                role: Set(input.role),
                position: Set(input.position),
                created_at: Set(Utc::now().into()),
            })
            .await?;

        info!(institution_id, user_id = %member.user_id, role = ?member.role, "Member added");
        Ok(member)
    }

    /// Change a member's role or position.
    pub async fn update_member(
        &self,
        actor: &user::Model,
        institution_id: &str,
        user_id: &str,
        input: UpdateMemberInput,
    ) -> AppResult<institution_member::Model> {
        input.validate()?;
        self.require_manager(actor, institution_id).await?;
        let member = self.get_member(institution_id, user_id).await?;

        let demoted = input.role.is_some_and(|role| role != MemberRole::Admin);
        if member.role == MemberRole::Admin && demoted {
            self.ensure_not_last_admin(institution_id).await?;
        }

        let mut active: institution_member::ActiveModel = member.into();
        if let Some(role) = input.role {
            active.role = Set(role);
        }
        if input.position.is_some() {
            active.position = Set(input.position);
        }
        self.institution_repo.update_member(active).await
    }

    /// Remove a member.
    pub async fn remove_member(
        &self,
        actor: &user::Model,
        institution_id: &str,
        user_id: &str,
    ) -> AppResult<()> {
        self.require_manager(actor, institution_id).await?;
        let member = self.get_member(institution_id, user_id).await?;

        if member.role == MemberRole::Admin {
            self.ensure_not_last_admin(institution_id).await?;
        }

        self.institution_repo.remove_member(member).await?;
        info!(institution_id, user_id, "Member removed");
        Ok(())
    }

    fn require_staff(actor: &user::Model) -> AppResult<()> {
        if actor.is_staff() {
            Ok(())
        } else {
            Err(AppError::Forbidden("Staff only".to_string()))
        }
    }

    async fn require_manager(&self, actor: &user::Model, institution_id: &str) -> AppResult<()> {
        self.institution_repo.get_by_id(institution_id).await?;
        if actor.is_staff() {
            return Ok(());
        }
        match self
            .institution_repo
            .find_member(institution_id, &actor.id)
            .await?
        {
            Some(member) if member.role == MemberRole::Admin => Ok(()),
            _ => Err(AppError::Forbidden(
                "Only institution admins can manage members".to_string(),
            )),
        }
    }

    async fn get_member(
        &self,
        institution_id: &str,
        user_id: &str,
    ) -> AppResult<institution_member::Model> {
        self.institution_repo
            .find_member(institution_id, user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Member {user_id}")))
    }

    async fn ensure_not_last_admin(&self, institution_id: &str) -> AppResult<()> {
        if self.institution_repo.count_admins(institution_id).await? <= 1 {
            return Err(AppError::InvalidState(
                "An institution must keep at least one admin".to_string(),
            ));
        }
        Ok(())
    }
}

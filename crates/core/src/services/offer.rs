//! Offer service.

use std::sync::Arc;

use chrono::Utc;
use sawab_common::{AppError, AppResult, IdGenerator};
use sawab_db::{
    entities::{
        notification::{Notifiable, NotificationAction},
        offer::{self, OfferStatus},
        request::{self, RequestStatus},
    },
    repositories::{OfferRepository, RequestRepository},
};
use sea_orm::{DatabaseConnection, DatabaseTransaction, Set, TransactionTrait};
use serde::Deserialize;
use tracing::info;
use validator::Validate;

use crate::services::notification::{NotificationIntent, NotificationService};
use crate::services::state_machine::{OfferTransition, RequestEvent};

/// Input for offering help on a request.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateOfferInput {
    #[validate(length(min = 10, max = 500, message = "must be between 10 and 500 characters"))]
    pub message: String,
}

/// Result of accepting an offer.
#[derive(Debug, Clone)]
pub struct AcceptOutcome {
    pub offer: offer::Model,
    pub request: request::Model,
    /// Competing offers rejected by the acceptance.
    pub rejected: Vec<offer::Model>,
}

/// Offer service for business logic.
#[derive(Clone)]
pub struct OfferService {
    db: Arc<DatabaseConnection>,
    offer_repo: OfferRepository,
    request_repo: RequestRepository,
    notification_service: NotificationService,
    id_gen: IdGenerator,
}

impl OfferService {
    /// Create a new offer service.
    #[must_use]
    pub fn new(db: Arc<DatabaseConnection>, notification_service: NotificationService) -> Self {
        Self {
            offer_repo: OfferRepository::new(db.clone()),
            request_repo: RequestRepository::new(db.clone()),
            db,
            notification_service,
            id_gen: IdGenerator::new(),
        }
    }

    async fn begin(&self) -> AppResult<DatabaseTransaction> {
        self.db
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn commit(txn: DatabaseTransaction) -> AppResult<()> {
        txn.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Get an offer by ID.
    pub async fn get(&self, id: &str) -> AppResult<offer::Model> {
        self.offer_repo.get_by_id(id).await
    }

    /// Offers made on a request.
    pub async fn list_for_request(&self, request_id: &str) -> AppResult<Vec<offer::Model>> {
        self.offer_repo.find_by_request(request_id).await
    }

    /// Offer help on an open request. The asker is notified.
    pub async fn create(
        &self,
        user_id: &str,
        request_id: &str,
        input: CreateOfferInput,
    ) -> AppResult<offer::Model> {
        input.validate()?;

        let txn = self.begin().await?;
        let request = self.request_repo.lock_for_update(&txn, request_id).await?;

        if request.user_id == user_id {
            return Err(AppError::validation(
                "user: cannot offer help on your own request",
            ));
        }
        if request.status != RequestStatus::Open {
            return Err(AppError::validation(
                "request: is not open for new offers",
            ));
        }
        if self
            .offer_repo
            .has_pending(&txn, user_id, request_id)
            .await?
        {
            return Err(AppError::validation(
                "user: already has a pending offer on this request",
            ));
        }

        let now = Utc::now().into();
        let model = offer::ActiveModel {
            id: Set(self.id_gen.generate()),
            request_id: Set(request.id.clone()),
            user_id: Set(user_id.to_string()),
            message: Set(input.message),
            status: Set(OfferStatus::Pending),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let offer = self.offer_repo.create(&txn, model).await?;
        self.request_repo
            .increment_offers_count(&txn, request_id)
            .await?;
        Self::commit(txn).await?;

        info!(offer_id = %offer.id, request_id, user_id, "Offer created");

        self.notification_service
            .notify(
                NotificationIntent::new(
                    NotificationAction::NewOffer,
                    request.user_id,
                    Notifiable::Offer(offer.id.clone()),
                )
                .by(user_id),
            )
            .await;

        Ok(offer)
    }

    /// Withdraw one's own pending offer.
    ///
    /// Runs under the request row lock, so an acceptance of the same offer
    /// either commits first and the withdrawal fails, or waits for it.
    pub async fn withdraw(&self, user_id: &str, offer_id: &str) -> AppResult<()> {
        let offer = self.offer_repo.get_by_id(offer_id).await?;
        if offer.user_id != user_id {
            return Err(AppError::Forbidden(
                "Only the author can withdraw this offer".to_string(),
            ));
        }

        let txn = self.begin().await?;
        self.request_repo
            .lock_for_update(&txn, &offer.request_id)
            .await?;
        let offer = self
            .offer_repo
            .find_by_id_in(&txn, offer_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Offer {offer_id}")))?;
        if offer.status != OfferStatus::Pending {
            return Err(AppError::InvalidState(
                "Only pending offers can be withdrawn".to_string(),
            ));
        }

        let request_id = offer.request_id.clone();
        self.offer_repo.delete_in(&txn, offer).await?;
        self.request_repo
            .decrement_offers_count(&txn, &request_id)
            .await?;
        Self::commit(txn).await?;

        info!(offer_id, user_id, "Offer withdrawn");
        Ok(())
    }

    /// Accept an offer.
    ///
    /// In one transaction: every other pending offer on the request is
    /// rejected, the offer is accepted and the request moves to
    /// `in_progress`. The request row stays locked throughout, so a second
    /// acceptance sees the request no longer open. Owners of rejected
    /// offers and the accepted helper are notified after commit.
    pub async fn accept(&self, actor_id: &str, offer_id: &str) -> AppResult<AcceptOutcome> {
        let offer = self.offer_repo.get_by_id(offer_id).await?;

        let txn = self.begin().await?;
        let locked = self
            .request_repo
            .lock_for_update(&txn, &offer.request_id)
            .await?;

        if locked.user_id != actor_id {
            return Err(AppError::Forbidden(
                "Only the asker can accept offers".to_string(),
            ));
        }
        let next = RequestEvent::AcceptOffer.apply(locked.status)?;

        let offer = self
            .offer_repo
            .find_by_id_in(&txn, offer_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Offer {offer_id}")))?;
        let accepted_status = OfferTransition::Accept.apply(offer.status)?;

        let now = Utc::now().into();
        let mut rejected: Vec<offer::Model> = self
            .offer_repo
            .find_by_request_and_status(&txn, &locked.id, OfferStatus::Pending)
            .await?
            .into_iter()
            .filter(|o| o.id != offer.id)
            .collect();
        let rejected_ids: Vec<String> = rejected.iter().map(|o| o.id.clone()).collect();
        self.offer_repo
            .set_status_many(&txn, &rejected_ids, OfferTransition::Reject.target(), now)
            .await?;
        for other in &mut rejected {
            other.status = OfferStatus::Rejected;
            other.updated_at = now;
        }

        let mut active: offer::ActiveModel = offer.into();
        active.status = Set(accepted_status);
        active.updated_at = Set(now);
        let offer = self.offer_repo.update_in(&txn, active).await?;

        let mut active: request::ActiveModel = locked.into();
        active.status = Set(next);
        active.entered_in_progress_at = Set(Some(now));
        active.updated_at = Set(now);
        let request = self.request_repo.update_in(&txn, active).await?;

        Self::commit(txn).await?;

        info!(
            offer_id,
            request_id = %request.id,
            rejected = rejected.len(),
            "Offer accepted"
        );

        let mut intents: Vec<NotificationIntent> = rejected
            .iter()
            .map(|o| {
                NotificationIntent::new(
                    NotificationAction::OfferRejected,
                    o.user_id.clone(),
                    Notifiable::Offer(o.id.clone()),
                )
                .by(actor_id)
            })
            .collect();
        intents.push(
            NotificationIntent::new(
                NotificationAction::OfferAccepted,
                offer.user_id.clone(),
                Notifiable::Offer(offer.id.clone()),
            )
            .by(actor_id),
        );
        self.notification_service.notify_all(intents).await;

        Ok(AcceptOutcome {
            offer,
            request,
            rejected,
        })
    }

    /// Reject a single pending offer.
    pub async fn reject(&self, actor_id: &str, offer_id: &str) -> AppResult<offer::Model> {
        let offer = self.offer_repo.get_by_id(offer_id).await?;
        let request = self.request_repo.get_by_id(&offer.request_id).await?;
        if request.user_id != actor_id {
            return Err(AppError::Forbidden(
                "Only the asker can reject offers".to_string(),
            ));
        }

        let txn = self.begin().await?;
        self.request_repo.lock_for_update(&txn, &request.id).await?;
        let offer = self
            .offer_repo
            .find_by_id_in(&txn, offer_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Offer {offer_id}")))?;
        let next = OfferTransition::Reject.apply(offer.status)?;

        let mut active: offer::ActiveModel = offer.into();
        active.status = Set(next);
        active.updated_at = Set(Utc::now().into());
        let offer = self.offer_repo.update_in(&txn, active).await?;
        Self::commit(txn).await?;

        info!(offer_id, "Offer rejected");

        self.notification_service
            .notify(
                NotificationIntent::new(
                    NotificationAction::OfferRejected,
                    offer.user_id.clone(),
                    Notifiable::Offer(offer.id.clone()),
                )
                .by(actor_id),
            )
            .await;

        Ok(offer)
    }
}

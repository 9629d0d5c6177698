//! Conversation service.

use std::sync::Arc;

use chrono::Utc;
use sawab_common::{AppError, AppResult, IdGenerator};
use sawab_db::{
    entities::{
        conversation, message,
        notification::{Notifiable, NotifiableKind, NotificationAction},
        request::RequestStatus,
    },
    repositories::{ConversationRepository, OfferRepository, RequestRepository},
};
use sea_orm::{DatabaseConnection, Set};
use serde::Deserialize;
use tracing::{debug, info, warn};
use validator::Validate;

use crate::services::event_publisher::{EventPublisherService, MessagePayload};
use crate::services::notification::{NotificationIntent, NotificationService};

/// Maximum messages returned per page.
const MAX_MESSAGES: u64 = 100;

/// Input for posting a chat message.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SendMessageInput {
    #[validate(length(min = 1, max = 1000, message = "must be between 1 and 1000 characters"))]
    pub body: String,
}

/// Conversation service for business logic.
#[derive(Clone)]
pub struct ConversationService {
    conversation_repo: ConversationRepository,
    request_repo: RequestRepository,
    offer_repo: OfferRepository,
    db: Arc<DatabaseConnection>,
    notification_service: NotificationService,
    event_publisher: Option<EventPublisherService>,
    id_gen: IdGenerator,
}

impl ConversationService {
    /// Create a new conversation service.
    #[must_use]
    pub fn new(db: Arc<DatabaseConnection>, notification_service: NotificationService) -> Self {
        Self {
            conversation_repo: ConversationRepository::new(db.clone()),
            request_repo: RequestRepository::new(db.clone()),
            offer_repo: OfferRepository::new(db.clone()),
            db,
            notification_service,
            event_publisher: None,
            id_gen: IdGenerator::new(),
        }
    }

    /// Set the event publisher.
    pub fn set_event_publisher(&mut self, event_publisher: EventPublisherService) {
        self.event_publisher = Some(event_publisher);
    }

    /// Open the chat of a request, creating it on first use.
    ///
    /// Only the asker and the accepted helper may open it. The viewer's
    /// unread `new_message` notifications for the conversation are marked
    /// as read.
    pub async fn open(&self, user_id: &str, request_id: &str) -> AppResult<conversation::Model> {
        let conversation = match self.conversation_repo.find_by_request(request_id).await? {
            Some(conversation) => conversation,
            None => self.create_for_request(user_id, request_id).await?,
        };

        if !conversation.is_participant(user_id) {
            return Err(AppError::Forbidden(
                "Not a participant of this conversation".to_string(),
            ));
        }

        self.mark_messages_read(user_id, &conversation).await;
        Ok(conversation)
    }

    async fn create_for_request(
        &self,
        user_id: &str,
        request_id: &str,
    ) -> AppResult<conversation::Model> {
        let request = self.request_repo.get_by_id(request_id).await?;
        let accepted = self
            .offer_repo
            .find_accepted(self.db.as_ref(), request_id)
            .await?
            .ok_or_else(|| {
                AppError::InvalidState("Chat opens once an offer is accepted".to_string())
            })?;

        if request.user_id != user_id && accepted.user_id != user_id {
            return Err(AppError::Forbidden(
                "Not a participant of this conversation".to_string(),
            ));
        }

        let now = Utc::now().into();
        let model = conversation::ActiveModel {
            id: Set(self.id_gen.generate()),
            request_id: Set(request.id.clone()),
            asker_id: Set(request.user_id.clone()),
            helper_id: Set(accepted.user_id.clone()),
            created_at: Set(now),
            updated_at: Set(now),
        };

        match self.conversation_repo.create(model).await {
            Ok(conversation) => {
                info!(conversation_id = %conversation.id, request_id, "Conversation created");
                Ok(conversation)
            }
            Err(e) => {
                // Lost the unique-index race; the winner's row is the conversation.
                debug!(error = %e, request_id, "Conversation insert failed, re-reading");
                self.conversation_repo
                    .find_by_request(request_id)
                    .await?
                    .ok_or(e)
            }
        }
    }

    async fn mark_messages_read(&self, user_id: &str, conversation: &conversation::Model) {
        let ids = match self.conversation_repo.message_ids(&conversation.id).await {
            Ok(ids) => ids,
            Err(e) => {
                warn!(error = %e, conversation_id = %conversation.id, "Failed to list message ids");
                return;
            }
        };

        if let Err(e) = self
            .notification_service
            .mark_targets_as_read(
                user_id,
                NotificationAction::NewMessage,
                NotifiableKind::Message,
                ids,
            )
            .await
        {
            warn!(error = %e, "Failed to mark message notifications as read");
        }
    }

    async fn get_for_participant(
        &self,
        user_id: &str,
        conversation_id: &str,
    ) -> AppResult<conversation::Model> {
        let conversation = self
            .conversation_repo
            .find_by_id(conversation_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Conversation {conversation_id}")))?;

        if !conversation.is_participant(user_id) {
            return Err(AppError::Forbidden(
                "Not a participant of this conversation".to_string(),
            ));
        }
        Ok(conversation)
    }

    /// A conversation, visible to participants only.
    pub async fn get(&self, user_id: &str, conversation_id: &str) -> AppResult<conversation::Model> {
        self.get_for_participant(user_id, conversation_id).await
    }

    /// Messages in chronological order, after `since_id` when given.
    pub async fn messages(
        &self,
        user_id: &str,
        conversation_id: &str,
        limit: u64,
        since_id: Option<&str>,
    ) -> AppResult<Vec<message::Model>> {
        let conversation = self.get_for_participant(user_id, conversation_id).await?;
        self.conversation_repo
            .find_messages(&conversation.id, limit.min(MAX_MESSAGES), since_id)
            .await
    }

    /// Conversations the user takes part in.
    pub async fn list_for_user(
        &self,
        user_id: &str,
        limit: u64,
    ) -> AppResult<Vec<conversation::Model>> {
        self.conversation_repo
            .find_by_participant(user_id, limit)
            .await
    }

    /// Post a message.
    ///
    /// The other participant gets the message on the realtime channel and a
    /// `new_message` notification.
    pub async fn send(
        &self,
        user_id: &str,
        conversation_id: &str,
        input: SendMessageInput,
    ) -> AppResult<message::Model> {
        input.validate()?;

        let conversation = self.get_for_participant(user_id, conversation_id).await?;
        let request = self.request_repo.get_by_id(&conversation.request_id).await?;
        if !matches!(
            request.status,
            RequestStatus::InProgress | RequestStatus::PendingCompletion
        ) {
            return Err(AppError::InvalidState(
                "Chat is closed for this request".to_string(),
            ));
        }

        let message = self
            .conversation_repo
            .create_message(message::ActiveModel {
                id: Set(self.id_gen.generate()),
                conversation_id: Set(conversation.id.clone()),
                user_id: Set(user_id.to_string()),
                body: Set(input.body),
                created_at: Set(Utc::now().into()),
            })
            .await?;

        let recipient_id = conversation.other_participant(user_id).to_string();
        self.conversation_repo.touch(conversation).await?;

        if let Some(ref event_publisher) = self.event_publisher {
            let payload = MessagePayload::from(&message);
            if let Err(e) = event_publisher
                .publish_message(&recipient_id, &payload)
                .await
            {
                warn!(error = %e, "Failed to publish message event");
            }
        }

        self.notification_service
            .notify(
                NotificationIntent::new(
                    NotificationAction::NewMessage,
                    recipient_id,
                    Notifiable::Message(message.id.clone()),
                )
                .by(user_id),
            )
            .await;

        Ok(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_body_bounds() {
        assert!(SendMessageInput { body: String::new() }.validate().is_err());
        assert!(SendMessageInput { body: "ok".to_string() }.validate().is_ok());
        assert!(
            SendMessageInput {
                body: "a".repeat(1001)
            }
            .validate()
            .is_err()
        );
    }
}

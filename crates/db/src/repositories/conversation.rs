//! Conversation and message repository.

use std::sync::Arc;

use crate::entities::{Conversation, Message, conversation, message};
use sawab_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, ModelTrait,
    QueryFilter, QueryOrder, QuerySelect,
};

/// Conversation repository for database operations.
#[derive(Clone)]
pub struct ConversationRepository {
    db: Arc<DatabaseConnection>,
}

impl ConversationRepository {
    /// Create a new conversation repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a conversation by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<conversation::Model>> {
        Conversation::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find the conversation of a request.
    pub async fn find_by_request(
        &self,
        request_id: &str,
    ) -> AppResult<Option<conversation::Model>> {
        Conversation::find()
            .filter(conversation::Column::RequestId.eq(request_id))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Create a conversation.
    ///
    /// Fails on the unique `request_id` index when another caller created it
    /// first; callers re-read in that case.
    pub async fn create(
        &self,
        model: conversation::ActiveModel,
    ) -> AppResult<conversation::Model> {
        model
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Conversations a user takes part in, most recently active first.
    pub async fn find_by_participant(
        &self,
        user_id: &str,
        limit: u64,
    ) -> AppResult<Vec<conversation::Model>> {
        Conversation::find()
            .filter(
                Condition::any()
                    .add(conversation::Column::AskerId.eq(user_id))
                    .add(conversation::Column::HelperId.eq(user_id)),
            )
            .order_by_desc(conversation::Column::UpdatedAt)
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Bump a conversation's activity timestamp.
    pub async fn touch(&self, conversation: conversation::Model) -> AppResult<()> {
        let mut active: conversation::ActiveModel = conversation.into();
        active.updated_at = sea_orm::Set(chrono::Utc::now().into());
        active
            .update(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Create a message.
    pub async fn create_message(&self, model: message::ActiveModel) -> AppResult<message::Model> {
        model
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find a message by ID.
    pub async fn find_message(&self, id: &str) -> AppResult<Option<message::Model>> {
        Message::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Delete a message.
    pub async fn delete_message(&self, message: message::Model) -> AppResult<()> {
        message
            .delete(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Messages of a conversation in chronological order.
    pub async fn find_messages(
        &self,
        conversation_id: &str,
        limit: u64,
        since_id: Option<&str>,
    ) -> AppResult<Vec<message::Model>> {
        let mut query = Message::find()
            .filter(message::Column::ConversationId.eq(conversation_id))
            .order_by_asc(message::Column::Id);

        if let Some(id) = since_id {
            query = query.filter(message::Column::Id.gt(id));
        }

        query
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// IDs of every message in a conversation.
    pub async fn message_ids(&self, conversation_id: &str) -> AppResult<Vec<String>> {
        Message::find()
            .select_only()
            .column(message::Column::Id)
            .filter(message::Column::ConversationId.eq(conversation_id))
            .into_tuple::<String>()
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}

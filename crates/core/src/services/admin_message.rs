//! Admin message service.
//!
//! Direct messages between staff and members. Members see one thread per
//! staff user they talk to; staff share a single thread per member, so any
//! admin or moderator can pick up a conversation a colleague started.
//!
//! Every write that changes what a user has unread invalidates that user's
//! `unread_admin_messages` counter.

use std::sync::Arc;

use chrono::Utc;
use sawab_common::{AppError, AppResult, CounterCache, CounterKey, IdGenerator, read_through};
use sawab_db::{
    entities::{admin_message, user},
    repositories::{AdminMessageRepository, UserRepository},
};
use sea_orm::{DatabaseConnection, Set};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use validator::Validate;

/// Maximum messages returned for one thread.
const MAX_THREAD_MESSAGES: u64 = 200;

/// Messages scanned when grouping a member's inbox.
const MAX_MEMBER_MESSAGES: u64 = 500;

/// Input for sending an admin message.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SendAdminMessageInput {
    pub recipient_id: String,
    #[validate(length(min = 5, max = 5000, message = "must be between 5 and 5000 characters"))]
    pub body: String,
}

/// One entry of an admin message inbox.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdminThread {
    /// The other side: a staff user for members, the member for staff.
    pub counterpart_id: String,
    pub last_message: admin_message::Model,
    /// Unread messages the viewer received in this thread.
    pub unread: u64,
}

/// Which messages make up a thread as seen by one viewer.
struct ThreadScope<'a> {
    member_id: &'a str,
    staff_id: Option<&'a str>,
}

/// Admin message service for business logic.
#[derive(Clone)]
pub struct AdminMessageService {
    admin_message_repo: AdminMessageRepository,
    user_repo: UserRepository,
    cache: Arc<dyn CounterCache>,
    id_gen: IdGenerator,
}

impl AdminMessageService {
    /// Create a new admin message service.
    #[must_use]
    pub fn new(db: Arc<DatabaseConnection>, cache: Arc<dyn CounterCache>) -> Self {
        Self {
            admin_message_repo: AdminMessageRepository::new(db.clone()),
            user_repo: UserRepository::new(db),
            cache,
            id_gen: IdGenerator::new(),
        }
    }

    /// Send a message.
    ///
    /// Staff may write to any member; members may only write to staff.
    /// Staff-to-staff messages are refused.
    pub async fn send(
        &self,
        sender: &user::Model,
        input: SendAdminMessageInput,
    ) -> AppResult<admin_message::Model> {
        input.validate()?;

        if input.recipient_id == sender.id {
            return Err(AppError::BadRequest(
                "Cannot send a message to yourself".to_string(),
            ));
        }

        let recipient = self.user_repo.get_by_id(&input.recipient_id).await?;
        let member_id = match (sender.is_staff(), recipient.is_staff()) {
            (true, false) => recipient.id.clone(),
            (false, true) => sender.id.clone(),
            (false, false) => {
                return Err(AppError::Forbidden(
                    "Members can only message staff".to_string(),
                ));
            }
            (true, true) => {
                return Err(AppError::BadRequest(
                    "Admin messages are exchanged with members".to_string(),
                ));
            }
        };

        let message = self
            .admin_message_repo
            .create(admin_message::ActiveModel {
                id: Set(self.id_gen.generate()),
                sender_id: Set(sender.id.clone()),
                recipient_id: Set(recipient.id.clone()),
                member_id: Set(member_id),
                body: Set(input.body),
                read_at: Set(None),
                created_at: Set(Utc::now().into()),
            })
            .await?;

        debug!(message_id = %message.id, recipient_id = %recipient.id, "Admin message sent");
        self.invalidate_unread(&recipient.id).await;
        Ok(message)
    }

    /// The viewer's threads, most recently active first.
    pub async fn threads(&self, viewer: &user::Model, limit: u64) -> AppResult<Vec<AdminThread>> {
        if viewer.is_staff() {
            let latest = self.admin_message_repo.find_latest_per_member(limit).await?;
            let mut threads = Vec::with_capacity(latest.len());
            for message in latest {
                let unread = self
                    .admin_message_repo
                    .find_thread(&message.member_id, None, MAX_THREAD_MESSAGES)
                    .await?
                    .iter()
                    .filter(|m| m.recipient_id == viewer.id && m.read_at.is_none())
                    .count() as u64;
                threads.push(AdminThread {
                    counterpart_id: message.member_id.clone(),
                    last_message: message,
                    unread,
                });
            }
            return Ok(threads);
        }

        let messages = self
            .admin_message_repo
            .find_by_member(&viewer.id, MAX_MEMBER_MESSAGES)
            .await?;

        // Newest first, so the first message seen per staff user is the latest
        let mut threads: Vec<AdminThread> = Vec::new();
        for message in messages {
            let unread = u64::from(message.recipient_id == viewer.id && message.read_at.is_none());
            let staff_id = message.staff_id().to_string();
            match threads.iter_mut().find(|t| t.counterpart_id == staff_id) {
                Some(thread) => thread.unread += unread,
                None => threads.push(AdminThread {
                    counterpart_id: staff_id,
                    last_message: message,
                    unread,
                }),
            }
        }
        threads.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        Ok(threads)
    }

    /// One thread, oldest message first.
    ///
    /// Viewing a thread marks the messages the viewer received in it as read.
    pub async fn thread(
        &self,
        viewer: &user::Model,
        counterpart_id: &str,
    ) -> AppResult<Vec<admin_message::Model>> {
        let counterpart = self.user_repo.get_by_id(counterpart_id).await?;
        let scope = Self::scope(viewer, &counterpart)?;

        let messages = self
            .admin_message_repo
            .find_thread(scope.member_id, scope.staff_id, MAX_THREAD_MESSAGES)
            .await?;

        self.mark_scope_read(viewer, &scope).await?;
        Ok(messages)
    }

    /// Mark the messages the viewer received in a thread as read.
    pub async fn mark_thread_read(
        &self,
        viewer: &user::Model,
        counterpart_id: &str,
    ) -> AppResult<u64> {
        let counterpart = self.user_repo.get_by_id(counterpart_id).await?;
        let scope = Self::scope(viewer, &counterpart)?;
        self.mark_scope_read(viewer, &scope).await
    }

    /// Unread admin message count, served from the counter cache when possible.
    pub async fn unread_count(&self, user_id: &str) -> AppResult<u64> {
        let key = CounterKey::unread_admin_messages(user_id);
        let repo = &self.admin_message_repo;
        read_through(self.cache.as_ref(), &key, move || repo.count_unread(user_id)).await
    }

    fn scope<'a>(
        viewer: &'a user::Model,
        counterpart: &'a user::Model,
    ) -> AppResult<ThreadScope<'a>> {
        match (viewer.is_staff(), counterpart.is_staff()) {
            (true, false) => Ok(ThreadScope {
                member_id: &counterpart.id,
                staff_id: None,
            }),
            (false, true) => Ok(ThreadScope {
                member_id: &viewer.id,
                staff_id: Some(&counterpart.id),
            }),
            _ => Err(AppError::BadRequest(
                "Admin message threads are between staff and a member".to_string(),
            )),
        }
    }

    async fn mark_scope_read(
        &self,
        viewer: &user::Model,
        scope: &ThreadScope<'_>,
    ) -> AppResult<u64> {
        let updated = self
            .admin_message_repo
            .mark_thread_read(&viewer.id, scope.member_id, scope.staff_id, Utc::now().into())
            .await?;

        if updated > 0 {
            self.invalidate_unread(&viewer.id).await;
        }
        Ok(updated)
    }

    async fn invalidate_unread(&self, user_id: &str) {
        let key = CounterKey::unread_admin_messages(user_id);
        if let Err(e) = self.cache.invalidate(&key).await {
            warn!(error = %e, user_id, "Failed to invalidate unread admin message counter");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_body_bounds() {
        let input = |body: &str| SendAdminMessageInput {
            recipient_id: "u1".to_string(),
            body: body.to_string(),
        };
        assert!(input("hey").validate().is_err());
        assert!(input("hello").validate().is_ok());
        assert!(input(&"a".repeat(5001)).validate().is_err());
    }
}

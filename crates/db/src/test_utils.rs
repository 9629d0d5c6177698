//! Test utilities for database operations.
//!
//! Provides an in-memory database migrated with the production migrator, and
//! fixture helpers that insert rows with explicit timestamps.

use std::sync::Arc;

use chrono::{Duration, Utc};
use sea_orm::entity::prelude::DateTimeWithTimeZone;
use sea_orm::{ActiveModelTrait, ConnectOptions, Database, DatabaseConnection, DbErr, Set};
use sea_orm_migration::MigratorTrait;
use tracing::info;

use crate::entities::{
    admin_message, badge, category, institution, institution_member, notification, offer, request,
    user,
};
use crate::migrations::Migrator;

/// A migrated in-memory `SQLite` database.
///
/// The pool holds a single connection: every connection to `sqlite::memory:`
/// would otherwise see its own empty database. As a consequence concurrent
/// transactions are serialized by the pool.
pub struct TestDatabase {
    /// Database connection.
    pub conn: Arc<DatabaseConnection>,
}

impl TestDatabase {
    /// Create and migrate a fresh database.
    pub async fn new() -> Result<Self, DbErr> {
        let mut opt = ConnectOptions::new("sqlite::memory:");
        opt.max_connections(1)
            .min_connections(1)
            .sqlx_logging(false);

        let conn = Database::connect(opt).await?;
        Migrator::up(&conn, None).await?;

        info!("Created in-memory test database");

        Ok(Self {
            conn: Arc::new(conn),
        })
    }

    /// Get the database connection.
    #[must_use]
    pub fn connection(&self) -> &DatabaseConnection {
        self.conn.as_ref()
    }

    /// Shared handle for repositories and services.
    #[must_use]
    pub fn arc(&self) -> Arc<DatabaseConnection> {
        self.conn.clone()
    }
}

/// Timestamp `days` days in the past.
#[must_use]
pub fn days_ago(days: i64) -> DateTimeWithTimeZone {
    (Utc::now() - Duration::days(days)).into()
}

/// Timestamp `hours` hours in the past.
#[must_use]
pub fn hours_ago(hours: i64) -> DateTimeWithTimeZone {
    (Utc::now() - Duration::hours(hours)).into()
}

fn next_id() -> String {
    sawab_common::IdGenerator::new().generate()
}

/// Insert a user.
pub async fn insert_user(
    db: &DatabaseConnection,
    username: &str,
    role: user::UserRole,
) -> Result<user::Model, DbErr> {
    let now: DateTimeWithTimeZone = Utc::now().into();
    user::ActiveModel {
        id: Set(next_id()),
        username: Set(username.to_string()),
        username_lower: Set(username.to_lowercase()),
        name: Set(None),
        token: Set(Some(format!("token-{username}"))),
        role: Set(role),
        sawab_balance: Set(0),
        banned_at: Set(None),
        banned_reason: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(db)
    .await
}

/// Insert a category.
pub async fn insert_category(
    db: &DatabaseConnection,
    name: &str,
) -> Result<category::Model, DbErr> {
    category::ActiveModel {
        id: Set(next_id()),
        name: Set(name.to_string()),
        created_at: Set(Utc::now().into()),
    }
    .insert(db)
    .await
}

/// Insert a request in an arbitrary status.
///
/// `entered_in_progress_at` and `pending_completion_at` are filled with
/// `updated_at` when the status implies them.
pub async fn insert_request(
    db: &DatabaseConnection,
    asker_id: &str,
    category_id: &str,
    status: request::RequestStatus,
    updated_at: DateTimeWithTimeZone,
) -> Result<request::Model, DbErr> {
    use request::RequestStatus as S;

    let in_progress_at = match status {
        S::InProgress | S::PendingCompletion | S::Disputed | S::Completed => Some(updated_at),
        S::Open | S::Cancelled => None,
    };
    let pending_at = match status {
        S::PendingCompletion | S::Disputed => Some(updated_at),
        _ => None,
    };

    request::ActiveModel {
        id: Set(next_id()),
        user_id: Set(asker_id.to_string()),
        category_id: Set(category_id.to_string()),
        institution_id: Set(None),
        title: Set("Need a ride".to_string()),
        description: Set("Need a ride to the clinic on Monday morning".to_string()),
        region: Set("Tatarstan".to_string()),
        city: Set("Kazan".to_string()),
        status: Set(status),
        offers_count: Set(0),
        entered_in_progress_at: Set(in_progress_at),
        pending_completion_at: Set(pending_at),
        completed_at: Set(None),
        created_at: Set(updated_at),
        updated_at: Set(updated_at),
    }
    .insert(db)
    .await
}

/// Insert an offer.
pub async fn insert_offer(
    db: &DatabaseConnection,
    request_id: &str,
    helper_id: &str,
    status: offer::OfferStatus,
) -> Result<offer::Model, DbErr> {
    let now: DateTimeWithTimeZone = Utc::now().into();
    offer::ActiveModel {
        id: Set(next_id()),
        request_id: Set(request_id.to_string()),
        user_id: Set(helper_id.to_string()),
        message: Set("I can drive you there".to_string()),
        status: Set(status),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(db)
    .await
}

/// Insert a catalog badge.
pub async fn insert_badge(db: &DatabaseConnection, name: &str) -> Result<badge::Model, DbErr> {
    badge::ActiveModel {
        id: Set(next_id()),
        name: Set(name.to_string()),
        description: Set(None),
        icon_name: Set("star".to_string()),
        created_at: Set(Utc::now().into()),
    }
    .insert(db)
    .await
}

/// Insert an institution.
pub async fn insert_institution(
    db: &DatabaseConnection,
    name: &str,
    verified: bool,
) -> Result<institution::Model, DbErr> {
    let now: DateTimeWithTimeZone = Utc::now().into();
    institution::ActiveModel {
        id: Set(next_id()),
        name: Set(name.to_string()),
        institution_type: Set(institution::InstitutionType::CareHome),
        address: Set("1 Main Street".to_string()),
        city: Set("Kazan".to_string()),
        region: Set("Tatarstan".to_string()),
        phone: Set("+70000000000".to_string()),
        director_name: Set("Director".to_string()),
        description: Set(None),
        verified: Set(verified),
        verified_at: Set(verified.then_some(now)),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(db)
    .await
}

/// Insert an institution membership.
pub async fn insert_member(
    db: &DatabaseConnection,
    institution_id: &str,
    user_id: &str,
    role: institution_member::MemberRole,
) -> Result<institution_member::Model, DbErr> {
    institution_member::ActiveModel {
        id: Set(next_id()),
        institution_id: Set(institution_id.to_string()),
        user_id: Set(user_id.to_string()),
        role: Set(role),
        position: Set(None),
        created_at: Set(Utc::now().into()),
    }
    .insert(db)
    .await
}

/// Insert a notification with explicit timestamps.
pub async fn insert_notification(
    db: &DatabaseConnection,
    recipient_id: &str,
    action: notification::NotificationAction,
    target: &notification::Notifiable,
    created_at: DateTimeWithTimeZone,
    read_at: Option<DateTimeWithTimeZone>,
) -> Result<notification::Model, DbErr> {
    notification::ActiveModel {
        id: Set(next_id()),
        recipient_id: Set(recipient_id.to_string()),
        actor_id: Set(None),
        action: Set(action),
        notifiable_type: Set(target.kind()),
        notifiable_id: Set(target.id().to_string()),
        read_at: Set(read_at),
        created_at: Set(created_at),
    }
    .insert(db)
    .await
}

/// Insert an admin message from `sender` to `recipient`.
pub async fn insert_admin_message(
    db: &DatabaseConnection,
    sender: &user::Model,
    recipient: &user::Model,
    read_at: Option<DateTimeWithTimeZone>,
) -> Result<admin_message::Model, DbErr> {
    let member_id = if sender.is_staff() { &recipient.id } else { &sender.id };
    admin_message::ActiveModel {
        id: Set(next_id()),
        sender_id: Set(sender.id.clone()),
        recipient_id: Set(recipient.id.clone()),
        member_id: Set(member_id.clone()),
        body: Set(format!("Message from {}", sender.username)),
        read_at: Set(read_at),
        created_at: Set(Utc::now().into()),
    }
    .insert(db)
    .await
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::entities::Request;
    use sea_orm::EntityTrait;

    #[tokio::test]
    async fn test_migrated_database_accepts_fixtures() {
        let db = TestDatabase::new().await.unwrap();
        let conn = db.connection();

        let asker = insert_user(conn, "Asker", user::UserRole::User).await.unwrap();
        let category = insert_category(conn, "Transport").await.unwrap();
        let req = insert_request(
            conn,
            &asker.id,
            &category.id,
            request::RequestStatus::PendingCompletion,
            days_ago(3),
        )
        .await
        .unwrap();

        let found = Request::find_by_id(req.id.clone()).one(conn).await.unwrap().unwrap();
        assert_eq!(found.status, request::RequestStatus::PendingCompletion);
        assert!(found.pending_completion_at.is_some());
        assert_eq!(asker.username_lower, "asker");
    }

    #[tokio::test]
    async fn test_username_is_case_insensitively_unique() {
        let db = TestDatabase::new().await.unwrap();
        let conn = db.connection();

        insert_user(conn, "Amina", user::UserRole::User).await.unwrap();
        assert!(insert_user(conn, "AMINA", user::UserRole::User).await.is_err());
    }

    #[tokio::test]
    async fn test_one_pending_offer_per_user_and_request() {
        let db = TestDatabase::new().await.unwrap();
        let conn = db.connection();

        let asker = insert_user(conn, "asker", user::UserRole::User).await.unwrap();
        let helper = insert_user(conn, "helper", user::UserRole::User).await.unwrap();
        let category = insert_category(conn, "Transport").await.unwrap();
        let req = insert_request(
            conn,
            &asker.id,
            &category.id,
            request::RequestStatus::Open,
            days_ago(0),
        )
        .await
        .unwrap();

        insert_offer(conn, &req.id, &helper.id, offer::OfferStatus::Pending)
            .await
            .unwrap();
        assert!(
            insert_offer(conn, &req.id, &helper.id, offer::OfferStatus::Pending)
                .await
                .is_err()
        );
        // Rejected offers do not count against the partial index
        insert_offer(conn, &req.id, &helper.id, offer::OfferStatus::Rejected)
            .await
            .unwrap();
    }
}

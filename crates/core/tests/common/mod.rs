//! Shared wiring for the core integration tests.

#![allow(dead_code, clippy::unwrap_used)]

use std::sync::Arc;

use sawab_common::{BadgeConfig, InMemoryCounterCache, LifecycleConfig};
use sawab_core::{
    AdminMessageService, BadgeEngine, BadgeService, ConversationService, InstitutionService,
    LifecycleJobs, LocalEventPublisher, NotificationService, OfferService, ReportService, RequestService,
    ReviewService, UserService,
};
use sawab_db::entities::{Notification, notification, offer, request, user};
use sawab_db::test_utils::{
    TestDatabase, insert_category, insert_offer, insert_request, insert_user,
};
use sea_orm::entity::prelude::DateTimeWithTimeZone;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};

pub struct Harness {
    pub db: TestDatabase,
    pub cache: Arc<InMemoryCounterCache>,
    pub events: LocalEventPublisher,
    pub notifications: NotificationService,
    pub requests: RequestService,
    pub offers: OfferService,
    pub conversations: ConversationService,
    pub reports: ReportService,
    pub institutions: InstitutionService,
    pub badges: BadgeService,
    pub reviews: ReviewService,
    pub admin_messages: AdminMessageService,
    pub users: UserService,
    pub jobs: LifecycleJobs,
}

impl Harness {
    pub async fn new() -> Self {
        Self::with_config(LifecycleConfig::default(), BadgeConfig::default()).await
    }

    pub async fn with_config(lifecycle: LifecycleConfig, badges: BadgeConfig) -> Self {
        let db = TestDatabase::new().await.unwrap();
        let conn = db.arc();
        let cache = Arc::new(InMemoryCounterCache::new());
        let events = LocalEventPublisher::new(64);

        let mut notifications = NotificationService::new(conn.clone(), cache.clone());
        notifications.set_event_publisher(Arc::new(events.clone()));

        let engine = BadgeEngine::new(conn.clone(), badges);
        let requests = RequestService::new(
            conn.clone(),
            engine,
            notifications.clone(),
            lifecycle.clone(),
        );
        let mut conversations = ConversationService::new(conn.clone(), notifications.clone());
        conversations.set_event_publisher(Arc::new(events.clone()));

        Self {
            offers: OfferService::new(conn.clone(), notifications.clone()),
            reports: ReportService::new(conn.clone(), notifications.clone()),
            institutions: InstitutionService::new(conn.clone(), notifications.clone()),
            badges: BadgeService::new(conn.clone(), notifications.clone()),
            reviews: ReviewService::new(conn.clone()),
            admin_messages: AdminMessageService::new(conn.clone(), cache.clone()),
            users: UserService::new(conn.clone()),
            jobs: LifecycleJobs::new(
                conn.clone(),
                requests.clone(),
                notifications.clone(),
                lifecycle,
            ),
            conversations,
            requests,
            notifications,
            events,
            cache,
            db,
        }
    }

    pub async fn user(&self, username: &str) -> user::Model {
        insert_user(self.db.connection(), username, user::UserRole::User)
            .await
            .unwrap()
    }

    pub async fn admin(&self, username: &str) -> user::Model {
        insert_user(self.db.connection(), username, user::UserRole::Admin)
            .await
            .unwrap()
    }

    pub async fn moderator(&self, username: &str) -> user::Model {
        insert_user(self.db.connection(), username, user::UserRole::Moderator)
            .await
            .unwrap()
    }

    /// A request of `asker` in `status`, with `helper` holding the accepted
    /// offer when the status implies one.
    pub async fn request_with_helper(
        &self,
        asker: &user::Model,
        helper: &user::Model,
        category_id: &str,
        status: request::RequestStatus,
        updated_at: DateTimeWithTimeZone,
    ) -> (request::Model, offer::Model) {
        let conn = self.db.connection();
        let request = insert_request(conn, &asker.id, category_id, status, updated_at)
            .await
            .unwrap();
        let offer = insert_offer(conn, &request.id, &helper.id, offer::OfferStatus::Accepted)
            .await
            .unwrap();
        (request, offer)
    }

    pub async fn category(&self, name: &str) -> String {
        insert_category(self.db.connection(), name).await.unwrap().id
    }

    pub async fn reload_user(&self, id: &str) -> user::Model {
        self.users.get(id).await.unwrap()
    }

    pub async fn notifications_of(
        &self,
        recipient_id: &str,
        action: notification::NotificationAction,
    ) -> Vec<notification::Model> {
        Notification::find()
            .filter(notification::Column::RecipientId.eq(recipient_id))
            .filter(notification::Column::Action.eq(action))
            .all(self.db.connection())
            .await
            .unwrap()
    }
}

//! Notification entity.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::capabilities::Readable;

/// Event kinds a notification can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(48))")]
#[serde(rename_all = "snake_case")]
pub enum NotificationAction {
    #[sea_orm(string_value = "new_offer")]
    NewOffer,
    #[sea_orm(string_value = "offer_accepted")]
    OfferAccepted,
    #[sea_orm(string_value = "offer_rejected")]
    OfferRejected,
    #[sea_orm(string_value = "new_message")]
    NewMessage,
    #[sea_orm(string_value = "pending_completion")]
    PendingCompletion,
    #[sea_orm(string_value = "request_completed")]
    RequestCompleted,
    #[sea_orm(string_value = "report_resolved")]
    ReportResolved,
    #[sea_orm(string_value = "report_dismissed")]
    ReportDismissed,
    #[sea_orm(string_value = "user_warned")]
    UserWarned,
    #[sea_orm(string_value = "badge_unlocked")]
    BadgeUnlocked,
    #[sea_orm(string_value = "dispute_created")]
    DisputeCreated,
    #[sea_orm(string_value = "request_auto_completed")]
    RequestAutoCompleted,
    #[sea_orm(string_value = "inactive_request_reminder")]
    InactiveRequestReminder,
    #[sea_orm(string_value = "dispute_escalation")]
    DisputeEscalation,
    #[sea_orm(string_value = "institution_pending_verification")]
    InstitutionPendingVerification,
    #[sea_orm(string_value = "institution_verified")]
    InstitutionVerified,
    #[sea_orm(string_value = "institution_request_created")]
    InstitutionRequestCreated,
}

/// Entity kinds a notification may point at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "snake_case")]
pub enum NotifiableKind {
    #[sea_orm(string_value = "offer")]
    Offer,
    #[sea_orm(string_value = "request")]
    Request,
    #[sea_orm(string_value = "message")]
    Message,
    #[sea_orm(string_value = "report")]
    Report,
    #[sea_orm(string_value = "badge")]
    Badge,
    #[sea_orm(string_value = "institution")]
    Institution,
    #[sea_orm(string_value = "user")]
    User,
}

/// Typed reference to the entity a notification is about.
///
/// The reference is weak: the target may have been deleted since the
/// notification was written.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum Notifiable {
    Offer(String),
    Request(String),
    Message(String),
    Report(String),
    Badge(String),
    Institution(String),
    User(String),
}

impl Notifiable {
    /// Rebuild a reference from its stored columns.
    #[must_use]
    pub fn from_parts(kind: NotifiableKind, id: String) -> Self {
        match kind {
            NotifiableKind::Offer => Self::Offer(id),
            NotifiableKind::Request => Self::Request(id),
            NotifiableKind::Message => Self::Message(id),
            NotifiableKind::Report => Self::Report(id),
            NotifiableKind::Badge => Self::Badge(id),
            NotifiableKind::Institution => Self::Institution(id),
            NotifiableKind::User => Self::User(id),
        }
    }

    /// Stored kind column.
    #[must_use]
    pub const fn kind(&self) -> NotifiableKind {
        match self {
            Self::Offer(_) => NotifiableKind::Offer,
            Self::Request(_) => NotifiableKind::Request,
            Self::Message(_) => NotifiableKind::Message,
            Self::Report(_) => NotifiableKind::Report,
            Self::Badge(_) => NotifiableKind::Badge,
            Self::Institution(_) => NotifiableKind::Institution,
            Self::User(_) => NotifiableKind::User,
        }
    }

    /// Stored id column.
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::Offer(id)
            | Self::Request(id)
            | Self::Message(id)
            | Self::Report(id)
            | Self::Badge(id)
            | Self::Institution(id)
            | Self::User(id) => id,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "notification")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// The user receiving the notification
    pub recipient_id: String,

    /// The user who triggered the notification, absent for system events
    #[sea_orm(nullable)]
    pub actor_id: Option<String>,

    pub action: NotificationAction,

    pub notifiable_type: NotifiableKind,

    pub notifiable_id: String,

    #[sea_orm(nullable)]
    pub read_at: Option<DateTimeWithTimeZone>,

    pub created_at: DateTimeWithTimeZone,
}

impl Model {
    /// Typed reference to the notified-about entity.
    #[must_use]
    pub fn notifiable(&self) -> Notifiable {
        Notifiable::from_parts(self.notifiable_type, self.notifiable_id.clone())
    }
}

impl Readable for Model {
    fn read_at(&self) -> Option<DateTimeWithTimeZone> {
        self.read_at
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::RecipientId",
        to = "super::user::Column::Id",
        on_delete = "Cascade"
    )]
    Recipient,

    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::ActorId",
        to = "super::user::Column::Id",
        on_delete = "SetNull"
    )]
    Actor,
}

impl ActiveModelBehavior for ActiveModel {}

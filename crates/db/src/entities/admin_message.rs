//! Admin message entity.
//!
//! A direct message between a member and staff. Exactly one side of every
//! message is staff; `member_id` repeats the other side so that threads can
//! be listed without inspecting roles.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::capabilities::Readable;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "admin_message")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    pub sender_id: String,

    pub recipient_id: String,

    /// The non-staff participant; keys the thread
    pub member_id: String,

    #[sea_orm(column_type = "Text")]
    pub body: String,

    #[sea_orm(nullable)]
    pub read_at: Option<DateTimeWithTimeZone>,

    pub created_at: DateTimeWithTimeZone,
}

impl Model {
    /// The staff participant.
    #[must_use]
    pub fn staff_id(&self) -> &str {
        if self.sender_id == self.member_id {
            &self.recipient_id
        } else {
            &self.sender_id
        }
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
        from = "Column::SenderId",
        to = "super::user::Column::Id",
        on_delete = "Cascade"
    )]
    Sender,

    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::RecipientId",
        to = "super::user::Column::Id",
        on_delete = "Cascade"
    )]
    Recipient,
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn message(sender: &str, recipient: &str, member: &str) -> Model {
        Model {
            id: "m1".to_string(),
            sender_id: sender.to_string(),
            recipient_id: recipient.to_string(),
            member_id: member.to_string(),
            body: "Hello there".to_string(),
            read_at: None,
            created_at: Utc::now().into(),
        }
    }

    #[test]
    fn test_staff_id_is_the_other_side() {
        assert_eq!(message("admin", "user", "user").staff_id(), "admin");
        assert_eq!(message("user", "admin", "user").staff_id(), "admin");
        assert!(message("user", "admin", "user").is_unread());
    }
}

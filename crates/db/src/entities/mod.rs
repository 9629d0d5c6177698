//! Database entities.

#![allow(missing_docs)]

pub mod admin_message;
pub mod badge;
pub mod capabilities;
pub mod category;
pub mod conversation;
pub mod institution;
pub mod institution_member;
pub mod message;
pub mod notification;
pub mod offer;
pub mod report;
pub mod request;
pub mod review;
pub mod user;
pub mod user_badge;

pub use admin_message::Entity as AdminMessage;
pub use badge::Entity as Badge;
pub use category::Entity as Category;
pub use conversation::Entity as Conversation;
pub use institution::Entity as Institution;
pub use institution_member::Entity as InstitutionMember;
pub use message::Entity as Message;
pub use notification::Entity as Notification;
pub use offer::Entity as Offer;
pub use report::Entity as Report;
pub use request::Entity as Request;
pub use review::Entity as Review;
pub use user::Entity as User;
pub use user_badge::Entity as UserBadge;

//! Database repositories.

mod admin_message;
mod badge;
mod category;
mod conversation;
mod institution;
mod notification;
mod offer;
mod report;
mod request;
mod review;
mod user;

pub use admin_message::AdminMessageRepository;
pub use badge::BadgeRepository;
pub use category::CategoryRepository;
pub use conversation::ConversationRepository;
pub use institution::InstitutionRepository;
pub use notification::NotificationRepository;
pub use offer::OfferRepository;
pub use report::ReportRepository;
pub use request::{RequestRepository, count_by_status};
pub use review::ReviewRepository;
pub use user::UserRepository;

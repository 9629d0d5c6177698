//! Business logic services.

#![allow(missing_docs)]

pub mod admin_message;
pub mod badge;
pub mod conversation;
pub mod event_publisher;
pub mod institution;
pub mod jobs;
pub mod notification;
pub mod offer;
pub mod report;
pub mod request;
pub mod review;
pub mod state_machine;
pub mod user;

pub use admin_message::{AdminMessageService, AdminThread, SendAdminMessageInput};
pub use badge::{AwardedBadge, BadgeEngine, BadgeService};
pub use conversation::{ConversationService, SendMessageInput};
pub use event_publisher::{
    EventPublisher, EventPublisherService, LocalEventPublisher, MessagePayload,
    NoOpEventPublisher, StreamEvent,
};
pub use institution::{
    AddMemberInput, CreateInstitutionInput, InstitutionService, UpdateMemberInput,
};
pub use jobs::{JobReport, LifecycleJobs};
pub use notification::{NotificationIntent, NotificationService, NotificationView, TargetView};
pub use offer::{AcceptOutcome, CreateOfferInput, OfferService};
pub use report::{CreateReportInput, ReportService, ResolutionAction, ResolveReportInput};
pub use request::{
    Completion, CompletionTrigger, CreateRequestInput, RequestService, UpdateRequestInput,
};
pub use review::{CreateReviewInput, ReviewService};
pub use state_machine::{OfferTransition, RequestEvent};
pub use user::{LeaderboardEntry, UserService};

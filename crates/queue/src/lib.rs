//! Background processing for sawab.
//!
//! - **Scheduler**: the periodic lifecycle jobs on tokio intervals
//! - **Pub/Sub**: realtime events shared between server processes over Redis

pub mod pubsub;
pub mod scheduler;

pub use pubsub::{RedisPubSub, stream_channel};
pub use scheduler::{JobExecutor, ScheduledJob, run_scheduler};

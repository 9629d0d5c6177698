//! Common utilities and shared types for sawab.
//!
//! This crate provides foundational components used across all sawab crates:
//!
//! - **Configuration**: Application settings via [`Config`]
//! - **Error handling**: Unified error types via [`AppError`] and [`AppResult`]
//! - **ID Generation**: ULID-based unique identifiers via [`IdGenerator`]
//! - **Counter cache**: The unread-counter cache port via [`CounterCache`]
//!
//! # Example
//!
//! ```no_run
//! use sawab_common::{Config, IdGenerator, AppResult};
//!
//! fn example() -> AppResult<()> {
//!     let config = Config::load()?;
//!     let id_gen = IdGenerator::new();
//!     let id = id_gen.generate();
//!     println!("Listening on {}:{}, first id {}", config.server.host, config.server.port, id);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod counter_cache;
pub mod error;
pub mod id;

pub use config::{
    BadgeConfig, CacheConfig, Config, LifecycleConfig, MilestoneBadge, SchedulerConfig,
};
pub use counter_cache::{
    CounterCache, CounterKey, CounterKind, InMemoryCounterCache, RedisCounterCache, read_through,
};
pub use error::{AppError, AppResult};
pub use id::IdGenerator;

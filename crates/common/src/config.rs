//! Application configuration.

use serde::Deserialize;
use std::path::Path;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Server configuration.
    pub server: ServerConfig,
    /// Database configuration.
    pub database: DatabaseConfig,
    /// Redis configuration.
    #[serde(default)]
    pub redis: RedisConfig,
    /// Request lifecycle thresholds.
    #[serde(default)]
    pub lifecycle: LifecycleConfig,
    /// Counter cache configuration.
    #[serde(default)]
    pub cache: CacheConfig,
    /// Background scheduler configuration.
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    /// Badge award rules.
    #[serde(default)]
    pub badges: BadgeConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to bind to.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Public URL of this instance.
    pub url: String,
}

/// Database connection configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// `PostgreSQL` connection URL.
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

/// Redis configuration.
///
/// Redis is optional. Without a URL the unread counters are cached in process
/// and realtime events only reach sockets held by this process.
#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    /// Redis connection URL.
    #[serde(default)]
    pub url: Option<String>,
    /// Key prefix for all Redis keys.
    #[serde(default = "default_redis_prefix")]
    pub prefix: String,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: None,
            prefix: default_redis_prefix(),
        }
    }
}

/// Day and batch thresholds that drive the request lifecycle and its jobs.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LifecycleConfig {
    /// Days a request must stay `in_progress` before the helper may mark it pending.
    #[serde(default = "default_seven")]
    pub pending_completion_after_days: i64,
    /// Days in `pending_completion` after which the request completes on its own.
    #[serde(default = "default_seven")]
    pub auto_complete_after_days: i64,
    /// Days a dispute may stay untouched before staff are pinged.
    #[serde(default = "default_three")]
    pub dispute_escalation_after_days: i64,
    /// De-duplication window for escalation notices, per staff member and request.
    #[serde(default = "default_escalation_window_hours")]
    pub dispute_escalation_window_hours: i64,
    /// Days an `in_progress` request may stay untouched before the helper is reminded.
    #[serde(default = "default_five")]
    pub inactivity_reminder_after_days: i64,
    /// Minimum days between two reminders for the same request.
    #[serde(default = "default_three")]
    pub inactivity_reminder_cooldown_days: i64,
    /// Days a read notification is kept.
    #[serde(default = "default_retention_days")]
    pub notification_retention_days: i64,
    /// Rows deleted per cleanup batch.
    #[serde(default = "default_cleanup_batch_size")]
    pub cleanup_batch_size: u64,
    /// Pause between cleanup batches, in milliseconds.
    #[serde(default = "default_cleanup_pause_ms")]
    pub cleanup_pause_ms: u64,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            pending_completion_after_days: default_seven(),
            auto_complete_after_days: default_seven(),
            dispute_escalation_after_days: default_three(),
            dispute_escalation_window_hours: default_escalation_window_hours(),
            inactivity_reminder_after_days: default_five(),
            inactivity_reminder_cooldown_days: default_three(),
            notification_retention_days: default_retention_days(),
            cleanup_batch_size: default_cleanup_batch_size(),
            cleanup_pause_ms: default_cleanup_pause_ms(),
        }
    }
}

/// Counter cache configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// Time-to-live of a cached unread counter, in seconds.
    #[serde(default = "default_counter_ttl_secs")]
    pub counter_ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            counter_ttl_secs: default_counter_ttl_secs(),
        }
    }
}

/// Scheduler intervals, in seconds.
#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    /// Whether the scheduler runs inside this process.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Auto-complete job interval.
    #[serde(default = "default_daily")]
    pub auto_complete_interval_secs: u64,
    /// Notification cleanup job interval.
    #[serde(default = "default_daily")]
    pub cleanup_interval_secs: u64,
    /// Dispute escalation job interval.
    #[serde(default = "default_daily")]
    pub dispute_escalation_interval_secs: u64,
    /// Inactivity reminder job interval.
    #[serde(default = "default_daily")]
    pub inactivity_reminder_interval_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            auto_complete_interval_secs: default_daily(),
            cleanup_interval_secs: default_daily(),
            dispute_escalation_interval_secs: default_daily(),
            inactivity_reminder_interval_secs: default_daily(),
        }
    }
}

/// A badge awarded when the sawab balance reaches an exact value.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MilestoneBadge {
    /// Catalog badge name.
    pub name: String,
    /// Balance at which the badge is awarded.
    pub sawab: i32,
}

/// Badge award rules evaluated after each completion.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BadgeConfig {
    /// Sawab balance milestones.
    #[serde(default = "default_milestones")]
    pub milestones: Vec<MilestoneBadge>,
    /// Prefix of category mastery badges, followed by the category name.
    #[serde(default = "default_mastery_prefix")]
    pub category_mastery_prefix: String,
    /// Completed offers in one category that earn the mastery badge.
    #[serde(default = "default_mastery_count")]
    pub category_mastery_count: u64,
}

impl Default for BadgeConfig {
    fn default() -> Self {
        Self {
            milestones: default_milestones(),
            category_mastery_prefix: default_mastery_prefix(),
            category_mastery_count: default_mastery_count(),
        }
    }
}

impl BadgeConfig {
    /// Catalog name of the mastery badge for a category.
    #[must_use]
    pub fn mastery_badge_name(&self, category: &str) -> String {
        format!("{}{category}", self.category_mastery_prefix)
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

const fn default_port() -> u16 {
    3000
}

const fn default_max_connections() -> u32 {
    100
}

const fn default_min_connections() -> u32 {
    5
}

fn default_redis_prefix() -> String {
    "sawab".to_string()
}

const fn default_true() -> bool {
    true
}

const fn default_three() -> i64 {
    3
}

const fn default_five() -> i64 {
    5
}

const fn default_seven() -> i64 {
    7
}

const fn default_escalation_window_hours() -> i64 {
    24
}

const fn default_retention_days() -> i64 {
    30
}

const fn default_cleanup_batch_size() -> u64 {
    1000
}

const fn default_cleanup_pause_ms() -> u64 {
    100
}

const fn default_counter_ttl_secs() -> u64 {
    300
}

const fn default_daily() -> u64 {
    24 * 60 * 60
}

fn default_milestones() -> Vec<MilestoneBadge> {
    vec![
        MilestoneBadge {
            name: "Первый Sawab".to_string(),
            sawab: 1,
        },
        MilestoneBadge {
            name: "Помощник".to_string(),
            sawab: 5,
        },
        MilestoneBadge {
            name: "Ветеран".to_string(),
            sawab: 25,
        },
    ]
}

fn default_mastery_prefix() -> String {
    "Эксперт: ".to_string()
}

const fn default_mastery_count() -> u64 {
    5
}

impl Config {
    /// Load configuration from files and environment variables.
    ///
    /// Configuration is loaded in the following order:
    /// 1. `.env` (if present)
    /// 2. `config/default.toml`
    /// 3. `config/{environment}.toml` (based on `SAWAB_ENV`)
    /// 4. Environment variables with `SAWAB__` prefix
    pub fn load() -> Result<Self, config::ConfigError> {
        dotenvy::dotenv().ok();
        let env = std::env::var("SAWAB_ENV").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("SAWAB")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Load configuration from a specific file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(
                config::Environment::with_prefix("SAWAB")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn from_toml(src: &str) -> Config {
        config::Config::builder()
            .add_source(config::File::from_str(src, config::FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn test_minimal_config_fills_defaults() {
        let config = from_toml(
            r#"
            [server]
            url = "https://sawab.example"

            [database]
            url = "postgres://localhost/sawab"
            "#,
        );

        assert_eq!(config.server.port, 3000);
        assert!(config.redis.url.is_none());
        assert_eq!(config.redis.prefix, "sawab");
        assert_eq!(config.lifecycle.auto_complete_after_days, 7);
        assert_eq!(config.lifecycle.pending_completion_after_days, 7);
        assert_eq!(config.lifecycle.dispute_escalation_after_days, 3);
        assert_eq!(config.lifecycle.dispute_escalation_window_hours, 24);
        assert_eq!(config.lifecycle.inactivity_reminder_after_days, 5);
        assert_eq!(config.lifecycle.inactivity_reminder_cooldown_days, 3);
        assert_eq!(config.lifecycle.notification_retention_days, 30);
        assert_eq!(config.cache.counter_ttl_secs, 300);
        assert_eq!(config.scheduler.cleanup_interval_secs, 86_400);
        assert_eq!(config.badges.milestones.len(), 3);
        assert_eq!(config.badges.category_mastery_count, 5);
    }

    #[test]
    fn test_badges_override() {
        let config = from_toml(
            r#"
            [server]
            url = "https://sawab.example"

            [database]
            url = "postgres://localhost/sawab"

            [badges]
            category_mastery_prefix = "Master of "
            category_mastery_count = 3

            [[badges.milestones]]
            name = "First"
            sawab = 1
            "#,
        );

        assert_eq!(
            config.badges.milestones,
            vec![MilestoneBadge {
                name: "First".to_string(),
                sawab: 1
            }]
        );
        assert_eq!(config.badges.mastery_badge_name("Cooking"), "Master of Cooking");
        assert_eq!(config.badges.category_mastery_count, 3);
    }

    #[test]
    fn test_shipped_default_file_matches_defaults() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../config/default.toml");
        let config = Config::from_file(path).unwrap();

        assert_eq!(config.lifecycle, LifecycleConfig::default());
        assert_eq!(config.badges, BadgeConfig::default());
        assert_eq!(config.cache.counter_ttl_secs, 300);
        assert!(config.scheduler.enabled);
    }

    #[test]
    fn test_mastery_badge_name_default() {
        let badges = BadgeConfig::default();
        assert_eq!(badges.mastery_badge_name("Транспорт"), "Эксперт: Транспорт");
    }
}

//! Per-user counter cache.
//!
//! Unread counters are read on every page view and written on every
//! notification change, so they sit behind a small cache port with a TTL.
//! Writers invalidate the entry explicitly; the TTL only bounds the damage of
//! a missed invalidation.
//!
//! Keys are built exclusively through [`CounterKey`] so that the write path
//! and the invalidation path can never disagree on the string layout.

use async_trait::async_trait;
use fred::clients::Client as RedisClient;
use fred::interfaces::KeysInterface;
use fred::types::Expiration;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::{AppError, AppResult};

/// Default counter TTL: 5 minutes.
pub const DEFAULT_COUNTER_TTL: Duration = Duration::from_secs(5 * 60);

/// Kinds of per-user counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CounterKind {
    /// Unread notifications.
    UnreadNotifications,
    /// Unread messages between staff and a user.
    UnreadAdminMessages,
}

impl CounterKind {
    const fn as_str(self) -> &'static str {
        match self {
            Self::UnreadNotifications => "unread_notifications",
            Self::UnreadAdminMessages => "unread_admin_messages",
        }
    }
}

/// Cache key of one user's counter.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CounterKey {
    user_id: String,
    kind: CounterKind,
}

impl CounterKey {
    /// Build a key for a user and counter kind.
    #[must_use]
    pub fn new(user_id: impl Into<String>, kind: CounterKind) -> Self {
        Self {
            user_id: user_id.into(),
            kind,
        }
    }

    /// Unread notification counter of a user.
    #[must_use]
    pub fn unread_notifications(user_id: impl Into<String>) -> Self {
        Self::new(user_id, CounterKind::UnreadNotifications)
    }

    /// Unread admin message counter of a user.
    #[must_use]
    pub fn unread_admin_messages(user_id: impl Into<String>) -> Self {
        Self::new(user_id, CounterKind::UnreadAdminMessages)
    }

    /// Storage representation, e.g. `user:01h..:unread_notifications`.
    #[must_use]
    pub fn render(&self) -> String {
        format!("user:{}:{}", self.user_id, self.kind.as_str())
    }
}

/// Cache port for per-user counters.
#[async_trait]
pub trait CounterCache: Send + Sync {
    /// Read a cached counter.
    async fn get(&self, key: &CounterKey) -> AppResult<Option<u64>>;

    /// Store a counter with the cache's TTL.
    async fn set(&self, key: &CounterKey, value: u64) -> AppResult<()>;

    /// Drop a cached counter so the next read recomputes it.
    async fn invalidate(&self, key: &CounterKey) -> AppResult<()>;
}

/// Read a counter through `cache`, computing it with `load` on a miss.
///
/// A writer that commits and invalidates between our load and our store would
/// otherwise leave a stale value in place until the TTL expires. The count is
/// therefore loaded once more after storing it; if it moved, the entry is
/// dropped and the fresher value returned. Cache failures degrade to a plain
/// load.
pub async fn read_through<F, Fut>(
    cache: &dyn CounterCache,
    key: &CounterKey,
    load: F,
) -> AppResult<u64>
where
    F: Fn() -> Fut,
    Fut: Future<Output = AppResult<u64>>,
{
    match cache.get(key).await {
        Ok(Some(count)) => return Ok(count),
        Ok(None) => {}
        Err(e) => warn!(error = %e, key = %key.render(), "Failed to read counter cache"),
    }

    let count = load().await?;
    if let Err(e) = cache.set(key, count).await {
        warn!(error = %e, key = %key.render(), "Failed to store counter");
        return Ok(count);
    }

    let current = load().await?;
    if current != count {
        debug!(key = %key.render(), count, current, "Counter moved while caching, dropping entry");
        if let Err(e) = cache.invalidate(key).await {
            warn!(error = %e, key = %key.render(), "Failed to invalidate counter");
        }
    }
    Ok(current)
}

/// In-process counter cache.
#[derive(Clone)]
pub struct InMemoryCounterCache {
    entries: Arc<RwLock<HashMap<CounterKey, (u64, Instant)>>>,
    ttl: Duration,
}

impl InMemoryCounterCache {
    /// Create a cache with the default TTL.
    #[must_use]
    pub fn new() -> Self {
        Self::with_ttl(DEFAULT_COUNTER_TTL)
    }

    /// Create a cache with a custom TTL.
    #[must_use]
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            ttl,
        }
    }

    /// Remove expired entries.
    pub async fn cleanup(&self) {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        entries.retain(|_, (_, expires_at)| *expires_at > now);
    }
}

impl Default for InMemoryCounterCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CounterCache for InMemoryCounterCache {
    async fn get(&self, key: &CounterKey) -> AppResult<Option<u64>> {
        let entries = self.entries.read().await;
        Ok(entries
            .get(key)
            .filter(|(_, expires_at)| *expires_at > Instant::now())
            .map(|(value, _)| *value))
    }

    async fn set(&self, key: &CounterKey, value: u64) -> AppResult<()> {
        let mut entries = self.entries.write().await;
        entries.insert(key.clone(), (value, Instant::now() + self.ttl));
        Ok(())
    }

    async fn invalidate(&self, key: &CounterKey) -> AppResult<()> {
        let mut entries = self.entries.write().await;
        entries.remove(key);
        Ok(())
    }
}

/// Redis-backed counter cache, shared by every server process.
#[derive(Clone)]
pub struct RedisCounterCache {
    redis: Arc<RedisClient>,
    prefix: String,
    ttl_secs: i64,
}

impl RedisCounterCache {
    /// Create a Redis counter cache.
    #[must_use]
    pub fn new(redis: Arc<RedisClient>, prefix: impl Into<String>, ttl: Duration) -> Self {
        Self {
            redis,
            prefix: prefix.into(),
            ttl_secs: ttl.as_secs() as i64,
        }
    }

    fn redis_key(&self, key: &CounterKey) -> String {
        format!("{}:{}", self.prefix, key.render())
    }
}

#[async_trait]
impl CounterCache for RedisCounterCache {
    async fn get(&self, key: &CounterKey) -> AppResult<Option<u64>> {
        let value: Option<u64> = self
            .redis
            .get(self.redis_key(key))
            .await
            .map_err(|e| AppError::Redis(e.to_string()))?;

        debug!(key = %key.render(), hit = value.is_some(), "Counter cache lookup");
        Ok(value)
    }

    async fn set(&self, key: &CounterKey, value: u64) -> AppResult<()> {
        self.redis
            .set::<(), _, _>(
                self.redis_key(key),
                value,
                Some(Expiration::EX(self.ttl_secs)),
                None,
                false,
            )
            .await
            .map_err(|e| AppError::Redis(e.to_string()))
    }

    async fn invalidate(&self, key: &CounterKey) -> AppResult<()> {
        self.redis
            .del::<(), _>(self.redis_key(key))
            .await
            .map_err(|e| AppError::Redis(e.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    #[test]
    fn test_key_render() {
        let key = CounterKey::unread_notifications("01habc");
        assert_eq!(key.render(), "user:01habc:unread_notifications");
        assert_eq!(
            key,
            CounterKey::new("01habc", CounterKind::UnreadNotifications)
        );
    }

    #[test]
    fn test_admin_message_key_is_distinct() {
        let key = CounterKey::unread_admin_messages("01habc");
        assert_eq!(key.render(), "user:01habc:unread_admin_messages");
        assert_ne!(key, CounterKey::unread_notifications("01habc"));
    }

    #[tokio::test]
    async fn test_read_through_caches_a_stable_count() {
        let cache = InMemoryCounterCache::new();
        let key = CounterKey::unread_admin_messages("u1");
        let loads = &AtomicU64::new(0);

        let count = read_through(&cache, &key, move || async move {
            loads.fetch_add(1, Ordering::SeqCst);
            Ok(3)
        })
        .await
        .unwrap();
        assert_eq!(count, 3);
        assert_eq!(cache.get(&key).await.unwrap(), Some(3));

        // Served from the cache now
        let before = loads.load(Ordering::SeqCst);
        read_through(&cache, &key, || async { Ok(99) }).await.unwrap();
        assert_eq!(loads.load(Ordering::SeqCst), before);
    }

    #[tokio::test]
    async fn test_read_through_drops_a_count_that_moved() {
        let cache = InMemoryCounterCache::new();
        let key = CounterKey::unread_notifications("u1");
        // A write lands between the first and second load
        let value = &AtomicU64::new(1);

        let count = read_through(&cache, &key, move || async move {
            Ok(value.fetch_add(1, Ordering::SeqCst))
        })
        .await
        .unwrap();
        assert_eq!(count, 2);
        assert_eq!(cache.get(&key).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_set_get_invalidate() {
        let cache = InMemoryCounterCache::new();
        let key = CounterKey::unread_notifications("u1");

        assert_eq!(cache.get(&key).await.unwrap(), None);
        cache.set(&key, 4).await.unwrap();
        assert_eq!(cache.get(&key).await.unwrap(), Some(4));

        cache.invalidate(&key).await.unwrap();
        assert_eq!(cache.get(&key).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_entries_expire() {
        let cache = InMemoryCounterCache::with_ttl(Duration::from_millis(10));
        let key = CounterKey::unread_notifications("u1");

        cache.set(&key, 2).await.unwrap();
        tokio::time::sleep(Duration::from_millis(25)).await;
        assert_eq!(cache.get(&key).await.unwrap(), None);

        cache.cleanup().await;
        assert!(cache.entries.read().await.is_empty());
    }

    #[tokio::test]
    async fn test_keys_are_per_user() {
        let cache = InMemoryCounterCache::new();
        cache
            .set(&CounterKey::unread_notifications("a"), 1)
            .await
            .unwrap();
        cache
            .invalidate(&CounterKey::unread_notifications("b"))
            .await
            .unwrap();
        assert_eq!(
            cache
                .get(&CounterKey::unread_notifications("a"))
                .await
                .unwrap(),
            Some(1)
        );
    }
}

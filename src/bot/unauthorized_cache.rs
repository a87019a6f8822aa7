//! Throttle for "not an admin" replies.
//!
//! Strangers poking the admin bot get one denial per cooldown window;
//! further attempts are dropped silently so the bot does not run into
//! Telegram flood limits.

use moka::future::Cache;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Remembers which non-admins were recently told off
#[derive(Clone)]
pub struct UnauthorizedCache {
    denied: Cache<i64, ()>,
    silenced: Arc<AtomicU64>,
}

impl UnauthorizedCache {
    /// Build a throttle where each user may receive one denial per `cooldown_secs`.
    ///
    /// ```
    /// use karaoke_queue_bot::bot::UnauthorizedCache;
    ///
    /// let cache = UnauthorizedCache::new(1200, 10_000);
    /// assert_eq!(cache.silenced_count(), 0);
    /// ```
    #[must_use]
    pub fn new(cooldown_secs: u64, max_capacity: u64) -> Self {
        let denied = Cache::builder()
            .max_capacity(max_capacity)
            .time_to_live(Duration::from_secs(cooldown_secs))
            .build();

        Self {
            denied,
            silenced: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Returns `true` if the user should get a denial reply now.
    ///
    /// The first call for a user opens the cooldown window; calls inside the
    /// window return `false` and are counted.
    pub async fn admit(&self, user_id: i64, username: &str) -> bool {
        let entry = self.denied.entry(user_id).or_insert(()).await;
        if entry.is_fresh() {
            return true;
        }

        let count = self.silenced.fetch_add(1, Ordering::Relaxed) + 1;
        if count.is_multiple_of(100) {
            debug!("Silenced {count} admin bot attempts (recent: {user_id} {username})");
        }
        false
    }

    /// Total denials suppressed since startup
    #[must_use]
    pub fn silenced_count(&self) -> u64 {
        self.silenced.load(Ordering::Relaxed)
    }
}

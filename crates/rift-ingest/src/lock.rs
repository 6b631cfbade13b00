//! Advisory refresh locks.
//!
//! Lock keys are derived from the player's normalized identity, so two
//! requests for the same player (in any casing) contend on the same key.
//! The TTL bounds how long a crashed holder can block the key; release is
//! explicit on every exit path, with a drop guard as backstop for
//! cancellation.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::warn;

use rift_core::PlayerIdentity;

use crate::error::Result;
use crate::store::Store;

/// Key prefix for player refresh locks.
pub const REFRESH_PREFIX: &str = "refresh:";

/// Key prefix for failed-match retry locks.
pub const FAILED_RETRY_PREFIX: &str = "failed-retry:";

/// Builds the refresh lock key for a player identity.
///
/// Uppercased so the key reads naturally in operational tooling; uniqueness
/// comes from the case-fold, which matches the identity's normalized key.
#[must_use]
pub fn refresh_key(identity: &PlayerIdentity) -> String {
    format!(
        "{REFRESH_PREFIX}{}:{}:{}",
        identity.region.as_str().to_uppercase(),
        identity.game_name.to_uppercase(),
        identity.tag_line.to_uppercase()
    )
}

/// Builds the retry lock key for a failed match.
#[must_use]
pub fn failed_retry_key(match_id: &str) -> String {
    format!("{FAILED_RETRY_PREFIX}{match_id}")
}

/// Store-backed advisory lock operations.
#[derive(Clone)]
pub struct RefreshLocks {
    store: Arc<dyn Store>,
}

impl RefreshLocks {
    /// Creates a lock handle over the given store.
    #[must_use]
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Attempts to acquire `key` for `ttl`. Returns true on acquisition.
    pub async fn try_acquire(&self, key: &str, ttl: Duration) -> Result<bool> {
        self.store.try_acquire_at(key, ttl, Utc::now()).await
    }

    /// Releases `key`.
    pub async fn release(&self, key: &str) -> Result<()> {
        self.store.release(key).await
    }

    /// Returns the remaining TTL on `key`, if it is held and unexpired.
    pub async fn remaining_ttl(&self, key: &str) -> Result<Option<Duration>> {
        let now = Utc::now();
        Ok(self
            .store
            .get_lock(key)
            .await?
            .and_then(|row| row.remaining_ttl_at(now)))
    }

    /// Returns true if any unexpired lock exists under the given prefix.
    pub async fn any_active_with_prefix(&self, prefix: &str) -> Result<bool> {
        self.store.any_active_with_prefix_at(prefix, Utc::now()).await
    }
}

/// Drop guard that releases a lock if the holder is cancelled.
///
/// The happy path releases explicitly and disarms the guard; the drop
/// release is best-effort (spawned, errors logged) and the TTL remains the
/// hard bound either way.
pub struct LockReleaser {
    locks: RefreshLocks,
    key: Option<String>,
}

impl LockReleaser {
    /// Arms a guard for `key`.
    #[must_use]
    pub fn new(locks: RefreshLocks, key: impl Into<String>) -> Self {
        Self {
            locks,
            key: Some(key.into()),
        }
    }

    /// Releases the lock now and disarms the guard.
    pub async fn release(mut self) -> Result<()> {
        if let Some(key) = self.key.take() {
            self.locks.release(&key).await?;
        }
        Ok(())
    }
}

impl Drop for LockReleaser {
    fn drop(&mut self) {
        let Some(key) = self.key.take() else {
            return;
        };
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!(lock_key = %key, "no runtime at lock guard drop; waiting out the TTL");
            return;
        };
        let locks = self.locks.clone();
        handle.spawn(async move {
            if let Err(error) = locks.release(&key).await {
                warn!(lock_key = %key, %error, "failed to release lock from drop guard");
            }
        });
    }
}

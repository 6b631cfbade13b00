//! Staleness-driven candidate scheduling.
//!
//! A sweep selects stale players (favorites ahead of the general pool),
//! takes the refresh lock per candidate, and enqueues a job for each lock
//! won. The lock is taken before the enqueue so a winning sweep owns the
//! player end to end; if the enqueue then dedups or fails, the lock is
//! handed back immediately instead of waiting out its TTL.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use rift_core::{PlayerId, PlayerIdentity};

use crate::config::IngestConfig;
use crate::error::Result;
use crate::lock::{self, RefreshLocks, FAILED_RETRY_PREFIX};
use crate::queue::{EnqueueOptions, EnqueueResult, JobQueue, RefreshJob};
use crate::store::Store;

/// Per-sweep knobs, defaulted from [`IngestConfig`].
#[derive(Debug, Clone)]
pub struct SweepOptions {
    /// Maximum candidates examined.
    pub max_candidates: usize,
    /// Maximum jobs enqueued.
    pub max_queued: usize,
    /// Staleness cutoff.
    pub stale_cutoff: Duration,
    /// Whether favorites go first.
    pub prioritize_favorites: bool,
}

impl SweepOptions {
    /// Builds sweep options from the engine configuration.
    #[must_use]
    pub fn from_config(config: &IngestConfig) -> Self {
        Self {
            max_candidates: config.max_candidates,
            max_queued: config.max_queued,
            stale_cutoff: config.stale_cutoff,
            prioritize_favorites: config.prioritize_favorites,
        }
    }
}

/// A player selected for refresh.
#[derive(Debug, Clone)]
pub struct Candidate {
    /// Surrogate id of the player row.
    pub player_id: PlayerId,
    /// The player's identity, from which the lock key derives.
    pub identity: PlayerIdentity,
    /// When the player was last refreshed.
    pub updated_at: DateTime<Utc>,
    /// Whether the player is favorited.
    pub favorite: bool,
}

/// What one sweep did.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    /// Candidates examined.
    pub examined: usize,
    /// Jobs enqueued.
    pub admitted: usize,
    /// Candidates skipped because their refresh lock was held.
    pub skipped_locked: usize,
    /// True if the whole sweep yielded to a failed-match retry pass.
    pub yielded_to_retry_pass: bool,
}

/// Selects and enqueues refresh candidates.
pub struct CandidateScheduler {
    store: Arc<dyn Store>,
    queue: Arc<dyn JobQueue>,
    locks: RefreshLocks,
    config: IngestConfig,
}

impl CandidateScheduler {
    /// Creates a scheduler over the given store and queue.
    #[must_use]
    pub fn new(store: Arc<dyn Store>, queue: Arc<dyn JobQueue>, config: IngestConfig) -> Self {
        let locks = RefreshLocks::new(store.clone());
        Self {
            store,
            queue,
            locks,
            config,
        }
    }

    /// Selects up to `max_candidates` players due for refresh at `now`.
    ///
    /// Favorites due for refresh come first, then the general stale pool;
    /// both cohorts are staleness-ordered and the merged list is
    /// deduplicated on normalized identity. The cap applies to that merged
    /// order, before the final sort, so every due favorite holds a slot in
    /// the examined set even when the general pool holds staler players.
    /// The final list is then sorted stalest first, so admission under
    /// `max_queued` always prefers the players most in need.
    pub async fn select_candidates_at(
        &self,
        now: DateTime<Utc>,
        options: &SweepOptions,
    ) -> Result<Vec<Candidate>> {
        let cutoff = now
            - chrono::Duration::from_std(options.stale_cutoff)
                .map_err(|e| crate::error::Error::storage(format!("stale cutoff out of range: {e}")))?;

        let mut ordered = Vec::new();
        if options.prioritize_favorites {
            let mut favorites: Vec<_> = self
                .store
                .favorite_players()
                .await?
                .into_iter()
                .filter(|p| p.updated_at < cutoff)
                .collect();
            favorites.sort_by_key(|p| p.updated_at);
            for player in favorites {
                ordered.push((player, true));
            }
        }
        for player in self.store.stale_players(cutoff).await? {
            let favorite = self.store.is_favorite(player.id).await?;
            ordered.push((player, favorite));
        }

        let mut seen = HashSet::new();
        let mut candidates: Vec<Candidate> = ordered
            .into_iter()
            .filter(|(player, _)| seen.insert(player.identity.normalized_key()))
            .map(|(player, favorite)| Candidate {
                player_id: player.id,
                identity: player.identity,
                updated_at: player.updated_at,
                favorite,
            })
            .collect();
        candidates.truncate(options.max_candidates);
        candidates.sort_by_key(|c| c.updated_at);
        Ok(candidates)
    }

    /// Runs one sweep evaluated at `now`.
    ///
    /// The sweep yields entirely while a failed-match retry pass holds any
    /// of its locks, so retries never compete with fresh refreshes for
    /// upstream budget.
    pub async fn run_sweep_at(&self, now: DateTime<Utc>, options: &SweepOptions) -> Result<SweepReport> {
        if self
            .store
            .any_active_with_prefix_at(FAILED_RETRY_PREFIX, now)
            .await?
        {
            info!("failed-match retry pass in progress; skipping candidate sweep");
            return Ok(SweepReport {
                yielded_to_retry_pass: true,
                ..SweepReport::default()
            });
        }

        let candidates = self.select_candidates_at(now, options).await?;
        let mut report = SweepReport {
            examined: candidates.len(),
            ..SweepReport::default()
        };

        for candidate in candidates {
            if report.admitted >= options.max_queued {
                break;
            }

            let lock_key = lock::refresh_key(&candidate.identity);
            if !self
                .store
                .try_acquire_at(&lock_key, self.config.refresh_lock_ttl, now)
                .await?
            {
                report.skipped_locked += 1;
                debug!(player = %candidate.identity, "refresh lock held; skipping");
                continue;
            }

            let job = RefreshJob {
                identity: candidate.identity.clone(),
                lock_key: lock_key.clone(),
                enqueued_at: now,
            };
            let enqueued = match self.queue.enqueue(job, EnqueueOptions::default()).await {
                Ok(result) => result,
                Err(error) => {
                    // Hand the lock back rather than letting it age out.
                    if let Err(release_error) = self.locks.release(&lock_key).await {
                        warn!(%lock_key, error = %release_error, "failed to release lock after enqueue error");
                    }
                    return Err(error);
                }
            };

            match enqueued {
                EnqueueResult::Enqueued { .. } => {
                    report.admitted += 1;
                    debug!(player = %candidate.identity, favorite = candidate.favorite, "refresh enqueued");
                }
                EnqueueResult::Deduplicated { .. } | EnqueueResult::QueueFull => {
                    self.locks.release(&lock_key).await?;
                    report.skipped_locked += 1;
                    if matches!(enqueued, EnqueueResult::QueueFull) {
                        warn!(queue = self.queue.queue_name(), "refresh queue full; stopping sweep");
                        break;
                    }
                }
            }
        }

        info!(
            examined = report.examined,
            admitted = report.admitted,
            skipped_locked = report.skipped_locked,
            "candidate sweep complete"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::PlayerProfile;
    use crate::queue::InMemoryJobQueue;
    use crate::store::{InMemoryStore, LockStore, PlayerStore};
    use rift_core::Region;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000 + secs, 0).expect("timestamp")
    }

    async fn seed_player(
        store: &InMemoryStore,
        name: &str,
        updated_at: DateTime<Utc>,
        favorite: bool,
    ) -> Result<PlayerId> {
        let profile = PlayerProfile {
            puuid: format!("puuid-{name}"),
            identity: PlayerIdentity::new(Region::Euw1, name, "EUW"),
            profile_icon_id: 1,
            summoner_level: 30,
        };
        let id = store.upsert_player(&profile, updated_at).await?;
        store.set_favorite(id, favorite).await?;
        Ok(id)
    }

    #[tokio::test]
    async fn stale_favorites_go_first() -> Result<()> {
        let store = Arc::new(InMemoryStore::new());
        // One fresh favorite, one stale favorite, one very stale regular.
        seed_player(&store, "FreshFav", at(10_000), true).await?;
        seed_player(&store, "StaleFav", at(5000), true).await?;
        seed_player(&store, "OldTimer", at(0), false).await?;

        let queue = Arc::new(InMemoryJobQueue::new());
        let config = IngestConfig::default().with_stale_cutoff(Duration::from_secs(3600));
        let scheduler = CandidateScheduler::new(store, queue, config.clone());

        let now = at(10_800);
        let options = SweepOptions::from_config(&config);
        let candidates = scheduler.select_candidates_at(now, &options).await?;

        let names: Vec<&str> = candidates.iter().map(|c| c.identity.game_name.as_str()).collect();
        // Both stale players selected, ordered stalest first; the fresh
        // favorite is not due.
        assert_eq!(names, vec!["OldTimer", "StaleFav"]);
        assert!(candidates.iter().any(|c| c.favorite));
        Ok(())
    }

    #[tokio::test]
    async fn admission_cap_keeps_stalest() -> Result<()> {
        let store = Arc::new(InMemoryStore::new());
        for i in 0..5 {
            seed_player(&store, &format!("P{i}"), at(i * 100), false).await?;
        }

        let queue = Arc::new(InMemoryJobQueue::new());
        let config = IngestConfig::default()
            .with_stale_cutoff(Duration::from_secs(60))
            .with_max_queued(2);
        let scheduler = CandidateScheduler::new(store, queue.clone(), config.clone());

        let report = scheduler
            .run_sweep_at(at(10_000), &SweepOptions::from_config(&config))
            .await?;
        assert_eq!(report.admitted, 2);
        assert_eq!(queue.queue_depth().await?, 2);

        // The two stalest players won the slots.
        let first = queue.pop_ready_at(at(10_000))?.expect("job");
        let second = queue.pop_ready_at(at(10_000))?.expect("job");
        assert_eq!(first.identity.game_name, "P0");
        assert_eq!(second.identity.game_name, "P1");
        Ok(())
    }

    #[tokio::test]
    async fn locked_candidates_are_skipped() -> Result<()> {
        let store = Arc::new(InMemoryStore::new());
        seed_player(&store, "Held", at(0), false).await?;
        seed_player(&store, "Free", at(10), false).await?;

        let identity = PlayerIdentity::new(Region::Euw1, "Held", "EUW");
        store
            .try_acquire_at(&lock::refresh_key(&identity), Duration::from_secs(600), at(9000))
            .await?;

        let queue = Arc::new(InMemoryJobQueue::new());
        let config = IngestConfig::default().with_stale_cutoff(Duration::from_secs(60));
        let scheduler = CandidateScheduler::new(store, queue.clone(), config.clone());

        let report = scheduler
            .run_sweep_at(at(9000), &SweepOptions::from_config(&config))
            .await?;
        assert_eq!(report.examined, 2);
        assert_eq!(report.admitted, 1);
        assert_eq!(report.skipped_locked, 1);

        let job = queue.pop_ready_at(at(9000))?.expect("job");
        assert_eq!(job.identity.game_name, "Free");
        Ok(())
    }

    #[tokio::test]
    async fn sweep_yields_to_failed_retry_pass() -> Result<()> {
        let store = Arc::new(InMemoryStore::new());
        seed_player(&store, "Anyone", at(0), false).await?;
        store
            .try_acquire_at(&lock::failed_retry_key("EUW1_1"), Duration::from_secs(600), at(9000))
            .await?;

        let queue = Arc::new(InMemoryJobQueue::new());
        let config = IngestConfig::default().with_stale_cutoff(Duration::from_secs(60));
        let scheduler = CandidateScheduler::new(store, queue.clone(), config.clone());

        let report = scheduler
            .run_sweep_at(at(9000), &SweepOptions::from_config(&config))
            .await?;
        assert!(report.yielded_to_retry_pass);
        assert_eq!(report.admitted, 0);
        assert_eq!(queue.queue_depth().await?, 0);
        Ok(())
    }

    #[tokio::test]
    async fn enqueue_failure_releases_the_lock() -> Result<()> {
        let store = Arc::new(InMemoryStore::new());
        seed_player(&store, "Unlucky", at(0), false).await?;

        let queue = Arc::new(InMemoryJobQueue::new());
        queue.fail_next_enqueue();
        let config = IngestConfig::default().with_stale_cutoff(Duration::from_secs(60));
        let scheduler = CandidateScheduler::new(store.clone(), queue, config.clone());

        let result = scheduler
            .run_sweep_at(at(9000), &SweepOptions::from_config(&config))
            .await;
        assert!(result.is_err());

        // The lock was handed back, so the next sweep can take it.
        let identity = PlayerIdentity::new(Region::Euw1, "Unlucky", "EUW");
        assert!(
            store
                .try_acquire_at(&lock::refresh_key(&identity), Duration::from_secs(60), at(9001))
                .await?
        );
        Ok(())
    }

    #[tokio::test]
    async fn deduplicated_enqueue_releases_the_lock() -> Result<()> {
        let store = Arc::new(InMemoryStore::new());
        seed_player(&store, "Queued", at(0), false).await?;

        let queue = Arc::new(InMemoryJobQueue::new());
        let identity = PlayerIdentity::new(Region::Euw1, "Queued", "EUW");
        let lock_key = lock::refresh_key(&identity);
        // A job for this player is already waiting from an earlier sweep.
        queue
            .enqueue(
                RefreshJob {
                    identity: identity.clone(),
                    lock_key: lock_key.clone(),
                    enqueued_at: at(0),
                },
                EnqueueOptions::default(),
            )
            .await?;

        let config = IngestConfig::default().with_stale_cutoff(Duration::from_secs(60));
        let scheduler = CandidateScheduler::new(store.clone(), queue.clone(), config.clone());
        let report = scheduler
            .run_sweep_at(at(9000), &SweepOptions::from_config(&config))
            .await?;

        assert_eq!(report.admitted, 0);
        assert_eq!(queue.queue_depth().await?, 1);
        assert!(
            store
                .try_acquire_at(&lock_key, Duration::from_secs(60), at(9001))
                .await?
        );
        Ok(())
    }
}

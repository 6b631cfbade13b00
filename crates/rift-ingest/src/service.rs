//! The ingestion service facade.
//!
//! Wires the store, upstream client, and queue into the engine's entry
//! points: on-demand refreshes, the scheduled sweeps, and the repair
//! passes. Embedders construct one [`IngestService`] and drive it from
//! their own schedule.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::info;

use rift_core::PlayerIdentity;
use rift_riot::RiotApi;

use crate::config::IngestConfig;
use crate::error::{Error, Result};
use crate::lock::{self, RefreshLocks};
use crate::metrics::IngestMetrics;
use crate::orchestrator::{FailedSweepReport, RefreshOrchestrator, RefreshOutcome};
use crate::player::Player;
use crate::queue::{EnqueueOptions, EnqueueResult, JobQueue, RefreshJob};
use crate::repair::{DuplicateRepair, MergeReport};
use crate::runes::{RuneReconstructor, RuneRepairReport};
use crate::scheduler::{CandidateScheduler, SweepOptions, SweepReport};
use crate::store::Store;
use crate::timeline::{TimelineDeriver, TimelineSweepReport};

/// Outcome of an asynchronous refresh request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnqueueRefreshOutcome {
    /// A refresh job was queued (or an equivalent one was already waiting).
    Queued,
    /// A refresh for this player is already running.
    AlreadyRunning {
        /// Remaining TTL on the running refresh's lock, when known.
        retry_after: Option<Duration>,
    },
    /// The queue is at capacity; try again later.
    QueueFull,
}

/// Outcome of a synchronous refresh request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SingleRefreshOutcome {
    /// The refresh ran to completion.
    Completed(RefreshOutcome),
    /// A refresh for this player is already in flight.
    AlreadyInFlight {
        /// Remaining TTL on the in-flight refresh's lock, when known.
        retry_after: Option<Duration>,
    },
}

/// The ingestion engine's public surface.
pub struct IngestService {
    store: Arc<dyn Store>,
    queue: Arc<dyn JobQueue>,
    config: IngestConfig,
    locks: RefreshLocks,
    orchestrator: RefreshOrchestrator,
    scheduler: CandidateScheduler,
    deriver: TimelineDeriver,
    reconstructor: RuneReconstructor,
    repair: DuplicateRepair,
    metrics: IngestMetrics,
}

impl IngestService {
    /// Wires up the engine over the given upstream, store, and queue.
    #[must_use]
    pub fn new(
        api: Arc<dyn RiotApi>,
        store: Arc<dyn Store>,
        queue: Arc<dyn JobQueue>,
        config: IngestConfig,
    ) -> Self {
        Self {
            locks: RefreshLocks::new(store.clone()),
            orchestrator: RefreshOrchestrator::new(api.clone(), store.clone(), config.clone()),
            scheduler: CandidateScheduler::new(store.clone(), queue.clone(), config.clone()),
            deriver: TimelineDeriver::new(api.clone(), store.clone(), config.clone()),
            reconstructor: RuneReconstructor::new(store.clone()),
            repair: DuplicateRepair::new(store.clone()),
            metrics: IngestMetrics::new(),
            store,
            queue,
            config,
        }
    }

    /// Looks up a stored player by identity. Never calls upstream.
    pub async fn get_player(&self, identity: &PlayerIdentity) -> Result<Option<Player>> {
        self.store.get_player_by_identity(identity).await
    }

    /// Requests an asynchronous refresh for a player.
    ///
    /// Takes the refresh lock before enqueueing, so a queued request owns
    /// the player until a worker picks it up; concurrent requests for the
    /// same player collapse into one.
    pub async fn enqueue_refresh(&self, identity: &PlayerIdentity) -> Result<EnqueueRefreshOutcome> {
        let lock_key = lock::refresh_key(identity);
        if !self
            .locks
            .try_acquire(&lock_key, self.config.refresh_lock_ttl)
            .await?
        {
            self.metrics.record_lock("contended");
            return Ok(EnqueueRefreshOutcome::AlreadyRunning {
                retry_after: self.locks.remaining_ttl(&lock_key).await?,
            });
        }
        self.metrics.record_lock("acquired");

        let job = RefreshJob {
            identity: identity.clone(),
            lock_key: lock_key.clone(),
            enqueued_at: Utc::now(),
        };
        let result = match self.queue.enqueue(job, EnqueueOptions::default()).await {
            Ok(result) => result,
            Err(error) => {
                self.locks.release(&lock_key).await?;
                return Err(error);
            }
        };

        match result {
            EnqueueResult::Enqueued { .. } => Ok(EnqueueRefreshOutcome::Queued),
            EnqueueResult::Deduplicated { .. } => {
                // An equivalent job already holds the player; hand back the
                // extra lock we just took over it.
                self.locks.release(&lock_key).await?;
                Ok(EnqueueRefreshOutcome::Queued)
            }
            EnqueueResult::QueueFull => {
                self.locks.release(&lock_key).await?;
                Ok(EnqueueRefreshOutcome::QueueFull)
            }
        }
    }

    /// Runs one refresh synchronously.
    ///
    /// Used by request handlers that want the result inline. The lock is
    /// acquired here and released by the orchestrator on every exit path.
    pub async fn run_single_refresh(
        &self,
        identity: &PlayerIdentity,
    ) -> Result<SingleRefreshOutcome> {
        let lock_key = lock::refresh_key(identity);
        if !self
            .locks
            .try_acquire(&lock_key, self.config.refresh_lock_ttl)
            .await?
        {
            self.metrics.record_lock("contended");
            return Ok(SingleRefreshOutcome::AlreadyInFlight {
                retry_after: self.locks.remaining_ttl(&lock_key).await?,
            });
        }
        self.metrics.record_lock("acquired");

        let _timer = crate::metrics::time_refresh();
        match self.orchestrator.refresh(identity, &lock_key).await {
            Ok(outcome) => {
                self.metrics.record_refresh("success");
                Ok(SingleRefreshOutcome::Completed(outcome))
            }
            Err(error) => {
                let result = match &error {
                    Error::PlayerNotFound { .. } => "not_found",
                    _ => "failure",
                };
                self.metrics.record_refresh(result);
                Err(error)
            }
        }
    }

    /// Processes one dequeued refresh job.
    ///
    /// The job carries the lock its enqueuer acquired; the orchestrator
    /// releases it regardless of outcome.
    pub async fn process_job(&self, job: &RefreshJob) -> Result<RefreshOutcome> {
        let _timer = crate::metrics::time_refresh();
        let outcome = self.orchestrator.refresh(&job.identity, &job.lock_key).await;
        match &outcome {
            Ok(_) => self.metrics.record_refresh("success"),
            Err(Error::PlayerNotFound { .. }) => self.metrics.record_refresh("not_found"),
            Err(_) => self.metrics.record_refresh("failure"),
        }
        outcome
    }

    /// Runs one candidate sweep: select stale players, lock, enqueue.
    pub async fn run_candidate_sweep(&self) -> Result<SweepReport> {
        let options = SweepOptions::from_config(&self.config);
        let report = self.scheduler.run_sweep_at(Utc::now(), &options).await?;
        self.metrics.record_sweep(
            "candidate",
            if report.yielded_to_retry_pass {
                "yielded"
            } else {
                "complete"
            },
        );
        self.metrics
            .set_queue_depth(self.queue.queue_name(), self.queue.queue_depth().await?);
        Ok(report)
    }

    /// Retries temporarily-failed matches whose backoff has elapsed.
    pub async fn run_failed_match_sweep(&self, limit: usize) -> Result<FailedSweepReport> {
        let report = self
            .orchestrator
            .run_failed_match_sweep_at(Utc::now(), limit)
            .await?;
        self.metrics.record_sweep("failed-match-retry", "complete");
        Ok(report)
    }

    /// Derives missing timeline snapshots for ingested matches.
    pub async fn run_timeline_backfill_sweep(&self, limit: usize) -> Result<TimelineSweepReport> {
        let report = self.deriver.run_backfill_sweep_at(Utc::now(), limit).await?;
        self.metrics.record_sweep("timeline-backfill", "complete");
        for _ in 0..report.derived {
            self.metrics.record_timeline("success");
        }
        for _ in 0..report.failed {
            self.metrics.record_timeline("failure");
        }
        Ok(report)
    }

    /// Classifies unclassified rune pages on stored participants.
    pub async fn run_rune_reconstruction_sweep(&self, limit: usize) -> Result<RuneRepairReport> {
        let report = self.reconstructor.run_sweep(limit).await?;
        self.metrics.record_sweep("runes", "complete");
        Ok(report)
    }

    /// Merges duplicate player rows left by historical writes.
    pub async fn run_duplicate_repair(&self) -> Result<MergeReport> {
        let report = self.repair.merge_duplicates().await?;
        if report.groups_merged > 0 {
            info!(groups = report.groups_merged, "merged duplicate players");
        }
        Ok(report)
    }
}

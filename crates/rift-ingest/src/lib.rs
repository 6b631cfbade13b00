//! # rift-ingest
//!
//! Match ingestion and consistency engine:
//!
//! - **Refresh coordination**: advisory TTL locks collapse concurrent
//!   refreshes of the same player into one
//! - **Fetch state machines**: per-match and per-timeline retry tracking
//!   with exponential backoff and explicit terminal states
//! - **Upsert/dedup layer**: PUUID-keyed player upserts, change-only rank
//!   reconciliation, and typed duplicate-key handling on match inserts
//! - **Scheduling**: staleness-driven candidate sweeps with favorites
//!   prioritized, feeding a deduplicating job queue
//! - **Derived data**: timeline minute-mark snapshots and rune tree
//!   membership reconstruction
//! - **Repair**: merging of historical duplicate player rows with
//!   referential integrity preserved
//!
//! [`IngestService`] is the facade embedders construct; everything else is
//! exposed for composition and testing.

#![deny(missing_docs)]
#![deny(rust_2018_idioms)]

pub mod config;
pub mod error;
pub mod fetch;
pub mod lock;
pub mod match_record;
pub mod metrics;
pub mod orchestrator;
pub mod player;
pub mod queue;
pub mod repair;
pub mod runes;
pub mod scheduler;
pub mod service;
pub mod store;
pub mod timeline;
pub mod upsert;

pub use config::IngestConfig;
pub use error::{Error, Result};
pub use fetch::{BackoffPolicy, FetchStatus, FetchTracker, TimelineFetchState, TimelineStatus};
pub use match_record::{
    MatchAggregate, MatchRecord, Participant, RuneSelection, RuneTree, TeamSide,
};
pub use orchestrator::{FailedSweepReport, RefreshOrchestrator, RefreshOutcome};
pub use player::{Player, PlayerProfile, RankEntry, RankSnapshot};
pub use queue::{EnqueueResult, InMemoryJobQueue, JobQueue, RefreshJob};
pub use repair::{DuplicateRepair, MergeReport};
pub use runes::{reconstruct_tree_membership, RuneReconstructor, RuneRepairReport};
pub use scheduler::{CandidateScheduler, SweepOptions, SweepReport};
pub use service::{EnqueueRefreshOutcome, IngestService, SingleRefreshOutcome};
pub use store::{InMemoryStore, LockStore, MatchStore, PlayerStore, Store, TimelineStore};
pub use timeline::{FrameQuality, TimelineDeriver, TimelineSnapshot, TimelineSweepReport};

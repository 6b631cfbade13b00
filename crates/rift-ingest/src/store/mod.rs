//! Storage traits for the ingestion engine.
//!
//! Four narrow traits, one per concern:
//!
//! - [`PlayerStore`]: player rows, identity indexes, ranks and rank history
//! - [`MatchStore`]: match rows and participant rows
//! - [`LockStore`]: advisory TTL locks
//! - [`TimelineStore`]: timeline fetch state and derived snapshots
//!
//! Uniqueness races surface as typed
//! [`UniqueConstraintViolation`](rift_core::Error::UniqueConstraintViolation)
//! errors at this boundary; callers never parse backend error strings.

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use rift_core::{MatchRecordId, PlayerId, PlayerIdentity};

use crate::error::Result;
use crate::fetch::FetchStatus;
use crate::match_record::{MatchAggregate, MatchRecord, Participant, RuneSelection};
use crate::player::{Player, PlayerProfile, RankEntry, RankSnapshot};
use crate::timeline::TimelineSnapshot;

pub mod memory;

pub use memory::InMemoryStore;

/// A stored advisory lock row.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockRow {
    /// The lock key.
    pub key: String,
    /// When the lock was acquired.
    pub created_at: DateTime<Utc>,
    /// When the lock expires.
    pub locked_until: DateTime<Utc>,
}

impl LockRow {
    /// Returns true if the lock has expired at `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.locked_until
    }

    /// Returns the remaining TTL at `now`, if any.
    #[must_use]
    pub fn remaining_ttl_at(&self, now: DateTime<Utc>) -> Option<Duration> {
        (self.locked_until - now).to_std().ok()
    }
}

/// Advisory TTL lock storage.
///
/// Acquisition is compare-and-set: exactly one caller wins a key until it is
/// released or the TTL lapses.
#[async_trait]
pub trait LockStore: Send + Sync {
    /// Attempts to acquire `key` for `ttl`, evaluated at `now`.
    ///
    /// Returns true on acquisition. An expired lock counts as absent and is
    /// taken over atomically.
    async fn try_acquire_at(&self, key: &str, ttl: Duration, now: DateTime<Utc>) -> Result<bool>;

    /// Releases `key`. Releasing an absent lock is a no-op.
    async fn release(&self, key: &str) -> Result<()>;

    /// Returns the stored lock row for `key`, expired or not.
    async fn get_lock(&self, key: &str) -> Result<Option<LockRow>>;

    /// Returns true if any unexpired lock exists with the given key prefix.
    async fn any_active_with_prefix_at(&self, prefix: &str, now: DateTime<Utc>) -> Result<bool>;
}

/// Player, rank, and rank-history storage.
#[async_trait]
pub trait PlayerStore: Send + Sync {
    /// Fetches a player by surrogate id.
    async fn get_player(&self, id: PlayerId) -> Result<Option<Player>>;

    /// Fetches a player by PUUID.
    async fn get_player_by_puuid(&self, puuid: &str) -> Result<Option<Player>>;

    /// Fetches a player by normalized Riot ID identity.
    async fn get_player_by_identity(&self, identity: &PlayerIdentity) -> Result<Option<Player>>;

    /// Fetches players for a set of PUUIDs. Missing PUUIDs are skipped.
    async fn get_players_by_puuids(&self, puuids: &[String]) -> Result<Vec<Player>>;

    /// Inserts or updates a player, keyed on PUUID, atomically.
    ///
    /// Returns the surrogate id of the written row. If the fresh identity's
    /// normalized key was held by a different player, the key is repointed to
    /// this row (the newest upstream claim wins).
    async fn upsert_player(&self, profile: &PlayerProfile, now: DateTime<Utc>)
        -> Result<PlayerId>;

    /// Lists all players.
    async fn list_players(&self) -> Result<Vec<Player>>;

    /// Deletes a player row. Referencing rows are the caller's problem.
    async fn delete_player(&self, id: PlayerId) -> Result<()>;

    /// Lists players not refreshed since `cutoff`, oldest first.
    async fn stale_players(&self, cutoff: DateTime<Utc>) -> Result<Vec<Player>>;

    /// Lists favorited players.
    async fn favorite_players(&self) -> Result<Vec<Player>>;

    /// Marks or unmarks a player as favorited.
    async fn set_favorite(&self, id: PlayerId, favorite: bool) -> Result<()>;

    /// Returns whether a player is favorited.
    async fn is_favorite(&self, id: PlayerId) -> Result<bool>;

    /// Lists a player's current ranked standings.
    async fn ranks_for_player(&self, id: PlayerId) -> Result<Vec<RankEntry>>;

    /// Inserts or replaces the standing for `(player, queue_type)`.
    async fn save_rank(&self, entry: &RankEntry) -> Result<()>;

    /// Deletes the standing for `(player, queue_type)`, if present.
    async fn delete_rank(&self, id: PlayerId, queue_type: &str) -> Result<()>;

    /// Appends a rank history snapshot unless an identical standing for the
    /// same `(player, queue_type)` was already the latest appended.
    ///
    /// Returns true if a snapshot was appended.
    async fn append_rank_snapshot_if_absent(&self, snapshot: &RankSnapshot) -> Result<bool>;

    /// Lists a player's rank history snapshots, oldest first.
    async fn rank_snapshots_for_player(&self, id: PlayerId) -> Result<Vec<RankSnapshot>>;

    /// Repoints rank history rows from one player to another. Returns the
    /// number of rows moved.
    async fn repoint_rank_snapshots(&self, from: PlayerId, to: PlayerId) -> Result<u64>;
}

/// Match and participant storage.
#[async_trait]
pub trait MatchStore: Send + Sync {
    /// Returns true if a match with this external id is stored.
    async fn match_exists(&self, match_id: &str) -> Result<bool>;

    /// Fetches a match row by surrogate id.
    async fn get_match(&self, id: MatchRecordId) -> Result<Option<MatchRecord>>;

    /// Fetches a match row by external match id.
    async fn get_match_by_external_id(&self, match_id: &str) -> Result<Option<MatchRecord>>;

    /// Inserts one match aggregate.
    ///
    /// The record and its participants commit together or not at all. A
    /// duplicate external match id fails with the typed
    /// `matches.match_id` unique violation.
    async fn insert_match(&self, aggregate: &MatchAggregate) -> Result<()>;

    /// Inserts a batch of aggregates, all or nothing.
    ///
    /// On any failure the store is left as if the call never happened;
    /// callers fall back to per-aggregate inserts to isolate the conflict.
    async fn insert_match_batch(&self, aggregates: &[MatchAggregate]) -> Result<()>;

    /// Updates an existing record and replaces its participant rows.
    ///
    /// Used when a previously-failed fetch finally succeeds.
    async fn complete_match(&self, aggregate: &MatchAggregate) -> Result<()>;

    /// Updates an existing match row in place.
    async fn update_match_record(&self, record: &MatchRecord) -> Result<()>;

    /// Lists the participant rows of a match.
    async fn participants_for_match(&self, id: MatchRecordId) -> Result<Vec<Participant>>;

    /// Replaces the rune rows of one participant.
    async fn update_participant_runes(
        &self,
        id: MatchRecordId,
        slot: u8,
        runes: &[RuneSelection],
    ) -> Result<()>;

    /// Lists match rows in the given fetch status.
    async fn matches_with_status(&self, status: FetchStatus) -> Result<Vec<MatchRecord>>;

    /// Repoints participant rows from one player to another. Returns the
    /// number of rows moved.
    async fn repoint_participants(&self, from: PlayerId, to: PlayerId) -> Result<u64>;

    /// Returns which of the given external match ids are already stored.
    async fn match_ids_known(&self, match_ids: &[String]) -> Result<HashSet<String>>;
}

/// Timeline state and derived-snapshot storage.
#[async_trait]
pub trait TimelineStore: Send + Sync {
    /// Fetches the timeline fetch state for a match.
    async fn get_timeline_state(
        &self,
        id: MatchRecordId,
    ) -> Result<Option<crate::fetch::TimelineFetchState>>;

    /// Inserts or replaces a timeline fetch state.
    async fn save_timeline_state(&self, state: &crate::fetch::TimelineFetchState) -> Result<()>;

    /// Replaces the snapshots for `(match, minute)` with the given rows.
    ///
    /// Delete-then-insert within one call, so re-derivation never duplicates
    /// rows.
    async fn replace_snapshots(
        &self,
        id: MatchRecordId,
        minute: u32,
        rows: &[TimelineSnapshot],
    ) -> Result<()>;

    /// Lists all snapshots for a match, ordered by minute then slot.
    async fn snapshots_for_match(&self, id: MatchRecordId) -> Result<Vec<TimelineSnapshot>>;
}

/// The full storage surface the engine runs against.
pub trait Store: PlayerStore + MatchStore + LockStore + TimelineStore {}

impl<T: PlayerStore + MatchStore + LockStore + TimelineStore> Store for T {}

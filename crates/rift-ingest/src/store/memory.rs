//! In-memory store implementation.
//!
//! Backs tests and single-process deployments. All maps live behind one
//! `RwLock`, so every multi-step operation (upsert, batch insert, lock
//! acquisition) is atomic with respect to other callers, matching the
//! transactional guarantees a SQL backend provides.

use std::collections::{HashMap, HashSet};
use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use rift_core::{MatchRecordId, PlayerId, PlayerIdentity};

use crate::error::{Error, Result};
use crate::fetch::{FetchStatus, TimelineFetchState};
use crate::match_record::{MatchAggregate, MatchRecord, Participant, RuneSelection};
use crate::player::{Player, PlayerProfile, RankEntry, RankSnapshot};
use crate::store::{LockRow, LockStore, MatchStore, PlayerStore, TimelineStore};
use crate::timeline::TimelineSnapshot;

fn poison_err<T>(_: PoisonError<T>) -> Error {
    Error::storage("store lock poisoned")
}

#[derive(Default)]
struct Inner {
    players: HashMap<PlayerId, Player>,
    puuid_index: HashMap<String, PlayerId>,
    identity_index: HashMap<String, PlayerId>,
    favorites: HashSet<PlayerId>,
    ranks: HashMap<PlayerId, HashMap<String, RankEntry>>,
    rank_history: Vec<RankSnapshot>,
    matches: HashMap<MatchRecordId, MatchRecord>,
    match_index: HashMap<String, MatchRecordId>,
    participants: HashMap<MatchRecordId, Vec<Participant>>,
    locks: HashMap<String, LockRow>,
    timeline_states: HashMap<MatchRecordId, TimelineFetchState>,
    snapshots: HashMap<(MatchRecordId, u32), Vec<TimelineSnapshot>>,
}

impl Inner {
    fn insert_aggregate_unchecked(&mut self, aggregate: &MatchAggregate) {
        self.match_index
            .insert(aggregate.record.match_id.clone(), aggregate.record.id);
        self.matches
            .insert(aggregate.record.id, aggregate.record.clone());
        self.participants
            .insert(aggregate.record.id, aggregate.participants.clone());
    }
}

/// In-memory implementation of the full storage surface.
#[derive(Default)]
pub struct InMemoryStore {
    inner: RwLock<Inner>,
}

impl InMemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a player row without touching the unique indexes.
    ///
    /// Exists so tests can seed the duplicate rows that predate identity
    /// uniqueness enforcement; the indexes keep pointing at their first
    /// claimant. Production writes go through `upsert_player`.
    pub fn insert_player_unchecked(&self, player: Player) -> Result<()> {
        let mut inner = self.inner.write().map_err(poison_err)?;
        inner
            .puuid_index
            .entry(player.puuid.clone())
            .or_insert(player.id);
        inner
            .identity_index
            .entry(player.identity.normalized_key())
            .or_insert(player.id);
        inner.players.insert(player.id, player);
        Ok(())
    }
}

#[async_trait]
impl LockStore for InMemoryStore {
    async fn try_acquire_at(&self, key: &str, ttl: Duration, now: DateTime<Utc>) -> Result<bool> {
        let mut inner = self.inner.write().map_err(poison_err)?;
        if let Some(existing) = inner.locks.get(key) {
            if !existing.is_expired_at(now) {
                return Ok(false);
            }
        }
        let locked_until = now
            + chrono::Duration::from_std(ttl)
                .map_err(|e| Error::storage(format!("lock TTL out of range: {e}")))?;
        inner.locks.insert(
            key.to_owned(),
            LockRow {
                key: key.to_owned(),
                created_at: now,
                locked_until,
            },
        );
        Ok(true)
    }

    async fn release(&self, key: &str) -> Result<()> {
        let mut inner = self.inner.write().map_err(poison_err)?;
        inner.locks.remove(key);
        Ok(())
    }

    async fn get_lock(&self, key: &str) -> Result<Option<LockRow>> {
        let inner = self.inner.read().map_err(poison_err)?;
        Ok(inner.locks.get(key).cloned())
    }

    async fn any_active_with_prefix_at(&self, prefix: &str, now: DateTime<Utc>) -> Result<bool> {
        let inner = self.inner.read().map_err(poison_err)?;
        Ok(inner
            .locks
            .values()
            .any(|row| row.key.starts_with(prefix) && !row.is_expired_at(now)))
    }
}

#[async_trait]
impl PlayerStore for InMemoryStore {
    async fn get_player(&self, id: PlayerId) -> Result<Option<Player>> {
        let inner = self.inner.read().map_err(poison_err)?;
        Ok(inner.players.get(&id).cloned())
    }

    async fn get_player_by_puuid(&self, puuid: &str) -> Result<Option<Player>> {
        let inner = self.inner.read().map_err(poison_err)?;
        Ok(inner
            .puuid_index
            .get(puuid)
            .and_then(|id| inner.players.get(id))
            .cloned())
    }

    async fn get_player_by_identity(&self, identity: &PlayerIdentity) -> Result<Option<Player>> {
        let inner = self.inner.read().map_err(poison_err)?;
        Ok(inner
            .identity_index
            .get(&identity.normalized_key())
            .and_then(|id| inner.players.get(id))
            .cloned())
    }

    async fn get_players_by_puuids(&self, puuids: &[String]) -> Result<Vec<Player>> {
        let inner = self.inner.read().map_err(poison_err)?;
        Ok(puuids
            .iter()
            .filter_map(|puuid| inner.puuid_index.get(puuid))
            .filter_map(|id| inner.players.get(id))
            .cloned()
            .collect())
    }

    async fn upsert_player(
        &self,
        profile: &PlayerProfile,
        now: DateTime<Utc>,
    ) -> Result<PlayerId> {
        let mut inner = self.inner.write().map_err(poison_err)?;
        let fresh_key = profile.identity.normalized_key();

        if let Some(&id) = inner.puuid_index.get(&profile.puuid) {
            let old_key = inner
                .players
                .get(&id)
                .map(|p| p.identity.normalized_key());
            if let Some(old_key) = old_key {
                if old_key != fresh_key && inner.identity_index.get(&old_key) == Some(&id) {
                    inner.identity_index.remove(&old_key);
                }
            }
            // The freshest upstream claim on a Riot ID wins the index slot.
            inner.identity_index.insert(fresh_key, id);

            let player = inner
                .players
                .get_mut(&id)
                .ok_or_else(|| Error::storage("puuid index points at missing player row"))?;
            player.identity = profile.identity.clone();
            player.profile_icon_id = profile.profile_icon_id;
            player.summoner_level = profile.summoner_level;
            player.updated_at = now;
            return Ok(id);
        }

        let id = PlayerId::generate();
        let player = Player {
            id,
            puuid: profile.puuid.clone(),
            identity: profile.identity.clone(),
            profile_icon_id: profile.profile_icon_id,
            summoner_level: profile.summoner_level,
            created_at: now,
            updated_at: now,
        };
        inner.puuid_index.insert(profile.puuid.clone(), id);
        inner.identity_index.insert(fresh_key, id);
        inner.players.insert(id, player);
        Ok(id)
    }

    async fn list_players(&self) -> Result<Vec<Player>> {
        let inner = self.inner.read().map_err(poison_err)?;
        let mut players: Vec<Player> = inner.players.values().cloned().collect();
        players.sort_by_key(|p| p.id);
        Ok(players)
    }

    async fn delete_player(&self, id: PlayerId) -> Result<()> {
        let mut inner = self.inner.write().map_err(poison_err)?;
        if let Some(player) = inner.players.remove(&id) {
            if inner.puuid_index.get(&player.puuid) == Some(&id) {
                inner.puuid_index.remove(&player.puuid);
            }
            let key = player.identity.normalized_key();
            if inner.identity_index.get(&key) == Some(&id) {
                inner.identity_index.remove(&key);
            }
            inner.favorites.remove(&id);
            inner.ranks.remove(&id);
        }
        Ok(())
    }

    async fn stale_players(&self, cutoff: DateTime<Utc>) -> Result<Vec<Player>> {
        let inner = self.inner.read().map_err(poison_err)?;
        let mut players: Vec<Player> = inner
            .players
            .values()
            .filter(|p| p.updated_at < cutoff)
            .cloned()
            .collect();
        players.sort_by_key(|p| p.updated_at);
        Ok(players)
    }

    async fn favorite_players(&self) -> Result<Vec<Player>> {
        let inner = self.inner.read().map_err(poison_err)?;
        let mut players: Vec<Player> = inner
            .favorites
            .iter()
            .filter_map(|id| inner.players.get(id))
            .cloned()
            .collect();
        players.sort_by_key(|p| p.id);
        Ok(players)
    }

    async fn set_favorite(&self, id: PlayerId, favorite: bool) -> Result<()> {
        let mut inner = self.inner.write().map_err(poison_err)?;
        if favorite {
            inner.favorites.insert(id);
        } else {
            inner.favorites.remove(&id);
        }
        Ok(())
    }

    async fn is_favorite(&self, id: PlayerId) -> Result<bool> {
        let inner = self.inner.read().map_err(poison_err)?;
        Ok(inner.favorites.contains(&id))
    }

    async fn ranks_for_player(&self, id: PlayerId) -> Result<Vec<RankEntry>> {
        let inner = self.inner.read().map_err(poison_err)?;
        let mut entries: Vec<RankEntry> = inner
            .ranks
            .get(&id)
            .map(|m| m.values().cloned().collect())
            .unwrap_or_default();
        entries.sort_by(|a, b| a.queue_type.cmp(&b.queue_type));
        Ok(entries)
    }

    async fn save_rank(&self, entry: &RankEntry) -> Result<()> {
        let mut inner = self.inner.write().map_err(poison_err)?;
        inner
            .ranks
            .entry(entry.player_id)
            .or_default()
            .insert(entry.queue_type.clone(), entry.clone());
        Ok(())
    }

    async fn delete_rank(&self, id: PlayerId, queue_type: &str) -> Result<()> {
        let mut inner = self.inner.write().map_err(poison_err)?;
        if let Some(entries) = inner.ranks.get_mut(&id) {
            entries.remove(queue_type);
        }
        Ok(())
    }

    async fn append_rank_snapshot_if_absent(&self, snapshot: &RankSnapshot) -> Result<bool> {
        let mut inner = self.inner.write().map_err(poison_err)?;
        let duplicate = inner
            .rank_history
            .iter()
            .rev()
            .find(|s| s.player_id == snapshot.player_id && s.queue_type == snapshot.queue_type)
            .is_some_and(|latest| {
                latest.tier == snapshot.tier
                    && latest.division == snapshot.division
                    && latest.league_points == snapshot.league_points
                    && latest.wins == snapshot.wins
                    && latest.losses == snapshot.losses
            });
        if duplicate {
            return Ok(false);
        }
        inner.rank_history.push(snapshot.clone());
        Ok(true)
    }

    async fn rank_snapshots_for_player(&self, id: PlayerId) -> Result<Vec<RankSnapshot>> {
        let inner = self.inner.read().map_err(poison_err)?;
        Ok(inner
            .rank_history
            .iter()
            .filter(|s| s.player_id == id)
            .cloned()
            .collect())
    }

    async fn repoint_rank_snapshots(&self, from: PlayerId, to: PlayerId) -> Result<u64> {
        let mut inner = self.inner.write().map_err(poison_err)?;
        let mut moved = 0;
        for snapshot in inner
            .rank_history
            .iter_mut()
            .filter(|s| s.player_id == from)
        {
            snapshot.player_id = to;
            moved += 1;
        }
        Ok(moved)
    }
}

#[async_trait]
impl MatchStore for InMemoryStore {
    async fn match_exists(&self, match_id: &str) -> Result<bool> {
        let inner = self.inner.read().map_err(poison_err)?;
        Ok(inner.match_index.contains_key(match_id))
    }

    async fn get_match(&self, id: MatchRecordId) -> Result<Option<MatchRecord>> {
        let inner = self.inner.read().map_err(poison_err)?;
        Ok(inner.matches.get(&id).cloned())
    }

    async fn get_match_by_external_id(&self, match_id: &str) -> Result<Option<MatchRecord>> {
        let inner = self.inner.read().map_err(poison_err)?;
        Ok(inner
            .match_index
            .get(match_id)
            .and_then(|id| inner.matches.get(id))
            .cloned())
    }

    async fn insert_match(&self, aggregate: &MatchAggregate) -> Result<()> {
        let mut inner = self.inner.write().map_err(poison_err)?;
        if inner.match_index.contains_key(&aggregate.record.match_id) {
            return Err(rift_core::Error::unique_violation("matches.match_id").into());
        }
        inner.insert_aggregate_unchecked(aggregate);
        Ok(())
    }

    async fn insert_match_batch(&self, aggregates: &[MatchAggregate]) -> Result<()> {
        let mut inner = self.inner.write().map_err(poison_err)?;
        let mut batch_ids = HashSet::new();
        for aggregate in aggregates {
            if inner.match_index.contains_key(&aggregate.record.match_id)
                || !batch_ids.insert(aggregate.record.match_id.as_str())
            {
                return Err(rift_core::Error::unique_violation("matches.match_id").into());
            }
        }
        for aggregate in aggregates {
            inner.insert_aggregate_unchecked(aggregate);
        }
        Ok(())
    }

    async fn complete_match(&self, aggregate: &MatchAggregate) -> Result<()> {
        let mut inner = self.inner.write().map_err(poison_err)?;
        if !inner.matches.contains_key(&aggregate.record.id) {
            return Err(
                rift_core::Error::resource_not_found("match", aggregate.record.id.to_string())
                    .into(),
            );
        }
        inner
            .matches
            .insert(aggregate.record.id, aggregate.record.clone());
        inner
            .participants
            .insert(aggregate.record.id, aggregate.participants.clone());
        Ok(())
    }

    async fn update_match_record(&self, record: &MatchRecord) -> Result<()> {
        let mut inner = self.inner.write().map_err(poison_err)?;
        if !inner.matches.contains_key(&record.id) {
            return Err(
                rift_core::Error::resource_not_found("match", record.id.to_string()).into(),
            );
        }
        inner.matches.insert(record.id, record.clone());
        Ok(())
    }

    async fn participants_for_match(&self, id: MatchRecordId) -> Result<Vec<Participant>> {
        let inner = self.inner.read().map_err(poison_err)?;
        Ok(inner.participants.get(&id).cloned().unwrap_or_default())
    }

    async fn update_participant_runes(
        &self,
        id: MatchRecordId,
        slot: u8,
        runes: &[RuneSelection],
    ) -> Result<()> {
        let mut inner = self.inner.write().map_err(poison_err)?;
        let rows = inner
            .participants
            .get_mut(&id)
            .ok_or_else(|| rift_core::Error::resource_not_found("match", id.to_string()))?;
        let participant = rows
            .iter_mut()
            .find(|p| p.slot == slot)
            .ok_or_else(|| {
                rift_core::Error::resource_not_found("participant", format!("{id}/{slot}"))
            })?;
        participant.runes = runes.to_vec();
        Ok(())
    }

    async fn matches_with_status(&self, status: FetchStatus) -> Result<Vec<MatchRecord>> {
        let inner = self.inner.read().map_err(poison_err)?;
        let mut records: Vec<MatchRecord> = inner
            .matches
            .values()
            .filter(|r| r.fetch.status == status)
            .cloned()
            .collect();
        records.sort_by_key(|r| r.id);
        Ok(records)
    }

    async fn repoint_participants(&self, from: PlayerId, to: PlayerId) -> Result<u64> {
        let mut inner = self.inner.write().map_err(poison_err)?;
        let mut moved = 0;
        for rows in inner.participants.values_mut() {
            for participant in rows.iter_mut().filter(|p| p.player_id == from) {
                participant.player_id = to;
                moved += 1;
            }
        }
        Ok(moved)
    }

    async fn match_ids_known(&self, match_ids: &[String]) -> Result<HashSet<String>> {
        let inner = self.inner.read().map_err(poison_err)?;
        Ok(match_ids
            .iter()
            .filter(|id| inner.match_index.contains_key(*id))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl TimelineStore for InMemoryStore {
    async fn get_timeline_state(&self, id: MatchRecordId) -> Result<Option<TimelineFetchState>> {
        let inner = self.inner.read().map_err(poison_err)?;
        Ok(inner.timeline_states.get(&id).cloned())
    }

    async fn save_timeline_state(&self, state: &TimelineFetchState) -> Result<()> {
        let mut inner = self.inner.write().map_err(poison_err)?;
        inner
            .timeline_states
            .insert(state.match_record_id, state.clone());
        Ok(())
    }

    async fn replace_snapshots(
        &self,
        id: MatchRecordId,
        minute: u32,
        rows: &[TimelineSnapshot],
    ) -> Result<()> {
        let mut inner = self.inner.write().map_err(poison_err)?;
        inner.snapshots.insert((id, minute), rows.to_vec());
        Ok(())
    }

    async fn snapshots_for_match(&self, id: MatchRecordId) -> Result<Vec<TimelineSnapshot>> {
        let inner = self.inner.read().map_err(poison_err)?;
        let mut rows: Vec<TimelineSnapshot> = inner
            .snapshots
            .iter()
            .filter(|((match_id, _), _)| *match_id == id)
            .flat_map(|(_, rows)| rows.iter().cloned())
            .collect();
        rows.sort_by_key(|s| (s.minute, s.slot));
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rift_core::Region;

    fn profile(puuid: &str, name: &str, tag: &str) -> PlayerProfile {
        PlayerProfile {
            puuid: puuid.into(),
            identity: PlayerIdentity::new(Region::Euw1, name, tag),
            profile_icon_id: 1,
            summoner_level: 100,
        }
    }

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000 + secs, 0).expect("timestamp")
    }

    #[tokio::test]
    async fn upsert_is_keyed_on_puuid() -> Result<()> {
        let store = InMemoryStore::new();

        let id = store.upsert_player(&profile("p-1", "Old Name", "EUW"), at(0)).await?;
        let same = store
            .upsert_player(&profile("p-1", "New Name", "EUW"), at(60))
            .await?;
        assert_eq!(id, same);

        let player = store.get_player(id).await?.expect("player");
        assert_eq!(player.identity.game_name, "New Name");
        assert_eq!(player.created_at, at(0));
        assert_eq!(player.updated_at, at(60));

        // The old name no longer resolves; the new one does.
        let old = PlayerIdentity::new(Region::Euw1, "Old Name", "EUW");
        assert!(store.get_player_by_identity(&old).await?.is_none());
        let new = PlayerIdentity::new(Region::Euw1, "new name", "euw");
        assert!(store.get_player_by_identity(&new).await?.is_some());

        Ok(())
    }

    #[tokio::test]
    async fn identity_index_follows_newest_claim() -> Result<()> {
        let store = InMemoryStore::new();

        let a = store.upsert_player(&profile("p-a", "Swapped", "EUW"), at(0)).await?;
        // A different account picks up the same Riot ID.
        let b = store
            .upsert_player(&profile("p-b", "Swapped", "EUW"), at(60))
            .await?;
        assert_ne!(a, b);

        let identity = PlayerIdentity::new(Region::Euw1, "Swapped", "EUW");
        let resolved = store.get_player_by_identity(&identity).await?.expect("player");
        assert_eq!(resolved.id, b);

        // The displaced row is still reachable by PUUID.
        assert!(store.get_player_by_puuid("p-a").await?.is_some());

        Ok(())
    }

    #[tokio::test]
    async fn duplicate_match_id_is_a_typed_violation() -> Result<()> {
        let store = InMemoryStore::new();
        let aggregate = MatchAggregate {
            record: MatchRecord::pending("EUW1_1"),
            participants: vec![],
        };
        store.insert_match(&aggregate).await?;

        let again = MatchAggregate {
            record: MatchRecord::pending("EUW1_1"),
            participants: vec![],
        };
        let err = store.insert_match(&again).await.expect_err("duplicate");
        assert!(err.is_unique_violation());

        Ok(())
    }

    #[tokio::test]
    async fn concurrent_inserts_yield_one_winner() -> Result<()> {
        let store = std::sync::Arc::new(InMemoryStore::new());
        let aggregate = || MatchAggregate {
            record: MatchRecord::pending("EUW1_race"),
            participants: vec![],
        };

        let first = aggregate();
        let second = aggregate();
        let (a, b) = tokio::join!(store.insert_match(&first), store.insert_match(&second));
        let winners = [a, b].into_iter().filter(Result::is_ok).count();
        assert_eq!(winners, 1);
        assert!(store.match_exists("EUW1_race").await?);

        Ok(())
    }

    #[tokio::test]
    async fn batch_insert_is_all_or_nothing() -> Result<()> {
        let store = InMemoryStore::new();
        store
            .insert_match(&MatchAggregate {
                record: MatchRecord::pending("EUW1_1"),
                participants: vec![],
            })
            .await?;

        let batch = vec![
            MatchAggregate {
                record: MatchRecord::pending("EUW1_2"),
                participants: vec![],
            },
            MatchAggregate {
                record: MatchRecord::pending("EUW1_1"),
                participants: vec![],
            },
        ];
        let err = store.insert_match_batch(&batch).await.expect_err("conflict");
        assert!(err.is_unique_violation());

        // The non-conflicting aggregate was not committed either.
        assert!(!store.match_exists("EUW1_2").await?);

        Ok(())
    }

    #[tokio::test]
    async fn lock_acquisition_is_exclusive_until_expiry() -> Result<()> {
        let store = InMemoryStore::new();
        let ttl = Duration::from_secs(5);

        assert!(store.try_acquire_at("refresh:EUW1:A:B", ttl, at(0)).await?);
        assert!(!store.try_acquire_at("refresh:EUW1:A:B", ttl, at(1)).await?);
        // TTL lapsed; the key is taken over.
        assert!(store.try_acquire_at("refresh:EUW1:A:B", ttl, at(6)).await?);

        Ok(())
    }

    #[tokio::test]
    async fn prefix_scan_sees_only_active_locks() -> Result<()> {
        let store = InMemoryStore::new();
        let ttl = Duration::from_secs(5);
        store.try_acquire_at("failed-retry:EUW1_1", ttl, at(0)).await?;

        assert!(store.any_active_with_prefix_at("failed-retry:", at(1)).await?);
        assert!(!store.any_active_with_prefix_at("failed-retry:", at(10)).await?);
        assert!(!store.any_active_with_prefix_at("refresh:", at(1)).await?);

        Ok(())
    }

    #[tokio::test]
    async fn rank_snapshot_dedup() -> Result<()> {
        let store = InMemoryStore::new();
        let player_id = PlayerId::generate();
        let snapshot = RankSnapshot {
            player_id,
            queue_type: "RANKED_SOLO_5x5".into(),
            tier: Some("GOLD".into()),
            division: Some("II".into()),
            league_points: 56,
            wins: 40,
            losses: 38,
            captured_at: at(0),
        };

        assert!(store.append_rank_snapshot_if_absent(&snapshot).await?);
        // Identical standing again, later: suppressed.
        let mut again = snapshot.clone();
        again.captured_at = at(3600);
        assert!(!store.append_rank_snapshot_if_absent(&again).await?);

        let mut changed = snapshot.clone();
        changed.league_points = 78;
        changed.captured_at = at(7200);
        assert!(store.append_rank_snapshot_if_absent(&changed).await?);

        assert_eq!(store.rank_snapshots_for_player(player_id).await?.len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn stale_players_sorted_oldest_first() -> Result<()> {
        let store = InMemoryStore::new();
        store.upsert_player(&profile("p-1", "A", "1"), at(300)).await?;
        store.upsert_player(&profile("p-2", "B", "2"), at(100)).await?;
        store.upsert_player(&profile("p-3", "C", "3"), at(900)).await?;

        let stale = store.stale_players(at(500)).await?;
        let puuids: Vec<&str> = stale.iter().map(|p| p.puuid.as_str()).collect();
        assert_eq!(puuids, vec!["p-2", "p-1"]);

        Ok(())
    }
}

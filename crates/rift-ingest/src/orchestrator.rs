//! The refresh orchestrator: one player refresh, end to end.
//!
//! A refresh resolves the player upstream, upserts the profile, reconciles
//! ranks, lists recent match ids, and ingests every id not already stored.
//! Failures are recorded per match, never partially: an aggregate that
//! fails any integrity check is persisted as a failure-tracked record with
//! zero participant rows.
//!
//! The caller hands in the refresh lock key it acquired; the orchestrator
//! guarantees release on every exit path, with a drop guard covering
//! cancellation and the TTL as the final bound.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use tracing::{debug, info, warn, Instrument};

use rift_core::{PlayerId, PlayerIdentity, Region, Routing};
use rift_riot::types::{MatchDto, MatchIdsQuery, ParticipantDto};
use rift_riot::{ApiError, RiotApi};

use crate::config::IngestConfig;
use crate::error::{Error, Result};
use crate::fetch::{BackoffPolicy, FetchStatus};
use crate::lock::{self, LockReleaser, RefreshLocks};
use crate::match_record::{
    BoxScore, ItemSlot, MatchAggregate, MatchRecord, Participant, RuneSelection, RuneTree,
    TeamSide, PARTICIPANT_SLOTS,
};
use crate::player::{PlayerProfile, RankEntry};
use crate::store::Store;
use crate::upsert;

/// What one refresh accomplished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshOutcome {
    /// The refreshed player's surrogate id.
    pub player_id: PlayerId,
    /// New match ids discovered in this refresh.
    pub discovered: usize,
    /// Matches fully ingested with participants.
    pub ingested: usize,
    /// Matches persisted in a failure state.
    pub failed: usize,
    /// Matches another writer ingested first.
    pub duplicates: usize,
}

/// What one failed-match retry pass accomplished.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FailedSweepReport {
    /// Matches examined as retry-eligible.
    pub examined: usize,
    /// Matches recovered to full ingestion.
    pub recovered: usize,
    /// Matches that failed again but remain retryable.
    pub still_failing: usize,
    /// Matches escalated to permanently unfetchable.
    pub escalated: usize,
    /// Matches aged past the retention window.
    pub expired: usize,
    /// Matches skipped because their retry lock was held.
    pub skipped_locked: usize,
}

enum MatchBuildOutcome {
    Built(MatchAggregate),
    Failed(MatchRecord),
}

#[derive(Default)]
struct PersistCounts {
    ingested: usize,
    failed: usize,
    duplicates: usize,
}

/// Drives player refreshes and failed-match retries.
pub struct RefreshOrchestrator {
    api: Arc<dyn RiotApi>,
    store: Arc<dyn Store>,
    locks: RefreshLocks,
    backoff: BackoffPolicy,
    config: IngestConfig,
}

impl RefreshOrchestrator {
    /// Creates an orchestrator over the given upstream and store.
    #[must_use]
    pub fn new(api: Arc<dyn RiotApi>, store: Arc<dyn Store>, config: IngestConfig) -> Self {
        let locks = RefreshLocks::new(store.clone());
        Self {
            api,
            store,
            locks,
            backoff: BackoffPolicy::default(),
            config,
        }
    }

    /// Refreshes one player, releasing `lock_key` on every exit path.
    pub async fn refresh(&self, identity: &PlayerIdentity, lock_key: &str) -> Result<RefreshOutcome> {
        let span = rift_core::observability::refresh_span(
            "refresh",
            identity.region.as_str(),
            &identity.normalized_key(),
        );
        let guard = LockReleaser::new(self.locks.clone(), lock_key);
        let result = self.refresh_inner(identity).instrument(span).await;
        guard.release().await?;
        result
    }

    async fn refresh_inner(&self, identity: &PlayerIdentity) -> Result<RefreshOutcome> {
        let now = Utc::now();
        let routing = identity.region.routing();

        let account = match self
            .api
            .account_by_riot_id(routing, &identity.game_name, &identity.tag_line)
            .await
        {
            Ok(account) => account,
            Err(ApiError::NotFound { .. }) => {
                return Err(Error::PlayerNotFound {
                    identity: identity.clone(),
                })
            }
            Err(other) => return Err(other.into()),
        };

        let summoner = self
            .api
            .summoner_by_puuid(identity.region, &account.puuid)
            .await?;

        // The upstream response is authoritative for display casing.
        let resolved_identity = PlayerIdentity::new(
            identity.region,
            account.game_name.as_deref().unwrap_or(&identity.game_name),
            account.tag_line.as_deref().unwrap_or(&identity.tag_line),
        );
        let profile = PlayerProfile {
            puuid: account.puuid.clone(),
            identity: resolved_identity,
            profile_icon_id: summoner.profile_icon_id,
            summoner_level: summoner.summoner_level,
        };
        let player_id = upsert::upsert_player(self.store.as_ref(), &profile, now).await?;

        // Rank data is best-effort; a ladder outage does not fail the refresh.
        match self
            .api
            .league_entries_by_puuid(identity.region, &account.puuid)
            .await
        {
            Ok(entries) => {
                let fresh: Vec<RankEntry> = entries
                    .iter()
                    .map(|dto| RankEntry {
                        player_id,
                        queue_type: dto.queue_type.clone(),
                        tier: dto.tier.clone(),
                        division: dto.rank.clone(),
                        league_points: dto.league_points,
                        wins: dto.wins,
                        losses: dto.losses,
                        updated_at: now,
                    })
                    .collect();
                upsert::reconcile_ranks(self.store.as_ref(), player_id, &fresh, now).await?;
            }
            Err(error) => {
                warn!(%player_id, %error, "league entries unavailable; keeping stored ranks");
            }
        }

        let listed = self
            .api
            .match_ids_by_puuid(
                routing,
                &account.puuid,
                &MatchIdsQuery {
                    queue: self.config.match_queue_filter,
                    count: self.config.match_history_count,
                },
            )
            .await?;

        let known = self.store.match_ids_known(&listed).await?;
        let mut seen = HashSet::new();
        let new_ids: Vec<String> = listed
            .into_iter()
            .filter(|id| !known.contains(id) && seen.insert(id.clone()))
            .collect();

        let mut outcome = RefreshOutcome {
            player_id,
            discovered: new_ids.len(),
            ingested: 0,
            failed: 0,
            duplicates: 0,
        };

        let mut aggregates = Vec::with_capacity(new_ids.len());
        for match_id in &new_ids {
            match self.build_match(routing, identity.region, match_id, now).await? {
                MatchBuildOutcome::Built(aggregate) => aggregates.push(aggregate),
                MatchBuildOutcome::Failed(record) => aggregates.push(MatchAggregate {
                    record,
                    participants: vec![],
                }),
            }
        }

        let persisted = self.persist_aggregates(&aggregates).await?;
        outcome.ingested = persisted.ingested;
        outcome.failed = persisted.failed;
        outcome.duplicates = persisted.duplicates;

        info!(
            %player_id,
            discovered = outcome.discovered,
            ingested = outcome.ingested,
            failed = outcome.failed,
            duplicates = outcome.duplicates,
            "refresh complete"
        );
        Ok(outcome)
    }

    /// Persists aggregates batch-first.
    ///
    /// A duplicate external id is success by another writer; any other
    /// per-aggregate failure is logged and counted without aborting the
    /// rest.
    async fn persist_aggregates(&self, aggregates: &[MatchAggregate]) -> Result<PersistCounts> {
        let mut counts = PersistCounts::default();
        if aggregates.is_empty() {
            return Ok(counts);
        }

        let classify = |counts: &mut PersistCounts, aggregate: &MatchAggregate| {
            if aggregate.record.fetch.status == FetchStatus::Success {
                counts.ingested += 1;
            } else {
                counts.failed += 1;
            }
        };

        if self.store.insert_match_batch(aggregates).await.is_ok() {
            for aggregate in aggregates {
                classify(&mut counts, aggregate);
            }
            return Ok(counts);
        }

        debug!(count = aggregates.len(), "batch insert conflicted; isolating per match");
        for aggregate in aggregates {
            match self.store.insert_match(aggregate).await {
                Ok(()) => classify(&mut counts, aggregate),
                Err(error) if error.is_unique_violation() => {
                    counts.duplicates += 1;
                    debug!(match_id = %aggregate.record.match_id, "already ingested by another writer");
                }
                Err(error) => {
                    counts.failed += 1;
                    warn!(match_id = %aggregate.record.match_id, %error, "failed to persist match");
                }
            }
        }
        Ok(counts)
    }

    /// Fetches and assembles one match.
    ///
    /// Never errors for per-match problems: fetch and integrity failures
    /// come back as a failure-tracked record so the caller persists them
    /// uniformly. Only store-level failures propagate.
    async fn build_match(
        &self,
        routing: Routing,
        region: Region,
        match_id: &str,
        now: DateTime<Utc>,
    ) -> Result<MatchBuildOutcome> {
        let mut record = MatchRecord::pending(match_id);

        let dto = match self.api.match_by_id(routing, match_id).await {
            Ok(dto) => dto,
            Err(ApiError::NotFound { resource }) => {
                record.fetch.mark_unfetchable_at(now, &format!("not found upstream: {resource}"));
                return Ok(MatchBuildOutcome::Failed(record));
            }
            Err(error) => {
                record
                    .fetch
                    .record_failure_at(now, &error.to_string(), self.config.max_fetch_attempts);
                return Ok(MatchBuildOutcome::Failed(record));
            }
        };

        self.fill_record(&mut record, &dto);

        if self.outside_retention(record.game_creation, now) {
            record.fetch.mark_outside_retention();
            debug!(%match_id, "match predates the retention window");
            return Ok(MatchBuildOutcome::Failed(record));
        }

        match self.resolve_participants(record.id, region, &dto, now).await? {
            Ok(participants) => {
                record.fetch.record_success_at(now);
                Ok(MatchBuildOutcome::Built(MatchAggregate {
                    record,
                    participants,
                }))
            }
            Err(message) => {
                record
                    .fetch
                    .record_failure_at(now, &message, self.config.max_fetch_attempts);
                warn!(%match_id, %message, "match failed integrity check");
                Ok(MatchBuildOutcome::Failed(record))
            }
        }
    }

    fn fill_record(&self, record: &mut MatchRecord, dto: &MatchDto) {
        record.game_creation = Utc.timestamp_millis_opt(dto.info.game_creation).single();
        record.game_duration_secs = dto.info.game_duration;
        record.game_version = dto.info.game_version.clone();
        record.queue_id = dto.info.queue_id;
        record.end_of_game_result = dto.info.end_of_game_result.clone();
    }

    fn outside_retention(&self, game_creation: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
        let Some(created) = game_creation else {
            return false;
        };
        let Ok(window) = chrono::Duration::from_std(self.config.retention_window) else {
            return false;
        };
        created < now - window
    }

    /// Resolves all ten participants to stored players.
    ///
    /// The inner `Err` is an integrity message: either the payload did not
    /// carry ten participants or some could not be resolved to a player
    /// row. In that case nothing about the match's participants is
    /// persisted.
    async fn resolve_participants(
        &self,
        match_record_id: rift_core::MatchRecordId,
        region: Region,
        dto: &MatchDto,
        now: DateTime<Utc>,
    ) -> Result<std::result::Result<Vec<Participant>, String>> {
        if dto.info.participants.len() != PARTICIPANT_SLOTS {
            return Ok(Err(format!(
                "expected {PARTICIPANT_SLOTS} participants, payload has {}",
                dto.info.participants.len()
            )));
        }

        let puuids: Vec<String> = dto
            .info
            .participants
            .iter()
            .map(|p| p.puuid.clone())
            .collect();
        let mut by_puuid: HashMap<String, PlayerId> = self
            .store
            .get_players_by_puuids(&puuids)
            .await?
            .into_iter()
            .map(|player| (player.puuid.clone(), player.id))
            .collect();

        for participant in &dto.info.participants {
            if by_puuid.contains_key(&participant.puuid) {
                continue;
            }
            match self.resolve_missing_player(region, participant, now).await? {
                Some(player_id) => {
                    by_puuid.insert(participant.puuid.clone(), player_id);
                }
                None => {
                    return Ok(Err(format!(
                        "unresolvable participant puuid {}",
                        participant.puuid
                    )));
                }
            }
        }

        let mut participants = Vec::with_capacity(PARTICIPANT_SLOTS);
        for p in &dto.info.participants {
            let Some(&player_id) = by_puuid.get(&p.puuid) else {
                return Ok(Err(format!("unresolvable participant puuid {}", p.puuid)));
            };
            participants.push(Self::participant_row(
                match_record_id,
                player_id,
                p,
                &dto.info.game_version,
            ));
        }
        Ok(Ok(participants))
    }

    /// Resolves a participant with no stored player row.
    ///
    /// Prefers a full upstream lookup; falls back to the identity embedded
    /// in the match payload when the lookup fails. Returns `None` only when
    /// neither source can produce a profile.
    async fn resolve_missing_player(
        &self,
        region: Region,
        participant: &ParticipantDto,
        now: DateTime<Utc>,
    ) -> Result<Option<PlayerId>> {
        if participant.puuid.trim().is_empty() {
            return Ok(None);
        }

        let routing = region.routing();
        let looked_up = match self.api.account_by_puuid(routing, &participant.puuid).await {
            Ok(account) => match self.api.summoner_by_puuid(region, &participant.puuid).await {
                Ok(summoner) => Some(PlayerProfile {
                    puuid: account.puuid,
                    identity: PlayerIdentity::new(
                        region,
                        account.game_name.unwrap_or_default(),
                        account.tag_line.unwrap_or_default(),
                    ),
                    profile_icon_id: summoner.profile_icon_id,
                    summoner_level: summoner.summoner_level,
                }),
                Err(error) => {
                    debug!(puuid = %participant.puuid, %error, "summoner lookup failed");
                    None
                }
            },
            Err(error) => {
                debug!(puuid = %participant.puuid, %error, "account lookup failed");
                None
            }
        };

        let profile = match looked_up {
            Some(profile) => profile,
            None => {
                // The match payload carries the Riot ID at game time.
                let (Some(name), Some(tag)) = (
                    participant.riot_id_game_name.as_deref(),
                    participant.riot_id_tagline.as_deref(),
                ) else {
                    return Ok(None);
                };
                if name.trim().is_empty() || tag.trim().is_empty() {
                    return Ok(None);
                }
                PlayerProfile {
                    puuid: participant.puuid.clone(),
                    identity: PlayerIdentity::new(region, name, tag),
                    profile_icon_id: 0,
                    summoner_level: 0,
                }
            }
        };

        let player_id = upsert::upsert_player(self.store.as_ref(), &profile, now).await?;
        Ok(Some(player_id))
    }

    fn participant_row(
        match_record_id: rift_core::MatchRecordId,
        player_id: PlayerId,
        dto: &ParticipantDto,
        game_version: &str,
    ) -> Participant {
        let mut runes = Vec::new();
        if let Some(perks) = &dto.perks {
            let mut ordinal: u8 = 0;
            for style in &perks.styles {
                for selection in &style.selections {
                    runes.push(RuneSelection {
                        tree: RuneTree::Unknown,
                        ordinal,
                        rune_id: selection.perk,
                        path_id: style.style,
                    });
                    ordinal += 1;
                }
            }
            if let Some(stats) = &perks.stat_perks {
                for rune_id in [stats.offense, stats.flex, stats.defense] {
                    runes.push(RuneSelection {
                        tree: RuneTree::Unknown,
                        ordinal,
                        rune_id,
                        path_id: 0,
                    });
                    ordinal += 1;
                }
            }
        }

        let items = dto
            .item_slots()
            .into_iter()
            .enumerate()
            .map(|(slot, item_id)| ItemSlot {
                slot: slot as u8,
                item_id,
                game_version: game_version.to_owned(),
            })
            .collect();

        Participant {
            match_record_id,
            player_id,
            slot: dto.participant_id,
            team: TeamSide::from_team_id(dto.team_id),
            role: dto.team_position.clone(),
            win: dto.win,
            champion_id: dto.champion_id,
            stats: BoxScore {
                kills: dto.kills,
                deaths: dto.deaths,
                assists: dto.assists,
                gold_earned: dto.gold_earned,
                creep_score: dto.total_minions_killed + dto.neutral_minions_killed,
                champ_level: dto.champ_level,
            },
            runes,
            items,
        }
    }

    /// Retries temporarily-failed matches whose backoff has elapsed at `now`.
    ///
    /// Each match is retried under its own retry lock so concurrent passes
    /// split the work. Matches that aged past the retention window while
    /// failing are expired instead of retried.
    pub async fn run_failed_match_sweep_at(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<FailedSweepReport> {
        let span = rift_core::observability::sweep_span("failed-match-retry");
        self.failed_match_sweep_inner(now, limit).instrument(span).await
    }

    async fn failed_match_sweep_inner(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<FailedSweepReport> {
        let failing = self.store.matches_with_status(FetchStatus::TemporaryFailure).await?;
        let mut report = FailedSweepReport::default();

        for mut record in failing {
            if report.examined >= limit {
                break;
            }

            if self.outside_retention(record.game_creation, now) {
                record.fetch.mark_outside_retention();
                self.store.update_match_record(&record).await?;
                report.expired += 1;
                continue;
            }
            if !record.fetch.is_retry_due_at(now, &self.backoff) {
                continue;
            }
            let Some(region) = record.region() else {
                warn!(match_id = %record.match_id, "cannot derive region; leaving for manual repair");
                continue;
            };

            let retry_key = lock::failed_retry_key(&record.match_id);
            if !self
                .store
                .try_acquire_at(&retry_key, self.config.refresh_lock_ttl, now)
                .await?
            {
                report.skipped_locked += 1;
                continue;
            }

            report.examined += 1;
            let result = self.retry_one(&mut record, region.routing(), region, now).await;
            self.locks.release(&retry_key).await?;

            match result? {
                RetryResult::Recovered => report.recovered += 1,
                RetryResult::StillFailing => report.still_failing += 1,
                RetryResult::Escalated => report.escalated += 1,
            }
        }

        info!(
            examined = report.examined,
            recovered = report.recovered,
            still_failing = report.still_failing,
            escalated = report.escalated,
            expired = report.expired,
            "failed-match retry pass complete"
        );
        Ok(report)
    }

    async fn retry_one(
        &self,
        record: &mut MatchRecord,
        routing: Routing,
        region: Region,
        now: DateTime<Utc>,
    ) -> Result<RetryResult> {
        let dto = match self.api.match_by_id(routing, &record.match_id).await {
            Ok(dto) => dto,
            Err(ApiError::NotFound { resource }) => {
                record.fetch.mark_unfetchable_at(now, &format!("not found upstream: {resource}"));
                self.store.update_match_record(record).await?;
                return Ok(RetryResult::Escalated);
            }
            Err(error) => {
                record
                    .fetch
                    .record_failure_at(now, &error.to_string(), self.config.max_fetch_attempts);
                self.store.update_match_record(record).await?;
                return Ok(if record.fetch.status == FetchStatus::PermanentlyUnfetchable {
                    RetryResult::Escalated
                } else {
                    RetryResult::StillFailing
                });
            }
        };

        self.fill_record(record, &dto);
        if self.outside_retention(record.game_creation, now) {
            record.fetch.mark_outside_retention();
            self.store.update_match_record(record).await?;
            return Ok(RetryResult::Escalated);
        }

        match self.resolve_participants(record.id, region, &dto, now).await? {
            Ok(participants) => {
                record.fetch.record_success_at(now);
                self.store
                    .complete_match(&MatchAggregate {
                        record: record.clone(),
                        participants,
                    })
                    .await?;
                Ok(RetryResult::Recovered)
            }
            Err(message) => {
                record
                    .fetch
                    .record_failure_at(now, &message, self.config.max_fetch_attempts);
                self.store.update_match_record(record).await?;
                Ok(if record.fetch.status == FetchStatus::PermanentlyUnfetchable {
                    RetryResult::Escalated
                } else {
                    RetryResult::StillFailing
                })
            }
        }
    }
}

enum RetryResult {
    Recovered,
    StillFailing,
    Escalated,
}

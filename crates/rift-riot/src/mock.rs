//! Scriptable in-memory test double for the upstream API.
//!
//! Tests seed the mock with accounts, matches, and timelines, and can inject
//! failures per match id. Every endpoint keeps a call counter so tests can
//! assert that a code path made (or, for the retention short-circuit, did not
//! make) upstream calls.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use rift_core::{Region, Routing};

use crate::client::RiotApi;
use crate::error::{ApiError, ApiResult};
use crate::types::{
    AccountDto, LeagueEntryDto, MatchDto, MatchIdsQuery, SummonerDto, TimelineDto,
};

/// A scripted upstream failure.
///
/// Materialized into an [`ApiError`] when the scripted call happens, so the
/// same scripted failure can fire more than once.
#[derive(Debug, Clone, Copy)]
pub enum MockFailure {
    /// Entity does not exist upstream.
    NotFound,
    /// Rate limited, with an optional Retry-After hint.
    RateLimited(Option<u64>),
    /// Transient 5xx failure.
    Transient(u16),
    /// Unparseable payload.
    Malformed,
}

impl MockFailure {
    fn to_error(self, resource: &str) -> ApiError {
        match self {
            Self::NotFound => ApiError::not_found(resource),
            Self::RateLimited(retry_after_secs) => ApiError::RateLimited { retry_after_secs },
            Self::Transient(status) => ApiError::Transient {
                status,
                message: "scripted transient failure".into(),
            },
            Self::Malformed => ApiError::Malformed {
                message: "scripted malformed payload".into(),
            },
        }
    }
}

#[derive(Default)]
struct MockState {
    accounts_by_riot_id: HashMap<String, AccountDto>,
    accounts_by_puuid: HashMap<String, AccountDto>,
    summoners: HashMap<String, SummonerDto>,
    league_entries: HashMap<String, Vec<LeagueEntryDto>>,
    match_ids: HashMap<String, Vec<String>>,
    matches: HashMap<String, MatchDto>,
    timelines: HashMap<String, TimelineDto>,
    match_failures: HashMap<String, VecDeque<MockFailure>>,
    match_failures_always: HashMap<String, MockFailure>,
    timeline_failures: HashMap<String, VecDeque<MockFailure>>,
}

/// Per-endpoint call counters.
#[derive(Debug, Default)]
pub struct CallCounts {
    /// `account_by_riot_id` calls.
    pub account_by_riot_id: AtomicU64,
    /// `account_by_puuid` calls.
    pub account_by_puuid: AtomicU64,
    /// `summoner_by_puuid` calls.
    pub summoner: AtomicU64,
    /// `league_entries_by_puuid` calls.
    pub league_entries: AtomicU64,
    /// `match_ids_by_puuid` calls.
    pub match_ids: AtomicU64,
    /// `match_by_id` calls.
    pub match_detail: AtomicU64,
    /// `timeline_by_id` calls.
    pub timeline: AtomicU64,
}

/// In-memory scriptable implementation of [`RiotApi`].
#[derive(Default)]
pub struct MockRiotApi {
    state: Mutex<MockState>,
    /// Call counters, readable while the mock is shared behind an `Arc`.
    pub calls: CallCounts,
}

impl MockRiotApi {
    /// Creates an empty mock.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn riot_id_key(game_name: &str, tag_line: &str) -> String {
        format!("{}#{}", game_name.to_lowercase(), tag_line.to_lowercase())
    }

    /// Scripts an account lookup for the given Riot ID and PUUID.
    pub fn set_account(&self, game_name: &str, tag_line: &str, puuid: &str) {
        let account = AccountDto {
            puuid: puuid.to_owned(),
            game_name: Some(game_name.to_owned()),
            tag_line: Some(tag_line.to_owned()),
        };
        let mut state = self.state.lock().expect("mock state");
        state
            .accounts_by_riot_id
            .insert(Self::riot_id_key(game_name, tag_line), account.clone());
        state.accounts_by_puuid.insert(puuid.to_owned(), account);
    }

    /// Scripts a summoner profile.
    pub fn set_summoner(&self, puuid: &str, summoner: SummonerDto) {
        let mut state = self.state.lock().expect("mock state");
        state.summoners.insert(puuid.to_owned(), summoner);
    }

    /// Scripts ranked-ladder entries for a player.
    pub fn set_league_entries(&self, puuid: &str, entries: Vec<LeagueEntryDto>) {
        let mut state = self.state.lock().expect("mock state");
        state.league_entries.insert(puuid.to_owned(), entries);
    }

    /// Scripts the recent-match-id listing for a player.
    pub fn set_match_ids(&self, puuid: &str, ids: Vec<String>) {
        let mut state = self.state.lock().expect("mock state");
        state.match_ids.insert(puuid.to_owned(), ids);
    }

    /// Scripts a match detail payload.
    pub fn insert_match(&self, dto: MatchDto) {
        let mut state = self.state.lock().expect("mock state");
        state.matches.insert(dto.metadata.match_id.clone(), dto);
    }

    /// Scripts a timeline payload.
    pub fn insert_timeline(&self, match_id: &str, dto: TimelineDto) {
        let mut state = self.state.lock().expect("mock state");
        state.timelines.insert(match_id.to_owned(), dto);
    }

    /// Queues a one-shot failure for the next `match_by_id` on this id.
    pub fn fail_next_match_detail(&self, match_id: &str, failure: MockFailure) {
        let mut state = self.state.lock().expect("mock state");
        state
            .match_failures
            .entry(match_id.to_owned())
            .or_default()
            .push_back(failure);
    }

    /// Makes every `match_by_id` on this id fail until cleared.
    pub fn fail_match_detail_always(&self, match_id: &str, failure: MockFailure) {
        let mut state = self.state.lock().expect("mock state");
        state
            .match_failures_always
            .insert(match_id.to_owned(), failure);
    }

    /// Clears a persistent match-detail failure.
    pub fn clear_match_detail_failure(&self, match_id: &str) {
        let mut state = self.state.lock().expect("mock state");
        state.match_failures_always.remove(match_id);
    }

    /// Queues a one-shot failure for the next `timeline_by_id` on this id.
    pub fn fail_next_timeline(&self, match_id: &str, failure: MockFailure) {
        let mut state = self.state.lock().expect("mock state");
        state
            .timeline_failures
            .entry(match_id.to_owned())
            .or_default()
            .push_back(failure);
    }
}

#[async_trait]
impl RiotApi for MockRiotApi {
    async fn account_by_riot_id(
        &self,
        _routing: Routing,
        game_name: &str,
        tag_line: &str,
    ) -> ApiResult<AccountDto> {
        self.calls.account_by_riot_id.fetch_add(1, Ordering::SeqCst);
        let state = self.state.lock().expect("mock state");
        state
            .accounts_by_riot_id
            .get(&Self::riot_id_key(game_name, tag_line))
            .cloned()
            .ok_or_else(|| ApiError::not_found(format!("account {game_name}#{tag_line}")))
    }

    async fn account_by_puuid(&self, _routing: Routing, puuid: &str) -> ApiResult<AccountDto> {
        self.calls.account_by_puuid.fetch_add(1, Ordering::SeqCst);
        let state = self.state.lock().expect("mock state");
        state
            .accounts_by_puuid
            .get(puuid)
            .cloned()
            .ok_or_else(|| ApiError::not_found(format!("account {puuid}")))
    }

    async fn summoner_by_puuid(&self, _region: Region, puuid: &str) -> ApiResult<SummonerDto> {
        self.calls.summoner.fetch_add(1, Ordering::SeqCst);
        let state = self.state.lock().expect("mock state");
        state
            .summoners
            .get(puuid)
            .cloned()
            .ok_or_else(|| ApiError::not_found(format!("summoner {puuid}")))
    }

    async fn league_entries_by_puuid(
        &self,
        _region: Region,
        puuid: &str,
    ) -> ApiResult<Vec<LeagueEntryDto>> {
        self.calls.league_entries.fetch_add(1, Ordering::SeqCst);
        let state = self.state.lock().expect("mock state");
        Ok(state.league_entries.get(puuid).cloned().unwrap_or_default())
    }

    async fn match_ids_by_puuid(
        &self,
        _routing: Routing,
        puuid: &str,
        query: &MatchIdsQuery,
    ) -> ApiResult<Vec<String>> {
        self.calls.match_ids.fetch_add(1, Ordering::SeqCst);
        let state = self.state.lock().expect("mock state");
        let mut ids = state.match_ids.get(puuid).cloned().unwrap_or_default();
        ids.truncate(query.count as usize);
        Ok(ids)
    }

    async fn match_by_id(&self, _routing: Routing, match_id: &str) -> ApiResult<MatchDto> {
        self.calls.match_detail.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock().expect("mock state");

        if let Some(failure) = state.match_failures_always.get(match_id).copied() {
            return Err(failure.to_error(&format!("match {match_id}")));
        }
        if let Some(queue) = state.match_failures.get_mut(match_id) {
            if let Some(failure) = queue.pop_front() {
                return Err(failure.to_error(&format!("match {match_id}")));
            }
        }

        state
            .matches
            .get(match_id)
            .cloned()
            .ok_or_else(|| ApiError::not_found(format!("match {match_id}")))
    }

    async fn timeline_by_id(&self, _routing: Routing, match_id: &str) -> ApiResult<TimelineDto> {
        self.calls.timeline.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock().expect("mock state");

        if let Some(queue) = state.timeline_failures.get_mut(match_id) {
            if let Some(failure) = queue.pop_front() {
                return Err(failure.to_error(&format!("timeline {match_id}")));
            }
        }

        state
            .timelines
            .get(match_id)
            .cloned()
            .ok_or_else(|| ApiError::not_found(format!("timeline {match_id}")))
    }
}

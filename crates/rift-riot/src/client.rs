//! The upstream API trait consumed by the ingestion engine.

use async_trait::async_trait;

use rift_core::{Region, Routing};

use crate::error::ApiResult;
use crate::types::{
    AccountDto, LeagueEntryDto, MatchDto, MatchIdsQuery, SummonerDto, TimelineDto,
};

/// Upstream match-data API surface.
///
/// All calls are fallible and rate-limited; the engine maps failures into its
/// fetch state machines rather than propagating them raw. Implementations:
/// HTTP ([`crate::http::HttpRiotApi`]) for production and a scriptable mock
/// ([`crate::mock::MockRiotApi`]) for tests.
#[async_trait]
pub trait RiotApi: Send + Sync {
    /// Resolves a Riot ID (name + tag) to an account.
    async fn account_by_riot_id(
        &self,
        routing: Routing,
        game_name: &str,
        tag_line: &str,
    ) -> ApiResult<AccountDto>;

    /// Looks up an account by PUUID.
    async fn account_by_puuid(&self, routing: Routing, puuid: &str) -> ApiResult<AccountDto>;

    /// Looks up a summoner profile by PUUID on a platform region.
    async fn summoner_by_puuid(&self, region: Region, puuid: &str) -> ApiResult<SummonerDto>;

    /// Lists ranked-ladder entries for a player.
    async fn league_entries_by_puuid(
        &self,
        region: Region,
        puuid: &str,
    ) -> ApiResult<Vec<LeagueEntryDto>>;

    /// Lists recent match ids for a player, newest first.
    async fn match_ids_by_puuid(
        &self,
        routing: Routing,
        puuid: &str,
        query: &MatchIdsQuery,
    ) -> ApiResult<Vec<String>>;

    /// Fetches full match detail by external match id.
    async fn match_by_id(&self, routing: Routing, match_id: &str) -> ApiResult<MatchDto>;

    /// Fetches the match timeline by external match id.
    async fn timeline_by_id(&self, routing: Routing, match_id: &str) -> ApiResult<TimelineDto>;
}

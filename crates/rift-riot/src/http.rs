//! HTTP implementation of the upstream API.
//!
//! Status codes are classified into [`ApiError`] once, here: 404 is
//! not-found, 429 is rate-limited (with the Retry-After hint when present),
//! 5xx is transient. The engine never branches on HTTP details.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;

use rift_core::{Region, Routing};

use crate::client::RiotApi;
use crate::error::{ApiError, ApiResult};
use crate::types::{
    AccountDto, LeagueEntryDto, MatchDto, MatchIdsQuery, SummonerDto, TimelineDto,
};

const API_KEY_HEADER: &str = "X-Riot-Token";
const DEFAULT_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(10);

/// HTTP client for the upstream match-data API.
pub struct HttpRiotApi {
    client: Client,
    api_key: String,
}

impl HttpRiotApi {
    /// Creates a new client with the given API key.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(api_key: impl Into<String>) -> ApiResult<Self> {
        let client = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| ApiError::transport("failed to build HTTP client", e))?;

        Ok(Self {
            client,
            api_key: api_key.into(),
        })
    }

    fn routing_base(routing: Routing) -> String {
        format!("https://{routing}.api.riotgames.com")
    }

    fn platform_base(region: Region) -> String {
        format!("https://{region}.api.riotgames.com")
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str, resource: &str) -> ApiResult<T> {
        let response = self
            .client
            .get(url)
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await
            .map_err(|e| ApiError::transport(format!("request to {resource} failed"), e))?;

        let status = response.status();
        match status {
            StatusCode::NOT_FOUND => Err(ApiError::not_found(resource)),
            StatusCode::TOO_MANY_REQUESTS => {
                let retry_after_secs = response
                    .headers()
                    .get(reqwest::header::RETRY_AFTER)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse().ok());
                Err(ApiError::RateLimited { retry_after_secs })
            }
            s if s.is_server_error() => {
                let message = response.text().await.unwrap_or_default();
                Err(ApiError::Transient {
                    status: s.as_u16(),
                    message,
                })
            }
            s if !s.is_success() => {
                let message = response.text().await.unwrap_or_default();
                Err(ApiError::Transient {
                    status: s.as_u16(),
                    message,
                })
            }
            _ => response.json().await.map_err(|e| ApiError::Malformed {
                message: format!("failed to decode {resource}: {e}"),
            }),
        }
    }
}

#[async_trait]
impl RiotApi for HttpRiotApi {
    async fn account_by_riot_id(
        &self,
        routing: Routing,
        game_name: &str,
        tag_line: &str,
    ) -> ApiResult<AccountDto> {
        let url = format!(
            "{}/riot/account/v1/accounts/by-riot-id/{game_name}/{tag_line}",
            Self::routing_base(routing)
        );
        self.get_json(&url, &format!("account {game_name}#{tag_line}"))
            .await
    }

    async fn account_by_puuid(&self, routing: Routing, puuid: &str) -> ApiResult<AccountDto> {
        let url = format!(
            "{}/riot/account/v1/accounts/by-puuid/{puuid}",
            Self::routing_base(routing)
        );
        self.get_json(&url, &format!("account {puuid}")).await
    }

    async fn summoner_by_puuid(&self, region: Region, puuid: &str) -> ApiResult<SummonerDto> {
        let url = format!(
            "{}/lol/summoner/v4/summoners/by-puuid/{puuid}",
            Self::platform_base(region)
        );
        self.get_json(&url, &format!("summoner {puuid}")).await
    }

    async fn league_entries_by_puuid(
        &self,
        region: Region,
        puuid: &str,
    ) -> ApiResult<Vec<LeagueEntryDto>> {
        let url = format!(
            "{}/lol/league/v4/entries/by-puuid/{puuid}",
            Self::platform_base(region)
        );
        self.get_json(&url, &format!("league entries {puuid}")).await
    }

    async fn match_ids_by_puuid(
        &self,
        routing: Routing,
        puuid: &str,
        query: &MatchIdsQuery,
    ) -> ApiResult<Vec<String>> {
        let mut url = format!(
            "{}/lol/match/v5/matches/by-puuid/{puuid}/ids?count={}",
            Self::routing_base(routing),
            query.count
        );
        if let Some(queue) = query.queue {
            url.push_str(&format!("&queue={queue}"));
        }
        self.get_json(&url, &format!("match ids for {puuid}")).await
    }

    async fn match_by_id(&self, routing: Routing, match_id: &str) -> ApiResult<MatchDto> {
        let url = format!(
            "{}/lol/match/v5/matches/{match_id}",
            Self::routing_base(routing)
        );
        self.get_json(&url, &format!("match {match_id}")).await
    }

    async fn timeline_by_id(&self, routing: Routing, match_id: &str) -> ApiResult<TimelineDto> {
        let url = format!(
            "{}/lol/match/v5/matches/{match_id}/timeline",
            Self::routing_base(routing)
        );
        self.get_json(&url, &format!("timeline {match_id}")).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_urls() {
        assert_eq!(
            HttpRiotApi::routing_base(Routing::Europe),
            "https://europe.api.riotgames.com"
        );
        assert_eq!(
            HttpRiotApi::platform_base(Region::Euw1),
            "https://euw1.api.riotgames.com"
        );
    }
}

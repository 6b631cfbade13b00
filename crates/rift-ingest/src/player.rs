//! Player rows, ranked-ladder entries, and rank history snapshots.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use rift_core::{PlayerId, PlayerIdentity};

/// A stored player row.
///
/// The PUUID is the authoritative external key; the Riot ID identity is
/// display data that can change between refreshes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    /// Internal surrogate id all foreign references point at.
    pub id: PlayerId,
    /// Upstream-assigned globally-unique identifier.
    pub puuid: String,
    /// Current Riot ID identity.
    pub identity: PlayerIdentity,
    /// Profile icon id from the latest refresh.
    pub profile_icon_id: i32,
    /// Account level from the latest refresh.
    pub summoner_level: i64,
    /// When this row was first created.
    pub created_at: DateTime<Utc>,
    /// When this row was last written by a refresh.
    pub updated_at: DateTime<Utc>,
}

/// Fresh profile data flowing into an upsert.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerProfile {
    /// Upstream-assigned globally-unique identifier.
    pub puuid: String,
    /// Riot ID identity as reported upstream.
    pub identity: PlayerIdentity,
    /// Profile icon id.
    pub profile_icon_id: i32,
    /// Account level.
    pub summoner_level: i64,
}

/// The current ranked standing of a player in one queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankEntry {
    /// Owning player.
    pub player_id: PlayerId,
    /// Queue identifier, e.g. `RANKED_SOLO_5x5`.
    pub queue_type: String,
    /// Tier, e.g. `GOLD`. Absent for unranked placements.
    pub tier: Option<String>,
    /// Division within the tier, e.g. `II`.
    pub division: Option<String>,
    /// League points within the division.
    pub league_points: i32,
    /// Ranked wins this season.
    pub wins: i32,
    /// Ranked losses this season.
    pub losses: i32,
    /// When this standing was last observed.
    pub updated_at: DateTime<Utc>,
}

impl RankEntry {
    /// Returns true if the other entry describes the same ranked standing.
    ///
    /// Compares the standing fields only; timestamps and ownership are not
    /// part of the comparison.
    #[must_use]
    pub fn same_standing(&self, other: &Self) -> bool {
        self.queue_type == other.queue_type
            && self.tier == other.tier
            && self.division == other.division
            && self.league_points == other.league_points
            && self.wins == other.wins
            && self.losses == other.losses
    }
}

/// A point-in-time capture of a superseded ranked standing.
///
/// Appended when a refresh observes a changed standing, so rank history can
/// be charted from the store alone.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankSnapshot {
    /// Owning player.
    pub player_id: PlayerId,
    /// Queue identifier.
    pub queue_type: String,
    /// Tier at capture time.
    pub tier: Option<String>,
    /// Division at capture time.
    pub division: Option<String>,
    /// League points at capture time.
    pub league_points: i32,
    /// Wins at capture time.
    pub wins: i32,
    /// Losses at capture time.
    pub losses: i32,
    /// When the snapshot was captured.
    pub captured_at: DateTime<Utc>,
}

impl RankSnapshot {
    /// Captures the given standing at `captured_at`.
    #[must_use]
    pub fn of(entry: &RankEntry, captured_at: DateTime<Utc>) -> Self {
        Self {
            player_id: entry.player_id,
            queue_type: entry.queue_type.clone(),
            tier: entry.tier.clone(),
            division: entry.division.clone(),
            league_points: entry.league_points,
            wins: entry.wins,
            losses: entry.losses,
            captured_at,
        }
    }

    /// Returns true if the snapshot captures the same standing as the entry.
    #[must_use]
    pub fn same_standing(&self, entry: &RankEntry) -> bool {
        self.queue_type == entry.queue_type
            && self.tier == entry.tier
            && self.division == entry.division
            && self.league_points == entry.league_points
            && self.wins == entry.wins
            && self.losses == entry.losses
    }
}

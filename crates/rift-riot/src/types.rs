//! Wire types for the upstream match-data API.
//!
//! Field names mirror the upstream JSON (camelCase). Only the fields the
//! ingestion engine consumes are modeled; unknown fields are ignored on
//! deserialization.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Account payload: the PUUID plus the player-facing Riot ID.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountDto {
    /// Upstream-assigned globally-unique player identifier.
    pub puuid: String,
    /// Display name portion of the Riot ID.
    #[serde(default)]
    pub game_name: Option<String>,
    /// Tag portion of the Riot ID.
    #[serde(default)]
    pub tag_line: Option<String>,
}

/// Summoner profile payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummonerDto {
    /// Upstream-assigned globally-unique player identifier.
    pub puuid: String,
    /// Profile icon identifier.
    #[serde(default)]
    pub profile_icon_id: i32,
    /// Account level.
    #[serde(default)]
    pub summoner_level: i64,
    /// Last modification timestamp (epoch millis).
    #[serde(default)]
    pub revision_date: i64,
}

/// A ranked-ladder entry for one queue type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeagueEntryDto {
    /// Queue type identifier (e.g. `RANKED_SOLO_5x5`).
    pub queue_type: String,
    /// Tier name (e.g. `GOLD`).
    #[serde(default)]
    pub tier: Option<String>,
    /// Division within the tier (e.g. `II`).
    #[serde(default)]
    pub rank: Option<String>,
    /// League points within the division.
    #[serde(default)]
    pub league_points: i32,
    /// Ranked wins this season.
    #[serde(default)]
    pub wins: i32,
    /// Ranked losses this season.
    #[serde(default)]
    pub losses: i32,
}

/// Query parameters for the recent-match-id listing.
#[derive(Debug, Clone, Copy, Default)]
pub struct MatchIdsQuery {
    /// Restrict to a single queue id, when set.
    pub queue: Option<i32>,
    /// Maximum number of ids to return (upstream caps at 100).
    pub count: u32,
}

/// Full match payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchDto {
    /// Match metadata (external id, participant PUUIDs).
    pub metadata: MatchMetadataDto,
    /// Match info (game facts plus per-participant box scores).
    pub info: MatchInfoDto,
}

/// Match metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchMetadataDto {
    /// Globally-unique external match id.
    pub match_id: String,
    /// PUUIDs of all participants, in slot order.
    #[serde(default)]
    pub participants: Vec<String>,
}

/// Game-level match facts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchInfoDto {
    /// Game creation timestamp (epoch millis).
    pub game_creation: i64,
    /// Game duration in seconds.
    #[serde(default)]
    pub game_duration: i64,
    /// Patch / game version string.
    #[serde(default)]
    pub game_version: String,
    /// Queue identifier.
    #[serde(default)]
    pub queue_id: i32,
    /// End-of-game result tag (e.g. `GameComplete`).
    #[serde(default)]
    pub end_of_game_result: Option<String>,
    /// Per-participant box scores.
    #[serde(default)]
    pub participants: Vec<ParticipantDto>,
}

/// Per-participant box score.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantDto {
    /// Participant's PUUID.
    pub puuid: String,
    /// Participant slot id (1-based).
    #[serde(default)]
    pub participant_id: u8,
    /// Team identifier (100 = blue, 200 = red).
    #[serde(default)]
    pub team_id: i32,
    /// Assigned lane/role label.
    #[serde(default)]
    pub team_position: String,
    /// Whether this participant's team won.
    #[serde(default)]
    pub win: bool,
    /// Champion played.
    #[serde(default)]
    pub champion_id: i32,
    /// Final champion level.
    #[serde(default)]
    pub champ_level: i32,
    /// Kills.
    #[serde(default)]
    pub kills: i32,
    /// Deaths.
    #[serde(default)]
    pub deaths: i32,
    /// Assists.
    #[serde(default)]
    pub assists: i32,
    /// Gold earned.
    #[serde(default)]
    pub gold_earned: i32,
    /// Lane minions killed.
    #[serde(default)]
    pub total_minions_killed: i32,
    /// Jungle monsters killed.
    #[serde(default)]
    pub neutral_minions_killed: i32,
    /// Riot ID display name at game time, when present.
    #[serde(default)]
    pub riot_id_game_name: Option<String>,
    /// Riot ID tag at game time, when present.
    #[serde(default)]
    pub riot_id_tagline: Option<String>,
    /// Item slots 0-6.
    #[serde(default)]
    pub item0: i32,
    /// Item slot 1.
    #[serde(default)]
    pub item1: i32,
    /// Item slot 2.
    #[serde(default)]
    pub item2: i32,
    /// Item slot 3.
    #[serde(default)]
    pub item3: i32,
    /// Item slot 4.
    #[serde(default)]
    pub item4: i32,
    /// Item slot 5.
    #[serde(default)]
    pub item5: i32,
    /// Trinket slot.
    #[serde(default)]
    pub item6: i32,
    /// Rune selections.
    #[serde(default)]
    pub perks: Option<PerksDto>,
}

impl ParticipantDto {
    /// Returns the item ids by slot index, including empty (zero) slots.
    #[must_use]
    pub fn item_slots(&self) -> [i32; 7] {
        [
            self.item0, self.item1, self.item2, self.item3, self.item4, self.item5, self.item6,
        ]
    }
}

/// Rune selections for one participant.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerksDto {
    /// Stat shard selections.
    #[serde(default)]
    pub stat_perks: Option<PerkStatsDto>,
    /// Primary and secondary rune styles.
    #[serde(default)]
    pub styles: Vec<PerkStyleDto>,
}

/// Stat shard selections (offense / flex / defense).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerkStatsDto {
    /// Offense shard rune id.
    #[serde(default)]
    pub offense: i32,
    /// Flex shard rune id.
    #[serde(default)]
    pub flex: i32,
    /// Defense shard rune id.
    #[serde(default)]
    pub defense: i32,
}

/// One rune style (tree) and its selections.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerkStyleDto {
    /// Style role: `primaryStyle` or `subStyle`.
    #[serde(default)]
    pub description: String,
    /// Rune path (tree) identifier.
    #[serde(default)]
    pub style: i32,
    /// Selected runes in pick order.
    #[serde(default)]
    pub selections: Vec<PerkSelectionDto>,
}

/// A single selected rune.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerkSelectionDto {
    /// Rune identifier.
    #[serde(default)]
    pub perk: i32,
}

/// Match timeline payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineDto {
    /// Timeline info (frames).
    pub info: TimelineInfoDto,
}

/// Timeline frames plus the sampling interval.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineInfoDto {
    /// Interval between frames (millis), typically 60000.
    #[serde(default)]
    pub frame_interval: i64,
    /// Time-series frames, ascending by timestamp.
    #[serde(default)]
    pub frames: Vec<FrameDto>,
}

/// One time-series frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameDto {
    /// Elapsed game time of this frame (millis).
    #[serde(default)]
    pub timestamp: i64,
    /// Per-participant economy stats, keyed by participant slot id ("1"-"10").
    #[serde(default)]
    pub participant_frames: HashMap<String, ParticipantFrameDto>,
}

/// Per-participant economy stats at one frame.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantFrameDto {
    /// Total gold earned so far.
    #[serde(default)]
    pub total_gold: i32,
    /// Experience points.
    #[serde(default)]
    pub xp: i32,
    /// Lane minions killed.
    #[serde(default)]
    pub minions_killed: i32,
    /// Jungle monsters killed.
    #[serde(default)]
    pub jungle_minions_killed: i32,
    /// Champion level.
    #[serde(default)]
    pub level: i32,
}

impl ParticipantFrameDto {
    /// Returns combined lane plus jungle creep score.
    #[must_use]
    pub const fn creep_score(&self) -> i32 {
        self.minions_killed + self.jungle_minions_killed
    }
}

//! Match records, participants, and the per-participant payloads
//! (box score, runes, items).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use rift_core::{MatchRecordId, PlayerId};

use crate::fetch::FetchTracker;

/// Every completed match has exactly this many participant rows.
pub const PARTICIPANT_SLOTS: usize = 10;

/// A stored match row.
///
/// Game fields are `None`/zero until a fetch succeeds; the embedded
/// [`FetchTracker`] records where the match is in its fetch lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchRecord {
    /// Internal surrogate id all participant rows point at.
    pub id: MatchRecordId,
    /// Upstream region-prefixed match id, e.g. `EUW1_7001234567`.
    pub match_id: String,
    /// When the game was created. Known only after a successful fetch.
    pub game_creation: Option<DateTime<Utc>>,
    /// Game duration in seconds.
    pub game_duration_secs: i64,
    /// Patch the game was played on, e.g. `14.3.556.1234`.
    pub game_version: String,
    /// Upstream queue id, e.g. 420 for ranked solo.
    pub queue_id: i32,
    /// End-of-game result marker, when the upstream reports one.
    pub end_of_game_result: Option<String>,
    /// Fetch lifecycle state.
    pub fetch: FetchTracker,
}

impl MatchRecord {
    /// Parses the platform region out of the external match id prefix.
    #[must_use]
    pub fn region(&self) -> Option<rift_core::Region> {
        self.match_id.split('_').next()?.parse().ok()
    }

    /// Creates a record for a newly-discovered match id, not yet fetched.
    #[must_use]
    pub fn pending(match_id: impl Into<String>) -> Self {
        Self {
            id: MatchRecordId::generate(),
            match_id: match_id.into(),
            game_creation: None,
            game_duration_secs: 0,
            game_version: String::new(),
            queue_id: 0,
            end_of_game_result: None,
            fetch: FetchTracker::default(),
        }
    }
}

/// Which side of the map a participant played on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TeamSide {
    /// Team id 100.
    Blue,
    /// Team id 200.
    Red,
}

impl TeamSide {
    /// Maps the upstream numeric team id. Unknown ids fall back to blue.
    #[must_use]
    pub const fn from_team_id(team_id: i32) -> Self {
        match team_id {
            200 => Self::Red,
            _ => Self::Blue,
        }
    }
}

/// Core per-participant performance numbers.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoxScore {
    /// Champion kills.
    pub kills: i32,
    /// Deaths.
    pub deaths: i32,
    /// Assists.
    pub assists: i32,
    /// Total gold earned.
    pub gold_earned: i32,
    /// Lane plus jungle minions killed.
    pub creep_score: i32,
    /// Champion level at game end.
    pub champ_level: i32,
}

/// Which tree of the rune page a selection belongs to.
///
/// The upstream payload flattens the page into an ordered list without tree
/// membership; rows start as [`RuneTree::Unknown`] and are classified by the
/// reconstruction sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuneTree {
    /// Keystone tree (four selections).
    Primary,
    /// Splash tree (two selections).
    Secondary,
    /// Stat shards (three selections, path id zero).
    Shard,
    /// Membership not yet classified.
    Unknown,
}

/// One rune selection on a participant's page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuneSelection {
    /// Tree membership, possibly [`RuneTree::Unknown`].
    pub tree: RuneTree,
    /// Position within the flattened page, starting at zero.
    pub ordinal: u8,
    /// The selected rune id.
    pub rune_id: i32,
    /// The rune path (style) id. Zero for stat shards.
    pub path_id: i32,
}

/// One item slot on a participant's final build.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemSlot {
    /// Slot index, 0 through 6 (slot 6 is the trinket).
    pub slot: u8,
    /// Item id, zero for an empty slot.
    pub item_id: i32,
    /// Patch the build was recorded on.
    pub game_version: String,
}

/// A stored participant row.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    /// Owning match.
    pub match_record_id: MatchRecordId,
    /// The player this row belongs to. Always resolved before persistence.
    pub player_id: PlayerId,
    /// Upstream participant slot, 1 through 10.
    pub slot: u8,
    /// Map side.
    pub team: TeamSide,
    /// Assigned position, e.g. `JUNGLE`. Empty when the queue has none.
    pub role: String,
    /// Whether this participant's team won.
    pub win: bool,
    /// Champion played.
    pub champion_id: i32,
    /// Performance numbers.
    pub stats: BoxScore,
    /// Flattened rune page.
    pub runes: Vec<RuneSelection>,
    /// Final item build.
    pub items: Vec<ItemSlot>,
}

/// A match record together with its participant rows.
///
/// The unit of persistence: participants are committed with their record or
/// not at all.
#[derive(Debug, Clone)]
pub struct MatchAggregate {
    /// The match row.
    pub record: MatchRecord,
    /// Participant rows. Empty for failed or pending fetches.
    pub participants: Vec<Participant>,
}

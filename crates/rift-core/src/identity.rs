//! Player identity types: platform regions and Riot IDs.
//!
//! A player is addressable two ways:
//! - by **PUUID**, the upstream-assigned globally-unique identifier, stable
//!   across display-name changes
//! - by **Riot ID**, the player-facing (display name, tag) pair scoped to a
//!   platform region
//!
//! The (region, normalized name, normalized tag) tuple is a load-bearing
//! unique key in the store, so normalization lives here and is applied in
//! exactly one place.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// The platform region (shard) a player's account is homed on.
///
/// Distinct from the broader routing region used for account/match lookups;
/// see [`Region::routing`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[allow(missing_docs)]
pub enum Region {
    Br1,
    Eun1,
    Euw1,
    Jp1,
    Kr,
    La1,
    La2,
    Na1,
    Oc1,
    Tr1,
    Ru,
}

impl Region {
    /// Returns the canonical lowercase identifier for this region.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Br1 => "br1",
            Self::Eun1 => "eun1",
            Self::Euw1 => "euw1",
            Self::Jp1 => "jp1",
            Self::Kr => "kr",
            Self::La1 => "la1",
            Self::La2 => "la2",
            Self::Na1 => "na1",
            Self::Oc1 => "oc1",
            Self::Tr1 => "tr1",
            Self::Ru => "ru",
        }
    }

    /// Returns the continental routing region used for account and match
    /// endpoints.
    #[must_use]
    pub const fn routing(&self) -> Routing {
        match self {
            Self::Br1 | Self::La1 | Self::La2 | Self::Na1 | Self::Oc1 => Routing::Americas,
            Self::Eun1 | Self::Euw1 | Self::Tr1 | Self::Ru => Routing::Europe,
            Self::Jp1 | Self::Kr => Routing::Asia,
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Region {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s.trim().to_ascii_lowercase().as_str() {
            "br1" => Ok(Self::Br1),
            "eun1" => Ok(Self::Eun1),
            "euw1" => Ok(Self::Euw1),
            "jp1" => Ok(Self::Jp1),
            "kr" => Ok(Self::Kr),
            "la1" => Ok(Self::La1),
            "la2" => Ok(Self::La2),
            "na1" => Ok(Self::Na1),
            "oc1" => Ok(Self::Oc1),
            "tr1" => Ok(Self::Tr1),
            "ru" => Ok(Self::Ru),
            other => Err(Error::InvalidId {
                message: format!("unknown platform region '{other}'"),
            }),
        }
    }
}

/// Continental routing region for account/match lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[allow(missing_docs)]
pub enum Routing {
    Americas,
    Europe,
    Asia,
}

impl Routing {
    /// Returns the canonical lowercase identifier for this routing region.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Americas => "americas",
            Self::Europe => "europe",
            Self::Asia => "asia",
        }
    }
}

impl fmt::Display for Routing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A player-facing identity: platform region plus Riot ID (name + tag).
///
/// Construction trims surrounding whitespace but preserves the display
/// casing; [`PlayerIdentity::normalized_key`] provides the case-folded form
/// used for uniqueness and deduplication.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerIdentity {
    /// Platform region the account is homed on.
    pub region: Region,
    /// Display name portion of the Riot ID.
    pub game_name: String,
    /// Tag portion of the Riot ID (without the `#`).
    pub tag_line: String,
}

impl PlayerIdentity {
    /// Creates an identity, trimming surrounding whitespace.
    #[must_use]
    pub fn new(region: Region, game_name: impl Into<String>, tag_line: impl Into<String>) -> Self {
        Self {
            region,
            game_name: game_name.into().trim().to_owned(),
            tag_line: tag_line.into().trim().to_owned(),
        }
    }

    /// Returns the case-folded lookup key for this identity.
    ///
    /// Two identities with the same key refer to the same account; this is
    /// the normalized form behind the store's
    /// (region, normalized name, normalized tag) unique constraint.
    #[must_use]
    pub fn normalized_key(&self) -> String {
        format!(
            "{}:{}#{}",
            self.region,
            self.game_name.to_lowercase(),
            self.tag_line.to_lowercase()
        )
    }
}

impl fmt::Display for PlayerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{} ({})", self.game_name, self.tag_line, self.region)
    }
}

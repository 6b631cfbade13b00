//! Strongly-typed surrogate identifiers for stored entities.
//!
//! All identifiers are:
//! - **Strongly typed**: a `PlayerId` can never be passed where a
//!   [`MatchRecordId`] is expected
//! - **Lexicographically sortable**: ULIDs encode creation time and sort
//!   naturally, which makes "highest surrogate id" a meaningful tie-break
//! - **Globally unique**: no coordination required for generation

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ulid::Ulid;

use crate::error::{Error, Result};

/// Surrogate identifier for a stored player row.
///
/// Distinct from the upstream-assigned PUUID: the PUUID is the external
/// natural key, while `PlayerId` is the internal arena key every foreign
/// reference points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(Ulid);

impl PlayerId {
    /// Generates a new unique player ID.
    #[must_use]
    pub fn generate() -> Self {
        Self(Ulid::new())
    }

    /// Creates a player ID from a raw ULID.
    #[must_use]
    pub const fn from_ulid(ulid: Ulid) -> Self {
        Self(ulid)
    }

    /// Returns the underlying ULID.
    #[must_use]
    pub const fn as_ulid(&self) -> Ulid {
        self.0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for PlayerId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Ulid::from_string(s)
            .map(Self)
            .map_err(|e| Error::InvalidId {
                message: format!("invalid player ID '{s}': {e}"),
            })
    }
}

/// Surrogate identifier for a stored match row.
///
/// The upstream match id (a region-prefixed string) is the external natural
/// key; `MatchRecordId` keys the internal arena and all participant rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MatchRecordId(Ulid);

impl MatchRecordId {
    /// Generates a new unique match record ID.
    #[must_use]
    pub fn generate() -> Self {
        Self(Ulid::new())
    }

    /// Creates a match record ID from a raw ULID.
    #[must_use]
    pub const fn from_ulid(ulid: Ulid) -> Self {
        Self(ulid)
    }

    /// Returns the underlying ULID.
    #[must_use]
    pub const fn as_ulid(&self) -> Ulid {
        self.0
    }
}

impl fmt::Display for MatchRecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for MatchRecordId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Ulid::from_string(s)
            .map(Self)
            .map_err(|e| Error::InvalidId {
                message: format!("invalid match record ID '{s}': {e}"),
            })
    }
}

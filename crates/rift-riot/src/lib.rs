//! # rift-riot
//!
//! Upstream match-data API surface for the Rift ingestion engine:
//!
//! - **Wire types**: serde DTOs mirroring the upstream JSON payloads
//! - **`RiotApi` trait**: the narrow interface the engine consumes
//! - **HTTP client**: `reqwest`-backed implementation with typed error
//!   classification at the boundary
//! - **Mock**: scriptable test double with per-endpoint call counters
//!
//! The upstream is treated as unreliable throughout: every call may fail,
//! return not-found, or hand back partial data, and the typed [`ApiError`]
//! taxonomy is what the engine's retry state machines branch on.

#![deny(missing_docs)]
#![deny(rust_2018_idioms)]

pub mod client;
pub mod error;
pub mod http;
pub mod mock;
pub mod types;

pub use client::RiotApi;
pub use error::{ApiError, ApiResult};
pub use http::HttpRiotApi;
pub use mock::{MockFailure, MockRiotApi};
pub use types::{
    AccountDto, FrameDto, LeagueEntryDto, MatchDto, MatchIdsQuery, ParticipantDto,
    ParticipantFrameDto, PerksDto, SummonerDto, TimelineDto,
};

//! # rift-core
//!
//! Shared primitives for the Rift match ingestion engine.
//!
//! This crate provides the foundational types used across all Rift
//! components:
//!
//! - **Identifiers**: Strongly-typed surrogate IDs for players and matches
//! - **Identity**: Platform regions and normalized Riot IDs
//! - **Error Types**: Shared error definitions, including the typed
//!   unique-constraint violation decided at the storage boundary
//! - **Observability**: Logging bootstrap and span helpers
//!
//! ## Crate Boundary
//!
//! `rift-core` is the only crate allowed to define shared primitives. Engine
//! logic lives in `rift-ingest`; upstream API access lives in `rift-riot`.

#![deny(missing_docs)]
#![deny(rust_2018_idioms)]

pub mod error;
pub mod id;
pub mod identity;
pub mod observability;

pub use error::{Error, Result};
pub use id::{MatchRecordId, PlayerId};
pub use identity::{PlayerIdentity, Region, Routing};
pub use observability::{init_logging, LogFormat};

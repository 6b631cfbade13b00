//! Player upsert and rank reconciliation.
//!
//! Validation happens before any write: a profile without a PUUID is
//! rejected outright rather than stored as an orphan. Rank reconciliation
//! writes only on change and captures the superseded standing into history
//! first, so history grows one snapshot per observed change.

use chrono::{DateTime, Utc};
use tracing::debug;

use rift_core::PlayerId;

use crate::error::Result;
use crate::player::{PlayerProfile, RankEntry, RankSnapshot};
use crate::store::Store;

/// Outcome counters for one rank reconciliation pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RankReconcileOutcome {
    /// Queues seen for the first time.
    pub inserted: usize,
    /// Queues whose standing changed.
    pub updated: usize,
    /// History snapshots appended for superseded standings.
    pub snapshots_appended: usize,
    /// Queues whose standing was unchanged.
    pub unchanged: usize,
}

/// Validates and upserts a player profile.
///
/// # Errors
///
/// Returns [`rift_core::Error::MissingIdentifier`] if the PUUID is empty;
/// nothing is written in that case.
pub async fn upsert_player(
    store: &dyn Store,
    profile: &PlayerProfile,
    now: DateTime<Utc>,
) -> Result<PlayerId> {
    if profile.puuid.trim().is_empty() {
        return Err(rift_core::Error::MissingIdentifier { field: "puuid" }.into());
    }
    store.upsert_player(profile, now).await
}

/// Reconciles a player's stored standings against a fresh upstream read.
///
/// Per queue: a new standing is inserted; an unchanged standing is left
/// alone; a changed standing is snapshotted into history and then replaced.
/// Queues absent from the fresh read keep their stored standing, since the
/// upstream omits queues rather than reporting resets.
pub async fn reconcile_ranks(
    store: &dyn Store,
    player_id: PlayerId,
    fresh: &[RankEntry],
    now: DateTime<Utc>,
) -> Result<RankReconcileOutcome> {
    let existing = store.ranks_for_player(player_id).await?;
    let mut outcome = RankReconcileOutcome::default();

    for entry in fresh {
        match existing.iter().find(|e| e.queue_type == entry.queue_type) {
            None => {
                store.save_rank(entry).await?;
                outcome.inserted += 1;
            }
            Some(current) if current.same_standing(entry) => {
                outcome.unchanged += 1;
            }
            Some(current) => {
                let snapshot = RankSnapshot::of(current, now);
                if store.append_rank_snapshot_if_absent(&snapshot).await? {
                    outcome.snapshots_appended += 1;
                }
                store.save_rank(entry).await?;
                outcome.updated += 1;
            }
        }
    }

    debug!(
        %player_id,
        inserted = outcome.inserted,
        updated = outcome.updated,
        snapshots = outcome.snapshots_appended,
        unchanged = outcome.unchanged,
        "reconciled ranks"
    );
    Ok(outcome)
}

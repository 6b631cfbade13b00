//! Duplicate-player repair.
//!
//! Historical writes predating uniqueness enforcement left multiple rows
//! for the same account. Repair groups rows by PUUID and by normalized
//! identity, keeps the most recently refreshed row of each group (highest
//! surrogate id breaks ties), repoints every referencing row at the
//! survivor, and deletes the rest. Referential integrity holds throughout:
//! references are moved before their owner is deleted.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::info;

use rift_core::PlayerId;

use crate::error::Result;
use crate::player::Player;
use crate::store::Store;

/// Counters for one repair pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MergeReport {
    /// Duplicate groups merged.
    pub groups_merged: usize,
    /// Player rows deleted.
    pub players_deleted: usize,
    /// Participant rows repointed at survivors.
    pub participants_repointed: u64,
    /// Rank standings moved to survivors.
    pub ranks_moved: usize,
    /// Rank standings dropped because the survivor already held the queue.
    pub ranks_dropped: usize,
    /// Rank history snapshots repointed at survivors.
    pub snapshots_repointed: u64,
}

impl MergeReport {
    fn absorb(&mut self, other: Self) {
        self.groups_merged += other.groups_merged;
        self.players_deleted += other.players_deleted;
        self.participants_repointed += other.participants_repointed;
        self.ranks_moved += other.ranks_moved;
        self.ranks_dropped += other.ranks_dropped;
        self.snapshots_repointed += other.snapshots_repointed;
    }
}

/// Merges duplicate player rows.
pub struct DuplicateRepair {
    store: Arc<dyn Store>,
}

impl DuplicateRepair {
    /// Creates a repair pass over the given store.
    #[must_use]
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Runs one full repair pass.
    ///
    /// PUUID groups are merged first, since the PUUID is authoritative;
    /// identity groups catch rows where the PUUID was never recorded
    /// consistently.
    pub async fn merge_duplicates(&self) -> Result<MergeReport> {
        let mut report = self.merge_grouped_by(|p| p.puuid.clone()).await?;
        report.absorb(
            self.merge_grouped_by(|p| p.identity.normalized_key())
                .await?,
        );

        info!(
            groups = report.groups_merged,
            deleted = report.players_deleted,
            participants = report.participants_repointed,
            snapshots = report.snapshots_repointed,
            "duplicate repair complete"
        );
        Ok(report)
    }

    async fn merge_grouped_by(
        &self,
        key: impl Fn(&Player) -> String,
    ) -> Result<MergeReport> {
        let players = self.store.list_players().await?;
        let mut groups: HashMap<String, Vec<Player>> = HashMap::new();
        for player in players {
            groups.entry(key(&player)).or_default().push(player);
        }

        let mut report = MergeReport::default();
        for group in groups.into_values() {
            if group.len() < 2 {
                continue;
            }
            report.absorb(self.merge_group(group).await?);
        }
        Ok(report)
    }

    async fn merge_group(&self, mut group: Vec<Player>) -> Result<MergeReport> {
        // Survivor: freshest data, highest id on a timestamp tie.
        group.sort_by(|a, b| {
            a.updated_at
                .cmp(&b.updated_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        let survivor = group.pop().map(|p| p.id).ok_or_else(|| {
            crate::error::Error::storage("empty duplicate group")
        })?;

        let mut report = MergeReport {
            groups_merged: 1,
            ..MergeReport::default()
        };
        for loser in group {
            report.absorb(self.fold_into(survivor, &loser).await?);
        }
        Ok(report)
    }

    async fn fold_into(&self, survivor: PlayerId, loser: &Player) -> Result<MergeReport> {
        let mut report = MergeReport::default();

        report.participants_repointed = self.store.repoint_participants(loser.id, survivor).await?;

        let survivor_queues: Vec<String> = self
            .store
            .ranks_for_player(survivor)
            .await?
            .into_iter()
            .map(|entry| entry.queue_type)
            .collect();
        for mut entry in self.store.ranks_for_player(loser.id).await? {
            if survivor_queues.contains(&entry.queue_type) {
                // The survivor's standing is fresher by construction.
                self.store.delete_rank(loser.id, &entry.queue_type).await?;
                report.ranks_dropped += 1;
            } else {
                self.store.delete_rank(loser.id, &entry.queue_type).await?;
                entry.player_id = survivor;
                self.store.save_rank(&entry).await?;
                report.ranks_moved += 1;
            }
        }

        report.snapshots_repointed = self.store.repoint_rank_snapshots(loser.id, survivor).await?;

        if self.store.is_favorite(loser.id).await? {
            self.store.set_favorite(survivor, true).await?;
        }

        self.store.delete_player(loser.id).await?;
        report.players_deleted = 1;
        Ok(report)
    }
}

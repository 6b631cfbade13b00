//! Rune tree membership reconstruction.
//!
//! Rune rows are stored flat, with a path id per selection but no tree
//! membership. Membership is recoverable from the path frequencies: the
//! keystone tree contributes four selections, the splash tree two, and
//! stat shards carry path id zero. Reconstruction is advisory: ambiguous
//! pages are left untouched rather than guessed at.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info};

use crate::error::Result;
use crate::fetch::FetchStatus;
use crate::match_record::{RuneSelection, RuneTree};
use crate::store::Store;

/// The keystone tree always carries at least this many selections.
const PRIMARY_MIN_SELECTIONS: usize = 4;

/// Classifies tree membership for a flattened rune page.
///
/// Returns `None` when the page is ambiguous: fewer than four selections on
/// the most frequent path, a frequency tie between the top two paths, or
/// more than two non-shard paths.
#[must_use]
pub fn reconstruct_tree_membership(rows: &[RuneSelection]) -> Option<Vec<RuneSelection>> {
    let mut path_counts: HashMap<i32, usize> = HashMap::new();
    for row in rows.iter().filter(|r| r.path_id != 0) {
        *path_counts.entry(row.path_id).or_default() += 1;
    }

    let mut ranked: Vec<(i32, usize)> = path_counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    let (primary_path, primary_count) = *ranked.first()?;
    if primary_count < PRIMARY_MIN_SELECTIONS {
        return None;
    }
    if ranked.len() > 2 {
        return None;
    }
    let secondary_path = match ranked.get(1) {
        Some(&(_, count)) if count == primary_count => return None,
        Some(&(path, _)) => Some(path),
        None => None,
    };

    Some(
        rows.iter()
            .map(|row| {
                let tree = if row.path_id == 0 {
                    RuneTree::Shard
                } else if row.path_id == primary_path {
                    RuneTree::Primary
                } else if Some(row.path_id) == secondary_path {
                    RuneTree::Secondary
                } else {
                    RuneTree::Unknown
                };
                RuneSelection { tree, ..*row }
            })
            .collect(),
    )
}

/// Counters for one reconstruction sweep.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RuneRepairReport {
    /// Participant rows examined with unclassified runes.
    pub examined: usize,
    /// Participant rows whose runes were classified.
    pub classified: usize,
    /// Participant rows left untouched as ambiguous.
    pub ambiguous: usize,
}

/// Sweeps stored participants and classifies unclassified rune pages.
pub struct RuneReconstructor {
    store: Arc<dyn Store>,
}

impl RuneReconstructor {
    /// Creates a reconstructor over the given store.
    #[must_use]
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Runs one sweep over up to `limit` ingested matches.
    pub async fn run_sweep(&self, limit: usize) -> Result<RuneRepairReport> {
        let matches = self.store.matches_with_status(FetchStatus::Success).await?;
        let mut report = RuneRepairReport::default();

        for record in matches.into_iter().take(limit) {
            for participant in self.store.participants_for_match(record.id).await? {
                if !participant
                    .runes
                    .iter()
                    .any(|r| r.tree == RuneTree::Unknown)
                {
                    continue;
                }
                report.examined += 1;

                match reconstruct_tree_membership(&participant.runes) {
                    Some(classified) => {
                        self.store
                            .update_participant_runes(record.id, participant.slot, &classified)
                            .await?;
                        report.classified += 1;
                    }
                    None => {
                        report.ambiguous += 1;
                        debug!(
                            match_id = %record.match_id,
                            slot = participant.slot,
                            "ambiguous rune page left unclassified"
                        );
                    }
                }
            }
        }

        info!(
            examined = report.examined,
            classified = report.classified,
            ambiguous = report.ambiguous,
            "rune reconstruction sweep complete"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(ordinal: u8, rune_id: i32, path_id: i32) -> RuneSelection {
        RuneSelection {
            tree: RuneTree::Unknown,
            ordinal,
            rune_id,
            path_id,
        }
    }

    /// A standard page: four precision, two domination, three shards.
    fn standard_page() -> Vec<RuneSelection> {
        vec![
            row(0, 8005, 8000),
            row(1, 9111, 8000),
            row(2, 9104, 8000),
            row(3, 8014, 8000),
            row(4, 8139, 8100),
            row(5, 8135, 8100),
            row(6, 5008, 0),
            row(7, 5008, 0),
            row(8, 5002, 0),
        ]
    }

    #[test]
    fn standard_page_classifies_fully() {
        let classified = reconstruct_tree_membership(&standard_page()).expect("classified");

        let trees: Vec<RuneTree> = classified.iter().map(|r| r.tree).collect();
        assert_eq!(
            trees,
            vec![
                RuneTree::Primary,
                RuneTree::Primary,
                RuneTree::Primary,
                RuneTree::Primary,
                RuneTree::Secondary,
                RuneTree::Secondary,
                RuneTree::Shard,
                RuneTree::Shard,
                RuneTree::Shard,
            ]
        );
        // Ordinals and rune ids pass through unchanged.
        assert_eq!(classified[4].rune_id, 8139);
        assert_eq!(classified[4].ordinal, 4);
    }

    #[test]
    fn tied_paths_are_ambiguous() {
        // Two paths with three selections each: no way to pick the keystone tree.
        let rows = vec![
            row(0, 1, 8000),
            row(1, 2, 8000),
            row(2, 3, 8000),
            row(3, 4, 8100),
            row(4, 5, 8100),
            row(5, 6, 8100),
        ];
        assert!(reconstruct_tree_membership(&rows).is_none());
    }

    #[test]
    fn short_majority_is_ambiguous() {
        let rows = vec![row(0, 1, 8000), row(1, 2, 8000), row(2, 3, 8100)];
        assert!(reconstruct_tree_membership(&rows).is_none());
    }

    #[test]
    fn three_paths_are_ambiguous() {
        let mut rows = standard_page();
        rows.push(row(9, 99, 8200));
        assert!(reconstruct_tree_membership(&rows).is_none());
    }

    #[test]
    fn page_without_secondary_still_classifies() {
        let rows = vec![
            row(0, 1, 8000),
            row(1, 2, 8000),
            row(2, 3, 8000),
            row(3, 4, 8000),
            row(4, 5, 0),
        ];
        let classified = reconstruct_tree_membership(&rows).expect("classified");
        assert_eq!(classified[3].tree, RuneTree::Primary);
        assert_eq!(classified[4].tree, RuneTree::Shard);
    }

    #[test]
    fn shard_only_page_is_ambiguous() {
        let rows = vec![row(0, 5008, 0), row(1, 5008, 0)];
        assert!(reconstruct_tree_membership(&rows).is_none());
    }
}

//! Candidate scheduling at scale: a large stale pool with a favorites
//! cohort, capped examination and admission.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use rift_core::{PlayerIdentity, Region};
use rift_ingest::scheduler::{CandidateScheduler, SweepOptions};
use rift_ingest::store::PlayerStore;
use rift_ingest::{IngestConfig, InMemoryJobQueue, InMemoryStore, JobQueue, Result};

fn at(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(1_700_000_000 + secs, 0).expect("timestamp")
}

/// Seeds 150 stale players. Every tenth player is a favorite, and the
/// favorites are deliberately the least stale of the pool.
async fn seed_pool(store: &InMemoryStore) -> Result<()> {
    for i in 0..150_i64 {
        let favorite = i % 10 == 0;
        let updated_at = if favorite { at(5000 + i) } else { at(i) };
        let profile = rift_ingest::PlayerProfile {
            puuid: format!("puuid-{i}"),
            identity: PlayerIdentity::new(Region::Euw1, format!("Player{i}"), "EUW"),
            profile_icon_id: 1,
            summoner_level: 30,
        };
        let id = store.upsert_player(&profile, updated_at).await?;
        store.set_favorite(id, favorite).await?;
    }
    Ok(())
}

#[tokio::test]
async fn favorites_always_make_the_candidate_set() -> Result<()> {
    let store = Arc::new(InMemoryStore::new());
    seed_pool(&store).await?;

    let queue = Arc::new(InMemoryJobQueue::new());
    let config = IngestConfig::default()
        .with_stale_cutoff(Duration::from_secs(3600))
        .with_max_candidates(50)
        .with_max_queued(10);
    let scheduler = CandidateScheduler::new(store, queue, config.clone());

    let now = at(100_000);
    let candidates = scheduler
        .select_candidates_at(now, &SweepOptions::from_config(&config))
        .await?;

    assert_eq!(candidates.len(), 50);
    // All 15 favorites are in the set even though 135 general players are
    // staler than every one of them.
    assert_eq!(candidates.iter().filter(|c| c.favorite).count(), 15);
    // The set is ordered stalest first.
    for pair in candidates.windows(2) {
        assert!(pair[0].updated_at <= pair[1].updated_at);
    }
    Ok(())
}

#[tokio::test]
async fn admission_is_capped_and_prefers_the_stalest() -> Result<()> {
    let store = Arc::new(InMemoryStore::new());
    seed_pool(&store).await?;

    let queue = Arc::new(InMemoryJobQueue::new());
    let config = IngestConfig::default()
        .with_stale_cutoff(Duration::from_secs(3600))
        .with_max_candidates(50)
        .with_max_queued(10);
    let scheduler = CandidateScheduler::new(store, queue.clone(), config.clone());

    let now = at(100_000);
    let report = scheduler
        .run_sweep_at(now, &SweepOptions::from_config(&config))
        .await?;

    assert_eq!(report.examined, 50);
    assert_eq!(report.admitted, 10);
    assert_eq!(queue.queue_depth().await?, 10);

    // Admitted jobs drain in staleness order.
    let mut last_seen = None;
    while let Some(job) = queue.pop_ready_at(now)? {
        let n: i64 = job.identity.game_name["Player".len()..]
            .parse()
            .expect("player number");
        if let Some(prev) = last_seen {
            assert!(n > prev, "jobs admitted out of staleness order");
        }
        last_seen = Some(n);
    }
    Ok(())
}

#[tokio::test]
async fn disabled_favorites_flag_flattens_the_pool() -> Result<()> {
    let store = Arc::new(InMemoryStore::new());
    seed_pool(&store).await?;

    let queue = Arc::new(InMemoryJobQueue::new());
    let config = IngestConfig::default()
        .with_stale_cutoff(Duration::from_secs(3600))
        .with_max_candidates(50)
        .with_prioritize_favorites(false);
    let scheduler = CandidateScheduler::new(store, queue, config.clone());

    let candidates = scheduler
        .select_candidates_at(at(100_000), &SweepOptions::from_config(&config))
        .await?;

    // Without prioritization the favorites (the least stale rows) are
    // crowded out entirely.
    assert_eq!(candidates.len(), 50);
    assert_eq!(candidates.iter().filter(|c| c.favorite).count(), 0);
    Ok(())
}

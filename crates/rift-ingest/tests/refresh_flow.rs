//! End-to-end refresh flows against the in-memory store and mock upstream.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::json;

use rift_core::{PlayerIdentity, Region};
use rift_ingest::store::{LockStore, MatchStore, PlayerStore};
use rift_ingest::{
    FetchStatus, IngestConfig, IngestService, InMemoryJobQueue, InMemoryStore, MatchAggregate,
    MatchRecord, RefreshOrchestrator, Result, RuneTree, SingleRefreshOutcome,
};
use rift_riot::{MockFailure, MockRiotApi};

const MAIN_PUUID: &str = "puuid-main";

fn main_identity() -> PlayerIdentity {
    PlayerIdentity::new(Region::Euw1, "Hide on bush", "KR1")
}

fn seed_main_player(api: &MockRiotApi) {
    api.set_account("Hide on bush", "KR1", MAIN_PUUID);
    api.set_summoner(
        MAIN_PUUID,
        serde_json::from_value(json!({
            "puuid": MAIN_PUUID,
            "profileIconId": 4567,
            "summonerLevel": 512,
            "revisionDate": 1_700_000_000_000_i64
        }))
        .expect("summoner"),
    );
    api.set_league_entries(
        MAIN_PUUID,
        serde_json::from_value(json!([{
            "queueType": "RANKED_SOLO_5x5",
            "tier": "DIAMOND",
            "rank": "I",
            "leaguePoints": 75,
            "wins": 210,
            "losses": 180
        }]))
        .expect("entries"),
    );
}

/// Builds a full ten-participant match payload. Slot 1 is the main player;
/// the rest carry their Riot ID in the payload so the engine can stub them.
fn match_payload(match_id: &str, game_creation_ms: i64, queue_id: i32) -> rift_riot::MatchDto {
    let mut participants = Vec::new();
    let mut puuids = Vec::new();
    for i in 0..10 {
        let puuid = if i == 0 {
            MAIN_PUUID.to_owned()
        } else {
            format!("{match_id}-puuid-{i}")
        };
        puuids.push(puuid.clone());
        participants.push(json!({
            "puuid": puuid,
            "participantId": i + 1,
            "teamId": if i < 5 { 100 } else { 200 },
            "teamPosition": "MIDDLE",
            "win": i < 5,
            "championId": 103 + i,
            "champLevel": 16,
            "kills": 5,
            "deaths": 3,
            "assists": 9,
            "goldEarned": 12_400,
            "totalMinionsKilled": 180,
            "neutralMinionsKilled": 12,
            "riotIdGameName": format!("Player{i}"),
            "riotIdTagline": "EUW",
            "item0": 3006, "item1": 3089, "item2": 0, "item3": 3157,
            "item4": 0, "item5": 0, "item6": 3363,
            "perks": {
                "statPerks": {"offense": 5008, "flex": 5008, "defense": 5002},
                "styles": [
                    {"description": "primaryStyle", "style": 8100, "selections":
                        [{"perk": 8112}, {"perk": 8139}, {"perk": 8138}, {"perk": 8135}]},
                    {"description": "subStyle", "style": 8000, "selections":
                        [{"perk": 9111}, {"perk": 9104}]}
                ]
            }
        }));
    }

    serde_json::from_value(json!({
        "metadata": {"matchId": match_id, "participants": puuids},
        "info": {
            "gameCreation": game_creation_ms,
            "gameDuration": 1840,
            "gameVersion": "14.3.556.1234",
            "queueId": queue_id,
            "endOfGameResult": "GameComplete",
            "participants": participants
        }
    }))
    .expect("match payload")
}

fn service(api: Arc<MockRiotApi>, store: Arc<InMemoryStore>) -> IngestService {
    IngestService::new(
        api,
        store,
        Arc::new(InMemoryJobQueue::new()),
        IngestConfig::default(),
    )
}

#[tokio::test]
async fn happy_path_ingests_listed_matches() -> Result<()> {
    let api = Arc::new(MockRiotApi::new());
    seed_main_player(&api);
    let recent = Utc::now().timestamp_millis() - 3_600_000;
    api.insert_match(match_payload("EUW1_1001", recent, 420));
    api.insert_match(match_payload("EUW1_1002", recent, 440));
    api.set_match_ids(MAIN_PUUID, vec!["EUW1_1001".into(), "EUW1_1002".into()]);

    let store = Arc::new(InMemoryStore::new());
    let service = service(api.clone(), store.clone());

    let outcome = service.run_single_refresh(&main_identity()).await?;
    let SingleRefreshOutcome::Completed(outcome) = outcome else {
        panic!("expected a completed refresh");
    };
    assert_eq!(outcome.discovered, 2);
    assert_eq!(outcome.ingested, 2);
    assert_eq!(outcome.failed, 0);
    assert_eq!(outcome.duplicates, 0);

    // Profile and ranks landed.
    let player = store
        .get_player_by_identity(&main_identity())
        .await?
        .expect("player");
    assert_eq!(player.puuid, MAIN_PUUID);
    assert_eq!(player.summoner_level, 512);
    let ranks = store.ranks_for_player(player.id).await?;
    assert_eq!(ranks.len(), 1);
    assert_eq!(ranks[0].league_points, 75);

    // Both matches are fully ingested with ten resolved participants.
    for match_id in ["EUW1_1001", "EUW1_1002"] {
        let record = store
            .get_match_by_external_id(match_id)
            .await?
            .expect("match");
        assert_eq!(record.fetch.status, FetchStatus::Success);
        assert_eq!(record.queue_id, if match_id == "EUW1_1001" { 420 } else { 440 });

        let participants = store.participants_for_match(record.id).await?;
        assert_eq!(participants.len(), 10);
        let main = participants.iter().find(|p| p.slot == 1).expect("slot 1");
        assert_eq!(main.player_id, player.id);
        assert_eq!(main.stats.creep_score, 192);
        // Runes arrive flat and unclassified: 4 + 2 + 3 shards.
        assert_eq!(main.runes.len(), 9);
        assert!(main.runes.iter().all(|r| r.tree == RuneTree::Unknown));
        assert_eq!(main.items.len(), 7);
    }

    // Nine stub players were created per match, shared main row across both.
    assert_eq!(store.list_players().await?.len(), 19);

    // The refresh lock was released.
    let key = rift_ingest::lock::refresh_key(&main_identity());
    assert!(
        store
            .try_acquire_at(&key, Duration::from_secs(60), Utc::now())
            .await?
    );
    Ok(())
}

#[tokio::test]
async fn unresolvable_participant_fails_the_whole_match() -> Result<()> {
    let api = Arc::new(MockRiotApi::new());
    seed_main_player(&api);
    let recent = Utc::now().timestamp_millis() - 3_600_000;

    let mut dto = match_payload("EUW1_2001", recent, 420);
    // Strip the embedded identity from one participant; with no account
    // scripted upstream either, it cannot be resolved.
    dto.info.participants[7].riot_id_game_name = None;
    dto.info.participants[7].riot_id_tagline = None;
    api.insert_match(dto);
    api.set_match_ids(MAIN_PUUID, vec!["EUW1_2001".into()]);

    let store = Arc::new(InMemoryStore::new());
    let service = service(api, store.clone());

    let SingleRefreshOutcome::Completed(outcome) =
        service.run_single_refresh(&main_identity()).await?
    else {
        panic!("expected a completed refresh");
    };
    assert_eq!(outcome.ingested, 0);
    assert_eq!(outcome.failed, 1);

    // The record is persisted in a failure state with zero participants.
    let record = store
        .get_match_by_external_id("EUW1_2001")
        .await?
        .expect("match");
    assert_eq!(record.fetch.status, FetchStatus::TemporaryFailure);
    assert_eq!(record.fetch.retry_count, 1);
    assert!(record
        .fetch
        .last_error
        .as_deref()
        .is_some_and(|e| e.contains("unresolvable")));
    assert!(store.participants_for_match(record.id).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn known_matches_are_not_refetched() -> Result<()> {
    let api = Arc::new(MockRiotApi::new());
    seed_main_player(&api);
    api.set_match_ids(MAIN_PUUID, vec!["EUW1_3001".into()]);

    let store = Arc::new(InMemoryStore::new());
    let mut known = MatchRecord::pending("EUW1_3001");
    known.fetch.record_success_at(Utc::now());
    store
        .insert_match(&MatchAggregate {
            record: known,
            participants: vec![],
        })
        .await?;

    let service = service(api.clone(), store);
    let SingleRefreshOutcome::Completed(outcome) =
        service.run_single_refresh(&main_identity()).await?
    else {
        panic!("expected a completed refresh");
    };

    assert_eq!(outcome.discovered, 0);
    assert_eq!(api.calls.match_detail.load(Ordering::SeqCst), 0);
    Ok(())
}

#[tokio::test]
async fn matches_outside_retention_are_not_ingested() -> Result<()> {
    let api = Arc::new(MockRiotApi::new());
    seed_main_player(&api);
    // Three years old, well past the two-year window.
    let ancient = Utc::now().timestamp_millis() - 3 * 365 * 24 * 3_600_000;
    api.insert_match(match_payload("EUW1_4001", ancient, 420));
    api.set_match_ids(MAIN_PUUID, vec!["EUW1_4001".into()]);

    let store = Arc::new(InMemoryStore::new());
    let service = service(api.clone(), store.clone());
    service.run_single_refresh(&main_identity()).await?;

    let record = store
        .get_match_by_external_id("EUW1_4001")
        .await?
        .expect("match");
    assert_eq!(record.fetch.status, FetchStatus::OutsideRetentionWindow);
    assert!(store.participants_for_match(record.id).await?.is_empty());

    // Only the main player row exists; no stubs were created for a match
    // that will never be ingested.
    assert_eq!(store.list_players().await?.len(), 1);
    Ok(())
}

#[tokio::test]
async fn missing_match_is_marked_unfetchable_immediately() -> Result<()> {
    let api = Arc::new(MockRiotApi::new());
    seed_main_player(&api);
    // Listed but never scripted: the detail fetch returns not-found.
    api.set_match_ids(MAIN_PUUID, vec!["EUW1_5001".into()]);

    let store = Arc::new(InMemoryStore::new());
    let service = service(api, store.clone());
    service.run_single_refresh(&main_identity()).await?;

    let record = store
        .get_match_by_external_id("EUW1_5001")
        .await?
        .expect("match");
    assert_eq!(record.fetch.status, FetchStatus::PermanentlyUnfetchable);
    Ok(())
}

#[tokio::test]
async fn unranked_player_with_no_history_still_upserts() -> Result<()> {
    let api = Arc::new(MockRiotApi::new());
    api.set_account("Hide on bush", "KR1", MAIN_PUUID);
    api.set_summoner(
        MAIN_PUUID,
        serde_json::from_value(json!({"puuid": MAIN_PUUID, "profileIconId": 1, "summonerLevel": 30}))
            .expect("summoner"),
    );
    api.set_match_ids(MAIN_PUUID, vec![]);

    let store = Arc::new(InMemoryStore::new());
    let service = service(api, store.clone());

    let outcome = service.run_single_refresh(&main_identity()).await?;
    assert!(matches!(outcome, SingleRefreshOutcome::Completed(_)));
    assert!(store.get_player_by_identity(&main_identity()).await?.is_some());
    Ok(())
}

#[tokio::test]
async fn unknown_player_is_not_found() {
    let api = Arc::new(MockRiotApi::new());
    let store = Arc::new(InMemoryStore::new());
    let service = service(api, store.clone());

    let result = service.run_single_refresh(&main_identity()).await;
    assert!(matches!(
        result,
        Err(rift_ingest::Error::PlayerNotFound { .. })
    ));

    // The lock was released despite the error.
    let key = rift_ingest::lock::refresh_key(&main_identity());
    assert!(store
        .try_acquire_at(&key, Duration::from_secs(60), Utc::now())
        .await
        .expect("acquire"));
}

#[tokio::test]
async fn failed_match_recovers_through_retry_sweep() -> Result<()> {
    let api = Arc::new(MockRiotApi::new());
    seed_main_player(&api);
    let recent = Utc::now().timestamp_millis() - 3_600_000;
    api.insert_match(match_payload("EUW1_6001", recent, 420));
    api.set_match_ids(MAIN_PUUID, vec!["EUW1_6001".into()]);
    api.fail_next_match_detail("EUW1_6001", MockFailure::Transient(503));

    let store = Arc::new(InMemoryStore::new());
    let config = IngestConfig::default();
    let service = service(api.clone(), store.clone());
    service.run_single_refresh(&main_identity()).await?;

    let record = store
        .get_match_by_external_id("EUW1_6001")
        .await?
        .expect("match");
    assert_eq!(record.fetch.status, FetchStatus::TemporaryFailure);

    // Not yet due: first backoff step is 30 seconds.
    let orchestrator = RefreshOrchestrator::new(api.clone(), store.clone(), config.clone());
    let early = orchestrator.run_failed_match_sweep_at(Utc::now(), 10).await?;
    assert_eq!(early.examined, 0);

    // Due after the backoff; the scripted failure was one-shot, so the
    // retry recovers the full aggregate.
    let later = Utc::now() + chrono::Duration::seconds(31);
    let report = orchestrator.run_failed_match_sweep_at(later, 10).await?;
    assert_eq!(report.recovered, 1);

    let record = store
        .get_match_by_external_id("EUW1_6001")
        .await?
        .expect("match");
    assert_eq!(record.fetch.status, FetchStatus::Success);
    assert_eq!(store.participants_for_match(record.id).await?.len(), 10);
    Ok(())
}

#[tokio::test]
async fn failing_match_past_retention_expires_without_a_fetch() -> Result<()> {
    let api = Arc::new(MockRiotApi::new());
    let store = Arc::new(InMemoryStore::new());

    // A match stuck in temporary failure whose creation date aged past the
    // two-year window while it was backing off.
    let mut record = MatchRecord::pending("EUW1_6500");
    record.game_creation = Some(Utc::now() - chrono::Duration::days(731));
    record
        .fetch
        .record_failure_at(Utc::now() - chrono::Duration::days(1), "503", 5);
    assert_eq!(record.fetch.status, FetchStatus::TemporaryFailure);
    store
        .insert_match(&MatchAggregate {
            record,
            participants: vec![],
        })
        .await?;

    let orchestrator =
        RefreshOrchestrator::new(api.clone(), store.clone(), IngestConfig::default());
    let report = orchestrator.run_failed_match_sweep_at(Utc::now(), 10).await?;

    // Expired on the stored creation date alone; the upstream is never asked.
    assert_eq!(report.expired, 1);
    assert_eq!(report.examined, 0);
    assert_eq!(api.calls.match_detail.load(Ordering::SeqCst), 0);

    let record = store
        .get_match_by_external_id("EUW1_6500")
        .await?
        .expect("match");
    assert_eq!(record.fetch.status, FetchStatus::OutsideRetentionWindow);

    // Terminal: the next sweep no longer sees it.
    let again = orchestrator.run_failed_match_sweep_at(Utc::now(), 10).await?;
    assert_eq!(again.expired, 0);
    Ok(())
}

#[tokio::test]
async fn retry_budget_exhaustion_escalates() -> Result<()> {
    let api = Arc::new(MockRiotApi::new());
    seed_main_player(&api);
    api.set_match_ids(MAIN_PUUID, vec!["EUW1_7001".into()]);
    api.fail_match_detail_always("EUW1_7001", MockFailure::Transient(500));

    let store = Arc::new(InMemoryStore::new());
    let config = IngestConfig::default().with_max_fetch_attempts(3);
    let service = IngestService::new(
        api.clone(),
        store.clone(),
        Arc::new(InMemoryJobQueue::new()),
        config.clone(),
    );
    service.run_single_refresh(&main_identity()).await?;

    let orchestrator = RefreshOrchestrator::new(api.clone(), store.clone(), config);
    // Attempt 2 after 30s, attempt 3 after a further 60s: the ceiling.
    let now = Utc::now();
    let first = orchestrator
        .run_failed_match_sweep_at(now + chrono::Duration::seconds(31), 10)
        .await?;
    assert_eq!(first.still_failing, 1);

    let second = orchestrator
        .run_failed_match_sweep_at(now + chrono::Duration::seconds(120), 10)
        .await?;
    assert_eq!(second.escalated, 1);

    let record = store
        .get_match_by_external_id("EUW1_7001")
        .await?
        .expect("match");
    assert_eq!(record.fetch.status, FetchStatus::PermanentlyUnfetchable);
    assert_eq!(record.fetch.retry_count, 3);

    // Terminal: a later sweep finds nothing to do.
    let third = orchestrator
        .run_failed_match_sweep_at(now + chrono::Duration::seconds(600), 10)
        .await?;
    assert_eq!(third.examined, 0);
    Ok(())
}

#[tokio::test]
async fn second_refresh_discovers_nothing_new() -> Result<()> {
    let api = Arc::new(MockRiotApi::new());
    seed_main_player(&api);
    let recent = Utc::now().timestamp_millis() - 3_600_000;
    api.insert_match(match_payload("EUW1_8001", recent, 420));
    api.set_match_ids(MAIN_PUUID, vec!["EUW1_8001".into()]);

    let store = Arc::new(InMemoryStore::new());
    let service = service(api.clone(), store.clone());

    service.run_single_refresh(&main_identity()).await?;
    let SingleRefreshOutcome::Completed(second) =
        service.run_single_refresh(&main_identity()).await?
    else {
        panic!("expected a completed refresh");
    };

    assert_eq!(second.discovered, 0);
    assert_eq!(second.ingested, 0);
    assert_eq!(api.calls.match_detail.load(Ordering::SeqCst), 1);
    assert_eq!(store.list_players().await?.len(), 10);
    Ok(())
}

//! Timeline snapshot derivation.
//!
//! For eligible queues, the timeline payload is reduced to per-participant
//! snapshots at fixed minute marks (gold, experience, creep score, level).
//! Frames rarely land exactly on a minute boundary; the nearest frame is
//! used and the distance is recorded as a quality marker. Snapshots are
//! replaced wholesale per `(match, minute)`, so re-derivation is
//! idempotent.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn, Instrument};

use rift_core::MatchRecordId;
use rift_riot::types::FrameDto;
use rift_riot::RiotApi;

use crate::config::IngestConfig;
use crate::error::Result;
use crate::fetch::{BackoffPolicy, FetchStatus, TimelineFetchState, TimelineStatus};
use crate::store::Store;

/// How close the chosen frame was to the requested minute mark.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameQuality {
    /// Within a second of the mark.
    Exact,
    /// The nearest available frame, more than a second off.
    Nearest,
}

/// One participant's state at a minute mark.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineSnapshot {
    /// Owning match.
    pub match_record_id: MatchRecordId,
    /// Participant slot, 1 through 10.
    pub slot: u8,
    /// The minute mark.
    pub minute: u32,
    /// Total gold at the mark.
    pub gold: i32,
    /// Experience at the mark.
    pub xp: i32,
    /// Lane plus jungle minions killed at the mark.
    pub creep_score: i32,
    /// Champion level at the mark.
    pub level: i32,
    /// Timestamp of the frame the values came from, in milliseconds.
    pub frame_timestamp_ms: i64,
    /// How close that frame was to the mark.
    pub quality: FrameQuality,
}

/// Picks the frame closest to `minute`, or `None` when the game ended
/// before the mark.
///
/// A game is considered to have reached the mark if the mark falls within
/// one frame interval of the last frame.
#[must_use]
pub fn select_frame(
    frames: &[FrameDto],
    frame_interval_ms: i64,
    minute: u32,
) -> Option<(&FrameDto, FrameQuality)> {
    let target = i64::from(minute) * 60_000;
    let last = frames.last()?;
    if target > last.timestamp + frame_interval_ms {
        return None;
    }

    let best = frames
        .iter()
        .min_by_key(|frame| (frame.timestamp - target).abs())?;
    let quality = if (best.timestamp - target).abs() < 1000 {
        FrameQuality::Exact
    } else {
        FrameQuality::Nearest
    };
    Some((best, quality))
}

/// Counters for one backfill sweep.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TimelineSweepReport {
    /// Matches whose timeline was fetched.
    pub examined: usize,
    /// Matches whose snapshots were (re)derived.
    pub derived: usize,
    /// Matches whose fetch failed.
    pub failed: usize,
    /// Matches newly marked ineligible by queue.
    pub marked_not_applicable: usize,
    /// Matches skipped as already done, backing off, or exhausted.
    pub skipped: usize,
}

/// Derives minute-mark snapshots for ingested matches.
pub struct TimelineDeriver {
    api: Arc<dyn RiotApi>,
    store: Arc<dyn Store>,
    backoff: BackoffPolicy,
    config: IngestConfig,
}

impl TimelineDeriver {
    /// Creates a deriver over the given upstream and store.
    #[must_use]
    pub fn new(api: Arc<dyn RiotApi>, store: Arc<dyn Store>, config: IngestConfig) -> Self {
        Self {
            api,
            store,
            backoff: BackoffPolicy::default(),
            config,
        }
    }

    /// Sweeps ingested matches and derives missing snapshots, evaluated at
    /// `now`. At most `limit` timelines are fetched.
    pub async fn run_backfill_sweep_at(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<TimelineSweepReport> {
        let span = rift_core::observability::sweep_span("timeline-backfill");
        self.sweep_inner(now, limit).instrument(span).await
    }

    async fn sweep_inner(&self, now: DateTime<Utc>, limit: usize) -> Result<TimelineSweepReport> {
        let matches = self.store.matches_with_status(FetchStatus::Success).await?;
        let mut report = TimelineSweepReport::default();

        for record in matches {
            if report.examined >= limit {
                break;
            }

            let mut state = self
                .store
                .get_timeline_state(record.id)
                .await?
                .unwrap_or_else(|| TimelineFetchState::new(record.id));

            if !self.config.timeline_queues.contains(&record.queue_id) {
                if state.status != TimelineStatus::NotApplicable {
                    state.mark_not_applicable();
                    self.store.save_timeline_state(&state).await?;
                    report.marked_not_applicable += 1;
                }
                continue;
            }
            if !state.is_due_at(now, &self.backoff, self.config.timeline_max_attempts) {
                report.skipped += 1;
                continue;
            }
            let Some(region) = record.region() else {
                warn!(match_id = %record.match_id, "cannot derive region for timeline fetch");
                continue;
            };

            report.examined += 1;
            match self
                .api
                .timeline_by_id(region.routing(), &record.match_id)
                .await
            {
                Ok(dto) => {
                    self.derive_snapshots(record.id, &dto.info.frames, dto.info.frame_interval)
                        .await?;
                    state.record_success_at(now, record.game_version.clone());
                    self.store.save_timeline_state(&state).await?;
                    report.derived += 1;
                }
                Err(error) => {
                    state.record_failure_at(
                        now,
                        &error.to_string(),
                        self.config.timeline_max_attempts,
                    );
                    self.store.save_timeline_state(&state).await?;
                    report.failed += 1;
                    debug!(match_id = %record.match_id, %error, "timeline fetch failed");
                }
            }
        }

        info!(
            examined = report.examined,
            derived = report.derived,
            failed = report.failed,
            not_applicable = report.marked_not_applicable,
            skipped = report.skipped,
            "timeline backfill sweep complete"
        );
        Ok(report)
    }

    async fn derive_snapshots(
        &self,
        id: MatchRecordId,
        frames: &[FrameDto],
        frame_interval_ms: i64,
    ) -> Result<()> {
        for &minute in &self.config.minute_marks {
            let Some((frame, quality)) = select_frame(frames, frame_interval_ms, minute) else {
                // Game ended before the mark; nothing to record.
                continue;
            };

            let mut rows: Vec<TimelineSnapshot> = frame
                .participant_frames
                .iter()
                .filter_map(|(key, pf)| {
                    let slot: u8 = key.parse().ok()?;
                    Some(TimelineSnapshot {
                        match_record_id: id,
                        slot,
                        minute,
                        gold: pf.total_gold,
                        xp: pf.xp,
                        creep_score: pf.creep_score(),
                        level: pf.level,
                        frame_timestamp_ms: frame.timestamp,
                        quality,
                    })
                })
                .collect();
            rows.sort_by_key(|row| row.slot);
            self.store.replace_snapshots(id, minute, &rows).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(timestamp: i64) -> FrameDto {
        serde_json::from_value(serde_json::json!({
            "timestamp": timestamp,
            "participantFrames": {}
        }))
        .expect("frame")
    }

    #[test]
    fn exact_frame_on_the_mark() {
        let frames = vec![frame(0), frame(60_000), frame(120_000)];
        let (best, quality) = select_frame(&frames, 60_000, 1).expect("frame");
        assert_eq!(best.timestamp, 60_000);
        assert_eq!(quality, FrameQuality::Exact);
    }

    #[test]
    fn nearest_frame_when_off_the_mark() {
        // Frames drift by a few seconds, as real payloads do.
        let frames = vec![frame(0), frame(61_500), frame(123_000)];
        let (best, quality) = select_frame(&frames, 60_000, 1).expect("frame");
        assert_eq!(best.timestamp, 61_500);
        assert_eq!(quality, FrameQuality::Nearest);
    }

    #[test]
    fn sub_second_drift_still_counts_as_exact() {
        let frames = vec![frame(0), frame(600_900)];
        let (_, quality) = select_frame(&frames, 60_000, 10).expect("frame");
        assert_eq!(quality, FrameQuality::Exact);
    }

    #[test]
    fn marks_past_game_end_are_missing() {
        // A 12-minute game cannot produce a 15-minute snapshot.
        let frames: Vec<FrameDto> = (0..=12).map(|m| frame(m * 60_000)).collect();
        assert!(select_frame(&frames, 60_000, 15).is_none());
        assert!(select_frame(&frames, 60_000, 12).is_some());
        // The mark one interval past the last frame is still reachable.
        assert!(select_frame(&frames, 60_000, 13).is_some());
        assert!(select_frame(&frames, 60_000, 14).is_none());
    }

    #[test]
    fn empty_timeline_yields_nothing() {
        assert!(select_frame(&[], 60_000, 10).is_none());
    }
}

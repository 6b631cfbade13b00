//! Engine configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the ingestion engine.
///
/// All knobs have production defaults; tests override individual fields with
/// the `with_` builders.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct IngestConfig {
    /// TTL on the advisory refresh lock. Bounds how long a crashed worker
    /// can block a player's refresh.
    #[serde(with = "humantime_serde")]
    pub refresh_lock_ttl: Duration,

    /// Maximum candidates examined per scheduler sweep.
    pub max_candidates: usize,

    /// Maximum jobs enqueued per scheduler sweep.
    pub max_queued: usize,

    /// Whether favorited players are scheduled ahead of the general pool.
    pub prioritize_favorites: bool,

    /// A player whose data is older than this is a refresh candidate.
    #[serde(with = "humantime_serde")]
    pub stale_cutoff: Duration,

    /// Matches older than this are not ingested or retried.
    #[serde(with = "humantime_serde")]
    pub retention_window: Duration,

    /// Fetch attempts before a match is marked permanently unfetchable.
    pub max_fetch_attempts: u32,

    /// Timeline fetch attempts before the timeline is marked permanently
    /// failed.
    pub timeline_max_attempts: u32,

    /// How many recent match ids to list per refresh.
    pub match_history_count: u32,

    /// Optional upstream queue filter for the match-id listing.
    pub match_queue_filter: Option<i32>,

    /// Queue ids eligible for timeline derivation.
    pub timeline_queues: Vec<i32>,

    /// Minute marks at which timeline snapshots are derived.
    pub minute_marks: Vec<u32>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            refresh_lock_ttl: Duration::from_secs(120),
            max_candidates: 50,
            max_queued: 10,
            prioritize_favorites: true,
            stale_cutoff: Duration::from_secs(3600),
            retention_window: Duration::from_secs(730 * 24 * 3600),
            max_fetch_attempts: 5,
            timeline_max_attempts: 5,
            match_history_count: 20,
            match_queue_filter: None,
            timeline_queues: vec![420, 440],
            minute_marks: vec![10, 15],
        }
    }
}

impl IngestConfig {
    /// Sets the refresh lock TTL.
    #[must_use]
    pub fn with_refresh_lock_ttl(mut self, ttl: Duration) -> Self {
        self.refresh_lock_ttl = ttl;
        self
    }

    /// Sets the per-sweep candidate cap.
    #[must_use]
    pub fn with_max_candidates(mut self, max: usize) -> Self {
        self.max_candidates = max;
        self
    }

    /// Sets the per-sweep enqueue cap.
    #[must_use]
    pub fn with_max_queued(mut self, max: usize) -> Self {
        self.max_queued = max;
        self
    }

    /// Enables or disables favorite prioritization.
    #[must_use]
    pub fn with_prioritize_favorites(mut self, enabled: bool) -> Self {
        self.prioritize_favorites = enabled;
        self
    }

    /// Sets the staleness cutoff.
    #[must_use]
    pub fn with_stale_cutoff(mut self, cutoff: Duration) -> Self {
        self.stale_cutoff = cutoff;
        self
    }

    /// Sets the retention window.
    #[must_use]
    pub fn with_retention_window(mut self, window: Duration) -> Self {
        self.retention_window = window;
        self
    }

    /// Sets the match fetch attempt ceiling.
    #[must_use]
    pub fn with_max_fetch_attempts(mut self, attempts: u32) -> Self {
        self.max_fetch_attempts = attempts;
        self
    }

    /// Sets the number of recent match ids listed per refresh.
    #[must_use]
    pub fn with_match_history_count(mut self, count: u32) -> Self {
        self.match_history_count = count;
        self
    }

    /// Sets the minute marks for timeline snapshot derivation.
    #[must_use]
    pub fn with_minute_marks(mut self, marks: Vec<u32>) -> Self {
        self.minute_marks = marks;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = IngestConfig::default();
        assert_eq!(config.refresh_lock_ttl, Duration::from_secs(120));
        assert_eq!(config.max_queued, 10);
        assert!(config.max_candidates >= config.max_queued);
        assert_eq!(config.timeline_queues, vec![420, 440]);
    }

    #[test]
    fn humantime_roundtrip() {
        let config = IngestConfig::default().with_stale_cutoff(Duration::from_secs(90));
        let json = serde_json::to_string(&config).expect("serialize");
        assert!(json.contains("\"stale_cutoff\":\"1m 30s\""));

        let parsed: IngestConfig = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(parsed.stale_cutoff, Duration::from_secs(90));
    }

    #[test]
    fn partial_config_fills_defaults() {
        let parsed: IngestConfig =
            serde_json::from_str(r#"{"max_queued": 3}"#).expect("deserialize");
        assert_eq!(parsed.max_queued, 3);
        assert_eq!(parsed.max_fetch_attempts, 5);
    }
}

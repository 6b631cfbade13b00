//! Observability metrics for the ingestion engine.
//!
//! Prometheus-compatible metrics via the `metrics` crate facade.
//!
//! ## Metrics Exported
//!
//! | Metric | Type | Labels | Description |
//! |--------|------|--------|-------------|
//! | `rift_ingest_refreshes_total` | Counter | `result` | Player refresh outcomes |
//! | `rift_ingest_refresh_duration_seconds` | Histogram | - | End-to-end refresh duration |
//! | `rift_ingest_matches_total` | Counter | `status` | Matches persisted by fetch status |
//! | `rift_ingest_fetch_retries_total` | Counter | `attempt` | Match fetch retry attempts |
//! | `rift_ingest_queue_depth` | Gauge | `queue` | Refresh jobs waiting |
//! | `rift_ingest_sweeps_total` | Counter | `sweep`, `status` | Sweep runs by kind and outcome |
//! | `rift_ingest_locks_total` | Counter | `result` | Lock acquisition outcomes |
//! | `rift_ingest_timelines_total` | Counter | `status` | Timeline derivation outcomes |
//!
//! ## Usage
//!
//! ```rust,no_run
//! use rift_ingest::metrics::IngestMetrics;
//!
//! let metrics = IngestMetrics::new();
//! metrics.record_refresh("success");
//! metrics.set_queue_depth("refresh-jobs", 4);
//! ```
//!
//! To export to Prometheus, install a recorder at startup, e.g. with
//! `metrics_exporter_prometheus::PrometheusBuilder`.

use std::time::{Duration, Instant};

use metrics::{counter, gauge, histogram};

/// Metric names as constants for consistency.
pub mod names {
    /// Counter: Player refresh outcomes.
    pub const REFRESHES_TOTAL: &str = "rift_ingest_refreshes_total";
    /// Histogram: End-to-end refresh duration in seconds.
    pub const REFRESH_DURATION_SECONDS: &str = "rift_ingest_refresh_duration_seconds";
    /// Counter: Matches persisted by fetch status.
    pub const MATCHES_TOTAL: &str = "rift_ingest_matches_total";
    /// Counter: Match fetch retry attempts.
    pub const FETCH_RETRIES_TOTAL: &str = "rift_ingest_fetch_retries_total";
    /// Gauge: Refresh jobs waiting in the queue.
    pub const QUEUE_DEPTH: &str = "rift_ingest_queue_depth";
    /// Counter: Sweep runs by kind and outcome.
    pub const SWEEPS_TOTAL: &str = "rift_ingest_sweeps_total";
    /// Counter: Lock acquisition outcomes.
    pub const LOCKS_TOTAL: &str = "rift_ingest_locks_total";
    /// Counter: Timeline derivation outcomes.
    pub const TIMELINES_TOTAL: &str = "rift_ingest_timelines_total";
}

/// Label keys used across metrics.
pub mod labels {
    /// Result status (success, failure, duplicate, not_found).
    pub const RESULT: &str = "result";
    /// Fetch or timeline status label.
    pub const STATUS: &str = "status";
    /// Queue name.
    pub const QUEUE: &str = "queue";
    /// Sweep kind (candidate, failed-match-retry, timeline-backfill, runes).
    pub const SWEEP: &str = "sweep";
}

/// High-level interface for recording ingestion metrics.
///
/// Cheap to clone and share across tasks.
#[derive(Debug, Clone, Default)]
pub struct IngestMetrics {
    _private: (),
}

impl IngestMetrics {
    /// Creates a new metrics recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a refresh outcome.
    pub fn record_refresh(&self, result: &str) {
        counter!(
            names::REFRESHES_TOTAL,
            labels::RESULT => result.to_string(),
        )
        .increment(1);
    }

    /// Records end-to-end refresh duration.
    pub fn observe_refresh_duration(&self, duration: Duration) {
        histogram!(names::REFRESH_DURATION_SECONDS).record(duration.as_secs_f64());
    }

    /// Records a match persisted in the given fetch status.
    pub fn record_match(&self, status: &str) {
        counter!(
            names::MATCHES_TOTAL,
            labels::STATUS => status.to_string(),
        )
        .increment(1);
    }

    /// Records a match fetch retry attempt.
    pub fn record_fetch_retry(&self, attempt: u32) {
        counter!(
            names::FETCH_RETRIES_TOTAL,
            "attempt" => attempt.to_string(),
        )
        .increment(1);
    }

    /// Sets the refresh queue depth.
    #[allow(clippy::cast_precision_loss)] // Gauge values are typically small
    pub fn set_queue_depth(&self, queue: &str, depth: usize) {
        gauge!(
            names::QUEUE_DEPTH,
            labels::QUEUE => queue.to_string(),
        )
        .set(depth as f64);
    }

    /// Records a sweep run with its outcome.
    pub fn record_sweep(&self, sweep: &str, status: &str) {
        counter!(
            names::SWEEPS_TOTAL,
            labels::SWEEP => sweep.to_string(),
            labels::STATUS => status.to_string(),
        )
        .increment(1);
    }

    /// Records a lock acquisition outcome.
    pub fn record_lock(&self, result: &str) {
        counter!(
            names::LOCKS_TOTAL,
            labels::RESULT => result.to_string(),
        )
        .increment(1);
    }

    /// Records a timeline derivation outcome.
    pub fn record_timeline(&self, status: &str) {
        counter!(
            names::TIMELINES_TOTAL,
            labels::STATUS => status.to_string(),
        )
        .increment(1);
    }
}

/// RAII guard for timing operations; records on drop.
pub struct TimingGuard<F>
where
    F: FnOnce(Duration),
{
    start: Instant,
    on_drop: Option<F>,
}

impl<F> TimingGuard<F>
where
    F: FnOnce(Duration),
{
    /// Creates a guard that calls `on_drop` with the elapsed duration.
    pub fn new(on_drop: F) -> Self {
        Self {
            start: Instant::now(),
            on_drop: Some(on_drop),
        }
    }

    /// Returns the elapsed time since the guard was created.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl<F> Drop for TimingGuard<F>
where
    F: FnOnce(Duration),
{
    fn drop(&mut self) {
        if let Some(f) = self.on_drop.take() {
            f(self.start.elapsed());
        }
    }
}

/// Creates a timing guard for refresh duration.
#[must_use]
pub fn time_refresh() -> TimingGuard<impl FnOnce(Duration)> {
    TimingGuard::new(|duration| {
        histogram!(names::REFRESH_DURATION_SECONDS).record(duration.as_secs_f64());
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_without_a_recorder_does_not_panic() {
        let metrics = IngestMetrics::new();
        metrics.record_refresh("success");
        metrics.record_match("temporary_failure");
        metrics.record_sweep("candidate", "complete");
        metrics.set_queue_depth("refresh-jobs", 3);
        metrics.observe_refresh_duration(Duration::from_millis(250));
    }

    #[test]
    fn timing_guard_records_on_drop() {
        let mut recorded = None;
        {
            let _guard = TimingGuard::new(|d| {
                recorded = Some(d);
            });
            std::thread::sleep(Duration::from_millis(5));
        }
        assert!(recorded.is_some_and(|d| d >= Duration::from_millis(5)));
    }
}

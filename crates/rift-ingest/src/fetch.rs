//! Fetch lifecycle state machines for match details and timelines.
//!
//! Both trackers follow the same shape:
//!
//! - a status enum with explicit terminal states and a transition predicate
//! - a retry counter with an escalation ceiling
//! - exponential backoff between attempts, evaluated against an injected
//!   clock so eligibility is deterministic under test

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use rift_core::MatchRecordId;

/// Stored error descriptions are truncated to this many characters.
const MAX_ERROR_LEN: usize = 500;

fn truncate_error(error: &str) -> String {
    if error.len() <= MAX_ERROR_LEN {
        error.to_owned()
    } else {
        let mut cut = MAX_ERROR_LEN;
        while !error.is_char_boundary(cut) {
            cut -= 1;
        }
        error[..cut].to_owned()
    }
}

/// Where a match is in its fetch lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchStatus {
    /// Discovered but never attempted.
    Unfetched,
    /// Full detail fetched and persisted. Terminal.
    Success,
    /// Last attempt failed; eligible for retry after backoff.
    TemporaryFailure,
    /// Retry budget exhausted or upstream says the match does not exist.
    /// Terminal.
    PermanentlyUnfetchable,
    /// Older than the retention window; never fetched or retried. Terminal.
    OutsideRetentionWindow,
}

impl FetchStatus {
    /// Returns true if no further transition out of this status is allowed.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Success | Self::PermanentlyUnfetchable | Self::OutsideRetentionWindow
        )
    }

    /// Returns true if the transition to `next` is allowed.
    #[must_use]
    pub const fn can_transition_to(&self, next: Self) -> bool {
        match self {
            Self::Unfetched | Self::TemporaryFailure => !matches!(next, Self::Unfetched),
            Self::Success | Self::PermanentlyUnfetchable | Self::OutsideRetentionWindow => false,
        }
    }

    /// Returns the status as a stable label for logs and metrics.
    #[must_use]
    pub const fn as_label(&self) -> &'static str {
        match self {
            Self::Unfetched => "unfetched",
            Self::Success => "success",
            Self::TemporaryFailure => "temporary_failure",
            Self::PermanentlyUnfetchable => "permanently_unfetchable",
            Self::OutsideRetentionWindow => "outside_retention_window",
        }
    }
}

impl fmt::Display for FetchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_label())
    }
}

/// Exponential backoff schedule for retryable fetch failures.
///
/// `delay_for(n)` is the wait after the n-th failed attempt (1-based); the
/// final step repeats once the schedule is exhausted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackoffPolicy {
    steps: Vec<Duration>,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            steps: vec![
                Duration::from_secs(30),
                Duration::from_secs(60),
                Duration::from_secs(120),
                Duration::from_secs(300),
            ],
        }
    }
}

impl BackoffPolicy {
    /// Creates a policy from explicit steps. Must be non-empty.
    #[must_use]
    pub fn new(steps: Vec<Duration>) -> Self {
        assert!(!steps.is_empty(), "backoff policy needs at least one step");
        Self { steps }
    }

    /// Returns the delay after the given 1-based attempt number.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let index = (attempt.max(1) as usize - 1).min(self.steps.len() - 1);
        self.steps[index]
    }
}

/// The fetch lifecycle state embedded in a [`crate::MatchRecord`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchTracker {
    /// Current status.
    pub status: FetchStatus,
    /// Failed attempts so far.
    pub retry_count: u32,
    /// When the last attempt (success or failure) happened.
    pub last_attempt_at: Option<DateTime<Utc>>,
    /// Truncated description of the last failure.
    pub last_error: Option<String>,
    /// When the fetch succeeded.
    pub fetched_at: Option<DateTime<Utc>>,
}

impl Default for FetchTracker {
    fn default() -> Self {
        Self {
            status: FetchStatus::Unfetched,
            retry_count: 0,
            last_attempt_at: None,
            last_error: None,
            fetched_at: None,
        }
    }
}

impl FetchTracker {
    /// Records a successful fetch at the given instant.
    pub fn record_success_at(&mut self, now: DateTime<Utc>) {
        self.status = FetchStatus::Success;
        self.last_attempt_at = Some(now);
        self.last_error = None;
        self.fetched_at = Some(now);
    }

    /// Records a failed attempt, escalating to permanently unfetchable once
    /// the attempt ceiling is reached.
    pub fn record_failure_at(&mut self, now: DateTime<Utc>, error: &str, max_attempts: u32) {
        self.retry_count += 1;
        self.last_attempt_at = Some(now);
        self.last_error = Some(truncate_error(error));
        self.status = if self.retry_count >= max_attempts {
            FetchStatus::PermanentlyUnfetchable
        } else {
            FetchStatus::TemporaryFailure
        };
    }

    /// Marks the match permanently unfetchable regardless of remaining
    /// budget. Used when the upstream reports the match does not exist.
    pub fn mark_unfetchable_at(&mut self, now: DateTime<Utc>, error: &str) {
        self.retry_count += 1;
        self.last_attempt_at = Some(now);
        self.last_error = Some(truncate_error(error));
        self.status = FetchStatus::PermanentlyUnfetchable;
    }

    /// Marks the match outside the retention window.
    pub fn mark_outside_retention(&mut self) {
        self.status = FetchStatus::OutsideRetentionWindow;
        self.last_error = None;
    }

    /// Returns true if a retry is due at `now` under the given backoff.
    ///
    /// Only temporary failures are ever due; the delay grows with the number
    /// of failed attempts.
    #[must_use]
    pub fn is_retry_due_at(&self, now: DateTime<Utc>, backoff: &BackoffPolicy) -> bool {
        if self.status != FetchStatus::TemporaryFailure {
            return false;
        }
        let Some(last) = self.last_attempt_at else {
            return true;
        };
        let delay = backoff.delay_for(self.retry_count);
        let Ok(delay) = ChronoDuration::from_std(delay) else {
            return false;
        };
        now >= last + delay
    }
}

/// Where a match's timeline is in its fetch lifecycle.
///
/// Tracked separately from the detail fetch: a match can be fully ingested
/// while its timeline is still pending or has failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimelineStatus {
    /// Not yet attempted.
    Unset,
    /// Timeline fetched and snapshots derived.
    Success,
    /// Last attempt failed; eligible for retry after backoff.
    TemporaryFailure,
    /// Retry budget exhausted. Terminal.
    PermanentlyFailed,
    /// The match's queue is not eligible for timeline derivation. Terminal.
    NotApplicable,
}

impl TimelineStatus {
    /// Returns true if no further attempt will be made from this status.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::PermanentlyFailed | Self::NotApplicable)
    }

    /// Returns the status as a stable label for logs and metrics.
    #[must_use]
    pub const fn as_label(&self) -> &'static str {
        match self {
            Self::Unset => "unset",
            Self::Success => "success",
            Self::TemporaryFailure => "temporary_failure",
            Self::PermanentlyFailed => "permanently_failed",
            Self::NotApplicable => "not_applicable",
        }
    }
}

impl fmt::Display for TimelineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_label())
    }
}

/// Per-match timeline fetch state.
///
/// Unlike the detail tracker, success is re-enterable: a successful fetch
/// resets the retry budget so a later re-derivation starts fresh.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineFetchState {
    /// Owning match.
    pub match_record_id: MatchRecordId,
    /// Current status.
    pub status: TimelineStatus,
    /// Failed attempts since the last success.
    pub retry_count: u32,
    /// When the last attempt happened.
    pub last_attempt_at: Option<DateTime<Utc>>,
    /// When the last successful fetch happened.
    pub last_success_at: Option<DateTime<Utc>>,
    /// Truncated description of the last failure.
    pub last_error: Option<String>,
    /// Patch the timeline data was sourced on.
    pub source_patch: Option<String>,
}

impl TimelineFetchState {
    /// Creates a fresh, unattempted state for a match.
    #[must_use]
    pub fn new(match_record_id: MatchRecordId) -> Self {
        Self {
            match_record_id,
            status: TimelineStatus::Unset,
            retry_count: 0,
            last_attempt_at: None,
            last_success_at: None,
            last_error: None,
            source_patch: None,
        }
    }

    /// Records a successful fetch, resetting the retry budget.
    pub fn record_success_at(&mut self, now: DateTime<Utc>, patch: impl Into<String>) {
        self.status = TimelineStatus::Success;
        self.retry_count = 0;
        self.last_attempt_at = Some(now);
        self.last_success_at = Some(now);
        self.last_error = None;
        self.source_patch = Some(patch.into());
    }

    /// Records a failed attempt, escalating at the ceiling.
    pub fn record_failure_at(&mut self, now: DateTime<Utc>, error: &str, max_attempts: u32) {
        self.retry_count += 1;
        self.last_attempt_at = Some(now);
        self.last_error = Some(truncate_error(error));
        self.status = if self.retry_count >= max_attempts {
            TimelineStatus::PermanentlyFailed
        } else {
            TimelineStatus::TemporaryFailure
        };
    }

    /// Marks the match's queue ineligible for timeline derivation.
    pub fn mark_not_applicable(&mut self) {
        self.status = TimelineStatus::NotApplicable;
        self.last_error = None;
    }

    /// Returns true if a fetch attempt is due at `now`.
    #[must_use]
    pub fn is_due_at(&self, now: DateTime<Utc>, backoff: &BackoffPolicy, max_attempts: u32) -> bool {
        match self.status {
            TimelineStatus::Unset => true,
            TimelineStatus::TemporaryFailure => {
                if self.retry_count >= max_attempts {
                    return false;
                }
                let Some(last) = self.last_attempt_at else {
                    return true;
                };
                let delay = backoff.delay_for(self.retry_count);
                let Ok(delay) = ChronoDuration::from_std(delay) else {
                    return false;
                };
                now >= last + delay
            }
            TimelineStatus::Success
            | TimelineStatus::PermanentlyFailed
            | TimelineStatus::NotApplicable => false,
        }
    }
}

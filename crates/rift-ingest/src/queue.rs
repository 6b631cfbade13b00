//! Refresh job queue abstraction.
//!
//! The scheduler enqueues; workers drain. The queue deduplicates on the
//! job's lock key while a job is waiting, so a player is never queued twice
//! concurrently, and reports dedup and capacity outcomes explicitly so the
//! scheduler can release the lock it took optimistically.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use rift_core::PlayerIdentity;

use crate::error::{Error, Result};

/// A queued player refresh.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshJob {
    /// The player to refresh.
    pub identity: PlayerIdentity,
    /// The refresh lock key held on the player's behalf.
    pub lock_key: String,
    /// When the job was enqueued.
    pub enqueued_at: DateTime<Utc>,
}

/// Options for a single enqueue.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnqueueOptions {
    /// Delay before the job becomes visible to workers.
    pub delay: Option<Duration>,
}

/// Outcome of an enqueue attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnqueueResult {
    /// The job was accepted.
    Enqueued {
        /// Queue-assigned message id.
        message_id: String,
    },
    /// An equivalent job (same lock key) is already waiting.
    Deduplicated {
        /// The id of the already-queued message.
        existing_message_id: String,
    },
    /// The queue is at capacity.
    QueueFull,
}

impl EnqueueResult {
    /// Returns true if a new job was accepted.
    #[must_use]
    pub const fn is_enqueued(&self) -> bool {
        matches!(self, Self::Enqueued { .. })
    }

    /// Returns the message id, for enqueued or deduplicated outcomes.
    #[must_use]
    pub fn message_id(&self) -> Option<&str> {
        match self {
            Self::Enqueued { message_id } => Some(message_id),
            Self::Deduplicated {
                existing_message_id,
            } => Some(existing_message_id),
            Self::QueueFull => None,
        }
    }
}

/// A queue of refresh jobs.
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Enqueues a job.
    async fn enqueue(&self, job: RefreshJob, options: EnqueueOptions) -> Result<EnqueueResult>;

    /// Returns the number of jobs currently waiting.
    async fn queue_depth(&self) -> Result<usize>;

    /// Returns the queue's name, for logs and metrics.
    fn queue_name(&self) -> &str;
}

struct QueuedMessage {
    message_id: String,
    job: RefreshJob,
    visible_at: DateTime<Utc>,
}

#[derive(Default)]
struct QueueState {
    messages: VecDeque<QueuedMessage>,
    next_id: u64,
}

/// In-memory implementation of [`JobQueue`].
pub struct InMemoryJobQueue {
    state: Mutex<QueueState>,
    capacity: Option<usize>,
    fail_next: AtomicBool,
}

impl Default for InMemoryJobQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryJobQueue {
    /// Creates an unbounded queue.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            capacity: None,
            fail_next: AtomicBool::new(false),
        }
    }

    /// Creates a queue that reports [`EnqueueResult::QueueFull`] beyond
    /// `capacity` waiting jobs.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            capacity: Some(capacity),
            fail_next: AtomicBool::new(false),
        }
    }

    /// Makes the next enqueue fail with a storage error. For tests.
    pub fn fail_next_enqueue(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    /// Pops the oldest job visible at `now`, if any.
    pub fn pop_ready_at(&self, now: DateTime<Utc>) -> Result<Option<RefreshJob>> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| Error::storage("queue mutex poisoned"))?;
        let position = state
            .messages
            .iter()
            .position(|message| message.visible_at <= now);
        Ok(position
            .and_then(|index| state.messages.remove(index))
            .map(|message| message.job))
    }
}

#[async_trait]
impl JobQueue for InMemoryJobQueue {
    async fn enqueue(&self, job: RefreshJob, options: EnqueueOptions) -> Result<EnqueueResult> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(Error::storage("scripted enqueue failure"));
        }

        let mut state = self
            .state
            .lock()
            .map_err(|_| Error::storage("queue mutex poisoned"))?;

        if let Some(existing) = state
            .messages
            .iter()
            .find(|message| message.job.lock_key == job.lock_key)
        {
            return Ok(EnqueueResult::Deduplicated {
                existing_message_id: existing.message_id.clone(),
            });
        }

        if let Some(capacity) = self.capacity {
            if state.messages.len() >= capacity {
                return Ok(EnqueueResult::QueueFull);
            }
        }

        state.next_id += 1;
        let message_id = format!("msg-{}", state.next_id);
        let visible_at = match options.delay {
            Some(delay) => {
                job.enqueued_at
                    + chrono::Duration::from_std(delay)
                        .map_err(|e| Error::storage(format!("enqueue delay out of range: {e}")))?
            }
            None => job.enqueued_at,
        };
        state.messages.push_back(QueuedMessage {
            message_id: message_id.clone(),
            job,
            visible_at,
        });
        Ok(EnqueueResult::Enqueued { message_id })
    }

    async fn queue_depth(&self) -> Result<usize> {
        let state = self
            .state
            .lock()
            .map_err(|_| Error::storage("queue mutex poisoned"))?;
        Ok(state.messages.len())
    }

    fn queue_name(&self) -> &str {
        "refresh-jobs"
    }
}

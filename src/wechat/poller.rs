//! Publish-status polling
//!
//! Publication is asynchronous platform-side: after `freepublish/submit`
//! the task sits in `PUBLISHING` until the platform finishes (or rejects)
//! it. [`StatusPoller`] drives a bounded sleep-then-retry loop over a
//! status source and classifies the result into exactly one of three
//! outcomes:
//!
//! - [`PollOutcome::Published`] - terminal success, with the live URLs
//! - [`PollOutcome::Failed`] - terminal failure, with the platform's own
//!   description and failed-article indexes
//! - [`PollOutcome::Unknown`] - retry budget exhausted while the task was
//!   still in flight; the task may yet succeed or fail and has to be
//!   checked manually
//!
//! "Still publishing" is never reported as a failure, and an unobserved
//! final state is never guessed. The clock and status source are injected
//! so the loop is deterministic under test.

use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::draft::{DraftPublisher, PublishStatus, PublishStatusInfo};
use super::ApiError;

/// Default seconds between polls.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;

/// Default number of polls before giving up.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;

/// Anything that can report the state of a publish task.
#[async_trait]
pub trait StatusSource: Send + Sync {
    async fn publish_status(&self, publish_id: u64) -> Result<PublishStatusInfo, ApiError>;
}

#[async_trait]
impl StatusSource for DraftPublisher {
    async fn publish_status(&self, publish_id: u64) -> Result<PublishStatusInfo, ApiError> {
        self.get_publish_status(publish_id).await
    }
}

/// Injectable sleep, so tests run without waiting.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Production sleeper backed by the tokio timer.
#[derive(Debug, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Final classification of a poll loop.
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    /// The task reached `SUCCESS`.
    Published {
        article_id: Option<String>,
        article_urls: Vec<String>,
    },
    /// The task reached a terminal failure state.
    Failed {
        status: PublishStatus,
        description: String,
        fail_indexes: Vec<u32>,
    },
    /// The retry budget ran out while the task was still `PUBLISHING`.
    /// The final state was never observed; check the task manually.
    Unknown { attempts: u32 },
}

/// Bounded-retry poll loop over a [`StatusSource`].
pub struct StatusPoller {
    interval: Duration,
    max_attempts: u32,
    sleeper: Box<dyn Sleeper>,
}

impl StatusPoller {
    /// Creates a poller with the given interval and retry budget, sleeping
    /// on the tokio timer.
    pub fn new(interval: Duration, max_attempts: u32) -> Self {
        Self::with_sleeper(interval, max_attempts, Box::new(TokioSleeper))
    }

    /// Creates a poller with an injected sleeper.
    pub fn with_sleeper(interval: Duration, max_attempts: u32, sleeper: Box<dyn Sleeper>) -> Self {
        Self {
            interval,
            max_attempts,
            sleeper,
        }
    }

    /// Polls until the task reaches a terminal state or the retry budget is
    /// exhausted. The first poll happens immediately; sleeps only occur
    /// between polls.
    ///
    /// Transport or platform errors from the source abort the loop and
    /// propagate; only `PUBLISHING` keeps it going.
    pub async fn poll(
        &self,
        source: &dyn StatusSource,
        publish_id: u64,
    ) -> Result<PollOutcome, ApiError> {
        for attempt in 1..=self.max_attempts {
            debug!(publish_id, attempt, max = self.max_attempts, "checking publish status");
            let status = source.publish_status(publish_id).await?;

            match status.status {
                PublishStatus::Success => {
                    info!(
                        publish_id,
                        article_id = status.article_id.as_deref().unwrap_or(""),
                        "publish succeeded"
                    );
                    return Ok(PollOutcome::Published {
                        article_id: status.article_id,
                        article_urls: status.article_urls,
                    });
                }
                PublishStatus::Publishing => {
                    debug!(publish_id, "still publishing");
                    if attempt < self.max_attempts {
                        self.sleeper.sleep(self.interval).await;
                    }
                }
                failed => {
                    warn!(
                        publish_id,
                        status = %failed,
                        fail_indexes = ?status.fail_indexes,
                        "publish failed"
                    );
                    return Ok(PollOutcome::Failed {
                        status: failed,
                        description: status.status_description,
                        fail_indexes: status.fail_indexes,
                    });
                }
            }
        }

        warn!(
            publish_id,
            attempts = self.max_attempts,
            "retry budget exhausted with task still publishing; check status manually"
        );
        Ok(PollOutcome::Unknown {
            attempts: self.max_attempts,
        })
    }
}

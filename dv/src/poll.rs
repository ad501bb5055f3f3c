//! Caller-side completion polling
//!
//! `TaskManager::status` is a single non-blocking probe. Callers that want to
//! wait for a task use this helper, which owns the cadence and the deadline.

use std::time::Duration;

use thiserror::Error;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::debug;

use crate::error::StatusError;
use crate::identity::TaskId;
use crate::manager::TaskManager;

/// Errors from waiting on a task
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PollError {
    #[error(transparent)]
    Status(#[from] StatusError),

    #[error("Task {id} not done after {waited:?}")]
    TimedOut { id: TaskId, waited: Duration },
}

/// Polling cadence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollOptions {
    /// Minimum time between two status probes
    pub interval: Duration,
    /// Give up after this long
    pub timeout: Duration,
}

impl Default for PollOptions {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(crate::DEFAULT_POLL_INTERVAL_SECS),
            timeout: Duration::from_secs(crate::DEFAULT_POLL_TIMEOUT_SECS),
        }
    }
}

/// Poll `status` until the task is done, returning the number of probes made
pub async fn wait_for_completion(manager: &TaskManager, id: &TaskId, options: PollOptions) -> Result<u32, PollError> {
    debug!(%id, ?options, "wait_for_completion: called");
    let started = Instant::now();
    let mut ticker = tokio::time::interval(options.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut probes = 0u32;

    loop {
        ticker.tick().await;
        probes += 1;

        if manager.status(id).await? {
            debug!(%id, probes, "wait_for_completion: done");
            return Ok(probes);
        }

        let waited = started.elapsed();
        if waited >= options.timeout {
            return Err(PollError::TimedOut { id: id.clone(), waited });
        }
    }
}

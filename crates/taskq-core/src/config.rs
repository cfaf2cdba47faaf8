//! Queue configuration.
//!
//! Deserializable with defaults so it can be embedded in a larger application
//! config; `from_env` overlays `TASKQ_*` environment variables.

use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::QueueError;

pub const ENV_MAX_WORKERS: &str = "TASKQ_MAX_WORKERS";
pub const ENV_STATUS_DIR: &str = "TASKQ_STATUS_DIR";
pub const ENV_TASK_TIMEOUT_SECS: &str = "TASKQ_TASK_TIMEOUT_SECS";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Worker pool size.
    pub max_workers: usize,

    /// Where the file store keeps `task-<ULID>.json` records.
    pub status_dir: PathBuf,

    /// How long the dispatch loop waits on an empty queue before re-checking
    /// for shutdown.
    pub poll_interval_ms: u64,

    /// How often `stop()` re-checks (and logs) drain progress.
    pub drain_poll_interval_ms: u64,

    /// Upper bound on joining the dispatch loop and closing the pool.
    pub join_timeout_ms: u64,

    /// Per-task deadline. `None` waits for the work indefinitely.
    pub task_timeout_ms: Option<u64>,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_workers: default_max_workers(),
            status_dir: PathBuf::from("task_status"),
            poll_interval_ms: 1_000,
            drain_poll_interval_ms: 1_000,
            join_timeout_ms: 5_000,
            task_timeout_ms: None,
        }
    }
}

/// Host parallelism, at least 1.
pub fn default_max_workers() -> usize {
    thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

impl QueueConfig {
    pub fn with_max_workers(mut self, n: usize) -> Self {
        self.max_workers = n;
        self
    }

    pub fn with_status_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.status_dir = dir.into();
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval_ms = interval.as_millis() as u64;
        self
    }

    pub fn with_drain_poll_interval(mut self, interval: Duration) -> Self {
        self.drain_poll_interval_ms = interval.as_millis() as u64;
        self
    }

    pub fn with_task_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.task_timeout_ms = timeout.map(|t| t.as_millis() as u64);
        self
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn drain_poll_interval(&self) -> Duration {
        Duration::from_millis(self.drain_poll_interval_ms.max(1))
    }

    pub fn join_timeout(&self) -> Duration {
        Duration::from_millis(self.join_timeout_ms)
    }

    pub fn task_timeout(&self) -> Option<Duration> {
        self.task_timeout_ms.map(Duration::from_millis)
    }

    /// Defaults overlaid with `TASKQ_MAX_WORKERS`, `TASKQ_STATUS_DIR` and
    /// `TASKQ_TASK_TIMEOUT_SECS`.
    pub fn from_env() -> Result<Self, QueueError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, QueueError> {
        let mut config = Self::default();
        if let Some(v) = lookup(ENV_MAX_WORKERS) {
            config.max_workers = parse_number(ENV_MAX_WORKERS, &v)?;
        }
        if let Some(v) = lookup(ENV_STATUS_DIR) {
            config.status_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup(ENV_TASK_TIMEOUT_SECS) {
            let secs: u64 = parse_number(ENV_TASK_TIMEOUT_SECS, &v)?;
            config.task_timeout_ms = Some(secs.saturating_mul(1_000));
        }
        Ok(config)
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, QueueError> {
    value
        .trim()
        .parse()
        .map_err(|_| QueueError::InvalidConfig(format!("{key}={value:?} is not a number")))
}

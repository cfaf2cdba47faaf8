use thiserror::Error;

use crate::domain::{TaskId, TaskStatus};

/// An invalid status transition was attempted.
///
/// This is a contract bug inside the queue, not something callers handle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid status transition {from} -> {to} (task_id={task_id})")]
pub struct StateError {
    pub task_id: TaskId,
    pub from: TaskStatus,
    pub to: TaskStatus,
}

/// Failure reading or writing a status record.
///
/// The queue logs these and carries on; records are best-effort.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("status store io: {0}")]
    Io(#[from] std::io::Error),

    #[error("status record json: {0}")]
    Serde(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("processing queue is not running")]
    NotRunning,

    #[error("invalid queue config: {0}")]
    InvalidConfig(String),
}

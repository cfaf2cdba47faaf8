//! Task status state machine.

use serde::{Deserialize, Serialize};
use std::fmt;

/// TaskStatus はタスクの状態を表現
///
/// State transitions:
/// - Pending -> Processing -> Completed
/// - Pending -> Processing -> Failed
/// - Pending -> Failed (dispatch failed before the work ran)
///
/// `Canceled` is reserved for the record format; cancellation removes a
/// queued task instead of transitioning it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    /// Queued, waiting for the dispatch loop.
    Pending,

    /// Handed to the worker pool.
    Processing,

    /// Work returned a value.
    Completed,

    /// Work returned an error, panicked, timed out, or could not be dispatched.
    Failed,

    Canceled,
}

impl TaskStatus {
    /// Is this a terminal state (no further transitions)?
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Canceled
        )
    }

    /// Is `self -> next` allowed?
    pub fn can_transition_to(self, next: TaskStatus) -> bool {
        matches!(
            (self, next),
            (TaskStatus::Pending, TaskStatus::Processing)
                | (TaskStatus::Pending, TaskStatus::Failed)
                | (TaskStatus::Processing, TaskStatus::Completed)
                | (TaskStatus::Processing, TaskStatus::Failed)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Processing => "processing",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
            TaskStatus::Canceled => "canceled",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::start(TaskStatus::Pending, TaskStatus::Processing, true)]
    #[case::fail_before_run(TaskStatus::Pending, TaskStatus::Failed, true)]
    #[case::complete(TaskStatus::Processing, TaskStatus::Completed, true)]
    #[case::fail(TaskStatus::Processing, TaskStatus::Failed, true)]
    #[case::skip_processing(TaskStatus::Pending, TaskStatus::Completed, false)]
    #[case::restart(TaskStatus::Processing, TaskStatus::Processing, false)]
    #[case::back_to_pending(TaskStatus::Processing, TaskStatus::Pending, false)]
    #[case::completed_is_final(TaskStatus::Completed, TaskStatus::Failed, false)]
    #[case::failed_is_final(TaskStatus::Failed, TaskStatus::Processing, false)]
    #[case::canceled_unreachable(TaskStatus::Pending, TaskStatus::Canceled, false)]
    fn transition_table(
        #[case] from: TaskStatus,
        #[case] to: TaskStatus,
        #[case] allowed: bool,
    ) {
        assert_eq!(from.can_transition_to(to), allowed);
    }

    #[test]
    fn terminal_states() {
        assert!(!TaskStatus::Pending.is_terminal());
        assert!(!TaskStatus::Processing.is_terminal());
        assert!(TaskStatus::Completed.is_terminal());
        assert!(TaskStatus::Failed.is_terminal());
        assert!(TaskStatus::Canceled.is_terminal());
    }

    #[test]
    fn serializes_lowercase() {
        let s = serde_json::to_string(&TaskStatus::Processing).unwrap();
        assert_eq!(s, "\"processing\"");
        assert_eq!(TaskStatus::Completed.to_string(), "completed");
    }
}

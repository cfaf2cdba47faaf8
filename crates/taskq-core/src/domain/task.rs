//! Task: identity + unit of work + lifecycle record.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{TaskId, TaskStatus};
use crate::error::StateError;
use crate::worker::Work;

/// One submitted unit of work and its lifecycle.
///
/// Design:
/// - Only the dispatch loop mutates a Task, through the `mark_*` methods.
/// - Each timestamp is set exactly once and never moves backwards relative to
///   the previous one, even if the wall clock does.
pub struct Task {
    id: TaskId,
    work: Option<Work>,
    status: TaskStatus,
    result: Option<serde_json::Value>,
    error: Option<String>,
    created_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
}

impl Task {
    pub fn new(id: TaskId, work: Work, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            work: Some(work),
            status: TaskStatus::Pending,
            result: None,
            error: None,
            created_at,
            started_at: None,
            completed_at: None,
        }
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn status(&self) -> TaskStatus {
        self.status
    }

    pub fn result(&self) -> Option<&serde_json::Value> {
        self.result.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    /// Hand the work over to the dispatcher. Returns `None` the second time.
    pub fn take_work(&mut self) -> Option<Work> {
        self.work.take()
    }

    /// Pending -> Processing.
    pub fn mark_started(&mut self, now: DateTime<Utc>) -> Result<(), StateError> {
        self.transition(TaskStatus::Processing)?;
        self.started_at = Some(now.max(self.created_at));
        Ok(())
    }

    /// Processing -> Completed.
    pub fn mark_completed(
        &mut self,
        result: serde_json::Value,
        now: DateTime<Utc>,
    ) -> Result<(), StateError> {
        self.transition(TaskStatus::Completed)?;
        self.result = Some(result);
        self.completed_at = Some(self.clamp_completion(now));
        Ok(())
    }

    /// Pending | Processing -> Failed.
    pub fn mark_failed(
        &mut self,
        error: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<(), StateError> {
        self.transition(TaskStatus::Failed)?;
        self.error = Some(error.into());
        self.completed_at = Some(self.clamp_completion(now));
        // never runs after this point
        self.work = None;
        Ok(())
    }

    /// Serializable view (API response and persisted form).
    pub fn record(&self) -> TaskRecord {
        TaskRecord {
            id: self.id,
            status: self.status,
            result: self.result.clone(),
            error: self.error.clone(),
            created_at: self.created_at,
            started_at: self.started_at,
            completed_at: self.completed_at,
        }
    }

    fn transition(&mut self, to: TaskStatus) -> Result<(), StateError> {
        if !self.status.can_transition_to(to) {
            return Err(StateError {
                task_id: self.id,
                from: self.status,
                to,
            });
        }
        self.status = to;
        Ok(())
    }

    fn clamp_completion(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now.max(self.started_at.unwrap_or(self.created_at))
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("work", &self.work)
            .field("status", &self.status)
            .field("created_at", &self.created_at)
            .field("started_at", &self.started_at)
            .field("completed_at", &self.completed_at)
            .finish_non_exhaustive()
    }
}

/// Task status record.
///
/// Same shape for `get_status` responses and for the persisted snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: TaskId,
    pub status: TaskStatus,
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl TaskRecord {
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use rstest::rstest;
    use serde_json::json;
    use ulid::Ulid;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
    }

    fn new_task() -> Task {
        let work = Work::from_fn(|| Ok::<_, String>("ok"));
        Task::new(TaskId::from_ulid(Ulid::new()), work, t0())
    }

    #[test]
    fn new_task_is_pending() {
        let task = new_task();
        assert_eq!(task.status(), TaskStatus::Pending);
        assert!(task.started_at().is_none());
        assert!(task.completed_at().is_none());
        assert!(task.result().is_none());
        assert!(task.error().is_none());
    }

    #[test]
    fn happy_path_sets_each_timestamp_once() {
        let mut task = new_task();
        task.mark_started(t0() + Duration::seconds(1)).unwrap();
        assert_eq!(task.status(), TaskStatus::Processing);
        assert_eq!(task.started_at(), Some(t0() + Duration::seconds(1)));

        task.mark_completed(json!("success"), t0() + Duration::seconds(2))
            .unwrap();
        assert_eq!(task.status(), TaskStatus::Completed);
        assert_eq!(task.result(), Some(&json!("success")));
        assert!(task.error().is_none());
        assert_eq!(task.completed_at(), Some(t0() + Duration::seconds(2)));
    }

    #[test]
    fn failure_from_processing_stores_error_only() {
        let mut task = new_task();
        task.mark_started(t0()).unwrap();
        task.mark_failed("boom", t0()).unwrap();
        assert_eq!(task.status(), TaskStatus::Failed);
        assert_eq!(task.error(), Some("boom"));
        assert!(task.result().is_none());
    }

    #[test]
    fn failure_from_pending_is_allowed() {
        let mut task = new_task();
        task.mark_failed("dispatch failed", t0()).unwrap();
        assert_eq!(task.status(), TaskStatus::Failed);
        assert!(task.started_at().is_none());
        assert!(task.completed_at().is_some());
        assert!(task.take_work().is_none());
    }

    #[rstest]
    #[case::start_twice(|t: &mut Task| { t.mark_started(t0()).unwrap(); t.mark_started(t0()) })]
    #[case::complete_pending(|t: &mut Task| t.mark_completed(json!(1), t0()))]
    #[case::complete_twice(|t: &mut Task| {
        t.mark_started(t0()).unwrap();
        t.mark_completed(json!(1), t0()).unwrap();
        t.mark_completed(json!(2), t0())
    })]
    #[case::fail_after_complete(|t: &mut Task| {
        t.mark_started(t0()).unwrap();
        t.mark_completed(json!(1), t0()).unwrap();
        t.mark_failed("late", t0())
    })]
    #[case::fail_twice(|t: &mut Task| {
        t.mark_failed("first", t0()).unwrap();
        t.mark_failed("second", t0())
    })]
    #[case::start_after_fail(|t: &mut Task| {
        t.mark_failed("first", t0()).unwrap();
        t.mark_started(t0())
    })]
    fn invalid_transitions_are_state_errors(
        #[case] op: fn(&mut Task) -> Result<(), StateError>,
    ) {
        let mut task = new_task();
        let err = op(&mut task).unwrap_err();
        assert_eq!(err.task_id, task.id());
        assert_eq!(err.from, task.status());
    }

    #[test]
    fn rejected_transition_keeps_first_outcome() {
        let mut task = new_task();
        task.mark_started(t0()).unwrap();
        task.mark_completed(json!(1), t0()).unwrap();
        let _ = task.mark_failed("late", t0());
        assert_eq!(task.result(), Some(&json!(1)));
        assert!(task.error().is_none());
    }

    #[test]
    fn timestamps_never_go_backwards() {
        let mut task = new_task();
        task.mark_started(t0() - Duration::seconds(5)).unwrap();
        task.mark_completed(json!(null), t0() - Duration::seconds(10))
            .unwrap();

        let started = task.started_at().unwrap();
        let completed = task.completed_at().unwrap();
        assert!(task.created_at() <= started);
        assert!(started <= completed);
    }

    #[test]
    fn work_is_taken_once() {
        let mut task = new_task();
        assert!(task.take_work().is_some());
        assert!(task.take_work().is_none());
    }

    #[test]
    fn record_serializes_full_field_set() {
        let mut task = new_task();
        task.mark_started(t0()).unwrap();
        task.mark_failed("boom", t0()).unwrap();

        let v = serde_json::to_value(task.record()).unwrap();
        assert_eq!(v["id"], json!(task.id().to_string()));
        assert_eq!(v["status"], "failed");
        assert_eq!(v["result"], json!(null));
        assert_eq!(v["error"], "boom");
        assert!(v["created_at"].is_string());
        assert!(v["started_at"].is_string());
        assert!(v["completed_at"].is_string());

        let back: TaskRecord = serde_json::from_value(v).unwrap();
        assert_eq!(back, task.record());
        assert!(back.is_terminal());
    }
}

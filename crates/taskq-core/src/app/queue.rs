//! ProcessingQueue - タスクの投入・状態照会・キャンセル・起動・停止
//!
//! An explicitly constructed service object. Clone the handle to share it;
//! to change configuration, build a new queue and swap the handle.

use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt::Display;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::builder::{BuildError, QueueBuilder};
use super::dispatch_loop;
use crate::config::QueueConfig;
use crate::domain::{Task, TaskId, TaskRecord};
use crate::error::QueueError;
use crate::observability::QueueCounts;
use crate::ports::{Clock, IdGenerator, StatusStore};
use crate::worker::{CommandSpec, Work, WorkerPool};

/// Everything guarded by the single state lock.
pub(crate) struct QueueState {
    /// Index of tracked tasks (single source of truth while in memory).
    pub(crate) tasks: HashMap<TaskId, Task>,

    /// FIFO of ids waiting for dispatch.
    pub(crate) pending: VecDeque<TaskId>,

    /// Ids currently handed to the worker pool.
    pub(crate) active: HashSet<TaskId>,

    /// `submit` is allowed. Cleared first thing in `stop()`.
    pub(crate) accepting: bool,

    /// A dispatch loop is running and has not decided to exit.
    pub(crate) dispatcher_alive: bool,
}

pub(crate) struct Inner {
    pub(crate) config: QueueConfig,
    pub(crate) store: Arc<dyn StatusStore>,
    pub(crate) clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
    pub(crate) state: Mutex<QueueState>,
    pub(crate) wake: Arc<Notify>,
    /// Serializes start/stop. `Some` from `start()` until a `stop()` has
    /// fully completed, even if that stop was interrupted.
    lifecycle: Mutex<Option<Running>>,
}

struct Running {
    pool: Arc<WorkerPool>,
    dispatcher: JoinHandle<()>,
}

impl Inner {
    /// Best-effort write; failures are logged and swallowed.
    pub(crate) async fn persist(&self, record: &TaskRecord) {
        if let Err(e) = self.store.put(record).await {
            warn!(task_id = %record.id, status = %record.status, error = %e, "failed to persist task status");
        }
    }
}

/// Handle to a queue. The dispatch loop only holds a weak reference, so
/// dropping every handle without `stop()` ends it after its current task;
/// work still queued at that point is lost. Call `stop()` to drain.
#[derive(Clone)]
pub struct ProcessingQueue {
    pub(crate) inner: Arc<Inner>,
}

impl ProcessingQueue {
    /// Build a queue with the default file store at `config.status_dir`.
    pub fn new(config: QueueConfig) -> Result<Self, BuildError> {
        QueueBuilder::new(config).build()
    }

    pub fn builder(config: QueueConfig) -> QueueBuilder {
        QueueBuilder::new(config)
    }

    pub(crate) fn from_parts(
        config: QueueConfig,
        store: Arc<dyn StatusStore>,
        clock: Arc<dyn Clock>,
        ids: Arc<dyn IdGenerator>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                store,
                clock,
                ids,
                state: Mutex::new(QueueState {
                    tasks: HashMap::new(),
                    pending: VecDeque::new(),
                    active: HashSet::new(),
                    accepting: false,
                    dispatcher_alive: false,
                }),
                wake: Arc::new(Notify::new()),
                lifecycle: Mutex::new(None),
            }),
        }
    }

    pub fn config(&self) -> &QueueConfig {
        &self.inner.config
    }

    /// Allocate the worker pool and spawn the dispatch loop. Idempotent.
    ///
    /// After an interrupted `stop()` the still-running dispatch loop is
    /// reused, so there is never more than one.
    pub async fn start(&self) {
        let mut lifecycle = self.inner.lifecycle.lock().await;
        let mut state = self.inner.state.lock().await;

        let loop_alive = lifecycle
            .as_ref()
            .is_some_and(|running| !running.dispatcher.is_finished());
        if loop_alive && state.dispatcher_alive {
            if state.accepting {
                info!("processing queue already running");
            } else {
                state.accepting = true;
                info!("processing queue resumed before its stop completed");
            }
            return;
        }

        let pool = Arc::new(WorkerPool::new(self.inner.config.max_workers));
        state.accepting = true;
        state.dispatcher_alive = true;
        drop(state);

        let dispatcher = tokio::spawn(dispatch_loop::run(
            Arc::downgrade(&self.inner),
            Arc::clone(&self.inner.wake),
            Arc::clone(&pool),
        ));
        *lifecycle = Some(Running { pool, dispatcher });

        info!(max_workers = self.inner.config.max_workers, "processing queue started");
    }

    /// Graceful shutdown. Idempotent.
    ///
    /// Refuses new submissions, waits until every queued and running task has
    /// reached a terminal state (and been persisted), joins the dispatch loop,
    /// closes the worker pool and finally clears the in-memory index.
    ///
    /// Dropping the returned future part-way leaves the queue stopping but
    /// still owning its dispatch loop; a later `stop()` resumes the shutdown
    /// and a later `start()` reuses the loop.
    pub async fn stop(&self) {
        let mut lifecycle = self.inner.lifecycle.lock().await;
        let Some(running) = lifecycle.as_mut() else {
            return;
        };

        self.inner.state.lock().await.accepting = false;
        self.inner.wake.notify_one();

        loop {
            let (pending, active) = {
                let state = self.inner.state.lock().await;
                (state.pending.len(), state.active.len())
            };
            if pending == 0 && active == 0 {
                break;
            }
            if running.dispatcher.is_finished() {
                error!(pending, active, "dispatch loop exited with work left, giving up on drain");
                break;
            }
            info!(pending, active, "waiting for tasks to drain");
            tokio::time::sleep(self.inner.config.drain_poll_interval()).await;
        }

        // the dispatcher may be parked on an empty queue
        self.inner.wake.notify_one();

        let join_timeout = self.inner.config.join_timeout();
        match tokio::time::timeout(join_timeout, &mut running.dispatcher).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!(error = %e, "dispatch loop terminated abnormally"),
            Err(_) => {
                warn!(?join_timeout, "dispatch loop did not exit in time, aborting it");
                running.dispatcher.abort();
            }
        }
        if tokio::time::timeout(join_timeout, running.pool.shutdown()).await.is_err() {
            warn!(?join_timeout, "worker pool still busy, leaving it behind");
        }
        *lifecycle = None;

        {
            let mut state = self.inner.state.lock().await;
            state.tasks.clear();
            state.pending.clear();
            state.active.clear();
        }
        info!("processing queue stopped");
    }

    /// Is the queue accepting submissions?
    pub async fn is_running(&self) -> bool {
        self.inner.state.lock().await.accepting
    }

    /// Enqueue `work` and return its id without waiting for it to run.
    pub async fn submit(&self, work: Work) -> Result<TaskId, QueueError> {
        let id = {
            let mut state = self.inner.state.lock().await;
            if !state.accepting {
                return Err(QueueError::NotRunning);
            }

            let mut id = self.inner.ids.generate_task_id();
            while state.tasks.contains_key(&id) {
                id = self.inner.ids.generate_task_id();
            }
            let task = Task::new(id, work, self.inner.clock.now());
            let record = task.record();
            state.tasks.insert(id, task);
            state.pending.push_back(id);
            self.inner.persist(&record).await;
            id
        };
        self.inner.wake.notify_one();

        debug!(task_id = %id, "task submitted");
        Ok(id)
    }

    /// Enqueue a closure. It runs on the blocking thread pool; a returned
    /// `Err` or a panic fails the task.
    pub async fn submit_fn<F, T, E>(&self, f: F) -> Result<TaskId, QueueError>
    where
        F: FnOnce() -> Result<T, E> + Send + 'static,
        T: Serialize,
        E: Display,
    {
        self.submit(Work::from_fn(f)).await
    }

    /// Enqueue an OS command run as a child process.
    pub async fn submit_command(&self, spec: CommandSpec) -> Result<TaskId, QueueError> {
        self.submit(Work::command(spec)).await
    }

    /// Live record if the task is tracked, else the persisted one.
    pub async fn get_status(&self, id: TaskId) -> Option<TaskRecord> {
        {
            let state = self.inner.state.lock().await;
            if let Some(task) = state.tasks.get(&id) {
                return Some(task.record());
            }
        }

        match self.inner.store.get(id).await {
            Ok(record) => record,
            Err(e) => {
                warn!(task_id = %id, error = %e, "failed to load task status");
                None
            }
        }
    }

    /// Cancel a task that has not been dispatched yet.
    ///
    /// - running: `false`, the task keeps going to its natural end
    /// - unknown or already terminal: `true`, nothing to do
    /// - queued: removed from the queue, the index and the store, `true`
    pub async fn cancel(&self, id: TaskId) -> bool {
        let mut state = self.inner.state.lock().await;
        if state.active.contains(&id) {
            warn!(task_id = %id, "cannot cancel a running task");
            return false;
        }
        match state.tasks.get(&id).map(Task::status) {
            None => return true,
            Some(status) if status.is_terminal() => return true,
            Some(_) => {}
        }

        state.pending.retain(|queued| *queued != id);
        state.tasks.remove(&id);
        if let Err(e) = self.inner.store.delete(id).await {
            warn!(task_id = %id, error = %e, "failed to delete status of cancelled task");
        }
        info!(task_id = %id, "task cancelled");
        true
    }

    /// Counts over the tasks currently held in memory.
    pub async fn counts(&self) -> QueueCounts {
        let state = self.inner.state.lock().await;
        state.tasks.values().map(Task::status).collect()
    }
}

//! DispatchLoop - 保留キューを 1 件ずつ処理するループ
//!
//! # フロー
//! 1. WorkerPool の空きスロットを確保する
//! 2. pending の先頭を取り出し、同じロック内で active に登録して Processing にする
//! 3. スロット上で実行し、結果が出るまで待つ（次のタスクには進まない）
//! 4. Completed / Failed に遷移させて保存、active から外す
//!
//! The loop keeps going after shutdown was requested until the pending queue
//! is empty, so `stop()` can drain instead of dropping queued work. It only
//! holds a weak reference to the queue and exits once every handle is gone.

use std::sync::{Arc, Weak};

use tokio::sync::Notify;
use tracing::{error, info, warn};

use super::queue::{Inner, QueueState};
use crate::domain::{JobOutput, TaskId, TaskStatus};
use crate::worker::{Work, WorkerPool};

enum Next {
    Run(TaskId, Work),
    Idle,
    Exit,
}

pub(crate) async fn run(inner: Weak<Inner>, wake: Arc<Notify>, pool: Arc<WorkerPool>) {
    info!(workers = pool.size(), "dispatch loop started");
    loop {
        let slot = match pool.acquire().await {
            Ok(slot) => slot,
            Err(reason) => {
                error!(%reason, "dispatch loop lost its worker pool");
                if let Some(inner) = inner.upgrade() {
                    inner.state.lock().await.dispatcher_alive = false;
                }
                break;
            }
        };
        let Some(queue) = inner.upgrade() else {
            warn!("processing queue dropped without stop(), dispatch loop exiting");
            break;
        };

        match next(&queue).await {
            Next::Run(id, work) => {
                let output = slot.run(work, queue.config.task_timeout()).await;
                finish(&queue, id, output).await;
            }
            Next::Idle => {
                drop(slot);
                let poll_interval = queue.config.poll_interval();
                drop(queue);
                // a wake-up stored before we got here is not lost (Notify keeps one permit)
                let _ = tokio::time::timeout(poll_interval, wake.notified()).await;
            }
            Next::Exit => break,
        }
    }
    info!("dispatch loop stopped");
}

/// Pop the next task and move it to Processing.
///
/// Popping and registering in the active set happen under one lock, so a
/// drain check never sees a task that is in neither place. Deciding to exit
/// clears `dispatcher_alive` under the same lock, so `start()` never hands new
/// work to a loop that is about to return.
async fn next(inner: &Inner) -> Next {
    let mut state = inner.state.lock().await;
    loop {
        let Some(id) = state.pending.pop_front() else {
            if state.accepting {
                return Next::Idle;
            }
            state.dispatcher_alive = false;
            return Next::Exit;
        };
        if let Some(work) = begin(inner, &mut state, id).await {
            return Next::Run(id, work);
        }
    }
}

async fn begin(inner: &Inner, state: &mut QueueState, id: TaskId) -> Option<Work> {
    let QueueState { tasks, active, .. } = state;
    let Some(task) = tasks.get_mut(&id) else {
        warn!(task_id = %id, "task was cancelled before dispatch, skipping");
        return None;
    };

    let now = inner.clock.now();
    let started = task
        .mark_started(now)
        .map_err(|e| e.to_string())
        .and_then(|()| task.take_work().ok_or_else(|| "task has no work attached".to_string()));

    match started {
        Ok(work) => {
            active.insert(id);
            info!(task_id = %id, ?work, "task started");
            inner.persist(&task.record()).await;
            Some(work)
        }
        Err(reason) => {
            error!(task_id = %id, %reason, "task could not be dispatched");
            if let Err(e) = task.mark_failed(reason, now) {
                warn!(task_id = %id, error = %e, "task already terminal, keeping its status");
            }
            inner.persist(&task.record()).await;
            None
        }
    }
}

async fn finish(inner: &Inner, id: TaskId, output: JobOutput) {
    let mut state = inner.state.lock().await;
    let QueueState { tasks, active, .. } = &mut *state;
    active.remove(&id);

    let Some(task) = tasks.get_mut(&id) else {
        warn!(task_id = %id, "task left the index while running, dropping its outcome");
        return;
    };

    let now = inner.clock.now();
    let applied = match output {
        Ok(value) => task.mark_completed(value, now),
        Err(reason) => {
            error!(task_id = %id, error = %reason, "task failed");
            task.mark_failed(reason, now)
        }
    };
    if let Err(e) = applied {
        error!(task_id = %id, error = %e, "could not record task outcome");
        if let Err(e) = task.mark_failed(e.to_string(), now) {
            warn!(task_id = %id, error = %e, "task already terminal, keeping its status");
        }
    }

    if task.status() == TaskStatus::Completed {
        info!(task_id = %id, "task completed");
    }
    inner.persist(&task.record()).await;
}

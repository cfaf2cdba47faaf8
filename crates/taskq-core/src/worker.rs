//! Worker pool: executes units of work with a bounded number of slots.
//!
//! - `Work::Blocking` runs a closure on tokio's blocking thread pool. A panic
//!   is caught by the join handle and reported as a failure, so it never
//!   reaches the dispatcher.
//! - `Work::Command` runs an OS command as a child process (killed when the
//!   wait is abandoned).
//!
//! The dispatcher takes a [`WorkerSlot`] before it marks a task started, so a
//! task only becomes `processing` once it can actually run.

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt::{self, Display};
use std::path::PathBuf;
use std::process::{Output, Stdio};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::domain::outcome::{JobOutput, into_output};

type BlockingJob = Box<dyn FnOnce() -> JobOutput + Send + 'static>;

/// A unit of work, captured by value at submission.
pub enum Work {
    Blocking(BlockingJob),
    Command(CommandSpec),
}

impl Work {
    /// Wrap a closure. Whatever it captures is moved into the task, so the
    /// submitter cannot change it afterwards.
    pub fn from_fn<F, T, E>(f: F) -> Self
    where
        F: FnOnce() -> Result<T, E> + Send + 'static,
        T: Serialize,
        E: Display,
    {
        Work::Blocking(Box::new(move || into_output(f())))
    }

    pub fn command(spec: CommandSpec) -> Self {
        Work::Command(spec)
    }
}

impl fmt::Debug for Work {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Work::Blocking(_) => f.write_str("Work::Blocking(..)"),
            Work::Command(spec) => f.debug_tuple("Work::Command").field(spec).finish(),
        }
    }
}

/// An OS command to run as a child process.
///
/// stdout is parsed as JSON when possible, otherwise returned as a string.
/// A non-zero exit is a failure carrying stderr.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandSpec {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(default)]
    pub current_dir: Option<PathBuf>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: BTreeMap::new(),
            current_dir: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    async fn run(self) -> JobOutput {
        let mut cmd = tokio::process::Command::new(&self.program);
        cmd.args(&self.args)
            .envs(&self.env)
            .stdin(Stdio::null())
            .kill_on_drop(true);
        if let Some(dir) = &self.current_dir {
            cmd.current_dir(dir);
        }

        let output = cmd
            .output()
            .await
            .map_err(|e| format!("failed to spawn {}: {e}", self.program))?;

        if output.status.success() {
            Ok(parse_stdout(&output.stdout))
        } else {
            Err(exit_failure(&self.program, &output))
        }
    }
}

fn parse_stdout(stdout: &[u8]) -> serde_json::Value {
    let text = String::from_utf8_lossy(stdout);
    let text = text.trim();
    if text.is_empty() {
        return serde_json::Value::Null;
    }
    serde_json::from_str(text).unwrap_or_else(|_| serde_json::Value::String(text.to_string()))
}

fn exit_failure(program: &str, output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let stderr = stderr.trim();
    if stderr.is_empty() {
        format!("{program} exited with {}", output.status)
    } else {
        format!("{program} exited with {}: {stderr}", output.status)
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    let detail = if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    };
    format!("worker panicked: {detail}")
}

/// Bounded set of worker slots.
///
/// A slot is held from the moment a task is admitted until its outcome is
/// known or its deadline expires. A closure abandoned at its deadline keeps
/// running on the blocking pool but no longer occupies a slot.
pub struct WorkerPool {
    slots: Arc<Semaphore>,
    size: usize,
}

/// An occupied worker slot. Dropping it frees the slot.
#[derive(Debug)]
pub struct WorkerSlot {
    _permit: OwnedSemaphorePermit,
}

impl WorkerPool {
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        Self {
            slots: Arc::new(Semaphore::new(size)),
            size,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Wait for a free slot.
    pub async fn acquire(&self) -> Result<WorkerSlot, String> {
        let permit = Arc::clone(&self.slots)
            .acquire_owned()
            .await
            .map_err(|_| "worker pool is closed".to_string())?;
        Ok(WorkerSlot { _permit: permit })
    }

    /// Acquire a slot, run `work` on it and wait for its outcome.
    pub async fn execute(&self, work: Work, deadline: Option<Duration>) -> JobOutput {
        let slot = self.acquire().await?;
        slot.run(work, deadline).await
    }

    /// Wait until every slot is free, then refuse further work.
    pub async fn shutdown(&self) {
        // closed semaphore: someone already shut down
        if let Ok(all) = self.slots.acquire_many(self.size as u32).await {
            all.forget();
        }
        self.slots.close();
    }
}

impl WorkerSlot {
    /// Run `work` and release the slot once it finishes.
    ///
    /// With a `deadline`, gives up waiting after that long and reports a
    /// failure. A child process is killed; a closure is left to finish on its
    /// own and its result is discarded.
    pub async fn run(self, work: Work, deadline: Option<Duration>) -> JobOutput {
        let output = match deadline {
            Some(limit) => tokio::time::timeout(limit, run_work(work))
                .await
                .unwrap_or_else(|_| Err(format!("timed out after {limit:?}"))),
            None => run_work(work).await,
        };
        drop(self);
        output
    }
}

async fn run_work(work: Work) -> JobOutput {
    match work {
        Work::Blocking(job) => match tokio::task::spawn_blocking(job).await {
            Ok(output) => output,
            Err(e) if e.is_panic() => Err(panic_message(e.into_panic())),
            Err(e) => Err(format!("worker cancelled: {e}")),
        },
        Work::Command(spec) => spec.run().await,
    }
}

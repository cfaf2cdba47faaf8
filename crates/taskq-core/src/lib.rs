//! taskq-core
//!
//! In-process asynchronous task queue: submit work, get an id back
//! immediately, poll its status while a bounded worker pool runs it.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, state, task, outcome）
//! - **ports**: 抽象化レイヤー（Clock, IdGenerator, StatusStore）
//! - **app**: アプリケーションロジック（builder, queue, dispatch loop）
//! - **impls**: 実装（FileStatusStore, InMemoryStatusStore）
//! - **worker**: Work と WorkerPool
//! - config / error / observability

pub mod app;
pub mod config;
pub mod domain;
pub mod error;
pub mod impls;
pub mod observability;
pub mod ports;
pub mod worker;

pub use app::{BuildError, ProcessingQueue, QueueBuilder};
pub use config::QueueConfig;
pub use domain::{JobOutput, TaskId, TaskRecord, TaskStatus};
pub use error::QueueError;
pub use worker::{CommandSpec, Work};

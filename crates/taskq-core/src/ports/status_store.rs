//! StatusStore port - タスク状態レコードの保存先
//!
//! Narrow key-value interface (put / get / delete by TaskId) so the medium
//! (files, embedded KV, external DB) can change without touching the queue.
//!
//! # 実装
//! - `impls::FileStatusStore`: `{dir}/task-<ULID>.json`
//! - `impls::InMemoryStatusStore`: 開発・テスト用

use async_trait::async_trait;

use crate::domain::{TaskId, TaskRecord};
use crate::error::StoreError;

/// StatusStore は TaskRecord のスナップショットを保持
///
/// # 設計原則
/// - `put` は常に上書き（遷移ごとに全フィールドを書く）
/// - best-effort: 呼び出し側はエラーをログに残して続行する
#[async_trait]
pub trait StatusStore: Send + Sync {
    async fn put(&self, record: &TaskRecord) -> Result<(), StoreError>;

    /// `Ok(None)` when nothing is stored under `id`.
    async fn get(&self, id: TaskId) -> Result<Option<TaskRecord>, StoreError>;

    /// Deleting a missing record is not an error.
    async fn delete(&self, id: TaskId) -> Result<(), StoreError>;
}

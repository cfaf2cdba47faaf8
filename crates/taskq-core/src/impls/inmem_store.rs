//! InMemoryStatusStore - 開発・テスト用の StatusStore

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::{TaskId, TaskRecord};
use crate::error::StoreError;
use crate::ports::StatusStore;

#[derive(Debug, Default)]
pub struct InMemoryStatusStore {
    records: Mutex<HashMap<TaskId, TaskRecord>>,
}

impl InMemoryStatusStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.lock().await.is_empty()
    }
}

#[async_trait]
impl StatusStore for InMemoryStatusStore {
    async fn put(&self, record: &TaskRecord) -> Result<(), StoreError> {
        self.records.lock().await.insert(record.id, record.clone());
        Ok(())
    }

    async fn get(&self, id: TaskId) -> Result<Option<TaskRecord>, StoreError> {
        Ok(self.records.lock().await.get(&id).cloned())
    }

    async fn delete(&self, id: TaskId) -> Result<(), StoreError> {
        self.records.lock().await.remove(&id);
        Ok(())
    }
}

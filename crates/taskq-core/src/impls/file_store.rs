//! FileStatusStore - 1 タスク 1 JSON ファイル
//!
//! Records live at `{dir}/task-<ULID>.json`. A write goes to a temporary
//! sibling first and is renamed into place, so readers never see a half
//! written record.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::domain::{TaskId, TaskRecord};
use crate::error::StoreError;
use crate::ports::StatusStore;

#[derive(Debug, Clone)]
pub struct FileStatusStore {
    dir: PathBuf,
}

impl FileStatusStore {
    /// Use `dir` as-is. See [`FileStatusStore::create`] to make sure it exists.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Create the directory (and parents) if missing.
    pub fn create(dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self::new(dir))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, id: TaskId) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }
}

#[async_trait]
impl StatusStore for FileStatusStore {
    async fn put(&self, record: &TaskRecord) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(record)?;
        let path = self.path_for(record.id);
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn get(&self, id: TaskId) -> Result<Option<TaskRecord>, StoreError> {
        match tokio::fs::read(self.path_for(id)).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, id: TaskId) -> Result<(), StoreError> {
        match tokio::fs::remove_file(self.path_for(id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TaskStatus;
    use chrono::Utc;
    use serde_json::json;
    use ulid::Ulid;

    fn record(status: TaskStatus) -> TaskRecord {
        TaskRecord {
            id: TaskId::from_ulid(Ulid::new()),
            status,
            result: None,
            error: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }

    #[test]
    fn create_makes_nested_directories() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("a").join("b");
        let store = FileStatusStore::create(&dir).unwrap();
        assert!(dir.is_dir());
        assert_eq!(store.dir(), dir.as_path());
    }

    #[tokio::test]
    async fn put_overwrites_and_get_reads_back() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FileStatusStore::create(tmp.path()).unwrap();

        let mut rec = record(TaskStatus::Pending);
        store.put(&rec).await.unwrap();
        assert_eq!(store.get(rec.id).await.unwrap(), Some(rec.clone()));

        rec.status = TaskStatus::Completed;
        rec.result = Some(json!({"pages": 2}));
        store.put(&rec).await.unwrap();
        assert_eq!(store.get(rec.id).await.unwrap(), Some(rec.clone()));

        // no temp files left behind
        let names: Vec<String> = std::fs::read_dir(tmp.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec![format!("{}.json", rec.id)]);
    }

    #[tokio::test]
    async fn missing_record_is_none() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FileStatusStore::create(tmp.path()).unwrap();
        let id = TaskId::from_ulid(Ulid::new());
        assert_eq!(store.get(id).await.unwrap(), None);
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FileStatusStore::create(tmp.path()).unwrap();
        let rec = record(TaskStatus::Pending);
        store.put(&rec).await.unwrap();

        store.delete(rec.id).await.unwrap();
        assert!(!store.path_for(rec.id).exists());
        store.delete(rec.id).await.unwrap();
    }

    #[tokio::test]
    async fn corrupt_record_is_a_serde_error() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FileStatusStore::create(tmp.path()).unwrap();
        let id = TaskId::from_ulid(Ulid::new());
        std::fs::write(store.path_for(id), b"{not json").unwrap();

        let err = store.get(id).await.unwrap_err();
        assert!(matches!(err, StoreError::Serde(_)));
    }

    #[tokio::test]
    async fn write_into_missing_directory_is_an_io_error() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FileStatusStore::new(tmp.path().join("gone"));
        let err = store.put(&record(TaskStatus::Pending)).await.unwrap_err();
        assert!(matches!(err, StoreError::Io(_)));
    }
}

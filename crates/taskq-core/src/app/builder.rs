//! QueueBuilder - ProcessingQueue の構築とワイヤリング
//!
//! # Fail-fast 設計
//! - 設定の検証は build() 時に行う
//! - ステータスディレクトリは build() 時に作成する（start() ではない）

use std::path::PathBuf;
use std::sync::Arc;

use super::queue::ProcessingQueue;
use crate::config::QueueConfig;
use crate::impls::FileStatusStore;
use crate::ports::{Clock, IdGenerator, StatusStore, SystemClock, UlidGenerator};

/// QueueBuilder は ProcessingQueue を構築
///
/// # 使用例
/// ```ignore
/// let queue = QueueBuilder::new(QueueConfig::from_env()?)
///     .store(Arc::new(InMemoryStatusStore::new()))
///     .build()?;
/// queue.start().await;
/// ```
///
/// Without an explicit store, a [`FileStatusStore`] rooted at
/// `config.status_dir` is created.
pub struct QueueBuilder {
    config: QueueConfig,
    store: Option<Arc<dyn StatusStore>>,
    clock: Option<Arc<dyn Clock>>,
    ids: Option<Arc<dyn IdGenerator>>,
}

/// BuildError はキュー構築時のエラー
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("max_workers must be at least 1")]
    ZeroWorkers,

    #[error("cannot create status directory {path:?}: {source}")]
    StatusDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl QueueBuilder {
    pub fn new(config: QueueConfig) -> Self {
        Self {
            config,
            store: None,
            clock: None,
            ids: None,
        }
    }

    pub fn store(mut self, store: Arc<dyn StatusStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = Some(ids);
        self
    }

    pub fn build(self) -> Result<ProcessingQueue, BuildError> {
        if self.config.max_workers == 0 {
            return Err(BuildError::ZeroWorkers);
        }

        let store = match self.store {
            Some(store) => store,
            None => {
                let dir = self.config.status_dir.clone();
                let store = FileStatusStore::create(&dir)
                    .map_err(|source| BuildError::StatusDir { path: dir, source })?;
                Arc::new(store)
            }
        };
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let ids = self
            .ids
            .unwrap_or_else(|| Arc::new(UlidGenerator::new(Arc::clone(&clock))));

        Ok(ProcessingQueue::from_parts(self.config, store, clock, ids))
    }
}

//! App - アプリケーション層
//!
//! ports と WorkerPool を組み合わせて ProcessingQueue を実装します。
//!
//! # 主要コンポーネント
//! - **QueueBuilder**: キューの構築とワイヤリング
//! - **ProcessingQueue**: submit / get_status / cancel / start / stop
//! - **DispatchLoop**: 保留タスクを FIFO で WorkerPool に渡すループ

pub mod builder;
mod dispatch_loop;
pub mod queue;

pub use self::builder::{BuildError, QueueBuilder};
pub use self::queue::ProcessingQueue;

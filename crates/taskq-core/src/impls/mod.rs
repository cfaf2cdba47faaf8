//! Impls - ports の実装
//!
//! # 含まれる実装
//! - **FileStatusStore**: ステータスディレクトリに JSON を 1 タスク 1 ファイルで保存
//! - **InMemoryStatusStore**: 開発・テスト用

pub mod file_store;
pub mod inmem_store;

pub use self::file_store::FileStatusStore;
pub use self::inmem_store::InMemoryStatusStore;

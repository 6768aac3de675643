//! SnapshotStore port - スナップショットの保存先
//!
//! # 設計原則
//! - save は原子的: クラッシュしても古いか新しいスナップショットのどちらかが残る
//! - load は「何もない」を `Ok(None)` で返す（エラーではない）
//!
//! # 実装
//! - FileSnapshotStore（impls/file_snapshot.rs）: 本番用
//! - InMemorySnapshotStore（impls/inmem_snapshot.rs）: テスト用

use async_trait::async_trait;

use crate::domain::PersistError;
use crate::queue::Snapshot;

#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Last saved snapshot, or `None` if nothing was ever saved.
    async fn load(&self) -> Result<Option<Snapshot>, PersistError>;

    /// Replace the saved snapshot.
    async fn save(&self, snapshot: &Snapshot) -> Result<(), PersistError>;
}

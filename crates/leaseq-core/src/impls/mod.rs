//! Impls - ports の実装
//!
//! - **FileSnapshotStore**: 本番用（JSON ファイル、原子的に置き換え）
//! - **InMemorySnapshotStore**: テスト・開発用

pub mod file_snapshot;
pub mod inmem_snapshot;

pub use self::file_snapshot::{FileSnapshotStore, SNAPSHOT_FILENAME};
pub use self::inmem_snapshot::InMemorySnapshotStore;

//! InMemorySnapshotStore - テスト・開発用の保存先
//!
//! `fail_saves` を立てると save がエラーを返すので、SAVE 失敗の経路をテストできます。

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::PersistError;
use crate::ports::SnapshotStore;
use crate::queue::Snapshot;

/// Clones share the same slot.
#[derive(Debug, Clone, Default)]
pub struct InMemorySnapshotStore {
    slot: Arc<Mutex<Option<Snapshot>>>,
    fail_saves: Arc<AtomicBool>,
}

impl InMemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_snapshot(snapshot: Snapshot) -> Self {
        Self {
            slot: Arc::new(Mutex::new(Some(snapshot))),
            fail_saves: Arc::default(),
        }
    }

    pub fn fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    pub async fn current(&self) -> Option<Snapshot> {
        self.slot.lock().await.clone()
    }
}

#[async_trait]
impl SnapshotStore for InMemorySnapshotStore {
    async fn load(&self) -> Result<Option<Snapshot>, PersistError> {
        Ok(self.slot.lock().await.clone())
    }

    async fn save(&self, snapshot: &Snapshot) -> Result<(), PersistError> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(PersistError::io(
                "memory",
                std::io::Error::other("save disabled"),
            ));
        }
        *self.slot.lock().await = Some(snapshot.clone());
        Ok(())
    }
}

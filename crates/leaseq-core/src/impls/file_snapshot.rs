//! FileSnapshotStore - ディレクトリ内の JSON ファイル 1 つにスナップショットを保存
//!
//! 書き込みは temp file + fsync + rename。rename は同一ディレクトリ内なので原子的。

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::domain::PersistError;
use crate::ports::SnapshotStore;
use crate::queue::Snapshot;

pub const SNAPSHOT_FILENAME: &str = "leaseq-snapshot.json";

#[derive(Debug, Clone)]
pub struct FileSnapshotStore {
    dir: PathBuf,
}

impl FileSnapshotStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(SNAPSHOT_FILENAME)
    }

    fn tmp_path(&self) -> PathBuf {
        self.dir.join(format!(".{SNAPSHOT_FILENAME}.tmp"))
    }
}

#[async_trait]
impl SnapshotStore for FileSnapshotStore {
    async fn load(&self) -> Result<Option<Snapshot>, PersistError> {
        let path = self.path();
        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(PersistError::io(path, e)),
        };
        let snapshot = serde_json::from_slice(&bytes)?;
        debug!(path = %path.display(), bytes = bytes.len(), "snapshot loaded");
        Ok(Some(snapshot))
    }

    async fn save(&self, snapshot: &Snapshot) -> Result<(), PersistError> {
        let json = serde_json::to_vec(snapshot)?;
        fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| PersistError::io(&self.dir, e))?;

        let tmp = self.tmp_path();
        write_synced(&tmp, &json).await?;

        let path = self.path();
        if let Err(e) = fs::rename(&tmp, &path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(PersistError::io(path, e));
        }
        sync_dir(&self.dir).await;

        debug!(path = %path.display(), bytes = json.len(), "snapshot written");
        Ok(())
    }
}

async fn write_synced(path: &Path, bytes: &[u8]) -> Result<(), PersistError> {
    let mut file = fs::File::create(path)
        .await
        .map_err(|e| PersistError::io(path, e))?;
    file.write_all(bytes)
        .await
        .map_err(|e| PersistError::io(path, e))?;
    file.sync_all().await.map_err(|e| PersistError::io(path, e))?;
    Ok(())
}

// Persists the rename itself. Directories cannot be opened this way on every
// platform, so a failure here is ignored.
async fn sync_dir(dir: &Path) {
    if let Ok(handle) = fs::File::open(dir).await {
        let _ = handle.sync_all().await;
    }
}

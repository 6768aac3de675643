//! QueueService - リクエストの dispatcher
//!
//! # フロー（1 リクエスト）
//! 1. store のロックを取る（全操作を直列化）
//! 2. sweep（期限切れ lease を pending に戻す）
//! 3. Command に対応する store 操作を 1 つ実行
//! 4. Response を返す
//!
//! SAVE はロックを持ったまま書き込むので、スナップショットは常に一貫しており、
//! 2 つの SAVE が順序を入れ替えることもありません。

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::domain::{LeaseqError, LeasedTask, PersistError, QueueName, TaskId};
use crate::ports::{Clock, IdGenerator, SnapshotStore};
use crate::protocol::{Command, Response};
use crate::queue::{QueueCounts, QueueStore, StoreSettings};

/// Clones share the same store.
#[derive(Clone)]
pub struct QueueService {
    store: Arc<Mutex<QueueStore>>,
    clock: Arc<dyn Clock>,
    snapshots: Arc<dyn SnapshotStore>,
}

impl QueueService {
    pub fn new(store: QueueStore, clock: Arc<dyn Clock>, snapshots: Arc<dyn SnapshotStore>) -> Self {
        Self {
            store: Arc::new(Mutex::new(store)),
            clock,
            snapshots,
        }
    }

    /// Restore from `snapshots`, or start empty if there is nothing usable.
    ///
    /// Never fails: a missing, unreadable or inconsistent snapshot is logged
    /// and replaced by an empty store.
    pub async fn open(
        settings: StoreSettings,
        clock: Arc<dyn Clock>,
        ids: Arc<dyn IdGenerator>,
        snapshots: Arc<dyn SnapshotStore>,
    ) -> Self {
        let store = match snapshots.load().await {
            Ok(Some(snapshot)) => match QueueStore::restore(snapshot, settings, Arc::clone(&ids)) {
                Ok(store) => {
                    let counts = store.counts();
                    info!(
                        queues = counts.queues,
                        pending = counts.pending,
                        in_flight = counts.in_flight,
                        "restored snapshot"
                    );
                    store
                }
                Err(e) => {
                    warn!(error = %e, "snapshot rejected, starting with an empty store");
                    QueueStore::new(settings, ids)
                }
            },
            Ok(None) => {
                info!("no snapshot found, starting with an empty store");
                QueueStore::new(settings, ids)
            }
            Err(e) => {
                warn!(error = %e, "snapshot unreadable, starting with an empty store");
                QueueStore::new(settings, ids)
            }
        };
        Self::new(store, clock, snapshots)
    }

    /// Serve one command: sweep, then exactly one store operation.
    pub async fn handle(&self, command: Command) -> Response {
        let verb = command.verb();
        let mut store = self.store.lock().await;
        let now = self.clock.now();
        let requeued = store.sweep(now);
        if requeued > 0 {
            debug!(requeued, "expired leases requeued");
        }

        let response = match command {
            Command::Add {
                queue,
                declared_len,
                payload,
            } => match store.enqueue(&queue, declared_len, payload) {
                Ok(id) => Response::Added(id),
                Err(e) => {
                    debug!(%queue, error = %e, "ADD rejected");
                    Response::Error
                }
            },
            Command::Get { queue } => store
                .acquire_lease(&queue, now)
                .map_or(Response::None, Response::Leased),
            Command::Ack { queue, id } => {
                Response::from_bool(id.is_some_and(|id| store.acknowledge(&queue, &id)))
            }
            Command::In { queue, id } => {
                Response::from_bool(id.is_some_and(|id| store.contains(&queue, &id)))
            }
            Command::Save => match self.persist_locked(&store).await {
                Ok(()) => Response::Ok,
                Err(e) => {
                    error!(error = %e, "SAVE failed");
                    Response::Error
                }
            },
        };
        debug!(verb, %response, "handled");
        response
    }

    pub async fn enqueue(
        &self,
        queue: &QueueName,
        declared_len: usize,
        payload: impl Into<String>,
    ) -> Result<TaskId, LeaseqError> {
        let mut store = self.lock_and_sweep().await;
        Ok(store.enqueue(queue, declared_len, payload)?)
    }

    pub async fn acquire_lease(&self, queue: &QueueName) -> Option<LeasedTask> {
        let mut store = self.lock_and_sweep().await;
        let now = self.clock.now();
        store.acquire_lease(queue, now)
    }

    pub async fn acknowledge(&self, queue: &QueueName, id: &TaskId) -> bool {
        self.lock_and_sweep().await.acknowledge(queue, id)
    }

    pub async fn contains(&self, queue: &QueueName, id: &TaskId) -> bool {
        self.lock_and_sweep().await.contains(queue, id)
    }

    /// Write a snapshot of the whole store.
    pub async fn persist(&self) -> Result<(), LeaseqError> {
        let store = self.lock_and_sweep().await;
        Ok(self.persist_locked(&store).await?)
    }

    /// Requeue expired leases now. Returns how many moved.
    pub async fn sweep(&self) -> usize {
        let now = self.clock.now();
        self.store.lock().await.sweep(now)
    }

    pub async fn counts(&self) -> QueueCounts {
        self.store.lock().await.counts()
    }

    async fn lock_and_sweep(&self) -> tokio::sync::MutexGuard<'_, QueueStore> {
        let mut store = self.store.lock().await;
        store.sweep(self.clock.now());
        store
    }

    async fn persist_locked(&self, store: &QueueStore) -> Result<(), PersistError> {
        let snapshot = store.snapshot();
        self.snapshots.save(&snapshot).await?;
        let counts = store.counts();
        info!(
            queues = counts.queues,
            pending = counts.pending,
            in_flight = counts.in_flight,
            "snapshot saved"
        );
        Ok(())
    }
}

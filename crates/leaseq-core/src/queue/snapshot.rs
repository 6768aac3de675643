//! Snapshot: the whole store as plain serde data, and back.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::store::{Queue, QueueStore, StoreSettings};
use crate::domain::{PersistError, QueueName, Sequence, Task};
use crate::ports::IdGenerator;

pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: u32,
    pub next_sequence: Sequence,
    pub queues: BTreeMap<QueueName, QueueSnapshot>,
}

impl Default for Snapshot {
    fn default() -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            next_sequence: 1,
            queues: BTreeMap::new(),
        }
    }
}

/// `pending` is in consumption order; `in_flight` is sorted by expiry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueSnapshot {
    pub pending: Vec<Task>,
    pub in_flight: Vec<InFlightSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InFlightSnapshot {
    pub task: Task,
    pub expires_at: DateTime<Utc>,
}

impl QueueStore {
    pub fn snapshot(&self) -> Snapshot {
        let queues = self
            .queues
            .iter()
            .map(|(name, q)| {
                let pending = q.pending.values().cloned().collect();
                let mut in_flight: Vec<InFlightSnapshot> = q
                    .in_flight
                    .values()
                    .map(|f| InFlightSnapshot {
                        task: f.task.clone(),
                        expires_at: f.expires_at,
                    })
                    .collect();
                in_flight.sort_by(|a, b| {
                    (a.expires_at, a.task.sequence()).cmp(&(b.expires_at, b.task.sequence()))
                });
                (name.clone(), QueueSnapshot { pending, in_flight })
            })
            .collect();

        Snapshot {
            version: SNAPSHOT_VERSION,
            next_sequence: self.next_sequence,
            queues,
        }
    }

    /// Rebuild a store from a snapshot.
    ///
    /// Fails if the snapshot breaks a store invariant (duplicate id or
    /// sequence, task filed under the wrong queue, unknown version).
    pub fn restore(
        snapshot: Snapshot,
        settings: StoreSettings,
        ids: Arc<dyn IdGenerator>,
    ) -> Result<Self, PersistError> {
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(PersistError::Corrupt(format!(
                "unsupported snapshot version {}",
                snapshot.version
            )));
        }

        let mut store = QueueStore::new(settings, ids);
        let mut seen_ids = HashSet::new();
        let mut seen_sequences = HashSet::new();
        let mut max_sequence = 0;

        let mut admit = |name: &QueueName, task: &Task| -> Result<(), PersistError> {
            if task.queue() != name {
                return Err(PersistError::Corrupt(format!(
                    "{} is filed under {name} but belongs to {}",
                    task.id(),
                    task.queue()
                )));
            }
            if !seen_ids.insert(task.id()) {
                return Err(PersistError::Corrupt(format!("duplicate id {}", task.id())));
            }
            if !seen_sequences.insert(task.sequence()) {
                return Err(PersistError::Corrupt(format!(
                    "duplicate sequence {}",
                    task.sequence()
                )));
            }
            max_sequence = max_sequence.max(task.sequence());
            Ok(())
        };

        for (name, qs) in snapshot.queues {
            let mut queue = Queue::default();
            for task in qs.pending {
                admit(&name, &task)?;
                queue.push_pending(task);
            }
            for flight in qs.in_flight {
                admit(&name, &flight.task)?;
                queue.push_in_flight(flight.task, flight.expires_at);
            }
            if !queue.is_empty() {
                store.queues.insert(name, queue);
            }
        }

        store.next_sequence = snapshot.next_sequence.max(max_sequence + 1);
        Ok(store)
    }
}

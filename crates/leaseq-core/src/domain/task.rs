use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::TaskId;

/// Name of a queue. Tasks are grouped by it for their whole lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueueName(String);

impl QueueName {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for QueueName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Position of a task in its queue's pending order (assigned once, at ADD).
pub type Sequence = u64;

/// A task as the store owns it.
///
/// `id`, `queue`, `payload` and `sequence` never change after creation.
/// Lease state lives next to the task in the queue, not in here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    id: TaskId,
    queue: QueueName,
    payload: String,
    sequence: Sequence,
}

impl Task {
    pub fn new(id: TaskId, queue: QueueName, payload: String, sequence: Sequence) -> Self {
        Self {
            id,
            queue,
            payload,
            sequence,
        }
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn queue(&self) -> &QueueName {
        &self.queue
    }

    pub fn payload(&self) -> &str {
        &self.payload
    }

    /// Payload length in bytes (the `declared_length` it was admitted with).
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    pub fn sequence(&self) -> Sequence {
        self.sequence
    }
}

/// What a worker receives from a successful lease.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeasedTask {
    pub task: Task,
    pub expires_at: DateTime<Utc>,
}

impl LeasedTask {
    pub fn id(&self) -> TaskId {
        self.task.id()
    }
}

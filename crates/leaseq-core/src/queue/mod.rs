//! Queue module: per-queue pending/in-flight storage, lease sweep, snapshots.

mod lease;
mod snapshot;
mod store;
mod sweep;

pub use snapshot::{InFlightSnapshot, QueueSnapshot, SNAPSHOT_VERSION, Snapshot};
pub use store::{DEFAULT_MAX_PAYLOAD_LEN, QueueStore, StoreSettings};

use serde::{Deserialize, Serialize};

/// How many tasks sit where. Used for logs and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueCounts {
    pub queues: usize,
    pub pending: usize,
    pub in_flight: usize,
}

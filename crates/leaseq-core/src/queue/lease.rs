//! In-flight bookkeeping: the leased task and the deadline heap used by sweep.

use chrono::{DateTime, Utc};

use crate::domain::{Task, TaskId};

/// A leased task together with the instant its lease runs out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct InFlight {
    pub task: Task,
    pub expires_at: DateTime<Utc>,
}

/// Deadline entry for the sweep heap.
///
/// Reverse ordering so `BinaryHeap` acts as a min-heap (earliest expiry first).
/// Entries are not removed on ACK; sweep drops any entry whose task is no
/// longer in flight with that exact expiry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct LeaseDeadline {
    pub expires_at: DateTime<Utc>,
    pub task_id: TaskId,
}

impl PartialOrd for LeaseDeadline {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for LeaseDeadline {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        other
            .expires_at
            .cmp(&self.expires_at)
            .then_with(|| other.task_id.cmp(&self.task_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use std::collections::BinaryHeap;
    use ulid::Ulid;

    #[test]
    fn heap_pops_earliest_deadline_first() {
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let mut heap = BinaryHeap::new();
        for secs in [30, 10, 20] {
            heap.push(LeaseDeadline {
                expires_at: t0 + Duration::seconds(secs),
                task_id: TaskId::from_ulid(Ulid::new()),
            });
        }

        let order: Vec<i64> = std::iter::from_fn(|| heap.pop())
            .map(|d| (d.expires_at - t0).num_seconds())
            .collect();
        assert_eq!(order, vec![10, 20, 30]);
    }
}

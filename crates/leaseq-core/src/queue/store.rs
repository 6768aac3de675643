//! In-memory queue store.

use std::collections::{BTreeMap, BinaryHeap, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use super::QueueCounts;
use super::lease::{InFlight, LeaseDeadline};
use crate::domain::{LeasedTask, QueueName, Sequence, Task, TaskId, ValidationError};
use crate::ports::IdGenerator;

/// Default ceiling for `declared_length` on ADD.
pub const DEFAULT_MAX_PAYLOAD_LEN: usize = 1_000_000;

/// Fixed for the lifetime of a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreSettings {
    pub lease_duration: Duration,
    pub max_payload_len: usize,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            lease_duration: Duration::seconds(4),
            max_payload_len: DEFAULT_MAX_PAYLOAD_LEN,
        }
    }
}

/// One named queue.
///
/// Design:
/// - `pending` is keyed by sequence, so the first entry is always the oldest.
/// - `pending_ids` and `in_flight` are keyed by id, so ACK/IN never scan.
/// - A task id lives in exactly one of `pending` / `in_flight`.
#[derive(Debug, Default)]
pub(crate) struct Queue {
    pub(crate) pending: BTreeMap<Sequence, Task>,
    pub(crate) pending_ids: HashMap<TaskId, Sequence>,
    pub(crate) in_flight: HashMap<TaskId, InFlight>,
    pub(crate) deadlines: BinaryHeap<LeaseDeadline>,
}

impl Queue {
    pub(crate) fn push_pending(&mut self, task: Task) {
        self.pending_ids.insert(task.id(), task.sequence());
        self.pending.insert(task.sequence(), task);
    }

    fn pop_pending(&mut self) -> Option<Task> {
        let (_, task) = self.pending.pop_first()?;
        self.pending_ids.remove(&task.id());
        Some(task)
    }

    pub(crate) fn push_in_flight(&mut self, task: Task, expires_at: DateTime<Utc>) {
        self.deadlines.push(LeaseDeadline {
            expires_at,
            task_id: task.id(),
        });
        self.in_flight.insert(task.id(), InFlight { task, expires_at });
    }

    fn contains(&self, id: &TaskId) -> bool {
        self.pending_ids.contains_key(id) || self.in_flight.contains_key(id)
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.pending.is_empty() && self.in_flight.is_empty()
    }
}

/// The queue store: every queue, plus the sequence counter.
///
/// All operations are synchronous and take `&mut self`; the caller owns
/// exclusive access (see `app::QueueService`). Callers are expected to run
/// [`QueueStore::sweep`] before each operation.
pub struct QueueStore {
    pub(crate) queues: HashMap<QueueName, Queue>,
    pub(crate) next_sequence: Sequence,
    settings: StoreSettings,
    ids: Arc<dyn IdGenerator>,
}

impl QueueStore {
    pub fn new(settings: StoreSettings, ids: Arc<dyn IdGenerator>) -> Self {
        Self {
            queues: HashMap::new(),
            next_sequence: 1,
            settings,
            ids,
        }
    }

    fn allocate_sequence(&mut self) -> Sequence {
        let seq = self.next_sequence;
        self.next_sequence += 1;
        seq
    }

    /// Admit a new task at the back of `queue`.
    pub fn enqueue(
        &mut self,
        queue: &QueueName,
        declared_len: usize,
        payload: impl Into<String>,
    ) -> Result<TaskId, ValidationError> {
        let payload = payload.into();
        if declared_len > self.settings.max_payload_len {
            return Err(ValidationError::TooLarge {
                declared: declared_len,
                max: self.settings.max_payload_len,
            });
        }
        if declared_len != payload.len() {
            return Err(ValidationError::LengthMismatch {
                declared: declared_len,
                actual: payload.len(),
            });
        }

        let id = self.ids.generate_task_id();
        let sequence = self.allocate_sequence();
        let task = Task::new(id, queue.clone(), payload, sequence);
        self.queues.entry(queue.clone()).or_default().push_pending(task);
        Ok(id)
    }

    /// Lease the oldest pending task of `queue` until `now + lease_duration`.
    ///
    /// `None` means the queue is unknown or has nothing pending.
    pub fn acquire_lease(&mut self, queue: &QueueName, now: DateTime<Utc>) -> Option<LeasedTask> {
        let lease_duration = self.settings.lease_duration;
        let q = self.queues.get_mut(queue)?;
        let task = q.pop_pending()?;
        let expires_at = now + lease_duration;
        q.push_in_flight(task.clone(), expires_at);
        Some(LeasedTask { task, expires_at })
    }

    /// Remove a leased task for good. `false` if it is not currently leased.
    pub fn acknowledge(&mut self, queue: &QueueName, id: &TaskId) -> bool {
        let Some(q) = self.queues.get_mut(queue) else {
            return false;
        };
        if q.in_flight.remove(id).is_none() {
            return false;
        }
        if q.is_empty() {
            self.queues.remove(queue);
        }
        true
    }

    /// Is `id` pending or leased in `queue`?
    pub fn contains(&self, queue: &QueueName, id: &TaskId) -> bool {
        self.queues.get(queue).is_some_and(|q| q.contains(id))
    }

    pub fn counts(&self) -> QueueCounts {
        let mut counts = QueueCounts::default();
        for q in self.queues.values() {
            counts.queues += 1;
            counts.pending += q.pending.len();
            counts.in_flight += q.in_flight.len();
        }
        counts
    }

    /// Counts for a single queue (`None` if unknown).
    pub fn queue_counts(&self, queue: &QueueName) -> Option<QueueCounts> {
        self.queues.get(queue).map(|q| QueueCounts {
            queues: 1,
            pending: q.pending.len(),
            in_flight: q.in_flight.len(),
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::ports::{SystemClock, UlidGenerator};
    use chrono::TimeZone;
    use std::collections::HashSet;

    pub(crate) fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
    }

    pub(crate) fn store_with_lease(secs: i64) -> QueueStore {
        QueueStore::new(
            StoreSettings {
                lease_duration: Duration::seconds(secs),
                max_payload_len: DEFAULT_MAX_PAYLOAD_LEN,
            },
            Arc::new(UlidGenerator::new(SystemClock)),
        )
    }

    fn q(name: &str) -> QueueName {
        QueueName::new(name)
    }

    #[test]
    fn enqueue_lease_ack_then_empty() {
        let mut store = store_with_lease(4);
        let id = store.enqueue(&q("q1"), 5, "hello").unwrap();

        let leased = store.acquire_lease(&q("q1"), t0()).unwrap();
        assert_eq!(leased.id(), id);
        assert_eq!(leased.task.len(), 5);
        assert_eq!(leased.task.payload(), "hello");
        assert_eq!(leased.expires_at, t0() + Duration::seconds(4));

        assert!(store.acknowledge(&q("q1"), &id));
        assert!(store.acquire_lease(&q("q1"), t0()).is_none());
    }

    #[test]
    fn mismatched_length_is_rejected_without_side_effects() {
        let mut store = store_with_lease(4);

        let err = store.enqueue(&q("q1"), 4, "12345").unwrap_err();

        assert_eq!(
            err,
            ValidationError::LengthMismatch {
                declared: 4,
                actual: 5
            }
        );
        assert_eq!(store.counts(), QueueCounts::default());
        assert_eq!(store.next_sequence, 1);
    }

    #[test]
    fn oversized_declared_length_is_rejected() {
        let mut store = store_with_lease(4);
        let payload = "x".repeat(DEFAULT_MAX_PAYLOAD_LEN + 1);

        let err = store
            .enqueue(&q("q1"), payload.len(), payload)
            .unwrap_err();

        assert!(matches!(err, ValidationError::TooLarge { .. }));
        assert!(store.queue_counts(&q("q1")).is_none());
    }

    #[test]
    fn payload_at_the_limit_is_accepted() {
        let mut store = store_with_lease(4);
        let payload = "x".repeat(DEFAULT_MAX_PAYLOAD_LEN);
        assert!(store.enqueue(&q("q1"), payload.len(), payload).is_ok());
    }

    #[test]
    fn empty_payload_is_accepted() {
        let mut store = store_with_lease(4);
        let id = store.enqueue(&q("q1"), 0, "").unwrap();

        let leased = store.acquire_lease(&q("q1"), t0()).unwrap();
        assert_eq!(leased.id(), id);
        assert!(leased.task.is_empty());
    }

    #[test]
    fn lease_on_unknown_queue_is_none() {
        let mut store = store_with_lease(4);
        assert!(store.acquire_lease(&q("nope"), t0()).is_none());
    }

    #[test]
    fn fifo_without_contention() {
        let mut store = store_with_lease(4);
        let ids: Vec<TaskId> = (0..20)
            .map(|i| {
                let payload = format!("p{i}");
                store.enqueue(&q("q1"), payload.len(), payload).unwrap()
            })
            .collect();

        let leased: Vec<TaskId> = (0..20)
            .map(|_| store.acquire_lease(&q("q1"), t0()).unwrap().id())
            .collect();

        assert_eq!(leased, ids);
    }

    #[test]
    fn two_tasks_second_ack_fails() {
        let mut store = store_with_lease(4);
        let a = store.enqueue(&q("q1"), 5, "12345").unwrap();
        let b = store.enqueue(&q("q1"), 5, "12345").unwrap();

        assert_eq!(store.acquire_lease(&q("q1"), t0()).unwrap().id(), a);
        assert_eq!(store.acquire_lease(&q("q1"), t0()).unwrap().id(), b);

        assert!(store.acknowledge(&q("q1"), &b));
        assert!(!store.acknowledge(&q("q1"), &b));
        assert!(store.contains(&q("q1"), &a));
    }

    #[test]
    fn a_leased_task_is_never_handed_out_twice() {
        let mut store = store_with_lease(4);
        store.enqueue(&q("q1"), 1, "a").unwrap();
        store.enqueue(&q("q1"), 1, "b").unwrap();

        let first = store.acquire_lease(&q("q1"), t0()).unwrap().id();
        let second = store.acquire_lease(&q("q1"), t0()).unwrap().id();

        assert_ne!(first, second);
        assert!(store.acquire_lease(&q("q1"), t0()).is_none());
    }

    #[test]
    fn ack_of_pending_task_fails() {
        let mut store = store_with_lease(4);
        let id = store.enqueue(&q("q1"), 1, "a").unwrap();

        assert!(!store.acknowledge(&q("q1"), &id));
        assert!(store.contains(&q("q1"), &id));
    }

    #[test]
    fn ack_is_terminal() {
        let mut store = store_with_lease(4);
        let id = store.enqueue(&q("q1"), 1, "a").unwrap();
        store.acquire_lease(&q("q1"), t0()).unwrap();

        assert!(store.acknowledge(&q("q1"), &id));
        assert!(!store.contains(&q("q1"), &id));
        assert!(!store.acknowledge(&q("q1"), &id));
    }

    #[test]
    fn contains_is_scoped_to_the_queue() {
        let mut store = store_with_lease(4);
        let id = store.enqueue(&q("q1"), 1, "a").unwrap();

        assert!(store.contains(&q("q1"), &id));
        assert!(!store.contains(&q("q2"), &id));
        assert!(!store.acknowledge(&q("q2"), &id));
    }

    #[test]
    fn contains_does_not_match_on_payload() {
        let mut store = store_with_lease(4);
        let id = store.enqueue(&q("q1"), 1, "a").unwrap();
        let text = id.to_string();
        // payload equal to the other task's id text must not count as membership
        let other = store.enqueue(&q("q2"), text.len(), text).unwrap();

        assert!(!store.contains(&q("q2"), &id));
        assert!(store.contains(&q("q2"), &other));
    }

    #[test]
    fn acked_empty_queue_is_dropped() {
        let mut store = store_with_lease(4);
        let id = store.enqueue(&q("q1"), 1, "a").unwrap();
        store.acquire_lease(&q("q1"), t0()).unwrap();
        store.acknowledge(&q("q1"), &id);

        assert_eq!(store.counts().queues, 0);
    }

    #[test]
    fn ids_are_pairwise_distinct() {
        let mut store = store_with_lease(4);
        let ids: HashSet<TaskId> = (0..500)
            .map(|_| store.enqueue(&q("q1"), 1, "a").unwrap())
            .collect();
        assert_eq!(ids.len(), 500);
    }

    #[test]
    fn counts_track_pending_and_in_flight() {
        let mut store = store_with_lease(4);
        store.enqueue(&q("q1"), 1, "a").unwrap();
        store.enqueue(&q("q1"), 1, "b").unwrap();
        store.enqueue(&q("q2"), 1, "c").unwrap();
        store.acquire_lease(&q("q1"), t0()).unwrap();

        assert_eq!(
            store.counts(),
            QueueCounts {
                queues: 2,
                pending: 2,
                in_flight: 1
            }
        );
        assert_eq!(
            store.queue_counts(&q("q1")),
            Some(QueueCounts {
                queues: 1,
                pending: 1,
                in_flight: 1
            })
        );
    }
}

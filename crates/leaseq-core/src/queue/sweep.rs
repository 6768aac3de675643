//! Lease sweeper: expired leases go back to pending.
//!
//! Background timer ではなく、各リクエストの最初に同期的に呼ばれる純粋な処理。
//! 何度呼んでも安全（冪等）です。

use chrono::{DateTime, Utc};

use super::QueueStore;
use super::store::Queue;

impl Queue {
    /// Requeue every lease with `expires_at <= now`. Returns how many moved.
    fn sweep(&mut self, now: DateTime<Utc>) -> usize {
        let mut requeued = 0;
        while let Some(entry) = self.deadlines.peek() {
            if entry.expires_at > now {
                break; // Heap is sorted, so we can stop
            }
            let Some(entry) = self.deadlines.pop() else {
                break;
            };

            // Stale entry: acked, or leased again with a later deadline.
            let current = self
                .in_flight
                .get(&entry.task_id)
                .is_some_and(|f| f.expires_at == entry.expires_at);
            if !current {
                continue;
            }
            if let Some(flight) = self.in_flight.remove(&entry.task_id) {
                // Original sequence is kept, so it slots back into arrival order.
                self.push_pending(flight.task);
                requeued += 1;
            }
        }
        requeued
    }
}

impl QueueStore {
    /// Requeue expired leases across every queue. Returns how many moved.
    pub fn sweep(&mut self, now: DateTime<Utc>) -> usize {
        self.queues.values_mut().map(|q| q.sweep(now)).sum()
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::QueueName;
    use crate::queue::store::tests::{store_with_lease, t0};
    use chrono::Duration;

    fn q(name: &str) -> QueueName {
        QueueName::new(name)
    }

    #[test]
    fn expired_lease_is_leased_again() {
        let mut store = store_with_lease(1);
        let id = store.enqueue(&q("q1"), 5, "hello").unwrap();
        store.acquire_lease(&q("q1"), t0()).unwrap();

        let later = t0() + Duration::seconds(2);
        assert_eq!(store.sweep(later), 1);

        let again = store.acquire_lease(&q("q1"), later).unwrap();
        assert_eq!(again.id(), id);
        assert_eq!(again.task.payload(), "hello");
    }

    #[test]
    fn lease_is_requeued_exactly_at_expiry_and_not_before() {
        let mut store = store_with_lease(10);
        let id = store.enqueue(&q("q1"), 1, "a").unwrap();
        store.acquire_lease(&q("q1"), t0()).unwrap();

        let just_before = t0() + Duration::seconds(10) - Duration::milliseconds(1);
        assert_eq!(store.sweep(just_before), 0);
        assert!(store.acquire_lease(&q("q1"), just_before).is_none());

        let at_expiry = t0() + Duration::seconds(10);
        assert_eq!(store.sweep(at_expiry), 1);
        assert_eq!(store.acquire_lease(&q("q1"), at_expiry).unwrap().id(), id);
    }

    #[test]
    fn sweep_is_idempotent() {
        let mut store = store_with_lease(1);
        store.enqueue(&q("q1"), 1, "a").unwrap();
        store.acquire_lease(&q("q1"), t0()).unwrap();

        let later = t0() + Duration::seconds(5);
        assert_eq!(store.sweep(later), 1);
        assert_eq!(store.sweep(later), 0);
        assert_eq!(store.counts().pending, 1);
        assert_eq!(store.counts().in_flight, 0);
    }

    #[test]
    fn requeued_task_keeps_its_place_in_arrival_order() {
        let mut store = store_with_lease(1);
        let a = store.enqueue(&q("q1"), 1, "a").unwrap();
        let b = store.enqueue(&q("q1"), 1, "b").unwrap();
        let c = store.enqueue(&q("q1"), 1, "c").unwrap();

        // lease a, let it expire while b and c are still pending
        assert_eq!(store.acquire_lease(&q("q1"), t0()).unwrap().id(), a);
        let later = t0() + Duration::seconds(2);
        store.sweep(later);

        let order: Vec<_> = (0..3)
            .map(|_| store.acquire_lease(&q("q1"), later).unwrap().id())
            .collect();
        assert_eq!(order, vec![a, b, c]);
    }

    #[test]
    fn acked_lease_leaves_only_a_stale_deadline() {
        let mut store = store_with_lease(1);
        let id = store.enqueue(&q("q1"), 1, "a").unwrap();
        let other = store.enqueue(&q("q1"), 1, "b").unwrap();
        store.acquire_lease(&q("q1"), t0()).unwrap();
        assert!(store.acknowledge(&q("q1"), &id));

        assert_eq!(store.sweep(t0() + Duration::seconds(5)), 0);
        assert!(!store.contains(&q("q1"), &id));
        assert!(store.contains(&q("q1"), &other));
    }

    #[test]
    fn re_leased_task_ignores_its_old_deadline() {
        let mut store = store_with_lease(10);
        let id = store.enqueue(&q("q1"), 1, "a").unwrap();
        store.acquire_lease(&q("q1"), t0()).unwrap();

        let t1 = t0() + Duration::seconds(10);
        store.sweep(t1);
        store.acquire_lease(&q("q1"), t1).unwrap();

        // old deadline already consumed; the new one is at t1 + 10
        assert_eq!(store.sweep(t1 + Duration::seconds(5)), 0);
        assert!(store.acknowledge(&q("q1"), &id));
    }

    #[test]
    fn sweep_covers_every_queue() {
        let mut store = store_with_lease(1);
        store.enqueue(&q("q1"), 1, "a").unwrap();
        store.enqueue(&q("q2"), 1, "b").unwrap();
        store.acquire_lease(&q("q1"), t0()).unwrap();
        store.acquire_lease(&q("q2"), t0()).unwrap();

        assert_eq!(store.sweep(t0() + Duration::seconds(1)), 2);
        assert_eq!(store.counts().in_flight, 0);
    }
}

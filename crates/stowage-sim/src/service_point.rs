//! Priority-ordered mutual-exclusion resource.
//!
//! A [`ServicePoint`] has a fixed number of slots. A request is granted at
//! once when a slot is free and nobody is queued; otherwise it waits in a
//! queue ordered by ascending priority value, ties broken by arrival order.
//! A holder is never preempted: its slot returns to the pool (or passes to
//! the head of the queue) only when its [`ServiceGrant`] is dropped.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::oneshot;

use crate::error::SimError;

/// A queued request waiting for a slot.
#[derive(Debug)]
struct Waiter {
    /// Lower value is served first.
    priority: i32,
    /// Arrival order, breaks priority ties.
    seq: u64,
    /// Fires when the slot is handed over.
    grant: oneshot::Sender<()>,
}

impl Waiter {
    const fn key(&self) -> (i32, u64) {
        (self.priority, self.seq)
    }
}

impl PartialEq for Waiter {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Waiter {}

impl PartialOrd for Waiter {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Waiter {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}

/// Slot bookkeeping, guarded by the service point's mutex.
#[derive(Debug, Default)]
struct Slots {
    in_use: usize,
    next_seq: u64,
    waiting: BinaryHeap<Reverse<Waiter>>,
}

/// A priority resource with a fixed number of slots.
#[derive(Debug)]
pub struct ServicePoint {
    name: String,
    capacity: usize,
    slots: Mutex<Slots>,
}

impl ServicePoint {
    /// Create a service point with `capacity` slots (at least one).
    pub fn new(name: impl Into<String>, capacity: usize) -> Self {
        Self {
            name: name.into(),
            capacity: capacity.max(1),
            slots: Mutex::new(Slots::default()),
        }
    }

    /// Name used in logs.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of slots.
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of slots currently held.
    pub fn in_use(&self) -> usize {
        self.lock().in_use
    }

    /// Number of requests waiting for a slot.
    pub fn queue_len(&self) -> usize {
        self.lock()
            .waiting
            .iter()
            .filter(|Reverse(waiter)| !waiter.grant.is_closed())
            .count()
    }

    /// Wait for a slot. Lower `priority` values are served first.
    ///
    /// Dropping the returned future before it completes withdraws the
    /// request without leaking a slot.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::ServicePointClosed`] if the grant channel is
    /// dropped without handing over a slot.
    pub async fn request(&self, priority: i32) -> Result<ServiceGrant<'_>, SimError> {
        let receiver = {
            let mut slots = self.lock();
            if slots.in_use < self.capacity && slots.waiting.is_empty() {
                slots.in_use = slots.in_use.saturating_add(1);
                return Ok(ServiceGrant { point: self });
            }
            let (grant, receiver) = oneshot::channel();
            let seq = slots.next_seq;
            slots.next_seq = seq.wrapping_add(1);
            slots.waiting.push(Reverse(Waiter {
                priority,
                seq,
                grant,
            }));
            receiver
        };

        let mut pending = PendingRequest {
            point: self,
            receiver: Some(receiver),
        };
        pending.wait().await?;
        Ok(ServiceGrant { point: self })
    }

    /// Hand the slot to the next live waiter, or return it to the pool.
    fn release(&self) {
        let mut slots = self.lock();
        while let Some(Reverse(waiter)) = slots.waiting.pop() {
            if waiter.grant.send(()).is_ok() {
                return;
            }
        }
        slots.in_use = slots.in_use.saturating_sub(1);
    }

    fn lock(&self) -> MutexGuard<'_, Slots> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A held slot. The slot is released when the grant is dropped.
#[derive(Debug)]
#[must_use = "dropping the grant releases the slot immediately"]
pub struct ServiceGrant<'a> {
    point: &'a ServicePoint,
}

impl ServiceGrant<'_> {
    /// The service point this grant belongs to.
    pub const fn point(&self) -> &ServicePoint {
        self.point
    }
}

impl Drop for ServiceGrant<'_> {
    fn drop(&mut self) {
        self.point.release();
    }
}

/// A queued request; releases a slot it was handed if dropped early.
struct PendingRequest<'a> {
    point: &'a ServicePoint,
    receiver: Option<oneshot::Receiver<()>>,
}

impl PendingRequest<'_> {
    async fn wait(&mut self) -> Result<(), SimError> {
        let outcome = match self.receiver.as_mut() {
            Some(receiver) => receiver.await,
            None => return Ok(()),
        };
        self.receiver = None;
        match outcome {
            Ok(()) => Ok(()),
            Err(_) => Err(SimError::ServicePointClosed {
                name: self.point.name.clone(),
            }),
        }
    }
}

impl Drop for PendingRequest<'_> {
    fn drop(&mut self) {
        if let Some(mut receiver) = self.receiver.take() {
            receiver.close();
            if receiver.try_recv().is_ok() {
                self.point.release();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use tokio::sync::Mutex as AsyncMutex;

    use super::*;

    /// Spawn a holder that keeps the point busy for `hold`, then queue
    /// `requests` (label, priority) in order and record the serving order.
    async fn serving_order(requests: Vec<(&'static str, i32)>) -> Vec<&'static str> {
        let point = Arc::new(ServicePoint::new("input", 1));
        let order = Arc::new(AsyncMutex::new(Vec::new()));

        let holder_point = Arc::clone(&point);
        let holder = tokio::spawn(async move {
            let grant = holder_point.request(0).await;
            assert!(grant.is_ok());
            tokio::time::sleep(Duration::from_secs(10)).await;
            drop(grant);
        });
        tokio::task::yield_now().await;

        let mut handles = Vec::new();
        for (label, priority) in requests {
            let point = Arc::clone(&point);
            let order = Arc::clone(&order);
            handles.push(tokio::spawn(async move {
                let grant = point.request(priority).await;
                assert!(grant.is_ok());
                order.lock().await.push(label);
                tokio::time::sleep(Duration::from_secs(1)).await;
            }));
            tokio::task::yield_now().await;
        }

        let _ = holder.await;
        for handle in handles {
            let _ = handle.await;
        }
        order.lock().await.clone()
    }

    #[tokio::test(start_paused = true)]
    async fn free_point_grants_immediately() {
        let point = ServicePoint::new("input", 1);
        let grant = point.request(5).await;
        assert!(grant.is_ok());
        assert_eq!(point.in_use(), 1);
        drop(grant);
        assert_eq!(point.in_use(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn lower_priority_value_served_first() {
        let served = serving_order(vec![("low", 10), ("high", 1), ("mid", 5)]).await;
        assert_eq!(served, vec!["high", "mid", "low"]);
    }

    #[tokio::test(start_paused = true)]
    async fn equal_priorities_are_fifo() {
        let served = serving_order(vec![("a", 3), ("b", 3), ("c", 3), ("urgent", 0)]).await;
        assert_eq!(served, vec!["urgent", "a", "b", "c"]);
    }

    #[tokio::test(start_paused = true)]
    async fn capacity_allows_parallel_holders() {
        let point = ServicePoint::new("dock", 2);
        let first = point.request(0).await;
        let second = point.request(0).await;
        assert!(first.is_ok() && second.is_ok());
        assert_eq!(point.in_use(), 2);
        assert_eq!(point.queue_len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn withdrawn_request_does_not_leak_slot() {
        let point = ServicePoint::new("input", 1);
        let grant = point.request(0).await;
        assert!(grant.is_ok());

        let waited = tokio::time::timeout(Duration::from_secs(1), point.request(0)).await;
        assert!(waited.is_err());
        assert_eq!(point.queue_len(), 0);

        drop(grant);
        assert_eq!(point.in_use(), 0);
        let again = point.request(0).await;
        assert!(again.is_ok());
        assert_eq!(point.in_use(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn queue_len_counts_waiters() {
        let point = Arc::new(ServicePoint::new("input", 1));
        let grant = point.request(0).await;
        assert!(grant.is_ok());

        let waiter_point = Arc::clone(&point);
        let waiter = tokio::spawn(async move {
            let grant = waiter_point.request(1).await;
            grant.is_ok()
        });
        tokio::task::yield_now().await;
        assert_eq!(point.queue_len(), 1);

        drop(grant);
        assert_eq!(waiter.await.ok(), Some(true));
        assert_eq!(point.queue_len(), 0);
        assert_eq!(point.in_use(), 0);
    }
}

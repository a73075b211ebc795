//! FIFO conveyor with conditional retrieval.
//!
//! A [`Conveyor`] accepts items at any time and hands them out in arrival
//! order. [`Conveyor::get_where`] suspends the caller until an item matching
//! its predicate is on the conveyor, which is how a crane waits for one
//! specific unit load among several queued at the input.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::Notify;

/// An unbounded FIFO queue of items with filtered gets.
#[derive(Debug)]
pub struct Conveyor<T> {
    name: String,
    items: Mutex<VecDeque<T>>,
    arrivals: Notify,
}

impl<T> Conveyor<T> {
    /// Create an empty conveyor.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            items: Mutex::new(VecDeque::new()),
            arrivals: Notify::new(),
        }
    }

    /// Name used in logs.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Place an item at the tail and wake every waiting getter.
    pub fn put(&self, item: T) {
        self.lock().push_back(item);
        self.arrivals.notify_waiters();
    }

    /// Wait for the item at the head.
    pub async fn get(&self) -> T {
        self.get_where(|_| true).await
    }

    /// Wait for the first item (in arrival order) matching `predicate`.
    pub async fn get_where<F>(&self, predicate: F) -> T
    where
        F: Fn(&T) -> bool,
    {
        loop {
            let mut notified = std::pin::pin!(self.arrivals.notified());
            // Register interest before checking, so a put between the check
            // and the await still wakes us.
            notified.as_mut().enable();
            if let Some(item) = self.try_get_where(&predicate) {
                return item;
            }
            notified.await;
        }
    }

    /// Take the first item matching `predicate` without waiting.
    pub fn try_get_where<F>(&self, predicate: F) -> Option<T>
    where
        F: Fn(&T) -> bool,
    {
        let mut items = self.lock();
        let index = items.iter().position(predicate)?;
        items.remove(index)
    }

    /// Number of items on the conveyor.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether the conveyor is empty.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<T>> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn get_returns_items_in_arrival_order() {
        let conveyor = Conveyor::new("input");
        conveyor.put(1);
        conveyor.put(2);
        assert_eq!(conveyor.get().await, 1);
        assert_eq!(conveyor.get().await, 2);
        assert!(conveyor.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn get_where_skips_non_matching_items() {
        let conveyor = Conveyor::new("output");
        conveyor.put("a");
        conveyor.put("b");
        conveyor.put("c");
        assert_eq!(conveyor.get_where(|item| *item == "b").await, "b");
        assert_eq!(conveyor.len(), 2);
        assert_eq!(conveyor.try_get_where(|_| true), Some("a"));
    }

    #[tokio::test(start_paused = true)]
    async fn get_where_waits_for_matching_put() {
        let conveyor = Arc::new(Conveyor::new("output"));
        let producer = Arc::clone(&conveyor);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(5)).await;
            producer.put(7);
            tokio::time::sleep(Duration::from_secs(5)).await;
            producer.put(42);
        });

        let start = tokio::time::Instant::now();
        let item = conveyor.get_where(|item| *item == 42).await;
        assert_eq!(item, 42);
        assert_eq!(start.elapsed(), Duration::from_secs(10));
        assert_eq!(conveyor.try_get_where(|_| true), Some(7));
    }

    #[tokio::test(start_paused = true)]
    async fn try_get_on_empty_is_none() {
        let conveyor: Conveyor<u32> = Conveyor::new("input");
        assert!(conveyor.try_get_where(|_| true).is_none());
    }
}

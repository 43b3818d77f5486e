//! FIFO task queue with a pending-work counter.
//!
//! One type backs both stages of the pipeline: the work queue (orchestrator
//! to fetch workers) and the sink queue (fetch workers to the writer).
//!
//! - `put` appends and bumps the pending count
//! - `get` waits for the head item; concurrent consumers never share an item
//! - `mark_done` drops the pending count by one, never below zero
//! - `join` waits until the pending count is zero
//!
//! Item availability is a [`Semaphore`] holding one permit per queued item, so
//! a waiting `get` can be cancelled (e.g. inside `tokio::select!`) without
//! losing an item. The pending count lives in a [`watch`] channel, which makes
//! `join` immune to lost wakeups: it re-checks the current value before
//! sleeping.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::{Semaphore, watch};

use crate::error::QueueError;
use crate::types::ResultRecord;

/// Queue of targets waiting to be fetched
pub type WorkQueue = TaskQueue<String>;

/// Queue of classified records waiting to be persisted
pub type SinkQueue = TaskQueue<ResultRecord>;

/// Ordered multi-producer/multi-consumer queue with `join` semantics
pub struct TaskQueue<T> {
    /// Buffered items in FIFO order
    items: Mutex<VecDeque<T>>,
    /// One permit per buffered item
    available: Semaphore,
    /// Free capacity when bounded
    slots: Option<Semaphore>,
    /// Items put but not yet marked done
    pending: watch::Sender<usize>,
    capacity: Option<usize>,
}

impl<T> TaskQueue<T> {
    /// Create an unbounded queue
    pub fn unbounded() -> Self {
        Self::with_capacity(None)
    }

    /// Create a queue, bounded to `capacity` buffered items when `Some`
    ///
    /// A capacity of `Some(0)` is treated as `Some(1)`.
    pub fn with_capacity(capacity: Option<usize>) -> Self {
        let capacity = capacity.map(|c| c.max(1));
        let (pending, _) = watch::channel(0);
        Self {
            items: Mutex::new(VecDeque::new()),
            available: Semaphore::new(0),
            slots: capacity.map(Semaphore::new),
            pending,
            capacity,
        }
    }

    /// Append `item` to the tail and count it as pending
    ///
    /// On a bounded queue this waits for a free slot. Waiting producers are
    /// served in arrival order, so each producer's items keep their order.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Closed`] if the queue was closed.
    pub async fn put(&self, item: T) -> Result<(), QueueError> {
        if let Some(slots) = &self.slots {
            slots.acquire().await.map_err(|_| QueueError::Closed)?.forget();
        }
        if self.available.is_closed() {
            return Err(QueueError::Closed);
        }

        // Count before publishing so `join` can never observe zero while the
        // item is still buffered.
        self.pending.send_modify(|n| *n += 1);
        self.lock_items().push_back(item);
        self.available.add_permits(1);
        Ok(())
    }

    /// Remove and return the head item, waiting until one is available
    ///
    /// Cancel-safe: dropping the future before it resolves leaves the queue
    /// untouched.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Closed`] once the queue is closed.
    pub async fn get(&self) -> Result<T, QueueError> {
        loop {
            let permit = self
                .available
                .acquire()
                .await
                .map_err(|_| QueueError::Closed)?;

            // Permits never outnumber buffered items, so this only misses if
            // the queue is being torn down underneath us.
            let head = self.lock_items().pop_front();
            let Some(item) = head else {
                drop(permit);
                tokio::task::yield_now().await;
                continue;
            };
            permit.forget();

            if let Some(slots) = &self.slots {
                slots.add_permits(1);
            }
            return Ok(item);
        }
    }

    /// Mark one previously dequeued item as fully processed
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::TooManyDone`] if nothing is pending. The count is
    /// left at zero in that case.
    pub fn mark_done(&self) -> Result<(), QueueError> {
        let decremented = self.pending.send_if_modified(|n| match n.checked_sub(1) {
            Some(next) => {
                *n = next;
                true
            }
            None => false,
        });

        if decremented {
            Ok(())
        } else {
            Err(QueueError::TooManyDone)
        }
    }

    /// Wait until every item put so far has been marked done
    ///
    /// Returns immediately if nothing is pending.
    pub async fn join(&self) {
        let mut rx = self.pending.subscribe();
        // The sender lives in `self`, so the channel cannot close while we wait.
        let _ = rx.wait_for(|pending| *pending == 0).await;
    }

    /// Stop the queue: blocked and future `get`/`put` calls fail with
    /// [`QueueError::Closed`]
    ///
    /// Buffered items are discarded with the queue. Close only after `join`
    /// has returned, or when abandoning the run.
    pub fn close(&self) {
        self.available.close();
        if let Some(slots) = &self.slots {
            slots.close();
        }
    }

    /// Whether [`close`](Self::close) has been called
    pub fn is_closed(&self) -> bool {
        self.available.is_closed()
    }

    /// Items put but not yet marked done
    pub fn pending(&self) -> usize {
        *self.pending.borrow()
    }

    /// Items currently buffered (not yet taken by a consumer)
    pub fn len(&self) -> usize {
        self.lock_items().len()
    }

    /// Whether no items are buffered
    pub fn is_empty(&self) -> bool {
        self.lock_items().is_empty()
    }

    /// Maximum buffered items, or `None` when unbounded
    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    // Critical sections never panic, so a poisoned lock still guards a
    // consistent deque.
    fn lock_items(&self) -> MutexGuard<'_, VecDeque<T>> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T> Default for TaskQueue<T> {
    fn default() -> Self {
        Self::unbounded()
    }
}

impl<T> std::fmt::Debug for TaskQueue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskQueue")
            .field("len", &self.len())
            .field("pending", &self.pending())
            .field("capacity", &self.capacity)
            .field("closed", &self.is_closed())
            .finish()
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn get_returns_items_in_put_order() {
        let queue = TaskQueue::unbounded();
        for i in 0..5 {
            queue.put(i).await.unwrap();
        }
        assert_eq!(queue.len(), 5);
        assert_eq!(queue.pending(), 5);

        let mut out = Vec::new();
        for _ in 0..5 {
            out.push(queue.get().await.unwrap());
        }
        assert_eq!(out, vec![0, 1, 2, 3, 4]);
        assert!(queue.is_empty());
        // Taking an item does not complete it
        assert_eq!(queue.pending(), 5);
    }

    #[tokio::test]
    async fn join_returns_immediately_when_nothing_pending() {
        let queue: TaskQueue<u32> = TaskQueue::unbounded();
        tokio::time::timeout(Duration::from_millis(100), queue.join())
            .await
            .expect("join on an idle queue must not block");
    }

    #[tokio::test]
    async fn join_waits_for_every_mark_done() {
        let queue = Arc::new(TaskQueue::unbounded());
        queue.put("a").await.unwrap();
        queue.put("b").await.unwrap();

        let joiner = {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move { queue.join().await })
        };

        queue.get().await.unwrap();
        queue.mark_done().unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!joiner.is_finished(), "join returned with one item pending");

        queue.get().await.unwrap();
        queue.mark_done().unwrap();
        tokio::time::timeout(Duration::from_secs(1), joiner)
            .await
            .expect("join should complete once pending reaches zero")
            .unwrap();
        assert_eq!(queue.pending(), 0);
    }

    #[tokio::test]
    async fn mark_done_without_pending_is_rejected_and_count_stays_zero() {
        let queue = TaskQueue::unbounded();
        assert_eq!(queue.mark_done(), Err(QueueError::TooManyDone));

        queue.put(1).await.unwrap();
        queue.get().await.unwrap();
        assert_eq!(queue.mark_done(), Ok(()));
        assert_eq!(queue.mark_done(), Err(QueueError::TooManyDone));
        assert_eq!(queue.pending(), 0);
    }

    #[tokio::test]
    async fn get_waits_for_a_later_put() {
        let queue = Arc::new(TaskQueue::unbounded());
        let consumer = {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move { queue.get().await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!consumer.is_finished());

        queue.put("late").await.unwrap();
        let item = tokio::time::timeout(Duration::from_secs(1), consumer)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(item, "late");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_consumers_partition_the_items() {
        const ITEMS: usize = 500;
        const CONSUMERS: usize = 8;

        let queue = Arc::new(TaskQueue::unbounded());
        let mut consumers = Vec::new();
        for _ in 0..CONSUMERS {
            let queue = Arc::clone(&queue);
            consumers.push(tokio::spawn(async move {
                let mut seen = Vec::new();
                while let Ok(item) = queue.get().await {
                    seen.push(item);
                    queue.mark_done().unwrap();
                }
                seen
            }));
        }

        for i in 0..ITEMS {
            queue.put(i).await.unwrap();
        }
        queue.join().await;
        queue.close();

        let mut all = Vec::new();
        for consumer in consumers {
            all.extend(consumer.await.unwrap());
        }
        all.sort_unstable();
        assert_eq!(all, (0..ITEMS).collect::<Vec<_>>());
        assert_eq!(queue.pending(), 0);
    }

    #[tokio::test]
    async fn bounded_put_waits_for_a_free_slot() {
        let queue = Arc::new(TaskQueue::with_capacity(Some(1)));
        queue.put(1).await.unwrap();

        let blocked = tokio::time::timeout(Duration::from_millis(50), queue.put(2)).await;
        assert!(blocked.is_err(), "put into a full queue should wait");
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.pending(), 1, "a cancelled put must not count as pending");

        let producer = {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move { queue.put(3).await })
        };
        assert_eq!(queue.get().await.unwrap(), 1);
        tokio::time::timeout(Duration::from_secs(1), producer)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(queue.get().await.unwrap(), 3);
        assert_eq!(queue.capacity(), Some(1));
    }

    #[tokio::test]
    async fn close_wakes_blocked_consumers() {
        let queue: Arc<TaskQueue<u8>> = Arc::new(TaskQueue::unbounded());
        let consumer = {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move { queue.get().await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        queue.close();

        let result = tokio::time::timeout(Duration::from_secs(1), consumer)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(result, Err(QueueError::Closed));
        assert_eq!(queue.put(7).await, Err(QueueError::Closed));
    }

    #[tokio::test]
    async fn cancelled_get_does_not_lose_an_item() {
        let queue = TaskQueue::unbounded();
        let waited = tokio::time::timeout(Duration::from_millis(20), queue.get()).await;
        assert!(waited.is_err());

        queue.put("kept").await.unwrap();
        assert_eq!(queue.get().await.unwrap(), "kept");
    }
}

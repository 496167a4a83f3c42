//! Unbounded FIFO queue with completion tracking
//!
//! Every enqueued item counts as unfinished until the [`Ticket`] handed out by
//! [`WorkQueue::dequeue`] is acknowledged, either explicitly or by being dropped.
//! [`WorkQueue::join`] waits for the unfinished count to reach zero.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::Notify;

struct Inner<T> {
    items: Mutex<VecDeque<T>>,
    unfinished: AtomicUsize,
    available: Notify,
    finished: Notify,
}

pub struct WorkQueue<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for WorkQueue<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Default for WorkQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> WorkQueue<T> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                items: Mutex::new(VecDeque::new()),
                unfinished: AtomicUsize::new(0),
                available: Notify::new(),
                finished: Notify::new(),
            }),
        }
    }

    /// Append an item; never blocks
    pub fn enqueue(&self, item: T) {
        self.inner.unfinished.fetch_add(1, Ordering::SeqCst);
        self.inner.items.lock().push_back(item);
        self.inner.available.notify_one();
    }

    /// Wait for the next item
    pub async fn dequeue(&self) -> Ticket<T> {
        loop {
            if let Some(ticket) = self.try_dequeue() {
                return ticket;
            }
            self.inner.available.notified().await;
        }
    }

    /// Take the next item if one is queued
    pub fn try_dequeue(&self) -> Option<Ticket<T>> {
        let item = self.inner.items.lock().pop_front()?;
        Some(Ticket {
            item: Some(item),
            inner: Arc::clone(&self.inner),
        })
    }

    /// Remove every queued item without waiting. Drained items count as finished.
    pub fn drain(&self) -> Vec<T> {
        let items: Vec<T> = self.inner.items.lock().drain(..).collect();
        for _ in &items {
            self.inner.task_done();
        }
        items
    }

    /// Items waiting to be dequeued
    pub fn len(&self) -> usize {
        self.inner.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Items enqueued but not yet acknowledged
    pub fn unfinished(&self) -> usize {
        self.inner.unfinished.load(Ordering::SeqCst)
    }

    /// Wait until every enqueued item has been acknowledged
    pub async fn join(&self) {
        loop {
            let finished = self.inner.finished.notified();
            tokio::pin!(finished);
            // Register before checking so a concurrent acknowledgement is not missed.
            finished.as_mut().enable();

            if self.unfinished() == 0 {
                return;
            }
            finished.await;
        }
    }
}

impl<T> Inner<T> {
    fn task_done(&self) {
        let previous = self
            .unfinished
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .unwrap_or(0);

        if previous <= 1 {
            self.finished.notify_waiters();
        }
    }
}

/// A dequeued item that acknowledges its queue exactly once
pub struct Ticket<T> {
    item: Option<T>,
    inner: Arc<Inner<T>>,
}

impl<T> Ticket<T> {
    pub fn get(&self) -> Option<&T> {
        self.item.as_ref()
    }

    /// Take the item out; the acknowledgement still happens when the ticket drops
    pub fn take(&mut self) -> Option<T> {
        self.item.take()
    }

    /// Acknowledge now
    pub fn ack(self) {}
}

impl<T> Drop for Ticket<T> {
    fn drop(&mut self) {
        self.inner.task_done();
    }
}

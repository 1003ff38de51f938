// SPDX-License-Identifier: MPL-2.0

//! Bounded drop-oldest channel
//!
//! The pipeline's inter-stage channels (capture -> detect, detect ->
//! publish/record) favor freshness over completeness: a slow consumer
//! should see the newest frame, not queue up behind stale ones. Neither
//! `tokio::sync::mpsc` (blocks the sender when full) nor `watch` (only
//! ever holds one value) directly expresses "keep the newest N and drop
//! the rest", so this wraps a small ring buffer with a `Notify` for
//! consumer wakeup.

use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::{Mutex, Notify};

struct Shared<T> {
    queue: Mutex<VecDeque<T>>,
    capacity: usize,
    notify: Notify,
}

pub struct DropOldestSender<T> {
    shared: Arc<Shared<T>>,
}

pub struct DropOldestReceiver<T> {
    shared: Arc<Shared<T>>,
}

pub fn channel<T>(capacity: usize) -> (DropOldestSender<T>, DropOldestReceiver<T>) {
    let shared = Arc::new(Shared {
        queue: Mutex::new(VecDeque::with_capacity(capacity.max(1))),
        capacity: capacity.max(1),
        notify: Notify::new(),
    });
    (DropOldestSender { shared: Arc::clone(&shared) }, DropOldestReceiver { shared })
}

impl<T> DropOldestSender<T> {
    /// Push an item, dropping the oldest queued item if the channel is
    /// already at capacity.
    pub async fn send(&self, item: T) {
        let mut queue = self.shared.queue.lock().await;
        if queue.len() >= self.shared.capacity {
            queue.pop_front();
        }
        queue.push_back(item);
        drop(queue);
        self.shared.notify.notify_one();
    }
}

impl<T> Clone for DropOldestSender<T> {
    fn clone(&self) -> Self {
        Self { shared: Arc::clone(&self.shared) }
    }
}

impl<T> DropOldestReceiver<T> {
    /// Wait for the next item. Returns `None` only if every sender has
    /// been dropped and the queue is empty (not currently reachable since
    /// the receiver itself holds a shared `Arc`, but kept for symmetry
    /// with `mpsc::Receiver::recv`).
    pub async fn recv(&mut self) -> Option<T> {
        loop {
            {
                let mut queue = self.shared.queue.lock().await;
                if let Some(item) = queue.pop_front() {
                    return Some(item);
                }
            }
            self.shared.notify.notified().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_send_and_recv_preserves_order_under_capacity() {
        let (tx, mut rx) = channel::<u32>(4);
        tx.send(1).await;
        tx.send(2).await;
        assert_eq!(rx.recv().await, Some(1));
        assert_eq!(rx.recv().await, Some(2));
    }

    #[tokio::test]
    async fn test_overflow_drops_oldest() {
        let (tx, mut rx) = channel::<u32>(2);
        tx.send(1).await;
        tx.send(2).await;
        tx.send(3).await; // drops 1
        assert_eq!(rx.recv().await, Some(2));
        assert_eq!(rx.recv().await, Some(3));
    }

    #[tokio::test]
    async fn test_recv_waits_for_next_send() {
        let (tx, mut rx) = channel::<u32>(1);
        let handle = tokio::spawn(async move { rx.recv().await });
        tokio::task::yield_now().await;
        tx.send(42).await;
        assert_eq!(handle.await.unwrap(), Some(42));
    }
}

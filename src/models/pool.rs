// SPDX-License-Identifier: MPL-2.0

//! Fixed-size round-robin pool for non-`Sync` inference engines
//!
//! Grounded on the single-backend `Arc<Mutex<_>>` guard pattern the
//! teacher used for its active camera backend, generalized here to a
//! fixed set of interchangeable workers instead of one swappable slot.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

pub struct InferencePool<T> {
    workers: Vec<Mutex<T>>,
    next: AtomicUsize,
}

impl<T> InferencePool<T> {
    pub fn new(workers: Vec<T>) -> Self {
        assert!(!workers.is_empty(), "inference pool requires at least one worker");
        Self {
            workers: workers.into_iter().map(Mutex::new).collect(),
            next: AtomicUsize::new(0),
        }
    }

    /// Run `f` against the next available worker, blocking only if that
    /// particular worker is currently busy. Workers are chosen
    /// round-robin so load spreads evenly under concurrent callers.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        let index = self.next.fetch_add(1, Ordering::Relaxed) % self.workers.len();
        let guard = self.workers[index].lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&guard)
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_round_robins_across_workers() {
        let pool = InferencePool::new(vec![1u32, 2, 3]);
        let results: Vec<u32> = (0..6).map(|_| pool.with(|v| *v)).collect();
        assert_eq!(results, vec![1, 2, 3, 1, 2, 3]);
    }

    #[test]
    fn test_pool_len() {
        let pool = InferencePool::new(vec![(), (), ()]);
        assert_eq!(pool.len(), 3);
    }
}

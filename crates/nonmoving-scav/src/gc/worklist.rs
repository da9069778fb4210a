//! Shared worklists for scavenging.
//!
//! Workers of one collection pause pop pending segments and large objects
//! from these lists concurrently. The only operations are push-one and
//! pop-one-or-empty; no ordering between items is promised.

use std::sync::atomic::{AtomicUsize, Ordering};

use crossbeam::queue::SegQueue;

/// Lock-free multi-producer multi-consumer worklist.
///
/// Backed by an unbounded [`SegQueue`], so pushes never fail. The queue hands
/// every pushed item to exactly one popper.
#[derive(Debug)]
pub struct Worklist<T> {
    queue: SegQueue<T>,
    /// Total pushes since creation, for diagnostics.
    pushed: AtomicUsize,
}

impl<T> Worklist<T> {
    /// Create an empty worklist.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            queue: SegQueue::new(),
            pushed: AtomicUsize::new(0),
        }
    }

    /// Push one item.
    pub fn push(&self, item: T) {
        self.queue.push(item);
        self.pushed.fetch_add(1, Ordering::Relaxed);
    }

    /// Pop one item, or `None` if the list is empty.
    pub fn pop(&self) -> Option<T> {
        self.queue.pop()
    }

    /// Number of queued items. Only a snapshot under concurrent use.
    #[must_use]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Whether the list is empty. Only a snapshot under concurrent use.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Total number of pushes since creation.
    #[must_use]
    pub fn total_pushed(&self) -> usize {
        self.pushed.load(Ordering::Relaxed)
    }
}

impl<T> Default for Worklist<T> {
    fn default() -> Self {
        Self::new()
    }
}

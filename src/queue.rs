//! Bounded blocking queue between the decoder and the save workers.
//!
//! [`BoundedQueue`] is a fixed-capacity FIFO guarded by one mutex and two
//! condition variables. The single producer blocks in
//! [`push`](BoundedQueue::push) while the queue is full, so no matter how
//! much faster decoding is than saving, at most `capacity` decoded frames are
//! held in memory at once. Consumers block in [`pop`](BoundedQueue::pop)
//! until an item arrives or the producer calls
//! [`mark_finished`](BoundedQueue::mark_finished).
//!
//! # Example
//!
//! ```
//! use std::thread;
//!
//! use framegrab::BoundedQueue;
//!
//! let queue = BoundedQueue::new(2);
//! thread::scope(|scope| {
//!     scope.spawn(|| {
//!         for value in 0..5 {
//!             queue.push(value);
//!         }
//!         queue.mark_finished();
//!     });
//!
//!     let mut received = Vec::new();
//!     while let Some(value) = queue.pop() {
//!         received.push(value);
//!     }
//!     assert_eq!(received, vec![0, 1, 2, 3, 4]);
//! });
//! ```

use std::collections::VecDeque;
use std::fmt::{Debug, Formatter, Result as FmtResult};

use parking_lot::{Condvar, Mutex};

/// Capacity used when none is configured.
pub const DEFAULT_QUEUE_CAPACITY: usize = 32;

struct QueueState<T> {
    items: VecDeque<T>,
    finished: bool,
    peak: usize,
}

/// Fixed-capacity, thread-safe FIFO with an explicit end-of-input signal.
pub struct BoundedQueue<T> {
    state: Mutex<QueueState<T>>,
    not_full: Condvar,
    not_empty: Condvar,
    capacity: usize,
}

impl<T> BoundedQueue<T> {
    /// Create an empty queue holding at most `capacity` items.
    ///
    /// A capacity of zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            state: Mutex::new(QueueState {
                items: VecDeque::with_capacity(capacity),
                finished: false,
                peak: 0,
            }),
            not_full: Condvar::new(),
            not_empty: Condvar::new(),
            capacity,
        }
    }

    /// Append an item, blocking while the queue is full.
    ///
    /// # Panics
    ///
    /// Panics if called after [`mark_finished`](BoundedQueue::mark_finished).
    pub fn push(&self, item: T) {
        let mut state = self.state.lock();
        assert!(!state.finished, "push called on a finished queue");

        while state.items.len() >= self.capacity {
            self.not_full.wait(&mut state);
        }

        state.items.push_back(item);
        state.peak = state.peak.max(state.items.len());
        drop(state);
        self.not_empty.notify_one();
    }

    /// Remove the oldest item.
    ///
    /// Blocks while the queue is empty and not finished. Returns `None` once
    /// the queue is finished and drained; from then on it never blocks.
    pub fn pop(&self) -> Option<T> {
        let mut state = self.state.lock();

        loop {
            if let Some(item) = state.items.pop_front() {
                drop(state);
                self.not_full.notify_one();
                return Some(item);
            }
            if state.finished {
                return None;
            }
            self.not_empty.wait(&mut state);
        }
    }

    /// Signal that no more items will be pushed and wake every waiting
    /// consumer. Calling it again has no effect.
    pub fn mark_finished(&self) {
        let mut state = self.state.lock();
        if state.finished {
            return;
        }
        state.finished = true;
        drop(state);
        self.not_empty.notify_all();
    }

    /// Number of items currently queued.
    pub fn len(&self) -> usize {
        self.state.lock().items.len()
    }

    /// Returns `true` if no items are queued.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum number of items the queue holds at once.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns `true` once [`mark_finished`](BoundedQueue::mark_finished)
    /// has been called.
    pub fn is_finished(&self) -> bool {
        self.state.lock().finished
    }

    /// Highest occupancy observed since the queue was created.
    pub fn peak_len(&self) -> usize {
        self.state.lock().peak
    }
}

impl<T> Default for BoundedQueue<T> {
    fn default() -> Self {
        Self::new(DEFAULT_QUEUE_CAPACITY)
    }
}

impl<T> Debug for BoundedQueue<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let state = self.state.lock();
        f.debug_struct("BoundedQueue")
            .field("capacity", &self.capacity)
            .field("len", &state.items.len())
            .field("peak", &state.peak)
            .field("finished", &state.finished)
            .finish()
    }
}

//! Fixed-capacity ring that overwrites its oldest entry instead of blocking.
//!
//! Producers never wait: once the ring is full every push evicts the oldest
//! entry. Suited to "most recent N samples" views where losing old data is
//! preferable to stalling the acquisition thread.

use crate::error::{HandoffError, HandoffResult};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::trace;

/// Thread-safe overwrite-on-full ring.
#[derive(Debug)]
pub struct OverwriteRing<T> {
    entries: Mutex<VecDeque<T>>,
    capacity: usize,
}

impl<T> OverwriteRing<T> {
    /// Create a ring holding at most `capacity` entries.
    ///
    /// # Errors
    /// `InvalidCapacity` if `capacity` is 0.
    pub fn new(capacity: usize) -> HandoffResult<Arc<Self>> {
        if capacity == 0 {
            return Err(HandoffError::InvalidCapacity(capacity));
        }
        Ok(Arc::new(Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }))
    }

    /// Append `item`, returning the entry it evicted if the ring was full.
    pub fn push(&self, item: T) -> Option<T> {
        let mut entries = self.entries.lock();
        let evicted = if entries.len() == self.capacity {
            entries.pop_front()
        } else {
            None
        };
        if evicted.is_some() {
            trace!(capacity = self.capacity, "overwrote oldest ring entry");
        }
        entries.push_back(item);
        evicted
    }

    /// Remove the oldest entry.
    pub fn try_pop(&self) -> Option<T> {
        self.entries.lock().pop_front()
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    /// Number of entries held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// True when nothing is held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// True once the next push will evict.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.entries.lock().len() == self.capacity
    }

    /// Fixed capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl<T: Clone> OverwriteRing<T> {
    /// Clone of the oldest entry.
    #[must_use]
    pub fn peek(&self) -> Option<T> {
        self.entries.lock().front().cloned()
    }

    /// Clone of the newest entry.
    #[must_use]
    pub fn last(&self) -> Option<T> {
        self.entries.lock().back().cloned()
    }

    /// Snapshot of all entries, oldest first.
    #[must_use]
    pub fn to_vec(&self) -> Vec<T> {
        self.entries.lock().iter().cloned().collect()
    }
}

//! Bounded channel with strict priority classes.
//!
//! Items are queued in one FIFO per priority class (class 0 is served first).
//! `take` always returns the oldest item of the lowest-numbered non-empty class,
//! so an urgent item that arrives late still overtakes every lower-priority item
//! already waiting. Fairness exists only within a class.
//!
//! Each class is bounded separately: a burst of low-priority telemetry can fill
//! its own class without blocking urgent control messages.
//!
//! `take` scans the classes linearly, so its cost grows with the number of
//! classes. Channels are expected to have a handful of classes.
//!
//! # Example
//!
//! ```
//! use daq_handoff::channel::PriorityChannel;
//!
//! let channel = PriorityChannel::new(2, 8).unwrap();
//! channel.put("routine", 1).unwrap();
//! channel.put("urgent", 0).unwrap();
//! assert_eq!(channel.take().unwrap(), "urgent");
//! assert_eq!(channel.take().unwrap(), "routine");
//! ```

use crate::cancel::{wait_while, CancelToken, Wake, WaitOutcome};
use crate::config::ChannelConfig;
use crate::error::{HandoffError, HandoffResult};
use parking_lot::{Condvar, Mutex, MutexGuard};
use std::collections::VecDeque;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use tracing::{trace, warn};

/// Items that carry their own priority class.
pub trait Prioritized {
    /// Class in `[0, num_classes)`, 0 being the most urgent.
    fn priority_class(&self) -> usize;
}

struct ClassQueues<T> {
    queues: Vec<VecDeque<T>>,
    /// Sum of all class lengths.
    ready: usize,
}

impl<T> ClassQueues<T> {
    fn pop_highest(&mut self) -> Option<(usize, T)> {
        let (class, queue) = self
            .queues
            .iter_mut()
            .enumerate()
            .find(|(_, q)| !q.is_empty())?;
        let item = queue.pop_front()?;
        self.ready -= 1;
        Some((class, item))
    }
}

/// Bounded multi-class channel.
pub struct PriorityChannel<T> {
    state: Mutex<ClassQueues<T>>,
    not_empty: Condvar,
    /// One per class.
    not_full: Vec<Condvar>,
    per_class_capacity: usize,
    cancel: CancelToken,
}

impl<T: Send + 'static> PriorityChannel<T> {
    /// Create a channel with `num_classes` classes of `per_class_capacity` items each.
    ///
    /// # Errors
    /// `InvalidCapacity` if either argument is 0.
    pub fn new(num_classes: usize, per_class_capacity: usize) -> HandoffResult<Arc<Self>> {
        Self::new_with_cancel(num_classes, per_class_capacity, &CancelToken::new())
    }

    /// Create a channel whose blocking calls are released by `cancel`.
    pub fn new_with_cancel(
        num_classes: usize,
        per_class_capacity: usize,
        cancel: &CancelToken,
    ) -> HandoffResult<Arc<Self>> {
        if num_classes == 0 {
            return Err(HandoffError::InvalidCapacity(num_classes));
        }
        if per_class_capacity == 0 {
            return Err(HandoffError::InvalidCapacity(per_class_capacity));
        }

        let channel = Arc::new(Self {
            state: Mutex::new(ClassQueues {
                queues: (0..num_classes)
                    .map(|_| VecDeque::with_capacity(per_class_capacity))
                    .collect(),
                ready: 0,
            }),
            not_empty: Condvar::new(),
            not_full: (0..num_classes).map(|_| Condvar::new()).collect(),
            per_class_capacity,
            cancel: cancel.clone(),
        });
        let weak: Weak<dyn Wake> = Arc::downgrade(&channel) as Weak<dyn Wake>;
        cancel.register(weak);
        Ok(channel)
    }

    /// Create a channel from the `[channel]` configuration section.
    pub fn from_config(config: &ChannelConfig) -> HandoffResult<Arc<Self>> {
        Self::new(config.classes, config.per_class_capacity)
    }
}

impl<T> PriorityChannel<T> {
    /// Queue `item` in `class`, blocking while that class is full.
    ///
    /// # Errors
    /// `InvalidPriorityClass` for a class outside `[0, num_classes)`,
    /// `Cancelled` if the token fires while waiting.
    pub fn put(&self, item: T, class: usize) -> HandoffResult<()> {
        self.check_class(class)?;
        let mut state = self.state.lock();
        let cap = self.per_class_capacity;
        wait_while(&self.not_full[class], &mut state, &self.cancel, None, |s| {
            s.queues[class].len() >= cap
        })?;
        self.enqueue(&mut state, item, class);
        Ok(())
    }

    /// Queue `item`, waiting at most `timeout` for room. `Ok(false)` on expiry.
    pub fn put_timeout(&self, item: T, class: usize, timeout: Duration) -> HandoffResult<bool> {
        self.check_class(class)?;
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        let cap = self.per_class_capacity;
        let outcome = wait_while(
            &self.not_full[class],
            &mut state,
            &self.cancel,
            Some(deadline),
            |s| s.queues[class].len() >= cap,
        )?;
        if outcome == WaitOutcome::TimedOut {
            return Ok(false);
        }
        self.enqueue(&mut state, item, class);
        Ok(true)
    }

    /// Oldest item of the most urgent non-empty class, blocking while all are empty.
    pub fn take(&self) -> HandoffResult<T> {
        let mut state = self.state.lock();
        wait_while(&self.not_empty, &mut state, &self.cancel, None, |s| {
            s.ready == 0
        })?;
        self.dequeue(&mut state).ok_or(HandoffError::Cancelled)
    }

    /// As [`take`](Self::take), giving up after `timeout`.
    pub fn poll(&self, timeout: Duration) -> HandoffResult<Option<T>> {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        let outcome = wait_while(
            &self.not_empty,
            &mut state,
            &self.cancel,
            Some(deadline),
            |s| s.ready == 0,
        )?;
        if outcome == WaitOutcome::TimedOut {
            return Ok(None);
        }
        Ok(self.dequeue(&mut state))
    }

    /// Next item if any class is non-empty.
    pub fn try_take(&self) -> Option<T> {
        let mut state = self.state.lock();
        self.dequeue(&mut state)
    }

    /// Drop every queued item without blocking. Returns how many were dropped.
    pub fn clear(&self) -> usize {
        let mut state = self.state.lock();
        let dropped = state.ready;
        for queue in &mut state.queues {
            queue.clear();
        }
        state.ready = 0;
        for cv in &self.not_full {
            cv.notify_all();
        }
        dropped
    }

    /// True when every class is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.lock().ready == 0
    }

    /// Total number of queued items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().ready
    }

    /// Number of items queued in `class` (0 for an unknown class).
    #[must_use]
    pub fn class_len(&self, class: usize) -> usize {
        self.state
            .lock()
            .queues
            .get(class)
            .map_or(0, VecDeque::len)
    }

    /// Number of priority classes.
    #[must_use]
    pub fn num_classes(&self) -> usize {
        self.not_full.len()
    }

    /// Bound applied to every class.
    #[must_use]
    pub fn per_class_capacity(&self) -> usize {
        self.per_class_capacity
    }

    /// Token that releases this channel's blocked callers.
    #[must_use]
    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    fn check_class(&self, class: usize) -> HandoffResult<()> {
        let classes = self.num_classes();
        if class >= classes {
            warn!(class, classes, "rejected item with invalid priority class");
            return Err(HandoffError::InvalidPriorityClass { class, classes });
        }
        Ok(())
    }

    fn enqueue(&self, state: &mut MutexGuard<'_, ClassQueues<T>>, item: T, class: usize) {
        state.queues[class].push_back(item);
        state.ready += 1;
        trace!(class, ready = state.ready, "queued item");
        self.not_empty.notify_one();
    }

    fn dequeue(&self, state: &mut MutexGuard<'_, ClassQueues<T>>) -> Option<T> {
        let (class, item) = state.pop_highest()?;
        self.not_full[class].notify_one();
        Some(item)
    }
}

impl<T: Prioritized> PriorityChannel<T> {
    /// Queue an item in the class it declares.
    pub fn send(&self, item: T) -> HandoffResult<()> {
        let class = item.priority_class();
        self.put(item, class)
    }
}

impl<T: Send> Wake for PriorityChannel<T> {
    fn wake_all(&self) {
        let _state = self.state.lock();
        self.not_empty.notify_all();
        for cv in &self.not_full {
            cv.notify_all();
        }
    }
}

impl<T> std::fmt::Debug for PriorityChannel<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PriorityChannel")
            .field("num_classes", &self.num_classes())
            .field("per_class_capacity", &self.per_class_capacity)
            .field("len", &self.len())
            .finish()
    }
}

//! Double-buffered handoff queue.
//!
//! A producer appends to a private "put" batch. When the batch is full (or on an
//! explicit [`flush`](BufferedQueue::flush)) the whole batch is handed to the
//! consumer in one step through a single transfer slot, and a recycled empty
//! batch takes its place. The consumer drains its own "take" batch without
//! touching any shared lock and only synchronises again when it runs dry.
//!
//! # Buffer roles
//!
//! ```text
//!  producer                    transfer lock                     consumer
//! ┌──────────┐  flush   ┌──────────────────────────┐  adopt  ┌──────────┐
//! │ put batch│ ───────▶ │ slot: Option<batch>      │ ──────▶ │take batch│
//! └──────────┘ ◀─────── │ spare: Option<batch>     │ ◀────── └──────────┘
//!               spare   └──────────────────────────┘ recycle
//! ```
//!
//! At most one batch sits in the transfer slot. Every item lives in exactly one
//! of {put batch, slot, take batch}, so delivery is exactly-once and in `put`
//! order across any number of flush cycles.
//!
//! # Locking
//!
//! `put_side` and `take_side` are each owned by one end; `transfer` mediates the
//! handover. Both ends take their own lock before `transfer`, never the reverse.
//!
//! # Single-threaded use
//!
//! A producer can run at most two batches ahead of the consumer: the second
//! flush waits until the first batch has been adopted.

use crate::cancel::{wait_while, CancelToken, Wake, WaitOutcome};
use crate::config::QueueConfig;
use crate::error::{HandoffError, HandoffResult};
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::mem;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use tracing::trace;

struct Transfer<T> {
    /// Batch published by the producer, not yet adopted.
    slot: Option<Vec<T>>,
    /// Empty batch recycled by the consumer for the producer's next swap.
    spare: Option<Vec<T>>,
}

/// Bounded single-producer/single-consumer handoff queue with batched transfer.
pub struct BufferedQueue<T> {
    put_side: Mutex<Vec<T>>,
    take_side: Mutex<VecDeque<T>>,
    transfer: Mutex<Transfer<T>>,
    /// Signalled when a batch lands in the slot.
    published: Condvar,
    /// Signalled when the slot is emptied.
    consumed: Condvar,
    capacity: usize,
    buffer_capacity: usize,
    cancel: CancelToken,
}

impl<T: Send + 'static> BufferedQueue<T> {
    /// Create a queue holding roughly `capacity` items in flight.
    ///
    /// Each of the two batches holds `ceil(capacity / 2) + 1` items.
    ///
    /// # Errors
    /// `InvalidCapacity` if `capacity` is 0.
    pub fn new(capacity: usize) -> HandoffResult<Arc<Self>> {
        Self::new_with_cancel(capacity, &CancelToken::new())
    }

    /// Create a queue whose blocking calls are released by `cancel`.
    pub fn new_with_cancel(capacity: usize, cancel: &CancelToken) -> HandoffResult<Arc<Self>> {
        if capacity == 0 {
            return Err(HandoffError::InvalidCapacity(capacity));
        }
        let buffer_capacity = capacity.div_ceil(2) + 1;

        let queue = Arc::new(Self {
            put_side: Mutex::new(Vec::with_capacity(buffer_capacity)),
            take_side: Mutex::new(VecDeque::new()),
            transfer: Mutex::new(Transfer {
                slot: None,
                spare: Some(Vec::with_capacity(buffer_capacity)),
            }),
            published: Condvar::new(),
            consumed: Condvar::new(),
            capacity,
            buffer_capacity,
            cancel: cancel.clone(),
        });
        let weak: Weak<dyn Wake> = Arc::downgrade(&queue) as Weak<dyn Wake>;
        cancel.register(weak);
        Ok(queue)
    }

    /// Create a queue from the `[queue]` configuration section.
    pub fn from_config(config: &QueueConfig) -> HandoffResult<Arc<Self>> {
        Self::new(config.capacity)
    }
}

impl<T> BufferedQueue<T> {
    /// Append an item to the current batch, handing the batch over first if it is full.
    ///
    /// # Errors
    /// `Cancelled` if the implicit flush had to wait and the token fired. The item
    /// is not enqueued in that case.
    pub fn put(&self, item: T) -> HandoffResult<()> {
        let mut batch = self.put_side.lock();
        if batch.len() >= self.buffer_capacity {
            self.publish(&mut batch)?;
        }
        batch.push(item);
        Ok(())
    }

    /// Hand the current batch to the consumer, waiting for the transfer slot if needed.
    ///
    /// Does nothing when the batch is empty.
    pub fn flush(&self) -> HandoffResult<()> {
        let mut batch = self.put_side.lock();
        if batch.is_empty() {
            return Ok(());
        }
        self.publish(&mut batch)
    }

    /// Next item in `put` order, blocking until a batch is published.
    pub fn take(&self) -> HandoffResult<T> {
        let mut batch = self.take_side.lock();
        if let Some(item) = batch.pop_front() {
            return Ok(item);
        }
        self.adopt(&mut batch, None)?;
        batch.pop_front().ok_or(HandoffError::Cancelled)
    }

    /// As [`take`](Self::take), giving up after `timeout`.
    pub fn take_timeout(&self, timeout: Duration) -> HandoffResult<Option<T>> {
        let deadline = Instant::now() + timeout;
        let mut batch = self.take_side.lock();
        if let Some(item) = batch.pop_front() {
            return Ok(Some(item));
        }
        if self.adopt(&mut batch, Some(deadline))? == WaitOutcome::TimedOut {
            return Ok(None);
        }
        Ok(batch.pop_front())
    }

    /// Next item if one has already been published.
    pub fn try_take(&self) -> Option<T> {
        let mut batch = self.take_side.lock();
        if let Some(item) = batch.pop_front() {
            return Some(item);
        }
        let mut transfer = self.transfer.lock();
        let published = transfer.slot.take()?;
        self.swap_in(&mut batch, &mut transfer, published);
        drop(transfer);
        batch.pop_front()
    }

    /// Items buffered on the producer side and not yet flushed.
    #[must_use]
    pub fn unflushed(&self) -> usize {
        self.put_side.lock().len()
    }

    /// Requested capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Size of each internal batch.
    #[must_use]
    pub fn buffer_capacity(&self) -> usize {
        self.buffer_capacity
    }

    /// Token that releases this queue's blocked callers.
    #[must_use]
    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    fn publish(&self, batch: &mut Vec<T>) -> HandoffResult<()> {
        let mut transfer = self.transfer.lock();
        wait_while(&self.consumed, &mut transfer, &self.cancel, None, |t| {
            t.slot.is_some()
        })?;

        let buffer_capacity = self.buffer_capacity;
        let empty = transfer
            .spare
            .take()
            .unwrap_or_else(|| Vec::with_capacity(buffer_capacity));
        let full = mem::replace(batch, empty);
        trace!(items = full.len(), "published batch");
        transfer.slot = Some(full);
        self.published.notify_one();
        Ok(())
    }

    fn adopt(
        &self,
        batch: &mut VecDeque<T>,
        deadline: Option<Instant>,
    ) -> HandoffResult<WaitOutcome> {
        let mut transfer = self.transfer.lock();
        let outcome = wait_while(&self.published, &mut transfer, &self.cancel, deadline, |t| {
            t.slot.is_none()
        })?;
        if outcome == WaitOutcome::TimedOut {
            return Ok(outcome);
        }
        if let Some(published) = transfer.slot.take() {
            self.swap_in(batch, &mut transfer, published);
        }
        Ok(WaitOutcome::Ready)
    }

    /// Make `published` the take batch and recycle the exhausted one.
    fn swap_in(&self, batch: &mut VecDeque<T>, transfer: &mut Transfer<T>, published: Vec<T>) {
        let exhausted = mem::replace(batch, VecDeque::from(published));
        let mut recycled = Vec::from(exhausted);
        recycled.clear();
        transfer.spare = Some(recycled);
        trace!(items = batch.len(), "adopted batch");
        self.consumed.notify_one();
    }
}

impl<T: Send> Wake for BufferedQueue<T> {
    fn wake_all(&self) {
        let _transfer = self.transfer.lock();
        self.published.notify_all();
        self.consumed.notify_all();
    }
}

impl<T> std::fmt::Debug for BufferedQueue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferedQueue")
            .field("capacity", &self.capacity)
            .field("buffer_capacity", &self.buffer_capacity)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn internal_batch_size() {
        assert_eq!(BufferedQueue::<u8>::new(1).unwrap().buffer_capacity(), 2);
        assert_eq!(BufferedQueue::<u8>::new(10).unwrap().buffer_capacity(), 6);
        assert_eq!(BufferedQueue::<u8>::new(11).unwrap().buffer_capacity(), 7);
    }

    #[test]
    fn rejects_zero_capacity() {
        assert!(matches!(
            BufferedQueue::<u8>::new(0),
            Err(HandoffError::InvalidCapacity(0))
        ));
    }

    #[test]
    fn flush_makes_partial_batch_visible() {
        let queue = BufferedQueue::new(8).unwrap();
        queue.put(1).unwrap();
        queue.put(2).unwrap();
        assert_eq!(queue.try_take(), None);
        assert_eq!(queue.unflushed(), 2);

        queue.flush().unwrap();
        assert_eq!(queue.unflushed(), 0);
        assert_eq!(queue.take().unwrap(), 1);
        assert_eq!(queue.take().unwrap(), 2);
    }

    #[test]
    fn flush_of_empty_batch_is_noop() {
        let queue = BufferedQueue::<u8>::new(4).unwrap();
        queue.flush().unwrap();
        queue.flush().unwrap();
        assert_eq!(queue.take_timeout(Duration::from_millis(5)).unwrap(), None);
    }

    #[test]
    fn full_batch_is_flushed_implicitly() {
        // capacity 2 -> batches of 2
        let queue = BufferedQueue::new(2).unwrap();
        queue.put('a').unwrap();
        queue.put('b').unwrap();
        queue.put('c').unwrap();
        assert_eq!(queue.take().unwrap(), 'a');
        assert_eq!(queue.take().unwrap(), 'b');
        assert_eq!(queue.try_take(), None);
        queue.flush().unwrap();
        assert_eq!(queue.take().unwrap(), 'c');
    }

    #[test]
    fn take_timeout_expires() {
        let queue = BufferedQueue::<u8>::new(4).unwrap();
        let start = Instant::now();
        assert_eq!(queue.take_timeout(Duration::from_millis(25)).unwrap(), None);
        assert!(start.elapsed() >= Duration::from_millis(25));
    }

    #[test]
    fn concurrent_transfer_preserves_order() {
        const COUNT: u32 = 50_000;
        let queue = BufferedQueue::new(16).unwrap();

        let producer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                for i in 0..COUNT {
                    queue.put(i).unwrap();
                }
                queue.flush().unwrap();
            })
        };

        let mut received = Vec::with_capacity(COUNT as usize);
        for _ in 0..COUNT {
            received.push(queue.take().unwrap());
        }
        producer.join().unwrap();

        assert_eq!(received, (0..COUNT).collect::<Vec<_>>());
        assert_eq!(queue.try_take(), None);
    }

    #[test]
    fn cancel_releases_blocked_take() {
        let token = CancelToken::new();
        let queue = BufferedQueue::<u32>::new_with_cancel(4, &token).unwrap();

        let consumer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.take())
        };
        thread::sleep(Duration::from_millis(20));
        token.cancel();
        assert!(consumer.join().unwrap().unwrap_err().is_cancelled());
    }

    #[test]
    fn cancel_releases_blocked_flush_and_keeps_items() {
        let token = CancelToken::new();
        // batches of 2
        let queue = BufferedQueue::new_with_cancel(2, &token).unwrap();
        queue.put(1).unwrap();
        queue.put(2).unwrap();
        queue.flush().unwrap();
        queue.put(3).unwrap();

        let producer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.flush())
        };
        thread::sleep(Duration::from_millis(20));
        token.cancel();
        assert!(producer.join().unwrap().unwrap_err().is_cancelled());

        token.reset();
        assert_eq!(queue.take().unwrap(), 1);
        assert_eq!(queue.take().unwrap(), 2);
        queue.flush().unwrap();
        assert_eq!(queue.take().unwrap(), 3);
    }
}

//! Blocking FIFO ring buffer that grows and shrinks in fixed-size chunks.
//!
//! # Blocking model
//!
//! One internal lock guards the storage, two condition variables ("not empty",
//! "not full") coordinate producers and consumers. Each operation comes in three
//! flavours built on the same wait loop:
//!
//! | operation | blocks | timed | non-blocking |
//! |-----------|--------|-------|--------------|
//! | insert    | [`push`](GrowableRingBuffer::push) | [`push_timeout`](GrowableRingBuffer::push_timeout) | [`try_push`](GrowableRingBuffer::try_push) |
//! | remove    | [`pop`](GrowableRingBuffer::pop)   | [`pop_timeout`](GrowableRingBuffer::pop_timeout)   | [`try_pop`](GrowableRingBuffer::try_pop)   |
//!
//! An unbounded buffer (`max_size == 0`) never blocks on insert. A bounded one
//! blocks (or refuses) once it holds `max_size` items.
//!
//! # Example
//!
//! ```
//! use daq_handoff::ring::GrowableRingBuffer;
//!
//! let buffer = GrowableRingBuffer::new(4, 0).unwrap();
//! for i in 0..5 {
//!     buffer.push(i).unwrap();
//! }
//! assert_eq!(buffer.capacity(), 8);
//! assert_eq!(buffer.pop().unwrap(), 0);
//! ```

use super::storage::{ChunkedRing, Resize};
use crate::cancel::{wait_while, CancelToken, Wake, WaitOutcome};
use crate::config::RingConfig;
use crate::error::{HandoffError, HandoffResult};
use parking_lot::{Condvar, Mutex, MutexGuard};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use tracing::debug;

/// Thread-safe growable ring buffer.
///
/// Shared between threads through the `Arc` returned by the constructors.
pub struct GrowableRingBuffer<T> {
    ring: Mutex<ChunkedRing<T>>,
    not_empty: Condvar,
    not_full: Condvar,
    /// Maximum number of items, 0 for unbounded.
    max_size: usize,
    cancel: CancelToken,
}

impl<T: Send + 'static> GrowableRingBuffer<T> {
    /// Create a buffer with its own cancel token.
    ///
    /// # Errors
    /// `InvalidChunkSize` if `chunk_size` is 0, `InvalidMaxSize` if the buffer
    /// is bounded below one chunk.
    pub fn new(chunk_size: usize, max_size: usize) -> HandoffResult<Arc<Self>> {
        Self::new_with_cancel(chunk_size, max_size, &CancelToken::new())
    }

    /// Create a buffer whose blocking calls are released by `cancel`.
    pub fn new_with_cancel(
        chunk_size: usize,
        max_size: usize,
        cancel: &CancelToken,
    ) -> HandoffResult<Arc<Self>> {
        if chunk_size < 1 {
            return Err(HandoffError::InvalidChunkSize(chunk_size));
        }
        if max_size != 0 && max_size < chunk_size {
            return Err(HandoffError::InvalidMaxSize {
                max_size,
                chunk_size,
            });
        }

        let buffer = Arc::new(Self {
            ring: Mutex::new(ChunkedRing::new(chunk_size)),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
            max_size,
            cancel: cancel.clone(),
        });
        let weak: Weak<dyn Wake> = Arc::downgrade(&buffer) as Weak<dyn Wake>;
        cancel.register(weak);
        Ok(buffer)
    }

    /// Create a buffer from the `[ring]` configuration section.
    pub fn from_config(config: &RingConfig) -> HandoffResult<Arc<Self>> {
        Self::new(config.chunk_size, config.max_size)
    }
}

impl<T> GrowableRingBuffer<T> {
    /// Append an item, blocking while a bounded buffer is full.
    ///
    /// # Errors
    /// `Cancelled` if the bound token fires while waiting for space.
    pub fn push(&self, item: T) -> HandoffResult<()> {
        let mut ring = self.ring.lock();
        let max = self.max_size;
        wait_while(&self.not_full, &mut ring, &self.cancel, None, |r| {
            is_at_bound(r, max)
        })?;
        self.insert(&mut ring, item);
        Ok(())
    }

    /// Append an item, waiting at most `timeout` for space.
    ///
    /// Returns `Ok(false)` (and drops the item) if the buffer stayed full.
    pub fn push_timeout(&self, item: T, timeout: Duration) -> HandoffResult<bool> {
        let deadline = Instant::now() + timeout;
        let mut ring = self.ring.lock();
        let max = self.max_size;
        let outcome = wait_while(&self.not_full, &mut ring, &self.cancel, Some(deadline), |r| {
            is_at_bound(r, max)
        })?;
        if outcome == WaitOutcome::TimedOut {
            return Ok(false);
        }
        self.insert(&mut ring, item);
        Ok(true)
    }

    /// Append an item without waiting. Gives the item back if the buffer is full.
    pub fn try_push(&self, item: T) -> Result<(), T> {
        let mut ring = self.ring.lock();
        if is_at_bound(&ring, self.max_size) {
            return Err(item);
        }
        self.insert(&mut ring, item);
        Ok(())
    }

    /// Remove the oldest item, blocking while the buffer is empty.
    ///
    /// # Errors
    /// `Cancelled` if the bound token fires while waiting for data.
    pub fn pop(&self) -> HandoffResult<T> {
        let mut ring = self.ring.lock();
        wait_while(&self.not_empty, &mut ring, &self.cancel, None, ChunkedRing::is_empty)?;
        self.remove(&mut ring).ok_or(HandoffError::Cancelled)
    }

    /// Remove the oldest item, waiting at most `timeout`. `Ok(None)` on expiry.
    pub fn pop_timeout(&self, timeout: Duration) -> HandoffResult<Option<T>> {
        let deadline = Instant::now() + timeout;
        let mut ring = self.ring.lock();
        let outcome = wait_while(
            &self.not_empty,
            &mut ring,
            &self.cancel,
            Some(deadline),
            ChunkedRing::is_empty,
        )?;
        if outcome == WaitOutcome::TimedOut {
            return Ok(None);
        }
        Ok(self.remove(&mut ring))
    }

    /// Remove the oldest item if there is one.
    pub fn try_pop(&self) -> Option<T> {
        let mut ring = self.ring.lock();
        self.remove(&mut ring)
    }

    /// Remove everything currently buffered, oldest first.
    pub fn drain(&self) -> Vec<T> {
        let mut ring = self.ring.lock();
        let mut items = Vec::with_capacity(ring.len());
        while let Some(item) = self.remove(&mut ring) {
            items.push(item);
        }
        items
    }

    /// Apply `f` to the oldest item without removing it.
    pub fn peek_with<R>(&self, f: impl FnOnce(&T) -> R) -> Option<R> {
        self.ring.lock().front().map(f)
    }

    /// Apply `f` to the most recently pushed item without removing it.
    pub fn last_with<R>(&self, f: impl FnOnce(&T) -> R) -> Option<R> {
        self.ring.lock().back().map(f)
    }

    /// Number of buffered items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ring.lock().len()
    }

    /// True when nothing is buffered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ring.lock().is_empty()
    }

    /// True when a bounded buffer holds `max_size` items. Always false when unbounded.
    #[must_use]
    pub fn is_full(&self) -> bool {
        is_at_bound(&self.ring.lock(), self.max_size)
    }

    /// Current length of the backing array.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.ring.lock().capacity()
    }

    /// Number of chunks currently allocated.
    #[must_use]
    pub fn chunk_count(&self) -> usize {
        self.ring.lock().chunk_count()
    }

    /// Growth granularity.
    #[must_use]
    pub fn chunk_size(&self) -> usize {
        self.ring.lock().chunk_size()
    }

    /// Item bound, 0 for unbounded.
    #[must_use]
    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Token that releases this buffer's blocked callers.
    #[must_use]
    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    fn insert(&self, ring: &mut MutexGuard<'_, ChunkedRing<T>>, item: T) {
        if let Some(Resize::Grew { from, to }) = ring.push_back(item) {
            debug!(from, to, len = ring.len(), "grew ring buffer");
        }
        self.not_empty.notify_one();
    }

    fn remove(&self, ring: &mut MutexGuard<'_, ChunkedRing<T>>) -> Option<T> {
        let (item, resize) = ring.pop_front()?;
        if let Some(Resize::Shrank { from, to }) = resize {
            debug!(from, to, len = ring.len(), "shrank ring buffer");
        }
        self.not_full.notify_one();
        Some(item)
    }
}

impl<T: Clone> GrowableRingBuffer<T> {
    /// Clone of the oldest item.
    #[must_use]
    pub fn peek(&self) -> Option<T> {
        self.peek_with(T::clone)
    }

    /// Clone of the most recently pushed item.
    #[must_use]
    pub fn last(&self) -> Option<T> {
        self.last_with(T::clone)
    }
}

impl<T: Send> Wake for GrowableRingBuffer<T> {
    fn wake_all(&self) {
        let _ring = self.ring.lock();
        self.not_empty.notify_all();
        self.not_full.notify_all();
    }
}

impl<T> std::fmt::Debug for GrowableRingBuffer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let ring = self.ring.lock();
        f.debug_struct("GrowableRingBuffer")
            .field("len", &ring.len())
            .field("capacity", &ring.capacity())
            .field("chunk_size", &ring.chunk_size())
            .field("max_size", &self.max_size)
            .finish()
    }
}

fn is_at_bound<T>(ring: &ChunkedRing<T>, max_size: usize) -> bool {
    max_size != 0 && ring.len() >= max_size
}

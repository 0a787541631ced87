//! Unbounded ring of `i64` values for numeric sequences.
//!
//! Single-owner and unsynchronised: the sequence-number trackers that use it
//! live on one thread. Growth and shrink follow the same chunk and hysteresis
//! rules as [`GrowableRingBuffer`](super::GrowableRingBuffer).

use super::storage::ChunkedRing;
use crate::error::{HandoffError, HandoffResult};

/// Growable FIFO of integers.
#[derive(Debug)]
pub struct IntRingBuffer {
    ring: ChunkedRing<i64>,
}

impl IntRingBuffer {
    /// Create an empty ring growing by `chunk_size` slots at a time.
    ///
    /// # Errors
    /// `InvalidChunkSize` if `chunk_size` is 0.
    pub fn new(chunk_size: usize) -> HandoffResult<Self> {
        if chunk_size < 1 {
            return Err(HandoffError::InvalidChunkSize(chunk_size));
        }
        Ok(Self {
            ring: ChunkedRing::new(chunk_size),
        })
    }

    /// Append a value.
    pub fn push(&mut self, value: i64) {
        self.ring.push_back(value);
    }

    /// Remove the oldest value.
    pub fn pop(&mut self) -> Option<i64> {
        self.ring.pop_front().map(|(value, _)| value)
    }

    /// Oldest value.
    #[must_use]
    pub fn peek(&self) -> Option<i64> {
        self.ring.front().copied()
    }

    /// Newest value.
    #[must_use]
    pub fn last(&self) -> Option<i64> {
        self.ring.back().copied()
    }

    /// Values oldest first.
    pub fn iter(&self) -> impl Iterator<Item = i64> + '_ {
        self.ring.iter().copied()
    }

    /// Whether `value` is currently buffered.
    #[must_use]
    pub fn contains(&self, value: i64) -> bool {
        self.iter().any(|v| v == value)
    }

    /// Sum of the buffered values, `None` if it does not fit in an `i64`.
    #[must_use]
    pub fn sum(&self) -> Option<i64> {
        self.iter().try_fold(0i64, i64::checked_add)
    }

    /// Number of buffered values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    /// True when nothing is buffered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    /// Current backing array length.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.ring.capacity()
    }
}

impl Extend<i64> for IntRingBuffer {
    fn extend<I: IntoIterator<Item = i64>>(&mut self, iter: I) {
        for value in iter {
            self.push(value);
        }
    }
}

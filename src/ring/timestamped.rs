//! Growable ring buffer that pairs every record with its insertion time.
//!
//! Used for archive buffering: the consumer writing records out needs to know
//! when each one entered the pipeline, not when it got around to writing it.

use super::growable::GrowableRingBuffer;
use crate::cancel::CancelToken;
use crate::config::RingConfig;
use crate::error::HandoffResult;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;

/// A record together with its insertion timestamp (Unix epoch, milliseconds).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stamped<T> {
    /// The buffered record.
    pub item: T,
    /// Milliseconds since the Unix epoch at insertion.
    pub timestamp_ms: i64,
}

/// [`GrowableRingBuffer`] of [`Stamped`] records.
///
/// Same chunking, bounds and blocking behaviour as the plain buffer.
pub struct TimestampedRingBuffer<T> {
    inner: Arc<GrowableRingBuffer<Stamped<T>>>,
}

impl<T> Clone for TimestampedRingBuffer<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Send + 'static> TimestampedRingBuffer<T> {
    /// Create a buffer; see [`GrowableRingBuffer::new`] for the argument rules.
    pub fn new(chunk_size: usize, max_size: usize) -> HandoffResult<Self> {
        Ok(Self {
            inner: GrowableRingBuffer::new(chunk_size, max_size)?,
        })
    }

    /// Create a buffer bound to an existing cancel token.
    pub fn new_with_cancel(
        chunk_size: usize,
        max_size: usize,
        cancel: &CancelToken,
    ) -> HandoffResult<Self> {
        Ok(Self {
            inner: GrowableRingBuffer::new_with_cancel(chunk_size, max_size, cancel)?,
        })
    }

    /// Create a buffer from the `[ring]` configuration section.
    pub fn from_config(config: &RingConfig) -> HandoffResult<Self> {
        Self::new(config.chunk_size, config.max_size)
    }
}

impl<T> TimestampedRingBuffer<T> {
    /// Append `item` stamped with the current wall-clock time.
    pub fn push(&self, item: T) -> HandoffResult<()> {
        self.push_at(item, Utc::now().timestamp_millis())
    }

    /// Append `item` with an explicit timestamp.
    pub fn push_at(&self, item: T, timestamp_ms: i64) -> HandoffResult<()> {
        self.inner.push(Stamped { item, timestamp_ms })
    }

    /// Timed insert, `Ok(false)` if the buffer stayed full.
    pub fn push_timeout(&self, item: T, timeout: Duration) -> HandoffResult<bool> {
        let stamped = Stamped {
            item,
            timestamp_ms: Utc::now().timestamp_millis(),
        };
        self.inner.push_timeout(stamped, timeout)
    }

    /// Blocking removal of the oldest record.
    pub fn pop(&self) -> HandoffResult<Stamped<T>> {
        self.inner.pop()
    }

    /// Timed removal, `Ok(None)` on expiry.
    pub fn pop_timeout(&self, timeout: Duration) -> HandoffResult<Option<Stamped<T>>> {
        self.inner.pop_timeout(timeout)
    }

    /// Non-blocking removal.
    pub fn try_pop(&self) -> Option<Stamped<T>> {
        self.inner.try_pop()
    }

    /// Insertion time of the oldest buffered record.
    #[must_use]
    pub fn oldest_timestamp(&self) -> Option<i64> {
        self.inner.peek_with(|s| s.timestamp_ms)
    }

    /// Insertion time of the newest buffered record.
    #[must_use]
    pub fn newest_timestamp(&self) -> Option<i64> {
        self.inner.last_with(|s| s.timestamp_ms)
    }

    /// Time span covered by the buffered records, in milliseconds.
    #[must_use]
    pub fn span_ms(&self) -> Option<i64> {
        Some(self.newest_timestamp()? - self.oldest_timestamp()?)
    }

    /// Number of buffered records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// True when nothing is buffered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// True when a bounded buffer is at its limit.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.inner.is_full()
    }

    /// Current backing array length.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.inner.capacity()
    }
}

impl<T: Clone> TimestampedRingBuffer<T> {
    /// Clone of the oldest record and its stamp.
    #[must_use]
    pub fn peek(&self) -> Option<Stamped<T>> {
        self.inner.peek()
    }

    /// Clone of the newest record and its stamp.
    #[must_use]
    pub fn last(&self) -> Option<Stamped<T>> {
        self.inner.last()
    }
}

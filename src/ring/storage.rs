//! Chunked circular storage shared by the growable ring buffers.
//!
//! The backing array is always a whole number of chunks long. Growth adds one
//! chunk when an insert would overflow the array, shrinking drops one chunk only
//! after occupancy falls [`SHRINK_HYSTERESIS_CHUNKS`] chunks below the current
//! size. That margin keeps a fill level oscillating around a chunk boundary from
//! reallocating on every push/pop pair.

/// Minimum number of chunks a buffer keeps allocated.
pub const MIN_CHUNK_NO: usize = 1;

/// Chunks of free space required below the current capacity before shrinking.
pub const SHRINK_HYSTERESIS_CHUNKS: usize = 2;

/// Capacity change performed by a push or pop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Resize {
    Grew { from: usize, to: usize },
    Shrank { from: usize, to: usize },
}

/// Unsynchronised circular buffer over `chunk_count * chunk_size` slots.
#[derive(Debug)]
pub(crate) struct ChunkedRing<T> {
    slots: Box<[Option<T>]>,
    head: usize,
    len: usize,
    chunk_size: usize,
    chunk_count: usize,
}

impl<T> ChunkedRing<T> {
    /// `chunk_size` must already be validated as non-zero.
    pub(crate) fn new(chunk_size: usize) -> Self {
        debug_assert!(chunk_size >= 1);
        Self {
            slots: empty_slots(chunk_size),
            head: 0,
            len: 0,
            chunk_size,
            chunk_count: MIN_CHUNK_NO,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub(crate) fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub(crate) fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub(crate) fn chunk_count(&self) -> usize {
        self.chunk_count
    }

    /// Append at the logical end, growing by one chunk first if the array is full.
    pub(crate) fn push_back(&mut self, item: T) -> Option<Resize> {
        let resize = if self.len + 1 > self.slots.len() {
            let from = self.slots.len();
            self.relocate(self.chunk_count + 1);
            Some(Resize::Grew {
                from,
                to: self.slots.len(),
            })
        } else {
            None
        };

        let tail = self.physical(self.len);
        self.slots[tail] = Some(item);
        self.len += 1;
        resize
    }

    /// Remove the logical first element, shrinking afterwards when the
    /// hysteresis margin allows it.
    pub(crate) fn pop_front(&mut self) -> Option<(T, Option<Resize>)> {
        if self.len == 0 {
            return None;
        }
        let item = self.slots[self.head].take()?;
        self.head = (self.head + 1) % self.slots.len();
        self.len -= 1;
        if self.len == 0 {
            self.head = 0;
        }

        let shrink_below = self
            .chunk_count
            .saturating_sub(SHRINK_HYSTERESIS_CHUNKS)
            * self.chunk_size;
        let resize = if self.chunk_count > MIN_CHUNK_NO && self.len < shrink_below {
            let from = self.slots.len();
            self.relocate(self.chunk_count - 1);
            Some(Resize::Shrank {
                from,
                to: self.slots.len(),
            })
        } else {
            None
        };

        Some((item, resize))
    }

    pub(crate) fn front(&self) -> Option<&T> {
        if self.len == 0 {
            return None;
        }
        self.slots[self.head].as_ref()
    }

    pub(crate) fn back(&self) -> Option<&T> {
        if self.len == 0 {
            return None;
        }
        self.slots[self.physical(self.len - 1)].as_ref()
    }

    /// Iterate in logical (FIFO) order.
    pub(crate) fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        (0..self.len).filter_map(move |i| self.slots[self.physical(i)].as_ref())
    }

    fn physical(&self, logical: usize) -> usize {
        (self.head + logical) % self.slots.len()
    }

    /// Replace the backing array with one of `chunks` chunks, copying the
    /// logical contents (unwrapped) to the front of the new array.
    fn relocate(&mut self, chunks: usize) {
        let mut next = empty_slots(chunks * self.chunk_size);
        for (i, slot) in next.iter_mut().enumerate().take(self.len) {
            let idx = (self.head + i) % self.slots.len();
            *slot = self.slots[idx].take();
        }
        self.slots = next;
        self.head = 0;
        self.chunk_count = chunks;
    }
}

fn empty_slots<T>(len: usize) -> Box<[Option<T>]> {
    std::iter::repeat_with(|| None).take(len).collect()
}

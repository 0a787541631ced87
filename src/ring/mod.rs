//! Ring buffer family.
//!
//! - [`GrowableRingBuffer`]: blocking FIFO that grows/shrinks in chunks, optionally bounded.
//! - [`TimestampedRingBuffer`]: the same, pairing each record with its insertion time.
//! - [`OverwriteRing`]: fixed capacity, overwrites the oldest entry, never blocks.
//! - [`IntRingBuffer`]: single-owner unbounded ring of integers.
//!
//! The growable variants share one chunked storage core; see [`MIN_CHUNK_NO`] and
//! [`SHRINK_HYSTERESIS_CHUNKS`] for the sizing rules.

mod growable;
mod int_ring;
mod overwrite;
mod storage;
mod timestamped;

pub use growable::GrowableRingBuffer;
pub use int_ring::IntRingBuffer;
pub use overwrite::OverwriteRing;
pub use storage::{MIN_CHUNK_NO, SHRINK_HYSTERESIS_CHUNKS};
pub use timestamped::{Stamped, TimestampedRingBuffer};

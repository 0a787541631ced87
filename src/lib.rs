//! # DAQ Handoff Library
//!
//! Thread-safe message-handoff primitives for moving data between the threads of
//! an acquisition pipeline: instrument readers, processors, archivers and
//! document parsers. Every structure owns its synchronisation, can be shared
//! behind an `Arc`, and releases blocked callers through a [`CancelToken`].
//!
//! ## Crate Structure
//!
//! - **`ring`**: chunk-growable FIFO buffers. [`GrowableRingBuffer`] blocks on empty
//!   (and on full when bounded), [`TimestampedRingBuffer`] stamps records on entry,
//!   [`OverwriteRing`] drops the oldest entry instead of blocking and
//!   [`IntRingBuffer`] is a single-owner integer ring.
//! - **`queue`**: [`BufferedQueue`], a double-buffered producer/consumer queue that
//!   hands items over in batches.
//! - **`channel`**: [`PriorityChannel`], one bounded FIFO per priority class with a
//!   single blocking `take` that always serves the most urgent class first.
//! - **`bridge`**: [`PushPullBridge`] runs a push-style producer (such as
//!   [`XmlSource`]) on its own thread and exposes a pull-style [`PullHandle`].
//! - **`cancel`**: the [`CancelToken`] that interrupts blocking waits.
//! - **`config`**: figment-based defaults for all of the above.
//! - **`error`**: the crate-wide [`HandoffError`].
//! - **`tracing_setup`**: optional subscriber installation for binaries and tests.
//!
//! ## Example
//!
//! ```
//! use daq_handoff::{BufferedQueue, HandoffResult};
//! use std::thread;
//!
//! # fn main() -> HandoffResult<()> {
//! let queue = BufferedQueue::new(64)?;
//! let producer = {
//!     let queue = queue.clone();
//!     thread::spawn(move || -> HandoffResult<()> {
//!         for i in 0..1_000u32 {
//!             queue.put(i)?;
//!         }
//!         queue.flush()
//!     })
//! };
//!
//! for expected in 0..1_000u32 {
//!     assert_eq!(queue.take()?, expected);
//! }
//! producer.join().unwrap()?;
//! # Ok(())
//! # }
//! ```

pub mod bridge;
pub mod cancel;
pub mod channel;
pub mod config;
pub mod error;
pub mod queue;
pub mod ring;
pub mod tracing_setup;

pub use bridge::{
    Event, EventKind, EventSink, PullHandle, PushPullBridge, PushSource, XmlSource,
};
pub use cancel::CancelToken;
pub use channel::{Prioritized, PriorityChannel};
pub use config::HandoffConfig;
pub use error::{HandoffError, HandoffResult};
pub use queue::BufferedQueue;
pub use ring::{GrowableRingBuffer, IntRingBuffer, OverwriteRing, TimestampedRingBuffer};

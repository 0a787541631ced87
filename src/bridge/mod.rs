//! Push-to-pull bridge.
//!
//! Some producers only know how to *push*: a parser that walks a whole document
//! and calls back for every element, or a driver loop that emits readings as they
//! arrive. Consumers written as recursive-descent readers want to *pull* instead.
//! The bridge runs the producer on its own thread and exposes a [`PullHandle`]
//! cursor on the caller's side:
//!
//! ```text
//!  producer thread                                   caller
//! ┌─────────────┐  EventSink   ┌───────────────┐  next/expect_*  ┌────────────┐
//! │ PushSource  │ ───────────▶ │ BufferedQueue │ ──────────────▶ │ PullHandle │
//! └─────────────┘              └───────────────┘                 └────────────┘
//! ```
//!
//! The event stream always ends with [`Event::EndOfInput`]. A producer that fails
//! or panics still gets a sentinel, and the failure surfaces as
//! [`ProducerFailed`](crate::error::HandoffError::ProducerFailed) when the
//! consumer reaches it.

mod event;
mod pull;
mod source;
mod xml;

pub use event::{Attribute, Event, EventKind};
pub use pull::{BridgeState, BridgeStopper, PullHandle, PushPullBridge};
pub use source::{EventSink, PushSource};
pub use xml::XmlSource;

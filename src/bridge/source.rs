//! Push side of the bridge: the callback surface a producer drives.

use super::event::{Attribute, Event};
use crate::cancel::CancelToken;
use crate::error::HandoffResult;
use crate::queue::BufferedQueue;
use std::sync::Arc;
use tracing::trace;

/// Receiver of pushed events.
///
/// Every callback returns `Err(Cancelled)` once the bridge has been stopped. A
/// producer should propagate that error with `?` so it unwinds promptly.
pub trait EventSink {
    /// An element opened.
    fn start_element(&mut self, name: &str, attributes: Vec<Attribute>) -> HandoffResult<()>;
    /// An element closed.
    fn end_element(&mut self, name: &str) -> HandoffResult<()>;
    /// Significant text.
    fn characters(&mut self, text: &str) -> HandoffResult<()>;
    /// Whitespace-only text between elements.
    fn ignorable_whitespace(&mut self, text: &str) -> HandoffResult<()>;
    /// The input is complete. Later events are discarded.
    fn end_of_input(&mut self) -> HandoffResult<()>;
    /// Make everything pushed so far visible to the consumer.
    fn flush(&mut self) -> HandoffResult<()>;
    /// Whether the bridge has been stopped.
    fn is_cancelled(&self) -> bool;
}

/// A producer that pushes its whole input into a sink on the bridge thread.
///
/// Closures of the form `|sink: &mut dyn EventSink| -> anyhow::Result<()>` are
/// sources too, which is handy for generated or hand-built event streams.
pub trait PushSource: Send + 'static {
    /// Drive the sink to completion.
    ///
    /// Returning an error (or panicking) records a producer failure that the
    /// consumer sees after draining what was already pushed.
    fn drive(self, sink: &mut dyn EventSink) -> anyhow::Result<()>;
}

impl<F> PushSource for F
where
    F: FnOnce(&mut dyn EventSink) -> anyhow::Result<()> + Send + 'static,
{
    fn drive(self, sink: &mut dyn EventSink) -> anyhow::Result<()> {
        self(sink)
    }
}

/// Sink that feeds the bridge's handoff queue.
///
/// The end-of-input sentinel is not enqueued here. The bridge thread posts it
/// after the source returns so a failure is always recorded before the consumer
/// can reach the end.
pub(crate) struct QueueSink {
    queue: Arc<BufferedQueue<Event>>,
    cancel: CancelToken,
    ended: bool,
    posted: usize,
}

impl QueueSink {
    pub(crate) fn new(queue: Arc<BufferedQueue<Event>>, cancel: CancelToken) -> Self {
        Self {
            queue,
            cancel,
            ended: false,
            posted: 0,
        }
    }

    /// Events enqueued so far.
    pub(crate) fn posted(&self) -> usize {
        self.posted
    }

    fn post(&mut self, event: Event) -> HandoffResult<()> {
        self.cancel.check()?;
        if self.ended {
            trace!(%event, "dropping event pushed after end of input");
            return Ok(());
        }
        self.queue.put(event)?;
        self.posted += 1;
        Ok(())
    }
}

impl EventSink for QueueSink {
    fn start_element(&mut self, name: &str, attributes: Vec<Attribute>) -> HandoffResult<()> {
        self.post(Event::StartElement {
            name: name.to_owned(),
            attributes,
        })
    }

    fn end_element(&mut self, name: &str) -> HandoffResult<()> {
        self.post(Event::end(name))
    }

    fn characters(&mut self, text: &str) -> HandoffResult<()> {
        self.post(Event::Characters(text.to_owned()))
    }

    fn ignorable_whitespace(&mut self, text: &str) -> HandoffResult<()> {
        self.post(Event::IgnorableWhitespace(text.to_owned()))
    }

    fn end_of_input(&mut self) -> HandoffResult<()> {
        self.cancel.check()?;
        self.ended = true;
        Ok(())
    }

    fn flush(&mut self) -> HandoffResult<()> {
        self.cancel.check()?;
        self.queue.flush()
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

//! Bridge thread plus the pull-side cursor.

use super::event::{Event, EventKind};
use super::source::{PushSource, QueueSink};
use crate::cancel::CancelToken;
use crate::config::BridgeConfig;
use crate::error::{HandoffError, HandoffResult};
use crate::queue::BufferedQueue;
use parking_lot::Mutex;
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, debug_span, error, warn};

/// Lifecycle of a bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeState {
    /// The producer thread is still pushing.
    Running,
    /// The producer returned, cleanly or with a recorded failure.
    Finished,
    /// The bridge was stopped before the producer finished.
    Cancelled,
}

/// State shared between the producer thread and the handle.
struct Shared {
    state: Mutex<BridgeState>,
    failure: Mutex<Option<String>>,
}

impl Shared {
    fn new() -> Self {
        Self {
            state: Mutex::new(BridgeState::Running),
            failure: Mutex::new(None),
        }
    }

    /// Move out of `Running`. Later transitions are ignored.
    fn settle(&self, next: BridgeState) {
        let mut state = self.state.lock();
        if *state == BridgeState::Running {
            *state = next;
        }
    }

    fn state(&self) -> BridgeState {
        *self.state.lock()
    }

    fn failure(&self) -> Option<String> {
        self.failure.lock().clone()
    }
}

/// Entry point that turns a push-style producer into a pull-style cursor.
///
/// The producer runs on its own named thread and hands events over through a
/// [`BufferedQueue`], so the consumer pays one lock round-trip per batch rather
/// than per event.
///
/// # Example
/// ```
/// use daq_handoff::bridge::{PushPullBridge, XmlSource};
///
/// # fn main() -> Result<(), daq_handoff::error::HandoffError> {
/// let mut pull = PushPullBridge::start(XmlSource::new("<cfg><rate>10</rate></cfg>"))?;
/// pull.expect_start("cfg")?;
/// assert_eq!(pull.element_text("rate")?, "10");
/// pull.expect_end("cfg")?;
/// # Ok(())
/// # }
/// ```
pub struct PushPullBridge;

impl PushPullBridge {
    /// Start `source` with the default bridge configuration.
    pub fn start<S: PushSource>(source: S) -> HandoffResult<PullHandle> {
        Self::start_with_config(source, &BridgeConfig::default())
    }

    /// Start `source` on a new thread.
    ///
    /// # Errors
    /// `InvalidCapacity` for a zero queue capacity, `Spawn` if the thread could
    /// not be created.
    pub fn start_with_config<S: PushSource>(
        source: S,
        config: &BridgeConfig,
    ) -> HandoffResult<PullHandle> {
        let cancel = CancelToken::new();
        let queue = BufferedQueue::new_with_cancel(config.queue_capacity, &cancel)?;
        let shared = Arc::new(Shared::new());

        let worker = {
            let queue = Arc::clone(&queue);
            let shared = Arc::clone(&shared);
            let cancel = cancel.clone();
            thread::Builder::new()
                .name(config.thread_name.clone())
                .spawn(move || produce(source, queue, &shared, cancel))?
        };
        debug!(
            thread = %config.thread_name,
            queue_capacity = config.queue_capacity,
            "started push bridge"
        );

        Ok(PullHandle {
            queue,
            shared,
            cancel,
            worker: Some(worker),
            lookahead: None,
            last_start: None,
            exhausted: false,
            failure_reported: false,
        })
    }
}

/// Body of the producer thread.
fn produce<S: PushSource>(
    source: S,
    queue: Arc<BufferedQueue<Event>>,
    shared: &Shared,
    cancel: CancelToken,
) {
    let span = debug_span!("push_bridge");
    let _enter = span.enter();

    let mut sink = QueueSink::new(Arc::clone(&queue), cancel.clone());
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| source.drive(&mut sink)));
    let failure = match outcome {
        Ok(Ok(())) => None,
        Ok(Err(err)) => Some(format!("{err:#}")),
        Err(payload) => Some(panic_message(payload.as_ref())),
    };

    if cancel.is_cancelled() {
        shared.settle(BridgeState::Cancelled);
        debug!(events = sink.posted(), "push bridge cancelled");
        return;
    }

    if let Some(message) = &failure {
        error!(error = %message, events = sink.posted(), "event producer failed");
        *shared.failure.lock() = Some(message.clone());
    }

    // Finished means the producer returned; the sentinel follows.
    shared.settle(BridgeState::Finished);
    match queue.put(Event::EndOfInput).and_then(|()| queue.flush()) {
        Ok(()) => debug!(
            events = sink.posted(),
            failed = failure.is_some(),
            "push bridge finished"
        ),
        Err(_) => debug!("push bridge cancelled while posting end of input"),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        format!("producer panicked: {msg}")
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        format!("producer panicked: {msg}")
    } else {
        "producer panicked".to_string()
    }
}

/// Stops a bridge from another thread.
#[derive(Clone)]
pub struct BridgeStopper {
    cancel: CancelToken,
    shared: Arc<Shared>,
}

impl BridgeStopper {
    /// Cancel the bridge. A consumer blocked in the handle returns `Cancelled`.
    pub fn stop(&self) {
        self.shared.settle(BridgeState::Cancelled);
        self.cancel.cancel();
    }

    /// Current bridge state.
    pub fn state(&self) -> BridgeState {
        self.shared.state()
    }
}

impl fmt::Debug for BridgeStopper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BridgeStopper")
            .field("state", &self.shared.state())
            .finish()
    }
}

/// Pull-side cursor over the events of a running bridge.
///
/// Holds at most one event of look-ahead. Grammar helpers such as
/// [`expect_start`](Self::expect_start) leave the event in place when they fail,
/// so the caller can inspect it or try another branch.
///
/// Dropping the handle stops the bridge. The producer thread is joined if it
/// has already returned; otherwise it is detached and exits at its next sink
/// call.
pub struct PullHandle {
    queue: Arc<BufferedQueue<Event>>,
    shared: Arc<Shared>,
    cancel: CancelToken,
    worker: Option<JoinHandle<()>>,
    lookahead: Option<Event>,
    last_start: Option<String>,
    exhausted: bool,
    failure_reported: bool,
}

impl PullHandle {
    /// Kind of the next event, without consuming it.
    pub fn peek_kind(&mut self) -> HandoffResult<EventKind> {
        Ok(self.fill()?.kind())
    }

    /// The next event, without consuming it.
    pub fn peek(&mut self) -> HandoffResult<&Event> {
        self.fill()
    }

    /// Consume the next event.
    ///
    /// After the end-of-input sentinel every call returns `EndOfInput` again.
    ///
    /// # Errors
    /// `Cancelled` once the bridge is stopped. `ProducerFailed` when the
    /// sentinel is reached and the producer failed. The failure is reported
    /// once; the call after it returns `EndOfInput`.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> HandoffResult<Event> {
        let event = self.pull()?;
        match &event {
            Event::StartElement { name, .. } => self.last_start = Some(name.clone()),
            Event::EndOfInput => {
                self.exhausted = true;
                if let Some(message) = self.unreported_failure() {
                    return Err(HandoffError::ProducerFailed(message));
                }
            }
            _ => {}
        }
        Ok(event)
    }

    /// Consume events until one that is not ignorable whitespace.
    pub fn next_significant(&mut self) -> HandoffResult<Event> {
        loop {
            let event = self.next()?;
            if event.kind() != EventKind::IgnorableWhitespace {
                return Ok(event);
            }
        }
    }

    /// Discard ignorable whitespace in front of the cursor.
    pub fn skip_whitespace(&mut self) -> HandoffResult<()> {
        while self.peek_kind()? == EventKind::IgnorableWhitespace {
            self.next()?;
        }
        Ok(())
    }

    /// Consume the start of element `tag`, skipping whitespace first.
    ///
    /// # Errors
    /// `StructuralMismatch` if the next significant event is anything else. The
    /// event is not consumed.
    pub fn expect_start(&mut self, tag: &str) -> HandoffResult<Event> {
        self.skip_whitespace()?;
        if self.fill()?.is_start(tag) {
            return self.next();
        }
        Err(self.mismatch(EventKind::StartElement, tag))
    }

    /// Consume the end of element `tag`, skipping whitespace first.
    pub fn expect_end(&mut self, tag: &str) -> HandoffResult<Event> {
        self.skip_whitespace()?;
        if self.fill()?.is_end(tag) {
            return self.next();
        }
        Err(self.mismatch(EventKind::EndElement, tag))
    }

    /// Whether the next significant event starts element `tag`. Consumes only whitespace.
    pub fn match_start(&mut self, tag: &str) -> HandoffResult<bool> {
        self.skip_whitespace()?;
        Ok(self.fill()?.is_start(tag))
    }

    /// Whether the next significant event ends element `tag`. Consumes only whitespace.
    pub fn match_end(&mut self, tag: &str) -> HandoffResult<bool> {
        self.skip_whitespace()?;
        Ok(self.fill()?.is_end(tag))
    }

    /// Concatenate the text events in front of the cursor.
    ///
    /// Stops at the first structural event, which is left unconsumed.
    pub fn read_text(&mut self) -> HandoffResult<String> {
        let mut text = String::new();
        while let Some(chunk) = self.fill()?.content() {
            text.push_str(chunk);
            self.next()?;
        }
        Ok(text)
    }

    /// Read `<tag>text</tag>` and return the text.
    pub fn element_text(&mut self, tag: &str) -> HandoffResult<String> {
        self.expect_start(tag)?;
        let text = self.read_text()?;
        self.expect_end(tag)?;
        Ok(text)
    }

    /// Stop the bridge without waiting for a busy producer.
    ///
    /// A producer blocked on the queue is released at once. One busy outside
    /// the sink keeps running until its next sink call, which fails with
    /// `Cancelled`; its thread is detached rather than joined.
    ///
    /// Idempotent. Every later pull call returns `Cancelled`.
    pub fn stop(&mut self) {
        self.shared.settle(BridgeState::Cancelled);
        self.cancel.cancel();
        let Some(worker) = self.worker.take() else {
            return;
        };
        if !worker.is_finished() {
            debug!("detaching push bridge thread still inside the producer");
            return;
        }
        if worker.join().is_err() {
            warn!("push bridge thread panicked outside the producer");
        }
    }

    /// Handle for stopping the bridge from another thread.
    pub fn stopper(&self) -> BridgeStopper {
        BridgeStopper {
            cancel: self.cancel.clone(),
            shared: Arc::clone(&self.shared),
        }
    }

    /// Current bridge state.
    pub fn state(&self) -> BridgeState {
        self.shared.state()
    }

    /// Failure recorded by the producer, if any.
    pub fn failure(&self) -> Option<String> {
        self.shared.failure()
    }

    fn pull(&mut self) -> HandoffResult<Event> {
        self.cancel.check()?;
        if let Some(event) = self.lookahead.take() {
            return Ok(event);
        }
        if self.exhausted {
            return Ok(Event::EndOfInput);
        }
        self.queue.take()
    }

    fn fill(&mut self) -> HandoffResult<&Event> {
        let event = self.pull()?;
        Ok(self.lookahead.insert(event))
    }

    /// The producer failure, the first time it is asked for.
    fn unreported_failure(&mut self) -> Option<String> {
        if self.failure_reported {
            return None;
        }
        let message = self.shared.failure()?;
        self.failure_reported = true;
        Some(message)
    }

    fn mismatch(&mut self, expected_kind: EventKind, expected: &str) -> HandoffError {
        let found = self.lookahead.clone().unwrap_or(Event::EndOfInput);
        if found == Event::EndOfInput {
            if let Some(message) = self.unreported_failure() {
                return HandoffError::ProducerFailed(message);
            }
        }
        let near = match &self.last_start {
            Some(name) => format!("<{name}>"),
            None => "start of input".to_string(),
        };
        HandoffError::StructuralMismatch {
            expected_kind,
            expected: expected.to_string(),
            found,
            near,
        }
    }
}

impl Drop for PullHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

impl fmt::Debug for PullHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PullHandle")
            .field("state", &self.shared.state())
            .field("lookahead", &self.lookahead)
            .field("last_start", &self.last_start)
            .finish()
    }
}

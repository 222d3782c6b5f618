//! Deterministic doubles for transport, time and observability.
//!
//! Compiled for this crate's tests and, through the `testing` feature, for
//! downstream crates' tests.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::{Duration, Instant};

use crate::clock::Clock;
use crate::events::{Event, Observer};
use crate::gateway::HttpGateway;
use crate::transport::{Request, Response, Transport, TransportError};

type Handler = Box<dyn FnMut(&Request) -> Result<Response, TransportError>>;

/// Transport answering from a closure and recording every request
pub struct MockTransport {
    handler: RefCell<Handler>,
    requests: RefCell<Vec<Request>>,
}

impl MockTransport {
    pub fn new(
        handler: impl FnMut(&Request) -> Result<Response, TransportError> + 'static,
    ) -> Self {
        Self {
            handler: RefCell::new(Box::new(handler)),
            requests: RefCell::new(Vec::new()),
        }
    }

    /// Answers requests in order; panics once the script runs out.
    pub fn scripted(responses: impl IntoIterator<Item = Result<Response, TransportError>>) -> Self {
        let mut queue: VecDeque<_> = responses.into_iter().collect();
        Self::new(move |req| {
            queue
                .pop_front()
                .unwrap_or_else(|| panic!("unexpected request: {}", req.endpoint()))
        })
    }

    pub fn requests(&self) -> Vec<Request> {
        self.requests.borrow().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.borrow().len()
    }
}

impl Transport for MockTransport {
    fn execute(&self, request: &Request) -> Result<Response, TransportError> {
        self.requests.borrow_mut().push(request.clone());
        (self.handler.borrow_mut())(request)
    }
}

/// `Ok` response with a JSON body
pub fn json_ok(body: serde_json::Value) -> Result<Response, TransportError> {
    Ok(Response::new(200, body.to_string()))
}

/// `Ok` response with a bare status and empty body
pub fn status(code: u16) -> Result<Response, TransportError> {
    Ok(Response::new(code, ""))
}

pub fn connection_reset() -> Result<Response, TransportError> {
    Err(TransportError::Connection("connection reset by peer".into()))
}

/// Virtual clock: `sleep` advances time instantly and is recorded
pub struct ManualClock {
    start: Instant,
    offset: Cell<Duration>,
    sleeps: RefCell<Vec<Duration>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            offset: Cell::new(Duration::ZERO),
            sleeps: RefCell::new(Vec::new()),
        }
    }

    pub fn advance(&self, duration: Duration) {
        self.offset.set(self.offset.get() + duration);
    }

    pub fn elapsed(&self) -> Duration {
        self.offset.get()
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.borrow().clone()
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.start + self.offset.get()
    }

    fn sleep(&self, duration: Duration) {
        self.sleeps.borrow_mut().push(duration);
        self.advance(duration);
    }
}

/// Observer that keeps every event
#[derive(Default)]
pub struct RecordingObserver {
    events: RefCell<Vec<Event>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.borrow().clone()
    }

    pub fn count(&self, kind: &str) -> usize {
        self.events
            .borrow()
            .iter()
            .filter(|e| e.kind() == kind)
            .count()
    }
}

impl Observer for RecordingObserver {
    fn observe(&self, event: &Event) {
        self.events.borrow_mut().push(event.clone());
    }
}

/// Shared handles for one test scenario
pub struct Harness {
    pub transport: Rc<MockTransport>,
    pub clock: Rc<ManualClock>,
    pub observer: Rc<RecordingObserver>,
}

impl Harness {
    pub fn new(transport: MockTransport) -> Self {
        Self {
            transport: Rc::new(transport),
            clock: Rc::new(ManualClock::new()),
            observer: Rc::new(RecordingObserver::new()),
        }
    }

    /// Gateway wired to this harness' transport, clock and observer
    pub fn gateway(&self) -> HttpGateway {
        HttpGateway::new(Box::new(Rc::clone(&self.transport)))
            .with_clock(self.clock.clone())
            .with_observer(self.observer.clone())
    }
}

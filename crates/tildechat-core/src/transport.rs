//! Transport abstraction for the tildechat data client
//!
//! This module provides the two transport seams the data client routes over:
//! a request/response transport for one-shot operations and a push transport
//! for long-lived subscriptions. Both are single-threaded (`?Send`) so the
//! same implementations work in the browser and on a native `LocalSet`.

use std::cell::RefCell;
use std::rc::Rc;

use async_trait::async_trait;

use crate::errors::{SubscriptionError, TransportError};
use crate::protocol::{GraphQlRequest, GraphQlResponse};

// ----------------------------------------------------------------------------
// Subscription Events
// ----------------------------------------------------------------------------

/// Event delivered to a subscription's sink
#[derive(Debug, Clone, PartialEq)]
pub enum SubscriptionEvent {
    /// One execution result pushed by the server
    Next(GraphQlResponse),
    /// The registration failed; no further events follow
    Error(SubscriptionError),
    /// The server ended the stream; no further events follow
    Complete,
}

impl SubscriptionEvent {
    /// Whether this event ends the registration
    pub fn is_terminal(&self) -> bool {
        matches!(self, SubscriptionEvent::Error(_) | SubscriptionEvent::Complete)
    }
}

/// Callback receiving every event of one registration
pub type EventSink = Box<dyn FnMut(SubscriptionEvent)>;

/// Sink shared between a registry and in-flight dispatches
pub type SharedSink = Rc<RefCell<EventSink>>;

// ----------------------------------------------------------------------------
// Transport Traits
// ----------------------------------------------------------------------------

/// One request, one correlated response
#[async_trait(?Send)]
pub trait RequestTransport {
    /// Execute a query or mutation and return the server's result body
    async fn execute(&self, request: GraphQlRequest) -> Result<GraphQlResponse, TransportError>;
}

/// Long-lived channel over which the server pushes events
pub trait PushTransport {
    /// Register a subscription under `id`.
    ///
    /// Events are delivered to `sink` until a terminal event or `close(id)`.
    /// Connection setup may happen lazily after this returns.
    fn open(&self, id: &str, request: GraphQlRequest, sink: EventSink) -> Result<(), SubscriptionError>;

    /// Stop the subscription registered under `id`. Unknown ids are ignored.
    fn close(&self, id: &str);
}

// ----------------------------------------------------------------------------
// Delivery
// ----------------------------------------------------------------------------

/// An event waiting to be handed to its sink.
///
/// Registries collect deliveries while borrowed and dispatch them afterwards,
/// so a sink may call back into the registry (for example to unsubscribe).
pub struct Delivery {
    sink: SharedSink,
    event: SubscriptionEvent,
}

impl Delivery {
    pub fn new(sink: SharedSink, event: SubscriptionEvent) -> Self {
        Self { sink, event }
    }

    pub fn event(&self) -> &SubscriptionEvent {
        &self.event
    }

    pub fn dispatch(self) {
        // A sink that re-enters its own delivery drops the nested event
        match self.sink.try_borrow_mut() {
            Ok(mut sink) => (sink)(self.event),
            Err(_) => tracing::warn!("Dropped re-entrant subscription event"),
        }
    }
}

/// Dispatch every delivery in order
pub fn dispatch_all(deliveries: Vec<Delivery>) {
    for delivery in deliveries {
        delivery.dispatch();
    }
}

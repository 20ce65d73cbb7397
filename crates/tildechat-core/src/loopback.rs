//! In-memory loopback backend (for testing)
//!
//! Implements both transport traits against a fake server that fans every
//! `message` mutation back out to all live subscriptions, the way the real
//! chat backend does. Failure and response-holding knobs let tests drive the
//! edge cases of the controller.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, VecDeque};
use std::rc::Rc;

use async_trait::async_trait;
use futures::channel::oneshot;
use serde_json::{json, Value};

use crate::client::DataClient;
use crate::errors::{SubscriptionError, TransportError};
use crate::operation::{Operation, OperationKind};
use crate::protocol::{GraphQlRequest, GraphQlResponse};
use crate::transport::{
    dispatch_all, Delivery, EventSink, PushTransport, RequestTransport, SharedSink, SubscriptionEvent,
};

#[derive(Default)]
struct LoopbackState {
    sinks: BTreeMap<String, SharedSink>,
    requests: Vec<GraphQlRequest>,
    request_failure: Option<TransportError>,
    held: VecDeque<oneshot::Sender<()>>,
}

/// Fake chat server shared by a request transport and a push transport
#[derive(Clone, Default)]
pub struct LoopbackBackend {
    state: Rc<RefCell<LoopbackState>>,
    hold_responses: Rc<Cell<bool>>,
    ignore_close: Rc<Cell<bool>>,
}

impl LoopbackBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Data client whose transports both point at this backend
    pub fn client(&self) -> DataClient {
        DataClient::new(Rc::new(self.clone()), Rc::new(self.clone()))
    }

    /// Fail every following request with `error`
    pub fn fail_requests(&self, error: TransportError) {
        self.state.borrow_mut().request_failure = Some(error);
    }

    pub fn succeed_requests(&self) {
        self.state.borrow_mut().request_failure = None;
    }

    /// Park request responses until released
    pub fn hold_responses(&self, hold: bool) {
        self.hold_responses.set(hold);
    }

    /// Number of requests waiting for release
    pub fn held_responses(&self) -> usize {
        self.state.borrow().held.len()
    }

    /// Resolve the oldest held request
    pub fn release_oldest(&self) -> bool {
        let sender = self.state.borrow_mut().held.pop_front();
        sender.map(|tx| tx.send(()).is_ok()).unwrap_or(false)
    }

    /// Resolve the most recent held request
    pub fn release_newest(&self) -> bool {
        let sender = self.state.borrow_mut().held.pop_back();
        sender.map(|tx| tx.send(()).is_ok()).unwrap_or(false)
    }

    /// Keep delivering to subscriptions after `close`, like a lagging transport
    pub fn ignore_close(&self, ignore: bool) {
        self.ignore_close.set(ignore);
    }

    pub fn requests(&self) -> Vec<GraphQlRequest> {
        self.state.borrow().requests.clone()
    }

    pub fn active_subscriptions(&self) -> usize {
        self.state.borrow().sinks.len()
    }

    /// Push a chat line to every subscription, as if another client posted it
    pub fn push_text(&self, text: &str) {
        self.push_event(SubscriptionEvent::Next(GraphQlResponse::from_data(
            json!({ "messages": { "text": text } }),
        )));
    }

    /// Push an arbitrary event to every subscription
    pub fn push_event(&self, event: SubscriptionEvent) {
        let deliveries: Vec<Delivery> = {
            let mut state = self.state.borrow_mut();
            let sinks: Vec<SharedSink> = state.sinks.values().cloned().collect();
            if event.is_terminal() {
                state.sinks.clear();
            }
            sinks
                .into_iter()
                .map(|sink| Delivery::new(sink, event.clone()))
                .collect()
        };
        dispatch_all(deliveries);
    }

    /// Terminate every subscription with `error`
    pub fn fail_subscriptions(&self, error: SubscriptionError) {
        self.push_event(SubscriptionEvent::Error(error));
    }

    fn respond(&self, request: &GraphQlRequest) -> GraphQlResponse {
        let operation = Operation::parse(request.query.clone());
        match operation.kind() {
            OperationKind::Mutation => {
                let text = request
                    .variables
                    .as_ref()
                    .and_then(|v| v.get("text"))
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                self.push_text(&text);
                GraphQlResponse::from_data(json!({ "message": text }))
            }
            _ => GraphQlResponse::from_data(json!({ "messages": [] })),
        }
    }
}

#[async_trait(?Send)]
impl RequestTransport for LoopbackBackend {
    async fn execute(&self, request: GraphQlRequest) -> Result<GraphQlResponse, TransportError> {
        let gate = {
            let mut state = self.state.borrow_mut();
            state.requests.push(request.clone());
            if self.hold_responses.get() {
                let (tx, rx) = oneshot::channel();
                state.held.push_back(tx);
                Some(rx)
            } else {
                None
            }
        };

        if let Some(rx) = gate {
            rx.await
                .map_err(|_| TransportError::network("loopback backend dropped held request"))?;
        }

        let failure = self.state.borrow().request_failure.clone();
        match failure {
            Some(error) => Err(error),
            None => Ok(self.respond(&request)),
        }
    }
}

impl PushTransport for LoopbackBackend {
    fn open(&self, id: &str, _request: GraphQlRequest, sink: EventSink) -> Result<(), SubscriptionError> {
        self.state
            .borrow_mut()
            .sinks
            .insert(id.to_string(), Rc::new(RefCell::new(sink)));
        Ok(())
    }

    fn close(&self, id: &str) {
        if !self.ignore_close.get() {
            self.state.borrow_mut().sinks.remove(id);
        }
    }
}

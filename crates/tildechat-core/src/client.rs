//! GraphQL data client
//!
//! The client exposes two capabilities to the UI layer: a one-shot `mutate`
//! and a long-lived `subscribe`. Each operation is classified, routed and
//! handed to the matching transport.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use crate::errors::{ClientError, Result};
use crate::operation::Operation;
use crate::router::Route;
use crate::transport::{EventSink, PushTransport, RequestTransport, SubscriptionEvent};

// ----------------------------------------------------------------------------
// Data Client
// ----------------------------------------------------------------------------

/// Routes operations over a request/response transport and a push transport.
///
/// Cloning is cheap; clones share the same transports.
#[derive(Clone)]
pub struct DataClient {
    request: Rc<dyn RequestTransport>,
    push: Rc<dyn PushTransport>,
}

impl DataClient {
    pub fn new(request: Rc<dyn RequestTransport>, push: Rc<dyn PushTransport>) -> Self {
        Self { request, push }
    }

    /// Execute a query or mutation over the request/response transport.
    /// Subscriptions are rejected; use [`DataClient::subscribe_operation`].
    pub async fn execute(&self, operation: Operation) -> Result<Value> {
        match Route::for_operation(&operation) {
            Route::RequestResponse => {
                debug!("Executing {} over request/response", operation.kind());
                let response = self.request.execute(operation.to_request()).await?;
                Ok(response.into_result()?)
            }
            Route::Push => Err(ClientError::WrongOperationKind {
                expected: "query or mutation",
                found: operation.kind().as_str(),
            }),
        }
    }

    /// Send a one-shot mutation. Failures are returned, never retried.
    pub async fn mutate(&self, document: &str, variables: Value) -> Result<Value> {
        let operation = Operation::parse(document).with_variables(variables);
        self.execute(operation).await
    }

    /// Open a subscription; `callback` runs once per inbound event
    pub fn subscribe<F>(&self, document: &str, callback: F) -> Result<Subscription>
    where
        F: FnMut(SubscriptionEvent) + 'static,
    {
        self.subscribe_operation(Operation::parse(document), callback)
    }

    pub fn subscribe_operation<F>(&self, operation: Operation, mut callback: F) -> Result<Subscription>
    where
        F: FnMut(SubscriptionEvent) + 'static,
    {
        if Route::for_operation(&operation) != Route::Push {
            return Err(ClientError::WrongOperationKind {
                expected: "subscription",
                found: operation.kind().as_str(),
            });
        }

        let id = Uuid::new_v4().to_string();
        let live = Rc::new(Cell::new(true));

        // The liveness flag guards every delivery, so nothing reaches the
        // callback once unsubscribe has returned.
        let sink_live = Rc::clone(&live);
        let sink: EventSink = Box::new(move |event| {
            if !sink_live.get() {
                return;
            }
            if event.is_terminal() {
                sink_live.set(false);
            }
            callback(event);
        });

        self.push.open(&id, operation.to_request(), sink)?;
        debug!("Subscription {} opened", id);

        Ok(Subscription {
            id,
            live,
            push: Rc::clone(&self.push),
        })
    }
}

impl fmt::Debug for DataClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataClient").finish_non_exhaustive()
    }
}

// ----------------------------------------------------------------------------
// Subscription Handle
// ----------------------------------------------------------------------------

/// Handle to one active push registration. Dropping it unsubscribes.
pub struct Subscription {
    id: String,
    live: Rc<Cell<bool>>,
    push: Rc<dyn PushTransport>,
}

impl Subscription {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// False after unsubscribe or after a terminal event
    pub fn is_active(&self) -> bool {
        self.live.get()
    }

    /// Stop receiving events. Safe to call any number of times.
    pub fn unsubscribe(&self) {
        if self.live.replace(false) {
            debug!("Unsubscribing {}", self.id);
        }
        self.push.close(&self.id);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("active", &self.live.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    use crate::errors::{SubscriptionError, TransportError};
    use crate::loopback::LoopbackBackend;
    use crate::operation::{MESSAGES_SUBSCRIPTION, MESSAGE_MUTATION};
    use crate::protocol::GraphQlResponse;
    use serde_json::json;

    fn recorder() -> (Rc<RefCell<Vec<SubscriptionEvent>>>, impl FnMut(SubscriptionEvent)) {
        let events = Rc::new(RefCell::new(Vec::new()));
        let events_clone = Rc::clone(&events);
        (events, move |event| events_clone.borrow_mut().push(event))
    }

    #[tokio::test]
    async fn test_mutate_echoes_to_subscribers() {
        let backend = LoopbackBackend::new();
        let client = backend.client();
        let (events, callback) = recorder();

        let _subscription = client.subscribe(MESSAGES_SUBSCRIPTION, callback).unwrap();
        let result = client
            .mutate(MESSAGE_MUTATION, json!({ "text": "hello" }))
            .await
            .unwrap();

        assert_eq!(result, json!({ "message": "hello" }));
        assert_eq!(
            events.borrow().as_slice(),
            &[SubscriptionEvent::Next(GraphQlResponse::from_data(
                json!({ "messages": { "text": "hello" } })
            ))]
        );
    }

    #[tokio::test]
    async fn test_mutate_failure_is_returned() {
        let backend = LoopbackBackend::new();
        backend.fail_requests(TransportError::network("offline"));

        let err = backend
            .client()
            .mutate(MESSAGE_MUTATION, json!({ "text": "x" }))
            .await
            .unwrap_err();
        assert_eq!(err, ClientError::Transport(TransportError::network("offline")));
        assert_eq!(backend.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_execute_rejects_subscriptions() {
        let backend = LoopbackBackend::new();
        let err = backend
            .client()
            .execute(Operation::parse(MESSAGES_SUBSCRIPTION))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::WrongOperationKind { found: "subscription", .. }));
    }

    #[test]
    fn test_subscribe_rejects_mutations() {
        let backend = LoopbackBackend::new();
        let err = backend.client().subscribe(MESSAGE_MUTATION, |_| {}).unwrap_err();
        assert!(matches!(err, ClientError::WrongOperationKind { found: "mutation", .. }));
        assert_eq!(backend.active_subscriptions(), 0);
    }

    #[test]
    fn test_unsubscribe_is_idempotent() {
        let backend = LoopbackBackend::new();
        let subscription = backend.client().subscribe(MESSAGES_SUBSCRIPTION, |_| {}).unwrap();
        assert!(subscription.is_active());
        assert_eq!(backend.active_subscriptions(), 1);

        subscription.unsubscribe();
        subscription.unsubscribe();

        assert!(!subscription.is_active());
        assert_eq!(backend.active_subscriptions(), 0);
    }

    #[test]
    fn test_no_callback_after_unsubscribe_even_if_transport_delivers() {
        let backend = LoopbackBackend::new();
        backend.ignore_close(true);
        let (events, callback) = recorder();

        let subscription = backend.client().subscribe(MESSAGES_SUBSCRIPTION, callback).unwrap();
        backend.push_text("before");
        subscription.unsubscribe();
        backend.push_text("after");

        assert_eq!(events.borrow().len(), 1);
    }

    #[test]
    fn test_terminal_event_deactivates_handle() {
        let backend = LoopbackBackend::new();
        let (events, callback) = recorder();
        let subscription = backend.client().subscribe(MESSAGES_SUBSCRIPTION, callback).unwrap();

        backend.fail_subscriptions(SubscriptionError::closed("server gone"));
        backend.push_text("ignored");

        assert!(!subscription.is_active());
        assert_eq!(
            events.borrow().as_slice(),
            &[SubscriptionEvent::Error(SubscriptionError::closed("server gone"))]
        );
    }

    #[test]
    fn test_drop_unsubscribes() {
        let backend = LoopbackBackend::new();
        {
            let _subscription = backend.client().subscribe(MESSAGES_SUBSCRIPTION, |_| {}).unwrap();
            assert_eq!(backend.active_subscriptions(), 1);
        }
        assert_eq!(backend.active_subscriptions(), 0);
    }
}

//! `graphql-transport-ws` session state machine
//!
//! The session is sans-IO: socket implementations feed it lifecycle signals and
//! text frames, and it answers with frames to send, events to deliver and
//! whether a connection must be opened or torn down. The browser and native
//! push transports share it.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use serde_json::Value;
use tracing::{debug, trace, warn};

use crate::errors::SubscriptionError;
use crate::protocol::{ClientMessage, GraphQlRequest, ServerMessage};
use crate::transport::{Delivery, EventSink, SharedSink, SubscriptionEvent};

// ----------------------------------------------------------------------------
// Session Phase
// ----------------------------------------------------------------------------

/// Connection phase of a push session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// No socket; the next subscription opens one
    Idle,
    /// Socket requested or open, waiting for `connection_ack`
    Connecting,
    /// Acknowledged; subscribe frames go out immediately
    Ready,
}

// ----------------------------------------------------------------------------
// Session Output
// ----------------------------------------------------------------------------

/// What the socket owner must do after feeding the session
#[derive(Default)]
pub struct SessionOutput {
    /// Open a new socket
    pub connect: bool,
    /// Close the current socket
    pub disconnect: bool,
    /// Frames to write, in order
    pub send: Vec<ClientMessage>,
    /// Events to hand to sinks once the session is no longer borrowed
    pub deliveries: Vec<Delivery>,
}

impl SessionOutput {
    fn send(message: ClientMessage) -> Self {
        Self {
            send: vec![message],
            ..Default::default()
        }
    }
}

// ----------------------------------------------------------------------------
// Push Session
// ----------------------------------------------------------------------------

/// Subscription registry and handshake state for one push endpoint
pub struct PushSession {
    phase: SessionPhase,
    init_payload: Option<Value>,
    sinks: HashMap<String, SharedSink>,
    queued: Vec<ClientMessage>,
}

impl PushSession {
    pub fn new(init_payload: Option<Value>) -> Self {
        Self {
            phase: SessionPhase::Idle,
            init_payload,
            sinks: HashMap::new(),
            queued: Vec::new(),
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn active_subscriptions(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_registered(&self, id: &str) -> bool {
        self.sinks.contains_key(id)
    }

    /// Register a subscription and emit or queue its `subscribe` frame
    pub fn subscribe(
        &mut self,
        id: &str,
        request: GraphQlRequest,
        sink: EventSink,
    ) -> Result<SessionOutput, SubscriptionError> {
        if self.sinks.contains_key(id) {
            return Err(SubscriptionError::protocol(format!(
                "subscriber for {} already exists",
                id
            )));
        }

        self.sinks.insert(id.to_string(), Rc::new(RefCell::new(sink)));
        let frame = ClientMessage::Subscribe {
            id: id.to_string(),
            payload: request,
        };

        let output = match self.phase {
            SessionPhase::Ready => SessionOutput::send(frame),
            SessionPhase::Connecting => {
                self.queued.push(frame);
                SessionOutput::default()
            }
            SessionPhase::Idle => {
                debug!("Opening push connection for subscription {}", id);
                self.queued.push(frame);
                self.phase = SessionPhase::Connecting;
                SessionOutput {
                    connect: true,
                    ..Default::default()
                }
            }
        };
        Ok(output)
    }

    /// Stop a subscription. Unknown ids produce no output.
    pub fn complete(&mut self, id: &str) -> SessionOutput {
        if self.sinks.remove(id).is_none() {
            return SessionOutput::default();
        }

        let mut output = match self.phase {
            SessionPhase::Ready => SessionOutput::send(ClientMessage::Complete { id: id.to_string() }),
            SessionPhase::Connecting => {
                self.queued
                    .retain(|frame| !matches!(frame, ClientMessage::Subscribe { id: queued, .. } if queued == id));
                SessionOutput::default()
            }
            SessionPhase::Idle => SessionOutput::default(),
        };
        output.disconnect = self.release_if_unused();
        output
    }

    /// The socket is open; start the handshake
    pub fn connection_opened(&mut self) -> SessionOutput {
        SessionOutput::send(ClientMessage::ConnectionInit {
            payload: self.init_payload.clone(),
        })
    }

    /// Feed one text frame from the server
    pub fn receive(&mut self, text: &str) -> SessionOutput {
        let message = match ServerMessage::decode(text) {
            Ok(message) => message,
            Err(error) => {
                warn!("Closing push connection: {}", error);
                let mut output = self.fail_all(error);
                output.disconnect = true;
                return output;
            }
        };

        trace!("Push frame received: {:?}", message);
        match message {
            ServerMessage::ConnectionAck { .. } => {
                if self.phase != SessionPhase::Connecting {
                    let mut output =
                        self.fail_all(SubscriptionError::protocol("unexpected connection_ack"));
                    output.disconnect = true;
                    return output;
                }
                self.phase = SessionPhase::Ready;
                debug!("Push connection acknowledged, flushing {} subscriptions", self.queued.len());
                SessionOutput {
                    send: std::mem::take(&mut self.queued),
                    ..Default::default()
                }
            }
            ServerMessage::Next { id, payload } => match self.sinks.get(&id) {
                Some(sink) => SessionOutput {
                    deliveries: vec![Delivery::new(Rc::clone(sink), SubscriptionEvent::Next(payload))],
                    ..Default::default()
                },
                None => {
                    trace!("Ignoring event for unknown subscription {}", id);
                    SessionOutput::default()
                }
            },
            ServerMessage::Error { id, payload } => {
                let messages = payload.into_iter().map(|e| e.message).collect();
                self.finish(&id, SubscriptionEvent::Error(SubscriptionError::Server { messages }))
            }
            ServerMessage::Complete { id } => self.finish(&id, SubscriptionEvent::Complete),
            ServerMessage::Ping { .. } => SessionOutput::send(ClientMessage::Pong { payload: None }),
            ServerMessage::Pong { .. } => SessionOutput::default(),
        }
    }

    /// The socket closed; every live subscription fails with `error`
    pub fn connection_closed(&mut self, error: SubscriptionError) -> SessionOutput {
        if self.phase == SessionPhase::Idle && self.sinks.is_empty() {
            return SessionOutput::default();
        }
        debug!("Push connection closed: {}", error);
        self.fail_all(error)
    }

    /// The server did not acknowledge in time
    pub fn ack_timed_out(&mut self, duration_ms: u64) -> SessionOutput {
        if self.phase != SessionPhase::Connecting {
            return SessionOutput::default();
        }
        let mut output = self.fail_all(SubscriptionError::ConnectionTimeout { duration_ms });
        output.disconnect = true;
        output
    }

    fn finish(&mut self, id: &str, event: SubscriptionEvent) -> SessionOutput {
        match self.sinks.remove(id) {
            Some(sink) => SessionOutput {
                deliveries: vec![Delivery::new(sink, event)],
                disconnect: self.release_if_unused(),
                ..Default::default()
            },
            None => SessionOutput::default(),
        }
    }

    /// The connection is lazy: it closes with the last subscription.
    fn release_if_unused(&mut self) -> bool {
        if !self.sinks.is_empty() || self.phase == SessionPhase::Idle {
            return false;
        }
        debug!("No subscriptions left, closing push connection");
        self.phase = SessionPhase::Idle;
        self.queued.clear();
        true
    }

    fn fail_all(&mut self, error: SubscriptionError) -> SessionOutput {
        self.phase = SessionPhase::Idle;
        self.queued.clear();

        let mut ids: Vec<String> = self.sinks.keys().cloned().collect();
        ids.sort();
        let deliveries = ids
            .into_iter()
            .filter_map(|id| self.sinks.remove(&id))
            .map(|sink| Delivery::new(sink, SubscriptionEvent::Error(error.clone())))
            .collect();

        SessionOutput {
            deliveries,
            ..Default::default()
        }
    }
}

impl Default for PushSession {
    fn default() -> Self {
        Self::new(None)
    }
}

//! Tildechat Core
//!
//! Platform-agnostic heart of the tildechat widget: GraphQL operation
//! classification and routing, the data client that fronts a request/response
//! transport and a push transport, the `graphql-transport-ws` session shared by
//! both push transports, the message store and the chat view controller.
//!
//! Nothing in this crate performs I/O. Hosts plug in transports and a view.

// ----------------------------------------------------------------------------
// Module Declarations
// ----------------------------------------------------------------------------

pub mod client;
pub mod config;
pub mod controller;
pub mod errors;
pub mod operation;
pub mod protocol;
pub mod render;
pub mod router;
pub mod session;
pub mod store;
pub mod transport;

#[cfg(any(test, feature = "testing"))]
pub mod loopback;

// ----------------------------------------------------------------------------
// Public API
// ----------------------------------------------------------------------------

pub use client::{DataClient, Subscription};
pub use config::{ChatConfig, ClientConfig};
pub use controller::{ChatController, ChatView, Lifecycle, ScrollMetrics, SubscriptionState, SUBMIT_KEY};
pub use errors::{ClientError, ConfigError, Result, SubscriptionError, TransportError};
pub use operation::{Operation, OperationKind, MESSAGES_SUBSCRIPTION, MESSAGE_MUTATION};
pub use protocol::{ClientMessage, GraphQlError, GraphQlRequest, GraphQlResponse, ServerMessage};
pub use render::{render, RenderState, ViewTree};
pub use router::Route;
pub use session::{PushSession, SessionOutput, SessionPhase};
pub use store::{Message, MessageStore};
pub use transport::{dispatch_all, Delivery, EventSink, PushTransport, RequestTransport, SubscriptionEvent};

#[cfg(any(test, feature = "testing"))]
pub use loopback::LoopbackBackend;

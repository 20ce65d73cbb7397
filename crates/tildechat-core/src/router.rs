//! Transport routing
//!
//! Subscriptions travel over the push transport; everything else is a one-shot
//! exchange over the request/response transport.

use crate::operation::{Operation, OperationKind};

/// Which transport an operation is sent over
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    /// Long-lived push channel (WebSocket)
    Push,
    /// One request, one correlated response (HTTP)
    RequestResponse,
}

impl Route {
    pub fn for_operation(operation: &Operation) -> Self {
        operation.kind().route()
    }
}

impl OperationKind {
    /// Route for operations of this kind
    pub fn route(self) -> Route {
        match self {
            OperationKind::Subscription => Route::Push,
            OperationKind::Query | OperationKind::Mutation => Route::RequestResponse,
        }
    }
}

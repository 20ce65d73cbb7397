//! Wire types for GraphQL over HTTP and the `graphql-transport-ws` protocol
//!
//! WebSocket frames use internally-tagged JSON enums (`{"type": "next", ...}`).
//! Two top-level enums cover the client-to-server and server-to-client
//! directions.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{SubscriptionError, TransportError};

/// WebSocket sub-protocol negotiated with the push endpoint
pub const GRAPHQL_TRANSPORT_WS_PROTOCOL: &str = "graphql-transport-ws";

// ----------------------------------------------------------------------------
// GraphQL Request / Response
// ----------------------------------------------------------------------------

/// Body of a GraphQL request, shared by HTTP POST and `subscribe` frames
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphQlRequest {
    pub query: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variables: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation_name: Option<String>,
}

/// One entry of a GraphQL `errors` array
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphQlError {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locations: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Value>,
}

impl GraphQlError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            locations: None,
            path: None,
            extensions: None,
        }
    }
}

/// GraphQL execution result
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GraphQlResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<GraphQlError>,
}

impl GraphQlResponse {
    pub fn from_data(data: Value) -> Self {
        Self {
            data: Some(data),
            errors: Vec::new(),
        }
    }

    pub fn error_messages(&self) -> Vec<String> {
        self.errors.iter().map(|e| e.message.clone()).collect()
    }

    /// Map an HTTP status and body to a response.
    ///
    /// Non-2xx statuses are failures regardless of the body; a 2xx body must
    /// decode as a GraphQL result.
    pub fn from_http(status: u16, body: &str) -> Result<Self, TransportError> {
        if !(200..300).contains(&status) {
            return Err(TransportError::Status {
                status,
                body: body.to_string(),
            });
        }
        serde_json::from_str(body).map_err(|e| TransportError::decode(e.to_string()))
    }

    /// Any server-reported error fails the whole operation
    pub fn into_result(self) -> Result<Value, TransportError> {
        if !self.errors.is_empty() {
            return Err(TransportError::Operation {
                messages: self.error_messages(),
            });
        }
        Ok(self.data.unwrap_or(Value::Null))
    }
}

// ----------------------------------------------------------------------------
// Client -> Server
// ----------------------------------------------------------------------------

/// Frames sent from the client to the push endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// First frame on a new socket
    ConnectionInit {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        payload: Option<Value>,
    },

    /// Start a subscription
    Subscribe { id: String, payload: GraphQlRequest },

    /// Stop a subscription
    Complete { id: String },

    Ping {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        payload: Option<Value>,
    },

    Pong {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        payload: Option<Value>,
    },
}

impl ClientMessage {
    pub fn encode(&self) -> Result<String, SubscriptionError> {
        serde_json::to_string(self)
            .map_err(|e| SubscriptionError::protocol(format!("failed to encode frame: {}", e)))
    }
}

// ----------------------------------------------------------------------------
// Server -> Client
// ----------------------------------------------------------------------------

/// Frames sent from the push endpoint to the client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    ConnectionAck {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        payload: Option<Value>,
    },

    /// One execution result for a subscription
    Next { id: String, payload: GraphQlResponse },

    /// Subscription failed before or during execution; terminal
    Error {
        id: String,
        payload: Vec<GraphQlError>,
    },

    /// Server finished the subscription; terminal
    Complete { id: String },

    Ping {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        payload: Option<Value>,
    },

    Pong {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        payload: Option<Value>,
    },
}

impl ServerMessage {
    pub fn decode(text: &str) -> Result<Self, SubscriptionError> {
        serde_json::from_str(text)
            .map_err(|e| SubscriptionError::protocol(format!("invalid frame {:?}: {}", text, e)))
    }
}

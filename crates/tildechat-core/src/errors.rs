//! Error types for the tildechat client
//!
//! This module contains the error taxonomy shared by every crate in the workspace:
//! request/response transport failures, push channel failures, configuration
//! errors and the `ClientError` type that unifies them.

use thiserror::Error;

// ----------------------------------------------------------------------------
// Specific Error Types
// ----------------------------------------------------------------------------

/// Failures of a one-shot operation over the request/response transport
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("Network error: {reason}")]
    Network { reason: String },
    #[error("Server responded with status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Operation failed: {}", messages.join("; "))]
    Operation { messages: Vec<String> },
    #[error("Failed to decode response: {reason}")]
    Decode { reason: String },
    #[error("Failed to encode request: {reason}")]
    Encode { reason: String },
}

/// Failures of a push channel registration
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubscriptionError {
    #[error("Push channel closed: {reason}")]
    Closed { reason: String },
    #[error("No connection acknowledgement after {duration_ms}ms")]
    ConnectionTimeout { duration_ms: u64 },
    #[error("Protocol violation: {reason}")]
    Protocol { reason: String },
    #[error("Server rejected subscription: {}", messages.join("; "))]
    Server { messages: Vec<String> },
    #[error("Push transport error: {reason}")]
    Transport { reason: String },
}

/// Configuration-related errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Configuration loading error: {0}")]
    Loading(String),

    #[error("Configuration validation error: {0}")]
    Validation(String),
}

// ----------------------------------------------------------------------------
// Unified Client Error
// ----------------------------------------------------------------------------

/// Core error type for the tildechat client
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Subscription error: {0}")]
    Subscription(#[from] SubscriptionError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Expected a {expected} operation, got {found}")]
    WrongOperationKind {
        expected: &'static str,
        found: &'static str,
    },

    #[error("Chat view is already mounted")]
    AlreadyMounted,
}

// ----------------------------------------------------------------------------
// Convenience Error Constructors
// ----------------------------------------------------------------------------

impl TransportError {
    /// Create a network error with a reason
    pub fn network<T: Into<String>>(reason: T) -> Self {
        TransportError::Network {
            reason: reason.into(),
        }
    }

    /// Create a decode error with a reason
    pub fn decode<T: Into<String>>(reason: T) -> Self {
        TransportError::Decode {
            reason: reason.into(),
        }
    }
}

impl SubscriptionError {
    /// Create a closed-channel error with a reason
    pub fn closed<T: Into<String>>(reason: T) -> Self {
        SubscriptionError::Closed {
            reason: reason.into(),
        }
    }

    /// Create a protocol violation error with a reason
    pub fn protocol<T: Into<String>>(reason: T) -> Self {
        SubscriptionError::Protocol {
            reason: reason.into(),
        }
    }
}

impl ClientError {
    /// Create a configuration validation error
    pub fn config_error<T: Into<String>>(reason: T) -> Self {
        ClientError::Config(ConfigError::Validation(reason.into()))
    }
}

// ----------------------------------------------------------------------------
// Type Aliases
// ----------------------------------------------------------------------------

pub type Result<T> = core::result::Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_error_joins_messages() {
        let err = TransportError::Operation {
            messages: vec!["first".to_string(), "second".to_string()],
        };
        assert_eq!(err.to_string(), "Operation failed: first; second");
    }

    #[test]
    fn test_client_error_from_transport() {
        let err: ClientError = TransportError::network("connection refused").into();
        assert!(matches!(err, ClientError::Transport(TransportError::Network { .. })));
        assert!(err.to_string().contains("connection refused"));
    }
}

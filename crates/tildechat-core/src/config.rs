//! Centralized Configuration Management
//!
//! Configuration structures shared by the browser widget and the terminal
//! client: where the two transports connect, and what the chat controller
//! sends and listens for.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use crate::errors::ConfigError;
use crate::operation::{Operation, OperationKind, MESSAGES_SUBSCRIPTION, MESSAGE_MUTATION};
use crate::protocol::GRAPHQL_TRANSPORT_WS_PROTOCOL;

// ----------------------------------------------------------------------------
// Client Configuration
// ----------------------------------------------------------------------------

/// Endpoints and connection settings for the data client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Request/response endpoint (GraphQL over HTTP POST)
    pub http_endpoint: String,
    /// Push endpoint (GraphQL over WebSocket)
    pub ws_endpoint: String,
    /// WebSocket sub-protocol requested during the handshake
    pub ws_protocol: String,
    /// Extra headers sent with every HTTP request
    pub headers: BTreeMap<String, String>,
    /// How long to wait for `connection_ack` before failing subscriptions
    pub connection_ack_timeout_ms: u64,
    /// Payload of the `connection_init` frame
    pub connection_params: Option<Value>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            http_endpoint: "http://127.0.0.1:8000/".to_string(),
            ws_endpoint: "ws://127.0.0.1:8000/ws".to_string(),
            ws_protocol: GRAPHQL_TRANSPORT_WS_PROTOCOL.to_string(),
            headers: BTreeMap::new(),
            connection_ack_timeout_ms: 3_000,
            connection_params: None,
        }
    }
}

impl ClientConfig {
    /// Point both transports at a backend
    pub fn with_endpoints(http_endpoint: impl Into<String>, ws_endpoint: impl Into<String>) -> Self {
        Self {
            http_endpoint: http_endpoint.into(),
            ws_endpoint: ws_endpoint.into(),
            ..Default::default()
        }
    }

    /// Derive both endpoints from one backend origin, e.g. `http://host:8000`.
    /// The push endpoint lives at `/ws` on the matching WebSocket scheme.
    pub fn for_origin(origin: &str) -> Result<Self, ConfigError> {
        let http = Url::parse(origin)
            .map_err(|e| ConfigError::Validation(format!("invalid origin {}: {}", origin, e)))?;
        let ws_scheme = match http.scheme() {
            "http" => "ws",
            "https" => "wss",
            other => {
                return Err(ConfigError::Validation(format!(
                    "origin must be http or https, got {}",
                    other
                )))
            }
        };

        let mut ws = http.clone();
        ws.set_scheme(ws_scheme)
            .map_err(|_| ConfigError::Validation(format!("cannot derive push endpoint from {}", origin)))?;
        ws.set_path("/ws");

        Ok(Self::with_endpoints(http.to_string(), ws.to_string()))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        check_scheme("http_endpoint", &self.http_endpoint, &["http", "https"])?;
        check_scheme("ws_endpoint", &self.ws_endpoint, &["ws", "wss"])?;

        if self.ws_protocol.trim().is_empty() {
            return Err(ConfigError::Validation("ws_protocol must not be empty".into()));
        }
        if self.connection_ack_timeout_ms == 0 {
            return Err(ConfigError::Validation(
                "connection_ack_timeout_ms must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

fn check_scheme(field: &str, value: &str, allowed: &[&str]) -> Result<(), ConfigError> {
    let url = Url::parse(value)
        .map_err(|e| ConfigError::Validation(format!("{} is not a valid URL ({}): {}", field, value, e)))?;
    if !allowed.contains(&url.scheme()) {
        return Err(ConfigError::Validation(format!(
            "{} must use one of {:?}, got {}",
            field,
            allowed,
            url.scheme()
        )));
    }
    Ok(())
}

// ----------------------------------------------------------------------------
// Chat Configuration
// ----------------------------------------------------------------------------

/// What the chat controller sends, listens for and treats as a command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Mutation posting one line; receives the `text` variable
    pub mutation_document: String,
    /// Subscription streaming `{ messages { text } }` events
    pub subscription_document: String,
    /// Input that empties the local list, compared case-insensitively
    pub clear_command: String,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            mutation_document: MESSAGE_MUTATION.to_string(),
            subscription_document: MESSAGES_SUBSCRIPTION.to_string(),
            clear_command: "clear".to_string(),
        }
    }
}

impl ChatConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mutation = Operation::parse(self.mutation_document.clone());
        if mutation.kind() != OperationKind::Mutation {
            return Err(ConfigError::Validation(format!(
                "mutation_document must be a mutation, got {}",
                mutation.kind()
            )));
        }

        let subscription = Operation::parse(self.subscription_document.clone());
        if subscription.kind() != OperationKind::Subscription {
            return Err(ConfigError::Validation(format!(
                "subscription_document must be a subscription, got {}",
                subscription.kind()
            )));
        }

        if self.clear_command.trim().is_empty() {
            return Err(ConfigError::Validation("clear_command must not be empty".into()));
        }
        Ok(())
    }

    /// Whether `input` is the clear command
    pub fn is_clear_command(&self, input: &str) -> bool {
        input.to_lowercase() == self.clear_command.to_lowercase()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_validates() {
        assert!(ClientConfig::default().validate().is_ok());
        assert!(ChatConfig::default().validate().is_ok());
    }

    #[test]
    fn test_endpoint_schemes_are_checked() {
        let config = ClientConfig::with_endpoints("ws://host/", "ws://host/ws");
        assert!(config.validate().is_err());

        let config = ClientConfig::with_endpoints("https://host/", "https://host/ws");
        assert!(config.validate().is_err());

        let config = ClientConfig::with_endpoints("https://host/", "wss://host/ws");
        assert!(config.validate().is_ok());

        let config = ClientConfig::with_endpoints("not a url", "wss://host/ws");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_ack_timeout_is_invalid() {
        let config = ClientConfig {
            connection_ack_timeout_ms: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_for_origin_derives_push_endpoint() {
        let config = ClientConfig::for_origin("https://chat.example.com:8443").unwrap();
        assert_eq!(config.http_endpoint, "https://chat.example.com:8443/");
        assert_eq!(config.ws_endpoint, "wss://chat.example.com:8443/ws");

        assert!(ClientConfig::for_origin("ftp://example.com").is_err());
    }

    #[test]
    fn test_chat_documents_must_match_kind() {
        let swapped = ChatConfig {
            mutation_document: MESSAGES_SUBSCRIPTION.to_string(),
            ..Default::default()
        };
        assert!(swapped.validate().is_err());

        let query = ChatConfig {
            subscription_document: "{ messages { text } }".to_string(),
            ..Default::default()
        };
        assert!(query.validate().is_err());
    }

    #[test]
    fn test_clear_command_is_case_insensitive() {
        let config = ChatConfig::default();
        assert!(config.is_clear_command("clear"));
        assert!(config.is_clear_command("CLEAR"));
        assert!(config.is_clear_command("Clear"));
        assert!(!config.is_clear_command("clear "));
        assert!(!config.is_clear_command("clears"));
    }

    #[test]
    fn test_partial_config_deserializes_with_defaults() {
        let config: ClientConfig =
            serde_json::from_str(r#"{ "http_endpoint": "http://10.0.0.1:8000/" }"#).unwrap();
        assert_eq!(config.http_endpoint, "http://10.0.0.1:8000/");
        assert_eq!(config.ws_endpoint, ClientConfig::default().ws_endpoint);
    }
}

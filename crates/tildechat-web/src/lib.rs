//! Tildechat WebAssembly Frontend - Web Composition Root
//!
//! This crate provides the browser build of the tildechat widget. It is
//! responsible for:
//! - Rendering the widget into a caller-supplied DOM container
//! - Providing `fetch` and `WebSocket` implementations of the core transports
//! - Exposing the JavaScript API via `#[wasm_bindgen]`

use wasm_bindgen::prelude::*;

mod app;
mod dom;
mod fetch;
mod socket;
mod utils;

pub use app::{TildechatWidget, WidgetConfig};
pub use dom::DomView;
pub use fetch::FetchTransport;
pub use socket::BrowserSocketTransport;
pub use utils::*;

// Initialize WASM module
#[wasm_bindgen(start)]
pub fn main() {
    utils::set_panic_hook();

    // Set up tracing for WASM
    tracing_wasm::set_as_global_default();
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    #[test]
    fn test_widget_config_defaults_validate() {
        let config = WidgetConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.chat.clear_command, "clear");
    }

    #[test]
    fn test_widget_config_defaults_to_page_origin() {
        let config = WidgetConfig::resolve(Some("https://chat.example.com"), Value::Null).unwrap();
        assert_eq!(config.client.http_endpoint, "https://chat.example.com/");
        assert_eq!(config.client.ws_endpoint, "wss://chat.example.com/ws");
        assert_eq!(config.chat.clear_command, "clear");
    }

    #[test]
    fn test_widget_config_unusable_origin_keeps_defaults() {
        let config = WidgetConfig::resolve(Some("null"), Value::Null).unwrap();
        assert_eq!(config, WidgetConfig::default());

        let config = WidgetConfig::resolve(None, Value::Null).unwrap();
        assert_eq!(config, WidgetConfig::default());
    }

    #[test]
    fn test_widget_config_partial_override() {
        let config = WidgetConfig::resolve(
            Some("http://localhost:3000"),
            json!({
                "client": { "ws_endpoint": "wss://chat.example.com/ws", "headers": { "X-Room": "lobby" } },
                "chat": { "clear_command": "wipe" }
            }),
        )
        .unwrap();

        assert_eq!(config.client.ws_endpoint, "wss://chat.example.com/ws");
        assert_eq!(config.client.http_endpoint, "http://localhost:3000/");
        assert_eq!(config.client.headers.get("X-Room").map(String::as_str), Some("lobby"));
        assert_eq!(config.chat.clear_command, "wipe");
        assert_eq!(config.chat.mutation_document, tildechat_core::MESSAGE_MUTATION);
    }

    #[test]
    fn test_widget_config_rejects_bad_endpoint() {
        let result = WidgetConfig::resolve(
            Some("https://chat.example.com"),
            json!({ "client": { "ws_endpoint": "http://chat.example.com/ws" } }),
        );
        assert!(result.is_err());
    }
}

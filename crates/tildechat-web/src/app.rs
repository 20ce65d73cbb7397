//! Tildechat Web Widget - Composition Root
//!
//! This module wires the browser pieces together, responsible for:
//! 1. Building the DOM view inside a caller-supplied container
//! 2. Instantiating the fetch and WebSocket transports behind a data client
//! 3. Forwarding DOM events to the chat controller
//! 4. Exposing a minimal `#[wasm_bindgen]` API to JavaScript

use std::rc::Rc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tildechat_core::{ChatConfig, ChatController, ClientConfig, ClientError, DataClient};
use tracing::{debug, info, warn};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::spawn_local;
use web_sys::{Element, Event, EventTarget, KeyboardEvent};

use crate::dom::DomView;
use crate::fetch::FetchTransport;
use crate::socket::BrowserSocketTransport;
use crate::utils::{describe_js_error, to_js_error};

// ----------------------------------------------------------------------------
// JavaScript Configuration
// ----------------------------------------------------------------------------

/// Options accepted from JavaScript, e.g.
/// `{ client: { http_endpoint: "...", ws_endpoint: "..." }, chat: { clear_command: "clear" } }`.
/// Every field is optional. Endpoints default to the page's own origin.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WidgetConfig {
    pub client: ClientConfig,
    pub chat: ChatConfig,
}

impl WidgetConfig {
    pub fn from_js(value: JsValue) -> Result<Self, ClientError> {
        let overrides: Value = if value.is_undefined() || value.is_null() {
            Value::Null
        } else {
            serde_wasm_bindgen::from_value(value).map_err(|e| ClientError::config_error(e.to_string()))?
        };
        let origin = web_sys::window().and_then(|window| window.location().origin().ok());
        Self::resolve(origin.as_deref(), overrides)
    }

    /// Layer `overrides` over defaults derived from `origin`.
    ///
    /// An origin that cannot host the backend (`null` for `file://` pages,
    /// for instance) keeps the built-in endpoints.
    pub fn resolve(origin: Option<&str>, overrides: Value) -> Result<Self, ClientError> {
        let mut base = Self::default();
        if let Some(origin) = origin {
            match ClientConfig::for_origin(origin) {
                Ok(client) => base.client = client,
                Err(e) => debug!("Keeping default endpoints: {}", e),
            }
        }

        let mut merged = serde_json::to_value(&base).map_err(|e| ClientError::config_error(e.to_string()))?;
        merge(&mut merged, overrides);
        let config: Self =
            serde_json::from_value(merged).map_err(|e| ClientError::config_error(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ClientError> {
        self.client.validate()?;
        self.chat.validate()?;
        Ok(())
    }
}

fn merge(base: &mut Value, overrides: Value) {
    match (base, overrides) {
        (_, Value::Null) => {}
        (Value::Object(base), Value::Object(overrides)) => {
            for (key, value) in overrides {
                let nested = matches!((base.get(&key), &value), (Some(Value::Object(_)), Value::Object(_)));
                if !nested {
                    base.insert(key, value);
                } else if let Some(slot) = base.get_mut(&key) {
                    merge(slot, value);
                }
            }
        }
        (base, overrides) => *base = overrides,
    }
}

// ----------------------------------------------------------------------------
// DOM Listeners
// ----------------------------------------------------------------------------

struct Listener {
    target: EventTarget,
    event: &'static str,
    callback: Closure<dyn FnMut(Event)>,
}

impl Listener {
    fn attach<F>(target: &EventTarget, event: &'static str, handler: F) -> Result<Self, JsValue>
    where
        F: FnMut(Event) + 'static,
    {
        let callback = Closure::<dyn FnMut(Event)>::new(handler);
        target.add_event_listener_with_callback(event, callback.as_ref().unchecked_ref())?;
        Ok(Self {
            target: target.clone(),
            event,
            callback,
        })
    }

    fn detach(self) {
        if let Err(e) = self
            .target
            .remove_event_listener_with_callback(self.event, self.callback.as_ref().unchecked_ref())
        {
            warn!("Unable to remove {} listener: {}", self.event, describe_js_error(&e));
        }
    }
}

fn attach_listeners(controller: &ChatController<DomView>) -> Result<Vec<Listener>, JsValue> {
    let view = controller.view();
    let input: &EventTarget = view.input().as_ref();
    let root: &EventTarget = view.root().as_ref();

    let on_keydown = {
        let controller = controller.clone();
        move |event: Event| {
            let Some(event) = event.dyn_ref::<KeyboardEvent>() else {
                return;
            };
            if let Some(mutation) = controller.handle_keydown(&event.key()) {
                spawn_local(mutation);
            }
        }
    };
    let on_focus = {
        let controller = controller.clone();
        move |_: Event| controller.on_focus()
    };
    let on_blur = {
        let controller = controller.clone();
        move |_: Event| controller.on_blur()
    };
    let on_click = {
        let controller = controller.clone();
        move |_: Event| controller.on_click()
    };

    Ok(vec![
        Listener::attach(input, "keydown", on_keydown)?,
        Listener::attach(input, "focus", on_focus)?,
        Listener::attach(input, "blur", on_blur)?,
        Listener::attach(root, "click", on_click)?,
    ])
}

// ----------------------------------------------------------------------------
// Tildechat Widget
// ----------------------------------------------------------------------------

/// A mounted chat widget. Call `unmount()` (or `free()`) to tear it down.
#[wasm_bindgen]
pub struct TildechatWidget {
    controller: ChatController<DomView>,
    listeners: Vec<Listener>,
}

#[wasm_bindgen]
impl TildechatWidget {
    /// Render the widget into `container` and start listening for messages
    pub fn mount(container: &Element, config: JsValue) -> Result<TildechatWidget, JsValue> {
        let config = WidgetConfig::from_js(config).map_err(to_js_error)?;
        let document = container
            .owner_document()
            .ok_or_else(|| to_js_error("container has no owner document"))?;

        let view = DomView::create(&document)?;
        let client = DataClient::new(
            Rc::new(FetchTransport::new(&config.client)),
            Rc::new(BrowserSocketTransport::new(&config.client)),
        );
        let controller = ChatController::new(client, view, config.chat);
        // The root joins the page only once it is fully wired.
        let listeners = attach_listeners(&controller)?;
        controller.view().attach(container)?;

        // Without a subscription the widget can still send; the failure is logged.
        if let Err(e) = controller.mount() {
            warn!("Widget mounted without live messages: {}", e);
        }
        info!("tildechat widget mounted");

        Ok(Self { controller, listeners })
    }

    /// Stop listening and remove the widget from the page. Idempotent.
    pub fn unmount(&mut self) {
        for listener in self.listeners.drain(..) {
            listener.detach();
        }
        if self.controller.is_mounted() {
            self.controller.unmount();
            self.controller.view().remove();
        }
    }

    #[wasm_bindgen(getter, js_name = isMounted)]
    pub fn is_mounted(&self) -> bool {
        self.controller.is_mounted()
    }

    /// Texts of the messages currently shown
    #[wasm_bindgen(getter)]
    pub fn messages(&self) -> js_sys::Array {
        self.controller
            .messages()
            .iter()
            .map(|message| JsValue::from_str(message.text()))
            .collect()
    }
}

impl Drop for TildechatWidget {
    fn drop(&mut self) {
        self.unmount();
    }
}

//! Chat view controller
//!
//! Owns the message store and the single live subscription of one mounted
//! widget, and reacts to the handful of DOM-ish events the widget produces:
//! key presses in the input, focus changes and clicks on the container.
//!
//! The controller never touches a real DOM. Hosts implement [`ChatView`] and
//! forward events; the browser host does it with `web-sys`, the terminal
//! host with stdin/stdout.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use futures::future::LocalBoxFuture;
use serde_json::{json, Value};
use tracing::{debug, error, info, warn};

use crate::client::{DataClient, Subscription};
use crate::config::ChatConfig;
use crate::errors::{ClientError, Result, SubscriptionError};
use crate::render::{render, RenderState, ViewTree};
use crate::store::{Message, MessageStore};
use crate::transport::SubscriptionEvent;

// ----------------------------------------------------------------------------
// View Seam
// ----------------------------------------------------------------------------

/// Scroll geometry of the message list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrollMetrics {
    pub scroll_height: i32,
    pub client_height: i32,
}

impl ScrollMetrics {
    /// `scrollTop` that shows the last line
    pub fn bottom(&self) -> i32 {
        (self.scroll_height - self.client_height).max(0)
    }
}

/// Everything the controller needs from the surface it drives
pub trait ChatView {
    /// Current text of the input
    fn input_value(&self) -> String;

    fn set_input_value(&self, value: &str);

    /// Move keyboard focus to the input
    fn focus_input(&self);

    /// Replace the rendered widget with `tree`
    fn apply(&self, tree: &ViewTree);

    /// Geometry of the list, or `None` when it is not attached
    fn scroll_metrics(&self) -> Option<ScrollMetrics>;

    fn set_scroll_top(&self, top: i32);
}

/// Key name of the submit key, as reported by `KeyboardEvent.key`
pub const SUBMIT_KEY: &str = "Enter";

// ----------------------------------------------------------------------------
// Controller State
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Unmounted,
    Mounted,
    /// Unmounted after being mounted; terminal
    Terminated,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionState {
    /// Not subscribed yet
    Idle,
    Live,
    /// The push channel failed; no reconnect is attempted
    Failed(SubscriptionError),
    /// Completed by the server or closed on unmount
    Closed,
}

struct Inner<V> {
    client: DataClient,
    view: V,
    config: ChatConfig,
    store: RefCell<MessageStore>,
    focused: Cell<bool>,
    lifecycle: Cell<Lifecycle>,
    subscription: RefCell<Option<Subscription>>,
    subscription_state: RefCell<SubscriptionState>,
}

/// Drives one chat widget.
///
/// Cloning is cheap and clones share state, so hosts can hand a clone to each
/// event listener.
pub struct ChatController<V: ChatView + 'static> {
    inner: Rc<Inner<V>>,
}

impl<V: ChatView + 'static> Clone for ChatController<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<V: ChatView + 'static> ChatController<V> {
    pub fn new(client: DataClient, view: V, config: ChatConfig) -> Self {
        let inner = Rc::new_cyclic(|weak: &Weak<Inner<V>>| {
            let mut store = MessageStore::new();
            let observer = weak.clone();
            store.observe(move |messages| {
                if let Some(inner) = observer.upgrade() {
                    inner.show(messages);
                }
            });

            Inner {
                client,
                view,
                config,
                store: RefCell::new(store),
                focused: Cell::new(false),
                lifecycle: Cell::new(Lifecycle::Unmounted),
                subscription: RefCell::new(None),
                subscription_state: RefCell::new(SubscriptionState::Idle),
            }
        });

        Self { inner }
    }

    // ------------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------------

    /// Render the empty widget, open the message subscription and request
    /// initial focus.
    ///
    /// A failed subscription leaves the widget mounted and usable for
    /// sending; the error is recorded and returned.
    pub fn mount(&self) -> Result<()> {
        let inner = &self.inner;
        if inner.lifecycle.get() != Lifecycle::Unmounted {
            return Err(ClientError::AlreadyMounted);
        }
        inner.lifecycle.set(Lifecycle::Mounted);
        inner.show(&[]);

        let events = Rc::downgrade(inner);
        let subscribed = inner
            .client
            .subscribe(&inner.config.subscription_document, move |event| {
                if let Some(inner) = events.upgrade() {
                    inner.on_subscription_event(event);
                }
            });

        let outcome = match subscribed {
            Ok(subscription) => {
                info!("Chat mounted, subscription {} live", subscription.id());
                *inner.subscription.borrow_mut() = Some(subscription);
                // A terminal event may already have arrived during subscribe.
                let mut state = inner.subscription_state.borrow_mut();
                if *state == SubscriptionState::Idle {
                    *state = SubscriptionState::Live;
                }
                Ok(())
            }
            Err(ClientError::Subscription(e)) => {
                error!("Unable to subscribe to messages: {}", e);
                *inner.subscription_state.borrow_mut() = SubscriptionState::Failed(e.clone());
                Err(ClientError::Subscription(e))
            }
            Err(e) => {
                error!("Unable to subscribe to messages: {}", e);
                Err(e)
            }
        };

        inner.request_focus();
        outcome
    }

    /// Close the subscription and drop all messages. Idempotent.
    pub fn unmount(&self) {
        let inner = &self.inner;
        if inner.lifecycle.replace(Lifecycle::Terminated) != Lifecycle::Mounted {
            return;
        }

        if let Some(subscription) = inner.subscription.borrow_mut().take() {
            subscription.unsubscribe();
        }
        *inner.subscription_state.borrow_mut() = SubscriptionState::Closed;
        // Swapping the store out drops the observer too; nothing renders
        // after this point.
        drop(inner.store.replace(MessageStore::new()));
        info!("Chat unmounted");
    }

    // ------------------------------------------------------------------------
    // Events
    // ------------------------------------------------------------------------

    /// Handle a key press in the input.
    ///
    /// Returns the in-flight mutation when `key` submits a non-empty line.
    /// The host drives it to completion on its local executor; mutations are
    /// independent of each other and may overlap.
    pub fn handle_keydown(&self, key: &str) -> Option<LocalBoxFuture<'static, ()>> {
        let inner = &self.inner;
        if key != SUBMIT_KEY || inner.lifecycle.get() != Lifecycle::Mounted {
            return None;
        }

        let text = inner.view.input_value();
        if text.is_empty() {
            return None;
        }
        // Captured before anything touches the input.
        let is_clear = inner.config.is_clear_command(&text);

        let inner = Rc::clone(inner);
        Some(Box::pin(async move {
            let sent = inner
                .client
                .mutate(&inner.config.mutation_document, json!({ "text": text }))
                .await;
            if let Err(e) = &sent {
                error!("Unable to send message: {}", e);
            }

            if inner.lifecycle.get() != Lifecycle::Mounted {
                debug!("Discarding mutation result after unmount");
                return;
            }

            inner.scroll_to_bottom();
            inner.view.set_input_value("");
            if is_clear {
                debug!("Clear command, emptying message list");
                inner.store.borrow_mut().clear();
            }
        }))
    }

    pub fn on_focus(&self) {
        self.inner.focused.set(true);
    }

    pub fn on_blur(&self) {
        self.inner.focused.set(false);
    }

    /// Clicking anywhere in the widget returns focus to the input
    pub fn on_click(&self) {
        if self.inner.lifecycle.get() == Lifecycle::Mounted {
            self.inner.request_focus();
        }
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    pub fn messages(&self) -> Vec<Message> {
        self.inner.store.borrow().messages().to_vec()
    }

    pub fn is_focused(&self) -> bool {
        self.inner.focused.get()
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.inner.lifecycle.get()
    }

    pub fn is_mounted(&self) -> bool {
        self.lifecycle() == Lifecycle::Mounted
    }

    pub fn subscription_state(&self) -> SubscriptionState {
        self.inner.subscription_state.borrow().clone()
    }

    pub fn view(&self) -> &V {
        &self.inner.view
    }
}

impl<V: ChatView + 'static> fmt::Debug for ChatController<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatController")
            .field("lifecycle", &self.inner.lifecycle.get())
            .field("focused", &self.inner.focused.get())
            .field("subscription_state", &*self.inner.subscription_state.borrow())
            .finish_non_exhaustive()
    }
}

impl<V: ChatView> Inner<V> {
    fn show(&self, messages: &[Message]) {
        let tree = render(&RenderState {
            messages,
            focused: self.focused.get(),
        });
        self.view.apply(&tree);
        self.scroll_to_bottom();
    }

    fn scroll_to_bottom(&self) {
        if let Some(metrics) = self.view.scroll_metrics() {
            self.view.set_scroll_top(metrics.bottom());
        }
    }

    fn request_focus(&self) {
        if !self.focused.get() {
            self.view.focus_input();
        }
    }

    fn on_subscription_event(&self, event: SubscriptionEvent) {
        if self.lifecycle.get() != Lifecycle::Mounted {
            return;
        }

        match event {
            SubscriptionEvent::Next(response) => {
                if !response.errors.is_empty() {
                    warn!("Subscription payload carried errors: {:?}", response.error_messages());
                }
                match response.data.as_ref().and_then(message_text) {
                    Some(text) => self.store.borrow_mut().append(text),
                    None => debug!("Ignoring subscription payload without messages.text"),
                }
            }
            SubscriptionEvent::Error(e) => {
                error!("Message subscription failed: {}", e);
                *self.subscription_state.borrow_mut() = SubscriptionState::Failed(e);
            }
            SubscriptionEvent::Complete => {
                info!("Message subscription completed by server");
                *self.subscription_state.borrow_mut() = SubscriptionState::Closed;
            }
        }
    }
}

/// `messages.text` of a subscription payload
fn message_text(data: &Value) -> Option<String> {
    data.pointer("/messages/text")
        .and_then(Value::as_str)
        .map(str::to_string)
}

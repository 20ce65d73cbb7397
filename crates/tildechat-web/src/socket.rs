//! `graphql-transport-ws` push transport over the browser `WebSocket`
//!
//! Mirrors the native transport: the shared [`PushSession`] owns the
//! protocol, and socket callbacks only feed it and carry out its output.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use tildechat_core::{
    dispatch_all, ClientConfig, EventSink, GraphQlRequest, PushSession, PushTransport, SessionOutput,
    SessionPhase, SubscriptionError,
};
use tracing::{debug, error, trace, warn};
use wasm_bindgen::closure::Closure;
use wasm_bindgen::JsCast;
use web_sys::{CloseEvent, Event, MessageEvent, WebSocket};

use crate::utils::describe_js_error;

/// One open (or opening) socket and the callbacks keeping it alive
struct Socket {
    generation: u64,
    ws: WebSocket,
    _on_open: Closure<dyn FnMut(Event)>,
    _on_message: Closure<dyn FnMut(MessageEvent)>,
    _on_close: Closure<dyn FnMut(CloseEvent)>,
    _on_error: Closure<dyn FnMut(Event)>,
    ack_timer: Option<AckTimer>,
}

struct AckTimer {
    handle: i32,
    _callback: Closure<dyn FnMut()>,
}

impl Socket {
    fn shutdown(mut self) {
        self.ws.set_onopen(None);
        self.ws.set_onmessage(None);
        self.ws.set_onclose(None);
        self.ws.set_onerror(None);
        self.cancel_ack_timer();
        if let Err(e) = self.ws.close() {
            warn!("Closing push socket failed: {}", describe_js_error(&e));
        }
    }

    fn cancel_ack_timer(&mut self) {
        if let Some(timer) = self.ack_timer.take() {
            if let Some(window) = web_sys::window() {
                window.clear_timeout_with_handle(timer.handle);
            }
        }
    }
}

struct Shared {
    endpoint: String,
    protocol: String,
    ack_timeout_ms: u64,
    session: RefCell<PushSession>,
    socket: RefCell<Option<Socket>>,
    generation: Cell<u64>,
}

/// Browser WebSocket push transport
pub struct BrowserSocketTransport {
    shared: Rc<Shared>,
}

impl BrowserSocketTransport {
    pub fn new(config: &ClientConfig) -> Self {
        Self {
            shared: Rc::new(Shared {
                endpoint: config.ws_endpoint.clone(),
                protocol: config.ws_protocol.clone(),
                ack_timeout_ms: config.connection_ack_timeout_ms,
                session: RefCell::new(PushSession::new(config.connection_params.clone())),
                socket: RefCell::new(None),
                generation: Cell::new(0),
            }),
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.shared.session.borrow().phase()
    }
}

impl PushTransport for BrowserSocketTransport {
    fn open(&self, id: &str, request: GraphQlRequest, sink: EventSink) -> Result<(), SubscriptionError> {
        let output = self.shared.session.borrow_mut().subscribe(id, request, sink)?;
        apply(&self.shared, output);
        Ok(())
    }

    fn close(&self, id: &str) {
        let output = self.shared.session.borrow_mut().complete(id);
        apply(&self.shared, output);
    }
}

impl Drop for BrowserSocketTransport {
    fn drop(&mut self) {
        if let Some(socket) = self.shared.socket.borrow_mut().take() {
            socket.shutdown();
        }
    }
}

// ----------------------------------------------------------------------------
// Session Driver
// ----------------------------------------------------------------------------

fn apply(shared: &Rc<Shared>, output: SessionOutput) {
    if output.connect {
        connect(shared);
    }

    if !output.send.is_empty() {
        let socket = shared.socket.borrow();
        for message in &output.send {
            let text = match message.encode() {
                Ok(text) => text,
                Err(e) => {
                    error!("Dropping push frame: {}", e);
                    continue;
                }
            };
            match socket.as_ref() {
                Some(socket) => {
                    trace!("Push frame sent: {}", text);
                    if let Err(e) = socket.ws.send_with_str(&text) {
                        warn!("Push send failed: {}", describe_js_error(&e));
                    }
                }
                None => warn!("No push socket for outgoing frame"),
            }
        }
    }

    if output.disconnect {
        let socket = shared.socket.borrow_mut().take();
        if let Some(socket) = socket {
            debug!("Closing push socket {}", socket.generation);
            socket.shutdown();
        }
    }

    dispatch_all(output.deliveries);
}

fn connect(shared: &Rc<Shared>) {
    let generation = shared.generation.get() + 1;
    shared.generation.set(generation);
    debug!("Connecting to {} (socket {})", shared.endpoint, generation);

    let ws = match WebSocket::new_with_str(&shared.endpoint, &shared.protocol) {
        Ok(ws) => ws,
        Err(e) => {
            // The session already expects a connection; fail it right away.
            let reason = describe_js_error(&e);
            error!("Unable to open push socket: {}", reason);
            let output = shared
                .session
                .borrow_mut()
                .connection_closed(SubscriptionError::Transport { reason });
            apply(shared, output);
            return;
        }
    };

    let weak = Rc::downgrade(shared);
    let on_open = Closure::<dyn FnMut(Event)>::new({
        let weak = weak.clone();
        move |_event: Event| {
            feed(&weak, generation, |session| session.connection_opened());
            start_ack_timer(&weak, generation);
        }
    });

    let on_message = Closure::<dyn FnMut(MessageEvent)>::new({
        let weak = weak.clone();
        move |event: MessageEvent| match event.data().as_string() {
            Some(text) => {
                feed(&weak, generation, |session| session.receive(&text));
                stop_ack_timer_once_ready(&weak, generation);
            }
            None => trace!("Ignoring non-text push frame"),
        }
    });

    let on_close = Closure::<dyn FnMut(CloseEvent)>::new({
        let weak = weak.clone();
        move |event: CloseEvent| {
            let reason = format!("closed ({}): {}", event.code(), event.reason());
            connection_lost(&weak, generation, SubscriptionError::closed(reason));
        }
    });

    let on_error = Closure::<dyn FnMut(Event)>::new(move |_event: Event| {
        // A close event always follows.
        warn!("Push socket {} reported an error", generation);
    });

    ws.set_onopen(Some(on_open.as_ref().unchecked_ref()));
    ws.set_onmessage(Some(on_message.as_ref().unchecked_ref()));
    ws.set_onclose(Some(on_close.as_ref().unchecked_ref()));
    ws.set_onerror(Some(on_error.as_ref().unchecked_ref()));

    *shared.socket.borrow_mut() = Some(Socket {
        generation,
        ws,
        _on_open: on_open,
        _on_message: on_message,
        _on_close: on_close,
        _on_error: on_error,
        ack_timer: None,
    });
}

fn is_current(shared: &Rc<Shared>, generation: u64) -> bool {
    shared
        .socket
        .borrow()
        .as_ref()
        .map_or(false, |socket| socket.generation == generation)
}

fn feed<F>(shared: &Weak<Shared>, generation: u64, step: F)
where
    F: FnOnce(&mut PushSession) -> SessionOutput,
{
    let Some(shared) = shared.upgrade() else {
        return;
    };
    if !is_current(&shared, generation) {
        return;
    }
    let output = step(&mut shared.session.borrow_mut());
    apply(&shared, output);
}

fn connection_lost(shared: &Weak<Shared>, generation: u64, error: SubscriptionError) {
    let Some(shared) = shared.upgrade() else {
        return;
    };
    if !is_current(&shared, generation) {
        return;
    }

    let socket = shared.socket.borrow_mut().take();
    if let Some(socket) = socket {
        socket.shutdown();
    }
    let output = shared.session.borrow_mut().connection_closed(error);
    apply(&shared, output);
}

// ----------------------------------------------------------------------------
// Acknowledgement Timer
// ----------------------------------------------------------------------------

fn start_ack_timer(weak: &Weak<Shared>, generation: u64) {
    let Some(shared) = weak.upgrade() else {
        return;
    };
    let Some(window) = web_sys::window() else {
        return;
    };
    let timeout_ms = shared.ack_timeout_ms;

    let callback = Closure::<dyn FnMut()>::new({
        let weak = weak.clone();
        move || {
            warn!("No connection_ack within {}ms", timeout_ms);
            feed(&weak, generation, |session| session.ack_timed_out(timeout_ms));
        }
    });

    let handle = match window.set_timeout_with_callback_and_timeout_and_arguments_0(
        callback.as_ref().unchecked_ref(),
        timeout_ms.min(i32::MAX as u64) as i32,
    ) {
        Ok(handle) => handle,
        Err(e) => {
            warn!("Unable to arm ack timer: {}", describe_js_error(&e));
            return;
        }
    };

    let mut socket = shared.socket.borrow_mut();
    match socket.as_mut() {
        Some(socket) if socket.generation == generation => {
            socket.ack_timer = Some(AckTimer {
                handle,
                _callback: callback,
            });
        }
        _ => window.clear_timeout_with_handle(handle),
    }
}

fn stop_ack_timer_once_ready(weak: &Weak<Shared>, generation: u64) {
    let Some(shared) = weak.upgrade() else {
        return;
    };
    if shared.session.borrow().phase() != SessionPhase::Ready {
        return;
    }
    let mut socket = shared.socket.borrow_mut();
    if let Some(socket) = socket.as_mut().filter(|s| s.generation == generation) {
        socket.cancel_ack_timer();
    }
}

//! `graphql-transport-ws` push transport over `tokio-tungstenite`
//!
//! One connection task per socket multiplexes every subscription by id. The
//! protocol itself lives in [`PushSession`]; this module only moves frames
//! between the session and the socket.
//!
//! Callbacks are not `Send`, so the transport spawns with
//! `tokio::task::spawn_local` and must be used inside a `LocalSet`.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use std::time::Duration;

use futures::channel::mpsc;
use futures::{SinkExt, StreamExt};
use tildechat_core::{
    dispatch_all, ClientConfig, EventSink, GraphQlRequest, PushSession, PushTransport, SessionOutput,
    SessionPhase, SubscriptionError,
};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, trace, warn};

enum Command {
    Send(String),
    Close,
}

struct Connection {
    generation: u64,
    commands: mpsc::UnboundedSender<Command>,
}

struct Shared {
    endpoint: String,
    protocol: String,
    ack_timeout: Duration,
    session: RefCell<PushSession>,
    connection: RefCell<Option<Connection>>,
    generation: Cell<u64>,
}

/// WebSocket push transport
pub struct WsTransport {
    shared: Rc<Shared>,
}

impl WsTransport {
    pub fn new(config: &ClientConfig) -> Self {
        Self {
            shared: Rc::new(Shared {
                endpoint: config.ws_endpoint.clone(),
                protocol: config.ws_protocol.clone(),
                ack_timeout: Duration::from_millis(config.connection_ack_timeout_ms),
                session: RefCell::new(PushSession::new(config.connection_params.clone())),
                connection: RefCell::new(None),
                generation: Cell::new(0),
            }),
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.shared.session.borrow().phase()
    }

    pub fn active_subscriptions(&self) -> usize {
        self.shared.session.borrow().active_subscriptions()
    }
}

impl PushTransport for WsTransport {
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

impl Drop for WsTransport {
    fn drop(&mut self) {
        if let Some(connection) = self.shared.connection.borrow_mut().take() {
            let _ = connection.commands.unbounded_send(Command::Close);
        }
    }
}

// ----------------------------------------------------------------------------
// Session Driver
// ----------------------------------------------------------------------------

/// Carry out what the session asked for. Never called with the session
/// borrowed, since deliveries may re-enter the transport.
fn apply(shared: &Rc<Shared>, output: SessionOutput) {
    if output.connect {
        connect(shared);
    }

    if !output.send.is_empty() {
        let connection = shared.connection.borrow();
        for message in &output.send {
            let text = match message.encode() {
                Ok(text) => text,
                Err(e) => {
                    error!("Dropping push frame: {}", e);
                    continue;
                }
            };
            match connection.as_ref() {
                Some(connection) => {
                    let _ = connection.commands.unbounded_send(Command::Send(text));
                }
                None => warn!("No push connection for outgoing frame"),
            }
        }
    }

    if output.disconnect {
        if let Some(connection) = shared.connection.borrow_mut().take() {
            let _ = connection.commands.unbounded_send(Command::Close);
        }
    }

    dispatch_all(output.deliveries);
}

fn connect(shared: &Rc<Shared>) {
    let generation = shared.generation.get() + 1;
    shared.generation.set(generation);

    let (commands, receiver) = mpsc::unbounded();
    *shared.connection.borrow_mut() = Some(Connection { generation, commands });

    debug!("Connecting to {} (connection {})", shared.endpoint, generation);
    tokio::task::spawn_local(run_connection(Rc::downgrade(shared), generation, receiver));
}

/// Tear down bookkeeping for a connection that ended on its own
fn connection_lost(shared: &Weak<Shared>, generation: u64, error: SubscriptionError) {
    let Some(shared) = shared.upgrade() else {
        return;
    };

    if !is_current(&shared, generation) {
        trace!("Connection {} ended after being replaced", generation);
        return;
    }

    *shared.connection.borrow_mut() = None;
    let output = shared.session.borrow_mut().connection_closed(error);
    apply(&shared, output);
}

fn is_current(shared: &Rc<Shared>, generation: u64) -> bool {
    shared
        .connection
        .borrow()
        .as_ref()
        .map_or(false, |connection| connection.generation == generation)
}

/// Feed the session on behalf of one connection. Signals from a connection
/// that has since been closed or replaced are dropped.
fn feed<F>(shared: &Weak<Shared>, generation: u64, step: F)
where
    F: FnOnce(&mut PushSession) -> SessionOutput,
{
    let Some(shared) = shared.upgrade() else {
        return;
    };
    if !is_current(&shared, generation) {
        trace!("Ignoring signal from stale connection {}", generation);
        return;
    }
    let output = step(&mut shared.session.borrow_mut());
    apply(&shared, output);
}

fn still_connecting(shared: &Weak<Shared>) -> bool {
    match shared.upgrade() {
        Some(shared) => {
            let phase = shared.session.borrow().phase();
            phase == SessionPhase::Connecting
        }
        None => false,
    }
}

// ----------------------------------------------------------------------------
// Connection Task
// ----------------------------------------------------------------------------

async fn run_connection(
    shared: Weak<Shared>,
    generation: u64,
    mut commands: mpsc::UnboundedReceiver<Command>,
) {
    let Some((endpoint, protocol, ack_timeout)) = shared
        .upgrade()
        .map(|s| (s.endpoint.clone(), s.protocol.clone(), s.ack_timeout))
    else {
        return;
    };
    let timeout_ms = ack_timeout.as_millis() as u64;

    let mut request = match endpoint.as_str().into_client_request() {
        Ok(request) => request,
        Err(e) => {
            connection_lost(&shared, generation, SubscriptionError::Transport { reason: e.to_string() });
            return;
        }
    };
    match HeaderValue::from_str(&protocol) {
        Ok(value) => {
            request.headers_mut().insert("Sec-WebSocket-Protocol", value);
        }
        Err(e) => {
            connection_lost(&shared, generation, SubscriptionError::Transport { reason: e.to_string() });
            return;
        }
    }

    let stream = match tokio::time::timeout(ack_timeout, tokio_tungstenite::connect_async(request)).await {
        Ok(Ok((stream, _response))) => stream,
        Ok(Err(e)) => {
            warn!("Push connection to {} failed: {}", endpoint, e);
            connection_lost(&shared, generation, SubscriptionError::closed(e.to_string()));
            return;
        }
        Err(_) => {
            warn!("Push connection to {} timed out", endpoint);
            connection_lost(
                &shared,
                generation,
                SubscriptionError::ConnectionTimeout { duration_ms: timeout_ms },
            );
            return;
        }
    };

    debug!("Push connection {} open", generation);
    let (mut write, mut read) = stream.split();
    feed(&shared, generation, |session| session.connection_opened());

    let ack_deadline = tokio::time::sleep(ack_timeout);
    tokio::pin!(ack_deadline);
    let mut awaiting_ack = true;

    let reason = loop {
        tokio::select! {
            command = commands.next() => match command {
                Some(Command::Send(text)) => {
                    trace!("Push frame sent: {}", text);
                    if let Err(e) = write.send(Message::Text(text)).await {
                        break format!("write failed: {}", e);
                    }
                }
                Some(Command::Close) | None => {
                    debug!("Closing push connection {}", generation);
                    let _ = write.send(Message::Close(None)).await;
                    return;
                }
            },
            frame = read.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    feed(&shared, generation, |session| session.receive(&text));
                    if awaiting_ack {
                        awaiting_ack = still_connecting(&shared);
                    }
                }
                Some(Ok(Message::Close(frame))) => {
                    break frame
                        .map(|f| format!("closed by server ({}): {}", u16::from(f.code), f.reason))
                        .unwrap_or_else(|| "closed by server".to_string());
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => break e.to_string(),
                None => break "connection reset".to_string(),
            },
            _ = &mut ack_deadline, if awaiting_ack => {
                awaiting_ack = false;
                warn!("No connection_ack within {}ms", timeout_ms);
                feed(&shared, generation, |session| session.ack_timed_out(timeout_ms));
            }
        }
    };

    debug!("Push connection {} lost: {}", generation, reason);
    connection_lost(&shared, generation, SubscriptionError::closed(reason));
}

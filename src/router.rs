//! Router — one connection, one handler table.
//!
//! ARCHITECTURE
//! ============
//! The router owns the write side of a single [`Transport`] and a table
//! mapping command names to handlers. The transport reports what happens on
//! the socket as [`TransportEvent`]s; the host loop feeds each event to
//! [`Router::handle_event`], which advances the connection state and
//! dispatches inbound frames.
//!
//! DESIGN
//! ======
//! - Everything runs on one task. Handlers are plain `FnMut` closures and
//!   may hold `Rc` state.
//! - A handler receives the payload and an [`Outbox`] bound to the router's
//!   transport, so it can reply from inside dispatch under the same
//!   `Connected` rule as [`Router::send`].
//! - Unknown commands are dropped without error, so the server can add
//!   message types without breaking older clients.
//! - Malformed frames are logged and dropped; one bad frame never takes the
//!   router down.
//! - Sending outside `Connected` fails with [`RouterError::NotConnected`]
//!   instead of writing into a socket that is not there.
//! - `Closed` is terminal. There is no reconnect.

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use frames::Frame;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::config::DEFAULT_CREDENTIAL_NAME;
use crate::credentials::CredentialSource;
use crate::state::ConnectionState;
use crate::transport::{Events, Transport, TransportError, TransportEvent, WsTransport};
use crate::view::View;

/// Command sent once on open when a handshake is configured.
pub const AUTH_HELLO: &str = "auth.hello";

/// Callback invoked with a frame's positional payload.
pub type Handler = Box<dyn FnMut(&[Value], &mut Outbox<'_>)>;

/// Callback invoked once when the connection closes, with the reason if any.
pub type DisconnectHandler = Box<dyn FnMut(Option<&str>)>;

#[derive(Debug, thiserror::Error)]
pub enum RouterError {
    /// `send` was called outside the `Connected` state.
    #[error("not connected (connection is {0})")]
    NotConnected(ConnectionState),
    /// The transport refused the write.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Parameters for the `auth.hello` frame sent on open.
pub struct Handshake {
    credential_name: String,
    credentials: Box<dyn CredentialSource>,
}

impl Handshake {
    /// Handshake reading the `sid` credential from `credentials`.
    #[must_use]
    pub fn new(credentials: impl CredentialSource + 'static) -> Self {
        Self {
            credential_name: DEFAULT_CREDENTIAL_NAME.to_owned(),
            credentials: Box::new(credentials),
        }
    }

    #[must_use]
    pub fn from_boxed(credentials: Box<dyn CredentialSource>) -> Self {
        Self {
            credential_name: DEFAULT_CREDENTIAL_NAME.to_owned(),
            credentials,
        }
    }

    #[must_use]
    pub fn with_credential_name(mut self, name: impl Into<String>) -> Self {
        self.credential_name = name.into();
        self
    }

    /// Payload of the hello frame: `({}, credential)`, with `null` when the
    /// credential is absent.
    fn payload(&self) -> [Value; 2] {
        let credential = self
            .credentials
            .credential(&self.credential_name)
            .map_or(Value::Null, Value::String);
        [Value::Object(Map::new()), credential]
    }
}

impl fmt::Debug for Handshake {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handshake")
            .field("credential_name", &self.credential_name)
            .finish_non_exhaustive()
    }
}

/// Send access handed to a handler while it runs.
pub struct Outbox<'a> {
    state: ConnectionState,
    transport: &'a mut dyn Transport,
}

impl Outbox<'_> {
    /// Same contract as [`Router::send`].
    ///
    /// # Errors
    ///
    /// Returns [`RouterError::NotConnected`] unless the connection is open,
    /// and [`RouterError::Transport`] if the transport is already gone.
    pub fn send(&mut self, command: &str, args: &[Value]) -> Result<(), RouterError> {
        send_frame(self.state, self.transport, command, args)
    }
}

fn send_frame(
    state: ConnectionState,
    transport: &mut dyn Transport,
    command: &str,
    args: &[Value],
) -> Result<(), RouterError> {
    if state != ConnectionState::Connected {
        return Err(RouterError::NotConnected(state));
    }

    let text = frames::encode_frame(command, args);
    debug!(command, bytes = text.len(), "send");
    transport.send_text(text)?;
    Ok(())
}

pub struct Router {
    state: ConnectionState,
    handlers: HashMap<String, Handler>,
    transport: Box<dyn Transport>,
    view: Rc<dyn View>,
    handshake: Option<Handshake>,
    on_disconnect: Option<DisconnectHandler>,
}

impl Router {
    /// Open a websocket to `url` and return the router with the event stream
    /// that drives it.
    ///
    /// Must be called from inside a tokio runtime.
    #[must_use]
    pub fn connect(
        url: &str,
        view: Rc<dyn View>,
        handshake: Option<Handshake>,
    ) -> (Self, Events) {
        let (transport, events) = WsTransport::connect(url);
        info!(%url, "connecting");
        (
            Self::with_transport(Box::new(transport), view, handshake),
            events,
        )
    }

    /// Build a router over an already-started transport.
    #[must_use]
    pub fn with_transport(
        transport: Box<dyn Transport>,
        view: Rc<dyn View>,
        handshake: Option<Handshake>,
    ) -> Self {
        view.set_connection_status("connecting...");
        Self {
            state: ConnectionState::Connecting,
            handlers: HashMap::new(),
            transport,
            view,
            handshake,
            on_disconnect: None,
        }
    }

    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Register `handler` for `command`, replacing any previous one.
    pub fn on<F>(&mut self, command: impl Into<String>, handler: F)
    where
        F: FnMut(&[Value], &mut Outbox<'_>) + 'static,
    {
        self.handlers.insert(command.into(), Box::new(handler));
    }

    #[must_use]
    pub fn has_handler(&self, command: &str) -> bool {
        self.handlers.contains_key(command)
    }

    /// Observe the transition to `Closed`.
    pub fn on_disconnect<F>(&mut self, handler: F)
    where
        F: FnMut(Option<&str>) + 'static,
    {
        self.on_disconnect = Some(Box::new(handler));
    }

    /// Encode `command` with `args` and write it to the transport.
    ///
    /// # Errors
    ///
    /// Returns [`RouterError::NotConnected`] unless the connection is open,
    /// and [`RouterError::Transport`] if the transport is already gone.
    pub fn send(&mut self, command: &str, args: &[Value]) -> Result<(), RouterError> {
        send_frame(self.state, self.transport.as_mut(), command, args)
    }

    /// Ask the transport to close. The router becomes `Closed` when the
    /// transport reports it.
    pub fn close(&mut self) {
        if !self.state.is_closed() {
            self.transport.close();
        }
    }

    /// Apply one transport event.
    pub fn handle_event(&mut self, event: TransportEvent) {
        if self.state.is_closed() {
            debug!(?event, "ignoring event after close");
            return;
        }

        match event {
            TransportEvent::Open => self.handle_open(),
            TransportEvent::Text(text) => self.handle_text(&text),
            TransportEvent::Binary(bytes) => {
                debug!(len = bytes.len(), "dropping binary message");
            }
            TransportEvent::Closed { reason } => self.handle_closed(reason.as_deref()),
        }
    }

    /// Process events until the connection is closed.
    pub async fn run(&mut self, events: &mut Events) {
        while !self.state.is_closed() {
            let event = events.recv().await.unwrap_or_else(|| TransportEvent::Closed {
                reason: Some("transport ended without closing".to_owned()),
            });
            self.handle_event(event);
        }
    }

    /// Invoke the handler registered for `frame`'s command, if any.
    pub fn dispatch(&mut self, frame: &Frame) {
        let command = frame.command();
        match self.handlers.get_mut(command) {
            Some(handler) => {
                debug!(command, args = frame.args().len(), "dispatch");
                let mut outbox = Outbox {
                    state: self.state,
                    transport: self.transport.as_mut(),
                };
                handler(frame.args(), &mut outbox);
            }
            None => debug!(command, "no handler; dropping frame"),
        }
    }

    fn handle_open(&mut self) {
        self.state = self.state.opened();
        self.view.set_connection_status("connected");
        info!("connected");

        let Some(handshake) = &self.handshake else {
            return;
        };
        let payload = handshake.payload();
        if let Err(error) = self.send(AUTH_HELLO, &payload) {
            warn!(%error, "handshake not sent");
        }
    }

    fn handle_text(&mut self, text: &str) {
        match frames::decode_frame(text) {
            Ok(frame) => self.dispatch(&frame),
            Err(error) => warn!(%error, "dropping frame"),
        }
    }

    fn handle_closed(&mut self, reason: Option<&str>) {
        self.state = self.state.closed();
        self.view.set_connection_status("disconnected");
        info!(reason = reason.unwrap_or(""), "disconnected");

        if let Some(handler) = self.on_disconnect.as_mut() {
            handler(reason);
        }
    }
}

#[cfg(test)]
#[path = "router_test.rs"]
mod tests;

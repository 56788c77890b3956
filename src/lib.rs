//! Client-side message router for the zenith websocket protocol.
//!
//! A [`Router`] keeps one websocket open, writes outgoing calls as
//! `[command, ...args]` JSON arrays, and hands each inbound array to the
//! handler registered under its command name. The pager module wires the
//! deployment's one feature on top.

pub mod config;
pub mod credentials;
pub mod pager;
pub mod router;
pub mod state;
pub mod transport;
pub mod view;

#[cfg(test)]
mod test_helpers;

pub use frames::{CodecError, Frame, decode_frame, encode_frame};
pub use router::{Handshake, Outbox, Router, RouterError};
pub use state::ConnectionState;
pub use transport::{Events, Transport, TransportError, TransportEvent, WsTransport};

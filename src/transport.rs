//! Websocket transport.
//!
//! DESIGN
//! ======
//! The socket lives in a spawned task. The router talks to it through two
//! unbounded channels: text frames go out on one, [`TransportEvent`]s come
//! back on the other. The task always finishes by emitting exactly one
//! [`TransportEvent::Closed`], whether the connect failed, the peer closed,
//! or the socket errored. Closes in either direction complete the close
//! handshake, bounded by [`CLOSE_TIMEOUT`].

use std::time::Duration;

use futures_util::stream::SplitStream;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, warn};

type Socket = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// How long a closing socket waits for the peer's side of the handshake.
pub const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Notification delivered from the transport to the router, in socket order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransportEvent {
    /// The socket handshake completed.
    Open,
    /// A text message arrived.
    Text(String),
    /// A binary message arrived. Not part of the protocol.
    Binary(Vec<u8>),
    /// The socket is gone. Always the last event.
    Closed { reason: Option<String> },
}

/// Receiving half of a transport's event stream.
pub type Events = mpsc::UnboundedReceiver<TransportEvent>;

/// Error returned by [`Transport::send_text`].
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The socket task has ended; nothing more can be written.
    #[error("transport closed")]
    Closed,
}

/// Write side of a single connection, owned by one router.
pub trait Transport {
    /// Queue one text frame for the peer.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Closed`] once the connection is gone.
    fn send_text(&mut self, text: String) -> Result<(), TransportError>;

    /// Begin an orderly close. Completion is reported as a `Closed` event.
    fn close(&mut self);
}

enum Outbound {
    Text(String),
    Close,
}

/// [`Transport`] over a tokio-tungstenite client socket.
pub struct WsTransport {
    outbound: mpsc::UnboundedSender<Outbound>,
    task: JoinHandle<()>,
}

impl WsTransport {
    /// Start connecting to `url` and return immediately.
    ///
    /// Must be called from inside a tokio runtime.
    #[must_use]
    pub fn connect(url: impl Into<String>) -> (Self, Events) {
        Self::with_close_timeout(url, CLOSE_TIMEOUT)
    }

    /// Like [`WsTransport::connect`], waiting at most `close_timeout` for the
    /// peer to finish a close handshake.
    #[must_use]
    pub fn with_close_timeout(url: impl Into<String>, close_timeout: Duration) -> (Self, Events) {
        let url = url.into();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run_socket(url, close_timeout, outbound_rx, events_tx));
        (
            Self {
                outbound: outbound_tx,
                task,
            },
            events_rx,
        )
    }
}

impl Transport for WsTransport {
    fn send_text(&mut self, text: String) -> Result<(), TransportError> {
        self.outbound
            .send(Outbound::Text(text))
            .map_err(|_| TransportError::Closed)
    }

    fn close(&mut self) {
        let _ = self.outbound.send(Outbound::Close);
    }
}

impl Drop for WsTransport {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn run_socket(
    url: String,
    close_timeout: Duration,
    mut outbound: mpsc::UnboundedReceiver<Outbound>,
    events: mpsc::UnboundedSender<TransportEvent>,
) {
    let reason = match connect_async(url.as_str()).await {
        Ok((socket, _)) => {
            info!(%url, "websocket open");
            let _ = events.send(TransportEvent::Open);
            pump(socket, close_timeout, &mut outbound, &events).await
        }
        Err(error) => {
            warn!(%url, %error, "websocket connect failed");
            Some(error.to_string())
        }
    };

    info!(%url, reason = reason.as_deref().unwrap_or(""), "websocket closed");
    let _ = events.send(TransportEvent::Closed { reason });
}

/// Relay frames both ways until the socket ends. Returns the close reason.
async fn pump(
    socket: Socket,
    close_timeout: Duration,
    outbound: &mut mpsc::UnboundedReceiver<Outbound>,
    events: &mpsc::UnboundedSender<TransportEvent>,
) -> Option<String> {
    let (mut write, mut read) = socket.split();

    loop {
        tokio::select! {
            next = outbound.recv() => match next {
                Some(Outbound::Text(text)) => {
                    if let Err(error) = write.send(Message::Text(text.into())).await {
                        warn!(%error, "websocket write failed");
                        return Some(error.to_string());
                    }
                }
                Some(Outbound::Close) | None => {
                    debug!("closing websocket");
                    if let Err(error) = write.send(Message::Close(None)).await {
                        return Some(error.to_string());
                    }
                    return match timeout(close_timeout, drain(&mut read, events)).await {
                        Ok(reason) => reason,
                        Err(_) => {
                            warn!("peer did not answer close");
                            Some("close handshake timed out".to_owned())
                        }
                    };
                }
            },
            incoming = read.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    let _ = events.send(TransportEvent::Text(text.as_str().to_owned()));
                }
                Some(Ok(Message::Binary(bytes))) => {
                    let _ = events.send(TransportEvent::Binary(bytes.to_vec()));
                }
                Some(Ok(Message::Close(frame))) => {
                    // tungstenite queues the close reply; it goes out on flush.
                    if let Err(error) = write.flush().await {
                        debug!(%error, "close reply not flushed");
                    }
                    let _ = timeout(close_timeout, drain(&mut read, events)).await;
                    return close_reason(frame);
                }
                Some(Ok(_)) => {}
                Some(Err(error)) => {
                    warn!(%error, "websocket read failed");
                    return Some(error.to_string());
                }
                None => return None,
            },
        }
    }
}

/// Read until the socket ends, forwarding data frames. Returns the peer's
/// close reason if a close frame arrives.
async fn drain(
    read: &mut SplitStream<Socket>,
    events: &mpsc::UnboundedSender<TransportEvent>,
) -> Option<String> {
    while let Some(incoming) = read.next().await {
        match incoming {
            Ok(Message::Text(text)) => {
                let _ = events.send(TransportEvent::Text(text.as_str().to_owned()));
            }
            Ok(Message::Binary(bytes)) => {
                let _ = events.send(TransportEvent::Binary(bytes.to_vec()));
            }
            Ok(Message::Close(frame)) => return close_reason(frame),
            Ok(_) => {}
            Err(_) => return None,
        }
    }
    None
}

fn close_reason(frame: Option<CloseFrame>) -> Option<String> {
    frame
        .map(|frame| frame.reason.as_str().to_owned())
        .filter(|reason| !reason.is_empty())
}

#[cfg(test)]
#[path = "transport_test.rs"]
mod tests;

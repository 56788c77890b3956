use std::rc::Rc;

use axum::extract::ws::{CloseFrame, Message as WsMessage, Utf8Bytes, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use axum::routing::get;
use serde_json::{Value, json};
use tokio::time::{Duration, timeout};

use super::*;
use crate::config::{ClientConfig, Profile};
use crate::credentials::CookieJar;
use crate::pager;
use crate::router::Router;
use crate::state::ConnectionState;
use crate::test_helpers::RecordingView;

/// Bind a pager server on an ephemeral port and return its websocket URL.
async fn spawn_pager_server() -> String {
    let app = axum::Router::new().route("/ws", get(upgrade));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve");
    });
    format!("ws://{addr}/ws")
}

async fn upgrade(ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(pager_session)
}

/// Server side of the pager protocol. Sessions that said `auth.hello`
/// receive `(username, text)`; anonymous ones receive `(text)`.
async fn pager_session(mut socket: WebSocket) {
    let mut username: Option<String> = None;

    while let Some(Ok(message)) = socket.recv().await {
        let WsMessage::Text(text) = message else {
            continue;
        };
        let Ok(frame) = frames::decode_frame(text.as_str()) else {
            continue;
        };

        match frame.command() {
            "auth.hello" => {
                let sid = frame.args().get(1).and_then(Value::as_str).unwrap_or("none");
                username = Some(format!("user-{sid}"));
            }
            "pager.send" => {
                let body = frame.args().get(1).cloned().unwrap_or(Value::Null);
                let reply = match &username {
                    Some(name) => frames::encode_frame("pager.message", &[json!(name), body]),
                    None => frames::encode_frame("pager.message", &[body]),
                };
                if socket.send(WsMessage::Text(reply.into())).await.is_err() {
                    return;
                }
            }
            "noise" => {
                let _ = socket.send(WsMessage::Text(Utf8Bytes::from_static("not json"))).await;
                let _ = socket.send(WsMessage::Binary(vec![1, 2, 3].into())).await;
            }
            "bye" => {
                let _ = socket
                    .send(WsMessage::Close(Some(CloseFrame {
                        code: 1000,
                        reason: Utf8Bytes::from_static("bye"),
                    })))
                    .await;
                return;
            }
            _ => {}
        }
    }
}

async fn next_event(events: &mut Events) -> TransportEvent {
    timeout(Duration::from_secs(5), events.recv())
        .await
        .expect("event timed out")
        .expect("event stream ended")
}

async fn pump_one(router: &mut Router, events: &mut Events) {
    let event = next_event(events).await;
    router.handle_event(event);
}

#[tokio::test]
async fn transport_reports_open_and_relays_text() {
    let url = spawn_pager_server().await;
    let (mut transport, mut events) = WsTransport::connect(url);

    assert_eq!(next_event(&mut events).await, TransportEvent::Open);

    transport
        .send_text(r#"["pager.send",{},"hi"]"#.to_owned())
        .expect("send");
    assert_eq!(
        next_event(&mut events).await,
        TransportEvent::Text(r#"["pager.message","hi"]"#.to_owned())
    );
}

#[tokio::test]
async fn connect_failure_emits_closed_with_reason() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("local addr");
    drop(listener);

    let (mut transport, mut events) = WsTransport::connect(format!("ws://{addr}/ws"));

    match next_event(&mut events).await {
        TransportEvent::Closed { reason } => assert!(reason.is_some()),
        other => panic!("expected Closed, got {other:?}"),
    }

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(matches!(
        transport.send_text("[\"x\"]".to_owned()),
        Err(TransportError::Closed)
    ));
}

#[tokio::test]
async fn hello_profile_round_trips_through_server() {
    let url = spawn_pager_server().await;
    let view = Rc::new(RecordingView::default());
    let config = ClientConfig {
        url,
        profile: Profile::HELLO,
        ..ClientConfig::default()
    };
    let credentials: Box<dyn crate::credentials::CredentialSource> =
        Box::new(CookieJar::parse("sid=42"));

    let (mut router, mut events) = pager::connect(&config, view.clone(), Some(credentials));
    pump_one(&mut router, &mut events).await;
    assert_eq!(router.state(), ConnectionState::Connected);

    pager::send_prompted(&mut router, || Some("hi".to_owned())).expect("send");
    pump_one(&mut router, &mut events).await;

    assert_eq!(view.last_pager().as_deref(), Some("user-42: hi"));
}

#[tokio::test]
async fn anonymous_profile_round_trips_through_server() {
    let url = spawn_pager_server().await;
    let view = Rc::new(RecordingView::default());
    let config = ClientConfig {
        url,
        profile: Profile::ANONYMOUS,
        ..ClientConfig::default()
    };

    let (mut router, mut events) = pager::connect(&config, view.clone(), None);
    pump_one(&mut router, &mut events).await;

    pager::send_prompted(&mut router, || Some("hi".to_owned())).expect("send");
    pump_one(&mut router, &mut events).await;

    assert_eq!(view.last_pager().as_deref(), Some("hi"));
}

#[tokio::test]
async fn junk_from_server_does_not_stop_router() {
    let url = spawn_pager_server().await;
    let view = Rc::new(RecordingView::default());
    let config = ClientConfig {
        url,
        profile: Profile::ANONYMOUS,
        ..ClientConfig::default()
    };

    let (mut router, mut events) = pager::connect(&config, view.clone(), None);
    pump_one(&mut router, &mut events).await;

    router.send("noise", &[]).expect("send");
    pump_one(&mut router, &mut events).await;
    pump_one(&mut router, &mut events).await;
    assert_eq!(router.state(), ConnectionState::Connected);

    pager::send_prompted(&mut router, || Some("still here".to_owned())).expect("send");
    pump_one(&mut router, &mut events).await;
    assert_eq!(view.last_pager().as_deref(), Some("still here"));
}

#[tokio::test]
async fn server_close_reaches_disconnect_handler() {
    let url = spawn_pager_server().await;
    let view = Rc::new(RecordingView::default());
    let (mut router, mut events) = Router::connect(&url, view.clone(), None);
    let reason = Rc::new(std::cell::RefCell::new(None));
    let sink = Rc::clone(&reason);
    router.on_disconnect(move |r| *sink.borrow_mut() = Some(r.map(ToOwned::to_owned)));

    pump_one(&mut router, &mut events).await;
    router.send("bye", &[]).expect("send");
    timeout(Duration::from_secs(5), router.run(&mut events))
        .await
        .expect("close timed out");

    assert_eq!(router.state(), ConnectionState::Closed);
    assert_eq!(*reason.borrow(), Some(Some("bye".to_owned())));
    assert_eq!(view.last_status().as_deref(), Some("disconnected"));
}

#[tokio::test]
async fn client_close_ends_in_closed_state() {
    let url = spawn_pager_server().await;
    let view = Rc::new(RecordingView::default());
    let (mut router, mut events) = Router::connect(&url, view, None);

    pump_one(&mut router, &mut events).await;
    router.close();
    timeout(Duration::from_secs(5), router.run(&mut events))
        .await
        .expect("close timed out");

    assert_eq!(router.state(), ConnectionState::Closed);
    assert!(matches!(
        router.send("pager.send", &[]),
        Err(crate::router::RouterError::NotConnected(ConnectionState::Closed))
    ));
}

/// Accept one raw tungstenite session on an ephemeral port and hand it to
/// `session`, returning the websocket URL and the session's result.
async fn spawn_raw_server<F, Fut, T>(session: F) -> (String, tokio::task::JoinHandle<T>)
where
    F: FnOnce(WebSocketStream<tokio::net::TcpStream>) -> Fut + Send + 'static,
    Fut: std::future::Future<Output = T> + Send,
    T: Send + 'static,
{
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("local addr");
    let handle = tokio::spawn(async move {
        let (tcp, _) = listener.accept().await.expect("accept");
        let ws = tokio_tungstenite::accept_async(tcp)
            .await
            .expect("server handshake");
        session(ws).await
    });
    (format!("ws://{addr}/ws"), handle)
}

#[tokio::test]
async fn server_close_is_answered_with_close_reply() {
    let (url, server) = spawn_raw_server(|mut ws| async move {
        use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;

        ws.send(Message::Close(Some(tokio_tungstenite::tungstenite::protocol::CloseFrame {
            code: CloseCode::Normal,
            reason: "bye".into(),
        })))
        .await
        .expect("send close");
        timeout(Duration::from_secs(2), ws.next())
            .await
            .expect("close reply timed out")
    })
    .await;

    let view = Rc::new(RecordingView::default());
    let (mut router, mut events) = Router::connect(&url, view, None);
    timeout(Duration::from_secs(5), router.run(&mut events))
        .await
        .expect("close timed out");
    assert_eq!(router.state(), ConnectionState::Closed);

    let reply = server.await.expect("server task");
    assert!(
        matches!(reply, Some(Ok(Message::Close(_))) | None),
        "server saw {reply:?} instead of a close reply"
    );
}

#[tokio::test]
async fn client_close_gives_up_on_silent_peer() {
    let (url, _server) = spawn_raw_server(|ws| async move {
        // Hold the socket open without ever reading the close frame.
        tokio::time::sleep(Duration::from_secs(30)).await;
        drop(ws);
    })
    .await;

    let (transport, mut events) = WsTransport::with_close_timeout(url, Duration::from_millis(200));
    let view = Rc::new(RecordingView::default());
    let mut router = Router::with_transport(Box::new(transport), view, None);
    let reason = Rc::new(std::cell::RefCell::new(None));
    let sink = Rc::clone(&reason);
    router.on_disconnect(move |r| *sink.borrow_mut() = r.map(ToOwned::to_owned));

    pump_one(&mut router, &mut events).await;
    assert_eq!(router.state(), ConnectionState::Connected);

    router.close();
    timeout(Duration::from_secs(3), router.run(&mut events))
        .await
        .expect("close should not wait for a silent peer");

    assert_eq!(router.state(), ConnectionState::Closed);
    assert_eq!(reason.borrow().as_deref(), Some("close handshake timed out"));
}

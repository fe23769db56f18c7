//! End-to-end checks against a local websocket server.

use std::sync::{Arc, Mutex};

use futures_util::{SinkExt, StreamExt};
use stomp_notify::{CancellationToken, Command, ConnectionParams, SessionState, StompClient};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::{Duration, timeout};
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};

const WAIT: Duration = Duration::from_secs(5);

struct Upgrade {
    path: String,
    authorization: Option<String>,
}

async fn bind() -> (TcpListener, u16) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let port = listener.local_addr().expect("addr").port();
    (listener, port)
}

async fn accept_one(listener: &TcpListener) -> (WebSocketStream<TcpStream>, Upgrade) {
    let (tcp, _) = listener.accept().await.expect("accept");
    let captured = Arc::new(Mutex::new(None));
    let slot = Arc::clone(&captured);

    let ws = tokio_tungstenite::accept_hdr_async(tcp, move |req: &Request, resp: Response| {
        let upgrade = Upgrade {
            path: req.uri().path().to_owned(),
            authorization: req
                .headers()
                .get("authorization")
                .and_then(|v| v.to_str().ok())
                .map(ToOwned::to_owned),
        };
        *slot.lock().expect("upgrade slot") = Some(upgrade);
        Ok::<_, ErrorResponse>(resp)
    })
    .await
    .expect("websocket handshake");

    let upgrade = captured.lock().expect("upgrade slot").take().expect("upgrade captured");
    (ws, upgrade)
}

async fn next_text(ws: &mut WebSocketStream<TcpStream>) -> String {
    loop {
        let msg = timeout(WAIT, ws.next())
            .await
            .expect("frame before timeout")
            .expect("stream open")
            .expect("websocket read");
        if let Message::Text(text) = msg {
            return text.as_str().to_owned();
        }
    }
}

async fn close_and_drain(ws: &mut WebSocketStream<TcpStream>) {
    let _ = ws.close(None).await;
    while let Some(Ok(_)) = ws.next().await {}
}

fn message(body: &str) -> Message {
    Message::text(format!(
        "MESSAGE\ndestination:/user/queue/alert\nsubscription:MyuniqueId\nmessage-id:{body}\n\n{body}\0"
    ))
}

#[tokio::test]
async fn delivers_frames_until_server_closes() {
    let (listener, port) = bind().await;

    let server = tokio::spawn(async move {
        let (mut ws, upgrade) = accept_one(&listener).await;
        let connect = next_text(&mut ws).await;
        let subscribe = next_text(&mut ws).await;

        ws.send(Message::text("CONNECTED\nversion:1.2\nheart-beat:0,0\n\n\0"))
            .await
            .expect("send connected");
        ws.send(message("first")).await.expect("send first");
        ws.send(Message::text("this is not a frame")).await.expect("send garbage");
        ws.send(message("second")).await.expect("send second");
        close_and_drain(&mut ws).await;

        (upgrade, connect, subscribe)
    });

    let client = StompClient::new(ConnectionParams::new("jwt-abc", "127.0.0.1", port));
    let queue = client.notifications();

    let summary = timeout(WAIT, client.start())
        .await
        .expect("start returns after close")
        .expect("closed session is not an error");
    assert_eq!(summary.state, SessionState::Closed);
    assert_eq!(summary.enqueued, 3);
    assert_eq!(summary.dropped, 1);

    let (upgrade, connect, subscribe) = server.await.expect("server task");
    assert_eq!(upgrade.path, "/notifications/websocket");
    assert_eq!(upgrade.authorization.as_deref(), Some("Bearer jwt-abc"));
    assert_eq!(connect, "CONNECT\naccept-version:1.0,1.1,2.0\n\n\0");
    assert_eq!(
        subscribe,
        "SUBSCRIBE\ndestination:/user/queue/alert\nid:MyuniqueId\nack:auto\n\n\0"
    );

    let connected = queue.try_get().expect("connected frame");
    assert_eq!(connected.command, Command::Connected);
    assert_eq!(connected.header("version"), Some("1.2"));

    let first = queue.try_get().expect("first message");
    assert_eq!(first.command, Command::Message);
    assert_eq!(first.header("destination"), Some("/user/queue/alert"));
    assert_eq!(first.body, "first");

    assert_eq!(queue.try_get().expect("second message").body, "second");
    assert!(queue.try_get().is_none());
}

#[tokio::test]
async fn cancel_sends_close_and_returns() {
    let (listener, port) = bind().await;

    let server = tokio::spawn(async move {
        let (mut ws, _) = accept_one(&listener).await;
        next_text(&mut ws).await;
        next_text(&mut ws).await;
        ws.send(message("live")).await.expect("send");

        loop {
            match timeout(WAIT, ws.next()).await {
                Ok(Some(Ok(Message::Close(_)))) => return true,
                Ok(Some(Ok(_))) => {}
                _ => return false,
            }
        }
    });

    let client = StompClient::new(ConnectionParams::new("jwt", "127.0.0.1", port));
    let queue = client.notifications();
    let cancel = CancellationToken::new();
    let run = tokio::spawn({
        let cancel = cancel.clone();
        async move { client.start_with_cancel(cancel).await }
    });

    let delivered = queue.get(Some(WAIT)).await.expect("message before cancel");
    assert_eq!(delivered.body, "live");

    cancel.cancel();
    let summary = timeout(WAIT, run)
        .await
        .expect("start returns after cancel")
        .expect("client task")
        .expect("cancelled session is not an error");
    assert_eq!(summary.state, SessionState::Closed);
    assert!(server.await.expect("server task"), "server should see a close frame");
}

#[tokio::test]
async fn queue_survives_restarting_the_client() {
    let (listener, port) = bind().await;

    let server = tokio::spawn(async move {
        for body in ["from-first-connection", "from-second-connection"] {
            let (mut ws, _) = accept_one(&listener).await;
            next_text(&mut ws).await;
            next_text(&mut ws).await;
            ws.send(message(body)).await.expect("send");
            close_and_drain(&mut ws).await;
        }
    });

    let client = StompClient::new(ConnectionParams::new("jwt", "127.0.0.1", port));
    let queue = client.notifications();

    for _ in 0..2 {
        let summary = timeout(WAIT, client.start())
            .await
            .expect("start returns")
            .expect("session");
        assert_eq!(summary.enqueued, 1);
    }
    server.await.expect("server task");

    assert_eq!(queue.try_get().expect("first").body, "from-first-connection");
    assert_eq!(queue.try_get().expect("second").body, "from-second-connection");
}

#[tokio::test]
async fn server_close_gets_a_clean_close_reply() {
    let (listener, port) = bind().await;

    let server = tokio::spawn(async move {
        let (mut ws, _) = accept_one(&listener).await;
        next_text(&mut ws).await;
        next_text(&mut ws).await;
        ws.send(Message::Close(None)).await.expect("send close");

        let mut seen = Vec::new();
        while let Some(next) = timeout(WAIT, ws.next()).await.expect("reply before timeout") {
            seen.push(next.map_err(|e| e.to_string()));
        }
        seen
    });

    let client = StompClient::new(ConnectionParams::new("jwt", "127.0.0.1", port));
    let summary = timeout(WAIT, client.start())
        .await
        .expect("start returns after close")
        .expect("closed session is not an error");
    assert_eq!(summary.state, SessionState::Closed);

    let seen = server.await.expect("server task");
    assert!(
        seen.iter().all(Result::is_ok),
        "closing handshake should finish without a reset: {seen:?}"
    );
}

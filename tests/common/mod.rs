#![allow(dead_code)]

use futures_util::{SinkExt, StreamExt};
use sqlx::SqlitePool;
use std::time::Duration;
use talenttrade::db;
use talenttrade::state::AppState;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

pub type WsClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

const WAIT: Duration = Duration::from_secs(5);

/// Test server that owns an in-memory SQLite pool and full AppState.
/// Each instance is isolated, so tests can run in parallel.
pub struct TestServer {
    pub state: AppState,
}

impl TestServer {
    pub async fn new() -> Self {
        Self::with_auth_timeout(None).await
    }

    pub async fn with_auth_timeout(auth_timeout: Option<Duration>) -> Self {
        let pool = db::create_pool("sqlite::memory:")
            .await
            .expect("failed to create test pool");
        Self {
            state: AppState::new(pool, auth_timeout),
        }
    }

    pub fn router(&self) -> axum::Router {
        talenttrade::routes::router(self.state.clone())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.state.db
    }

    /// Binds a TCP listener on port 0, spawns the server, and returns the
    /// gateway URL.
    pub async fn spawn(&self) -> String {
        let app = self.router();
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("ws://127.0.0.1:{}/ws", addr.port())
    }

    pub async fn issue_token(&self, user_id: &str) -> String {
        db::tokens::issue_token(self.pool(), user_id, db::tokens::default_token_ttl())
            .await
            .expect("failed to issue test token")
    }

    /// Poll until `check` holds, panicking after a few seconds.
    pub async fn wait_until(&self, check: impl Fn(&AppState) -> bool) {
        let deadline = tokio::time::Instant::now() + WAIT;
        while !check(&self.state) {
            assert!(
                tokio::time::Instant::now() < deadline,
                "condition not reached in time"
            );
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

pub async fn connect(url: &str) -> WsClient {
    let (ws, _) = connect_async(url).await.unwrap();
    ws
}

pub async fn send_json(ws: &mut WsClient, value: serde_json::Value) {
    ws.send(Message::Text(value.to_string().into())).await.unwrap();
}

/// Next text frame parsed as JSON, skipping control frames.
pub async fn next_json(ws: &mut WsClient) -> serde_json::Value {
    loop {
        let msg = tokio::time::timeout(WAIT, ws.next())
            .await
            .expect("timed out waiting for a frame")
            .expect("stream ended")
            .expect("read error");
        match msg {
            Message::Text(text) => return serde_json::from_str(&text).unwrap(),
            Message::Ping(_) | Message::Pong(_) => continue,
            other => panic!("expected text frame, got {other:?}"),
        }
    }
}

/// Wait for the server to close the connection. Returns the close code if a
/// close frame was received.
pub async fn expect_closed(ws: &mut WsClient) -> Option<u16> {
    loop {
        let msg = tokio::time::timeout(WAIT, ws.next())
            .await
            .expect("timed out waiting for close");
        match msg {
            Some(Ok(Message::Close(frame))) => return frame.map(|f| u16::from(f.code)),
            Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => continue,
            Some(Ok(other)) => panic!("expected close, got {other:?}"),
            Some(Err(_)) | None => return None,
        }
    }
}

/// Connect and complete the handshake as whoever `token` belongs to.
pub async fn connect_as(url: &str, token: &str) -> WsClient {
    let mut ws = connect(url).await;
    send_json(&mut ws, serde_json::json!({ "type": "auth", "token": token })).await;
    let reply = next_json(&mut ws).await;
    assert_eq!(reply["type"], "auth_success", "handshake failed: {reply}");
    ws
}

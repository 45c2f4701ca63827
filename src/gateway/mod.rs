pub mod broadcaster;
pub mod events;
pub mod registry;
pub mod session;

use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use crate::error::AuthError;
use crate::state::AppState;
use events::{close_code, ServerEvent};
use session::{ConnectionHandle, GatewaySession, Outbound};

pub async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut ws_sink, mut ws_stream) = socket.split();

    // Everything addressed to this client goes through this queue
    let (tx, mut rx) = mpsc::unbounded_channel::<Outbound>();
    let mut session = GatewaySession::new(ConnectionHandle::new(tx));
    let connection_id = session.connection_id();
    tracing::debug!(%connection_id, "connection accepted");

    session.await_auth();
    let user_id = match authenticate(&state, &mut ws_stream).await {
        Ok(user_id) => user_id,
        Err(err) => {
            tracing::debug!(%connection_id, "authentication failed: {err}");
            if !matches!(err, AuthError::Disconnected) {
                reject(&mut ws_sink, &err).await;
            }
            session.close(&state.registry);
            return;
        }
    };

    if let Some(superseded) = session.authenticate(&state.registry, user_id.clone()) {
        tracing::debug!(user_id = %user_id, superseded = %superseded.id(), "replacing existing connection");
        superseded.close();
    }

    let success = ServerEvent::AuthSuccess {
        user_id: user_id.clone(),
    };
    if ws_sink
        .send(Message::Text(success.to_json().into()))
        .await
        .is_err()
    {
        session.close(&state.registry);
        return;
    }
    tracing::debug!(user_id = %user_id, %connection_id, "session authenticated");

    loop {
        tokio::select! {
            outbound = rx.recv() => {
                match outbound {
                    Some(Outbound::Text(text)) => {
                        if ws_sink.send(Message::Text(text.into())).await.is_err() {
                            break;
                        }
                    }
                    Some(Outbound::Close) => {
                        let frame = CloseFrame {
                            code: close_code::SESSION_SUPERSEDED,
                            reason: "session superseded".into(),
                        };
                        let _ = ws_sink.send(Message::Close(Some(frame))).await;
                        break;
                    }
                    None => break,
                }
            }
            msg = ws_stream.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        match events::parse_chat_payload(text.as_str()) {
                            Some(payload) => {
                                state.broadcaster.relay(&user_id, payload);
                            }
                            None => tracing::debug!(user_id = %user_id, "dropping malformed frame"),
                        }
                    }
                    Some(Ok(Message::Binary(_))) => {
                        tracing::debug!(user_id = %user_id, "dropping binary frame");
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        tracing::debug!(user_id = %user_id, "read error: {e}");
                        break;
                    }
                    _ => {}
                }
            }
        }
    }

    session.close(&state.registry);
    tracing::debug!(user_id = %user_id, %connection_id, "session closed");
}

async fn authenticate(
    state: &AppState,
    ws_stream: &mut SplitStream<WebSocket>,
) -> Result<String, AuthError> {
    let token = match state.auth_timeout {
        Some(limit) => tokio::time::timeout(limit, read_auth_token(ws_stream))
            .await
            .map_err(|_| AuthError::TimedOut)??,
        None => read_auth_token(ws_stream).await?,
    };
    state.verifier.verify(&token).await
}

/// Read the first data frame and pull the credential out of it.
async fn read_auth_token(ws_stream: &mut SplitStream<WebSocket>) -> Result<String, AuthError> {
    loop {
        match ws_stream.next().await {
            Some(Ok(Message::Text(text))) => return events::parse_auth_frame(text.as_str()),
            Some(Ok(Message::Binary(_))) => return Err(AuthError::Malformed),
            Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => continue,
            Some(Ok(Message::Close(_))) | Some(Err(_)) | None => {
                return Err(AuthError::Disconnected)
            }
        }
    }
}

async fn reject(ws_sink: &mut SplitSink<WebSocket, Message>, err: &AuthError) {
    let event = ServerEvent::AuthError {
        message: err.reason().to_string(),
    };
    if ws_sink
        .send(Message::Text(event.to_json().into()))
        .await
        .is_ok()
    {
        let frame = CloseFrame {
            code: close_code::AUTH_FAILED,
            reason: "authentication failed".into(),
        };
        let _ = ws_sink.send(Message::Close(Some(frame))).await;
    }
}

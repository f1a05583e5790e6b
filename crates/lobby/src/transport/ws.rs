// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Octapod join endpoint: websocket upgrade plus the one-message
//! authentication handshake.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;

use crate::error::HandshakeError;
use crate::lobby::Lobby;
use crate::session;
use crate::transport::ws_msg::AuthMessage;

/// `GET /ws/join`: WebSocket upgrade for an octapod.
pub async fn join_handler(
    State(lobby): State<Arc<Lobby>>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_join(lobby, socket))
}

/// Authenticate the new connection and hand it to the octapod's session loop.
async fn handle_join(lobby: Arc<Lobby>, mut socket: WebSocket) {
    tracing::debug!("new connection established");

    let auth = match read_auth(&mut socket).await {
        Ok(auth) => auth,
        Err(e) => {
            tracing::warn!(err = %e, "bad authentication message");
            reject(socket, &e).await;
            return;
        }
    };
    tracing::debug!(probe_id = %auth.id, "received authentication message");

    match lobby.admit(&auth.id, &auth.password).await {
        Ok(admission) => session::run(lobby, admission, socket).await,
        Err(e) => {
            tracing::info!(probe_id = %auth.id, err = %e, "handshake refused");
            reject(socket, &e).await;
        }
    }
}

/// Read the first data message and parse it as an [`AuthMessage`].
///
/// Ping/pong frames are skipped; any other non-text frame is refused.
async fn read_auth(socket: &mut WebSocket) -> Result<AuthMessage, HandshakeError> {
    loop {
        match socket.recv().await {
            Some(Ok(Message::Text(text))) => {
                return serde_json::from_str(text.as_str()).map_err(|_| HandshakeError::Malformed);
            }
            Some(Ok(Message::Ping(_) | Message::Pong(_))) => continue,
            Some(Ok(Message::Close(_))) | None => {
                return Err(HandshakeError::Read("connection closed".to_owned()));
            }
            Some(Ok(Message::Binary(_))) => return Err(HandshakeError::NotText),
            Some(Err(e)) => return Err(HandshakeError::Read(e.to_string())),
        }
    }
}

/// Send `{"error": ...}` and close the connection.
async fn reject(mut socket: WebSocket, err: &HandshakeError) {
    let body = match serde_json::to_string(&err.to_message()) {
        Ok(body) => body,
        Err(e) => {
            tracing::warn!(err = %e, "failed to encode error message");
            return;
        }
    };
    if let Err(e) = socket.send(Message::Text(body.into())).await {
        tracing::debug!(err = %e, "error sending error message");
        return;
    }
    if let Err(e) = socket.send(Message::Close(None)).await {
        tracing::debug!(err = %e, "error closing connection");
    }
}

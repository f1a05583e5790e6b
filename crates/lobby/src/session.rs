// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-octapod session loop: forwards scheduler deliveries to the octapod
//! and applies the commands it sends back.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{Sink, SinkExt, StreamExt};

use crate::lobby::{Admission, AdmissionKind, Lobby};
use crate::probe::Probe;
use crate::transport::ws_msg::{ClientMessage, ServerMessage};

/// A write that cannot complete within this window ends the session.
const WRITE_TIMEOUT: Duration = Duration::from_secs(5);

/// Drive an admitted octapod's connection until it closes or is evicted.
pub async fn run(lobby: Arc<Lobby>, admission: Admission, socket: WebSocket) {
    let Admission { probe, connection, kind } = admission;
    let (mut ws_tx, mut ws_rx) = socket.split();

    let joined = ServerMessage::Joined {
        id: probe.id.clone(),
        reconnected: kind == AdmissionKind::Reconnected,
    };
    if send_json(&mut ws_tx, &joined).await.is_ok() {
        let mut deliveries = probe.deliveries(connection.id).await;
        loop {
            tokio::select! {
                _ = connection.cancel.cancelled() => {
                    if let Err(e) = send_frame(&mut ws_tx, Message::Close(None), WRITE_TIMEOUT).await {
                        tracing::debug!(probe_id = %probe.id, err = %e, "close write failed");
                    }
                    break;
                }

                // Forward scheduler deliveries to the octapod.
                delivery = deliveries.recv() => {
                    let Some(delivery) = delivery else { break };
                    if let Err(e) = send_json(&mut ws_tx, &ServerMessage::from(delivery)).await {
                        tracing::debug!(probe_id = %probe.id, err = %e, "delivery write failed");
                        break;
                    }
                }

                // Handle commands from the octapod.
                msg = ws_rx.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            let reply = handle_command(&lobby, &probe, text.as_str()).await;
                            if let Err(e) = send_json(&mut ws_tx, &reply).await {
                                tracing::debug!(probe_id = %probe.id, err = %e, "reply write failed");
                                break;
                            }
                        }
                        Some(Ok(Message::Close(_))) | None => break,
                        Some(Err(e)) => {
                            tracing::debug!(probe_id = %probe.id, err = %e, "octapod read failed");
                            break;
                        }
                        _ => {}
                    }
                }
            }
        }
    }

    if probe.detach(connection.id).await {
        tracing::info!(probe_id = %probe.id, "octapod disconnected");
    }
}

/// Apply one octapod command and build the reply.
pub async fn handle_command(lobby: &Lobby, probe: &Probe, text: &str) -> ServerMessage {
    let cmd = match serde_json::from_str::<ClientMessage>(text) {
        Ok(cmd) => cmd,
        Err(e) => {
            return ServerMessage::Error { message: format!("unrecognized command: {e}") };
        }
    };

    match cmd {
        ClientMessage::Move { direction } => match probe.try_move(direction, &lobby.maze).await {
            Some(position) => ServerMessage::Position(position),
            None => ServerMessage::Error { message: "blocked by a wall".to_owned() },
        },
        ClientMessage::Ping => {
            probe.mark_active().await;
            ServerMessage::Pong
        }
    }
}

async fn send_json<S>(tx: &mut S, msg: &ServerMessage) -> anyhow::Result<()>
where
    S: Sink<Message> + Unpin,
    S::Error: std::error::Error + Send + Sync + 'static,
{
    let json = serde_json::to_string(msg)?;
    send_frame(tx, Message::Text(json.into()), WRITE_TIMEOUT).await
}

/// Write one frame, giving up after `timeout`.
async fn send_frame<S>(tx: &mut S, frame: Message, timeout: Duration) -> anyhow::Result<()>
where
    S: Sink<Message> + Unpin,
    S::Error: std::error::Error + Send + Sync + 'static,
{
    tokio::time::timeout(timeout, tx.send(frame))
        .await
        .map_err(|_| anyhow::anyhow!("write timed out"))??;
    Ok(())
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;

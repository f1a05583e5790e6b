// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test infrastructure: config, lobby builders, and a recording notifier.

use std::sync::{Arc, Mutex};

use tokio_util::sync::CancellationToken;

use crate::config::LobbyConfig;
use crate::lobby::Lobby;
use crate::maze::Maze;
use crate::notify::Notifier;

/// Notifier that keeps every announcement in memory.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    messages: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl Notifier for RecordingNotifier {
    fn send(&self, text: &str) {
        self.messages.lock().unwrap_or_else(|e| e.into_inner()).push(text.to_owned());
    }
}

/// Config with slow timers so tests drive phases by hand.
pub fn test_config() -> LobbyConfig {
    LobbyConfig {
        host: "127.0.0.1".to_owned(),
        port: 0,
        maze_width: 5,
        maze_height: 3,
        maze_seed: None,
        update_interval_ms: 60000,
        timeout_interval_ms: 60000,
        max_inactive: 2,
        webhook_url: None,
    }
}

/// Small fixed maze. Open cells are `.`; the start is (0, 0).
///
/// ```text
/// . . . # .
/// # # . # .
/// . . . . .
/// ```
pub fn test_maze() -> Maze {
    Maze::from_rows(&["...#.", "##.#.", "....."])
}

/// Lobby over [`test_maze`] with a recording notifier.
pub fn test_lobby(config: LobbyConfig) -> (Arc<Lobby>, Arc<RecordingNotifier>) {
    let notifier = Arc::new(RecordingNotifier::default());
    let sink: Arc<dyn Notifier> = notifier.clone();
    let lobby = Arc::new(Lobby::new(config, test_maze(), sink, CancellationToken::new()));
    (lobby, notifier)
}

/// Spawn the lobby's HTTP server on a random port for integration testing.
///
/// Returns the bound address and a join handle for the server task.
pub async fn spawn_http_server(
    lobby: Arc<Lobby>,
) -> anyhow::Result<(std::net::SocketAddr, tokio::task::JoinHandle<()>)> {
    let router = crate::transport::build_router(lobby);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let handle = tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    Ok((addr, handle))
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Octolobby: session coordinator for octapods exploring a shared maze.

pub mod config;
pub mod error;
pub mod lobby;
pub mod maze;
pub mod notify;
pub mod probe;
pub mod scheduler;
pub mod session;
pub mod test_support;
pub mod transport;

use std::collections::HashMap;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::config::LobbyConfig;
use crate::lobby::Lobby;
use crate::maze::Maze;
use crate::notify::{LogNotifier, Notifier, WebhookNotifier};
use crate::scheduler::spawn_scheduler;
use crate::transport::build_router;

/// Run the lobby server until shutdown.
pub async fn run(config: LobbyConfig) -> anyhow::Result<()> {
    config.validate()?;
    let addr = format!("{}:{}", config.host, config.port);
    let shutdown = CancellationToken::new();

    let maze = match config.maze_seed {
        Some(seed) => {
            Maze::generate(config.maze_width, config.maze_height, &mut StdRng::seed_from_u64(seed))
        }
        None => Maze::generate(config.maze_width, config.maze_height, &mut rand::rng()),
    };
    tracing::info!("maze generated:\n{}", maze.render(&HashMap::new()));

    let notifier: Arc<dyn Notifier> = match config.webhook_url {
        Some(ref url) => Arc::new(WebhookNotifier::new(url.clone())?),
        None => Arc::new(LogNotifier),
    };

    let lobby = Arc::new(Lobby::new(config, maze, notifier, shutdown.clone()));
    spawn_scheduler(Arc::clone(&lobby));

    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("shutting down");
                shutdown.cancel();
            }
        });
    }

    let router = build_router(lobby);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("octolobby listening on {addr}");
    axum::serve(listener, router).with_graceful_shutdown(shutdown.cancelled_owned()).await?;

    Ok(())
}

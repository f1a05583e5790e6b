// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Background cycle alternating the update and timeout-check phases.

use std::sync::Arc;
use std::time::Duration;

use crate::config::LobbyConfig;
use crate::lobby::Lobby;

/// Scheduler phase. Phases alternate strictly, starting with `Update`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Update,
    TimeoutCheck,
}

impl Phase {
    pub fn next(self) -> Self {
        match self {
            Self::Update => Self::TimeoutCheck,
            Self::TimeoutCheck => Self::Update,
        }
    }

    /// How long to wait before this phase fires.
    pub fn delay(self, config: &LobbyConfig) -> Duration {
        match self {
            Self::Update => config.update_interval(),
            Self::TimeoutCheck => config.timeout_interval(),
        }
    }
}

/// Run one phase to completion.
pub async fn run_phase(lobby: &Lobby, phase: Phase) {
    match phase {
        Phase::Update => {
            lobby.update().await;
            tracing::debug!("sensor data pushed");
        }
        Phase::TimeoutCheck => {
            lobby.timeout_check().await;
            tracing::debug!("timeout check complete");
            let board = lobby.render("").await;
            lobby.announce(&format!("Board updated:\n{board}"));
        }
    }
}

/// Spawn the scheduler task. Returns `false` (and spawns nothing) if the
/// scheduler was already started for this lobby.
pub fn spawn_scheduler(lobby: Arc<Lobby>) -> bool {
    if !lobby.claim_scheduler() {
        tracing::info!("scheduler already running");
        return false;
    }

    tokio::spawn(async move {
        let mut phase = Phase::Update;
        loop {
            tokio::select! {
                _ = lobby.shutdown.cancelled() => break,
                _ = tokio::time::sleep(phase.delay(&lobby.config)) => {}
            }
            run_phase(&lobby, phase).await;
            phase = phase.next();
        }
        tracing::debug!("scheduler stopped");
    });
    true
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;

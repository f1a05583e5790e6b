// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

/// Configuration for the octapod lobby.
#[derive(Debug, Clone, clap::Parser)]
#[command(name = "octolobby", about = "Session coordinator for octapods exploring a shared maze")]
pub struct LobbyConfig {
    /// Host to bind on.
    #[arg(long, default_value = "127.0.0.1", env = "OCTO_LOBBY_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(long, default_value_t = 9900, env = "OCTO_LOBBY_PORT")]
    pub port: u16,

    /// Maze width in cells.
    #[arg(long, default_value_t = 21, env = "OCTO_LOBBY_MAZE_WIDTH")]
    pub maze_width: usize,

    /// Maze height in cells.
    #[arg(long, default_value_t = 11, env = "OCTO_LOBBY_MAZE_HEIGHT")]
    pub maze_height: usize,

    /// Seed for maze generation. Random when unset.
    #[arg(long, env = "OCTO_LOBBY_MAZE_SEED")]
    pub maze_seed: Option<u64>,

    /// Delay before each update phase, in milliseconds.
    #[arg(long, default_value_t = 15000, env = "OCTO_LOBBY_UPDATE_INTERVAL_MS")]
    pub update_interval_ms: u64,

    /// Delay between an update phase and the following timeout check, in milliseconds.
    #[arg(long, default_value_t = 1000, env = "OCTO_LOBBY_TIMEOUT_INTERVAL_MS")]
    pub timeout_interval_ms: u64,

    /// Consecutive update cycles without activity before an octapod is evicted.
    #[arg(long, default_value_t = 2, env = "OCTO_LOBBY_MAX_INACTIVE")]
    pub max_inactive: u32,

    /// Chat webhook that receives lobby announcements. Announcements are only
    /// logged when unset.
    #[arg(long, env = "OCTO_LOBBY_WEBHOOK_URL")]
    pub webhook_url: Option<String>,
}

impl LobbyConfig {
    pub fn update_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.update_interval_ms)
    }

    pub fn timeout_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.timeout_interval_ms)
    }

    /// Reject settings the lobby cannot run with.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.maze_width == 0 || self.maze_height == 0 {
            anyhow::bail!("maze dimensions must be non-zero");
        }
        if self.update_interval_ms == 0 || self.timeout_interval_ms == 0 {
            anyhow::bail!("scheduler intervals must be non-zero");
        }
        if self.max_inactive == 0 {
            anyhow::bail!("--max-inactive must be at least 1");
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;

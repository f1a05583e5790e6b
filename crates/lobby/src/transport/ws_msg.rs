// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Octapod websocket message types.

use serde::{Deserialize, Serialize};

use crate::maze::{Direction, Point, Sensor};
use crate::probe::Delivery;

/// First message on every new octapod connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthMessage {
    pub id: String,
    /// Absent means the empty password.
    #[serde(default)]
    pub password: String,
}

/// Commands an admitted octapod may send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Move { direction: Direction },
    Ping,
}

/// Messages sent to an admitted octapod.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Joined { id: String, reconnected: bool },
    Sensor(Sensor),
    Timeout,
    Position(Point),
    Pong,
    Error { message: String },
}

impl From<Delivery> for ServerMessage {
    fn from(delivery: Delivery) -> Self {
        match delivery {
            Delivery::Sensor(reading) => Self::Sensor(reading),
            Delivery::TimeoutCheck => Self::Timeout,
        }
    }
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-octapod state: credential, connection slot, liveness, and the
//! single-slot delivery hand-off to the octapod's session loop.

use serde::Serialize;
use tokio::sync::{mpsc, Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;

use crate::maze::{Direction, Maze, Point, Sensor};

/// What the scheduler hands to an octapod's session loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// Fresh sensor data from the update phase.
    Sensor(Sensor),
    /// The timeout phase is about to check this octapod.
    TimeoutCheck,
}

/// A delivery tagged with the connection it was produced for.
#[derive(Debug)]
struct Addressed {
    connection_id: u64,
    delivery: Delivery,
}

/// Handle to the live stream attached to an octapod.
///
/// Cancelling the token tells the session loop owning the stream to close it.
#[derive(Debug, Clone)]
pub struct Connection {
    pub id: u64,
    pub cancel: CancellationToken,
}

impl Connection {
    pub fn new(id: u64) -> Self {
        Self { id, cancel: CancellationToken::new() }
    }
}

/// Mutable octapod fields, guarded by the octapod's own lock.
#[derive(Debug)]
pub struct ProbeState {
    pub connection: Option<Connection>,
    pub position: Point,
    pub inactive_count: u32,
    /// Set when the octapod was evicted and dropped from the registry. A
    /// retired octapod never accepts another connection.
    pub retired: bool,
}

/// Point-in-time view of an octapod for the HTTP API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProbeSnapshot {
    pub id: String,
    pub connected: bool,
    pub position: Point,
    pub inactive_count: u32,
}

/// A registered octapod.
pub struct Probe {
    pub id: String,
    secret: String,
    state: Mutex<ProbeState>,
    delivery_tx: mpsc::Sender<Addressed>,
    delivery_rx: Mutex<mpsc::Receiver<Addressed>>,
}

impl Probe {
    /// Create an octapod with `connection` already attached.
    pub fn new(id: String, secret: String, position: Point, connection: Connection) -> Self {
        let (delivery_tx, delivery_rx) = mpsc::channel(1);
        Self {
            id,
            secret,
            state: Mutex::new(ProbeState {
                connection: Some(connection),
                position,
                inactive_count: 0,
                retired: false,
            }),
            delivery_tx,
            delivery_rx: Mutex::new(delivery_rx),
        }
    }

    pub fn verify_password(&self, password: &str) -> bool {
        constant_time_eq(password, &self.secret)
    }

    /// Lock the mutable fields.
    pub async fn lock(&self) -> MutexGuard<'_, ProbeState> {
        self.state.lock().await
    }

    pub async fn snapshot(&self) -> ProbeSnapshot {
        let state = self.state.lock().await;
        ProbeSnapshot {
            id: self.id.clone(),
            connected: state.connection.is_some(),
            position: state.position,
            inactive_count: state.inactive_count,
        }
    }

    /// The attached connection, if any.
    pub async fn connection(&self) -> Option<Connection> {
        self.state.lock().await.connection.clone()
    }

    /// Hand `delivery` to the session loop serving `connection`, waiting for
    /// the slot to free up.
    ///
    /// Gives up and returns `false` once the connection is cancelled.
    pub async fn deliver(&self, delivery: Delivery, connection: &Connection) -> bool {
        let item = Addressed { connection_id: connection.id, delivery };
        tokio::select! {
            biased;
            _ = connection.cancel.cancelled() => false,
            res = self.delivery_tx.send(item) => res.is_ok(),
        }
    }

    /// Exclusive access to the delivery slot for connection `connection_id`.
    /// Held by the session loop for as long as it runs.
    pub async fn deliveries(&self, connection_id: u64) -> Inbox<'_> {
        Inbox { rx: self.delivery_rx.lock().await, connection_id }
    }

    /// Detach connection `connection_id` if it is still the attached one.
    pub async fn detach(&self, connection_id: u64) -> bool {
        let mut state = self.state.lock().await;
        if !state.connection.as_ref().is_some_and(|c| c.id == connection_id) {
            return false;
        }
        if let Some(conn) = state.connection.take() {
            conn.cancel.cancel();
        }
        true
    }

    /// Reset the liveness counter after the octapod showed activity.
    pub async fn mark_active(&self) {
        self.state.lock().await.inactive_count = 0;
    }

    /// Step one cell in `direction` when the target is open. Counts as
    /// activity either way. Returns the new position, or `None` if blocked.
    pub async fn try_move(&self, direction: Direction, maze: &Maze) -> Option<Point> {
        let mut state = self.state.lock().await;
        state.inactive_count = 0;
        let target = state.position.step(direction);
        if maze.is_wall(target) {
            return None;
        }
        state.position = target;
        Some(target)
    }
}

/// Receiving end of an octapod's delivery slot, bound to one connection.
pub struct Inbox<'a> {
    rx: MutexGuard<'a, mpsc::Receiver<Addressed>>,
    connection_id: u64,
}

impl Inbox<'_> {
    /// Next delivery for this connection. Items still queued for an earlier
    /// connection are discarded.
    pub async fn recv(&mut self) -> Option<Delivery> {
        loop {
            let item = self.rx.recv().await?;
            if item.connection_id == self.connection_id {
                return Some(item.delivery);
            }
            tracing::debug!(stale = item.connection_id, "dropping delivery for a previous connection");
        }
    }

    /// Like [`Inbox::recv`] without waiting.
    pub fn try_recv(&mut self) -> Option<Delivery> {
        loop {
            let item = self.rx.try_recv().ok()?;
            if item.connection_id == self.connection_id {
                return Some(item.delivery);
            }
        }
    }
}

/// Compare two secrets without short-circuiting on the first differing byte.
fn constant_time_eq(a: &str, b: &str) -> bool {
    let (a, b) = (a.as_bytes(), b.as_bytes());
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
#[path = "probe_tests.rs"]
mod tests;

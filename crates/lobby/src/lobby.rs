// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The lobby: octapod registry, admission, and the two scheduler phases.
//!
//! Locking is two-level. The registry lock is held only to look up, insert,
//! or remove an id and never across network I/O or a delivery. Each
//! octapod's own lock guards its connection, position, and liveness
//! counter. The only nesting is registry then octapod (rendering); nothing
//! takes the registry lock while holding an octapod lock.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use futures_util::future::join_all;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::config::LobbyConfig;
use crate::error::HandshakeError;
use crate::maze::{Maze, Point};
use crate::notify::Notifier;
use crate::probe::{Connection, Delivery, Probe, ProbeSnapshot};

/// How a successful handshake was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmissionKind {
    /// First connection for this id; its password became the credential.
    Registered,
    /// Known id, correct password, no live connection.
    Reconnected,
}

/// A probe that passed the handshake, with the connection just attached.
pub struct Admission {
    pub probe: Arc<Probe>,
    pub connection: Connection,
    pub kind: AdmissionKind,
}

/// Shared lobby state.
pub struct Lobby {
    pub config: LobbyConfig,
    pub maze: Maze,
    pub shutdown: CancellationToken,
    probes: RwLock<HashMap<String, Arc<Probe>>>,
    notifier: Arc<dyn Notifier>,
    timer_running: AtomicBool,
    next_connection_id: AtomicU64,
}

impl Lobby {
    pub fn new(
        config: LobbyConfig,
        maze: Maze,
        notifier: Arc<dyn Notifier>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            config,
            maze,
            shutdown,
            probes: RwLock::new(HashMap::new()),
            notifier,
            timer_running: AtomicBool::new(false),
            next_connection_id: AtomicU64::new(1),
        }
    }

    /// Send a lobby announcement through the notifier.
    pub fn announce(&self, text: &str) {
        self.notifier.send(text);
    }

    /// Claim the right to run the scheduler. Only the first call succeeds.
    pub fn claim_scheduler(&self) -> bool {
        self.timer_running.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire).is_ok()
    }

    pub async fn probe(&self, id: &str) -> Option<Arc<Probe>> {
        self.probes.read().await.get(&id.to_lowercase()).map(Arc::clone)
    }

    pub async fn probe_count(&self) -> usize {
        self.probes.read().await.len()
    }

    /// Copy of the registry values. Callers iterate this without holding the
    /// registry lock.
    pub async fn snapshot_probes(&self) -> Vec<Arc<Probe>> {
        self.probes.read().await.values().map(Arc::clone).collect()
    }

    /// Snapshots of every registered octapod, sorted by id.
    pub async fn probe_snapshots(&self) -> Vec<ProbeSnapshot> {
        let mut out = Vec::new();
        for probe in self.snapshot_probes().await {
            out.push(probe.snapshot().await);
        }
        out.sort_by(|a, b| a.id.cmp(&b.id));
        out
    }

    fn new_connection(&self) -> Connection {
        Connection::new(self.next_connection_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Register a new octapod or reconnect a known one.
    ///
    /// The first handshake for an id always succeeds and fixes its password.
    /// Later handshakes must match that password and find no live connection;
    /// the check and the attach happen under the octapod's lock so two
    /// racing handshakes can never both attach.
    pub async fn admit(&self, id: &str, password: &str) -> Result<Admission, HandshakeError> {
        let id = id.trim().to_lowercase();
        if id.is_empty() {
            return Err(HandshakeError::Malformed);
        }

        loop {
            let existing = {
                let mut probes = self.probes.write().await;
                match probes.get(&id).map(Arc::clone) {
                    Some(probe) => probe,
                    None => {
                        let connection = self.new_connection();
                        let probe = Arc::new(Probe::new(
                            id.clone(),
                            password.to_owned(),
                            self.maze.start(),
                            connection.clone(),
                        ));
                        probes.insert(id.clone(), Arc::clone(&probe));
                        drop(probes);

                        tracing::info!(probe_id = %id, "new octapod registered");
                        self.announce(&format!("New octapod [{id}] registered"));
                        return Ok(Admission {
                            probe,
                            connection,
                            kind: AdmissionKind::Registered,
                        });
                    }
                }
            };

            let mut state = existing.lock().await;
            if state.retired {
                // Evicted between our lookup and now; make sure it is gone
                // from the registry and try again as a fresh registration.
                drop(state);
                self.forget(&existing).await;
                continue;
            }
            if !existing.verify_password(password) {
                return Err(HandshakeError::InvalidPassword);
            }
            if state.connection.is_some() {
                return Err(HandshakeError::AlreadyConnected);
            }

            let connection = self.new_connection();
            state.connection = Some(connection.clone());
            state.inactive_count = 0;
            drop(state);

            tracing::info!(probe_id = %id, "octapod reconnected");
            self.announce(&format!("Octapod [{id}] reconnected"));
            return Ok(Admission {
                probe: existing,
                connection,
                kind: AdmissionKind::Reconnected,
            });
        }
    }

    /// Remove `probe` from the registry if it is still the registered entry
    /// for its id.
    async fn forget(&self, probe: &Arc<Probe>) {
        let mut probes = self.probes.write().await;
        if probes.get(&probe.id).is_some_and(|p| Arc::ptr_eq(p, probe)) {
            probes.remove(&probe.id);
        }
    }

    /// Update phase: bump every connected octapod's liveness counter and
    /// deliver a sensor reading for its current cell.
    pub async fn update(&self) {
        let probes = self.snapshot_probes().await;
        join_all(probes.iter().map(|probe| self.update_probe(probe))).await;
    }

    async fn update_probe(&self, probe: &Probe) {
        let (reading, connection) = {
            let mut state = probe.lock().await;
            let Some(connection) = state.connection.clone() else {
                return;
            };
            state.inactive_count += 1;
            (self.maze.sensor(state.position), connection)
        };

        if probe.deliver(Delivery::Sensor(reading), &connection).await {
            tracing::debug!(probe_id = %probe.id, "sensor data delivered");
        }
    }

    /// Timeout phase: send every connected octapod a timeout marker, then
    /// evict those whose liveness counter reached `max_inactive`.
    pub async fn timeout_check(&self) {
        let probes = self.snapshot_probes().await;
        join_all(probes.iter().map(|probe| self.check_probe(probe))).await;
    }

    async fn check_probe(&self, probe: &Arc<Probe>) {
        let Some(connection) = probe.connection().await else {
            return;
        };
        if probe.deliver(Delivery::TimeoutCheck, &connection).await {
            tracing::debug!(probe_id = %probe.id, "timeout signal delivered");
        }

        let inactive = {
            let mut state = probe.lock().await;
            if state.inactive_count < self.config.max_inactive {
                return;
            }
            let Some(conn) = state.connection.take() else {
                return;
            };
            conn.cancel.cancel();
            state.retired = true;
            state.inactive_count
        };

        self.forget(probe).await;
        tracing::info!(
            probe_id = %probe.id,
            inactive,
            "octapod disconnected due to inactivity"
        );
        self.announce(&format!("Octapod [{}] disconnected due to inactivity", probe.id));
    }

    /// Render the board, optionally limited to a single octapod id.
    ///
    /// Holds the registry lock for the whole render so every position comes
    /// from the same instant.
    pub async fn render(&self, filter: &str) -> String {
        let wanted = filter.to_lowercase();
        let probes = self.probes.read().await;

        let mut matched: Vec<&Arc<Probe>> =
            probes.values().filter(|p| wanted.is_empty() || p.id == wanted).collect();
        if matched.is_empty() {
            if filter.is_empty() {
                return "No octapods in the lobby.".to_owned();
            }
            return format!("No octapods [{filter}] in the lobby.");
        }
        matched.sort_by(|a, b| a.id.cmp(&b.id));

        let mut marks: HashMap<Point, char> = HashMap::new();
        for probe in matched {
            let position = probe.lock().await.position;
            if let Some(c) = probe.id.chars().next() {
                marks.entry(position).or_insert(c);
            }
        }
        self.maze.render(&marks)
    }
}

#[cfg(test)]
#[path = "lobby_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP handlers for the lobby API.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::lobby::Lobby;

// -- Request/Response types ---------------------------------------------------

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub probe_count: usize,
}

#[derive(Debug, Deserialize)]
pub struct MazeQuery {
    /// Only draw the octapod with this id.
    #[serde(default)]
    pub id: Option<String>,
}

// -- Handlers -----------------------------------------------------------------

/// `GET /api/v1/health`
pub async fn health(State(lobby): State<Arc<Lobby>>) -> impl IntoResponse {
    Json(HealthResponse { status: "running".to_owned(), probe_count: lobby.probe_count().await })
}

/// `GET /api/v1/probes`
pub async fn list_probes(State(lobby): State<Arc<Lobby>>) -> impl IntoResponse {
    Json(lobby.probe_snapshots().await)
}

/// `GET /api/v1/probes/{id}`
pub async fn get_probe(
    State(lobby): State<Arc<Lobby>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match lobby.probe(&id).await {
        Some(probe) => Json(probe.snapshot().await).into_response(),
        None => ApiError::ProbeNotFound
            .to_http_response(format!("no octapod [{id}]"))
            .into_response(),
    }
}

/// `GET /api/v1/maze?id=...`: rendered board as plain text.
pub async fn render_maze(
    State(lobby): State<Arc<Lobby>>,
    Query(query): Query<MazeQuery>,
) -> impl IntoResponse {
    lobby.render(query.id.as_deref().unwrap_or("")).await
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP + WebSocket transport for the lobby.

pub mod http;
pub mod ws;
pub mod ws_msg;

use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::lobby::Lobby;

/// Build the axum `Router` with all lobby routes.
pub fn build_router(lobby: Arc<Lobby>) -> Router {
    Router::new()
        // Health
        .route("/api/v1/health", get(http::health))
        // Octapods and board
        .route("/api/v1/probes", get(http::list_probes))
        .route("/api/v1/probes/{id}", get(http::get_probe))
        .route("/api/v1/maze", get(http::render_maze))
        // Octapod connections (authenticated by the join handshake)
        .route("/ws/join", get(ws::join_handler))
        // Middleware
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(lobby)
}

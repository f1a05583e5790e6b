// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Reasons a websocket handshake is refused.
///
/// Each variant carries the text sent to the peer in an [`ErrorMessage`]
/// before the connection is closed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandshakeError {
    /// The first read failed.
    Read(String),
    /// The first message was not a text frame.
    NotText,
    /// The first message was not a valid authentication request.
    Malformed,
    /// The id exists and the password does not match its secret.
    InvalidPassword,
    /// The id already has a live connection.
    AlreadyConnected,
}

impl HandshakeError {
    /// Message shown to the remote octapod.
    pub fn peer_message(&self) -> String {
        match self {
            Self::Read(e) => format!("Error reading authentication message: {e}"),
            Self::NotText => "Authentication requires a text message with credentials.".to_owned(),
            Self::Malformed => "Invalid authentication message format.".to_owned(),
            Self::InvalidPassword => "Invalid password for octapod".to_owned(),
            Self::AlreadyConnected => "Octapod already connected".to_owned(),
        }
    }

    pub fn to_message(&self) -> ErrorMessage {
        ErrorMessage { error: self.peer_message() }
    }
}

impl fmt::Display for HandshakeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.peer_message())
    }
}

impl std::error::Error for HandshakeError {}

/// Wire shape of a handshake rejection: `{"error": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorMessage {
    pub error: String,
}

/// Error codes for the HTTP API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApiError {
    ProbeNotFound,
}

impl ApiError {
    pub fn http_status(&self) -> u16 {
        match self {
            Self::ProbeNotFound => 404,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ProbeNotFound => "PROBE_NOT_FOUND",
        }
    }

    pub fn to_error_body(&self, message: impl Into<String>) -> ErrorBody {
        ErrorBody { code: self.as_str().to_owned(), message: message.into() }
    }

    pub fn to_http_response(
        &self,
        message: impl Into<String>,
    ) -> (StatusCode, Json<ErrorResponse>) {
        let status =
            StatusCode::from_u16(self.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = ErrorResponse { error: self.to_error_body(message) };
        (status, Json(body))
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Top-level error response envelope for the HTTP API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

/// Error body with machine-readable code and human-readable message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

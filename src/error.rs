// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application error types with consistent API responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Application error type that converts to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Authentication required")]
    Unauthorized,

    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// The provider rejected an authorization code or refresh token, or could
    /// not be reached during the exchange.
    #[error("Token exchange failed: {0}")]
    Exchange(String),

    #[error("No refresh token stored for athlete {0}")]
    RefreshUnavailable(u64),

    /// No usable provider token; aborts a sync cycle.
    #[error("No usable provider token: {0}")]
    AuthUnavailable(String),

    #[error("A sync cycle is already running")]
    SyncInProgress,

    #[error("Strava API error: {0}")]
    StravaApi(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Marker message for provider responses with HTTP 429.
    pub const STRAVA_RATE_LIMIT: &'static str = "Rate limit exceeded";
    /// Marker message for provider responses with HTTP 401.
    pub const STRAVA_TOKEN_ERROR: &'static str = "Token expired or invalid";
}

/// JSON error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, details) = match &self {
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized", None),
            AppError::InvalidToken => (StatusCode::UNAUTHORIZED, "invalid_token", None),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", Some(msg.clone())),
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, "bad_request", Some(msg.clone()))
            }
            AppError::Exchange(msg) => {
                tracing::warn!(error = %msg, "Token exchange failed");
                (StatusCode::BAD_GATEWAY, "exchange_error", Some(msg.clone()))
            }
            AppError::RefreshUnavailable(_) => (
                StatusCode::UNAUTHORIZED,
                "refresh_unavailable",
                Some(self.to_string()),
            ),
            AppError::AuthUnavailable(msg) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "auth_unavailable",
                Some(msg.clone()),
            ),
            AppError::SyncInProgress => (StatusCode::CONFLICT, "sync_in_progress", None),
            AppError::StravaApi(msg) => {
                (StatusCode::BAD_GATEWAY, "strava_error", Some(msg.clone()))
            }
            AppError::Database(msg) => {
                tracing::error!(error = %msg, "Database error");
                (StatusCode::INTERNAL_SERVER_ERROR, "database_error", None)
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "Internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None)
            }
        };

        let body = ErrorResponse {
            error: error.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, AppError>;

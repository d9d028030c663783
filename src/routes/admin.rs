// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Admin routes for session holders: API keys, sync, activity cleanup.

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::{ApiKey, TokenState};
use crate::time_utils::format_utc_rfc3339;
use crate::AppState;
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
    Extension, Json, Router,
};
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Longest trailing window an admin sync may request.
const MAX_SYNC_DAYS: i64 = 3650;

/// Admin routes (require a session).
/// The auth middleware is applied in routes/mod.rs for these routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/admin/me", get(get_me))
        .route("/admin/keys", get(list_keys).post(create_key))
        .route("/admin/keys/{id}", delete(delete_key))
        .route("/admin/keys/{id}/deactivate", post(deactivate_key))
        .route("/admin/sync", post(trigger_sync))
        .route("/admin/activities/{id}", delete(delete_activity))
}

// ─── Profile ─────────────────────────────────────────────────

/// Current identity response. Tokens are never included.
#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct MeResponse {
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub athlete_id: u64,
    pub firstname: String,
    pub lastname: String,
    pub city: Option<String>,
    pub country: Option<String>,
    pub profile_picture: Option<String>,
    #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
    pub token_state: TokenState,
    pub token_expires_at: String,
}

async fn get_me(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<MeResponse>> {
    let identity = state
        .store
        .get_identity(user.athlete_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Athlete {} not found", user.athlete_id)))?;

    Ok(Json(MeResponse {
        athlete_id: identity.athlete_id,
        token_state: identity.token_state(Utc::now()),
        token_expires_at: format_utc_rfc3339(identity.token_expires_at),
        firstname: identity.firstname,
        lastname: identity.lastname,
        city: identity.city,
        country: identity.country,
        profile_picture: identity.profile_picture,
    }))
}

// ─── API Keys ────────────────────────────────────────────────

/// API key as listed to its owner. The key material is shown only at creation.
#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ApiKeyResponse {
    pub id: String,
    pub description: String,
    pub created_at: String,
    pub expires_at: Option<String>,
    pub is_active: bool,
    /// Whether the key would be accepted right now
    pub is_valid: bool,
}

impl From<ApiKey> for ApiKeyResponse {
    fn from(key: ApiKey) -> Self {
        Self {
            is_valid: key.is_valid_at(Utc::now()),
            id: key.id,
            description: key.description,
            created_at: format_utc_rfc3339(key.created_at),
            expires_at: key.expires_at.map(format_utc_rfc3339),
            is_active: key.is_active,
        }
    }
}

async fn list_keys(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Vec<ApiKeyResponse>>> {
    let keys = state.api_keys.list(user.athlete_id).await?;
    Ok(Json(keys.into_iter().map(ApiKeyResponse::from).collect()))
}

#[derive(Deserialize, Validate)]
pub struct CreateKeyRequest {
    #[serde(default)]
    #[validate(length(max = 200))]
    pub description: String,
    /// Days until expiry; 0 never expires
    #[serde(default)]
    #[validate(range(min = 0, max = 36500))]
    pub expiry_days: i64,
}

/// Newly created key, including its material.
#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct CreateKeyResponse {
    pub key: String,
    pub id: String,
    pub expires_at: Option<String>,
}

async fn create_key(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<CreateKeyRequest>,
) -> Result<Json<CreateKeyResponse>> {
    req.validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let expiry_days = u32::try_from(req.expiry_days)
        .map_err(|_| AppError::BadRequest("expiry_days out of range".to_string()))?;

    let key = state
        .api_keys
        .issue(&req.description, expiry_days, Some(user.athlete_id))
        .await?;

    Ok(Json(CreateKeyResponse {
        expires_at: key.expires_at.map(format_utc_rfc3339),
        id: key.id,
        key: key.key,
    }))
}

async fn delete_key(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    state.api_keys.delete(user.athlete_id, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn deactivate_key(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    state.api_keys.deactivate(user.athlete_id, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ─── Sync ────────────────────────────────────────────────────

#[derive(Deserialize, Default)]
pub struct SyncRequest {
    #[serde(default)]
    pub days: i64,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct SyncResponse {
    pub status: String,
}

/// Trailing window in days: non-positive means one day.
pub fn sync_window_days(requested: i64) -> i64 {
    requested.clamp(1, MAX_SYNC_DAYS)
}

/// Start a sync on a detached task and return immediately.
///
/// An empty body is treated as `{"days": 1}`.
async fn trigger_sync(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    body: Bytes,
) -> Result<Json<SyncResponse>> {
    let req: SyncRequest = if body.is_empty() {
        SyncRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| AppError::BadRequest(format!("Invalid request body: {}", e)))?
    };

    let days = sync_window_days(req.days);
    let cutoff = Utc::now() - Duration::days(days);

    let started = state
        .sync
        .spawn_detached(cutoff, state.config.sync_page_size);

    tracing::info!(
        athlete_id = user.athlete_id,
        days,
        started,
        "Admin sync requested"
    );

    let status = if started {
        "sync started"
    } else {
        "sync already running"
    };

    Ok(Json(SyncResponse {
        status: status.to_string(),
    }))
}

// ─── Activities ──────────────────────────────────────────────

async fn delete_activity(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    let activity_id: u64 = id
        .parse()
        .map_err(|_| AppError::BadRequest("Invalid activity ID".to_string()))?;

    if !state.store.delete_activity(activity_id).await? {
        return Err(AppError::NotFound(format!("Activity {}", activity_id)));
    }

    tracing::info!(athlete_id = user.athlete_id, activity_id, "Activity deleted");
    Ok(StatusCode::NO_CONTENT)
}

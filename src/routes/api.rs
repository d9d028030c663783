// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Read-only data routes for API key holders.

use crate::error::{AppError, Result};
use crate::models::Activity;
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;

/// Page size when `limit` is absent or invalid.
pub const DEFAULT_LIMIT: u32 = 20;

/// Largest page served in one request.
pub const MAX_LIMIT: u32 = 200;

/// API routes (require an API key).
/// The auth middleware is applied in routes/mod.rs for these routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/v1/activities", get(list_activities))
        .route("/api/v1/activities/{id}", get(get_activity))
}

/// Raw pagination parameters. Parsed leniently: bad values fall back to defaults.
#[derive(Deserialize)]
struct ActivitiesQuery {
    limit: Option<String>,
    offset: Option<String>,
}

/// `limit` must be a positive integer, otherwise the default applies.
/// Values above `MAX_LIMIT` are clamped.
fn parse_limit(raw: Option<&str>) -> u32 {
    raw.and_then(|v| v.trim().parse::<i64>().ok())
        .filter(|&l| l > 0)
        .map(|l| l.min(i64::from(MAX_LIMIT)) as u32)
        .unwrap_or(DEFAULT_LIMIT)
}

/// `offset` must be a non-negative integer, otherwise zero.
fn parse_offset(raw: Option<&str>) -> u32 {
    raw.and_then(|v| v.trim().parse::<u32>().ok())
        .unwrap_or(0)
}

/// List activities, newest first.
///
/// `limit` defaults to 20 and is capped at `MAX_LIMIT`; larger values return
/// `MAX_LIMIT` records.
async fn list_activities(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ActivitiesQuery>,
) -> Result<Json<Vec<Activity>>> {
    let limit = parse_limit(params.limit.as_deref());
    let offset = parse_offset(params.offset.as_deref());

    let activities = state.store.list_activities(limit, offset).await?;
    Ok(Json(activities))
}

/// Fetch one activity by its Strava ID.
async fn get_activity(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Activity>> {
    let activity_id: u64 = id
        .parse()
        .map_err(|_| AppError::BadRequest("Invalid activity ID".to_string()))?;

    let activity = state
        .store
        .get_activity(activity_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Activity {}", activity_id)))?;

    Ok(Json(activity))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_limit() {
        assert_eq!(parse_limit(None), DEFAULT_LIMIT);
        assert_eq!(parse_limit(Some("5")), 5);
        assert_eq!(parse_limit(Some("0")), DEFAULT_LIMIT);
        assert_eq!(parse_limit(Some("-3")), DEFAULT_LIMIT);
        assert_eq!(parse_limit(Some("ten")), DEFAULT_LIMIT);
        assert_eq!(parse_limit(Some("")), DEFAULT_LIMIT);
        assert_eq!(parse_limit(Some("100000")), MAX_LIMIT);
    }

    #[test]
    fn test_parse_offset() {
        assert_eq!(parse_offset(None), 0);
        assert_eq!(parse_offset(Some("40")), 40);
        assert_eq!(parse_offset(Some("-1")), 0);
        assert_eq!(parse_offset(Some("1.5")), 0);
    }
}

// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Strava OAuth authentication routes.

use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use crate::error::{AppError, Result};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/auth/strava", get(auth_start))
        .route("/api/auth/callback", get(auth_callback))
}

/// Authorization URL for API clients.
#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct AuthStartResponse {
    pub auth_url: String,
}

/// Session issued after a successful authorization.
#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct AuthCallbackResponse {
    pub token: String,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub athlete_id: u64,
    /// Seconds until the session token expires
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub expires_in: u64,
}

/// Start OAuth flow: redirect browsers to Strava, hand API clients the URL.
async fn auth_start(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Result<Response> {
    let auth_url = state.oauth.start_authorization()?;

    tracing::info!(
        client_id = %state.config.strava_client_id,
        "Starting OAuth flow"
    );

    if prefers_html(&headers) {
        Ok(found(&auth_url))
    } else {
        Ok(Json(AuthStartResponse { auth_url }).into_response())
    }
}

#[derive(Deserialize)]
pub struct CallbackParams {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// OAuth callback - exchange code for tokens, create session.
async fn auth_callback(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(params): Query<CallbackParams>,
) -> Result<Response> {
    // Check for OAuth errors
    if let Some(error) = params.error {
        tracing::warn!(error = %error, "OAuth error from Strava");
        return Err(AppError::BadRequest(format!("Authorization denied: {}", error)));
    }

    let oauth_state = params
        .state
        .ok_or_else(|| AppError::BadRequest("Missing OAuth state".to_string()))?;
    state.oauth.verify_state(&oauth_state, chrono::Utc::now())?;

    let code = params
        .code
        .filter(|c| !c.is_empty())
        .ok_or_else(|| AppError::BadRequest("Missing authorization code".to_string()))?;

    let authorization = state.oauth.complete_authorization(&code).await?;

    if prefers_html(&headers) {
        let redirect_url = format!(
            "{}/callback?token={}",
            state.config.frontend_url, authorization.session_token
        );
        return Ok(found(&redirect_url));
    }

    Ok(Json(AuthCallbackResponse {
        token: authorization.session_token,
        athlete_id: authorization.identity.athlete_id,
        expires_in: state.sessions.duration().as_secs(),
    })
    .into_response())
}

/// Whether the caller looks like a browser rather than an API client.
///
/// An explicit `Accept` decides; without one, any `User-Agent` counts as a browser.
pub fn prefers_html(headers: &HeaderMap) -> bool {
    if let Some(accept) = headers.get(header::ACCEPT).and_then(|h| h.to_str().ok()) {
        let accept = accept.trim();
        if !accept.is_empty() {
            return accept.contains("text/html") || accept == "*/*";
        }
    }

    headers
        .get(header::USER_AGENT)
        .and_then(|h| h.to_str().ok())
        .is_some_and(|ua| !ua.trim().is_empty())
}

/// 302 redirect.
fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.to_string())]).into_response()
}

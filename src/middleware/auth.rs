// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Authentication middleware.
//!
//! Each protected route group is wrapped in [`enforce`] with a [`Requires`]
//! naming the capability the caller must present.

use crate::error::AppError;
use crate::AppState;
use axum::{
    extract::{Query, Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use serde::Deserialize;
use std::sync::Arc;

/// Header carrying an API key.
pub const API_KEY_HEADER: &str = "X-API-Key";

/// Credential a route group demands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    /// A valid API key. No identity is attached.
    ApiKey,
    /// A valid session claim. Attaches [`AuthUser`].
    Session,
}

/// Middleware state: the application plus the capability to enforce.
#[derive(Clone)]
pub struct Requires {
    state: Arc<AppState>,
    capability: Capability,
}

impl Requires {
    pub fn new(state: Arc<AppState>, capability: Capability) -> Self {
        Self { state, capability }
    }
}

/// Authenticated user extracted from a session claim.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub athlete_id: u64,
}

/// API key passed as `?api_key=`.
#[derive(Deserialize)]
struct ApiKeyQuery {
    api_key: Option<String>,
}

/// Reject the request with 401 unless it carries the required capability.
pub async fn enforce(
    State(requires): State<Requires>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    match requires.capability {
        Capability::ApiKey => {
            let key = api_key_from(&request).ok_or(AppError::Unauthorized)?;
            if !requires.state.api_keys.validate(&key).await? {
                tracing::debug!("Rejected invalid or expired API key");
                return Err(AppError::Unauthorized);
            }
        }
        Capability::Session => {
            let token = bearer_token(&request).ok_or(AppError::Unauthorized)?;
            let athlete_id = requires.state.sessions.validate(token)?;
            request.extensions_mut().insert(AuthUser { athlete_id });
        }
    }

    Ok(next.run(request).await)
}

/// The API key from the header, falling back to the query string.
fn api_key_from(request: &Request) -> Option<String> {
    let from_header = request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|h| h.to_str().ok())
        .map(str::trim)
        .filter(|k| !k.is_empty());

    if let Some(key) = from_header {
        return Some(key.to_string());
    }

    Query::<ApiKeyQuery>::try_from_uri(request.uri())
        .ok()
        .and_then(|Query(q)| q.api_key)
        .filter(|k| !k.is_empty())
}

fn bearer_token(request: &Request) -> Option<&str> {
    request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

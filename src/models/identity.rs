// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Authenticated Strava athlete with its OAuth credentials.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Margin before token expiration when we proactively refresh (5 minutes).
pub const TOKEN_REFRESH_MARGIN_SECS: i64 = 5 * 60;

/// Stored identity, keyed by the Strava athlete ID.
///
/// At most one credential pair exists per athlete; re-authorization
/// overwrites it in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identity {
    /// Strava athlete ID (also used as document ID)
    pub athlete_id: u64,
    pub firstname: String,
    pub lastname: String,
    pub city: Option<String>,
    pub country: Option<String>,
    /// Profile picture URL
    pub profile_picture: Option<String>,
    pub access_token: String,
    /// Empty when the provider did not hand out a refresh token.
    pub refresh_token: String,
    pub token_expires_at: DateTime<Utc>,
    /// Set when the provider rejected our refresh token. Cleared on re-authorization.
    #[serde(default)]
    pub refresh_failed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Where an identity stands in the token lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenState {
    Unauthenticated,
    Authenticated,
    /// Access token expired or about to; a refresh will be attempted.
    TokenExpiring,
    /// Terminal until the athlete authorizes again.
    RefreshFailed,
}

impl TokenState {
    /// Derive the token state of an optional identity at `now`.
    pub fn of(identity: Option<&Identity>, now: DateTime<Utc>) -> Self {
        match identity {
            None => TokenState::Unauthenticated,
            Some(identity) if identity.refresh_failed_at.is_some() => TokenState::RefreshFailed,
            Some(identity) if identity.access_token.is_empty() => TokenState::Unauthenticated,
            Some(identity) => {
                let margin = Duration::seconds(TOKEN_REFRESH_MARGIN_SECS);
                if now + margin < identity.token_expires_at {
                    TokenState::Authenticated
                } else {
                    TokenState::TokenExpiring
                }
            }
        }
    }
}

impl Identity {
    pub fn token_state(&self, now: DateTime<Utc>) -> TokenState {
        TokenState::of(Some(self), now)
    }

    pub fn has_refresh_token(&self) -> bool {
        !self.refresh_token.is_empty()
    }
}

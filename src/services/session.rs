// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Signed session claims (HS256 JWTs) for the admin routes.

use crate::error::AppError;
use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// JWT claims structure.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (Strava athlete ID)
    pub sub: String,
    /// Expiration time (Unix timestamp)
    pub exp: usize,
    /// Issued at (Unix timestamp)
    pub iat: usize,
}

/// Issues and validates session claims with a process-wide signing key.
#[derive(Clone)]
pub struct SessionIssuer {
    signing_key: Vec<u8>,
    duration: Duration,
}

impl SessionIssuer {
    pub fn new(signing_key: Vec<u8>, duration: Duration) -> Self {
        Self {
            signing_key,
            duration,
        }
    }

    /// Lifetime of issued claims.
    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Sign a claim for `athlete_id` expiring one session duration from now.
    pub fn issue(&self, athlete_id: u64) -> Result<String, AppError> {
        self.issue_at(athlete_id, Utc::now())
    }

    pub fn issue_at(&self, athlete_id: u64, now: DateTime<Utc>) -> Result<String, AppError> {
        let iat = now.timestamp().max(0) as usize;
        let claims = Claims {
            sub: athlete_id.to_string(),
            iat,
            exp: iat + self.duration.as_secs() as usize,
        };

        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(&self.signing_key),
        )
        .map_err(|e| AppError::Internal(anyhow::anyhow!("JWT creation failed: {}", e)))
    }

    /// Verify signature and expiry, returning the subject athlete ID.
    pub fn validate(&self, token: &str) -> Result<u64, AppError> {
        self.validate_at(token, Utc::now())
    }

    /// Like [`validate`](Self::validate) but checks expiry against `now`.
    ///
    /// A claim is accepted strictly before its `exp` second.
    pub fn validate_at(&self, token: &str, now: DateTime<Utc>) -> Result<u64, AppError> {
        let key = DecodingKey::from_secret(&self.signing_key);
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is checked below against the injected clock.
        validation.validate_exp = false;
        validation.required_spec_claims.clear();
        validation.leeway = 0;

        let token_data =
            decode::<Claims>(token, &key, &validation).map_err(|_| AppError::Unauthorized)?;

        if now.timestamp() >= token_data.claims.exp as i64 {
            return Err(AppError::Unauthorized);
        }

        token_data
            .claims
            .sub
            .parse()
            .map_err(|_| AppError::Unauthorized)
    }
}

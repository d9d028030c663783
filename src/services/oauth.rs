// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! OAuth flow management: authorization, code exchange and token refresh.

use crate::db::Store;
use crate::error::AppError;
use crate::models::{Identity, TokenState};
use crate::services::session::SessionIssuer;
use crate::services::strava::StravaApi;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use hmac::{Hmac, Mac};
use ring::rand::{SecureRandom, SystemRandom};
use sha2::Sha256;
use std::sync::Arc;
use subtle::ConstantTimeEq;
use tokio::sync::Mutex;

// Type alias for HMAC-SHA256
type HmacSha256 = Hmac<Sha256>;

const STRAVA_AUTHORIZE_URL: &str = "https://www.strava.com/oauth/authorize";

/// Broadest read scope, including private activities.
pub const STRAVA_SCOPE: &str = "read,read_all,profile:read_all,activity:read_all";

/// Maximum age of an OAuth `state` parameter.
const STATE_MAX_AGE_SECS: i64 = 10 * 60;

/// Shared refresh locks, one per athlete.
pub type RefreshLocks = Arc<DashMap<u64, Arc<Mutex<()>>>>;

/// Result of a completed authorization.
#[derive(Debug, Clone)]
pub struct Authorization {
    pub identity: Identity,
    pub session_token: String,
}

/// Drives the Strava authorization-code flow and keeps stored tokens fresh.
pub struct OAuthService {
    strava: Arc<dyn StravaApi>,
    store: Arc<dyn Store>,
    sessions: SessionIssuer,
    client_id: String,
    callback_url: String,
    state_key: Vec<u8>,
    rng: SystemRandom,
    refresh_locks: RefreshLocks,
}

impl OAuthService {
    pub fn new(
        strava: Arc<dyn StravaApi>,
        store: Arc<dyn Store>,
        sessions: SessionIssuer,
        client_id: String,
        callback_url: String,
        state_key: Vec<u8>,
    ) -> Self {
        Self {
            strava,
            store,
            sessions,
            client_id,
            callback_url,
            state_key,
            rng: SystemRandom::new(),
            refresh_locks: Arc::new(DashMap::new()),
        }
    }

    // ─── Authorization ───────────────────────────────────────────────────────

    /// Build the provider authorization URL with a freshly signed `state`.
    pub fn start_authorization(&self) -> Result<String, AppError> {
        let state = self.sign_state(Utc::now())?;

        Ok(format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&approval_prompt=auto&scope={}&state={}",
            STRAVA_AUTHORIZE_URL,
            urlencoding::encode(&self.client_id),
            urlencoding::encode(&self.callback_url),
            urlencoding::encode(STRAVA_SCOPE),
            state
        ))
    }

    /// Sign a `state` value: "timestamp_hex|nonce_hex|signature_hex", base64 encoded.
    pub fn sign_state(&self, now: DateTime<Utc>) -> Result<String, AppError> {
        let mut nonce = [0u8; 16];
        self.rng
            .fill(&mut nonce)
            .map_err(|_| AppError::Internal(anyhow::anyhow!("Failed to generate state nonce")))?;

        let payload = format!("{:x}|{}", now.timestamp(), hex::encode(nonce));
        let signature = self.state_signature(&payload)?;

        Ok(URL_SAFE_NO_PAD.encode(format!("{}|{}", payload, signature)))
    }

    /// Check the signature and age of a `state` value returned on the callback.
    pub fn verify_state(&self, state: &str, now: DateTime<Utc>) -> Result<(), AppError> {
        let invalid = || AppError::BadRequest("Invalid OAuth state".to_string());

        let bytes = URL_SAFE_NO_PAD.decode(state).map_err(|_| invalid())?;
        let decoded = String::from_utf8(bytes).map_err(|_| invalid())?;

        let Some((payload, signature_hex)) = decoded.rsplit_once('|') else {
            return Err(invalid());
        };

        let expected = self.state_signature(payload)?;
        if !bool::from(expected.as_bytes().ct_eq(signature_hex.as_bytes())) {
            tracing::error!("OAuth state signature mismatch! Potential tampering.");
            return Err(invalid());
        }

        let timestamp_hex = payload.split('|').next().ok_or_else(invalid)?;
        let issued = i64::from_str_radix(timestamp_hex, 16).map_err(|_| invalid())?;
        let age = now.timestamp() - issued;
        if !(0..=STATE_MAX_AGE_SECS).contains(&age) {
            tracing::warn!(age, "OAuth state expired");
            return Err(AppError::BadRequest("OAuth state expired".to_string()));
        }

        Ok(())
    }

    fn state_signature(&self, payload: &str) -> Result<String, AppError> {
        let mut mac = HmacSha256::new_from_slice(&self.state_key)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("HMAC init failed: {}", e)))?;
        mac.update(payload.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    /// Exchange an authorization code, persist the identity and mint a session.
    pub async fn complete_authorization(&self, code: &str) -> Result<Authorization, AppError> {
        tracing::info!("Exchanging authorization code for tokens");

        let exchange = self.strava.exchange_code(code).await.map_err(into_exchange)?;

        let now = Utc::now();
        let athlete = exchange.athlete;
        let identity = Identity {
            athlete_id: athlete.id,
            firstname: athlete.firstname,
            lastname: athlete.lastname,
            city: athlete.city,
            country: athlete.country,
            profile_picture: athlete.profile,
            access_token: exchange.access_token,
            refresh_token: exchange.refresh_token.unwrap_or_default(),
            token_expires_at: timestamp_or(exchange.expires_at, now),
            refresh_failed_at: None,
            created_at: now,
            updated_at: now,
        };

        // Serialized with refreshes so a late refresh cannot clobber the new tokens.
        let lock = self.refresh_lock(identity.athlete_id);
        let guard = lock.lock().await;
        let identity = self.store.upsert_identity(&identity).await?;
        drop(guard);

        let session_token = self.sessions.issue(identity.athlete_id)?;

        tracing::info!(
            athlete_id = identity.athlete_id,
            firstname = %identity.firstname,
            "OAuth successful, identity stored"
        );

        Ok(Authorization {
            identity,
            session_token,
        })
    }

    // ─── Token Management ────────────────────────────────────────────────────

    /// Trade the stored refresh token for a new pair and persist it.
    ///
    /// A provider rejection marks the identity `RefreshFailed`. Nothing is
    /// written if the stored identity was re-authorized in the meantime.
    pub async fn refresh(&self, identity: &Identity) -> Result<Identity, AppError> {
        let athlete_id = identity.athlete_id;
        if !identity.has_refresh_token() {
            return Err(AppError::RefreshUnavailable(athlete_id));
        }

        tracing::info!(athlete_id, "Access token expiring, refreshing");

        let tokens = match self.strava.refresh_token(&identity.refresh_token).await {
            Ok(tokens) => tokens,
            Err(AppError::Exchange(msg)) => {
                tracing::warn!(athlete_id, error = %msg, "Strava rejected refresh token");
                if let Some(mut failed) = self.still_current(identity).await? {
                    failed.refresh_failed_at = Some(Utc::now());
                    self.store.upsert_identity(&failed).await?;
                }
                return Err(AppError::Exchange(msg));
            }
            Err(e) => return Err(into_exchange(e)),
        };

        let Some(mut refreshed) = self.still_current(identity).await? else {
            return self.load_identity(athlete_id).await;
        };
        refreshed.access_token = tokens.access_token;
        refreshed.refresh_token = tokens.refresh_token;
        refreshed.token_expires_at = timestamp_or(tokens.expires_at, Utc::now());
        refreshed.refresh_failed_at = None;

        let stored = self.store.upsert_identity(&refreshed).await?;
        tracing::info!(athlete_id, "Token refreshed");
        Ok(stored)
    }

    /// The stored identity if it still holds the refresh token of `sent`.
    async fn still_current(&self, sent: &Identity) -> Result<Option<Identity>, AppError> {
        let stored = self.store.get_identity(sent.athlete_id).await?;
        match stored {
            Some(stored) if stored.refresh_token == sent.refresh_token => Ok(Some(stored)),
            _ => {
                tracing::info!(
                    athlete_id = sent.athlete_id,
                    "Identity re-authorized during refresh, discarding result"
                );
                Ok(None)
            }
        }
    }

    fn refresh_lock(&self, athlete_id: u64) -> Arc<Mutex<()>> {
        self.refresh_locks
            .entry(athlete_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// A non-expiring access token for `athlete_id`, refreshing if needed.
    ///
    /// Concurrent callers for the same athlete share a single refresh.
    pub async fn valid_access_token(&self, athlete_id: u64) -> Result<String, AppError> {
        let identity = self.load_identity(athlete_id).await?;
        if identity.token_state(Utc::now()) == TokenState::Authenticated {
            return Ok(identity.access_token);
        }

        let lock = self.refresh_lock(athlete_id);
        let _guard = lock.lock().await;

        // Another task may have refreshed while we were waiting.
        let identity = self.load_identity(athlete_id).await?;
        match identity.token_state(Utc::now()) {
            TokenState::Authenticated => Ok(identity.access_token),
            TokenState::RefreshFailed => Err(AppError::AuthUnavailable(format!(
                "refresh for athlete {} was rejected; re-authorization required",
                athlete_id
            ))),
            TokenState::TokenExpiring | TokenState::Unauthenticated => {
                Ok(self.refresh(&identity).await?.access_token)
            }
        }
    }

    /// The identity syncs run for: the most recently updated one.
    pub async fn primary_identity(&self) -> Result<Option<Identity>, AppError> {
        self.store.latest_identity().await
    }

    async fn load_identity(&self, athlete_id: u64) -> Result<Identity, AppError> {
        self.store.get_identity(athlete_id).await?.ok_or_else(|| {
            AppError::AuthUnavailable(format!("no identity stored for athlete {}", athlete_id))
        })
    }
}

/// Provider failures during an exchange are all surfaced as exchange errors.
fn into_exchange(err: AppError) -> AppError {
    match err {
        AppError::Exchange(_) => err,
        other => AppError::Exchange(other.to_string()),
    }
}

fn timestamp_or(secs: i64, fallback: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap_or(fallback)
}

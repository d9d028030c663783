// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application configuration loaded from environment variables.
//!
//! A `.env` file is honoured for local development. The loaded `Config` is
//! handed to every component at construction time.

use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Which record store backs the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Firestore,
    Memory,
}

impl FromStr for StoreBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "firestore" => Ok(StoreBackend::Firestore),
            "memory" => Ok(StoreBackend::Memory),
            _ => Err(ConfigError::Invalid("STORE_BACKEND")),
        }
    }
}

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // --- Environment Variables (non-sensitive) ---
    /// Strava OAuth client ID (public)
    pub strava_client_id: String,
    /// Redirect URI registered with Strava for the OAuth callback
    pub strava_callback_url: String,
    /// Frontend URL that browser logins are sent back to
    pub frontend_url: String,
    /// GCP project ID (Firestore)
    pub gcp_project_id: String,
    /// Record store implementation
    pub store_backend: StoreBackend,
    /// Bind address
    pub host: String,
    /// Server port
    pub port: u16,
    /// Lifetime of issued session claims
    pub session_duration: Duration,
    /// Interval between scheduled sync cycles
    pub sync_interval: Duration,
    /// Trailing window covered by a scheduled sync cycle
    pub sync_window: Duration,
    /// Activities requested per provider page
    pub sync_page_size: u32,
    /// Upper bound on inbound request handling and outbound provider calls
    pub request_timeout: Duration,

    // --- Secrets ---
    /// Strava OAuth client secret
    pub strava_client_secret: String,
    /// JWT signing key for session tokens (raw bytes)
    pub jwt_signing_key: Vec<u8>,
    /// HMAC key for the OAuth `state` parameter
    pub oauth_state_key: Vec<u8>,
}

impl Config {
    /// Default config for testing only.
    pub fn test_default() -> Self {
        Self {
            strava_client_id: "test_client_id".to_string(),
            strava_callback_url: "http://localhost:8080/api/auth/callback".to_string(),
            frontend_url: "http://localhost:5173".to_string(),
            gcp_project_id: "test-project".to_string(),
            store_backend: StoreBackend::Memory,
            host: "127.0.0.1".to_string(),
            port: 8080,
            session_duration: Duration::from_secs(60 * 60),
            sync_interval: Duration::from_secs(60 * 60),
            sync_window: Duration::from_secs(24 * 60 * 60),
            sync_page_size: 100,
            request_timeout: Duration::from_secs(15),
            strava_client_secret: "test_secret".to_string(),
            jwt_signing_key: b"test_jwt_key_32_bytes_minimum!!".to_vec(),
            oauth_state_key: b"test_oauth_state_key_32_bytes!!".to_vec(),
        }
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let api_url = env::var("API_URL")
            .map(|v| v.trim_end_matches('/').to_string())
            .unwrap_or_else(|_| "http://localhost:8080".to_string());

        let jwt_signing_key = env::var("JWT_SIGNING_KEY")
            .map_err(|_| ConfigError::Missing("JWT_SIGNING_KEY"))?
            .into_bytes();

        let oauth_state_key = env::var("OAUTH_STATE_KEY")
            .map(String::into_bytes)
            .unwrap_or_else(|_| jwt_signing_key.clone());

        Ok(Self {
            strava_client_id: env::var("STRAVA_CLIENT_ID")
                .map_err(|_| ConfigError::Missing("STRAVA_CLIENT_ID"))?,
            strava_callback_url: env::var("STRAVA_CALLBACK_URL")
                .unwrap_or_else(|_| format!("{}/api/auth/callback", api_url)),
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            gcp_project_id: env::var("GCP_PROJECT_ID").unwrap_or_else(|_| "local-dev".to_string()),
            store_backend: match env::var("STORE_BACKEND") {
                Ok(v) => v.parse()?,
                Err(_) => StoreBackend::Firestore,
            },
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: parse_or("PORT", 8080)?,
            session_duration: Duration::from_secs(60 * parse_or("SESSION_DURATION_MINUTES", 60)?),
            sync_interval: Duration::from_secs(parse_or("SYNC_INTERVAL_SECS", 3600)?),
            sync_window: Duration::from_secs(60 * 60 * parse_or("SYNC_WINDOW_HOURS", 24)?),
            sync_page_size: parse_or("SYNC_PAGE_SIZE", 100)?,
            request_timeout: Duration::from_secs(parse_or("REQUEST_TIMEOUT_SECS", 15)?),

            strava_client_secret: env::var("STRAVA_CLIENT_SECRET")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("STRAVA_CLIENT_SECRET"))?,
            jwt_signing_key,
            oauth_state_key,
        })
    }
}

/// Parse an optional numeric variable, falling back to `default` when unset.
fn parse_or<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid(name)),
        Err(_) => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),
}

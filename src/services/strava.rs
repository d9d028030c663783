// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Strava API client.
//!
//! Handles:
//! - Authorization code exchange
//! - Token refresh
//! - Paged activity listing
//! - Rate limit and token error detection

use crate::error::AppError;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

const STRAVA_API_URL: &str = "https://www.strava.com/api/v3";
const STRAVA_TOKEN_URL: &str = "https://www.strava.com/oauth/token";

/// Provider operations the rest of the service depends on.
#[async_trait]
pub trait StravaApi: Send + Sync {
    /// Exchange an authorization code for tokens and the athlete profile.
    async fn exchange_code(&self, code: &str) -> Result<TokenExchange, AppError>;

    /// Trade a refresh token for a new token pair.
    async fn refresh_token(&self, refresh_token: &str) -> Result<TokenRefreshResponse, AppError>;

    /// One page of the athlete's activities started after `after` (Unix seconds).
    ///
    /// Records are returned undecoded so each one can be mapped on its own.
    async fn list_activities(
        &self,
        access_token: &str,
        after: i64,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<serde_json::Value>, AppError>;
}

/// Strava API client.
#[derive(Clone)]
pub struct StravaClient {
    http: reqwest::Client,
    base_url: String,
    token_url: String,
    client_id: String,
    client_secret: String,
}

impl StravaClient {
    /// Create a new Strava client with OAuth credentials.
    pub fn new(
        client_id: String,
        client_secret: String,
        timeout: Duration,
    ) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: STRAVA_API_URL.to_string(),
            token_url: STRAVA_TOKEN_URL.to_string(),
            client_id,
            client_secret,
        })
    }

    /// Check response and parse JSON body.
    async fn check_response_json<T: for<'de> Deserialize<'de>>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, AppError> {
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();

            if status.as_u16() == 429 {
                tracing::warn!("Strava rate limit hit (429)");
                return Err(AppError::StravaApi(AppError::STRAVA_RATE_LIMIT.to_string()));
            }

            if status.as_u16() == 401 {
                return Err(AppError::StravaApi(
                    AppError::STRAVA_TOKEN_ERROR.to_string(),
                ));
            }

            return Err(AppError::StravaApi(format!("HTTP {}: {}", status, body)));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::StravaApi(format!("JSON parse error: {}", e)))
    }

    /// POST a grant to the token endpoint.
    ///
    /// A rejection by Strava is [`AppError::Exchange`]; failing to reach it at
    /// all is [`AppError::StravaApi`].
    async fn post_token_form<T: for<'de> Deserialize<'de>>(
        &self,
        grant: &[(&str, &str)],
    ) -> Result<T, AppError> {
        let mut form = vec![
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
        ];
        form.extend_from_slice(grant);

        let response = self
            .http
            .post(&self.token_url)
            .form(&form)
            .send()
            .await
            .map_err(|e| AppError::StravaApi(format!("Token request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();

            if status.as_u16() == 429 {
                tracing::warn!("Strava rate limit hit (429)");
                return Err(AppError::StravaApi(AppError::STRAVA_RATE_LIMIT.to_string()));
            }

            if status.is_server_error() {
                return Err(AppError::StravaApi(format!("HTTP {}: {}", status, body)));
            }

            tracing::error!(status = %status, body = %body, "Strava token endpoint rejected request");
            return Err(AppError::Exchange(format!(
                "Token endpoint returned status {}",
                status
            )));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::Exchange(format!("Failed to parse token response: {}", e)))
    }
}

#[async_trait]
impl StravaApi for StravaClient {
    async fn exchange_code(&self, code: &str) -> Result<TokenExchange, AppError> {
        self.post_token_form(&[("code", code), ("grant_type", "authorization_code")])
            .await
    }

    async fn refresh_token(&self, refresh_token: &str) -> Result<TokenRefreshResponse, AppError> {
        self.post_token_form(&[
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
        ])
        .await
    }

    async fn list_activities(
        &self,
        access_token: &str,
        after: i64,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<serde_json::Value>, AppError> {
        let url = format!("{}/athlete/activities", self.base_url);

        let response = self
            .http
            .get(&url)
            .bearer_auth(access_token)
            .query(&[
                ("after", after.to_string()),
                ("page", page.to_string()),
                ("per_page", per_page.to_string()),
            ])
            .send()
            .await
            .map_err(|e| AppError::StravaApi(e.to_string()))?;

        self.check_response_json(response).await
    }
}

/// Token refresh response from Strava.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenRefreshResponse {
    pub access_token: String,
    pub refresh_token: String,
    /// Unix seconds
    pub expires_at: i64,
}

/// Token exchange response from Strava OAuth (includes athlete info).
#[derive(Debug, Clone, Deserialize)]
pub struct TokenExchange {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Unix seconds
    pub expires_at: i64,
    pub athlete: StravaAthlete,
}

/// Athlete info from OAuth token exchange.
#[derive(Debug, Clone, Deserialize)]
pub struct StravaAthlete {
    pub id: u64,
    #[serde(default)]
    pub firstname: String,
    #[serde(default)]
    pub lastname: String,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub profile: Option<String>,
}

/// Summary activity as returned by `/athlete/activities`.
///
/// Only `id` and `start_date` are required; Strava omits many fields for
/// manual or private activities.
#[derive(Debug, Clone, Deserialize)]
pub struct StravaActivitySummary {
    pub id: u64,
    pub start_date: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, rename = "type")]
    pub activity_type: String,
    #[serde(default)]
    pub sport_type: Option<String>,
    #[serde(default)]
    pub athlete: Option<SummaryAthlete>,
    #[serde(default)]
    pub distance: f64,
    #[serde(default)]
    pub moving_time: u64,
    #[serde(default)]
    pub elapsed_time: u64,
    #[serde(default)]
    pub total_elevation_gain: f64,
    #[serde(default)]
    pub start_date_local: Option<String>,
    #[serde(default)]
    pub timezone: Option<String>,
    /// `null` or `[]` for manual and indoor activities
    #[serde(default)]
    pub start_latlng: Option<Vec<f64>>,
    #[serde(default)]
    pub end_latlng: Option<Vec<f64>>,
    #[serde(default)]
    pub achievement_count: u32,
    #[serde(default)]
    pub kudos_count: u32,
    #[serde(default)]
    pub comment_count: u32,
    #[serde(default)]
    pub athlete_count: u32,
    #[serde(default)]
    pub photo_count: u32,
    #[serde(default)]
    pub map: Option<SummaryMap>,
    #[serde(default)]
    pub trainer: bool,
    #[serde(default)]
    pub commute: bool,
    #[serde(default)]
    pub manual: bool,
    #[serde(default)]
    pub private: bool,
    #[serde(default)]
    pub visibility: Option<String>,
    #[serde(default)]
    pub flagged: bool,
    #[serde(default)]
    pub workout_type: Option<i32>,
    #[serde(default)]
    pub average_speed: f64,
    #[serde(default)]
    pub max_speed: f64,
    #[serde(default)]
    pub has_heartrate: bool,
    #[serde(default)]
    pub average_heartrate: Option<f64>,
    #[serde(default)]
    pub max_heartrate: Option<f64>,
    #[serde(default)]
    pub elev_high: Option<f64>,
    #[serde(default)]
    pub elev_low: Option<f64>,
    #[serde(default)]
    pub upload_id: Option<u64>,
    #[serde(default)]
    pub external_id: Option<String>,
}

/// Meta athlete embedded in an activity summary.
#[derive(Debug, Clone, Deserialize)]
pub struct SummaryAthlete {
    pub id: u64,
}

/// Activity map data.
#[derive(Debug, Clone, Deserialize)]
pub struct SummaryMap {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub summary_polyline: Option<String>,
}

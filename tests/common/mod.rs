// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use async_trait::async_trait;
use axum::body::Body;
use axum::http::Response;
use chrono::{Duration, Utc};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use strava_sync::config::Config;
use strava_sync::db::{FirestoreDb, MemoryDb, Store};
use strava_sync::error::AppError;
use strava_sync::models::Identity;
use strava_sync::routes::create_router;
use strava_sync::services::strava::{
    StravaApi, StravaAthlete, TokenExchange, TokenRefreshResponse,
};
use strava_sync::AppState;

/// Athlete the fake provider authorizes.
#[allow(dead_code)]
pub const TEST_ATHLETE_ID: u64 = 4242;

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test database connection.
#[allow(dead_code)]
pub async fn test_db() -> FirestoreDb {
    FirestoreDb::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

/// In-process stand-in for Strava.
///
/// Serves `pages` in order (page N is `pages[N-1]`, empty beyond) and records
/// every call.
#[derive(Default)]
pub struct FakeStrava {
    pub pages: Mutex<Vec<Vec<serde_json::Value>>>,
    pub reject_refresh: AtomicBool,
    pub fail_listing: AtomicBool,
    pub refresh_calls: AtomicUsize,
    pub list_calls: AtomicUsize,
    /// `after` parameter of the most recent listing
    pub last_after: Mutex<Option<i64>>,
    /// Delay before each listing returns
    pub list_delay_ms: AtomicUsize,
}

#[allow(dead_code)]
impl FakeStrava {
    pub fn with_pages(pages: Vec<Vec<serde_json::Value>>) -> Self {
        Self {
            pages: Mutex::new(pages),
            ..Default::default()
        }
    }
}

#[async_trait]
impl StravaApi for FakeStrava {
    async fn exchange_code(&self, code: &str) -> Result<TokenExchange, AppError> {
        if code != "valid-code" {
            return Err(AppError::Exchange("Bad Request".to_string()));
        }
        Ok(TokenExchange {
            access_token: "fake-access".to_string(),
            refresh_token: Some("fake-refresh".to_string()),
            expires_at: (Utc::now() + Duration::hours(6)).timestamp(),
            athlete: StravaAthlete {
                id: TEST_ATHLETE_ID,
                firstname: "Test".to_string(),
                lastname: "Athlete".to_string(),
                city: Some("Palo Alto".to_string()),
                country: Some("United States".to_string()),
                profile: None,
            },
        })
    }

    async fn refresh_token(&self, _refresh_token: &str) -> Result<TokenRefreshResponse, AppError> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        if self.reject_refresh.load(Ordering::SeqCst) {
            return Err(AppError::Exchange("invalid_grant".to_string()));
        }
        Ok(TokenRefreshResponse {
            access_token: "fake-access-refreshed".to_string(),
            refresh_token: "fake-refresh-2".to_string(),
            expires_at: (Utc::now() + Duration::hours(6)).timestamp(),
        })
    }

    async fn list_activities(
        &self,
        _access_token: &str,
        after: i64,
        page: u32,
        _per_page: u32,
    ) -> Result<Vec<serde_json::Value>, AppError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_after.lock().unwrap() = Some(after);

        let delay = self.list_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(delay as u64)).await;
        }

        if self.fail_listing.load(Ordering::SeqCst) {
            return Err(AppError::StravaApi(AppError::STRAVA_RATE_LIMIT.to_string()));
        }

        let pages = self.pages.lock().unwrap();
        Ok(pages
            .get(page as usize - 1)
            .cloned()
            .unwrap_or_default())
    }
}

/// A provider activity record as returned by `/athlete/activities`.
#[allow(dead_code)]
pub fn activity_json(id: u64, start: chrono::DateTime<Utc>, distance: f64) -> serde_json::Value {
    serde_json::json!({
        "id": id,
        "athlete": { "id": TEST_ATHLETE_ID },
        "name": format!("Activity {}", id),
        "type": "Ride",
        "sport_type": "Ride",
        "distance": distance,
        "moving_time": 3600,
        "elapsed_time": 3700,
        "total_elevation_gain": 100.0,
        "start_date": start.to_rfc3339(),
        "start_latlng": [37.4, -122.1],
        "end_latlng": [37.4, -122.1],
        "map": { "id": format!("a{}", id), "summary_polyline": "abc" }
    })
}

/// Test harness: router, shared state and handles on the fakes.
#[allow(dead_code)]
pub struct TestApp {
    pub router: axum::Router,
    pub state: Arc<AppState>,
    pub store: Arc<MemoryDb>,
    pub strava: Arc<FakeStrava>,
}

/// Create a test app over an in-memory store and the given fake provider.
#[allow(dead_code)]
pub fn create_test_app_with(strava: FakeStrava) -> TestApp {
    let config = Config::test_default();
    let store = Arc::new(MemoryDb::new());
    let strava = Arc::new(strava);

    let state = Arc::new(AppState::new(config, store.clone(), strava.clone()));

    TestApp {
        router: create_router(state.clone()),
        state,
        store,
        strava,
    }
}

#[allow(dead_code)]
pub fn create_test_app() -> TestApp {
    create_test_app_with(FakeStrava::default())
}

/// Store an identity whose access token expires in `expires_in`.
#[allow(dead_code)]
pub async fn seed_identity(store: &MemoryDb, expires_in: Duration) -> Identity {
    let now = Utc::now();
    let identity = Identity {
        athlete_id: TEST_ATHLETE_ID,
        firstname: "Test".to_string(),
        lastname: "Athlete".to_string(),
        city: None,
        country: None,
        profile_picture: None,
        access_token: "seeded-access".to_string(),
        refresh_token: "seeded-refresh".to_string(),
        token_expires_at: now + expires_in,
        refresh_failed_at: None,
        created_at: now,
        updated_at: now,
    };
    store.upsert_identity(&identity).await.unwrap()
}

/// Session token for `athlete_id`.
#[allow(dead_code)]
pub fn session_token(state: &AppState, athlete_id: u64) -> String {
    state.sessions.issue(athlete_id).unwrap()
}

/// Read a response body as JSON.
#[allow(dead_code)]
pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// Poll until `f` holds or a second passes.
#[allow(dead_code)]
pub async fn eventually<F: Fn() -> bool>(f: F) -> bool {
    for _ in 0..100 {
        if f() {
            return true;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    f()
}

// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! OAuth start and callback over HTTP.
//!
//! These tests verify that:
//! 1. Browsers are redirected, API clients get JSON
//! 2. The callback rejects missing, forged and stale `state`
//! 3. A successful callback stores the identity and issues a usable session

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{Duration, Utc};
use strava_sync::db::Store;
use strava_sync::models::TokenState;
use tower::ServiceExt;

mod common;
use common::{body_json, create_test_app, TEST_ATHLETE_ID};

/// Pull the `state` query parameter out of an authorization URL.
fn state_param(auth_url: &str) -> String {
    auth_url
        .split('&')
        .find_map(|kv| kv.strip_prefix("state="))
        .unwrap()
        .to_string()
}

#[tokio::test]
async fn test_auth_start_json_for_api_clients() {
    let app = create_test_app();

    let response = app
        .router
        .oneshot(
            Request::builder()
                .uri("/api/auth/strava")
                .header(header::ACCEPT, "application/json")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let auth_url = body["auth_url"].as_str().unwrap();
    assert!(auth_url.starts_with("https://www.strava.com/oauth/authorize?"));
    assert!(auth_url.contains("client_id=test_client_id"));
    assert!(auth_url.contains("activity%3Aread_all"));

    // State is URL-safe base64 without padding
    let state = state_param(auth_url);
    assert!(!state.contains('+') && !state.contains('/') && !state.contains('='));
}

#[tokio::test]
async fn test_auth_start_redirects_browsers() {
    let app = create_test_app();

    let response = app
        .router
        .oneshot(
            Request::builder()
                .uri("/api/auth/strava")
                .header(header::ACCEPT, "text/html,application/xhtml+xml")
                .header(header::USER_AGENT, "Mozilla/5.0")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FOUND);
    let location = response.headers().get(header::LOCATION).unwrap();
    assert!(location
        .to_str()
        .unwrap()
        .starts_with("https://www.strava.com/oauth/authorize?"));
}

#[tokio::test]
async fn test_callback_issues_session_json() {
    let app = create_test_app();
    let state = app.state.oauth.sign_state(Utc::now()).unwrap();

    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/api/auth/callback?code=valid-code&state={}", state))
                .header(header::ACCEPT, "application/json")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["athlete_id"], TEST_ATHLETE_ID);
    assert_eq!(body["expires_in"], 3600);
    let token = body["token"].as_str().unwrap().to_string();

    // Identity persisted and authenticated
    let identity = app.store.get_identity(TEST_ATHLETE_ID).await.unwrap().unwrap();
    assert_eq!(identity.access_token, "fake-access");
    assert_eq!(identity.city.as_deref(), Some("Palo Alto"));
    assert_eq!(identity.token_state(Utc::now()), TokenState::Authenticated);

    // The session opens the admin routes
    let response = app
        .router
        .oneshot(
            Request::builder()
                .uri("/admin/me")
                .header(header::AUTHORIZATION, format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let me = body_json(response).await;
    assert_eq!(me["athlete_id"], TEST_ATHLETE_ID);
    assert_eq!(me["token_state"], "authenticated");
    assert!(me.get("access_token").is_none());
}

#[tokio::test]
async fn test_callback_redirects_browsers_to_frontend() {
    let app = create_test_app();
    let state = app.state.oauth.sign_state(Utc::now()).unwrap();

    let response = app
        .router
        .oneshot(
            Request::builder()
                .uri(format!("/api/auth/callback?code=valid-code&state={}", state))
                .header(header::USER_AGENT, "Mozilla/5.0")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FOUND);
    let location = response
        .headers()
        .get(header::LOCATION)
        .unwrap()
        .to_str()
        .unwrap();
    assert!(location.starts_with("http://localhost:5173/callback?token="));
}

#[tokio::test]
async fn test_callback_rejects_bad_code() {
    let app = create_test_app();
    let state = app.state.oauth.sign_state(Utc::now()).unwrap();

    let response = app
        .router
        .oneshot(
            Request::builder()
                .uri(format!("/api/auth/callback?code=expired-code&state={}", state))
                .header(header::ACCEPT, "application/json")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(body_json(response).await["error"], "exchange_error");
    assert!(app.store.latest_identity().await.unwrap().is_none());
}

#[tokio::test]
async fn test_callback_rejects_missing_code() {
    let app = create_test_app();
    let state = app.state.oauth.sign_state(Utc::now()).unwrap();

    let response = app
        .router
        .oneshot(
            Request::builder()
                .uri(format!("/api/auth/callback?state={}", state))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_callback_rejects_user_denial() {
    let app = create_test_app();

    let response = app
        .router
        .oneshot(
            Request::builder()
                .uri("/api/auth/callback?error=access_denied")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_callback_rejects_forged_and_stale_state() {
    let app = create_test_app();

    let forged = URL_SAFE_NO_PAD.encode(format!(
        "{:x}|{}|{}",
        Utc::now().timestamp(),
        "00".repeat(16),
        "ab".repeat(32)
    ));
    let stale = app
        .state
        .oauth
        .sign_state(Utc::now() - Duration::minutes(30))
        .unwrap();

    for state in [String::new(), forged, stale] {
        let response = app
            .router
            .clone()
            .oneshot(
                Request::builder()
                    .uri(format!("/api/auth/callback?code=valid-code&state={}", state))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    assert!(app.store.latest_identity().await.unwrap().is_none());
}

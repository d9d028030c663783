// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Strava-Sync: mirror Strava activities into a record store
//!
//! This crate provides the OAuth flow against Strava, an hourly activity
//! sync, and a small API (API-key protected data routes, session protected
//! admin routes) over the synced records.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use db::Store;
use services::{ApiKeyService, OAuthService, SessionIssuer, StravaApi, SyncService};
use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn Store>,
    pub sessions: SessionIssuer,
    pub oauth: Arc<OAuthService>,
    pub sync: Arc<SyncService>,
    pub api_keys: ApiKeyService,
}

impl AppState {
    /// Wire every component from its explicit dependencies.
    pub fn new(config: Config, store: Arc<dyn Store>, strava: Arc<dyn StravaApi>) -> Self {
        let sessions = SessionIssuer::new(config.jwt_signing_key.clone(), config.session_duration);

        let oauth = Arc::new(OAuthService::new(
            strava.clone(),
            store.clone(),
            sessions.clone(),
            config.strava_client_id.clone(),
            config.strava_callback_url.clone(),
            config.oauth_state_key.clone(),
        ));

        let sync = Arc::new(SyncService::new(store.clone(), strava, oauth.clone()));
        let api_keys = ApiKeyService::new(store.clone());

        Self {
            config,
            store,
            sessions,
            oauth,
            sync,
            api_keys,
        }
    }
}

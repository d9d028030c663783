// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod api_keys;
pub mod oauth;
pub mod scheduler;
pub mod session;
pub mod strava;
pub mod sync;

pub use api_keys::ApiKeyService;
pub use oauth::{Authorization, OAuthService};
pub use scheduler::SyncScheduler;
pub use session::SessionIssuer;
pub use strava::{StravaApi, StravaClient};
pub use sync::{SyncReport, SyncService};

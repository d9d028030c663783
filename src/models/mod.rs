// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod activity;
pub mod api_key;
pub mod identity;

pub use activity::{Activity, LatLng, MappingError};
pub use api_key::ApiKey;
pub use identity::{Identity, TokenState};

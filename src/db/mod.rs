// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Database layer.
//!
//! [`Store`] is the record store every component is handed at construction.
//! Each operation is atomic for a single record; nothing spans records.

pub mod firestore;
pub mod memory;

pub use firestore::FirestoreDb;
pub use memory::MemoryDb;

use crate::error::AppError;
use crate::models::{Activity, ApiKey, Identity};
use async_trait::async_trait;

/// Collection names as constants.
pub mod collections {
    pub const IDENTITIES: &str = "identities";
    pub const ACTIVITIES: &str = "activities";
    pub const API_KEYS: &str = "api_keys";
}

/// Record store for identities, activities and API keys.
#[async_trait]
pub trait Store: Send + Sync {
    // ─── Identities ─────────────────────────────────────────────

    async fn get_identity(&self, athlete_id: u64) -> Result<Option<Identity>, AppError>;

    /// Insert or overwrite an identity. An existing `created_at` is kept.
    async fn upsert_identity(&self, identity: &Identity) -> Result<Identity, AppError>;

    /// The most recently updated identity, if any.
    async fn latest_identity(&self) -> Result<Option<Identity>, AppError>;

    // ─── Activities ─────────────────────────────────────────────

    async fn get_activity(&self, activity_id: u64) -> Result<Option<Activity>, AppError>;

    /// Insert or fully overwrite an activity keyed by its ID.
    ///
    /// The first insert's `created_at` is preserved; `updated_at` is advanced
    /// on every call. Returns the record as stored.
    async fn upsert_activity(&self, activity: &Activity) -> Result<Activity, AppError>;

    /// Activities ordered by start date, newest first.
    async fn list_activities(&self, limit: u32, offset: u32) -> Result<Vec<Activity>, AppError>;

    /// Returns `false` when no such activity existed.
    async fn delete_activity(&self, activity_id: u64) -> Result<bool, AppError>;

    // ─── API Keys ───────────────────────────────────────────────

    /// Create a key record. Fails if a key with the same ID already exists.
    async fn insert_api_key(&self, key: &ApiKey) -> Result<(), AppError>;

    async fn get_api_key(&self, id: &str) -> Result<Option<ApiKey>, AppError>;

    /// Keys owned by `owner_id`, oldest first.
    async fn list_api_keys(&self, owner_id: u64) -> Result<Vec<ApiKey>, AppError>;

    /// Returns `false` when no such key existed.
    async fn set_api_key_active(&self, id: &str, is_active: bool) -> Result<bool, AppError>;

    /// Returns `false` when no such key existed.
    async fn delete_api_key(&self, id: &str) -> Result<bool, AppError>;
}

/// `updated_at` for an overwrite: now, but strictly after the previous value.
pub(crate) fn next_updated_at(
    previous: chrono::DateTime<chrono::Utc>,
    now: chrono::DateTime<chrono::Utc>,
) -> chrono::DateTime<chrono::Utc> {
    now.max(previous + chrono::Duration::microseconds(1))
}

// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-process store backed by concurrent maps.
//!
//! Used for local development (`STORE_BACKEND=memory`) and tests. Contents
//! are lost on restart.

use crate::db::{next_updated_at, Store};
use crate::error::AppError;
use crate::models::{Activity, ApiKey, Identity};
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;

#[derive(Default)]
struct Collections {
    identities: DashMap<u64, Identity>,
    activities: DashMap<u64, Activity>,
    api_keys: DashMap<String, ApiKey>,
}

/// In-memory database.
#[derive(Clone, Default)]
pub struct MemoryDb {
    inner: Arc<Collections>,
}

impl MemoryDb {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryDb {
    async fn get_identity(&self, athlete_id: u64) -> Result<Option<Identity>, AppError> {
        Ok(self
            .inner
            .identities
            .get(&athlete_id)
            .map(|entry| entry.value().clone()))
    }

    async fn upsert_identity(&self, identity: &Identity) -> Result<Identity, AppError> {
        let now = chrono::Utc::now();
        let mut stored = identity.clone();

        // The entry guard holds the shard lock, making read-modify-write atomic.
        match self.inner.identities.entry(identity.athlete_id) {
            Entry::Occupied(mut entry) => {
                stored.created_at = entry.get().created_at;
                stored.updated_at = next_updated_at(entry.get().updated_at, now);
                entry.insert(stored.clone());
            }
            Entry::Vacant(entry) => {
                stored.created_at = now;
                stored.updated_at = now;
                entry.insert(stored.clone());
            }
        }

        Ok(stored)
    }

    async fn latest_identity(&self) -> Result<Option<Identity>, AppError> {
        Ok(self
            .inner
            .identities
            .iter()
            .max_by_key(|entry| entry.value().updated_at)
            .map(|entry| entry.value().clone()))
    }

    async fn get_activity(&self, activity_id: u64) -> Result<Option<Activity>, AppError> {
        Ok(self
            .inner
            .activities
            .get(&activity_id)
            .map(|entry| entry.value().clone()))
    }

    async fn upsert_activity(&self, activity: &Activity) -> Result<Activity, AppError> {
        let now = chrono::Utc::now();
        let mut stored = activity.clone();

        match self.inner.activities.entry(activity.id) {
            Entry::Occupied(mut entry) => {
                stored.created_at = entry.get().created_at;
                stored.updated_at = next_updated_at(entry.get().updated_at, now);
                entry.insert(stored.clone());
            }
            Entry::Vacant(entry) => {
                stored.created_at = now;
                stored.updated_at = now;
                entry.insert(stored.clone());
            }
        }

        Ok(stored)
    }

    async fn list_activities(&self, limit: u32, offset: u32) -> Result<Vec<Activity>, AppError> {
        let mut activities: Vec<Activity> = self
            .inner
            .activities
            .iter()
            .map(|entry| entry.value().clone())
            .collect();

        activities.sort_by(|a, b| b.start_date.cmp(&a.start_date).then(b.id.cmp(&a.id)));

        Ok(activities
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect())
    }

    async fn delete_activity(&self, activity_id: u64) -> Result<bool, AppError> {
        Ok(self.inner.activities.remove(&activity_id).is_some())
    }

    async fn insert_api_key(&self, key: &ApiKey) -> Result<(), AppError> {
        match self.inner.api_keys.entry(key.id.clone()) {
            Entry::Occupied(_) => Err(AppError::Database(format!(
                "API key {} already exists",
                key.id
            ))),
            Entry::Vacant(entry) => {
                entry.insert(key.clone());
                Ok(())
            }
        }
    }

    async fn get_api_key(&self, id: &str) -> Result<Option<ApiKey>, AppError> {
        Ok(self
            .inner
            .api_keys
            .get(id)
            .map(|entry| entry.value().clone()))
    }

    async fn list_api_keys(&self, owner_id: u64) -> Result<Vec<ApiKey>, AppError> {
        let mut keys: Vec<ApiKey> = self
            .inner
            .api_keys
            .iter()
            .filter(|entry| entry.value().owner_id == Some(owner_id))
            .map(|entry| entry.value().clone())
            .collect();
        keys.sort_by_key(|k| k.created_at);
        Ok(keys)
    }

    async fn set_api_key_active(&self, id: &str, is_active: bool) -> Result<bool, AppError> {
        Ok(match self.inner.api_keys.get_mut(id) {
            Some(mut entry) => {
                entry.is_active = is_active;
                true
            }
            None => false,
        })
    }

    async fn delete_api_key(&self, id: &str) -> Result<bool, AppError> {
        Ok(self.inner.api_keys.remove(id).is_some())
    }
}

// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! API key issuance, validation and management.

use crate::db::Store;
use crate::error::AppError;
use crate::models::ApiKey;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Duration, Utc};
use ring::rand::{SecureRandom, SystemRandom};
use std::sync::Arc;
use subtle::ConstantTimeEq;

/// Bytes of randomness per key (256 bits).
const KEY_BYTES: usize = 32;

/// Issues and validates API keys against the store.
pub struct ApiKeyService {
    store: Arc<dyn Store>,
    rng: SystemRandom,
}

impl ApiKeyService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            store,
            rng: SystemRandom::new(),
        }
    }

    /// Generate and persist a new key. `expiry_days == 0` never expires.
    pub async fn issue(
        &self,
        description: &str,
        expiry_days: u32,
        owner_id: Option<u64>,
    ) -> Result<ApiKey, AppError> {
        let key = self.generate_key()?;
        let created_at = Utc::now();

        let api_key = ApiKey {
            id: ApiKey::id_for(&key),
            key,
            description: description.to_string(),
            created_at,
            expires_at: (expiry_days > 0)
                .then(|| created_at + Duration::days(i64::from(expiry_days))),
            is_active: true,
            owner_id,
        };

        self.store.insert_api_key(&api_key).await?;

        tracing::info!(
            key_id = %api_key.id,
            owner_id = ?owner_id,
            expiry_days,
            "API key issued"
        );

        Ok(api_key)
    }

    /// Whether `key` is a known, active, unexpired key.
    pub async fn validate(&self, key: &str) -> Result<bool, AppError> {
        self.validate_at(key, Utc::now()).await
    }

    pub async fn validate_at(&self, key: &str, now: DateTime<Utc>) -> Result<bool, AppError> {
        if key.is_empty() {
            return Ok(false);
        }

        let Some(stored) = self.store.get_api_key(&ApiKey::id_for(key)).await? else {
            return Ok(false);
        };

        let matches: bool = stored.key.as_bytes().ct_eq(key.as_bytes()).into();
        Ok(matches && stored.is_valid_at(now))
    }

    /// Keys created by `owner_id`.
    pub async fn list(&self, owner_id: u64) -> Result<Vec<ApiKey>, AppError> {
        self.store.list_api_keys(owner_id).await
    }

    /// Delete a key owned by `owner_id`.
    pub async fn delete(&self, owner_id: u64, id: &str) -> Result<(), AppError> {
        self.owned(owner_id, id).await?;
        if !self.store.delete_api_key(id).await? {
            return Err(AppError::NotFound(format!("API key {}", id)));
        }
        tracing::info!(key_id = %id, owner_id, "API key deleted");
        Ok(())
    }

    /// Clear the active flag of a key owned by `owner_id`.
    pub async fn deactivate(&self, owner_id: u64, id: &str) -> Result<(), AppError> {
        self.owned(owner_id, id).await?;
        if !self.store.set_api_key_active(id, false).await? {
            return Err(AppError::NotFound(format!("API key {}", id)));
        }
        tracing::info!(key_id = %id, owner_id, "API key deactivated");
        Ok(())
    }

    /// Keys owned by someone else are reported as absent.
    async fn owned(&self, owner_id: u64, id: &str) -> Result<ApiKey, AppError> {
        self.store
            .get_api_key(id)
            .await?
            .filter(|key| key.owner_id == Some(owner_id))
            .ok_or_else(|| AppError::NotFound(format!("API key {}", id)))
    }

    fn generate_key(&self) -> Result<String, AppError> {
        let mut bytes = [0u8; KEY_BYTES];
        self.rng
            .fill(&mut bytes)
            .map_err(|_| AppError::Internal(anyhow::anyhow!("Failed to generate API key")))?;
        Ok(URL_SAFE_NO_PAD.encode(bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryDb;

    fn service() -> ApiKeyService {
        ApiKeyService::new(Arc::new(MemoryDb::new()))
    }

    #[tokio::test]
    async fn test_issued_key_is_url_safe_and_valid() {
        let svc = service();
        let key = svc.issue("test", 30, Some(1)).await.unwrap();

        // 32 bytes -> 43 base64 characters without padding
        assert_eq!(key.key.len(), 43);
        assert!(key
            .key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
        assert!(svc.validate(&key.key).await.unwrap());
        assert!(!svc.validate("unknown").await.unwrap());
        assert!(!svc.validate("").await.unwrap());
    }

    #[tokio::test]
    async fn test_zero_expiry_never_expires() {
        let svc = service();
        let key = svc.issue("forever", 0, None).await.unwrap();
        assert!(key.expires_at.is_none());

        let ten_years = Utc::now() + Duration::days(3650);
        assert!(svc.validate_at(&key.key, ten_years).await.unwrap());
    }

    #[tokio::test]
    async fn test_expiry_is_checked_lazily() {
        let svc = service();
        let key = svc.issue("short", 1, None).await.unwrap();

        assert!(svc.validate_at(&key.key, Utc::now()).await.unwrap());
        let later = Utc::now() + Duration::days(2);
        assert!(!svc.validate_at(&key.key, later).await.unwrap());
    }

    #[tokio::test]
    async fn test_management_is_owner_scoped() {
        let svc = service();
        let key = svc.issue("mine", 0, Some(1)).await.unwrap();

        assert!(matches!(
            svc.deactivate(2, &key.id).await,
            Err(AppError::NotFound(_))
        ));
        assert!(svc.validate(&key.key).await.unwrap());

        svc.deactivate(1, &key.id).await.unwrap();
        assert!(!svc.validate(&key.key).await.unwrap());

        svc.delete(1, &key.id).await.unwrap();
        assert!(svc.list(1).await.unwrap().is_empty());
    }
}

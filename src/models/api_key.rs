// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! API key records for read-only data access.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Hex characters of the SHA-256 digest used as the record ID.
const KEY_ID_LEN: usize = 16;

/// Opaque bearer credential for the `/api/v1` routes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiKey {
    /// Derived from the key material, see [`ApiKey::id_for`] (also used as document ID)
    pub id: String,
    /// Key material as handed to the client
    pub key: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    /// `None` means the key never expires
    pub expires_at: Option<DateTime<Utc>>,
    pub is_active: bool,
    /// Athlete that created the key. Bookkeeping only; the owner may be gone.
    pub owner_id: Option<u64>,
}

impl ApiKey {
    /// Record ID for a given key material.
    pub fn id_for(key: &str) -> String {
        let digest = Sha256::digest(key.as_bytes());
        let mut id = hex::encode(digest);
        id.truncate(KEY_ID_LEN);
        id
    }

    /// A key is valid while active and not past its expiry.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.is_active && self.expires_at.is_none_or(|expires_at| expires_at > now)
    }
}

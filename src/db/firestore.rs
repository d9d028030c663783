// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore client wrapper with typed operations.
//!
//! Provides high-level operations for:
//! - Identities (athlete profile and OAuth tokens)
//! - Activities (synced Strava activities)
//! - API keys

use crate::db::{collections, next_updated_at, Store};
use crate::error::AppError;
use crate::models::{Activity, ApiKey, Identity};
use async_trait::async_trait;

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: firestore::FirestoreDb,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        // If the emulator environment variable is set, use unauthenticated connection
        // to avoid local credential warnings and leakage.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self { client })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self { client })
    }

    /// Read a document by ID.
    async fn get_doc<T>(&self, collection: &str, id: &str) -> Result<Option<T>, AppError>
    where
        T: for<'de> serde::Deserialize<'de> + Send,
    {
        read_doc(&self.client, collection, id).await
    }

    /// Overwrite a document by ID.
    async fn set_doc<T>(&self, collection: &str, id: &str, object: &T) -> Result<(), AppError>
    where
        T: serde::Serialize + for<'de> serde::Deserialize<'de> + Sync + Send,
    {
        let _: () = self
            .client
            .fluent()
            .update()
            .in_col(collection)
            .document_id(id)
            .object(object)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Delete a document by ID, reporting whether it existed.
    async fn delete_doc<T>(&self, collection: &str, id: &str) -> Result<bool, AppError>
    where
        T: for<'de> serde::Deserialize<'de> + Send,
    {
        if self.get_doc::<T>(collection, id).await?.is_none() {
            return Ok(false);
        }

        self.client
            .fluent()
            .delete()
            .from(collection)
            .document_id(id)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(true)
    }

    /// Write `object` in a transaction, carrying over `created_at` from the
    /// stored version when one exists.
    async fn upsert_preserving_created<T, F>(
        &self,
        collection: &str,
        id: &str,
        object: &T,
        stamp: F,
    ) -> Result<T, AppError>
    where
        T: serde::Serialize + for<'de> serde::Deserialize<'de> + Clone + Sync + Send,
        F: FnOnce(&mut T, Option<&T>),
    {
        let client = &self.client;

        let mut transaction = client
            .begin_transaction()
            .await
            .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

        // Reads through a transaction-bound client take part in the transaction.
        let tx_client = client.clone_with_consistency_selector(
            firestore::FirestoreConsistencySelector::Transaction(
                transaction.transaction_id().clone(),
            ),
        );
        let existing: Option<T> = read_doc(&tx_client, collection, id).await?;

        let mut stored = object.clone();
        stamp(&mut stored, existing.as_ref());

        client
            .fluent()
            .update()
            .in_col(collection)
            .document_id(id)
            .object(&stored)
            .add_to_transaction(&mut transaction)
            .map_err(|e| {
                AppError::Database(format!("Failed to add {} to transaction: {}", collection, e))
            })?;

        transaction
            .commit()
            .await
            .map_err(|e| AppError::Database(format!("Transaction commit failed: {}", e)))?;

        Ok(stored)
    }
}

/// Read a document by ID through `client`.
async fn read_doc<T>(
    client: &firestore::FirestoreDb,
    collection: &str,
    id: &str,
) -> Result<Option<T>, AppError>
where
    T: for<'de> serde::Deserialize<'de> + Send,
{
    client
        .fluent()
        .select()
        .by_id_in(collection)
        .obj()
        .one(id)
        .await
        .map_err(|e| AppError::Database(e.to_string()))
}

#[async_trait]
impl Store for FirestoreDb {
    // ─── Identity Operations ─────────────────────────────────────

    async fn get_identity(&self, athlete_id: u64) -> Result<Option<Identity>, AppError> {
        self.get_doc(collections::IDENTITIES, &athlete_id.to_string())
            .await
    }

    async fn upsert_identity(&self, identity: &Identity) -> Result<Identity, AppError> {
        let now = chrono::Utc::now();
        self.upsert_preserving_created(
            collections::IDENTITIES,
            &identity.athlete_id.to_string(),
            identity,
            |stored: &mut Identity, existing| match existing {
                Some(existing) => {
                    stored.created_at = existing.created_at;
                    stored.updated_at = next_updated_at(existing.updated_at, now);
                }
                None => {
                    stored.created_at = now;
                    stored.updated_at = now;
                }
            },
        )
        .await
    }

    async fn latest_identity(&self) -> Result<Option<Identity>, AppError> {
        let identities: Vec<Identity> = self
            .client
            .fluent()
            .select()
            .from(collections::IDENTITIES)
            .order_by([(
                "updated_at",
                firestore::FirestoreQueryDirection::Descending,
            )])
            .limit(1)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(identities.into_iter().next())
    }

    // ─── Activity Operations ─────────────────────────────────────

    async fn get_activity(&self, activity_id: u64) -> Result<Option<Activity>, AppError> {
        self.get_doc(collections::ACTIVITIES, &activity_id.to_string())
            .await
    }

    async fn upsert_activity(&self, activity: &Activity) -> Result<Activity, AppError> {
        let now = chrono::Utc::now();
        self.upsert_preserving_created(
            collections::ACTIVITIES,
            &activity.id.to_string(),
            activity,
            |stored: &mut Activity, existing| match existing {
                Some(existing) => {
                    stored.created_at = existing.created_at;
                    stored.updated_at = next_updated_at(existing.updated_at, now);
                }
                None => {
                    stored.created_at = now;
                    stored.updated_at = now;
                }
            },
        )
        .await
    }

    async fn list_activities(&self, limit: u32, offset: u32) -> Result<Vec<Activity>, AppError> {
        self.client
            .fluent()
            .select()
            .from(collections::ACTIVITIES)
            .order_by([("start_date", firestore::FirestoreQueryDirection::Descending)])
            .limit(limit)
            .offset(offset)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn delete_activity(&self, activity_id: u64) -> Result<bool, AppError> {
        self.delete_doc::<Activity>(collections::ACTIVITIES, &activity_id.to_string())
            .await
    }

    // ─── API Key Operations ──────────────────────────────────────

    async fn insert_api_key(&self, key: &ApiKey) -> Result<(), AppError> {
        // `insert` fails if the document already exists.
        let _: ApiKey = self
            .client
            .fluent()
            .insert()
            .into(collections::API_KEYS)
            .document_id(&key.id)
            .object(key)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    async fn get_api_key(&self, id: &str) -> Result<Option<ApiKey>, AppError> {
        self.get_doc(collections::API_KEYS, id).await
    }

    async fn list_api_keys(&self, owner_id: u64) -> Result<Vec<ApiKey>, AppError> {
        let mut keys: Vec<ApiKey> = self
            .client
            .fluent()
            .select()
            .from(collections::API_KEYS)
            .filter(move |q| q.field("owner_id").eq(owner_id))
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        // Sorted here to avoid a composite index on (owner_id, created_at).
        keys.sort_by_key(|k| k.created_at);
        Ok(keys)
    }

    async fn set_api_key_active(&self, id: &str, is_active: bool) -> Result<bool, AppError> {
        let Some(mut key) = self.get_api_key(id).await? else {
            return Ok(false);
        };
        key.is_active = is_active;
        self.set_doc(collections::API_KEYS, id, &key).await?;
        Ok(true)
    }

    async fn delete_api_key(&self, id: &str) -> Result<bool, AppError> {
        self.delete_doc::<ApiKey>(collections::API_KEYS, id).await
    }
}

// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Activity sync engine.
//!
//! Pulls activity pages from Strava for the primary identity and upserts them
//! into the store. At most one cycle runs at a time per process.

use crate::db::Store;
use crate::error::AppError;
use crate::models::Activity;
use crate::services::oauth::OAuthService;
use crate::services::strava::{StravaActivitySummary, StravaApi};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Upper bound on pages fetched in one cycle.
pub const MAX_PAGES: u32 = 50;

/// Largest page Strava will serve.
pub const MAX_PAGE_SIZE: u32 = 200;

/// Aggregate outcome of one sync cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub pages: u32,
    pub fetched: u32,
    pub upserted: u32,
    /// Records that could not be decoded, mapped or stored
    pub failed: u32,
    /// Records started before the cutoff
    pub skipped: u32,
    /// The page limit was reached on a full page; older records may remain
    pub truncated: bool,
}

/// Clears the in-flight flag when the cycle ends, however it ends.
struct InFlight(Arc<AtomicBool>);

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub struct SyncService {
    store: Arc<dyn Store>,
    strava: Arc<dyn StravaApi>,
    oauth: Arc<OAuthService>,
    running: Arc<AtomicBool>,
}

impl SyncService {
    pub fn new(
        store: Arc<dyn Store>,
        strava: Arc<dyn StravaApi>,
        oauth: Arc<OAuthService>,
    ) -> Self {
        Self {
            store,
            strava,
            oauth,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Whether a cycle is currently in flight.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Run one cycle covering activities started at or after `cutoff`.
    ///
    /// Fails with [`AppError::SyncInProgress`] when another cycle is running.
    pub async fn sync_since(
        &self,
        cutoff: DateTime<Utc>,
        page_size: u32,
    ) -> Result<SyncReport, AppError> {
        let guard = self.try_begin().ok_or(AppError::SyncInProgress)?;
        self.run_cycle(cutoff, page_size, guard).await
    }

    /// Start a cycle on a detached task. Returns `false` if one is already running.
    pub fn spawn_detached(self: &Arc<Self>, cutoff: DateTime<Utc>, page_size: u32) -> bool {
        let Some(guard) = self.try_begin() else {
            return false;
        };

        let this = Arc::clone(self);
        tokio::spawn(async move {
            // Outcome is logged by run_cycle.
            let _ = this.run_cycle(cutoff, page_size, guard).await;
        });
        true
    }

    fn try_begin(&self) -> Option<InFlight> {
        self.running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| InFlight(Arc::clone(&self.running)))
    }

    async fn run_cycle(
        &self,
        cutoff: DateTime<Utc>,
        page_size: u32,
        _guard: InFlight,
    ) -> Result<SyncReport, AppError> {
        tracing::info!(cutoff = %cutoff, page_size, "Sync cycle started");

        let result = self.fetch_and_upsert(cutoff, page_size).await;
        match &result {
            Ok(report) => tracing::info!(
                pages = report.pages,
                fetched = report.fetched,
                upserted = report.upserted,
                failed = report.failed,
                skipped = report.skipped,
                truncated = report.truncated,
                "Sync cycle finished"
            ),
            Err(e) => tracing::error!(error = %e, "Sync cycle aborted"),
        }
        result
    }

    async fn fetch_and_upsert(
        &self,
        cutoff: DateTime<Utc>,
        page_size: u32,
    ) -> Result<SyncReport, AppError> {
        let access_token = self.usable_token().await?;
        let page_size = page_size.clamp(1, MAX_PAGE_SIZE);
        let after = cutoff.timestamp();
        let mut report = SyncReport::default();

        for page in 1..=MAX_PAGES {
            let records = self
                .strava
                .list_activities(&access_token, after, page, page_size)
                .await?;

            report.pages += 1;
            report.fetched += records.len() as u32;
            let short_page = (records.len() as u32) < page_size;

            for record in records {
                self.sync_record(record, cutoff, &mut report).await;
            }

            if short_page {
                break;
            }
            if page == MAX_PAGES {
                report.truncated = true;
                tracing::warn!(
                    pages = report.pages,
                    page_size,
                    "Page limit reached on a full page; older activities were not fetched"
                );
            }
        }

        Ok(report)
    }

    /// Map and upsert one record. Failures are counted, never propagated.
    async fn sync_record(
        &self,
        record: serde_json::Value,
        cutoff: DateTime<Utc>,
        report: &mut SyncReport,
    ) {
        let record_id = record.get("id").and_then(|v| v.as_u64());

        let summary: StravaActivitySummary = match serde_json::from_value(record) {
            Ok(summary) => summary,
            Err(e) => {
                tracing::warn!(activity_id = ?record_id, error = %e, "Skipping undecodable activity");
                report.failed += 1;
                return;
            }
        };

        let activity = match Activity::from_summary(summary, Utc::now()) {
            Ok(activity) => activity,
            Err(e) => {
                tracing::warn!(activity_id = ?record_id, error = %e, "Skipping unmappable activity");
                report.failed += 1;
                return;
            }
        };

        if activity.start_date < cutoff {
            report.skipped += 1;
            return;
        }

        match self.store.upsert_activity(&activity).await {
            Ok(_) => report.upserted += 1,
            Err(e) => {
                tracing::warn!(activity_id = activity.id, error = %e, "Failed to upsert activity");
                report.failed += 1;
            }
        }
    }

    async fn usable_token(&self) -> Result<String, AppError> {
        let identity = self
            .oauth
            .primary_identity()
            .await?
            .ok_or_else(|| AppError::AuthUnavailable("no authorized identity".to_string()))?;

        self.oauth
            .valid_access_token(identity.athlete_id)
            .await
            .map_err(|e| match e {
                AppError::AuthUnavailable(_) => e,
                other => AppError::AuthUnavailable(other.to_string()),
            })
    }
}

// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Recurring sync timer.

use crate::error::AppError;
use crate::services::sync::SyncService;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

/// Fires one sync cycle per interval over a trailing window.
pub struct SyncScheduler {
    sync: Arc<SyncService>,
    interval: Duration,
    window: Duration,
    page_size: u32,
}

impl SyncScheduler {
    pub fn new(sync: Arc<SyncService>, interval: Duration, window: Duration, page_size: u32) -> Self {
        Self {
            sync,
            interval,
            window,
            page_size,
        }
    }

    /// Start the timer. The first tick fires one interval from now.
    pub fn start(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            tracing::info!(
                interval_secs = self.interval.as_secs(),
                window_secs = self.window.as_secs(),
                "Sync scheduler started"
            );
            self.run_loop().await;
        })
    }

    async fn run_loop(&self) {
        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            self.tick().await;
        }
    }

    /// Run one scheduled cycle.
    pub async fn tick(&self) {
        let window = chrono::Duration::from_std(self.window).unwrap_or(chrono::Duration::days(1));
        let cutoff = Utc::now() - window;

        match self.sync.sync_since(cutoff, self.page_size).await {
            Ok(_) => {}
            Err(AppError::SyncInProgress) => {
                tracing::info!("Previous sync still running, skipping tick");
            }
            // Already logged by the sync engine; the next tick retries.
            Err(_) => {}
        }
    }
}

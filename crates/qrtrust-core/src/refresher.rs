//! Background refresh of stale trust cache entries.
//!
//! A cycle drains the stale set in batches:
//!
//! 1. take up to `batch_size` entries flagged `needs_refresh`, oldest first
//! 2. force a registry lookup for each, pausing `call_delay` between calls
//! 3. if flagged entries remain, wait `batch_delay` and repeat
//!
//! Every lookup clears the flag whatever the outcome, so a cycle over a
//! fixed stale set terminates. The spawned scheduler also re-flags all
//! entries every `period` and runs a cycle on manual trigger.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{info, warn};

use crate::client::TrustRegistryClient;
use crate::config::RefreshConfig;
use crate::error::CacheResult;
use crate::types::CacheSource;

/// Counters for one batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    pub processed: usize,
    pub found: usize,
    pub failed: usize,
    /// Entries still flagged after the batch.
    pub remaining: u64,
}

/// Counters for a full cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleReport {
    pub batches: usize,
    pub processed: usize,
    pub found: usize,
    pub failed: usize,
    pub remaining: u64,
}

impl CycleReport {
    fn absorb(&mut self, batch: BatchReport) {
        self.batches += 1;
        self.processed += batch.processed;
        self.found += batch.found;
        self.failed += batch.failed;
        self.remaining = batch.remaining;
    }
}

/// Refresh scheduler over a registry client and its cache.
#[derive(Debug, Clone)]
pub struct Refresher {
    client: TrustRegistryClient,
    config: RefreshConfig,
}

impl Refresher {
    pub fn new(client: TrustRegistryClient, config: RefreshConfig) -> Self {
        Self { client, config }
    }

    /// Refresh one batch of stale entries.
    pub async fn run_batch(&self) -> CacheResult<BatchReport> {
        let cache = self.client.cache();
        let stale = cache.list_stale(self.config.batch_size)?;
        let mut report = BatchReport::default();

        for (i, entry) in stale.iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(self.config.call_delay()).await;
            }
            let outcome = self
                .client
                .lookup_entry(&entry.thumbprint, true, CacheSource::Refresh)
                .await?;
            report.processed += 1;
            if outcome.found() {
                report.found += 1;
            }
            if outcome.failure.is_some() {
                report.failed += 1;
            }
        }

        report.remaining = cache.count_stale()?;
        Ok(report)
    }

    /// Run batches until no flagged entries remain.
    pub async fn run_until_drained(&self) -> CacheResult<CycleReport> {
        let started = Instant::now();
        let mut cycle = CycleReport::default();
        info!(
            stale = self.client.cache().count_stale()?,
            "refresh cycle started"
        );

        loop {
            let batch = self.run_batch().await?;
            cycle.absorb(batch);
            if batch.remaining == 0 || batch.processed == 0 {
                break;
            }
            tokio::time::sleep(self.config.batch_delay()).await;
        }

        info!(
            batches = cycle.batches,
            processed = cycle.processed,
            found = cycle.found,
            failed = cycle.failed,
            remaining = cycle.remaining,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "refresh cycle complete"
        );
        Ok(cycle)
    }

    /// Flag everything when the cache is empty or holds an entry older than
    /// the staleness window. Returns whether a cycle is due.
    pub fn startup_check(&self) -> CacheResult<bool> {
        let cache = self.client.cache();
        if cache.stats()?.total == 0 {
            info!("trust cache empty at startup");
            return Ok(true);
        }

        let cutoff = chrono::Duration::from_std(self.config.stale_after())
            .ok()
            .and_then(|window| Utc::now().checked_sub_signed(window));
        let outdated = match cutoff {
            Some(cutoff) => cache.count_older_than(cutoff)?,
            None => 0,
        };
        if outdated == 0 {
            return Ok(false);
        }

        info!(outdated, "trust cache outdated at startup");
        cache.mark_all_stale()?;
        Ok(true)
    }

    /// Start the scheduler task.
    ///
    /// The task stops on [`RefresherHandle::shutdown`] or when the handle is
    /// dropped. An in-flight cycle is abandoned between registry calls.
    pub fn spawn(self) -> RefresherHandle {
        let trigger = Arc::new(Notify::new());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let join = tokio::spawn(self.run(Arc::clone(&trigger), shutdown_rx));
        RefresherHandle {
            trigger,
            shutdown: shutdown_tx,
            join,
        }
    }

    async fn run(self, trigger: Arc<Notify>, mut shutdown: watch::Receiver<bool>) {
        match self.startup_check() {
            Ok(true) => {
                if self.cycle_or_shutdown(&mut shutdown).await {
                    return;
                }
            }
            Ok(false) => {}
            Err(e) => warn!(error = %e, "startup staleness check failed"),
        }

        let period = self.config.period();
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                _ = trigger.notified() => {
                    info!("refresh triggered");
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.client.cache().mark_all_stale() {
                        warn!(error = %e, "periodic mark-stale failed");
                        continue;
                    }
                }
            }

            if self.cycle_or_shutdown(&mut shutdown).await {
                break;
            }
        }
        info!("refresher stopped");
    }

    /// Run a cycle unless shutdown arrives first. Returns true on shutdown.
    async fn cycle_or_shutdown(&self, shutdown: &mut watch::Receiver<bool>) -> bool {
        tokio::select! {
            _ = shutdown.changed() => true,
            result = self.run_until_drained() => {
                if let Err(e) = result {
                    warn!(error = %e, "refresh cycle failed");
                }
                false
            }
        }
    }
}

/// Control handle for a spawned [`Refresher`].
#[derive(Debug)]
pub struct RefresherHandle {
    trigger: Arc<Notify>,
    shutdown: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl RefresherHandle {
    /// Ask for a cycle now. Coalesces with a pending trigger.
    pub fn trigger(&self) {
        self.trigger.notify_one();
    }

    /// Stop the task and wait for it to exit.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.join.await {
            warn!(error = %e, "refresher task did not exit cleanly");
        }
    }
}

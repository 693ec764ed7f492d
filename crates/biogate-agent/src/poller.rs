//! Background attendance-log polling.
//!
//! Each tick of a fixed timer starts one poll cycle:
//!
//! 1. read the terminal settings from the repository
//! 2. make sure the device link is up
//! 3. download the attendance log
//! 4. hand every record newer than the cursor to the [`ScanProcessor`]
//!
//! Cycles never overlap. A tick that fires while a cycle is still running is
//! dropped and counted, not queued. A failed cycle is logged and the timer
//! keeps going.

use crate::error::{AgentError, Result};
use crate::processor::{ScanOutcome, ScanProcessor};
use crate::relay::DoorRelay;
use crate::scheduler::SingleFlight;
use biogate_core::{DeviceSettings, Error};
use biogate_network::DeviceLink;
use biogate_protocol::ScanLogRecord;
use biogate_storage::MembershipRepository;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

/// Cursor value before the first processed record.
const NO_CURSOR: i64 = i64::MIN;

/// Result of a single poll cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// No terminal address in the settings.
    NotConfigured,

    /// The terminal could not be reached.
    Disconnected,

    Polled { fetched: usize, processed: usize },
}

/// Counters for diagnosing the poll loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollerStats {
    pub cycles_completed: u64,
    pub cycles_failed: u64,
    /// Ticks skipped because the previous cycle was still running
    pub ticks_dropped: u64,
    pub scans_processed: u64,
}

pub struct LogPoller<R, D> {
    repo: Arc<R>,
    link: Arc<DeviceLink>,
    processor: ScanProcessor<R, D>,

    /// Unix seconds of the newest record handed to the processor
    cursor: AtomicI64,

    flight: Arc<SingleFlight>,
    cycles_completed: AtomicU64,
    cycles_failed: AtomicU64,
    scans_processed: AtomicU64,
}

impl<R, D> LogPoller<R, D>
where
    R: MembershipRepository + 'static,
    D: DoorRelay + 'static,
{
    pub fn new(repo: Arc<R>, link: Arc<DeviceLink>, relay: Arc<D>) -> Self {
        let processor = ScanProcessor::new(Arc::clone(&repo), relay);
        Self {
            repo,
            link,
            processor,
            cursor: AtomicI64::new(NO_CURSOR),
            flight: Arc::new(SingleFlight::new()),
            cycles_completed: AtomicU64::new(0),
            cycles_failed: AtomicU64::new(0),
            scans_processed: AtomicU64::new(0),
        }
    }

    /// Unix timestamp of the newest processed record, if any.
    pub fn cursor(&self) -> Option<i64> {
        match self.cursor.load(Ordering::Acquire) {
            NO_CURSOR => None,
            ts => Some(ts),
        }
    }

    pub fn stats(&self) -> PollerStats {
        PollerStats {
            cycles_completed: self.cycles_completed.load(Ordering::Relaxed),
            cycles_failed: self.cycles_failed.load(Ordering::Relaxed),
            ticks_dropped: self.flight.dropped(),
            scans_processed: self.scans_processed.load(Ordering::Relaxed),
        }
    }

    /// Run one poll cycle.
    ///
    /// # Errors
    ///
    /// Fails only when the settings cannot be read. Device problems resolve
    /// to [`PollOutcome::Disconnected`] or to an empty download.
    pub async fn poll_once(&self) -> Result<PollOutcome> {
        let raw = self.repo.get_settings().await?;
        let settings = match DeviceSettings::from_settings(&raw) {
            Ok(settings) => settings,
            Err(Error::MissingConfig(key)) => {
                trace!(key = %key, "Terminal not configured, skipping poll");
                return Ok(PollOutcome::NotConfigured);
            }
            Err(e) => return Err(e.into()),
        };

        if !self.link.ensure_connected(&settings).await {
            debug!(device = %settings, "Terminal unreachable, skipping poll");
            return Ok(PollOutcome::Disconnected);
        }

        let records = self.link.fetch_scan_logs(&settings).await;
        let processed = self.process_records(&records, &settings).await;

        Ok(PollOutcome::Polled {
            fetched: records.len(),
            processed,
        })
    }

    /// Hand every record strictly newer than the cursor to the processor,
    /// advancing the cursor as it goes. Returns how many were handed over.
    ///
    /// A record whose processing fails still advances the cursor: the scan
    /// is not retried on the next cycle.
    pub async fn process_records(
        &self,
        records: &[ScanLogRecord],
        settings: &DeviceSettings,
    ) -> usize {
        let mut processed = 0;

        for record in records {
            let ts = record.timestamp.timestamp();
            if ts <= self.cursor.load(Ordering::Acquire) {
                continue;
            }

            let user_id = record.user_id();
            match self.processor.handle_scan(&user_id, settings).await {
                Ok(ScanOutcome::Granted { relay_pulsed: false, .. }) => {
                    warn!(user_id = %user_id, "Access granted but relay did not acknowledge");
                }
                Ok(outcome) => trace!(user_id = %user_id, ?outcome, "Scan handled"),
                Err(e) => error!(
                    user_id = %user_id,
                    timestamp = ts,
                    error = %e,
                    "Scan processing failed"
                ),
            }

            self.cursor.store(ts, Ordering::Release);
            self.scans_processed.fetch_add(1, Ordering::Relaxed);
            processed += 1;
        }

        processed
    }

    async fn run_cycle(&self) {
        match self.poll_once().await {
            Ok(outcome) => {
                self.cycles_completed.fetch_add(1, Ordering::Relaxed);
                if let PollOutcome::Polled { processed, .. } = outcome
                    && processed > 0
                {
                    debug!(processed, "Poll cycle finished");
                }
            }
            Err(e) => {
                self.cycles_failed.fetch_add(1, Ordering::Relaxed);
                error!(error = %e, "Poll cycle failed");
            }
        }
    }

    /// Poll every `interval` until `shutdown` is cancelled.
    ///
    /// The first cycle starts immediately. On shutdown the loop waits for a
    /// cycle that is still running before returning.
    pub async fn run(self: Arc<Self>, interval: Duration, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut current: Option<JoinHandle<()>> = None;

        info!(interval = ?interval, "Log poller started");

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    let Some(guard) = self.flight.try_begin() else {
                        debug!(
                            dropped = self.flight.dropped(),
                            "Previous poll still running, tick dropped"
                        );
                        continue;
                    };

                    let poller = Arc::clone(&self);
                    current = Some(tokio::spawn(async move {
                        let _guard = guard;
                        poller.run_cycle().await;
                    }));
                }
            }
        }

        if let Some(handle) = current
            && let Err(e) = handle.await
        {
            self.cycles_failed.fetch_add(1, Ordering::Relaxed);
            error!(error = %AgentError::Task(e.to_string()), "Poll cycle aborted");
        }

        info!(stats = ?self.stats(), "Log poller stopped");
    }
}

//! Poll-dedup-persist loop - the steady-state engine of a logging session.
//!
//! Each iteration fetches the device's log window, keeps the entries whose
//! sequence is above the watermark, appends them to the record and then
//! raises the watermark to the highest sequence appended.
//!
//! # Delivery
//!
//! As long as the device never reuses a sequence number, every entry is
//! recorded exactly once: selection depends only on `sequence > watermark`,
//! and the watermark only moves past sequences that were appended. A failed
//! fetch leaves the watermark untouched, so the next successful window is
//! judged against the same threshold.
//!
//! Entries that fall out of the device's ring buffer before they are polled
//! cannot be recovered; keep `poll_interval` short relative to the bus rate.

use super::watermark::Watermark;
use crate::device::DeviceApi;
use crate::error::{LoggerError, RecordError};
use crate::record::{RecordRow, RecordSink};
use crate::report::Reporter;
use crate::types::RemoteEntry;
use log::{debug, error, info};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Configuration for the poll loop.
#[derive(Debug, Clone)]
pub struct PollConfig {
    /// Delay between successful polls
    pub poll_interval: Duration,
    /// Delay after a failed fetch; longer than `poll_interval`
    pub failure_backoff: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(200),
            failure_backoff: Duration::from_secs(1),
        }
    }
}

impl PollConfig {
    /// Raises `failure_backoff` to twice `poll_interval` when it is not
    /// already longer than the interval.
    pub fn normalized(mut self) -> Self {
        if self.failure_backoff <= self.poll_interval {
            self.failure_backoff = self.poll_interval.saturating_mul(2);
        }
        self
    }
}

/// Running tally of a session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Summary {
    /// Data-frame rows appended
    pub entries_appended: u64,
    /// Annotation rows appended
    pub annotations_appended: u64,
    pub final_watermark: u64,
}

impl Summary {
    pub fn total_rows(&self) -> u64 {
        self.entries_appended + self.annotations_appended
    }
}

/// Dedup state for one session: the watermark plus the tally.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    watermark: Watermark,
    summary: Summary,
}

impl SessionState {
    pub fn new(watermark: Watermark) -> Self {
        Self {
            watermark,
            summary: Summary {
                final_watermark: watermark.value(),
                ..Summary::default()
            },
        }
    }

    pub fn watermark(&self) -> Watermark {
        self.watermark
    }

    pub fn summary(&self) -> Summary {
        self.summary
    }

    /// Records the unseen part of one snapshot and returns how many rows
    /// were appended.
    ///
    /// The snapshot is not assumed sorted: the new watermark is the maximum
    /// appended sequence, not the last one. A non-empty batch is flushed
    /// before returning, and its entries are reported only once the flush
    /// succeeds. On a storage error the watermark is left where it was and
    /// the error is returned.
    pub fn ingest<S, R>(
        &mut self,
        snapshot: &[RemoteEntry],
        sink: &mut S,
        reporter: &mut R,
    ) -> Result<usize, RecordError>
    where
        S: RecordSink + ?Sized,
        R: Reporter + ?Sized,
    {
        let threshold = self.watermark;
        let mut candidate = threshold.value();
        let mut batch = Vec::new();
        let mut tally = self.summary;

        for entry in snapshot.iter().filter(|e| threshold.admits(e.sequence())) {
            sink.append(&RecordRow::from(entry))?;
            if entry.is_annotation() {
                tally.annotations_appended += 1;
            } else {
                tally.entries_appended += 1;
            }
            candidate = candidate.max(entry.sequence());
            batch.push(entry);
        }

        if batch.is_empty() {
            return Ok(0);
        }

        sink.flush()?;

        for &entry in &batch {
            reporter.entry_recorded(entry);
        }
        self.watermark.advance_to(candidate);
        tally.final_watermark = self.watermark.value();
        self.summary = tally;
        reporter.batch_committed(&self.summary);
        Ok(batch.len())
    }
}

/// Drives a session against one device.
pub struct PollLoop<'a, D: DeviceApi> {
    device: &'a D,
    config: PollConfig,
}

impl<'a, D: DeviceApi> PollLoop<'a, D> {
    /// The failure backoff is raised above `poll_interval` if needed, see
    /// [`PollConfig::normalized`].
    pub fn new(device: &'a D, config: PollConfig) -> Self {
        Self {
            device,
            config: config.normalized(),
        }
    }

    /// Runs until `cancel` fires, then closes `sink` and returns the tally.
    ///
    /// Fetch failures are reported and retried after `failure_backoff`; they
    /// never end the session. A storage failure does: the sink is still
    /// closed and the error is returned.
    pub async fn run<S, R>(
        &self,
        watermark_init: Watermark,
        sink: &mut S,
        reporter: &mut R,
        cancel: &CancellationToken,
    ) -> Result<Summary, LoggerError>
    where
        S: RecordSink + ?Sized,
        R: Reporter + ?Sized,
    {
        info!(
            "Starting poll loop: interval {}ms, failure backoff {}ms, watermark {}",
            self.config.poll_interval.as_millis(),
            self.config.failure_backoff.as_millis(),
            watermark_init.value()
        );

        let mut state = SessionState::new(watermark_init);
        let outcome = self.poll_until_cancelled(&mut state, sink, reporter, cancel).await;
        let closed = sink.close();
        let summary = state.summary();

        match (outcome, closed) {
            (Ok(()), Ok(())) => {
                info!(
                    "Poll loop stopped: {} frames, {} marks, watermark {}",
                    summary.entries_appended, summary.annotations_appended, summary.final_watermark
                );
                Ok(summary)
            }
            (Err(e), closed) => {
                if let Err(close_err) = closed {
                    error!("Failed to close record after storage error: {}", close_err);
                }
                error!("Poll loop aborted: {}", e);
                Err(e.into())
            }
            (Ok(()), Err(e)) => {
                error!("Failed to finalize record: {}", e);
                Err(e.into())
            }
        }
    }

    async fn poll_until_cancelled<S, R>(
        &self,
        state: &mut SessionState,
        sink: &mut S,
        reporter: &mut R,
        cancel: &CancellationToken,
    ) -> Result<(), RecordError>
    where
        S: RecordSink + ?Sized,
        R: Reporter + ?Sized,
    {
        loop {
            let fetched = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(()),
                result = self.device.snapshot() => result,
            };

            let delay = match fetched {
                Ok(snapshot) => {
                    let appended = state.ingest(&snapshot, sink, reporter)?;
                    if appended > 0 {
                        debug!(
                            "Appended {} of {} entries, watermark now {}",
                            appended,
                            snapshot.len(),
                            state.watermark().value()
                        );
                    }
                    self.config.poll_interval
                }
                Err(e) => {
                    debug!("Snapshot fetch failed: {}", e);
                    reporter.fetch_failed(&e);
                    self.config.failure_backoff
                }
            };

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(()),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
}

//! Shared fakes for the session tests.

#![allow(dead_code)]

use async_trait::async_trait;
use can_logger::record::RecordRow;
use can_logger::types::{Annotation, Frame};
use can_logger::{DeviceApi, DeviceStatus, FetchError, RecordError, RecordSink, RemoteEntry, Reporter, Summary};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio_util::sync::CancellationToken;

pub fn frame(seq: u64, id: u32, data: &str) -> RemoteEntry {
    RemoteEntry::Frame(Frame {
        sequence: seq,
        timestamp_ms: seq * 10,
        id,
        length: data.split_whitespace().count() as u8,
        payload: data.to_string(),
    })
}

pub fn mark(seq: u64, label: &str) -> RemoteEntry {
    RemoteEntry::Annotation(Annotation {
        sequence: seq,
        timestamp_ms: seq * 10,
        label: label.to_string(),
    })
}

/// Window of frames `from..=to`, all on id 0x100.
pub fn window(from: u64, to: u64) -> Vec<RemoteEntry> {
    (from..=to).map(|s| frame(s, 0x100, "00")).collect()
}

pub fn unreachable() -> FetchError {
    FetchError::Unreachable {
        url: "http://device/log".to_string(),
        reason: "connection refused".to_string(),
    }
}

pub fn malformed() -> FetchError {
    FetchError::Malformed {
        url: "http://device/log".to_string(),
        reason: "missing field `s`".to_string(),
    }
}

pub fn status(baud: &str) -> DeviceStatus {
    DeviceStatus {
        running: true,
        baud: baud.to_string(),
        messages: 0,
        errors: 0,
        unique_ids: 0,
    }
}

/// Device that replays a fixed script of responses.
///
/// Once a script runs out the device cancels `cancel` and never answers
/// again, which ends the session deterministically.
pub struct ScriptedDevice {
    snapshots: Mutex<VecDeque<Result<Vec<RemoteEntry>, FetchError>>>,
    statuses: Mutex<VecDeque<Result<DeviceStatus, FetchError>>>,
    cancel: CancellationToken,
    pub snapshot_calls: AtomicUsize,
    pub status_calls: AtomicUsize,
}

impl ScriptedDevice {
    pub fn new(cancel: CancellationToken) -> Self {
        Self {
            snapshots: Mutex::new(VecDeque::new()),
            statuses: Mutex::new(VecDeque::new()),
            cancel,
            snapshot_calls: AtomicUsize::new(0),
            status_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_snapshots(
        cancel: CancellationToken,
        script: Vec<Result<Vec<RemoteEntry>, FetchError>>,
    ) -> Self {
        let device = Self::new(cancel);
        device.snapshots.lock().unwrap().extend(script);
        device
    }

    pub fn with_statuses(
        cancel: CancellationToken,
        script: Vec<Result<DeviceStatus, FetchError>>,
    ) -> Self {
        let device = Self::new(cancel);
        device.statuses.lock().unwrap().extend(script);
        device
    }

    pub fn snapshot_calls(&self) -> usize {
        self.snapshot_calls.load(Ordering::SeqCst)
    }

    pub fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DeviceApi for ScriptedDevice {
    async fn status(&self) -> Result<DeviceStatus, FetchError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        let next = self.statuses.lock().unwrap().pop_front();
        match next {
            Some(result) => result,
            None => {
                self.cancel.cancel();
                std::future::pending().await
            }
        }
    }

    async fn snapshot(&self) -> Result<Vec<RemoteEntry>, FetchError> {
        self.snapshot_calls.fetch_add(1, Ordering::SeqCst);
        let next = self.snapshots.lock().unwrap().pop_front();
        match next {
            Some(result) => result,
            None => {
                self.cancel.cancel();
                std::future::pending().await
            }
        }
    }
}

/// In-memory sink that tracks flush boundaries.
#[derive(Default)]
pub struct MemorySink {
    /// Rows appended, flushed or not
    pub rows: Vec<RecordRow>,
    /// Number of rows covered by the last successful flush
    pub durable: usize,
    pub flushes: usize,
    pub closed: bool,
    /// Fail the flush with this (1-based) index
    pub fail_on_flush: Option<usize>,
}

impl MemorySink {
    pub fn durable_rows(&self) -> &[RecordRow] {
        &self.rows[..self.durable]
    }

    /// Timestamps double as sequence numbers in these tests.
    pub fn sequences(&self) -> Vec<u64> {
        self.rows.iter().map(|r| r.timestamp_ms / 10).collect()
    }
}

impl RecordSink for MemorySink {
    fn append(&mut self, row: &RecordRow) -> Result<(), RecordError> {
        if self.closed {
            return Err(RecordError::Closed);
        }
        self.rows.push(row.clone());
        Ok(())
    }

    fn flush(&mut self) -> Result<(), RecordError> {
        if self.closed {
            return Err(RecordError::Closed);
        }
        self.flushes += 1;
        if self.fail_on_flush == Some(self.flushes) {
            return Err(RecordError::Flush {
                path: "memory".into(),
                source: std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
            });
        }
        self.durable = self.rows.len();
        Ok(())
    }

    fn close(&mut self) -> Result<(), RecordError> {
        self.closed = true;
        Ok(())
    }
}

/// Reporter that remembers what it was told.
#[derive(Default)]
pub struct RecordingReporter {
    pub probe_failures: usize,
    pub connected: Option<DeviceStatus>,
    pub fetch_failures: usize,
    pub recorded: Vec<u64>,
    pub batches: Vec<Summary>,
}

impl Reporter for RecordingReporter {
    fn probe_failed(&mut self, _error: &FetchError) {
        self.probe_failures += 1;
    }

    fn connected(&mut self, status: &DeviceStatus) {
        self.connected = Some(status.clone());
    }

    fn fetch_failed(&mut self, _error: &FetchError) {
        self.fetch_failures += 1;
    }

    fn entry_recorded(&mut self, entry: &RemoteEntry) {
        self.recorded.push(entry.sequence());
    }

    fn batch_committed(&mut self, summary: &Summary) {
        self.batches.push(*summary);
    }
}

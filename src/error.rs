//! Error types for the logger.
//!
//! [`FetchError`] is always recoverable: the gate and the poll loop retry on
//! it. [`RecordError`] is the one failure that ends a session, since polling
//! on without being able to persist would silently drop data.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// A failed request against the device.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("cannot reach {url}: {reason}")]
    Unreachable { url: String, reason: String },

    #[error("request to {url} timed out")]
    Timeout { url: String },

    #[error("{url} answered HTTP {status}")]
    HttpStatus { url: String, status: u16 },

    #[error("malformed payload from {url}: {reason}")]
    Malformed { url: String, reason: String },
}

impl FetchError {
    /// True when the device answered but the body had the wrong shape.
    pub fn is_malformed(&self) -> bool {
        matches!(self, FetchError::Malformed { .. })
    }
}

/// A failure of the durable record.
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("failed to create record file {path}: {source}")]
    Create {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write record file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to flush record file {path}: {source}")]
    Flush {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("record sink is already closed")]
    Closed,
}

/// Errors that abort startup or a running session.
#[derive(Debug, Error)]
pub enum LoggerError {
    #[error(transparent)]
    Record(#[from] RecordError),

    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("invalid device address '{0}'")]
    InvalidAddress(String),
}

//! Logger configuration.

use crate::device::client::DEFAULT_REQUEST_TIMEOUT;
use crate::error::LoggerError;
use crate::poll::{GateConfig, PollConfig};
use std::path::PathBuf;
use std::time::Duration;

/// Static IP the sniffer takes on the bench network.
pub const DEFAULT_DEVICE_ADDR: &str = "192.168.0.200";

/// Configuration for one logging session.
#[derive(Debug, Clone)]
pub struct LoggerConfig {
    /// Host or URL of the device (`192.168.0.42`, `http://sniffer.local:8080`)
    pub device_addr: String,

    /// Directory the session CSV is created in
    pub output_dir: PathBuf,

    /// Timeout for each `/status` and `/log` request
    pub request_timeout: Duration,

    pub gate: GateConfig,

    pub poll: PollConfig,

    /// Print every data frame to the terminal
    pub verbose: bool,

    /// Colour mark lines
    pub color: bool,

    /// Frames between progress lines (0 disables them)
    pub progress_every: u64,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        LoggerConfig {
            device_addr: DEFAULT_DEVICE_ADDR.to_string(),
            output_dir: PathBuf::from("."),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            gate: GateConfig::default(),
            poll: PollConfig::default(),
            verbose: false,
            color: true,
            progress_every: 500,
        }
    }
}

impl LoggerConfig {
    /// Sets the poll timing. A backoff not longer than the interval is
    /// raised to twice the interval.
    pub fn with_poll_timing(mut self, poll_interval: Duration, failure_backoff: Duration) -> Self {
        self.poll = PollConfig {
            poll_interval,
            failure_backoff,
        }
        .normalized();
        self
    }

    /// Base URL of the device, with `http://` added when no scheme is given.
    pub fn base_url(&self) -> Result<String, LoggerError> {
        let addr = self.device_addr.trim();
        if addr.is_empty() {
            return Err(LoggerError::InvalidAddress(self.device_addr.clone()));
        }

        let candidate = if addr.contains("://") {
            addr.to_string()
        } else {
            format!("http://{}", addr)
        };

        let url = reqwest::Url::parse(&candidate)
            .map_err(|_| LoggerError::InvalidAddress(self.device_addr.clone()))?;
        if url.host_str().is_none() || !matches!(url.scheme(), "http" | "https") {
            return Err(LoggerError::InvalidAddress(self.device_addr.clone()));
        }

        Ok(candidate.trim_end_matches('/').to_string())
    }
}

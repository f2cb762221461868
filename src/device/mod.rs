//! Access to the sniffer's web API.
//!
//! The poll loop and the connection gate only see [`DeviceApi`]; the
//! production implementation is [`HttpDevice`].

pub mod client;

pub use client::HttpDevice;

use crate::error::FetchError;
use crate::types::{DeviceStatus, RemoteEntry};
use async_trait::async_trait;

/// The two read-only capabilities the logger needs from a device.
#[async_trait]
pub trait DeviceApi: Send + Sync {
    /// Probe liveness and configuration.
    async fn status(&self) -> Result<DeviceStatus, FetchError>;

    /// Fetch the current window of the device's log buffer.
    async fn snapshot(&self) -> Result<Vec<RemoteEntry>, FetchError>;
}


//! Connection gate - blocks session start until the device answers `/status`.
//!
//! There is no retry cap: the logger has nothing useful to do until the
//! device is reachable, so the gate keeps probing until it succeeds or the
//! caller cancels.

use crate::device::DeviceApi;
use crate::report::Reporter;
use crate::types::DeviceStatus;
use log::{debug, info};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Configuration for the connection gate.
#[derive(Debug, Clone)]
pub struct GateConfig {
    /// Delay between failed probes
    pub retry_delay: Duration,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            retry_delay: Duration::from_secs(1),
        }
    }
}

/// Waits for a device to become reachable.
pub struct ConnectionGate<'a, D: DeviceApi> {
    device: &'a D,
    config: GateConfig,
}

impl<'a, D: DeviceApi> ConnectionGate<'a, D> {
    pub fn new(device: &'a D, config: GateConfig) -> Self {
        Self { device, config }
    }

    /// Probes `/status` until it parses.
    ///
    /// Every failed probe is reported and followed by `retry_delay`. Returns
    /// `None` only if `cancel` fires, which is honoured mid-probe and
    /// mid-backoff alike.
    pub async fn await_reachable<R: Reporter>(
        &self,
        reporter: &mut R,
        cancel: &CancellationToken,
    ) -> Option<DeviceStatus> {
        let mut attempts: u64 = 0;

        loop {
            attempts += 1;
            let probe = tokio::select! {
                biased;
                _ = cancel.cancelled() => return None,
                result = self.device.status() => result,
            };

            match probe {
                Ok(status) => {
                    info!(
                        "Device reachable after {} probe(s), baud {}",
                        attempts, status.baud
                    );
                    reporter.connected(&status);
                    return Some(status);
                }
                Err(e) => {
                    debug!("Status probe {} failed: {}", attempts, e);
                    reporter.probe_failed(&e);
                }
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return None,
                _ = tokio::time::sleep(self.config.retry_delay) => {}
            }
        }
    }
}

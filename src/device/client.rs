//! HTTP client for the sniffer's web API.
//!
//! Only two endpoints are used, both plain `GET`s with no body:
//! `/status` for the connection gate and `/log` for the poll loop.

use super::DeviceApi;
use crate::error::{FetchError, LoggerError};
use crate::types::{decode_snapshot, decode_status, DeviceStatus, RemoteEntry};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

/// Default per-request timeout for both endpoints.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(2);

/// A device reached over HTTP.
#[derive(Debug, Clone)]
pub struct HttpDevice {
    base_url: String,
    http: Client,
}

impl HttpDevice {
    /// Create a client for the device at `base_url` (e.g. `http://192.168.0.200`).
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, LoggerError> {
        let http = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .map_err(LoggerError::Client)?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// GET `path` and return the raw body of a successful response.
    async fn get_body(&self, path: &str) -> Result<(String, Vec<u8>), FetchError> {
        let url = self.url(path);

        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| classify(&url, e))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus {
                url,
                status: status.as_u16(),
            });
        }

        let body = resp.bytes().await.map_err(|e| classify(&url, e))?;
        Ok((url, body.to_vec()))
    }
}

fn classify(url: &str, err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        FetchError::Timeout {
            url: url.to_string(),
        }
    } else {
        FetchError::Unreachable {
            url: url.to_string(),
            reason: err.to_string(),
        }
    }
}

#[async_trait]
impl DeviceApi for HttpDevice {
    async fn status(&self) -> Result<DeviceStatus, FetchError> {
        let (url, body) = self.get_body("/status").await?;
        decode_status(&body).map_err(|reason| FetchError::Malformed { url, reason })
    }

    async fn snapshot(&self) -> Result<Vec<RemoteEntry>, FetchError> {
        let (url, body) = self.get_body("/log").await?;
        decode_snapshot(&body).map_err(|reason| FetchError::Malformed { url, reason })
    }
}

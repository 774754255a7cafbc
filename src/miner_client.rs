use std::time::Duration;

use log::debug;
use reqwest::blocking::Client;
use reqwest::StatusCode;
use thiserror::Error;

pub const INFO_PATH: &str = "/api/system/info";

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("unexpected HTTP status {0}")]
    Status(StatusCode),
}

/// URL polled for a configured endpoint. Bare `host[:port]` addresses get the
/// system info path appended; full URLs are used as they are.
pub fn info_url(address: &str) -> String {
    let address = address.trim();
    if address.starts_with("http://") || address.starts_with("https://") {
        address.to_string()
    } else {
        format!("http://{}{}", address.trim_end_matches('/'), INFO_PATH)
    }
}

pub struct MinerClient {
    http: Client,
}

impl MinerClient {
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let http = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()?;

        Ok(MinerClient { http })
    }

    /// Raw body of the miner's system info page.
    pub fn fetch(&self, address: &str) -> Result<Vec<u8>, FetchError> {
        let url = info_url(address);
        debug!("GET {}", url);

        let response = self.http.get(&url).send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status));
        }

        Ok(response.bytes()?.to_vec())
    }
}

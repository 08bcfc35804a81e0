use crate::error::ClientError;
use serde::Deserialize;
use std::time::Duration;

/// Timing knobs of request-reply calls.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RequestConfig {
    /// How long a request may wait for its reply before failing with a timeout.
    #[serde(default = "RequestConfig::default_request_timeout_ms")]
    request_timeout_ms: u64,

    #[serde(default = "RequestConfig::default_scan_interval_ms")]
    scan_interval_ms: u64,
}

impl RequestConfig {
    fn default_request_timeout_ms() -> u64 {
        3000
    }

    fn default_scan_interval_ms() -> u64 {
        1000
    }

    pub fn new(request_timeout_ms: u64, scan_interval_ms: u64) -> Result<Self, ClientError> {
        let config = Self {
            request_timeout_ms,
            scan_interval_ms,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_json(json: &str) -> Result<Self, ClientError> {
        let config: RequestConfig = serde_json::from_str(json)
            .map_err(|e| ClientError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// # Errors
    /// Raise ClientError::InvalidConfig if the scan interval is zero.
    pub fn validate(&self) -> Result<(), ClientError> {
        if self.scan_interval_ms == 0 {
            return Err(ClientError::InvalidConfig(
                "scanIntervalMs must be positive".to_owned(),
            ));
        }
        Ok(())
    }

    pub fn request_timeout_ms(&self) -> u64 {
        self.request_timeout_ms
    }

    pub fn scan_interval_ms(&self) -> u64 {
        self.scan_interval_ms
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn scan_interval(&self) -> Duration {
        Duration::from_millis(self.scan_interval_ms)
    }
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: RequestConfig::default_request_timeout_ms(),
            scan_interval_ms: RequestConfig::default_scan_interval_ms(),
        }
    }
}

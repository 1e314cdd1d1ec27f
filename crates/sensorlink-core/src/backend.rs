//! HTTP client for the telemetry backend's device API.
//!
//! Only available with the `backend-client` feature.
//!
//! # Example
//!
//! ```no_run
//! use sensorlink_core::backend::BackendClient;
//! use sensorlink_types::{DeviceConfiguration, DeviceRecord};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = BackendClient::new("http://localhost:8080")?;
//!
//! let mut config = DeviceConfiguration::from_record(&DeviceRecord::new("ESP32-CAM-1"));
//! config.sampling_rate = 500;
//!
//! let updated = client.configure_device("ESP32-CAM-1", &config).await?;
//! println!("{} reconfigured", updated.display_name());
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use sensorlink_types::{DeviceConfiguration, DeviceRecord};

/// HTTP client for the backend API.
#[derive(Debug, Clone)]
pub struct BackendClient {
    client: Client,
    base_url: Url,
}

/// Error type for backend client operations.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// The backend is not reachable.
    #[error("Backend not reachable at {url}: {source}")]
    NotReachable {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Invalid URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// API returned an error response.
    #[error("API error ({status}): {message}")]
    ApiError { status: u16, message: String },
}

/// Result type for backend client operations.
pub type Result<T> = std::result::Result<T, BackendError>;

/// Response body of the configure endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigureResponse {
    /// The device record after the update.
    pub device: DeviceRecord,
}

impl BackendClient {
    /// Create a new backend client.
    ///
    /// # Arguments
    ///
    /// * `base_url` - The backend base URL (e.g., "https://telemetry.example.com")
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(BackendError::Request)?;
        Self::with_client(base_url, client)
    }

    /// Create a client with a custom reqwest Client.
    pub fn with_client(base_url: &str, client: Client) -> Result<Self> {
        let trimmed = base_url.trim().trim_end_matches('/');

        if !trimmed.starts_with("http://") && !trimmed.starts_with("https://") {
            return Err(BackendError::InvalidUrl(format!(
                "URL must start with http:// or https://, got: {}",
                trimmed
            )));
        }

        let base_url = Url::parse(trimmed).map_err(|e| BackendError::InvalidUrl(e.to_string()))?;
        if base_url.cannot_be_a_base() {
            return Err(BackendError::InvalidUrl(format!("{} cannot be a base URL", trimmed)));
        }

        Ok(Self { client, base_url })
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &str {
        self.base_url.as_str().trim_end_matches('/')
    }

    /// URL of the configure endpoint for `device_id`. The id is percent-encoded.
    pub fn configure_url(&self, device_id: &str) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| BackendError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(["api", "devices", device_id, "configure"]);
        Ok(url)
    }

    /// Push a configuration to a device and return its updated record.
    pub async fn configure_device(
        &self,
        device_id: &str,
        config: &DeviceConfiguration,
    ) -> Result<DeviceRecord> {
        let url = self.configure_url(device_id)?;
        debug!("PUT {}", url);

        let response = self
            .client
            .put(url.clone())
            .json(config)
            .send()
            .await
            .map_err(|e| BackendError::NotReachable {
                url: url.to_string(),
                source: e,
            })?;

        let body: ConfigureResponse = Self::handle_response(response).await?;
        Ok(body.device)
    }

    async fn handle_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T> {
        let status = response.status();
        if status.is_success() {
            response.json().await.map_err(BackendError::Request)
        } else {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<serde_json::Value>(&body)
                .ok()
                .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(String::from))
                .or_else(|| (!body.trim().is_empty()).then(|| body.trim().to_string()))
                .unwrap_or_else(|| status.to_string());

            Err(BackendError::ApiError {
                status: status.as_u16(),
                message,
            })
        }
    }
}

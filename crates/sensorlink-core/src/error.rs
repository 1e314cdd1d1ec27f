//! Error types for sensorlink-core.
//!
//! This module defines the errors that can occur while running a telemetry
//! stream client.
//!
//! # Which errors reach the caller
//!
//! Only caller misuse is returned from the public API. Everything that can
//! happen on the wire is absorbed by the client:
//!
//! | Error Type | Surfaced as | Strategy |
//! |------------|-------------|----------|
//! | [`Error::InvalidEndpoint`] | `Err` from `start` | Fix the URL |
//! | [`Error::InvalidDeviceId`] | `Err` from `start` | Fix the device id |
//! | [`Error::InvalidConfig`] | `Err` from `new` / `start` | Fix the options |
//! | [`Error::WebSocket`] | `ConnectionStatus::Error` + event | Reconnect with backoff |
//! | [`Error::ConnectionFailed`] | `ConnectionStatus::Error` + event | Reconnect with backoff |
//! | [`Error::Timeout`] | `ConnectionStatus::Error` + event | Reconnect with backoff |
//! | [`Error::Parse`] | dropped frame, metrics counter | None, next frame is independent |
//!
//! ## Reconnect policy
//!
//! The delay before reconnect attempt `n` is `min(max_delay, initial_delay * 2^n)`
//! and the counter resets whenever a connection opens. See
//! [`crate::ReconnectOptions`].
//!
//! ```ignore
//! use sensorlink_core::{ClientOptions, ReconnectOptions, TelemetryStreamClient};
//! use std::time::Duration;
//!
//! let options = ClientOptions::builder()
//!     .capacity(120)
//!     .reconnect(ReconnectOptions::default().max_delay(Duration::from_secs(10)))
//!     .build();
//!
//! let client = TelemetryStreamClient::new(options)?;
//! client.start("ESP32-A", "wss://telemetry.example.com/ws/devices").await?;
//! ```

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur in the telemetry client.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The endpoint is not a usable `ws://` or `wss://` URL.
    #[error("Invalid endpoint '{endpoint}': {reason}")]
    InvalidEndpoint {
        /// The rejected endpoint string.
        endpoint: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The device id is blank.
    #[error("Invalid device id: {0}")]
    InvalidDeviceId(String),

    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// WebSocket protocol or transport error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Connection could not be established.
    #[error("Connection to {endpoint} failed: {reason}")]
    ConnectionFailed {
        /// Endpoint that was being dialled.
        endpoint: String,
        /// Description of the failure.
        reason: String,
    },

    /// Operation timed out.
    #[error("Operation '{operation}' timed out after {duration:?}")]
    Timeout {
        /// The operation that timed out.
        operation: String,
        /// The timeout duration.
        duration: Duration,
    },

    /// Operation was cancelled by `stop()`.
    #[error("Operation cancelled")]
    Cancelled,

    /// A frame could not be decoded.
    #[error(transparent)]
    Parse(#[from] sensorlink_types::ParseError),

    /// I/O error.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create an invalid endpoint error.
    pub fn invalid_endpoint(endpoint: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidEndpoint {
            endpoint: endpoint.into(),
            reason: reason.into(),
        }
    }

    /// Create a configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }

    /// Create a connection failure.
    pub fn connection_failed(endpoint: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ConnectionFailed {
            endpoint: endpoint.into(),
            reason: reason.into(),
        }
    }

    /// Create a timeout error with operation context.
    pub fn timeout(operation: impl Into<String>, duration: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            duration,
        }
    }

    /// Whether this error comes from the network and is worth retrying.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::WebSocket(_) | Error::ConnectionFailed { .. } | Error::Timeout { .. } | Error::Io(_)
        )
    }
}

/// Result type alias using sensorlink-core's Error type.
pub type Result<T> = std::result::Result<T, Error>;

//! Error types for message parsing in sensorlink-types.

use thiserror::Error;

/// Errors that can occur when decoding a telemetry frame.
///
/// None of these are fatal: the stream client drops the offending frame and
/// keeps the connection open.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ParseError {
    /// The frame was not valid JSON, or did not match the expected shape.
    #[error("Malformed message: {0}")]
    Json(#[from] serde_json::Error),

    /// A required field was absent, null, or empty.
    #[error("Missing field: {0}")]
    MissingField(&'static str),

    /// A field was present but held an unusable value.
    #[error("Invalid value: {0}")]
    InvalidValue(String),

    /// The `type` tag named a message this crate does not model.
    #[error("Unknown message type '{0}'")]
    UnknownType(String),
}

/// Result type alias using sensorlink-types' ParseError type.
pub type ParseResult<T> = std::result::Result<T, ParseError>;

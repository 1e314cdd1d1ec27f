//! Validated WebSocket endpoint URLs.

use core::fmt;
use std::str::FromStr;

use url::Url;

use crate::error::{Error, Result};

/// A `ws://` or `wss://` URL with a host.
///
/// # Examples
///
/// ```
/// use sensorlink_core::Endpoint;
///
/// let endpoint = Endpoint::parse("wss://telemetry.example.com/ws/devices").unwrap();
/// assert!(endpoint.is_secure());
/// assert!(Endpoint::parse("http://telemetry.example.com").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint(Url);

impl Endpoint {
    /// Parse and validate an endpoint string.
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        let url = Url::parse(trimmed).map_err(|e| Error::invalid_endpoint(trimmed, e.to_string()))?;

        match url.scheme() {
            "ws" | "wss" => {}
            other => {
                return Err(Error::invalid_endpoint(
                    trimmed,
                    format!("scheme must be ws or wss, got '{}'", other),
                ));
            }
        }

        if url.host_str().is_none_or(str::is_empty) {
            return Err(Error::invalid_endpoint(trimmed, "missing host"));
        }

        Ok(Self(url))
    }

    /// The endpoint as a string.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// The underlying URL.
    pub fn url(&self) -> &Url {
        &self.0
    }

    /// Whether the endpoint uses TLS.
    pub fn is_secure(&self) -> bool {
        self.0.scheme() == "wss"
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.as_str())
    }
}

impl FromStr for Endpoint {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_ws_and_wss() {
        let ws = Endpoint::parse("ws://localhost:8080/ws/devices").unwrap();
        assert!(!ws.is_secure());
        assert_eq!(ws.url().port(), Some(8080));

        let wss = Endpoint::parse("  wss://10.0.0.5/stream ").unwrap();
        assert!(wss.is_secure());
        assert_eq!(wss.as_str(), "wss://10.0.0.5/stream");
    }

    #[test]
    fn test_rejects_other_schemes() {
        for raw in ["http://host/ws", "https://host", "ftp://host", "file:///tmp/x"] {
            let err = Endpoint::parse(raw).unwrap_err();
            assert!(matches!(err, Error::InvalidEndpoint { .. }), "{raw}");
        }
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(Endpoint::parse("").is_err());
        assert!(Endpoint::parse("not a url").is_err());
        assert!(Endpoint::parse("ws://").is_err());
    }

    #[test]
    fn test_from_str() {
        let endpoint: Endpoint = "ws://example.com/ws".parse().unwrap();
        assert_eq!(endpoint.to_string(), "ws://example.com/ws");
    }
}

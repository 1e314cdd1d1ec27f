//! Transport abstraction over the telemetry connection.
//!
//! The client talks to a [`Transport`] to open a [`Connection`] and then pulls
//! [`Frame`]s from it. [`WsTransport`] is the real WebSocket implementation;
//! [`crate::mock::MockTransport`] replays scripted frames for tests.
//!
//! # Example
//!
//! ```ignore
//! use sensorlink_core::{Endpoint, Transport, WsTransport};
//!
//! async fn dump(endpoint: &Endpoint) -> sensorlink_core::Result<()> {
//!     let mut conn = WsTransport::default().connect(endpoint).await?;
//!     while let Some(frame) = conn.next_frame().await {
//!         println!("{:?}", frame?);
//!     }
//!     Ok(())
//! }
//! ```

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, trace};

use crate::endpoint::Endpoint;
use crate::error::{Error, Result};

/// Default timeout for opening a connection.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// A data frame received from the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// UTF-8 text frame.
    Text(String),
    /// Binary frame, expected to hold UTF-8 JSON.
    Binary(Vec<u8>),
}

impl Frame {
    /// The frame payload as text, if it is valid UTF-8.
    pub fn into_text(self) -> Option<String> {
        match self {
            Frame::Text(s) => Some(s),
            Frame::Binary(b) => String::from_utf8(b).ok(),
        }
    }
}

/// Something that can open telemetry connections.
///
/// This trait enables driving the client against a real WebSocket server or a
/// scripted mock.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Open a connection to `endpoint`.
    async fn connect(&self, endpoint: &Endpoint) -> Result<Box<dyn Connection>>;
}

/// An open telemetry connection.
#[async_trait]
pub trait Connection: Send {
    /// Wait for the next data frame.
    ///
    /// Returns `None` once the server closed the connection, and `Some(Err)`
    /// on a transport error. Control frames are handled internally.
    async fn next_frame(&mut self) -> Option<Result<Frame>>;

    /// Close the connection. Errors are ignored.
    async fn close(&mut self);
}

/// WebSocket transport backed by `tokio-tungstenite`.
#[derive(Debug, Clone)]
pub struct WsTransport {
    connect_timeout: Duration,
}

impl WsTransport {
    /// Create a transport with the given connect timeout.
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

impl Default for WsTransport {
    fn default() -> Self {
        Self::new(DEFAULT_CONNECT_TIMEOUT)
    }
}

#[async_trait]
impl Transport for WsTransport {
    async fn connect(&self, endpoint: &Endpoint) -> Result<Box<dyn Connection>> {
        debug!("Opening WebSocket to {}", endpoint);

        let (stream, response) =
            tokio::time::timeout(self.connect_timeout, tokio_tungstenite::connect_async(endpoint.as_str()))
                .await
                .map_err(|_| Error::timeout("connect", self.connect_timeout))??;

        debug!("WebSocket handshake complete ({})", response.status());
        Ok(Box::new(WsConnection { stream }))
    }
}

struct WsConnection {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl Connection for WsConnection {
    async fn next_frame(&mut self) -> Option<Result<Frame>> {
        loop {
            match self.stream.next().await? {
                Ok(Message::Text(text)) => return Some(Ok(Frame::Text(text.as_str().to_owned()))),
                Ok(Message::Binary(data)) => return Some(Ok(Frame::Binary(data.to_vec()))),
                Ok(Message::Close(frame)) => {
                    debug!("Server closed connection: {:?}", frame);
                    return None;
                }
                Ok(other) => trace!("Skipping control frame: {:?}", other),
                Err(e) => return Some(Err(e.into())),
            }
        }
    }

    async fn close(&mut self) {
        if let Err(e) = self.stream.close(None).await {
            trace!("Error while closing WebSocket: {}", e);
        }
    }
}

//! Mock transport implementation for testing.
//!
//! This module provides a scripted [`Transport`] that can be used to drive a
//! [`TelemetryStreamClient`](crate::TelemetryStreamClient) without a network.
//!
//! # Features
//!
//! - **Scripted connects**: queue accepted or failing connection attempts
//! - **Frame injection**: push text or binary frames, transport errors and
//!   server closes through a [`MockConnectionHandle`]
//! - **Attempt recording**: every connect is timestamped with tokio's clock, so
//!   backoff can be asserted under paused time

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Notify, mpsc};
use tokio::time::Instant;
use tracing::debug;

use crate::endpoint::Endpoint;
use crate::error::{Error, Result};
use crate::transport::{Connection, Frame, Transport};

enum Scripted {
    Fail(String),
    Open(mpsc::UnboundedReceiver<MockEvent>),
}

enum MockEvent {
    Frame(Frame),
    Error(String),
    Close,
}

/// A scripted transport for testing.
///
/// Each call to [`Transport::connect`] consumes the next scripted outcome. When
/// the script is empty, connects fail.
///
/// # Example
///
/// ```
/// use sensorlink_core::mock::MockTransport;
///
/// let transport = MockTransport::new();
/// transport.fail_next("refused");
/// let server = transport.accept_next();
/// server.send_text(r#"{"type":"heartbeat","deviceId":"esp32-a"}"#);
/// assert_eq!(transport.attempt_count(), 0);
/// ```
#[derive(Default)]
pub struct MockTransport {
    script: Mutex<VecDeque<Scripted>>,
    attempts: Mutex<Vec<(Instant, String)>>,
    attempt_count: AtomicU32,
    attempt_notify: Notify,
    connect_latency: Mutex<Duration>,
}

impl std::fmt::Debug for MockTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockTransport")
            .field("attempt_count", &self.attempt_count())
            .finish()
    }
}

impl MockTransport {
    /// Create a transport with an empty script.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next connect attempt fail.
    pub fn fail_next(&self, reason: &str) {
        self.push(Scripted::Fail(reason.to_string()));
    }

    /// Make the next connect attempt succeed, returning the server side.
    pub fn accept_next(&self) -> MockConnectionHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        self.push(Scripted::Open(rx));
        MockConnectionHandle { tx }
    }

    /// Delay every connect by `latency`.
    pub fn set_connect_latency(&self, latency: Duration) {
        if let Ok(mut guard) = self.connect_latency.lock() {
            *guard = latency;
        }
    }

    /// Number of connect attempts so far.
    pub fn attempt_count(&self) -> u32 {
        self.attempt_count.load(Ordering::SeqCst)
    }

    /// When each connect attempt happened.
    pub fn attempt_times(&self) -> Vec<Instant> {
        self.attempts
            .lock()
            .map(|a| a.iter().map(|(at, _)| *at).collect())
            .unwrap_or_default()
    }

    /// Endpoint of each connect attempt.
    pub fn attempt_endpoints(&self) -> Vec<String> {
        self.attempts
            .lock()
            .map(|a| a.iter().map(|(_, e)| e.clone()).collect())
            .unwrap_or_default()
    }

    /// Wait until at least `count` connect attempts have been made.
    pub async fn wait_for_attempts(&self, count: u32) {
        loop {
            let notified = self.attempt_notify.notified();
            if self.attempt_count() >= count {
                return;
            }
            notified.await;
        }
    }

    fn push(&self, outcome: Scripted) {
        if let Ok(mut script) = self.script.lock() {
            script.push_back(outcome);
        }
    }

    fn record_attempt(&self, endpoint: &Endpoint) -> Option<Scripted> {
        if let Ok(mut attempts) = self.attempts.lock() {
            attempts.push((Instant::now(), endpoint.to_string()));
        }
        self.attempt_count.fetch_add(1, Ordering::SeqCst);
        self.attempt_notify.notify_waiters();
        self.script.lock().ok().and_then(|mut s| s.pop_front())
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn connect(&self, endpoint: &Endpoint) -> Result<Box<dyn Connection>> {
        let outcome = self.record_attempt(endpoint);

        let latency = self.connect_latency.lock().map(|l| *l).unwrap_or_default();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        match outcome {
            Some(Scripted::Open(rx)) => {
                debug!("Mock connection to {} accepted", endpoint);
                Ok(Box::new(MockConnection { rx }))
            }
            Some(Scripted::Fail(reason)) => Err(Error::connection_failed(endpoint.as_str(), reason)),
            None => Err(Error::connection_failed(
                endpoint.as_str(),
                "no scripted connection",
            )),
        }
    }
}

struct MockConnection {
    rx: mpsc::UnboundedReceiver<MockEvent>,
}

#[async_trait]
impl Connection for MockConnection {
    async fn next_frame(&mut self) -> Option<Result<Frame>> {
        match self.rx.recv().await? {
            MockEvent::Frame(frame) => Some(Ok(frame)),
            MockEvent::Error(reason) => Some(Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                reason,
            )))),
            MockEvent::Close => None,
        }
    }

    async fn close(&mut self) {
        self.rx.close();
    }
}

/// Server side of a scripted connection.
///
/// Dropping the handle closes the connection from the server side.
#[derive(Debug, Clone)]
pub struct MockConnectionHandle {
    tx: mpsc::UnboundedSender<MockEvent>,
}

impl MockConnectionHandle {
    /// Send a text frame.
    pub fn send_text(&self, text: impl Into<String>) {
        let _ = self.tx.send(MockEvent::Frame(Frame::Text(text.into())));
    }

    /// Send a binary frame.
    pub fn send_binary(&self, data: impl Into<Vec<u8>>) {
        let _ = self.tx.send(MockEvent::Frame(Frame::Binary(data.into())));
    }

    /// Report a transport error on the connection.
    pub fn error(&self, reason: &str) {
        let _ = self.tx.send(MockEvent::Error(reason.to_string()));
    }

    /// Close the connection from the server side.
    pub fn close(&self) {
        let _ = self.tx.send(MockEvent::Close);
    }

    /// Whether the client side has closed or dropped the connection.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

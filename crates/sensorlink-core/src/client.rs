//! The resilient telemetry stream client.
//!
//! [`TelemetryStreamClient`] keeps one connection to a telemetry endpoint open,
//! reconnecting with backoff whenever it drops, and maintains a bounded buffer
//! of recent samples per sensor channel for a single device.
//!
//! A background driver task owns the connection, the reconnect timer and all
//! buffer mutation. [`TelemetryStreamClient::stop`] cancels that task through a
//! [`CancellationToken`] and waits for it, so once `stop` returns no socket is
//! open and no timer is pending.

use core::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock, Weak};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use sensorlink_types::{DeviceId, DeviceRecord, Sample};

use crate::channel::{DEFAULT_CHANNEL_CAPACITY, TelemetrySnapshot};
use crate::endpoint::Endpoint;
use crate::error::{Error, Result};
use crate::events::{DisconnectReason, EventDispatcher, EventReceiver, TelemetryEvent};
use crate::ingest::{Ingested, TelemetryIngestor};
use crate::metrics::{ClientMetrics, MetricsSnapshot};
use crate::reconnect::ReconnectOptions;
use crate::registry::PresenceChange;
use crate::transport::{Connection, DEFAULT_CONNECT_TIMEOUT, Frame, Transport, WsTransport};

/// Observable connection state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    /// Not started, or stopped.
    #[default]
    Idle,
    /// A connection attempt is in progress.
    Connecting,
    /// The connection is open.
    Connected,
    /// The server closed the connection; a retry is pending.
    Disconnected,
    /// The last attempt or the open connection failed.
    Error,
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionStatus::Idle => "idle",
            ConnectionStatus::Connecting => "connecting",
            ConnectionStatus::Connected => "connected",
            ConnectionStatus::Disconnected => "disconnected",
            ConnectionStatus::Error => "error",
        };
        f.write_str(s)
    }
}

/// Options for a [`TelemetryStreamClient`].
///
/// ```
/// use sensorlink_core::{ClientOptions, ReconnectOptions};
/// use std::time::Duration;
///
/// let options = ClientOptions::builder()
///     .capacity(50)
///     .reconnect(ReconnectOptions::fixed_delay(Duration::from_secs(2)))
///     .build();
/// assert!(options.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ClientOptions {
    /// Samples kept per sensor channel. Default: 60.
    pub capacity: usize,
    /// Reconnect policy. Default: exponential 1s..30s, unlimited.
    pub reconnect: ReconnectOptions,
    /// Timeout for opening a WebSocket. Default: 10 seconds.
    pub connect_timeout: Duration,
    /// Capacity of the event broadcast channel. Default: 100.
    pub event_capacity: usize,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CHANNEL_CAPACITY,
            reconnect: ReconnectOptions::default(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            event_capacity: 100,
        }
    }
}

impl ClientOptions {
    /// Create a new builder for ClientOptions.
    pub fn builder() -> ClientOptionsBuilder {
        ClientOptionsBuilder::default()
    }

    /// Validate the options and return an error if invalid.
    pub fn validate(&self) -> Result<()> {
        if self.capacity == 0 {
            return Err(Error::invalid_config("capacity must be >= 1"));
        }
        if self.connect_timeout.is_zero() {
            return Err(Error::invalid_config("connect_timeout must be > 0"));
        }
        if self.event_capacity == 0 {
            return Err(Error::invalid_config("event_capacity must be >= 1"));
        }
        self.reconnect.validate()
    }
}

/// Builder for ClientOptions.
#[derive(Debug, Clone, Default)]
pub struct ClientOptionsBuilder {
    options: ClientOptions,
}

impl ClientOptionsBuilder {
    /// Set the per-channel capacity.
    #[must_use]
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.options.capacity = capacity;
        self
    }

    /// Set the reconnect policy.
    #[must_use]
    pub fn reconnect(mut self, reconnect: ReconnectOptions) -> Self {
        self.options.reconnect = reconnect;
        self
    }

    /// Set the connect timeout.
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.options.connect_timeout = timeout;
        self
    }

    /// Set the event channel capacity.
    #[must_use]
    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.options.event_capacity = capacity;
        self
    }

    /// Build the ClientOptions.
    #[must_use]
    pub fn build(self) -> ClientOptions {
        self.options
    }
}

type UpdateCallback = Arc<dyn Fn(&TelemetrySnapshot) + Send + Sync>;

/// State shared between the client handle and its driver task.
struct Shared {
    ingestor: Mutex<Option<TelemetryIngestor>>,
    subscribers: RwLock<Vec<(u64, UpdateCallback)>>,
    next_subscriber: AtomicU64,
    status: watch::Sender<ConnectionStatus>,
    events: EventDispatcher,
    metrics: ClientMetrics,
}

impl fmt::Debug for Shared {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Shared")
            .field("status", &*self.status.borrow())
            .finish_non_exhaustive()
    }
}

impl Shared {
    fn ingestor(&self) -> MutexGuard<'_, Option<TelemetryIngestor>> {
        self.ingestor.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn set_status(&self, status: ConnectionStatus) {
        self.status.send_if_modified(|current| {
            if *current == status {
                false
            } else {
                debug!("Connection status: {} -> {}", current, status);
                *current = status;
                true
            }
        });
    }

    fn handle_frame(&self, frame: Frame) {
        self.metrics.record_frame();

        let Some(text) = frame.into_text() else {
            debug!("Dropping binary frame that is not UTF-8");
            self.metrics.record_dropped();
            return;
        };

        let received_at = OffsetDateTime::now_utc();
        let (outcome, snapshot) = {
            let mut guard = self.ingestor();
            let Some(ingestor) = guard.as_mut() else {
                return;
            };
            let outcome = ingestor.handle_message(&text, received_at);
            let snapshot = match outcome {
                Ingested::Samples { accepted } if accepted > 0 => Some(ingestor.snapshot()),
                _ => None,
            };
            (outcome, snapshot)
        };

        match outcome {
            Ingested::Samples { accepted } => {
                self.metrics.record_heartbeat(accepted);
                if let Some(snapshot) = snapshot {
                    self.notify(&snapshot);
                }
            }
            Ingested::Presence(change) => {
                self.metrics.record_presence();
                self.events.send(match change {
                    PresenceChange::Registered(device) => TelemetryEvent::DeviceRegistered { device },
                    PresenceChange::Disconnected { device_id, .. } => {
                        TelemetryEvent::DeviceDisconnected { device_id }
                    }
                    PresenceChange::Listed { count } => TelemetryEvent::DevicesListed { count },
                });
            }
            Ingested::Dropped(_) => self.metrics.record_dropped(),
        }
    }

    fn notify(&self, snapshot: &TelemetrySnapshot) {
        // Clone the callbacks out so a subscriber may (un)subscribe re-entrantly.
        let callbacks: Vec<(u64, UpdateCallback)> = self
            .subscribers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|(id, cb)| (*id, Arc::clone(cb)))
            .collect();

        // A subscriber panic is contained to that subscriber.
        for (id, callback) in callbacks {
            if panic::catch_unwind(AssertUnwindSafe(|| callback(snapshot))).is_err() {
                warn!("Update subscriber {} panicked; skipping it for this update", id);
            }
        }
    }

    fn unsubscribe(&self, id: u64) -> bool {
        let mut subscribers = self.subscribers.write().unwrap_or_else(|e| e.into_inner());
        let before = subscribers.len();
        subscribers.retain(|(sid, _)| *sid != id);
        subscribers.len() != before
    }
}

/// Handle returned by [`TelemetryStreamClient::on_update`].
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    shared: Weak<Shared>,
}

impl Subscription {
    /// Stop receiving updates. Returns `false` if the client is gone or the
    /// subscription was already removed.
    pub fn unsubscribe(self) -> bool {
        self.shared
            .upgrade()
            .is_some_and(|shared| shared.unsubscribe(self.id))
    }
}

struct Running {
    device: DeviceId,
    endpoint: Endpoint,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// A self-healing telemetry stream for one device.
///
/// # Example
///
/// ```no_run
/// use sensorlink_core::{ClientOptions, TelemetryStreamClient};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let client = TelemetryStreamClient::new(ClientOptions::default())?;
///
///     client.on_update(|snapshot| {
///         if let Some(sample) = snapshot.latest("pzem004t") {
///             println!("{:?}", sample.get("voltage_v"));
///         }
///     });
///
///     client.start("ESP32-A", "ws://localhost:8080/ws/devices").await?;
///     tokio::signal::ctrl_c().await?;
///     client.stop().await;
///     Ok(())
/// }
/// ```
pub struct TelemetryStreamClient {
    shared: Arc<Shared>,
    transport: Arc<dyn Transport>,
    options: ClientOptions,
    running: tokio::sync::Mutex<Option<Running>>,
}

impl fmt::Debug for TelemetryStreamClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelemetryStreamClient")
            .field("status", &self.status())
            .field("options", &self.options)
            .finish()
    }
}

impl TelemetryStreamClient {
    /// Create a client that connects over WebSocket.
    pub fn new(options: ClientOptions) -> Result<Self> {
        let transport = Arc::new(WsTransport::new(options.connect_timeout));
        Self::with_transport(options, transport)
    }

    /// Create a client on top of a custom transport.
    pub fn with_transport(options: ClientOptions, transport: Arc<dyn Transport>) -> Result<Self> {
        options.validate()?;
        let (status, _) = watch::channel(ConnectionStatus::Idle);
        let shared = Shared {
            ingestor: Mutex::new(None),
            subscribers: RwLock::new(Vec::new()),
            next_subscriber: AtomicU64::new(0),
            status,
            events: EventDispatcher::new(options.event_capacity),
            metrics: ClientMetrics::new(),
        };
        Ok(Self {
            shared: Arc::new(shared),
            transport,
            options,
            running: tokio::sync::Mutex::new(None),
        })
    }

    /// Start streaming telemetry for `device_id` from `endpoint`.
    ///
    /// Returns once the first connection attempt has been scheduled; the
    /// status is then [`ConnectionStatus::Connecting`]. Calling `start` again
    /// with the same target while running is a no-op. A different target
    /// stops the current stream first and discards its buffers.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidDeviceId`] if `device_id` is blank
    /// - [`Error::InvalidEndpoint`] if `endpoint` is not a `ws://` or `wss://` URL
    pub async fn start(&self, device_id: &str, endpoint: &str) -> Result<()> {
        let device = DeviceId::new(device_id)
            .map_err(|_| Error::InvalidDeviceId("device id must not be empty".to_string()))?;
        let endpoint = Endpoint::parse(endpoint)?;

        let mut running = self.running.lock().await;

        if let Some(current) = running.as_ref()
            && current.device == device
            && current.endpoint == endpoint
            && !current.handle.is_finished()
        {
            debug!("Already streaming {} from {}", device, endpoint);
            return Ok(());
        }

        if let Some(previous) = running.take() {
            info!(
                "Switching stream from {} @ {} to {} @ {}",
                previous.device, previous.endpoint, device, endpoint
            );
            self.shutdown(previous).await;
        }

        *self.shared.ingestor() = Some(TelemetryIngestor::new(device.clone(), self.options.capacity));
        self.shared.set_status(ConnectionStatus::Connecting);

        let cancel = CancellationToken::new();
        let driver = Driver {
            shared: Arc::clone(&self.shared),
            transport: Arc::clone(&self.transport),
            endpoint: endpoint.clone(),
            reconnect: self.options.reconnect.clone(),
            cancel: cancel.clone(),
        };
        let handle = tokio::spawn(driver.run());

        info!("Streaming {} from {}", device, endpoint);
        *running = Some(Running {
            device,
            endpoint,
            cancel,
            handle,
        });
        Ok(())
    }

    /// Stop streaming.
    ///
    /// Closes the connection, cancels any pending reconnect and discards all
    /// buffers. Safe to call in any state and more than once.
    pub async fn stop(&self) {
        let mut running = self.running.lock().await;
        if let Some(previous) = running.take() {
            info!("Stopping stream for {}", previous.device);
            self.shutdown(previous).await;
            self.shared.events.send(TelemetryEvent::Stopped);
        }
        *self.shared.ingestor() = None;
        self.shared.set_status(ConnectionStatus::Idle);
    }

    async fn shutdown(&self, running: Running) {
        running.cancel.cancel();
        if let Err(e) = running.handle.await {
            warn!("Stream driver task ended abnormally: {}", e);
        }
        *self.shared.ingestor() = None;
    }

    /// Register a callback invoked after each heartbeat that added samples.
    ///
    /// Callbacks run on the driver task, in message order, and must not block.
    /// A callback that panics is logged and skipped for that update; it stays
    /// subscribed.
    pub fn on_update<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&TelemetrySnapshot) + Send + Sync + 'static,
    {
        let id = self.shared.next_subscriber.fetch_add(1, Ordering::Relaxed);
        self.shared
            .subscribers
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push((id, Arc::new(callback)));
        Subscription {
            id,
            shared: Arc::downgrade(&self.shared),
        }
    }

    /// Watch the connection status.
    pub fn connection_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.shared.status.subscribe()
    }

    /// Current connection status.
    pub fn status(&self) -> ConnectionStatus {
        *self.shared.status.borrow()
    }

    /// Copy of every channel. Empty when the client is idle.
    pub fn snapshot(&self) -> TelemetrySnapshot {
        self.shared
            .ingestor()
            .as_ref()
            .map(TelemetryIngestor::snapshot)
            .unwrap_or_default()
    }

    /// Samples of one channel, oldest first.
    pub fn channel(&self, channel_id: &str) -> Option<Vec<Sample>> {
        self.shared
            .ingestor()
            .as_ref()
            .and_then(|i| i.channels().get(channel_id))
            .map(|ch| ch.iter().cloned().collect())
    }

    /// Devices currently reported by the backend.
    pub fn devices(&self) -> Vec<DeviceRecord> {
        self.shared
            .ingestor()
            .as_ref()
            .map(|i| i.registry().list())
            .unwrap_or_default()
    }

    /// The device being streamed, if started.
    pub fn device_id(&self) -> Option<DeviceId> {
        self.shared
            .ingestor()
            .as_ref()
            .map(|i| i.device().clone())
    }

    /// Subscribe to lifecycle and presence events.
    pub fn subscribe_events(&self) -> EventReceiver {
        self.shared.events.subscribe()
    }

    /// Counters for this client.
    pub fn metrics(&self) -> MetricsSnapshot {
        self.shared.metrics.snapshot()
    }

    /// The options this client was built with.
    pub fn options(&self) -> &ClientOptions {
        &self.options
    }
}

impl Drop for TelemetryStreamClient {
    fn drop(&mut self) {
        if let Some(running) = self.running.get_mut().take() {
            running.cancel.cancel();
        }
    }
}

/// Background task owning the connection.
struct Driver {
    shared: Arc<Shared>,
    transport: Arc<dyn Transport>,
    endpoint: Endpoint,
    reconnect: ReconnectOptions,
    cancel: CancellationToken,
}

impl Driver {
    async fn run(self) {
        // Failed attempts since the last successful open.
        let mut attempt: u32 = 0;

        loop {
            let shared = &self.shared;
            shared.set_status(ConnectionStatus::Connecting);
            shared.metrics.record_connect_attempt();
            shared.events.send(TelemetryEvent::Connecting {
                endpoint: self.endpoint.to_string(),
                attempt,
            });

            let connected = tokio::select! {
                _ = self.cancel.cancelled() => return,
                result = self.transport.connect(&self.endpoint) => result,
            };

            let reason = match connected {
                Ok(mut conn) => {
                    attempt = 0;
                    shared.metrics.record_connection_opened();
                    shared.set_status(ConnectionStatus::Connected);
                    shared.events.send(TelemetryEvent::Connected {
                        endpoint: self.endpoint.to_string(),
                    });
                    info!("Connected to {}", self.endpoint);

                    let reason = self.pump(conn.as_mut()).await;
                    conn.close().await;
                    match reason {
                        Some(reason) => reason,
                        None => {
                            shared.events.send(TelemetryEvent::Disconnected {
                                reason: DisconnectReason::UserRequested,
                            });
                            return;
                        }
                    }
                }
                Err(e) => {
                    warn!("Connection to {} failed: {}", self.endpoint, e);
                    shared.metrics.record_connection_error();
                    shared.set_status(ConnectionStatus::Error);
                    DisconnectReason::ConnectFailed(e.to_string())
                }
            };
            shared.events.send(TelemetryEvent::Disconnected { reason });

            if !self.reconnect.allows_attempt(attempt) {
                warn!(
                    "Giving up on {} after {} reconnect attempts",
                    self.endpoint, attempt
                );
                shared.set_status(ConnectionStatus::Error);
                shared
                    .events
                    .send(TelemetryEvent::ReconnectExhausted { attempts: attempt });
                return;
            }

            let delay = self.reconnect.delay_for_attempt(attempt);
            attempt += 1;
            info!("Reconnecting to {} in {:?} (attempt {})", self.endpoint, delay, attempt);
            shared.events.send(TelemetryEvent::ReconnectScheduled {
                attempt,
                delay_ms: delay.as_millis() as u64,
            });

            tokio::select! {
                _ = self.cancel.cancelled() => return,
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    /// Read frames until the connection ends. Returns `None` when cancelled.
    async fn pump(&self, conn: &mut dyn Connection) -> Option<DisconnectReason> {
        loop {
            let frame = tokio::select! {
                _ = self.cancel.cancelled() => return None,
                frame = conn.next_frame() => frame,
            };

            match frame {
                Some(Ok(frame)) => self.shared.handle_frame(frame),
                Some(Err(e)) => {
                    warn!("Transport error on {}: {}", self.endpoint, e);
                    self.shared.metrics.record_connection_error();
                    self.shared.set_status(ConnectionStatus::Error);
                    return Some(DisconnectReason::TransportError(e.to_string()));
                }
                None => {
                    info!("Connection to {} closed", self.endpoint);
                    self.shared.set_status(ConnectionStatus::Disconnected);
                    return Some(DisconnectReason::ClosedByServer);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_defaults() {
        let options = ClientOptions::default();
        assert_eq!(options.capacity, 60);
        assert_eq!(options.connect_timeout, Duration::from_secs(10));
        assert_eq!(options.reconnect, ReconnectOptions::default());
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_options_validation() {
        let options = ClientOptions::builder().capacity(0).build();
        assert!(matches!(options.validate(), Err(Error::InvalidConfig(_))));

        let options = ClientOptions::builder()
            .connect_timeout(Duration::ZERO)
            .build();
        assert!(options.validate().is_err());

        let options = ClientOptions::builder()
            .reconnect(ReconnectOptions::default().initial_delay(Duration::ZERO))
            .build();
        assert!(options.validate().is_err());
    }

    #[test]
    fn test_new_rejects_invalid_options() {
        let result = TelemetryStreamClient::new(ClientOptions::builder().capacity(0).build());
        assert!(result.is_err());
    }

    #[test]
    fn test_status_display_and_serde() {
        assert_eq!(ConnectionStatus::default(), ConnectionStatus::Idle);
        assert_eq!(ConnectionStatus::Disconnected.to_string(), "disconnected");
        assert_eq!(
            serde_json::to_string(&ConnectionStatus::Connected).unwrap(),
            "\"connected\""
        );
    }

    #[test]
    fn test_idle_client_is_empty() {
        let client = TelemetryStreamClient::new(ClientOptions::default()).unwrap();
        assert_eq!(client.status(), ConnectionStatus::Idle);
        assert!(client.snapshot().is_empty());
        assert!(client.channel("pzem004t").is_none());
        assert!(client.devices().is_empty());
        assert!(client.device_id().is_none());
    }

    #[test]
    fn test_subscription_unsubscribe() {
        let client = TelemetryStreamClient::new(ClientOptions::default()).unwrap();
        let a = client.on_update(|_| {});
        let b = client.on_update(|_| {});
        assert!(a.unsubscribe());
        assert_eq!(client.shared.subscribers.read().unwrap().len(), 1);

        drop(client);
        assert!(!b.unsubscribe());
    }
}

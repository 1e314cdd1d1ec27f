//! Client event system for connection and presence notifications.
//!
//! Sample updates go to `on_update` subscribers. Everything else the client
//! observes (lifecycle transitions, scheduled retries, device presence) is
//! broadcast as a [`TelemetryEvent`].

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use sensorlink_types::DeviceRecord;

/// Events that can be emitted by a telemetry client.
///
/// All events are serializable for logging and JSON output.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new event types
/// in future versions without breaking downstream code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
#[non_exhaustive]
pub enum TelemetryEvent {
    /// A connection attempt started.
    Connecting { endpoint: String, attempt: u32 },
    /// The connection is open.
    Connected { endpoint: String },
    /// The connection closed or could not be opened.
    Disconnected { reason: DisconnectReason },
    /// A reconnect timer was armed.
    ReconnectScheduled { attempt: u32, delay_ms: u64 },
    /// The retry budget is spent; the client will not reconnect.
    ReconnectExhausted { attempts: u32 },
    /// A device registered or updated its record.
    DeviceRegistered { device: DeviceRecord },
    /// A device went away.
    DeviceDisconnected { device_id: String },
    /// The backend sent the full device list.
    DevicesListed { count: usize },
    /// The client was stopped.
    Stopped,
}

/// Reason for disconnection.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new reasons
/// in future versions without breaking downstream code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
#[non_exhaustive]
pub enum DisconnectReason {
    /// The server closed the connection.
    ClosedByServer,
    /// The connection could not be established.
    ConnectFailed(String),
    /// The transport reported an error while open.
    TransportError(String),
    /// The caller stopped or replaced the stream while it was connected.
    UserRequested,
}

/// Sender for client events.
pub type EventSender = broadcast::Sender<TelemetryEvent>;

/// Receiver for client events.
pub type EventReceiver = broadcast::Receiver<TelemetryEvent>;

/// Event dispatcher for sending events to multiple receivers.
#[derive(Debug, Clone)]
pub struct EventDispatcher {
    sender: EventSender,
}

impl EventDispatcher {
    /// Create a new event dispatcher.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Subscribe to events.
    pub fn subscribe(&self) -> EventReceiver {
        self.sender.subscribe()
    }

    /// Send an event.
    pub fn send(&self, event: TelemetryEvent) {
        // Ignore error if no receivers
        let _ = self.sender.send(event);
    }

    /// Get the number of active receivers.
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new(100)
    }
}

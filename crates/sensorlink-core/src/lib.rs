//! Resilient real-time telemetry client for SensorLink devices.
//!
//! This crate keeps a WebSocket connection to a telemetry backend alive and
//! turns the heartbeats of one ESP32 board into bounded, per-sensor sample
//! buffers that applications can subscribe to.
//!
//! # Features
//!
//! - **Self-healing connection**: exponential backoff (1s doubling to 30s by
//!   default), reset on every successful open
//! - **Bounded buffers**: one FIFO ring per sensor channel, 60 samples by default
//! - **Device filtering**: heartbeats for other devices are ignored
//!   (case-insensitive)
//! - **Presence registry**: `device_registered` / `device_disconnected` /
//!   `devices_list` messages tracked alongside telemetry
//! - **Events and metrics**: lifecycle broadcast plus ingestion counters
//! - **PZEM-004T helpers**: power readings, gauge clamping, energy billing
//! - **Backend client** (feature `backend-client`): push device configuration
//!
//! # Connection states
//!
//! | Status | Meaning |
//! |--------|---------|
//! | `idle` | Not started, or stopped |
//! | `connecting` | An attempt is in flight |
//! | `connected` | Frames are flowing |
//! | `disconnected` | The server closed; a retry is pending |
//! | `error` | The attempt or connection failed; a retry is pending unless the retry budget is spent |
//!
//! # Quick Start
//!
//! ```no_run
//! use sensorlink_core::{ClientOptions, TelemetryStreamClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = TelemetryStreamClient::new(ClientOptions::default())?;
//!
//!     client.on_update(|snapshot| {
//!         for id in snapshot.channel_ids() {
//!             println!("{}: {:?}", id, snapshot.latest(id));
//!         }
//!     });
//!
//!     client.start("ESP32-A", "wss://telemetry.example.com/ws/devices").await?;
//!
//!     let mut status = client.connection_status();
//!     while status.changed().await.is_ok() {
//!         println!("status: {}", *status.borrow());
//!     }
//!     Ok(())
//! }
//! ```

pub mod channel;
pub mod client;
pub mod endpoint;
pub mod error;
pub mod events;
pub mod ingest;
pub mod metrics;
pub mod mock;
pub mod pzem;
pub mod reconnect;
pub mod registry;
pub mod transport;

#[cfg(feature = "backend-client")]
pub mod backend;

// Core exports
pub use channel::{ChannelSet, DEFAULT_CHANNEL_CAPACITY, SensorChannel, TelemetrySnapshot};
pub use client::{
    ClientOptions, ClientOptionsBuilder, ConnectionStatus, Subscription, TelemetryStreamClient,
};
pub use endpoint::Endpoint;
pub use error::{Error, Result};
pub use events::{DisconnectReason, EventDispatcher, EventReceiver, EventSender, TelemetryEvent};
pub use ingest::{DropReason, Ingested, TelemetryIngestor};
pub use metrics::{ClientMetrics, MetricsSnapshot};
pub use mock::{MockConnectionHandle, MockTransport};
pub use pzem::{EnergyBill, GaugeLimits, PowerReading, Tariff, is_pzem_channel, latest_power};
pub use reconnect::ReconnectOptions;
pub use registry::{DeviceRegistry, PresenceChange};
pub use transport::{Connection, Frame, Transport, WsTransport};

// Re-export from sensorlink-types
pub use sensorlink_types::{
    DeviceConfiguration, DeviceId, DeviceRecord, HeartbeatMessage, ParseError, Sample,
    SensorReport, SensorStatus, ServerMessage,
};

//! Frame ingestion.
//!
//! [`TelemetryIngestor`] is the synchronous core of the client: it decodes one
//! frame, filters it against the configured device and merges the result into
//! the channel buffers or the presence registry. It owns no I/O, which keeps
//! it usable from tests without a runtime.

use time::OffsetDateTime;
use tracing::{debug, trace};

use sensorlink_types::{DeviceId, ParseError, Sample, ServerMessage};

use crate::channel::{ChannelSet, TelemetrySnapshot};
use crate::registry::{DeviceRegistry, PresenceChange};

/// Result of ingesting one frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Ingested {
    /// A heartbeat for the configured device was merged.
    Samples {
        /// Number of active sensors that produced a sample.
        accepted: usize,
    },
    /// A presence message updated the registry.
    Presence(PresenceChange),
    /// The frame was discarded.
    Dropped(DropReason),
}

/// Why a frame was discarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropReason {
    /// Not JSON, missing `type`, or a known type with the wrong shape.
    Malformed(String),
    /// A `type` the client does not handle.
    UnknownType(String),
    /// A heartbeat for some other device.
    ForeignDevice(String),
}

/// Buffers and registry for one device, fed one frame at a time.
#[derive(Debug, Clone)]
pub struct TelemetryIngestor {
    device: DeviceId,
    channels: ChannelSet,
    registry: DeviceRegistry,
}

impl TelemetryIngestor {
    /// Create an ingestor for `device` with `capacity` samples per channel.
    pub fn new(device: DeviceId, capacity: usize) -> Self {
        Self {
            device,
            channels: ChannelSet::new(capacity),
            registry: DeviceRegistry::new(),
        }
    }

    /// The configured device.
    pub fn device(&self) -> &DeviceId {
        &self.device
    }

    /// Decode and merge one frame.
    ///
    /// Samples are stamped with `received_at`. Never fails: anything that
    /// cannot be used is reported as [`Ingested::Dropped`].
    pub fn handle_message(&mut self, raw: &str, received_at: OffsetDateTime) -> Ingested {
        let message = match ServerMessage::parse(raw) {
            Ok(message) => message,
            Err(ParseError::UnknownType(kind)) => {
                trace!("Ignoring message of type '{}'", kind);
                return Ingested::Dropped(DropReason::UnknownType(kind));
            }
            Err(e) => {
                debug!("Dropping malformed frame: {}", e);
                return Ingested::Dropped(DropReason::Malformed(e.to_string()));
            }
        };

        match message {
            ServerMessage::Heartbeat(hb) => {
                if !self.device.matches(&hb.device_id) {
                    trace!("Ignoring heartbeat for {}", hb.device_id);
                    return Ingested::Dropped(DropReason::ForeignDevice(hb.device_id));
                }

                let mut accepted = 0;
                for report in hb.active_sensors() {
                    self.channels
                        .push(&report.id, Sample::from_report(report, received_at));
                    accepted += 1;
                }
                debug!(
                    "Heartbeat from {}: {} of {} sensors active",
                    hb.device_id,
                    accepted,
                    hb.sensors.len()
                );
                Ingested::Samples { accepted }
            }
            ServerMessage::DeviceRegistered { device } => {
                debug!("Device registered: {}", device.device_id);
                self.registry.register(device.clone());
                Ingested::Presence(PresenceChange::Registered(device))
            }
            ServerMessage::DeviceDisconnected { device_id } => {
                debug!("Device disconnected: {}", device_id);
                let known = self.registry.disconnect(&device_id).is_some();
                Ingested::Presence(PresenceChange::Disconnected { device_id, known })
            }
            ServerMessage::DevicesList { devices } => {
                self.registry.replace(devices);
                Ingested::Presence(PresenceChange::Listed {
                    count: self.registry.len(),
                })
            }
        }
    }

    /// Copy the current buffers.
    pub fn snapshot(&self) -> TelemetrySnapshot {
        self.channels.snapshot(self.device.as_str())
    }

    /// Channel buffers.
    pub fn channels(&self) -> &ChannelSet {
        &self.channels
    }

    /// Presence registry.
    pub fn registry(&self) -> &DeviceRegistry {
        &self.registry
    }

    /// Discard all buffers and presence records.
    pub fn clear(&mut self) {
        self.channels.clear();
        self.registry.clear();
    }
}

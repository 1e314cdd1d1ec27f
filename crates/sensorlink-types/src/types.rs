//! Core types for SensorLink telemetry frames.

use core::fmt;
use std::collections::BTreeMap;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use time::OffsetDateTime;

use crate::error::{ParseError, ParseResult};

/// Identifier of a telemetry source (typically an ESP32 board).
///
/// Device ids are opaque and compared case-insensitively: `ESP32-A` and
/// `esp32-a` name the same device. The original spelling is kept for display.
///
/// # Examples
///
/// ```
/// use sensorlink_types::DeviceId;
///
/// let id = DeviceId::new("ESP32-A").unwrap();
/// assert!(id.matches("esp32-a"));
/// assert_eq!(id.to_string(), "ESP32-A");
/// assert!(DeviceId::new("   ").is_err());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DeviceId {
    raw: String,
    key: String,
}

impl DeviceId {
    /// Create a device id. Surrounding whitespace is trimmed; blank ids are rejected.
    pub fn new(id: impl Into<String>) -> ParseResult<Self> {
        let raw = id.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ParseError::MissingField("deviceId"));
        }
        Ok(Self {
            key: trimmed.to_lowercase(),
            raw: trimmed.to_string(),
        })
    }

    /// The id as originally spelled.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Case-insensitive comparison against an id received on the wire.
    #[must_use]
    pub fn matches(&self, other: &str) -> bool {
        other.to_lowercase() == self.key
    }
}

impl PartialEq for DeviceId {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for DeviceId {}

impl std::hash::Hash for DeviceId {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl FromStr for DeviceId {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for DeviceId {
    type Error = ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<DeviceId> for String {
    fn from(id: DeviceId) -> Self {
        id.raw
    }
}

/// Reported state of a sensor inside a heartbeat.
///
/// Only [`SensorStatus::Active`] sensors contribute samples. The comparison is
/// exact: `"Active"` is not active.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "Option<String>", into = "Option<String>")]
pub enum SensorStatus {
    /// The sensor is producing readings.
    Active,
    /// No status was reported.
    #[default]
    Unknown,
    /// Any other status string (`"inactive"`, `"error"`, ...).
    Other(String),
}

impl SensorStatus {
    /// Whether readings from this sensor should be recorded.
    pub fn is_active(&self) -> bool {
        matches!(self, SensorStatus::Active)
    }
}

impl From<Option<String>> for SensorStatus {
    fn from(value: Option<String>) -> Self {
        match value {
            Some(s) if s == "active" => SensorStatus::Active,
            Some(s) => SensorStatus::Other(s),
            None => SensorStatus::Unknown,
        }
    }
}

impl From<SensorStatus> for Option<String> {
    fn from(status: SensorStatus) -> Self {
        match status {
            SensorStatus::Active => Some("active".to_string()),
            SensorStatus::Unknown => None,
            SensorStatus::Other(s) => Some(s),
        }
    }
}

impl fmt::Display for SensorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SensorStatus::Active => write!(f, "active"),
            SensorStatus::Unknown => write!(f, "unknown"),
            SensorStatus::Other(s) => write!(f, "{}", s),
        }
    }
}

/// One sensor's entry inside a heartbeat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorReport {
    /// Sensor id, used as the channel key (e.g. `"pzem004t"`, `"dht22"`).
    pub id: String,
    /// Reported sensor status. A non-string status is kept as [`SensorStatus::Other`].
    #[serde(default, deserialize_with = "lenient_status")]
    pub status: SensorStatus,
    /// Raw field values. Devices send numbers, numeric strings, and
    /// occasionally labels or flags. Anything but an object reads as empty.
    #[serde(default, deserialize_with = "lenient_data")]
    pub data: Map<String, Value>,
}

fn lenient_status<'de, D>(deserializer: D) -> Result<SensorStatus, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => SensorStatus::Unknown,
        Value::String(s) => SensorStatus::from(Some(s)),
        other => SensorStatus::Other(other.to_string()),
    })
}

fn lenient_data<'de, D>(deserializer: D) -> Result<Map<String, Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Object(map) => map,
        _ => Map::new(),
    })
}

fn lenient_sensors<'de, D>(deserializer: D) -> Result<Vec<SensorReport>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<SensorReport>>::deserialize(deserializer)?.unwrap_or_default())
}

impl SensorReport {
    /// Whether this report should produce a sample.
    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    /// The numeric-coercible subset of [`data`](Self::data).
    pub fn numeric_fields(&self) -> BTreeMap<String, f64> {
        numeric_fields(&self.data)
    }
}

/// Periodic telemetry message from a device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeartbeatMessage {
    /// Id of the reporting device.
    pub device_id: String,
    /// Sensor readings carried by this heartbeat. `null` reads as empty.
    #[serde(default, deserialize_with = "lenient_sensors")]
    pub sensors: Vec<SensorReport>,
}

impl HeartbeatMessage {
    /// Sensors whose status is `active`.
    pub fn active_sensors(&self) -> impl Iterator<Item = &SensorReport> {
        self.sensors.iter().filter(|s| s.is_active())
    }
}

/// A single timestamped reading of one sensor channel.
///
/// The timestamp is the local receipt time, not a device clock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// When the heartbeat carrying this sample was received.
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    /// Numeric field values, keyed by field name.
    pub fields: BTreeMap<String, f64>,
}

impl Sample {
    /// Create a sample from already-coerced fields.
    pub fn new(timestamp: OffsetDateTime, fields: BTreeMap<String, f64>) -> Self {
        Self { timestamp, fields }
    }

    /// Build a sample from a sensor report, dropping non-numeric fields.
    pub fn from_report(report: &SensorReport, received_at: OffsetDateTime) -> Self {
        Self::new(received_at, report.numeric_fields())
    }

    /// Look up a field value.
    pub fn get(&self, field: &str) -> Option<f64> {
        self.fields.get(field).copied()
    }
}

/// A capability advertised by a registered device (camera, microphone, relay...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Capability {
    /// Capability id.
    pub id: String,
    /// Display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Whether the capability can be toggled remotely.
    #[serde(default)]
    pub configurable: bool,
    /// Current enabled flag, if the device reports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    /// Fields this crate does not model, preserved verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Presence record for a device known to the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceRecord {
    /// Device id. Registry lookups on this field are exact.
    pub device_id: String,
    /// Friendly name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Advertised capabilities.
    #[serde(default)]
    pub capabilities: Vec<Capability>,
    /// Fields this crate does not model (IP address, firmware, settings...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl DeviceRecord {
    /// Create a bare record with only an id.
    pub fn new(device_id: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            name: None,
            capabilities: Vec::new(),
            extra: Map::new(),
        }
    }

    /// Name if known, otherwise the id.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.device_id)
    }
}

/// Default sampling rate (ms) applied when a device does not report one.
pub const DEFAULT_SAMPLING_RATE: u64 = 1000;

/// Default camera resolution applied when a device does not report one.
pub const DEFAULT_CAMERA_RESOLUTION: &str = "640x480";

/// Settings pushed to a device through the backend's configure endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceConfiguration {
    /// Friendly name.
    pub device_name: String,
    /// Sampling period in milliseconds.
    pub sampling_rate: u64,
    /// Camera resolution, `WIDTHxHEIGHT`.
    pub camera_resolution: String,
    /// Enable frame compression.
    pub compression_enabled: bool,
    /// Enable over-the-air updates.
    pub ota_enabled: bool,
    /// Capabilities with their desired enabled flags.
    pub capabilities: Vec<Capability>,
}

impl DeviceConfiguration {
    /// Seed a configuration from a presence record.
    ///
    /// Values the device does not report fall back to the defaults. Every
    /// configurable capability starts out enabled.
    pub fn from_record(record: &DeviceRecord) -> Self {
        let capabilities = record
            .capabilities
            .iter()
            .cloned()
            .map(|mut cap| {
                if cap.configurable {
                    cap.enabled = Some(true);
                }
                cap
            })
            .collect();

        Self {
            device_name: record.name.clone().unwrap_or_default(),
            sampling_rate: record
                .extra
                .get("samplingRate")
                .and_then(Value::as_u64)
                .unwrap_or(DEFAULT_SAMPLING_RATE),
            camera_resolution: record
                .extra
                .get("cameraResolution")
                .and_then(Value::as_str)
                .unwrap_or(DEFAULT_CAMERA_RESOLUTION)
                .to_string(),
            compression_enabled: record
                .extra
                .get("compressionEnabled")
                .and_then(Value::as_bool)
                .unwrap_or(true),
            ota_enabled: record
                .extra
                .get("otaEnabled")
                .and_then(Value::as_bool)
                .unwrap_or(true),
            capabilities,
        }
    }

    /// Toggle a configurable capability.
    ///
    /// Returns `false` if no configurable capability has this id.
    pub fn set_capability_enabled(&mut self, id: &str, enabled: bool) -> bool {
        match self
            .capabilities
            .iter_mut()
            .find(|c| c.configurable && c.id == id)
        {
            Some(cap) => {
                cap.enabled = Some(enabled);
                true
            }
            None => false,
        }
    }
}

/// A decoded server frame.
///
/// The wire format tags each JSON object with a `type` field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Sensor telemetry from one device.
    Heartbeat(HeartbeatMessage),
    /// A device came online or updated its record.
    DeviceRegistered {
        /// The device's current record.
        device: DeviceRecord,
    },
    /// A device went offline.
    DeviceDisconnected {
        /// Id of the device that left.
        #[serde(rename = "deviceId")]
        device_id: String,
    },
    /// Full list of currently connected devices.
    DevicesList {
        /// Every connected device.
        devices: Vec<DeviceRecord>,
    },
}

impl ServerMessage {
    const KNOWN_TYPES: [&'static str; 4] = [
        "heartbeat",
        "device_registered",
        "device_disconnected",
        "devices_list",
    ];

    /// Decode a text frame.
    ///
    /// # Errors
    ///
    /// - [`ParseError::Json`] if the frame is not JSON or a known message has the wrong shape
    /// - [`ParseError::MissingField`] if `type` is absent, or a heartbeat has no `deviceId`
    /// - [`ParseError::UnknownType`] for any other `type`
    ///
    /// # Examples
    ///
    /// ```
    /// use sensorlink_types::ServerMessage;
    ///
    /// let raw = r#"{"type":"heartbeat","deviceId":"esp32-a","sensors":[]}"#;
    /// match ServerMessage::parse(raw).unwrap() {
    ///     ServerMessage::Heartbeat(hb) => assert_eq!(hb.device_id, "esp32-a"),
    ///     other => panic!("unexpected {:?}", other),
    /// }
    /// ```
    pub fn parse(raw: &str) -> ParseResult<Self> {
        let value: Value = serde_json::from_str(raw)?;

        let kind = value
            .get("type")
            .and_then(Value::as_str)
            .ok_or(ParseError::MissingField("type"))?;

        if !Self::KNOWN_TYPES.contains(&kind) {
            return Err(ParseError::UnknownType(kind.to_string()));
        }

        let message = ServerMessage::deserialize(value)?;

        if let ServerMessage::Heartbeat(hb) = &message
            && hb.device_id.is_empty()
        {
            return Err(ParseError::MissingField("deviceId"));
        }

        Ok(message)
    }

    /// The `type` tag of this message.
    pub fn kind(&self) -> &'static str {
        match self {
            ServerMessage::Heartbeat(_) => "heartbeat",
            ServerMessage::DeviceRegistered { .. } => "device_registered",
            ServerMessage::DeviceDisconnected { .. } => "device_disconnected",
            ServerMessage::DevicesList { .. } => "devices_list",
        }
    }
}

/// Coerce a JSON value to a finite number.
///
/// Accepts JSON numbers and strings whose trimmed content parses as a number.
/// Everything else (booleans, null, empty strings, containers, `NaN`,
/// infinities) yields `None`.
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use sensorlink_types::coerce_number;
///
/// assert_eq!(coerce_number(&json!(230.4)), Some(230.4));
/// assert_eq!(coerce_number(&json!(" 12.5 ")), Some(12.5));
/// assert_eq!(coerce_number(&json!("on")), None);
/// assert_eq!(coerce_number(&json!(true)), None);
/// assert_eq!(coerce_number(&json!("NaN")), None);
/// ```
pub fn coerce_number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                return None;
            }
            s.parse::<f64>().ok()?
        }
        _ => return None,
    };
    n.is_finite().then_some(n)
}

/// Keep only the numeric-coercible entries of a field map.
pub fn numeric_fields(data: &Map<String, Value>) -> BTreeMap<String, f64> {
    data.iter()
        .filter_map(|(k, v)| coerce_number(v).map(|n| (k.clone(), n)))
        .collect()
}

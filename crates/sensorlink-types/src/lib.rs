//! Wire types for SensorLink telemetry.
//!
//! This crate models the JSON frames a warehouse telemetry backend pushes to
//! dashboard clients over WebSocket, independent of any transport or runtime.
//!
//! # Features
//!
//! - Heartbeat messages carrying per-sensor readings from ESP32 boards
//! - Device presence messages (`device_registered`, `device_disconnected`, `devices_list`)
//! - Case-insensitive device identifiers
//! - Numeric coercion of loosely typed sensor fields
//! - Device configuration payloads for the backend REST API
//!
//! # Example
//!
//! ```
//! use sensorlink_types::{ServerMessage, Sample};
//! use time::OffsetDateTime;
//!
//! let raw = r#"{
//!     "type": "heartbeat",
//!     "deviceId": "ESP32-A",
//!     "sensors": [{"id": "dht22", "status": "active", "data": {"temperature": "24.1", "unit": "C"}}]
//! }"#;
//!
//! if let ServerMessage::Heartbeat(hb) = ServerMessage::parse(raw).unwrap() {
//!     let sample = Sample::from_report(&hb.sensors[0], OffsetDateTime::now_utc());
//!     assert_eq!(sample.get("temperature"), Some(24.1));
//!     assert_eq!(sample.get("unit"), None);
//! }
//! ```

pub mod error;
pub mod types;

pub use error::{ParseError, ParseResult};
pub use types::{
    Capability, DEFAULT_CAMERA_RESOLUTION, DEFAULT_SAMPLING_RATE, DeviceConfiguration, DeviceId,
    DeviceRecord, HeartbeatMessage, Sample, SensorReport, SensorStatus, ServerMessage,
    coerce_number, numeric_fields,
};

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use time::OffsetDateTime;

    // --- ServerMessage parsing tests ---

    #[test]
    fn test_parse_heartbeat() {
        let raw = json!({
            "type": "heartbeat",
            "deviceId": "ESP32-A",
            "sensors": [
                {"id": "pzem004t", "status": "active", "data": {"voltage_v": 229.8, "current_a": "1.25"}},
                {"id": "dht22", "status": "inactive", "data": {"temperature": 21.0}}
            ]
        })
        .to_string();

        let msg = ServerMessage::parse(&raw).unwrap();
        let ServerMessage::Heartbeat(hb) = msg else {
            panic!("expected heartbeat");
        };

        assert_eq!(hb.device_id, "ESP32-A");
        assert_eq!(hb.sensors.len(), 2);
        assert!(hb.sensors[0].is_active());
        assert_eq!(
            hb.sensors[1].status,
            SensorStatus::Other("inactive".to_string())
        );
        assert_eq!(hb.active_sensors().count(), 1);
    }

    #[test]
    fn test_parse_heartbeat_without_sensors() {
        let msg = ServerMessage::parse(r#"{"type":"heartbeat","deviceId":"a"}"#).unwrap();
        let ServerMessage::Heartbeat(hb) = msg else {
            panic!("expected heartbeat");
        };
        assert!(hb.sensors.is_empty());

        let msg =
            ServerMessage::parse(r#"{"type":"heartbeat","deviceId":"a","sensors":null}"#).unwrap();
        let ServerMessage::Heartbeat(hb) = msg else {
            panic!("expected heartbeat");
        };
        assert!(hb.sensors.is_empty());
    }

    #[test]
    fn test_parse_heartbeat_with_odd_sensor_entries() {
        let raw = json!({
            "type": "heartbeat",
            "deviceId": "ESP32-A",
            "sensors": [
                {"id": "pzem004t", "status": "active", "data": {"voltage_v": 230}},
                {"id": "cam", "status": "inactive", "data": null},
                {"id": "pir", "status": 1, "data": [true]},
                {"id": "mq2", "status": null, "data": "warming up"}
            ]
        })
        .to_string();

        let msg = ServerMessage::parse(&raw).unwrap();
        let ServerMessage::Heartbeat(hb) = msg else {
            panic!("expected heartbeat");
        };

        assert_eq!(hb.sensors.len(), 4);
        assert!(hb.sensors[1].data.is_empty());
        assert_eq!(hb.sensors[2].status, SensorStatus::Other("1".to_string()));
        assert!(hb.sensors[2].data.is_empty());
        assert_eq!(hb.sensors[3].status, SensorStatus::Unknown);
        assert!(hb.sensors[3].data.is_empty());
        let active: Vec<&str> = hb.active_sensors().map(|s| s.id.as_str()).collect();
        assert_eq!(active, vec!["pzem004t"]);
    }

    #[test]
    fn test_parse_heartbeat_missing_device_id() {
        let err = ServerMessage::parse(r#"{"type":"heartbeat","sensors":[]}"#).unwrap_err();
        assert!(matches!(err, ParseError::Json(_)));

        let err = ServerMessage::parse(r#"{"type":"heartbeat","deviceId":""}"#).unwrap_err();
        assert!(matches!(err, ParseError::MissingField("deviceId")));
    }

    #[test]
    fn test_parse_malformed_json() {
        let err = ServerMessage::parse("{not json").unwrap_err();
        assert!(matches!(err, ParseError::Json(_)));
        assert!(err.to_string().starts_with("Malformed message"));
    }

    #[test]
    fn test_parse_missing_type() {
        let err = ServerMessage::parse(r#"{"deviceId":"a"}"#).unwrap_err();
        assert!(matches!(err, ParseError::MissingField("type")));

        // Non-object JSON has no type either
        let err = ServerMessage::parse("42").unwrap_err();
        assert!(matches!(err, ParseError::MissingField("type")));
    }

    #[test]
    fn test_parse_unknown_type() {
        let err = ServerMessage::parse(r#"{"type":"lock_state","locked":true}"#).unwrap_err();
        match err {
            ParseError::UnknownType(kind) => assert_eq!(kind, "lock_state"),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_parse_presence_messages() {
        let registered = json!({
            "type": "device_registered",
            "device": {
                "deviceId": "ESP32-CAM-1",
                "name": "Dock camera",
                "ip": "10.0.0.12",
                "capabilities": [{"id": "camera", "configurable": true}]
            }
        })
        .to_string();
        let ServerMessage::DeviceRegistered { device } = ServerMessage::parse(&registered).unwrap()
        else {
            panic!("expected device_registered");
        };
        assert_eq!(device.device_id, "ESP32-CAM-1");
        assert_eq!(device.display_name(), "Dock camera");
        assert_eq!(device.extra.get("ip"), Some(&json!("10.0.0.12")));
        assert!(device.capabilities[0].configurable);

        let msg = ServerMessage::parse(r#"{"type":"device_disconnected","deviceId":"x"}"#).unwrap();
        assert_eq!(
            msg,
            ServerMessage::DeviceDisconnected {
                device_id: "x".to_string()
            }
        );
        assert_eq!(msg.kind(), "device_disconnected");

        let msg = ServerMessage::parse(
            r#"{"type":"devices_list","devices":[{"deviceId":"a"},{"deviceId":"b"}]}"#,
        )
        .unwrap();
        let ServerMessage::DevicesList { devices } = msg else {
            panic!("expected devices_list");
        };
        assert_eq!(devices.len(), 2);
    }

    #[test]
    fn test_serialize_round_trip_keeps_tag() {
        let msg = ServerMessage::DeviceDisconnected {
            device_id: "esp32-a".to_string(),
        };
        let raw = serde_json::to_string(&msg).unwrap();
        assert!(raw.contains(r#""type":"device_disconnected""#));
        assert!(raw.contains(r#""deviceId":"esp32-a""#));
        assert_eq!(ServerMessage::parse(&raw).unwrap(), msg);
    }

    // --- Sensor status tests ---

    #[test]
    fn test_sensor_status_is_exact() {
        let status: SensorStatus = serde_json::from_value(json!("Active")).unwrap();
        assert!(!status.is_active());

        let status: SensorStatus = serde_json::from_value(json!(null)).unwrap();
        assert_eq!(status, SensorStatus::Unknown);

        let report: SensorReport = serde_json::from_value(json!({"id": "x"})).unwrap();
        assert_eq!(report.status, SensorStatus::Unknown);
        assert!(report.data.is_empty());
    }

    // --- Numeric coercion tests ---

    #[test]
    fn test_coerce_number() {
        assert_eq!(coerce_number(&json!(0)), Some(0.0));
        assert_eq!(coerce_number(&json!(-3.5)), Some(-3.5));
        assert_eq!(coerce_number(&json!("1e3")), Some(1000.0));
        assert_eq!(coerce_number(&json!("")), None);
        assert_eq!(coerce_number(&json!("  ")), None);
        assert_eq!(coerce_number(&json!("inf")), None);
        assert_eq!(coerce_number(&json!("-Infinity")), None);
        assert_eq!(coerce_number(&json!(null)), None);
        assert_eq!(coerce_number(&json!([1])), None);
        assert_eq!(coerce_number(&json!({"v": 1})), None);
    }

    #[test]
    fn test_sample_drops_non_numeric_fields() {
        let report: SensorReport = serde_json::from_value(json!({
            "id": "pzem004t",
            "status": "active",
            "data": {
                "voltage_v": 230.1,
                "current_a": "0.42",
                "relay": "on",
                "ok": true,
                "note": null,
                "frequency_hz": "NaN"
            }
        }))
        .unwrap();

        let at = OffsetDateTime::UNIX_EPOCH;
        let sample = Sample::from_report(&report, at);

        assert_eq!(sample.timestamp, at);
        assert_eq!(sample.fields.len(), 2);
        assert_eq!(sample.get("voltage_v"), Some(230.1));
        assert_eq!(sample.get("current_a"), Some(0.42));
        assert_eq!(sample.get("relay"), None);
        assert_eq!(sample.get("frequency_hz"), None);
    }

    // --- DeviceId tests ---

    #[test]
    fn test_device_id_case_insensitive() {
        let a = DeviceId::new("ESP32-A").unwrap();
        let b: DeviceId = "esp32-a".parse().unwrap();
        assert_eq!(a, b);
        assert!(a.matches("Esp32-A"));
        assert!(!a.matches("esp32-b"));
        assert_eq!(a.as_str(), "ESP32-A");
    }

    #[test]
    fn test_device_id_trims_and_rejects_blank() {
        let id = DeviceId::new("  dock-1 ").unwrap();
        assert_eq!(id.as_str(), "dock-1");
        assert!(DeviceId::new("").is_err());

        let parsed: Result<DeviceId, _> = serde_json::from_value(json!(""));
        assert!(parsed.is_err());
    }

    // --- DeviceConfiguration tests ---

    #[test]
    fn test_configuration_defaults_from_record() {
        let record: DeviceRecord = serde_json::from_value(json!({
            "deviceId": "cam-1",
            "capabilities": [
                {"id": "camera", "configurable": true, "enabled": false},
                {"id": "wifi", "configurable": false}
            ]
        }))
        .unwrap();

        let config = DeviceConfiguration::from_record(&record);
        assert_eq!(config.device_name, "");
        assert_eq!(config.sampling_rate, DEFAULT_SAMPLING_RATE);
        assert_eq!(config.camera_resolution, DEFAULT_CAMERA_RESOLUTION);
        assert!(config.compression_enabled);
        assert!(config.ota_enabled);
        assert_eq!(config.capabilities[0].enabled, Some(true));
        assert_eq!(config.capabilities[1].enabled, None);
    }

    #[test]
    fn test_configuration_uses_reported_values() {
        let record: DeviceRecord = serde_json::from_value(json!({
            "deviceId": "cam-1",
            "name": "Gate",
            "samplingRate": 250,
            "cameraResolution": "1280x720",
            "otaEnabled": false
        }))
        .unwrap();

        let config = DeviceConfiguration::from_record(&record);
        assert_eq!(config.device_name, "Gate");
        assert_eq!(config.sampling_rate, 250);
        assert_eq!(config.camera_resolution, "1280x720");
        assert!(!config.ota_enabled);

        let body = serde_json::to_value(&config).unwrap();
        assert_eq!(body["samplingRate"], json!(250));
        assert_eq!(body["deviceName"], json!("Gate"));
    }

    #[test]
    fn test_set_capability_enabled() {
        let record: DeviceRecord = serde_json::from_value(json!({
            "deviceId": "cam-1",
            "capabilities": [
                {"id": "camera", "configurable": true},
                {"id": "wifi", "configurable": false}
            ]
        }))
        .unwrap();

        let mut config = DeviceConfiguration::from_record(&record);
        assert!(config.set_capability_enabled("camera", false));
        assert_eq!(config.capabilities[0].enabled, Some(false));
        assert!(!config.set_capability_enabled("wifi", false));
        assert!(!config.set_capability_enabled("mic", true));
    }
}

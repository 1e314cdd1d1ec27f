//! Command-line interface for SensorLink warehouse telemetry.
//!
//! The `sensorlink` binary follows one ESP32 board through the telemetry
//! backend's WebSocket feed, reconnecting with exponential backoff whenever the
//! connection drops.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `watch` | Stream live samples from a device |
//! | `power` | PZEM-004T power readings with a running electricity bill |
//! | `devices` | List devices registered with the backend |
//! | `configure` | Push a configuration to a registered device |
//! | `config` | Manage CLI configuration |
//! | `completions` | Generate shell completions |
//!
//! # Configuration
//!
//! The CLI stores configuration in `~/.config/sensorlink/config.toml` (or
//! platform equivalent):
//!
//! ```toml
//! endpoint = "wss://telemetry.example.com/ws/devices"
//! device = "ESP32-A"
//! backend_url = "https://telemetry.example.com"
//! capacity = 60
//! tariff = "residential"
//! no_color = false
//!
//! [reconnect]
//! initial_delay_ms = 1000
//! max_delay_ms = 30000
//! ```
//!
//! # Environment Variables
//!
//! - `SENSORLINK_ENDPOINT`: WebSocket endpoint (overridden by `--endpoint`)
//! - `SENSORLINK_DEVICE`: Device id (overridden by `--device`)
//! - `SENSORLINK_BACKEND_URL`: Backend base URL for `configure`
//! - `SENSORLINK_CONFIG`: Alternative config file
//! - `NO_COLOR`: Disable colored output when set
//!
//! # Examples
//!
//! ```bash
//! sensorlink watch --device ESP32-A --endpoint ws://localhost:8080/ws/devices
//! sensorlink power --device ESP32-A --tariff commercial
//! sensorlink devices --json
//! sensorlink configure --device ESP32-CAM-1 --sampling-rate 500 --disable camera
//! ```

// The binary is the product; the library only documents it and re-exports the
// crates it is built on.
pub use sensorlink_core;
pub use sensorlink_types;

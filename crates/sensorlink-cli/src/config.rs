//! Configuration file management.
//!
//! Settings resolve in this order: command-line flag, environment variable,
//! config file, built-in default. Flags and environment variables are merged by
//! clap before they reach this module.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use sensorlink_core::{ClientOptions, Endpoint, ReconnectOptions, Tariff};

use crate::cli::{ConfigKey, parse_bool_arg};

/// Endpoint used when neither flag, environment nor config name one.
pub const DEFAULT_ENDPOINT: &str = "ws://localhost:8080/ws/devices";

/// Backend base URL used when none is configured.
pub const DEFAULT_BACKEND_URL: &str = "http://localhost:8080";

/// Configuration file structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Default telemetry WebSocket endpoint
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Default device id
    #[serde(default)]
    pub device: Option<String>,

    /// Backend HTTP base URL
    #[serde(default)]
    pub backend_url: Option<String>,

    /// Samples kept per sensor channel
    #[serde(default)]
    pub capacity: Option<usize>,

    /// Billing tariff for the power view
    #[serde(default)]
    pub tariff: Option<Tariff>,

    /// Disable colored output
    #[serde(default)]
    pub no_color: bool,

    /// Reconnect backoff overrides
    #[serde(default)]
    pub reconnect: ReconnectConfig,
}

/// `[reconnect]` table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReconnectConfig {
    /// First retry delay in milliseconds
    #[serde(default)]
    pub initial_delay_ms: Option<u64>,

    /// Delay cap in milliseconds
    #[serde(default)]
    pub max_delay_ms: Option<u64>,
}

impl Config {
    /// Get the default config file path
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("sensorlink")
            .join("config.toml")
    }

    /// The file in use: an explicit path, or the default location.
    pub fn path(custom: Option<&Path>) -> PathBuf {
        custom.map(Path::to_path_buf).unwrap_or_else(Self::default_path)
    }

    /// Load config from file, or return default if not found
    pub fn load(path: &Path) -> Self {
        if path.exists() {
            match fs::read_to_string(path) {
                Ok(content) => match toml::from_str(&content) {
                    Ok(config) => return config,
                    Err(e) => {
                        eprintln!("Warning: Failed to parse config: {}", e);
                    }
                },
                Err(e) => {
                    eprintln!("Warning: Failed to read config: {}", e);
                }
            }
        }
        Self::default()
    }

    /// Save config to file
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, content)
            .with_context(|| format!("Failed to write config: {}", path.display()))?;

        Ok(())
    }

    /// Current value of a key, formatted for display.
    pub fn get(&self, key: ConfigKey) -> Option<String> {
        match key {
            ConfigKey::Endpoint => self.endpoint.clone(),
            ConfigKey::Device => self.device.clone(),
            ConfigKey::BackendUrl => self.backend_url.clone(),
            ConfigKey::Capacity => self.capacity.map(|c| c.to_string()),
            ConfigKey::Tariff => self.tariff.map(|t| t.to_string()),
            ConfigKey::NoColor => Some(self.no_color.to_string()),
            ConfigKey::ReconnectInitialDelayMs => {
                self.reconnect.initial_delay_ms.map(|v| v.to_string())
            }
            ConfigKey::ReconnectMaxDelayMs => self.reconnect.max_delay_ms.map(|v| v.to_string()),
        }
    }

    /// Validate and store a value.
    pub fn set(&mut self, key: ConfigKey, value: &str) -> Result<()> {
        let value = value.trim();
        match key {
            ConfigKey::Endpoint => {
                let endpoint = Endpoint::parse(value)?;
                self.endpoint = Some(endpoint.to_string());
            }
            ConfigKey::Device => {
                if value.is_empty() {
                    bail!("Device id cannot be empty");
                }
                self.device = Some(value.to_string());
            }
            ConfigKey::BackendUrl => {
                if !value.starts_with("http://") && !value.starts_with("https://") {
                    bail!("Backend URL must start with http:// or https://, got: {}", value);
                }
                self.backend_url = Some(value.trim_end_matches('/').to_string());
            }
            ConfigKey::Capacity => {
                let capacity: usize = value
                    .parse()
                    .with_context(|| format!("Invalid capacity: {}", value))?;
                if capacity == 0 {
                    bail!("Capacity must be at least 1");
                }
                self.capacity = Some(capacity);
            }
            ConfigKey::Tariff => {
                self.tariff = Some(value.parse().map_err(anyhow::Error::msg)?);
            }
            ConfigKey::NoColor => {
                self.no_color = parse_bool_arg(value).map_err(anyhow::Error::msg)?;
            }
            ConfigKey::ReconnectInitialDelayMs => {
                self.reconnect.initial_delay_ms = Some(parse_delay_ms(value)?);
            }
            ConfigKey::ReconnectMaxDelayMs => {
                self.reconnect.max_delay_ms = Some(parse_delay_ms(value)?);
            }
        }
        Ok(())
    }

    /// Remove a value, restoring its default.
    pub fn unset(&mut self, key: ConfigKey) {
        match key {
            ConfigKey::Endpoint => self.endpoint = None,
            ConfigKey::Device => self.device = None,
            ConfigKey::BackendUrl => self.backend_url = None,
            ConfigKey::Capacity => self.capacity = None,
            ConfigKey::Tariff => self.tariff = None,
            ConfigKey::NoColor => self.no_color = false,
            ConfigKey::ReconnectInitialDelayMs => self.reconnect.initial_delay_ms = None,
            ConfigKey::ReconnectMaxDelayMs => self.reconnect.max_delay_ms = None,
        }
    }
}

fn parse_delay_ms(value: &str) -> Result<u64> {
    let ms: u64 = value
        .parse()
        .with_context(|| format!("Invalid delay in milliseconds: {}", value))?;
    if ms == 0 {
        bail!("Delay must be at least 1 ms");
    }
    Ok(ms)
}

/// Resolve the endpoint from arg (flag or env), config, or the default.
pub fn resolve_endpoint(endpoint: Option<String>, config: &Config) -> String {
    endpoint
        .or_else(|| config.endpoint.clone())
        .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string())
}

/// Resolve device from arg (flag or env) or config.
pub fn resolve_device(device: Option<String>, config: &Config) -> Option<String> {
    device.or_else(|| config.device.clone())
}

/// Resolve the backend base URL from arg (flag or env), config, or the default.
pub fn resolve_backend_url(url: Option<String>, config: &Config) -> String {
    url.or_else(|| config.backend_url.clone())
        .unwrap_or_else(|| DEFAULT_BACKEND_URL.to_string())
}

/// Resolve tariff: explicit flag overrides config.
pub fn resolve_tariff(tariff: Option<Tariff>, config: &Config) -> Tariff {
    tariff.or(config.tariff).unwrap_or_default()
}

/// Build client options from the capacity flag and the config file.
pub fn client_options(capacity: Option<usize>, config: &Config) -> Result<ClientOptions> {
    let mut reconnect = ReconnectOptions::default();
    if let Some(ms) = config.reconnect.initial_delay_ms {
        reconnect = reconnect.initial_delay(Duration::from_millis(ms));
    }
    if let Some(ms) = config.reconnect.max_delay_ms {
        reconnect = reconnect.max_delay(Duration::from_millis(ms));
    }

    let mut builder = ClientOptions::builder().reconnect(reconnect);
    if let Some(capacity) = capacity.or(config.capacity) {
        builder = builder.capacity(capacity);
    }

    let options = builder.build();
    options
        .validate()
        .context("Invalid client settings (check the [reconnect] table in the config file)")?;
    Ok(options)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_endpoint_prefers_arg() {
        let config = Config {
            endpoint: Some("ws://config.local/ws".to_string()),
            ..Default::default()
        };
        assert_eq!(
            resolve_endpoint(Some("ws://arg.local/ws".to_string()), &config),
            "ws://arg.local/ws"
        );
        assert_eq!(resolve_endpoint(None, &config), "ws://config.local/ws");
        assert_eq!(resolve_endpoint(None, &Config::default()), DEFAULT_ENDPOINT);
    }

    #[test]
    fn test_resolve_device_falls_back_to_config() {
        let config = Config {
            device: Some("ESP32-A".to_string()),
            ..Default::default()
        };
        assert_eq!(resolve_device(None, &config), Some("ESP32-A".to_string()));
        assert_eq!(
            resolve_device(Some("ESP32-B".to_string()), &config),
            Some("ESP32-B".to_string())
        );
        assert_eq!(resolve_device(None, &Config::default()), None);
    }

    #[test]
    fn test_resolve_tariff() {
        let config = Config {
            tariff: Some(Tariff::Commercial),
            ..Default::default()
        };
        assert_eq!(resolve_tariff(None, &config), Tariff::Commercial);
        assert_eq!(
            resolve_tariff(Some(Tariff::Residential), &config),
            Tariff::Residential
        );
        assert_eq!(resolve_tariff(None, &Config::default()), Tariff::Residential);
    }

    #[test]
    fn test_client_options_from_config() {
        let config = Config {
            capacity: Some(20),
            reconnect: ReconnectConfig {
                initial_delay_ms: Some(500),
                max_delay_ms: Some(5_000),
            },
            ..Default::default()
        };

        let options = client_options(None, &config).unwrap();
        assert_eq!(options.capacity, 20);
        assert_eq!(options.reconnect.initial_delay, Duration::from_millis(500));
        assert_eq!(options.reconnect.max_delay, Duration::from_secs(5));

        let options = client_options(Some(3), &config).unwrap();
        assert_eq!(options.capacity, 3);
    }

    #[test]
    fn test_client_options_rejects_inverted_delays() {
        let config = Config {
            reconnect: ReconnectConfig {
                initial_delay_ms: Some(10_000),
                max_delay_ms: Some(1_000),
            },
            ..Default::default()
        };
        assert!(client_options(None, &config).is_err());
    }

    #[test]
    fn test_set_and_unset() {
        let mut config = Config::default();

        config.set(ConfigKey::Endpoint, "wss://t.example.com/ws/devices").unwrap();
        config.set(ConfigKey::Tariff, "Commercial").unwrap();
        config.set(ConfigKey::NoColor, "yes").unwrap();
        config.set(ConfigKey::BackendUrl, "https://api.example.com/").unwrap();
        config.set(ConfigKey::ReconnectMaxDelayMs, "15000").unwrap();

        assert_eq!(
            config.get(ConfigKey::Endpoint).as_deref(),
            Some("wss://t.example.com/ws/devices")
        );
        assert_eq!(config.tariff, Some(Tariff::Commercial));
        assert!(config.no_color);
        assert_eq!(config.backend_url.as_deref(), Some("https://api.example.com"));
        assert_eq!(config.reconnect.max_delay_ms, Some(15_000));

        config.unset(ConfigKey::Tariff);
        config.unset(ConfigKey::NoColor);
        assert_eq!(config.get(ConfigKey::Tariff), None);
        assert!(!config.no_color);
    }

    #[test]
    fn test_set_rejects_invalid_values() {
        let mut config = Config::default();
        assert!(config.set(ConfigKey::Endpoint, "http://not-a-socket").is_err());
        assert!(config.set(ConfigKey::Device, "   ").is_err());
        assert!(config.set(ConfigKey::Capacity, "0").is_err());
        assert!(config.set(ConfigKey::Tariff, "industrial").is_err());
        assert!(config.set(ConfigKey::BackendUrl, "ftp://x").is_err());
        assert!(config.set(ConfigKey::ReconnectInitialDelayMs, "soon").is_err());
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_config_toml_roundtrip() {
        let toml_str = r#"
endpoint = "wss://telemetry.example.com/ws/devices"
device = "ESP32-A"
capacity = 30
tariff = "commercial"

[reconnect]
initial_delay_ms = 250
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.device.as_deref(), Some("ESP32-A"));
        assert_eq!(config.capacity, Some(30));
        assert_eq!(config.tariff, Some(Tariff::Commercial));
        assert_eq!(config.reconnect.initial_delay_ms, Some(250));
        assert_eq!(config.reconnect.max_delay_ms, None);
        assert!(!config.no_color);

        let serialized = toml::to_string_pretty(&config).unwrap();
        assert!(serialized.contains("tariff = \"commercial\""));
        let parsed: Config = toml::from_str(&serialized).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        assert_eq!(Config::load(&path), Config::default());

        let config = Config {
            device: Some("ESP32-CAM-1".to_string()),
            no_color: true,
            ..Default::default()
        };
        config.save(&path).unwrap();
        assert_eq!(Config::load(&path), config);
    }
}

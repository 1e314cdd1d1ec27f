//! Configure command: push settings to a registered device.
//!
//! The device's current record is taken from the presence feed, overrides from
//! the command line are applied on top, and the result is sent to the backend.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use tokio::sync::broadcast::error::RecvError;

use sensorlink_core::backend::BackendClient;
use sensorlink_core::{
    ClientOptions, DeviceConfiguration, DeviceId, DeviceRecord, TelemetryEvent,
    TelemetryStreamClient,
};

use crate::cli::OutputFormat;
use crate::format::{FormatOptions, format_configuration_text, format_devices_text};
use crate::util::{spawn_connection_log, write_output};

/// Overrides applied to the device's current configuration.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub name: Option<String>,
    pub sampling_rate: Option<u64>,
    pub resolution: Option<String>,
    pub compression: Option<bool>,
    pub ota: Option<bool>,
    pub enable: Vec<String>,
    pub disable: Vec<String>,
}

/// Arguments for the configure command.
pub struct ConfigureArgs<'a> {
    pub device: String,
    pub endpoint: String,
    pub backend_url: String,
    pub options: ClientOptions,
    pub overrides: ConfigOverrides,
    pub wait: Duration,
    pub dry_run: bool,
    pub format: OutputFormat,
    pub output: Option<&'a PathBuf>,
    pub quiet: bool,
    pub opts: &'a FormatOptions,
}

pub async fn cmd_configure(args: ConfigureArgs<'_>) -> Result<()> {
    let ConfigureArgs {
        device,
        endpoint,
        backend_url,
        options,
        overrides,
        wait,
        dry_run,
        format,
        output,
        quiet,
        opts,
    } = args;

    let target = DeviceId::new(device.as_str()).context("Invalid device id")?;
    // Validate the backend before waiting on the feed.
    let backend = BackendClient::new(&backend_url).context("Invalid backend URL")?;

    if !quiet {
        eprintln!("Looking up {} via {}...", device, endpoint);
    }
    let record = find_device(&target, &endpoint, options, wait, quiet).await?;

    let mut config = DeviceConfiguration::from_record(&record);
    apply_overrides(&mut config, &overrides)?;

    if dry_run {
        let content = match format {
            OutputFormat::Json => opts.as_json(&config)?,
            OutputFormat::Text => format_configuration_text(&record.device_id, &config, opts),
        };
        return write_output(output, &content);
    }

    let updated = backend
        .configure_device(&record.device_id, &config)
        .await
        .with_context(|| format!("Failed to configure {}", record.device_id))?;

    if !quiet {
        eprintln!("Configuration sent to {}.", updated.display_name());
    }
    let content = match format {
        OutputFormat::Json => opts.as_json(&updated)?,
        OutputFormat::Text => format_devices_text(std::slice::from_ref(&updated), opts),
    };
    write_output(output, &content)
}

/// Wait for the device to show up in the presence feed.
async fn find_device(
    target: &DeviceId,
    endpoint: &str,
    options: ClientOptions,
    wait: Duration,
    quiet: bool,
) -> Result<DeviceRecord> {
    let client = TelemetryStreamClient::new(options).context("Invalid client settings")?;
    let mut events = client.subscribe_events();
    let log = spawn_connection_log(client.subscribe_events(), quiet);

    client
        .start(target.as_str(), endpoint)
        .await
        .with_context(|| format!("Failed to connect to {}", endpoint))?;

    let lookup = |client: &TelemetryStreamClient| {
        client
            .devices()
            .into_iter()
            .find(|d| target.matches(&d.device_id))
    };

    let deadline = tokio::time::sleep(wait);
    tokio::pin!(deadline);

    let found = loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break Err(anyhow::anyhow!("Interrupted")),
            _ = &mut deadline => break Ok(None),
            event = events.recv() => match event {
                Ok(TelemetryEvent::DeviceRegistered { .. } | TelemetryEvent::DevicesListed { .. })
                | Err(RecvError::Lagged(_)) => {
                    if let Some(record) = lookup(&client) {
                        break Ok(Some(record));
                    }
                }
                Err(RecvError::Closed) => break Ok(lookup(&client)),
                Ok(_) => {}
            },
        }
    };

    client.stop().await;
    log.abort();

    match found? {
        Some(record) => Ok(record),
        None => bail!(
            "Device '{}' did not register within {}s.\n\
             Make sure it is powered on and connected, or run 'sensorlink devices' to list registered devices.",
            target,
            wait.as_secs()
        ),
    }
}

/// Apply command-line overrides to a configuration.
pub fn apply_overrides(config: &mut DeviceConfiguration, overrides: &ConfigOverrides) -> Result<()> {
    if let Some(name) = &overrides.name {
        config.device_name = name.clone();
    }
    if let Some(rate) = overrides.sampling_rate {
        config.sampling_rate = rate;
    }
    if let Some(resolution) = &overrides.resolution {
        config.camera_resolution = resolution.clone();
    }
    if let Some(compression) = overrides.compression {
        config.compression_enabled = compression;
    }
    if let Some(ota) = overrides.ota {
        config.ota_enabled = ota;
    }

    let toggles = overrides
        .enable
        .iter()
        .map(|id| (id, true))
        .chain(overrides.disable.iter().map(|id| (id, false)));
    for (id, enabled) in toggles {
        if !config.set_capability_enabled(id, enabled) {
            let available: Vec<&str> = config
                .capabilities
                .iter()
                .filter(|c| c.configurable)
                .map(|c| c.id.as_str())
                .collect();
            if available.is_empty() {
                bail!("Unknown capability '{}': the device has no configurable capabilities", id);
            }
            bail!(
                "Unknown capability '{}'. Configurable capabilities: {}",
                id,
                available.join(", ")
            );
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sensorlink_types::Capability;

    fn record() -> DeviceRecord {
        let caps = r#"[
            {"id": "camera", "configurable": true, "enabled": false},
            {"id": "dht22", "configurable": true},
            {"id": "status_led", "configurable": false}
        ]"#;
        let mut record = DeviceRecord::new("ESP32-CAM-1");
        record.name = Some("Dock camera".to_string());
        record.capabilities = serde_json::from_str::<Vec<Capability>>(caps).unwrap();
        record
    }

    #[test]
    fn test_apply_overrides() {
        let mut config = DeviceConfiguration::from_record(&record());
        let overrides = ConfigOverrides {
            name: Some("Gate camera".to_string()),
            sampling_rate: Some(250),
            resolution: Some("1280x720".to_string()),
            ota: Some(false),
            disable: vec!["dht22".to_string()],
            ..Default::default()
        };

        apply_overrides(&mut config, &overrides).unwrap();

        assert_eq!(config.device_name, "Gate camera");
        assert_eq!(config.sampling_rate, 250);
        assert_eq!(config.camera_resolution, "1280x720");
        assert!(config.compression_enabled);
        assert!(!config.ota_enabled);

        let enabled = |id: &str| {
            config
                .capabilities
                .iter()
                .find(|c| c.id == id)
                .and_then(|c| c.enabled)
        };
        assert_eq!(enabled("camera"), Some(true));
        assert_eq!(enabled("dht22"), Some(false));
        assert_eq!(enabled("status_led"), None);
    }

    #[test]
    fn test_apply_overrides_rejects_unknown_capability() {
        let mut config = DeviceConfiguration::from_record(&record());
        let overrides = ConfigOverrides {
            enable: vec!["status_led".to_string()],
            ..Default::default()
        };
        let err = apply_overrides(&mut config, &overrides).unwrap_err();
        assert!(err.to_string().contains("camera, dht22"));
    }

    #[test]
    fn test_apply_no_overrides_keeps_defaults() {
        let mut config = DeviceConfiguration::from_record(&DeviceRecord::new("ESP32-A"));
        let before = config.clone();
        apply_overrides(&mut config, &ConfigOverrides::default()).unwrap();
        assert_eq!(config, before);
    }
}

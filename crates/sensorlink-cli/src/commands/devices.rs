//! Devices command: list devices known to the backend.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::broadcast::error::RecvError;

use sensorlink_core::{ClientOptions, TelemetryEvent, TelemetryStreamClient};

use crate::cli::OutputFormat;
use crate::format::{FormatOptions, format_devices_json, format_devices_text, format_presence_event};
use crate::util::{OutputSink, spawn_connection_log};

/// Device id followed when listening only for presence messages.
///
/// Presence messages are not filtered by device, so any id works; this one is
/// never reported by a board.
pub const PRESENCE_LISTENER_ID: &str = "sensorlink-cli";

/// Arguments for the devices command.
pub struct DevicesArgs<'a> {
    pub endpoint: String,
    pub options: ClientOptions,
    pub wait: Duration,
    pub follow: bool,
    pub format: OutputFormat,
    pub output: Option<&'a PathBuf>,
    pub quiet: bool,
    pub opts: &'a FormatOptions,
}

pub async fn cmd_devices(args: DevicesArgs<'_>) -> Result<()> {
    let DevicesArgs {
        endpoint,
        options,
        wait,
        follow,
        format,
        output,
        quiet,
        opts,
    } = args;

    let client = TelemetryStreamClient::new(options).context("Invalid client settings")?;
    let mut events = client.subscribe_events();
    let log = spawn_connection_log(client.subscribe_events(), quiet);

    client
        .start(PRESENCE_LISTENER_ID, &endpoint)
        .await
        .with_context(|| format!("Failed to connect to {}", endpoint))?;

    let mut sink = OutputSink::open(output.map(PathBuf::as_path))?;
    let deadline = tokio::time::sleep(wait);
    tokio::pin!(deadline);
    let mut listed = false;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                if !quiet {
                    eprintln!("\nShutting down...");
                }
                break;
            }
            _ = &mut deadline, if !listed => {
                if !quiet {
                    eprintln!("No device list received within {}s.", wait.as_secs());
                }
                // Print whatever registrations arrived in the meantime.
                write_devices(&client, format, opts, &mut sink)?;
                listed = true;
                if !follow {
                    break;
                }
            }
            event = events.recv() => {
                let event = match event {
                    Ok(event) => event,
                    Err(RecvError::Lagged(n)) => {
                        tracing::warn!("Missed {} presence events", n);
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                };

                match event {
                    TelemetryEvent::DevicesListed { .. } if !listed => {
                        write_devices(&client, format, opts, &mut sink)?;
                        listed = true;
                        if !follow {
                            break;
                        }
                    }
                    TelemetryEvent::DeviceRegistered { .. }
                    | TelemetryEvent::DeviceDisconnected { .. }
                    | TelemetryEvent::DevicesListed { .. }
                        if follow && listed =>
                    {
                        let line = match format {
                            OutputFormat::Json => Some(opts.as_json(&event)?),
                            OutputFormat::Text => format_presence_event(&event, opts),
                        };
                        if let Some(line) = line {
                            sink.write(&line)?;
                        }
                    }
                    _ => {}
                }
            }
        }
    }

    client.stop().await;
    log.abort();
    Ok(())
}

fn write_devices(
    client: &TelemetryStreamClient,
    format: OutputFormat,
    opts: &FormatOptions,
    sink: &mut OutputSink,
) -> Result<()> {
    let devices = client.devices();
    let content = match format {
        OutputFormat::Json => format_devices_json(&devices, opts)?,
        OutputFormat::Text => format_devices_text(&devices, opts),
    };
    sink.write(&content)
}

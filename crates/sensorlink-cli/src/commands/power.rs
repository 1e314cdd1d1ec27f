//! Power command: PZEM-004T readings with a running electricity bill.

use std::path::PathBuf;

use anyhow::{Context, Result};
use owo_colors::OwoColorize;

use sensorlink_core::{
    ClientOptions, EnergyBill, GaugeLimits, PowerReading, Tariff, TelemetryStreamClient,
    is_pzem_channel,
};

use crate::cli::OutputFormat;
use crate::commands::watch::{fresh_samples, subscribe_snapshots};
use crate::format::{FormatOptions, format_power_json, format_power_text};
use crate::util::{OutputSink, spawn_connection_log};

/// Arguments for the power command.
pub struct PowerArgs<'a> {
    pub device: String,
    pub endpoint: String,
    pub options: ClientOptions,
    pub tariff: Tariff,
    pub count: u32,
    pub format: OutputFormat,
    pub output: Option<&'a PathBuf>,
    pub quiet: bool,
    pub opts: &'a FormatOptions,
}

pub async fn cmd_power(args: PowerArgs<'_>) -> Result<()> {
    let PowerArgs {
        device,
        endpoint,
        options,
        tariff,
        count,
        format,
        output,
        quiet,
        opts,
    } = args;

    let client = TelemetryStreamClient::new(options).context("Invalid client settings")?;
    let mut updates = subscribe_snapshots(&client);
    let log = spawn_connection_log(client.subscribe_events(), quiet);

    client
        .start(&device, &endpoint)
        .await
        .with_context(|| format!("Failed to start stream for {} at {}", device, endpoint))?;

    if !quiet {
        let header = if opts.no_color {
            format!("Power meter: {} ({} tariff)", device, tariff)
        } else {
            format!("Power meter: {} ({} tariff)", device.green(), tariff)
        };
        eprintln!("{}", header);
        eprintln!("Waiting for PZEM-004T samples... Press Ctrl+C to stop");
        eprintln!("{}", "-".repeat(50));
    }

    let limits = GaugeLimits::default();
    let mut bill = EnergyBill::new(tariff);
    let mut sink = OutputSink::open(output.map(PathBuf::as_path))?;
    let mut printed: u32 = 0;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                if !quiet {
                    eprintln!("\nShutting down...");
                }
                break;
            }
            snapshot = updates.recv() => {
                let Some(snapshot) = snapshot else { break };
                let Some(reading) = fresh_samples(&snapshot, None)
                    .into_iter()
                    .find(|(id, _)| is_pzem_channel(id))
                    .map(|(_, sample)| PowerReading::from_sample(sample))
                else {
                    continue;
                };

                // Bill on the raw counter, display clamped values.
                bill.record(reading.energy_kwh);
                let shown = reading.clamped(&limits);

                let content = match format {
                    OutputFormat::Json => format_power_json(&shown, &bill, opts)?,
                    OutputFormat::Text => format_power_text(&shown, &bill, opts),
                };
                sink.write(&content)?;

                printed += 1;
                if count > 0 && printed >= count {
                    break;
                }
            }
        }
    }

    client.stop().await;
    log.abort();

    if !quiet && printed > 0 {
        eprintln!(
            "Total: {:.2} for {:.3} kWh at {} tariff.",
            bill.total(),
            bill.consumed_kwh(),
            bill.tariff()
        );
    }
    Ok(())
}

//! Watch command implementation.
//!
//! Streams samples from one device. Reconnects are handled by the client; this
//! command only prints what each heartbeat added.

use std::path::PathBuf;

use anyhow::{Context, Result};
use owo_colors::OwoColorize;
use tokio::sync::mpsc;

use sensorlink_core::{ClientOptions, Sample, TelemetrySnapshot, TelemetryStreamClient};

use crate::cli::OutputFormat;
use crate::format::{FormatOptions, format_sample_line, format_update_json};
use crate::util::{OutputSink, spawn_connection_log};

/// Arguments for the watch command.
pub struct WatchArgs<'a> {
    pub device: String,
    pub endpoint: String,
    pub options: ClientOptions,
    pub channel: Option<String>,
    pub count: u32,
    pub format: OutputFormat,
    pub output: Option<&'a PathBuf>,
    pub quiet: bool,
    pub opts: &'a FormatOptions,
}

pub async fn cmd_watch(args: WatchArgs<'_>) -> Result<()> {
    let WatchArgs {
        device,
        endpoint,
        options,
        channel,
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
            format!("Watching: {} via {}", device, endpoint)
        } else {
            format!("Watching: {} via {}", device.green(), endpoint.cyan())
        };
        eprintln!("{}", header);
        match (&channel, count) {
            (Some(ch), 0) => eprintln!("Channel: {} | Press Ctrl+C to stop", ch),
            (Some(ch), n) => eprintln!("Channel: {} | Count: {} | Press Ctrl+C to stop", ch, n),
            (None, 0) => eprintln!("Press Ctrl+C to stop"),
            (None, n) => eprintln!("Count: {} | Press Ctrl+C to stop", n),
        }
        eprintln!("{}", "-".repeat(50));
    }

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
                let fresh = fresh_samples(&snapshot, channel.as_deref());
                if fresh.is_empty() {
                    continue;
                }

                let content = match format {
                    OutputFormat::Json => format_update_json(&snapshot.device_id, &fresh, opts)?,
                    OutputFormat::Text => fresh
                        .iter()
                        .map(|(id, sample)| format_sample_line(id, sample, opts))
                        .collect(),
                };
                sink.write(&content)?;

                printed += 1;
                if count > 0 && printed >= count {
                    if !quiet {
                        eprintln!("Completed {} updates.", printed);
                    }
                    break;
                }
            }
        }
    }

    client.stop().await;
    log.abort();
    Ok(())
}

/// Forward every update into a channel so it can be awaited.
pub(crate) fn subscribe_snapshots(
    client: &TelemetryStreamClient,
) -> mpsc::UnboundedReceiver<TelemetrySnapshot> {
    let (tx, rx) = mpsc::unbounded_channel();
    // The subscription lives as long as the client.
    let _subscription = client.on_update(move |snapshot| {
        let _ = tx.send(snapshot.clone());
    });
    rx
}

/// Samples added by the heartbeat that produced this snapshot.
///
/// Every sample of one heartbeat shares its receipt time, so the newest
/// timestamp across all channels identifies them.
pub(crate) fn fresh_samples<'a>(
    snapshot: &'a TelemetrySnapshot,
    channel: Option<&str>,
) -> Vec<(&'a str, &'a Sample)> {
    let Some(newest) = snapshot
        .channels
        .values()
        .filter_map(|samples| samples.last())
        .map(|s| s.timestamp)
        .max()
    else {
        return Vec::new();
    };

    snapshot
        .channels
        .iter()
        .filter(|(id, _)| channel.is_none_or(|c| id.eq_ignore_ascii_case(c)))
        .filter_map(|(id, samples)| samples.last().map(|s| (id.as_str(), s)))
        .filter(|(_, s)| s.timestamp == newest)
        .collect()
}

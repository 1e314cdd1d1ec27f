//! Output formatting utilities for text and JSON output.

use std::collections::BTreeMap;

use anyhow::Result;
use owo_colors::OwoColorize;
use serde::Serialize;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use sensorlink_core::{
    ConnectionStatus, DeviceConfiguration, DeviceRecord, DisconnectReason, EnergyBill,
    PowerReading, Sample, TelemetryEvent, Tariff,
};

/// Formatting options for output.
#[derive(Debug, Clone, Copy, Default)]
pub struct FormatOptions {
    /// Disable colored output.
    pub no_color: bool,
    /// Use compact JSON output (no pretty-printing).
    pub compact: bool,
}

impl FormatOptions {
    pub fn new(no_color: bool) -> Self {
        Self {
            no_color,
            compact: false,
        }
    }

    /// Create with compact JSON option.
    pub fn with_compact(mut self, compact: bool) -> Self {
        self.compact = compact;
        self
    }

    /// Serialize value to JSON string, respecting compact option.
    pub fn as_json<T: Serialize>(&self, value: &T) -> Result<String> {
        let json = if self.compact {
            serde_json::to_string(value)?
        } else {
            serde_json::to_string_pretty(value)?
        };
        Ok(json + "\n")
    }
}

/// RFC 3339 timestamp, or `???` if it cannot be formatted.
pub fn format_timestamp(ts: OffsetDateTime) -> String {
    ts.format(&Rfc3339).unwrap_or_else(|_| "???".to_string())
}

/// Format a field value without trailing zeros.
pub fn format_value(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        let s = format!("{:.3}", value);
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    }
}

/// Colored connection status label.
pub fn format_status(status: ConnectionStatus, no_color: bool) -> String {
    let label = format!("[{}]", status.to_string().to_uppercase());
    if no_color {
        return label;
    }
    match status {
        ConnectionStatus::Connected => label.green().to_string(),
        ConnectionStatus::Connecting => label.yellow().to_string(),
        ConnectionStatus::Disconnected => label.bright_red().to_string(),
        ConnectionStatus::Error => label.red().to_string(),
        ConnectionStatus::Idle => label.dimmed().to_string(),
    }
}

// ============================================================================
// Watch formatting
// ============================================================================

/// One text line per channel sample: `<ts>  <channel>  field=value ...`.
#[must_use]
pub fn format_sample_line(channel_id: &str, sample: &Sample, opts: &FormatOptions) -> String {
    let ts = format_timestamp(sample.timestamp);
    let fields = if sample.fields.is_empty() {
        "(no numeric fields)".to_string()
    } else {
        sample
            .fields
            .iter()
            .map(|(name, value)| format!("{}={}", name, format_value(*value)))
            .collect::<Vec<_>>()
            .join(" ")
    };

    if opts.no_color {
        format!("{}  {}  {}\n", ts, channel_id, fields)
    } else {
        format!("{}  {}  {}\n", ts.dimmed(), channel_id.cyan(), fields)
    }
}

#[derive(Serialize)]
struct UpdateJson<'a> {
    device_id: &'a str,
    channels: BTreeMap<&'a str, &'a Sample>,
}

/// One JSON document for an update: the new sample of each channel.
pub fn format_update_json(
    device_id: &str,
    samples: &[(&str, &Sample)],
    opts: &FormatOptions,
) -> Result<String> {
    let update = UpdateJson {
        device_id,
        channels: samples.iter().copied().collect(),
    };
    opts.as_json(&update)
}

// ============================================================================
// Power formatting
// ============================================================================

/// Multi-line text view of a power reading and the running bill.
#[must_use]
pub fn format_power_text(reading: &PowerReading, bill: &EnergyBill, opts: &FormatOptions) -> String {
    let header = format!("PZEM-004T  {}", format_timestamp(reading.timestamp));
    let bill_line = format!(
        "  Bill:      {:.2} ({} @ {:.1}/kWh, {:.3} kWh charged)",
        bill.total(),
        bill.tariff(),
        bill.tariff().rate_per_kwh(),
        bill.consumed_kwh()
    );

    let mut out = String::new();
    if opts.no_color {
        out.push_str(&header);
    } else {
        out.push_str(&header.bold().to_string());
    }
    out.push('\n');
    out.push_str(&format!("  Voltage:   {:.1} V\n", reading.voltage));
    out.push_str(&format!("  Current:   {:.2} A\n", reading.current));
    out.push_str(&format!("  Power:     {:.1} W\n", reading.power));
    out.push_str(&format!("  Energy:    {:.3} kWh\n", reading.energy_kwh));
    out.push_str(&format!("  Frequency: {:.1} Hz\n", reading.frequency));
    if opts.no_color {
        out.push_str(&bill_line);
    } else {
        out.push_str(&bill_line.green().to_string());
    }
    out.push('\n');
    out
}

#[derive(Serialize)]
struct PowerJson<'a> {
    reading: &'a PowerReading,
    tariff: Tariff,
    rate_per_kwh: f64,
    consumed_kwh: f64,
    bill_total: f64,
}

/// JSON view of a power reading and the running bill.
pub fn format_power_json(
    reading: &PowerReading,
    bill: &EnergyBill,
    opts: &FormatOptions,
) -> Result<String> {
    opts.as_json(&PowerJson {
        reading,
        tariff: bill.tariff(),
        rate_per_kwh: bill.tariff().rate_per_kwh(),
        consumed_kwh: bill.consumed_kwh(),
        bill_total: bill.total(),
    })
}

// ============================================================================
// Device formatting
// ============================================================================

fn capability_summary(record: &DeviceRecord) -> String {
    if record.capabilities.is_empty() {
        return "-".to_string();
    }
    record
        .capabilities
        .iter()
        .map(|cap| match cap.enabled {
            Some(false) => format!("{} (off)", cap.id),
            _ => cap.id.clone(),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Table of registered devices.
#[must_use]
pub fn format_devices_text(devices: &[DeviceRecord], opts: &FormatOptions) -> String {
    if devices.is_empty() {
        return "No devices registered.\n".to_string();
    }

    let id_width = devices
        .iter()
        .map(|d| d.device_id.len())
        .max()
        .unwrap_or(0)
        .max("DEVICE".len());
    let name_width = devices
        .iter()
        .map(|d| d.name.as_deref().unwrap_or("-").len())
        .max()
        .unwrap_or(0)
        .max("NAME".len());

    let mut out = String::new();
    let header = format!(
        "{:<id_width$}  {:<name_width$}  CAPABILITIES",
        "DEVICE", "NAME"
    );
    if opts.no_color {
        out.push_str(&header);
    } else {
        out.push_str(&header.bold().to_string());
    }
    out.push('\n');

    for device in devices {
        let id = format!("{:<id_width$}", device.device_id);
        let name = format!("{:<name_width$}", device.name.as_deref().unwrap_or("-"));
        let caps = capability_summary(device);
        if opts.no_color {
            out.push_str(&format!("{}  {}  {}\n", id, name, caps));
        } else {
            out.push_str(&format!("{}  {}  {}\n", id.cyan(), name, caps));
        }
    }
    out
}

/// JSON array of registered devices.
pub fn format_devices_json(devices: &[DeviceRecord], opts: &FormatOptions) -> Result<String> {
    opts.as_json(&devices)
}

/// One line describing a presence event, or `None` for other events.
pub fn format_presence_event(event: &TelemetryEvent, opts: &FormatOptions) -> Option<String> {
    let (tag, detail) = match event {
        TelemetryEvent::DeviceRegistered { device } => (
            "+",
            format!("{} ({})", device.device_id, device.display_name()),
        ),
        TelemetryEvent::DeviceDisconnected { device_id } => ("-", device_id.clone()),
        TelemetryEvent::DevicesListed { count } => ("=", format!("{} device(s)", count)),
        _ => return None,
    };

    let ts = format_timestamp(OffsetDateTime::now_utc());
    Some(if opts.no_color {
        format!("{}  {} {}\n", ts, tag, detail)
    } else {
        let tag = match tag {
            "+" => tag.green().to_string(),
            "-" => tag.red().to_string(),
            _ => tag.cyan().to_string(),
        };
        format!("{}  {} {}\n", ts.dimmed(), tag, detail)
    })
}

/// Human-readable line for connection lifecycle events, used on stderr.
pub fn format_connection_event(event: &TelemetryEvent) -> Option<String> {
    match event {
        TelemetryEvent::Connecting { endpoint, attempt } if *attempt > 0 => {
            Some(format!("Reconnecting to {} (attempt {})...", endpoint, attempt))
        }
        TelemetryEvent::Connected { endpoint } => Some(format!("Connected to {}", endpoint)),
        TelemetryEvent::Disconnected { reason } => match reason {
            DisconnectReason::ClosedByServer => Some("Connection closed by server.".to_string()),
            DisconnectReason::ConnectFailed(e) => Some(format!("Connection failed: {}", e)),
            DisconnectReason::TransportError(e) => Some(format!("Connection lost: {}", e)),
            _ => None,
        },
        TelemetryEvent::ReconnectScheduled { delay_ms, .. } => {
            Some(format!("Retrying in {:.1}s...", *delay_ms as f64 / 1000.0))
        }
        TelemetryEvent::ReconnectExhausted { attempts } => Some(format!(
            "Giving up after {} failed attempt(s).",
            attempts
        )),
        _ => None,
    }
}

// ============================================================================
// Configure formatting
// ============================================================================

/// Text summary of a configuration before it is sent.
#[must_use]
pub fn format_configuration_text(
    device_id: &str,
    config: &DeviceConfiguration,
    opts: &FormatOptions,
) -> String {
    let mut out = String::new();
    let header = format!("Configuration for {}", device_id);
    if opts.no_color {
        out.push_str(&header);
    } else {
        out.push_str(&header.bold().to_string());
    }
    out.push('\n');

    let on_off = |b: bool| if b { "on" } else { "off" };
    let name = if config.device_name.is_empty() {
        "-"
    } else {
        config.device_name.as_str()
    };
    out.push_str(&format!("  Name:          {}\n", name));
    out.push_str(&format!("  Sampling rate: {} ms\n", config.sampling_rate));
    out.push_str(&format!("  Resolution:    {}\n", config.camera_resolution));
    out.push_str(&format!("  Compression:   {}\n", on_off(config.compression_enabled)));
    out.push_str(&format!("  OTA updates:   {}\n", on_off(config.ota_enabled)));
    for cap in config.capabilities.iter().filter(|c| c.configurable) {
        out.push_str(&format!(
            "  Capability:    {} = {}\n",
            cap.id,
            on_off(cap.enabled.unwrap_or(false))
        ));
    }
    out
}

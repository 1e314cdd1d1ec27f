//! PZEM-004T power meter helpers.
//!
//! The PZEM-004T reports mains voltage, current, active power, an energy
//! counter in watt-hours and line frequency. This module turns its samples into
//! [`PowerReading`]s, clamps them for gauge display and accumulates a running
//! electricity bill.

use core::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use sensorlink_types::Sample;

use crate::channel::TelemetrySnapshot;

/// Substring identifying a PZEM-004T channel id.
pub const PZEM_SENSOR_TAG: &str = "pzem004t";

/// Whether a channel id belongs to a PZEM-004T meter (case-insensitive).
pub fn is_pzem_channel(channel_id: &str) -> bool {
    channel_id.to_lowercase().contains(PZEM_SENSOR_TAG)
}

/// One electrical reading.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PowerReading {
    /// When the sample was received.
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    /// RMS voltage (V).
    pub voltage: f64,
    /// RMS current (A).
    pub current: f64,
    /// Active power (W).
    pub power: f64,
    /// Energy counter (kWh).
    pub energy_kwh: f64,
    /// Line frequency (Hz).
    pub frequency: f64,
}

impl PowerReading {
    /// Build a reading from a PZEM sample. Missing fields read as 0.
    pub fn from_sample(sample: &Sample) -> Self {
        let field = |name: &str| sample.get(name).unwrap_or(0.0);
        Self {
            timestamp: sample.timestamp,
            voltage: field("voltage_v"),
            current: field("current_a"),
            power: field("power_w"),
            energy_kwh: field("energy_wh") / 1000.0,
            frequency: field("frequency_hz"),
        }
    }

    /// Clamp every value into the gauge range.
    #[must_use]
    pub fn clamped(&self, limits: &GaugeLimits) -> Self {
        Self {
            timestamp: self.timestamp,
            voltage: clamp(self.voltage, limits.voltage),
            current: clamp(self.current, limits.current),
            power: clamp(self.power, limits.power),
            energy_kwh: clamp(self.energy_kwh, limits.energy_kwh),
            frequency: clamp(self.frequency, limits.frequency),
        }
    }
}

/// Full-scale values of the power gauges.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GaugeLimits {
    /// Volts.
    pub voltage: f64,
    /// Amps.
    pub current: f64,
    /// Watts.
    pub power: f64,
    /// Kilowatt-hours.
    pub energy_kwh: f64,
    /// Hertz.
    pub frequency: f64,
}

impl Default for GaugeLimits {
    fn default() -> Self {
        Self {
            voltage: 300.0,
            current: 100.0,
            power: 25_000.0,
            energy_kwh: 10_000.0,
            frequency: 65.0,
        }
    }
}

/// Clamp into `[0, max]`. Non-finite values become 0.
pub fn clamp(value: f64, max: f64) -> f64 {
    if !value.is_finite() {
        return 0.0;
    }
    value.clamp(0.0, max.max(0.0))
}

/// Electricity tariff.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tariff {
    /// 5.0 per kWh.
    #[default]
    Residential,
    /// 10.0 per kWh.
    Commercial,
}

impl Tariff {
    /// Price per kilowatt-hour.
    pub fn rate_per_kwh(self) -> f64 {
        match self {
            Tariff::Residential => 5.0,
            Tariff::Commercial => 10.0,
        }
    }
}

impl fmt::Display for Tariff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tariff::Residential => write!(f, "residential"),
            Tariff::Commercial => write!(f, "commercial"),
        }
    }
}

impl FromStr for Tariff {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "residential" => Ok(Tariff::Residential),
            "commercial" => Ok(Tariff::Commercial),
            other => Err(format!(
                "unknown tariff '{}', expected residential or commercial",
                other
            )),
        }
    }
}

/// Running bill computed from successive energy counter readings.
///
/// Only increases are charged. The first reading sets the baseline and a
/// decrease (meter reset or rollover) re-baselines without charging.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnergyBill {
    tariff: Tariff,
    last_energy_kwh: Option<f64>,
    consumed_kwh: f64,
    total: f64,
}

impl EnergyBill {
    /// Start an empty bill.
    pub fn new(tariff: Tariff) -> Self {
        Self {
            tariff,
            ..Default::default()
        }
    }

    /// Feed the latest energy counter value. Returns the amount charged.
    pub fn record(&mut self, energy_kwh: f64) -> f64 {
        if !energy_kwh.is_finite() {
            return 0.0;
        }

        let charge = match self.last_energy_kwh {
            Some(last) if energy_kwh > last => {
                let delta = energy_kwh - last;
                self.consumed_kwh += delta;
                delta * self.tariff.rate_per_kwh()
            }
            _ => 0.0,
        };
        self.last_energy_kwh = Some(energy_kwh);
        self.total += charge;
        charge
    }

    /// Switch tariff. Past charges are kept.
    pub fn set_tariff(&mut self, tariff: Tariff) {
        self.tariff = tariff;
    }

    /// Current tariff.
    pub fn tariff(&self) -> Tariff {
        self.tariff
    }

    /// Total charged so far.
    pub fn total(&self) -> f64 {
        self.total
    }

    /// Energy charged so far (kWh).
    pub fn consumed_kwh(&self) -> f64 {
        self.consumed_kwh
    }
}

/// Latest reading of the first PZEM channel in a snapshot.
pub fn latest_power(snapshot: &TelemetrySnapshot) -> Option<PowerReading> {
    snapshot
        .channels
        .iter()
        .find(|(id, _)| is_pzem_channel(id))
        .and_then(|(_, samples)| samples.last())
        .map(PowerReading::from_sample)
}

/// Every reading of the first PZEM channel in a snapshot, oldest first.
pub fn power_history(snapshot: &TelemetrySnapshot) -> Vec<PowerReading> {
    snapshot
        .channels
        .iter()
        .find(|(id, _)| is_pzem_channel(id))
        .map(|(_, samples)| samples.iter().map(PowerReading::from_sample).collect())
        .unwrap_or_default()
}

//! CLI argument definitions using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use sensorlink_core::Tariff;

/// Output format for commands
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Reusable stream connection arguments
#[derive(Debug, Clone, Args)]
pub struct StreamArgs {
    /// Device id to follow, or use SENSORLINK_DEVICE env var
    #[arg(short, long, env = "SENSORLINK_DEVICE")]
    pub device: Option<String>,

    /// Telemetry WebSocket endpoint (ws:// or wss://), or use SENSORLINK_ENDPOINT env var
    #[arg(short, long, env = "SENSORLINK_ENDPOINT")]
    pub endpoint: Option<String>,

    /// Samples kept per sensor channel
    #[arg(long, value_parser = parse_capacity)]
    pub capacity: Option<usize>,
}

#[derive(Parser)]
#[command(name = "sensorlink")]
#[command(author, version, about = "CLI for SensorLink warehouse telemetry", long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Output as JSON (shorthand for --format json)
    #[arg(long, global = true)]
    pub json: bool,

    /// Output compact JSON (no pretty-printing)
    #[arg(long, global = true)]
    pub compact: bool,

    /// Disable colored output
    #[arg(
        long,
        global = true,
        env = "NO_COLOR",
        value_parser = clap::builder::FalseyValueParser::new()
    )]
    pub no_color: bool,

    /// Use this configuration file instead of the default location
    #[arg(long, global = true, env = "SENSORLINK_CONFIG")]
    pub config: Option<PathBuf>,

    /// Write output to file instead of stdout
    #[arg(short, long, global = true)]
    pub output: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Stream live samples from a device
    Watch {
        #[command(flatten)]
        stream: StreamArgs,

        /// Only print this sensor channel
        #[arg(short, long)]
        channel: Option<String>,

        /// Stop after this many updates (0 = until Ctrl+C)
        #[arg(short = 'n', long, default_value = "0")]
        count: u32,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Show PZEM-004T power readings and a running electricity bill
    Power {
        #[command(flatten)]
        stream: StreamArgs,

        /// Tariff used for billing (residential, commercial)
        #[arg(short, long)]
        tariff: Option<Tariff>,

        /// Stop after this many readings (0 = until Ctrl+C)
        #[arg(short = 'n', long, default_value = "0")]
        count: u32,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// List devices registered with the backend
    Devices {
        /// Telemetry WebSocket endpoint, or use SENSORLINK_ENDPOINT env var
        #[arg(short, long, env = "SENSORLINK_ENDPOINT")]
        endpoint: Option<String>,

        /// Seconds to wait for the device list
        #[arg(short, long, default_value = "5")]
        wait: u64,

        /// Keep printing registrations and disconnects until Ctrl+C
        #[arg(long)]
        follow: bool,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Push a configuration to a registered device
    Configure(ConfigureArgs),

    /// Manage CLI configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Arguments for `configure`.
#[derive(Debug, Clone, Args)]
pub struct ConfigureArgs {
    #[command(flatten)]
    pub stream: StreamArgs,

    /// Backend HTTP base URL, or use SENSORLINK_BACKEND_URL env var
    #[arg(short, long, env = "SENSORLINK_BACKEND_URL")]
    pub backend_url: Option<String>,

    /// New friendly name
    #[arg(long)]
    pub name: Option<String>,

    /// Sampling period in milliseconds
    #[arg(long, value_parser = parse_sampling_rate)]
    pub sampling_rate: Option<u64>,

    /// Camera resolution (WIDTHxHEIGHT)
    #[arg(long, value_parser = parse_resolution)]
    pub resolution: Option<String>,

    /// Enable or disable frame compression (on/off)
    #[arg(long, value_parser = parse_bool_arg)]
    pub compression: Option<bool>,

    /// Enable or disable over-the-air updates (on/off)
    #[arg(long, value_parser = parse_bool_arg)]
    pub ota: Option<bool>,

    /// Enable a configurable capability (repeatable)
    #[arg(long, value_name = "CAPABILITY")]
    pub enable: Vec<String>,

    /// Disable a configurable capability (repeatable)
    #[arg(long, value_name = "CAPABILITY")]
    pub disable: Vec<String>,

    /// Seconds to wait for the device to show up
    #[arg(short, long, default_value = "5")]
    pub wait: u64,

    /// Print the configuration without sending it
    #[arg(long)]
    pub dry_run: bool,
}

/// Configuration keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ConfigKey {
    /// Default telemetry WebSocket endpoint
    Endpoint,
    /// Default device id
    Device,
    /// Backend HTTP base URL
    BackendUrl,
    /// Samples kept per sensor channel
    Capacity,
    /// Billing tariff
    Tariff,
    /// Disable colored output
    NoColor,
    /// First reconnect delay in milliseconds
    ReconnectInitialDelayMs,
    /// Longest reconnect delay in milliseconds
    ReconnectMaxDelayMs,
}

/// Configuration subcommands
#[derive(Subcommand)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Get a configuration value
    Get {
        /// Configuration key
        #[arg(value_enum)]
        key: ConfigKey,
    },

    /// Set a configuration value
    Set {
        /// Configuration key
        #[arg(value_enum)]
        key: ConfigKey,
        /// Configuration value
        value: String,
    },

    /// Unset (remove) a configuration value
    Unset {
        /// Configuration key to remove
        #[arg(value_enum)]
        key: ConfigKey,
    },

    /// Show configuration file path
    Path,

    /// Initialize default configuration
    Init,
}

fn parse_capacity(s: &str) -> Result<usize, String> {
    let capacity: usize = s
        .parse()
        .map_err(|_| format!("'{}' is not a valid number", s))?;
    if capacity == 0 {
        return Err("capacity must be at least 1".to_string());
    }
    Ok(capacity)
}

fn parse_sampling_rate(s: &str) -> Result<u64, String> {
    let ms: u64 = s
        .parse()
        .map_err(|_| format!("'{}' is not a valid number", s))?;
    if ms == 0 {
        return Err("sampling rate must be at least 1 ms".to_string());
    }
    Ok(ms)
}

/// Parse a `WIDTHxHEIGHT` resolution.
pub fn parse_resolution(s: &str) -> Result<String, String> {
    let invalid = || format!("Invalid resolution '{}'. Expected WIDTHxHEIGHT, e.g. 640x480", s);
    let (w, h) = s.trim().split_once(['x', 'X']).ok_or_else(invalid)?;
    let w: u32 = w.parse().map_err(|_| invalid())?;
    let h: u32 = h.parse().map_err(|_| invalid())?;
    if w == 0 || h == 0 {
        return Err(invalid());
    }
    Ok(format!("{}x{}", w, h))
}

/// Parse boolean argument with flexible input
pub fn parse_bool_arg(s: &str) -> Result<bool, String> {
    match s.to_lowercase().as_str() {
        "true" | "yes" | "on" | "1" | "enable" | "enabled" => Ok(true),
        "false" | "no" | "off" | "0" | "disable" | "disabled" => Ok(false),
        _ => Err(format!(
            "Invalid boolean value '{}'. Use: true/false, yes/no, on/off, 1/0",
            s
        )),
    }
}

//! SensorLink CLI entry point.

use std::io;
use std::time::Duration;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;
mod config;
mod format;
mod util;

use cli::{Cli, Commands, OutputFormat};
use commands::{
    ConfigOverrides, ConfigureArgs, DevicesArgs, PowerArgs, WatchArgs, cmd_config, cmd_configure,
    cmd_devices, cmd_power, cmd_watch,
};
use config::{
    Config, client_options, resolve_backend_url, resolve_device, resolve_endpoint, resolve_tariff,
};
use format::FormatOptions;
use util::require_device;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Handle completions command early (before tracing init)
    if let Commands::Completions { shell } = cli.command {
        let mut cmd = Cli::command();
        clap_complete::generate(shell, &mut cmd, "sensorlink", &mut io::stdout());
        return Ok(());
    }

    // When quiet mode is enabled, suppress info-level logging
    let filter = if cli.quiet {
        EnvFilter::new("warn")
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    let config_path = Config::path(cli.config.as_deref());
    let config = Config::load(&config_path);
    tracing::debug!("Using config file {}", config_path.display());

    let opts = FormatOptions::new(cli.no_color || config.no_color).with_compact(cli.compact);
    let output = cli.output.as_ref();
    let quiet = cli.quiet;
    let resolve_format = |format: OutputFormat| {
        if cli.json {
            OutputFormat::Json
        } else {
            format
        }
    };

    match cli.command {
        Commands::Watch {
            stream,
            channel,
            count,
            format,
        } => {
            let device = require_device(resolve_device(stream.device, &config))?;
            cmd_watch(WatchArgs {
                device,
                endpoint: resolve_endpoint(stream.endpoint, &config),
                options: client_options(stream.capacity, &config)?,
                channel,
                count,
                format: resolve_format(format),
                output,
                quiet,
                opts: &opts,
            })
            .await?;
        }
        Commands::Power {
            stream,
            tariff,
            count,
            format,
        } => {
            let device = require_device(resolve_device(stream.device, &config))?;
            cmd_power(PowerArgs {
                device,
                endpoint: resolve_endpoint(stream.endpoint, &config),
                options: client_options(stream.capacity, &config)?,
                tariff: resolve_tariff(tariff, &config),
                count,
                format: resolve_format(format),
                output,
                quiet,
                opts: &opts,
            })
            .await?;
        }
        Commands::Devices {
            endpoint,
            wait,
            follow,
            format,
        } => {
            cmd_devices(DevicesArgs {
                endpoint: resolve_endpoint(endpoint, &config),
                options: client_options(None, &config)?,
                wait: Duration::from_secs(wait),
                follow,
                format: resolve_format(format),
                output,
                quiet,
                opts: &opts,
            })
            .await?;
        }
        Commands::Configure(args) => {
            let device = require_device(resolve_device(args.stream.device, &config))?;
            cmd_configure(ConfigureArgs {
                device,
                endpoint: resolve_endpoint(args.stream.endpoint, &config),
                backend_url: resolve_backend_url(args.backend_url, &config),
                options: client_options(args.stream.capacity, &config)?,
                overrides: ConfigOverrides {
                    name: args.name,
                    sampling_rate: args.sampling_rate,
                    resolution: args.resolution,
                    compression: args.compression,
                    ota: args.ota,
                    enable: args.enable,
                    disable: args.disable,
                },
                wait: Duration::from_secs(args.wait),
                dry_run: args.dry_run,
                format: if cli.json {
                    OutputFormat::Json
                } else {
                    OutputFormat::Text
                },
                output,
                quiet,
                opts: &opts,
            })
            .await?;
        }
        Commands::Config { action } => {
            cmd_config(action, &config_path, cli.json, quiet, &opts)?;
        }
        Commands::Completions { .. } => {
            // Already handled above
            unreachable!()
        }
    }

    Ok(())
}

//! Command implementations for the CLI.

mod config;
mod configure;
mod devices;
mod power;
mod watch;

pub use config::cmd_config;
pub use configure::{ConfigOverrides, ConfigureArgs, cmd_configure};
pub use devices::{DevicesArgs, cmd_devices};
pub use power::{PowerArgs, cmd_power};
pub use watch::{WatchArgs, cmd_watch};

//! Config command implementation.

use std::path::Path;

use anyhow::{Result, bail};
use clap::ValueEnum;

use sensorlink_core::Tariff;

use crate::cli::{ConfigAction, ConfigKey};
use crate::config::{Config, DEFAULT_BACKEND_URL, DEFAULT_ENDPOINT};
use crate::format::FormatOptions;

fn key_name(key: ConfigKey) -> String {
    key.to_possible_value()
        .map(|v| v.get_name().to_string())
        .unwrap_or_else(|| format!("{:?}", key))
}

pub fn cmd_config(
    action: ConfigAction,
    path: &Path,
    json: bool,
    quiet: bool,
    opts: &FormatOptions,
) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let config = Config::load(path);
            if json {
                print!("{}", opts.as_json(&config)?);
            } else {
                if !quiet {
                    eprintln!("# {}", path.display());
                }
                let content = toml::to_string_pretty(&config)?;
                if content.trim().is_empty() {
                    println!("# (empty configuration)");
                } else {
                    print!("{}", content);
                }
            }
        }
        ConfigAction::Get { key } => {
            let config = Config::load(path);
            match config.get(key) {
                Some(value) => println!("{}", value),
                None => {
                    if !quiet {
                        eprintln!("{} is not set", key_name(key));
                    }
                }
            }
        }
        ConfigAction::Set { key, value } => {
            let mut config = Config::load(path);
            config.set(key, &value)?;
            config.save(path)?;
            if !quiet {
                let stored = config.get(key).unwrap_or(value);
                eprintln!("Set {} = {}", key_name(key), stored);
            }
        }
        ConfigAction::Unset { key } => {
            let mut config = Config::load(path);
            config.unset(key);
            config.save(path)?;
            if !quiet {
                eprintln!("Unset {}", key_name(key));
            }
        }
        ConfigAction::Path => {
            println!("{}", path.display());
        }
        ConfigAction::Init => {
            if path.exists() {
                bail!("Config file already exists: {}", path.display());
            }
            let config = Config {
                endpoint: Some(DEFAULT_ENDPOINT.to_string()),
                backend_url: Some(DEFAULT_BACKEND_URL.to_string()),
                tariff: Some(Tariff::default()),
                ..Default::default()
            };
            config.save(path)?;
            if !quiet {
                eprintln!("Created {}", path.display());
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_names_are_kebab_case() {
        assert_eq!(key_name(ConfigKey::BackendUrl), "backend-url");
        assert_eq!(
            key_name(ConfigKey::ReconnectInitialDelayMs),
            "reconnect-initial-delay-ms"
        );
    }

    #[test]
    fn test_init_set_unset() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let opts = FormatOptions::default();

        cmd_config(ConfigAction::Init, &path, false, true, &opts).unwrap();
        let config = Config::load(&path);
        assert_eq!(config.endpoint.as_deref(), Some(DEFAULT_ENDPOINT));
        assert_eq!(config.tariff, Some(Tariff::Residential));

        // A second init must not clobber the file.
        assert!(cmd_config(ConfigAction::Init, &path, false, true, &opts).is_err());

        cmd_config(
            ConfigAction::Set {
                key: ConfigKey::Device,
                value: "ESP32-A".to_string(),
            },
            &path,
            false,
            true,
            &opts,
        )
        .unwrap();
        assert_eq!(Config::load(&path).device.as_deref(), Some("ESP32-A"));

        cmd_config(
            ConfigAction::Unset {
                key: ConfigKey::Device,
            },
            &path,
            false,
            true,
            &opts,
        )
        .unwrap();
        assert_eq!(Config::load(&path).device, None);
    }

    #[test]
    fn test_set_invalid_value_leaves_file_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let result = cmd_config(
            ConfigAction::Set {
                key: ConfigKey::Capacity,
                value: "zero".to_string(),
            },
            &path,
            false,
            true,
            &FormatOptions::default(),
        );
        assert!(result.is_err());
        assert!(!path.exists());
    }
}

//! Utility functions for CLI operations.

use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

use sensorlink_core::EventReceiver;

use crate::format::format_connection_event;

/// Get device identifier, with helpful error message.
pub fn require_device(device: Option<String>) -> Result<String> {
    device.filter(|d| !d.trim().is_empty()).ok_or_else(|| {
        anyhow::anyhow!(
            "No device specified. Use --device <ID> or set SENSORLINK_DEVICE environment variable.\n\
             Run 'sensorlink devices' to list registered devices, or 'sensorlink config set device <ID>' to save a default."
        )
    })
}

/// Write content to a file or stdout, replacing the file.
pub fn write_output(output: Option<&PathBuf>, content: &str) -> Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, content)
                .with_context(|| format!("Failed to write to {}", path.display()))?;
        }
        None => {
            print!("{}", content);
            io::stdout().flush()?;
        }
    }
    Ok(())
}

/// Destination for streaming commands. A file is truncated once and then appended to.
pub struct OutputSink {
    file: Option<File>,
}

impl OutputSink {
    pub fn open(output: Option<&Path>) -> Result<Self> {
        let file = output
            .map(|path| {
                File::create(path).with_context(|| format!("Failed to create {}", path.display()))
            })
            .transpose()?;
        Ok(Self { file })
    }

    pub fn write(&mut self, content: &str) -> Result<()> {
        match &mut self.file {
            Some(file) => {
                file.write_all(content.as_bytes())?;
                file.flush()?;
            }
            None => {
                print!("{}", content);
                io::stdout().flush()?;
            }
        }
        Ok(())
    }
}

/// Report reconnects and failures on stderr until the client goes away.
pub fn spawn_connection_log(mut events: EventReceiver, quiet: bool) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => {
                    tracing::debug!(?event, "client event");
                    if !quiet && let Some(line) = format_connection_event(&event) {
                        eprintln!("{}", line);
                    }
                }
                Err(RecvError::Lagged(n)) => {
                    tracing::debug!("Connection log skipped {} events", n);
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_device_with_some() {
        assert_eq!(require_device(Some("ESP32-A".to_string())).unwrap(), "ESP32-A");
    }

    #[test]
    fn test_require_device_rejects_missing_or_blank() {
        let err = require_device(None).unwrap_err();
        assert!(err.to_string().contains("--device"));
        assert!(require_device(Some("  ".to_string())).is_err());
    }

    #[test]
    fn test_output_sink_appends_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.jsonl");
        std::fs::write(&path, "stale\n").unwrap();

        let mut sink = OutputSink::open(Some(&path)).unwrap();
        sink.write("one\n").unwrap();
        sink.write("two\n").unwrap();
        drop(sink);

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "one\ntwo\n");
    }

    #[test]
    fn test_write_output_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("devices.json");
        write_output(Some(&path), "[]\n").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "[]\n");
    }
}

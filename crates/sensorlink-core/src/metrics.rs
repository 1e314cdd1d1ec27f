//! Stream ingestion and connection counters.
//!
//! Counters are plain relaxed atomics, updated from the driver task and read
//! from anywhere through [`ClientMetrics::snapshot`].

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Thread-safe counters for one client.
#[derive(Debug, Default)]
pub struct ClientMetrics {
    frames_received: AtomicU64,
    heartbeats_accepted: AtomicU64,
    samples_recorded: AtomicU64,
    presence_messages: AtomicU64,
    messages_dropped: AtomicU64,
    connect_attempts: AtomicU64,
    connections_opened: AtomicU64,
    connection_errors: AtomicU64,
}

impl ClientMetrics {
    /// Create new zeroed metrics.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_frame(&self) {
        self.frames_received.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_heartbeat(&self, samples: usize) {
        self.heartbeats_accepted.fetch_add(1, Ordering::Relaxed);
        self.samples_recorded
            .fetch_add(samples as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_presence(&self) {
        self.presence_messages.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_dropped(&self) {
        self.messages_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_connect_attempt(&self) {
        self.connect_attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_connection_opened(&self) {
        self.connections_opened.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_connection_error(&self) {
        self.connection_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Get a snapshot of the current counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            frames_received: self.frames_received.load(Ordering::Relaxed),
            heartbeats_accepted: self.heartbeats_accepted.load(Ordering::Relaxed),
            samples_recorded: self.samples_recorded.load(Ordering::Relaxed),
            presence_messages: self.presence_messages.load(Ordering::Relaxed),
            messages_dropped: self.messages_dropped.load(Ordering::Relaxed),
            connect_attempts: self.connect_attempts.load(Ordering::Relaxed),
            connections_opened: self.connections_opened.load(Ordering::Relaxed),
            connection_errors: self.connection_errors.load(Ordering::Relaxed),
        }
    }

    /// Reset all counters to zero.
    pub fn reset(&self) {
        self.frames_received.store(0, Ordering::Relaxed);
        self.heartbeats_accepted.store(0, Ordering::Relaxed);
        self.samples_recorded.store(0, Ordering::Relaxed);
        self.presence_messages.store(0, Ordering::Relaxed);
        self.messages_dropped.store(0, Ordering::Relaxed);
        self.connect_attempts.store(0, Ordering::Relaxed);
        self.connections_opened.store(0, Ordering::Relaxed);
        self.connection_errors.store(0, Ordering::Relaxed);
    }
}

/// Point-in-time copy of [`ClientMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Text or binary frames read from the transport.
    pub frames_received: u64,
    /// Heartbeats for the configured device.
    pub heartbeats_accepted: u64,
    /// Samples appended to channels.
    pub samples_recorded: u64,
    /// Presence messages applied to the registry.
    pub presence_messages: u64,
    /// Frames that were malformed, of an unknown type, or for another device.
    pub messages_dropped: u64,
    /// Connection attempts started.
    pub connect_attempts: u64,
    /// Connections that reached the open state.
    pub connections_opened: u64,
    /// Failed connects and transport errors.
    pub connection_errors: u64,
}

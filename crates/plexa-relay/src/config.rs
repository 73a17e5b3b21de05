//! Relay configuration

use std::time::Duration;

use serde::Deserialize;

/// Default cap on a single wire frame (1 MiB)
pub const DEFAULT_MAX_FRAME_LEN: usize = 1024 * 1024;

/// Relay session and transport configuration
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Largest accepted wire frame payload
    pub max_frame_len: usize,
    /// Time allowed for hello/welcome
    pub handshake_timeout_ms: u64,
    /// Sensor status snapshot period while open
    pub stats_interval_ms: u64,
    /// Host feeds received landmark batches to its active engine
    pub interpret_remote: bool,
    /// Capacity of the transport's inbound event channel
    pub event_buffer: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        RelayConfig {
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
            handshake_timeout_ms: 5_000,
            stats_interval_ms: 1_000,
            interpret_remote: true,
            event_buffer: 64,
        }
    }
}

impl RelayConfig {
    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }

    pub fn stats_interval(&self) -> Duration {
        Duration::from_millis(self.stats_interval_ms)
    }
}

//! Node configuration
//!
//! Every section is optional in JSON; missing fields keep their defaults.
//!
//! ```json
//! {
//!   "initial_mode": "fitness",
//!   "engines": { "gesture": { "mirrored": false }, "gallery_len": 6 },
//!   "relay": { "stats_interval_ms": 2000 },
//!   "logging": { "level": "debug", "json": true }
//! }
//! ```

use std::path::Path;

use serde::Deserialize;

use plexa_core::{PlexaError, PlexaResult};
use plexa_motion::{GameConfig, GestureConfig, SquatConfig, YogaConfig};
use plexa_relay::RelayConfig;
use plexa_time::ClockConfig;

use crate::{LoggingConfig, Mode};

/// Per-engine settings
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub squat: SquatConfig,
    pub gesture: GestureConfig,
    pub yoga: YogaConfig,
    pub game: GameConfig,
    /// Items in the swipe-driven gallery; 0 disables navigation
    pub gallery_len: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            squat: SquatConfig::default(),
            gesture: GestureConfig::default(),
            yoga: YogaConfig::default(),
            game: GameConfig::default(),
            gallery_len: 4,
        }
    }
}

/// Motion node configuration
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub initial_mode: Mode,
    pub engines: EngineConfig,
    pub clock: ClockConfig,
    pub relay: RelayConfig,
    pub logging: LoggingConfig,
    /// Maximum queued outgoing relay messages
    pub max_outgoing_buffer: usize,
}

impl Default for NodeConfig {
    fn default() -> Self {
        NodeConfig {
            initial_mode: Mode::None,
            engines: EngineConfig::default(),
            clock: ClockConfig::default(),
            relay: RelayConfig::default(),
            logging: LoggingConfig::default(),
            max_outgoing_buffer: 256,
        }
    }
}

impl NodeConfig {
    pub fn from_json_str(json: &str) -> PlexaResult<Self> {
        serde_json::from_str(json).map_err(|e| PlexaError::Config(e.to_string()))
    }

    pub fn from_file(path: impl AsRef<Path>) -> PlexaResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| PlexaError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_json_str(&text)
    }
}

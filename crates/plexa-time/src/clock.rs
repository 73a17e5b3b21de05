//! Frame clock - successive timestamps to elapsed deltas

use std::time::Duration;

use serde::Deserialize;

use plexa_core::FrameTime;

/// Frame clock configuration
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ClockConfig {
    /// Largest delta a single tick may report, in milliseconds.
    /// `None` disables clamping.
    pub max_delta_ms: Option<u64>,
    /// Smoothing factor for the fps estimate (0-1, higher reacts faster)
    pub fps_smoothing: f32,
}

impl Default for ClockConfig {
    fn default() -> Self {
        ClockConfig {
            max_delta_ms: Some(500),
            fps_smoothing: 0.1,
        }
    }
}

impl ClockConfig {
    pub fn max_delta(&self) -> Option<Duration> {
        self.max_delta_ms.map(Duration::from_millis)
    }
}

/// Frame clock
/// INVARIANT: every reported delta is non-negative, and the first tick after
/// creation or reset reports zero (there is no baseline yet)
#[derive(Clone, Debug)]
pub struct FrameClock {
    /// Latest timestamp seen (the baseline for the next delta)
    last: Option<FrameTime>,
    /// Clamp for a single delta
    max_delta: Option<Duration>,
    /// Total time reported since the last reset
    elapsed: Duration,
    /// Ticks since the last reset
    ticks: u64,
}

impl FrameClock {
    /// Create a clock with the default clamp
    pub fn new() -> Self {
        Self::with_config(&ClockConfig::default())
    }

    pub fn with_config(config: &ClockConfig) -> Self {
        FrameClock {
            last: None,
            max_delta: config.max_delta(),
            elapsed: Duration::ZERO,
            ticks: 0,
        }
    }

    /// Clock without clamping
    pub fn unclamped() -> Self {
        FrameClock {
            max_delta: None,
            ..Self::new()
        }
    }

    /// Advance to `now` and return the elapsed delta
    pub fn tick(&mut self, now: FrameTime) -> Duration {
        self.ticks += 1;

        let delta = match self.last {
            None => Duration::ZERO,
            Some(prev) => now.saturating_since(prev),
        };

        // A timestamp behind the baseline reports zero and leaves the baseline alone
        if self.last.map_or(true, |prev| now >= prev) {
            self.last = Some(now);
        }

        let delta = match self.max_delta {
            Some(max) => delta.min(max),
            None => delta,
        };

        self.elapsed += delta;
        delta
    }

    /// Drop the baseline; the next tick reports zero
    pub fn reset(&mut self) {
        self.last = None;
        self.elapsed = Duration::ZERO;
        self.ticks = 0;
    }

    /// Latest timestamp seen, if any
    pub fn last(&self) -> Option<FrameTime> {
        self.last
    }

    /// Total reported time since the last reset
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}

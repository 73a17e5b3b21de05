//! Swipe gesture detection
//!
//! Tracks one landmark's horizontal position over a short window. When the
//! window is full and the oldest-to-newest displacement exceeds the
//! threshold, a swipe fires, the window clears, and a cooldown suppresses
//! every frame until its deadline passes.

use std::collections::VecDeque;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use plexa_core::{FrameTime, LandmarkFrame, LANDMARK_COUNT, RIGHT_WRIST};

/// Swipe detector configuration
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct GestureConfig {
    /// Landmark index to track
    pub tracked_landmark: usize,
    /// Samples in the window
    pub history_len: usize,
    /// Oldest-to-newest displacement (normalized width) that fires a swipe
    pub swipe_threshold: f32,
    /// Visibility at or below this clears the window
    pub min_visibility: f32,
    /// Refractory period after a swipe
    pub cooldown_ms: u64,
    /// The image x axis runs opposite to the user's left/right, as with a
    /// user-facing camera. Reported directions are always from the user's
    /// point of view, so a mirrored source flips the raw sign.
    pub mirrored: bool,
}

impl Default for GestureConfig {
    fn default() -> Self {
        GestureConfig {
            tracked_landmark: RIGHT_WRIST,
            history_len: 15,
            swipe_threshold: 0.15,
            min_visibility: 0.5,
            cooldown_ms: 1000,
            mirrored: true,
        }
    }
}

impl GestureConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }
}

/// Swipe direction as the user perceives it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SwipeDirection {
    #[serde(rename = "swipe_left")]
    Left,
    #[serde(rename = "swipe_right")]
    Right,
}

impl SwipeDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SwipeDirection::Left => "swipe_left",
            SwipeDirection::Right => "swipe_right",
        }
    }

    fn flipped(self) -> Self {
        match self {
            SwipeDirection::Left => SwipeDirection::Right,
            SwipeDirection::Right => SwipeDirection::Left,
        }
    }
}

/// Sliding-window swipe detector
#[derive(Debug, Clone)]
pub struct SwipeDetector {
    config: GestureConfig,
    /// Horizontal positions, oldest first
    history: VecDeque<f32>,
    /// Frames before this deadline are ignored
    cooldown_until: Option<FrameTime>,
}

impl SwipeDetector {
    pub fn new() -> Self {
        Self::with_config(GestureConfig::default())
    }

    pub fn with_config(mut config: GestureConfig) -> Self {
        config.history_len = config.history_len.max(2);
        if config.tracked_landmark >= LANDMARK_COUNT {
            config.tracked_landmark = RIGHT_WRIST;
        }
        SwipeDetector {
            history: VecDeque::with_capacity(config.history_len),
            cooldown_until: None,
            config,
        }
    }

    /// Advance by one frame observed at `now`
    pub fn advance(&mut self, frame: &LandmarkFrame, now: FrameTime) -> Option<SwipeDirection> {
        if let Some(deadline) = self.cooldown_until {
            if now < deadline {
                return None;
            }
            self.cooldown_until = None;
        }

        let point = frame.landmark(self.config.tracked_landmark);
        if point.visibility <= self.config.min_visibility || !point.x.is_finite() {
            // Not tracking
            self.history.clear();
            return None;
        }

        self.history.push_back(point.x);
        while self.history.len() > self.config.history_len {
            self.history.pop_front();
        }

        let direction = self.classify()?;

        self.history.clear();
        self.cooldown_until = Some(now + self.config.cooldown());
        debug!(gesture = direction.as_str(), "swipe detected");

        Some(direction)
    }

    fn classify(&self) -> Option<SwipeDirection> {
        if self.history.len() < self.config.history_len {
            return None;
        }

        let oldest = *self.history.front()?;
        let newest = *self.history.back()?;
        let delta = newest - oldest;

        let raw = if delta > self.config.swipe_threshold {
            SwipeDirection::Right
        } else if delta < -self.config.swipe_threshold {
            SwipeDirection::Left
        } else {
            return None;
        };

        Some(if self.config.mirrored { raw.flipped() } else { raw })
    }

    /// Samples currently in the window
    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    pub fn in_cooldown(&self, now: FrameTime) -> bool {
        self.cooldown_until.map_or(false, |deadline| now < deadline)
    }
}

impl Default for SwipeDetector {
    fn default() -> Self {
        Self::new()
    }
}

/// Wrapping cursor over a gallery, stepped by swipes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Carousel {
    len: usize,
    index: usize,
}

impl Carousel {
    /// A zero-length carousel ignores every swipe
    pub fn new(len: usize) -> Self {
        Carousel { len, index: 0 }
    }

    /// Right moves forward, left moves back, wrapping at both ends
    pub fn step(&mut self, direction: SwipeDirection) -> Option<usize> {
        if self.len == 0 {
            return None;
        }
        self.index = match direction {
            SwipeDirection::Right => (self.index + 1) % self.len,
            SwipeDirection::Left => (self.index + self.len - 1) % self.len,
        };
        Some(self.index)
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

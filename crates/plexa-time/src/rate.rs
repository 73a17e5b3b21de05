//! Frame rate estimation for status display

use std::time::Duration;

/// Exponentially smoothed frames-per-second meter
#[derive(Clone, Debug)]
pub struct FpsMeter {
    /// Smoothing factor (0-1)
    alpha: f32,
    /// Current estimate, `None` until a non-zero delta arrives
    fps: Option<f32>,
}

impl FpsMeter {
    pub fn new(alpha: f32) -> Self {
        FpsMeter {
            alpha: alpha.clamp(0.01, 1.0),
            fps: None,
        }
    }

    /// Fold in one inter-frame delta and return the current estimate.
    /// Zero deltas (first frame, duplicate timestamps) leave it unchanged.
    pub fn record(&mut self, dt: Duration) -> f32 {
        let secs = dt.as_secs_f32();
        if secs > 0.0 {
            let instant = 1.0 / secs;
            self.fps = Some(match self.fps {
                Some(prev) => prev + (instant - prev) * self.alpha,
                None => instant,
            });
        }
        self.current()
    }

    pub fn current(&self) -> f32 {
        self.fps.unwrap_or(0.0)
    }

    pub fn reset(&mut self) {
        self.fps = None;
    }
}

impl Default for FpsMeter {
    fn default() -> Self {
        Self::new(0.1)
    }
}

//! Squat repetition counter
//!
//! Two-phase machine over both knee angles (hip-knee-ankle). Entering
//! `Down` requires both knees below the down threshold; returning to `Up`
//! requires both above the up threshold and counts one repetition. The gap
//! between the thresholds keeps a borderline angle from counting twice.

use serde::{Deserialize, Serialize};
use tracing::debug;

use plexa_core::{LandmarkFrame, LEFT_KNEE, RIGHT_KNEE};

pub const FEEDBACK_START: &str = "Start squatting!";
pub const FEEDBACK_DEPTH: &str = "Great depth!";
pub const FEEDBACK_REP: &str = "Good rep!";
pub const FEEDBACK_NOT_VISIBLE: &str = "Make sure your full body is visible!";

/// Squat counter thresholds
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct SquatConfig {
    /// Both knees below this angle (degrees) enter the down phase
    pub down_threshold: f32,
    /// Both knees above this angle (degrees) complete the rep
    pub up_threshold: f32,
    /// Knee visibility below this triggers the visibility warning
    pub min_visibility: f32,
}

impl Default for SquatConfig {
    fn default() -> Self {
        SquatConfig {
            down_threshold: 120.0,
            up_threshold: 160.0,
            min_visibility: 0.8,
        }
    }
}

/// Squat phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SquatPhase {
    Up,
    Down,
}

/// Result of one squat tick
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SquatReport {
    pub rep_count: u32,
    pub feedback: String,
    pub phase: SquatPhase,
    /// A repetition completed on this tick
    pub rep_completed: bool,
}

/// Squat repetition counter
#[derive(Debug, Clone)]
pub struct SquatCounter {
    config: SquatConfig,
    phase: SquatPhase,
    rep_count: u32,
    feedback: String,
}

impl SquatCounter {
    pub fn new() -> Self {
        Self::with_config(SquatConfig::default())
    }

    pub fn with_config(config: SquatConfig) -> Self {
        SquatCounter {
            config,
            phase: SquatPhase::Up,
            rep_count: 0,
            feedback: FEEDBACK_START.to_string(),
        }
    }

    /// Advance by one frame
    ///
    /// A frame whose hip, knee or ankle coordinates are missing leaves the
    /// state untouched.
    pub fn advance(&mut self, frame: &LandmarkFrame) -> SquatReport {
        let Some((left, right)) = frame.knee_angles() else {
            return self.report(false);
        };

        let mut rep_completed = false;

        if left < self.config.down_threshold && right < self.config.down_threshold {
            self.phase = SquatPhase::Down;
            self.feedback = FEEDBACK_DEPTH.to_string();
        }

        if self.phase == SquatPhase::Down
            && left > self.config.up_threshold
            && right > self.config.up_threshold
        {
            self.phase = SquatPhase::Up;
            self.rep_count += 1;
            self.feedback = FEEDBACK_REP.to_string();
            rep_completed = true;
            debug!(reps = self.rep_count, "squat rep counted");
        }

        // Visibility only overrides feedback; phase transitions above still apply
        let min = self.config.min_visibility;
        if frame.landmark(LEFT_KNEE).visibility < min || frame.landmark(RIGHT_KNEE).visibility < min
        {
            self.feedback = FEEDBACK_NOT_VISIBLE.to_string();
        }

        self.report(rep_completed)
    }

    fn report(&self, rep_completed: bool) -> SquatReport {
        SquatReport {
            rep_count: self.rep_count,
            feedback: self.feedback.clone(),
            phase: self.phase,
            rep_completed,
        }
    }

    pub fn rep_count(&self) -> u32 {
        self.rep_count
    }

    pub fn phase(&self) -> SquatPhase {
        self.phase
    }

    pub fn feedback(&self) -> &str {
        &self.feedback
    }
}

impl Default for SquatCounter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plexa_core::{Landmark, PoseSketch};
    use proptest::prelude::*;

    fn knees(degrees: f32) -> LandmarkFrame {
        PoseSketch::new().knees(degrees).build()
    }

    #[test]
    fn test_single_cycle_counts_one() {
        let mut counter = SquatCounter::new();

        assert_eq!(counter.advance(&knees(170.0)).rep_count, 0);
        let down = counter.advance(&knees(100.0));
        assert_eq!(down.phase, SquatPhase::Down);
        assert_eq!(down.feedback, FEEDBACK_DEPTH);

        let up = counter.advance(&knees(170.0));
        assert_eq!(up.rep_count, 1);
        assert!(up.rep_completed);
        assert_eq!(up.phase, SquatPhase::Up);
        assert_eq!(up.feedback, FEEDBACK_REP);
    }

    #[test]
    fn test_borderline_angles_do_not_count() {
        let mut counter = SquatCounter::new();

        // Oscillating inside the hysteresis gap never enters Down
        for angle in [140.0, 125.0, 150.0, 121.0, 159.0, 165.0] {
            counter.advance(&knees(angle));
        }
        assert_eq!(counter.rep_count(), 0);
        assert_eq!(counter.phase(), SquatPhase::Up);

        // Down, then hovering in the gap does not complete the rep
        counter.advance(&knees(110.0));
        for angle in [130.0, 158.0, 125.0, 159.5] {
            counter.advance(&knees(angle));
        }
        assert_eq!(counter.rep_count(), 0);
        assert_eq!(counter.phase(), SquatPhase::Down);
    }

    #[test]
    fn test_one_knee_down_is_not_enough() {
        let mut counter = SquatCounter::new();
        counter.advance(&PoseSketch::new().left_knee(100.0).right_knee(170.0).build());
        assert_eq!(counter.phase(), SquatPhase::Up);
    }

    #[test]
    fn test_low_visibility_overrides_feedback_only() {
        let mut counter = SquatCounter::new();
        counter.advance(&knees(100.0));

        let blurry = PoseSketch::new().knees(170.0).build();
        let knee = *blurry.landmark(LEFT_KNEE);
        let blurry = blurry.with_landmark(LEFT_KNEE, Landmark { visibility: 0.5, ..knee });

        let report = counter.advance(&blurry);
        assert_eq!(report.rep_count, 1);
        assert_eq!(report.feedback, FEEDBACK_NOT_VISIBLE);
    }

    #[test]
    fn test_missing_landmarks_are_noop() {
        let mut counter = SquatCounter::new();
        counter.advance(&knees(100.0));

        let broken = knees(170.0).with_landmark(LEFT_KNEE, Landmark::new(f32::NAN, f32::NAN, 1.0));
        let report = counter.advance(&broken);

        assert_eq!(report.rep_count, 0);
        assert_eq!(report.phase, SquatPhase::Down);
        assert!(!report.rep_completed);
    }

    proptest! {
        #[test]
        fn prop_one_rep_per_full_cycle(
            cycles in proptest::collection::vec(
                (
                    proptest::collection::vec(121.0f32..159.0, 0..6),
                    proptest::collection::vec(20.0f32..119.0, 1..6),
                    proptest::collection::vec(121.0f32..159.0, 0..6),
                    proptest::collection::vec(161.0f32..180.0, 1..6),
                ),
                1..8,
            )
        ) {
            let mut counter = SquatCounter::new();
            counter.advance(&knees(170.0));

            for (i, (descent, bottom, ascent, top)) in cycles.iter().enumerate() {
                for &angle in descent.iter().chain(bottom).chain(ascent).chain(top) {
                    counter.advance(&knees(angle));
                }
                prop_assert_eq!(counter.rep_count() as usize, i + 1);
            }
        }
    }
}

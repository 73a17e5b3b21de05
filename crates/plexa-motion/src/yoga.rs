//! Yoga hold timer
//!
//! Warrior II: one knee bent, the other leg straight, both arms extended.
//! Time in pose accumulates; time out of pose drains the accumulator at the
//! same rate instead of zeroing it, so a brief wobble costs only what it
//! lasted.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize, Serializer};
use tracing::debug;

use plexa_core::LandmarkFrame;

pub const FEEDBACK_HOLD: &str = "HOLD... Breathe...";
pub const FEEDBACK_DONE: &str = "Namaste! Release.";
pub const FEEDBACK_ASSUME: &str = "Assume Warrior II";

/// Which leg must be the bent one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeadLeg {
    Left,
    Right,
    Either,
}

impl LeadLeg {
    fn adjust_hint(&self) -> &'static str {
        match self {
            LeadLeg::Left => "Adjust: Left knee bent, Arms out.",
            LeadLeg::Right => "Adjust: Right knee bent, Arms out.",
            LeadLeg::Either => "Adjust: One knee bent, Arms out.",
        }
    }
}

/// Hold timer configuration
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct YogaConfig {
    /// Accumulated hold needed to complete
    pub hold_target_ms: u64,
    /// Exclusive knee angle range of the bent leg
    pub bent_min: f32,
    pub bent_max: f32,
    /// The straight leg's knee must exceed this
    pub straight_min: f32,
    /// Both elbows must exceed this
    pub arm_min: f32,
    pub lead_leg: LeadLeg,
}

impl Default for YogaConfig {
    fn default() -> Self {
        YogaConfig {
            hold_target_ms: 10_000,
            bent_min: 90.0,
            bent_max: 160.0,
            straight_min: 160.0,
            arm_min: 150.0,
            lead_leg: LeadLeg::Either,
        }
    }
}

impl YogaConfig {
    pub fn hold_target(&self) -> Duration {
        Duration::from_millis(self.hold_target_ms)
    }

    fn is_bent(&self, angle: f32) -> bool {
        angle > self.bent_min && angle < self.bent_max
    }

    fn is_straight(&self, angle: f32) -> bool {
        angle > self.straight_min
    }

    /// Target pose predicate over one frame
    pub fn matches(&self, frame: &LandmarkFrame) -> bool {
        let (Some((left_knee, right_knee)), Some((left_arm, right_arm))) =
            (frame.knee_angles(), frame.elbow_angles())
        else {
            return false;
        };

        let arms = left_arm > self.arm_min && right_arm > self.arm_min;
        let right_leads = self.is_bent(right_knee) && self.is_straight(left_knee);
        let left_leads = self.is_bent(left_knee) && self.is_straight(right_knee);

        let legs = match self.lead_leg {
            LeadLeg::Right => right_leads,
            LeadLeg::Left => left_leads,
            LeadLeg::Either => right_leads || left_leads,
        };

        arms && legs
    }
}

/// Timer value shown to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoldDisplay {
    /// Whole seconds left, rounded up
    Remaining(u32),
    Done,
    /// Out of pose
    Idle,
}

impl fmt::Display for HoldDisplay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HoldDisplay::Remaining(secs) => write!(f, "{}s", secs),
            HoldDisplay::Done => f.write_str("DONE"),
            HoldDisplay::Idle => f.write_str("--"),
        }
    }
}

impl Serialize for HoldDisplay {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Result of one yoga tick
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct YogaReport {
    pub hold_seconds: f32,
    pub display: HoldDisplay,
    pub feedback: String,
    /// Latched once the target hold is reached
    pub completed: bool,
    pub matched: bool,
    /// Pose entered on this tick (success cue)
    #[serde(skip)]
    pub entered_pose: bool,
    /// Target reached on this tick; true at most once per session
    #[serde(skip)]
    pub announce_completion: bool,
}

/// Leaky hold accumulator
#[derive(Debug, Clone)]
pub struct YogaTimer {
    config: YogaConfig,
    hold: Duration,
    holding: bool,
    completed: bool,
}

impl YogaTimer {
    pub fn new() -> Self {
        Self::with_config(YogaConfig::default())
    }

    pub fn with_config(config: YogaConfig) -> Self {
        YogaTimer {
            config,
            hold: Duration::ZERO,
            holding: false,
            completed: false,
        }
    }

    /// Advance by one frame that arrived `dt` after the previous one
    pub fn advance(&mut self, frame: &LandmarkFrame, dt: Duration) -> YogaReport {
        let matched = self.config.matches(frame);
        self.apply(matched, dt)
    }

    /// Advance with a precomputed match decision
    pub fn apply(&mut self, matched: bool, dt: Duration) -> YogaReport {
        let entered_pose = matched && !self.holding;
        self.holding = matched;

        let mut announce_completion = false;

        if matched {
            self.hold = self.hold.saturating_add(dt);
            if !self.completed && self.hold >= self.config.hold_target() {
                self.completed = true;
                announce_completion = true;
                debug!(hold_ms = self.hold.as_millis() as u64, "yoga hold completed");
            }
        } else {
            self.hold = self.hold.saturating_sub(dt);
        }

        let (display, feedback) = if !matched {
            (HoldDisplay::Idle, self.config.lead_leg.adjust_hint())
        } else if self.completed {
            (HoldDisplay::Done, FEEDBACK_DONE)
        } else {
            (HoldDisplay::Remaining(self.remaining_secs()), FEEDBACK_HOLD)
        };

        YogaReport {
            hold_seconds: self.hold.as_secs_f32(),
            display,
            feedback: feedback.to_string(),
            completed: self.completed,
            matched,
            entered_pose,
            announce_completion,
        }
    }

    fn remaining_secs(&self) -> u32 {
        let left = self.config.hold_target().saturating_sub(self.hold);
        left.as_secs_f64().ceil() as u32
    }

    pub fn hold(&self) -> Duration {
        self.hold
    }

    pub fn is_holding(&self) -> bool {
        self.holding
    }

    pub fn is_completed(&self) -> bool {
        self.completed
    }
}

impl Default for YogaTimer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plexa_core::PoseSketch;

    const TICK: Duration = Duration::from_millis(100);

    fn warrior() -> LandmarkFrame {
        PoseSketch::new().right_knee(120.0).left_knee(175.0).elbows(175.0).build()
    }

    fn standing() -> LandmarkFrame {
        PoseSketch::new().build()
    }

    #[test]
    fn test_pose_predicate() {
        let config = YogaConfig::default();
        assert!(config.matches(&warrior()));
        assert!(!config.matches(&standing()));

        // Arms dropped
        let arms_down = PoseSketch::new().right_knee(120.0).left_knee(175.0).elbows(120.0).build();
        assert!(!config.matches(&arms_down));

        let mirrored = PoseSketch::new().left_knee(120.0).right_knee(175.0).elbows(175.0).build();
        assert!(config.matches(&mirrored));

        let right_only = YogaConfig { lead_leg: LeadLeg::Right, ..YogaConfig::default() };
        assert!(right_only.matches(&warrior()));
        assert!(!right_only.matches(&mirrored));
    }

    #[test]
    fn test_continuous_hold_completes_once() {
        let mut timer = YogaTimer::new();

        let first = timer.advance(&warrior(), Duration::ZERO);
        assert!(first.entered_pose);
        assert_eq!(first.display, HoldDisplay::Remaining(10));

        let mut announcements = 0;
        for _ in 0..150 {
            let report = timer.advance(&warrior(), TICK);
            assert!(!report.entered_pose);
            if report.announce_completion {
                announcements += 1;
            }
        }

        assert_eq!(announcements, 1);
        assert!(timer.is_completed());
        let report = timer.advance(&warrior(), TICK);
        assert_eq!(report.display, HoldDisplay::Done);
        assert_eq!(report.feedback, FEEDBACK_DONE);
    }

    #[test]
    fn test_completes_exactly_at_target() {
        let mut timer = YogaTimer::new();
        timer.advance(&warrior(), Duration::ZERO);

        for i in 1..=100 {
            let report = timer.advance(&warrior(), TICK);
            assert_eq!(report.completed, i >= 100, "tick {i}");
        }
    }

    #[test]
    fn test_decay_never_negative() {
        let mut timer = YogaTimer::new();
        timer.advance(&warrior(), Duration::from_secs(2));
        let report = timer.advance(&standing(), Duration::from_secs(5));

        assert_eq!(timer.hold(), Duration::ZERO);
        assert_eq!(report.display, HoldDisplay::Idle);
        assert_eq!(report.feedback, LeadLeg::Either.adjust_hint());
    }

    #[test]
    fn test_alternating_ticks_still_complete() {
        let mut timer = YogaTimer::new();

        // Two ticks in, one out: net +100ms per cycle
        let mut completed_at = None;
        for cycle in 0..200 {
            timer.advance(&warrior(), TICK);
            let report = timer.advance(&warrior(), TICK);
            if report.announce_completion {
                completed_at = Some(cycle);
            }
            timer.advance(&standing(), TICK);
        }

        assert!(completed_at.is_some());
        assert!(timer.is_completed());
    }

    #[test]
    fn test_entered_pose_fires_per_entry() {
        let mut timer = YogaTimer::new();
        assert!(timer.advance(&warrior(), TICK).entered_pose);
        assert!(!timer.advance(&warrior(), TICK).entered_pose);
        timer.advance(&standing(), TICK);
        assert!(timer.advance(&warrior(), TICK).entered_pose);
    }

    #[test]
    fn test_display_labels() {
        assert_eq!(HoldDisplay::Remaining(7).to_string(), "7s");
        assert_eq!(HoldDisplay::Done.to_string(), "DONE");
        assert_eq!(
            serde_json::to_string(&HoldDisplay::Idle).unwrap(),
            "\"--\""
        );
    }

    #[test]
    fn test_remaining_rounds_up() {
        let mut timer = YogaTimer::new();
        let report = timer.advance(&warrior(), Duration::from_millis(2_300));
        assert_eq!(report.display, HoldDisplay::Remaining(8));
    }
}

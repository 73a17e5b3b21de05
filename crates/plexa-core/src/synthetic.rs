//! Synthetic pose construction
//!
//! Builds landmark frames whose knee and elbow joints open to requested
//! angles. Used by scenario tests, benches and the replay tooling; no
//! estimator is involved.

use crate::landmark::*;

const THIGH: f32 = 0.18;
const SHIN: f32 = 0.18;
const UPPER_ARM: f32 = 0.12;
const FOREARM: f32 = 0.12;

/// Builder for a standing figure with chosen joint angles (degrees)
#[derive(Debug, Clone)]
pub struct PoseSketch {
    left_knee: f32,
    right_knee: f32,
    left_elbow: f32,
    right_elbow: f32,
    center_x: f32,
    visibility: f32,
    overrides: Vec<(usize, Landmark)>,
}

impl PoseSketch {
    /// Upright figure: straight legs, straight arms held out sideways
    pub fn new() -> Self {
        Self {
            left_knee: 180.0,
            right_knee: 180.0,
            left_elbow: 180.0,
            right_elbow: 180.0,
            center_x: 0.5,
            visibility: 1.0,
            overrides: Vec::new(),
        }
    }

    /// Both knees at the same angle
    pub fn knees(mut self, degrees: f32) -> Self {
        self.left_knee = degrees;
        self.right_knee = degrees;
        self
    }

    pub fn left_knee(mut self, degrees: f32) -> Self {
        self.left_knee = degrees;
        self
    }

    pub fn right_knee(mut self, degrees: f32) -> Self {
        self.right_knee = degrees;
        self
    }

    /// Both elbows at the same angle
    pub fn elbows(mut self, degrees: f32) -> Self {
        self.left_elbow = degrees;
        self.right_elbow = degrees;
        self
    }

    /// Horizontal body center (nose and torso follow it)
    pub fn center_x(mut self, x: f32) -> Self {
        self.center_x = x;
        self
    }

    /// Confidence applied to every generated landmark
    pub fn visibility(mut self, visibility: f32) -> Self {
        self.visibility = visibility;
        self
    }

    /// Replace one landmark after generation
    pub fn set(mut self, index: usize, landmark: Landmark) -> Self {
        self.overrides.push((index, landmark));
        self
    }

    /// Move the right wrist horizontally, keeping its height and confidence
    pub fn right_wrist_x(self, x: f32) -> Self {
        let mut wrist = *self.build().landmark(RIGHT_WRIST);
        wrist.x = x;
        self.set(RIGHT_WRIST, wrist)
    }

    pub fn build(&self) -> LandmarkFrame {
        let v = self.visibility;
        let cx = self.center_x;
        let mut points = [Landmark::new(cx, 0.5, v); LANDMARK_COUNT];

        points[NOSE] = Landmark::new(cx, 0.15, v);

        let l_shoulder = Landmark::new(cx + 0.1, 0.3, v);
        let r_shoulder = Landmark::new(cx - 0.1, 0.3, v);
        points[LEFT_SHOULDER] = l_shoulder;
        points[RIGHT_SHOULDER] = r_shoulder;

        // Upper arms point outwards; forearms bend downwards from there
        let l_elbow = Landmark::new(l_shoulder.x + UPPER_ARM, l_shoulder.y, v);
        let r_elbow = Landmark::new(r_shoulder.x - UPPER_ARM, r_shoulder.y, v);
        points[LEFT_ELBOW] = l_elbow;
        points[RIGHT_ELBOW] = r_elbow;
        points[LEFT_WRIST] = swing(&l_shoulder, &l_elbow, self.left_elbow, FOREARM, -1.0, v);
        points[RIGHT_WRIST] = swing(&r_shoulder, &r_elbow, self.right_elbow, FOREARM, 1.0, v);

        let l_hip = Landmark::new(cx + 0.06, 0.55, v);
        let r_hip = Landmark::new(cx - 0.06, 0.55, v);
        points[LEFT_HIP] = l_hip;
        points[RIGHT_HIP] = r_hip;

        let l_knee = Landmark::new(l_hip.x, l_hip.y + THIGH, v);
        let r_knee = Landmark::new(r_hip.x, r_hip.y + THIGH, v);
        points[LEFT_KNEE] = l_knee;
        points[RIGHT_KNEE] = r_knee;
        points[LEFT_ANKLE] = swing(&l_hip, &l_knee, self.left_knee, SHIN, 1.0, v);
        points[RIGHT_ANKLE] = swing(&r_hip, &r_knee, self.right_knee, SHIN, -1.0, v);

        let mut frame = LandmarkFrame::new(points);
        for (index, landmark) in &self.overrides {
            frame = frame.with_landmark(*index, *landmark);
        }
        frame
    }
}

impl Default for PoseSketch {
    fn default() -> Self {
        Self::new()
    }
}

/// Place the far end of a limb segment so the joint at `vertex` opens to
/// `degrees` relative to the segment towards `anchor`.
fn swing(
    anchor: &Landmark,
    vertex: &Landmark,
    degrees: f32,
    length: f32,
    turn: f32,
    visibility: f32,
) -> Landmark {
    let (ux, uy) = (anchor.x - vertex.x, anchor.y - vertex.y);
    let norm = (ux * ux + uy * uy).sqrt().max(f32::EPSILON);
    let (ux, uy) = (ux / norm, uy / norm);

    let theta = degrees.clamp(0.0, 180.0).to_radians() * turn;
    let (sin, cos) = theta.sin_cos();
    let (dx, dy) = (ux * cos - uy * sin, ux * sin + uy * cos);

    Landmark::new(vertex.x + dx * length, vertex.y + dy * length, visibility)
}

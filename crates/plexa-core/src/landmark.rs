//! Landmark frames - one detected body at one instant
//!
//! Produced by an external pose estimator. Index positions are fixed by the
//! 33-point body model: the constants below name the ones the engines use.

use serde::{Deserialize, Serialize};

use crate::{PlexaError, PlexaResult};

// ============================================================================
// LANDMARK INDICES (33-point body model)
// ============================================================================

/// Landmarks per detected body
pub const LANDMARK_COUNT: usize = 33;

pub const NOSE: usize = 0;
pub const LEFT_SHOULDER: usize = 11;
pub const RIGHT_SHOULDER: usize = 12;
pub const LEFT_ELBOW: usize = 13;
pub const RIGHT_ELBOW: usize = 14;
pub const LEFT_WRIST: usize = 15;
pub const RIGHT_WRIST: usize = 16;
pub const LEFT_HIP: usize = 23;
pub const RIGHT_HIP: usize = 24;
pub const LEFT_KNEE: usize = 25;
pub const RIGHT_KNEE: usize = 26;
pub const LEFT_ANKLE: usize = 27;
pub const RIGHT_ANKLE: usize = 28;

// ============================================================================
// LANDMARK
// ============================================================================

/// A single key point in normalized image space
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    /// Horizontal position, 0-1 normalized
    pub x: f32,
    /// Vertical position, 0-1 normalized (grows downwards)
    pub y: f32,
    /// Relative depth, when the estimator reports it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub z: Option<f32>,
    /// Detection confidence, 0-1. Estimators that omit it are trusted fully.
    #[serde(default = "full_visibility")]
    pub visibility: f32,
}

fn full_visibility() -> f32 {
    1.0
}

impl Landmark {
    pub fn new(x: f32, y: f32, visibility: f32) -> Self {
        Self {
            x,
            y,
            z: None,
            visibility,
        }
    }

    pub fn with_depth(mut self, z: f32) -> Self {
        self.z = Some(z);
        self
    }

    /// Both planar coordinates are usable
    #[inline]
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl Default for Landmark {
    fn default() -> Self {
        Self::new(0.0, 0.0, 1.0)
    }
}

/// Angle at vertex `b` formed by `a-b-c`, in degrees, folded into [0, 180]
///
/// angle = |atan2(c - b) - atan2(a - b)|, reflected when above 180.
pub fn joint_angle(a: &Landmark, b: &Landmark, c: &Landmark) -> f32 {
    let radians = (c.y - b.y).atan2(c.x - b.x) - (a.y - b.y).atan2(a.x - b.x);
    let angle = radians.to_degrees().abs();

    if angle > 180.0 {
        360.0 - angle
    } else {
        angle
    }
}

// ============================================================================
// LANDMARK FRAME
// ============================================================================

/// Exactly 33 landmarks for one detected body
///
/// Immutable value object. On the wire it is a plain JSON array; any other
/// length is rejected during deserialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Landmark>", into = "Vec<Landmark>")]
pub struct LandmarkFrame {
    landmarks: [Landmark; LANDMARK_COUNT],
}

impl LandmarkFrame {
    pub fn new(landmarks: [Landmark; LANDMARK_COUNT]) -> Self {
        Self { landmarks }
    }

    /// Landmark at a fixed body-model index
    ///
    /// # Panics
    /// If `index >= LANDMARK_COUNT`; use the named index constants.
    #[inline]
    pub fn landmark(&self, index: usize) -> &Landmark {
        &self.landmarks[index]
    }

    pub fn get(&self, index: usize) -> Option<&Landmark> {
        self.landmarks.get(index)
    }

    pub fn landmarks(&self) -> &[Landmark; LANDMARK_COUNT] {
        &self.landmarks
    }

    /// Copy with one landmark replaced
    pub fn with_landmark(mut self, index: usize, landmark: Landmark) -> Self {
        if index < LANDMARK_COUNT {
            self.landmarks[index] = landmark;
        }
        self
    }

    /// Joint angle at `b`, or `None` when any of the three points is missing
    pub fn angle_at(&self, a: usize, b: usize, c: usize) -> Option<f32> {
        let (a, b, c) = (self.get(a)?, self.get(b)?, self.get(c)?);
        if a.is_finite() && b.is_finite() && c.is_finite() {
            Some(joint_angle(a, b, c))
        } else {
            None
        }
    }

    /// Knee angles (hip-knee-ankle) as `(left, right)`
    pub fn knee_angles(&self) -> Option<(f32, f32)> {
        Some((
            self.angle_at(LEFT_HIP, LEFT_KNEE, LEFT_ANKLE)?,
            self.angle_at(RIGHT_HIP, RIGHT_KNEE, RIGHT_ANKLE)?,
        ))
    }

    /// Elbow angles (shoulder-elbow-wrist) as `(left, right)`
    pub fn elbow_angles(&self) -> Option<(f32, f32)> {
        Some((
            self.angle_at(LEFT_SHOULDER, LEFT_ELBOW, LEFT_WRIST)?,
            self.angle_at(RIGHT_SHOULDER, RIGHT_ELBOW, RIGHT_WRIST)?,
        ))
    }
}

impl Default for LandmarkFrame {
    fn default() -> Self {
        Self::new([Landmark::default(); LANDMARK_COUNT])
    }
}

impl TryFrom<Vec<Landmark>> for LandmarkFrame {
    type Error = PlexaError;

    fn try_from(landmarks: Vec<Landmark>) -> PlexaResult<Self> {
        let actual = landmarks.len();
        let landmarks: [Landmark; LANDMARK_COUNT] =
            landmarks
                .try_into()
                .map_err(|_| PlexaError::InvalidFrame {
                    expected: LANDMARK_COUNT,
                    actual,
                })?;
        Ok(Self { landmarks })
    }
}

impl From<LandmarkFrame> for Vec<Landmark> {
    fn from(frame: LandmarkFrame) -> Self {
        frame.landmarks.to_vec()
    }
}

//! PlexaMotion Time - Frame clock and rate estimation
//!
//! This crate turns the external source's timestamps into the quantities the
//! engines accumulate:
//! - Frame deltas (zero on the first tick, never negative, clamped)
//! - Smoothed frames-per-second for status display

pub mod clock;
pub mod rate;

pub use clock::*;
pub use rate::*;

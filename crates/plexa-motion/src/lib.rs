//! PlexaMotion Motion Engines
//!
//! Per-mode interpreters of landmark frames. Each engine owns its state
//! explicitly, advances once per tick, and returns a plain report record;
//! none of them touch rendering or audio.
//!
//! - Squat: two-phase hysteresis rep counter over knee angles
//! - Gesture: sliding-window horizontal swipe classifier with cooldown
//! - Yoga: pose predicate with a leaky hold accumulator
//! - Game: dodge-the-obstacles simulation steered by one landmark

pub mod game;
pub mod gesture;
pub mod squat;
pub mod yoga;

pub use game::*;
pub use gesture::*;
pub use squat::*;
pub use yoga::*;

//! PlexaMotion Core - Fundamental types and primitives
//!
//! This crate defines the types shared by every other PlexaMotion crate:
//! - Landmark frames (33 normalized body key points per detected body)
//! - Joint-angle geometry
//! - Frame time
//! - Peer identifiers for relay sessions
//! - Error taxonomy

pub mod error;
pub mod id;
pub mod landmark;
pub mod synthetic;
pub mod time;

pub use error::*;
pub use id::*;
pub use landmark::*;
pub use synthetic::PoseSketch;
pub use time::*;

//! PlexaMotion Relay - Host/Sensor session plumbing
//!
//! A Sensor device captures frames and forwards derived pose data to a
//! Host device that renders it. This crate provides:
//! - The two relay message shapes (status snapshot, landmark batch)
//! - A length-prefixed JSON framing codec with a bootstrap handshake
//! - A session state machine parameterized by role
//! - A TCP transport with a background reader task
//!
//! Delivery order on the channel is trusted to equal send order; no
//! acknowledgements or sequence numbers are exchanged.

pub mod codec;
pub mod config;
pub mod message;
pub mod session;
pub mod tcp;

pub use codec::*;
pub use config::*;
pub use message::*;
pub use session::*;
pub use tcp::*;

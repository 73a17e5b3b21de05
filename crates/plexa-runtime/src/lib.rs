//! PlexaMotion Runtime - Frame loop, mode dispatch and relay integration
//!
//! A [`MotionNode`] is driven one tick at a time: the caller hands it the
//! bodies detected in a frame plus a timestamp, and gets back the output
//! events a presentation shell would render or speak. Relay traffic flows
//! through the same node as [`RelayEvent`]s in and queued
//! [`RelayMessage`](plexa_relay::RelayMessage)s out.

pub mod config;
pub mod dispatcher;
pub mod logging;
pub mod node;
pub mod output;
pub mod replay;

pub use config::*;
pub use dispatcher::*;
pub use logging::*;
pub use node::*;
pub use output::*;
pub use replay::*;

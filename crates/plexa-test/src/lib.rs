//! PlexaMotion Test Harness - Relay simulation and end-to-end scenarios
//!
//! This crate provides:
//! - An ordered in-memory relay link with latency, jitter and cuts
//! - A Host/Sensor node pair driven tick by tick
//! - Scenario runners for remote rep counting and reconnects

pub mod harness;
pub mod integration;
pub mod simulator;

pub use harness::*;
pub use integration::*;
pub use simulator::*;

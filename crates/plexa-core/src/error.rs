//! Error types for PlexaMotion

use thiserror::Error;

/// Core PlexaMotion errors
///
/// Engines never produce these: missing bodies and low-confidence joints are
/// handled locally as no-op or degraded-feedback ticks. Only the relay, the
/// codec and configuration loading surface errors.
#[derive(Error, Debug)]
pub enum PlexaError {
    // Input errors
    #[error("Invalid landmark frame: expected {expected} landmarks, got {actual}")]
    InvalidFrame { expected: usize, actual: usize },

    #[error("Invalid peer identifier: {0:?}")]
    InvalidPeerId(String),

    // Wire errors
    #[error("Codec error: {0}")]
    Codec(String),

    #[error("Frame too large: {size} > {limit}")]
    FrameTooLarge { size: usize, limit: usize },

    #[error("Unexpected wire frame: {0}")]
    UnexpectedFrame(String),

    // Session errors
    #[error("Invalid session transition: {from} -> {to}")]
    InvalidTransition {
        from: &'static str,
        to: &'static str,
    },

    #[error("Operation requires the {expected} role")]
    WrongRole { expected: &'static str },

    #[error("Session already has a live peer")]
    SessionBusy,

    #[error("Peer mismatch: expected {expected}, got {actual}")]
    PeerMismatch { expected: String, actual: String },

    #[error("Session is not open")]
    SessionNotOpen,

    #[error("Handshake rejected: {0}")]
    HandshakeRejected(String),

    #[error("Handshake timed out")]
    HandshakeTimeout,

    // Transport errors
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Connection lost")]
    ConnectionLost,

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type for PlexaMotion operations
pub type PlexaResult<T> = Result<T, PlexaError>;

//! Peer identifiers for relay sessions
//!
//! Identifiers are short and human-readable: a Host displays its code on
//! screen and the user types it into the Sensor device.

use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::{PlexaError, PlexaResult};

/// Maximum identifier length accepted from user input or the wire
pub const MAX_PEER_ID_LEN: usize = 32;

/// Peer identity within a relay session
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PeerId(String);

impl PeerId {
    /// Parse a user-supplied identifier.
    /// Surrounding whitespace is ignored; 1-32 ASCII alphanumerics or `-`.
    pub fn parse(raw: &str) -> PlexaResult<Self> {
        let trimmed = raw.trim();
        let valid = !trimmed.is_empty()
            && trimmed.len() <= MAX_PEER_ID_LEN
            && trimmed
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-');

        if valid {
            Ok(PeerId(trimmed.to_string()))
        } else {
            Err(PlexaError::InvalidPeerId(raw.to_string()))
        }
    }

    /// Four-digit session code a Host shows to the user (1000-9999)
    pub fn session_code<R: Rng + ?Sized>(rng: &mut R) -> Self {
        PeerId(rng.gen_range(1000u32..10000).to_string())
    }

    /// Random local identifier for a Sensor (8 hex digits)
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        PeerId(format!("{:08x}", rng.gen::<u32>()))
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for PeerId {
    type Error = PlexaError;

    fn try_from(raw: String) -> PlexaResult<Self> {
        Self::parse(&raw)
    }
}

impl From<PeerId> for String {
    fn from(id: PeerId) -> Self {
        id.0
    }
}

impl fmt::Debug for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Peer({})", self.0)
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

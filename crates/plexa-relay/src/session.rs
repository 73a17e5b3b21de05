//! Relay session - one state machine for both roles
//!
//! ```text
//! Idle -> Connecting -> Open -> Closed
//!            |            |
//!            +------------+---> Failed
//! ```
//!
//! A Host generates a session code and waits; a Sensor is handed the code
//! out of band and dials. Closed and Failed are terminal: reconnecting means
//! building a new session with [`RelaySession::retry`].

use std::fmt;

use rand::Rng;
use serde::Serialize;
use tracing::{info, warn};

use plexa_core::{LandmarkFrame, PeerId, PlexaError, PlexaResult};

use crate::{Environment, LandmarksMessage, RelayMessage, StatsMessage};

/// Which side of the relay this device plays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Renders remote pose data and drives the UI
    Host,
    /// Captures frames and forwards them
    Sensor,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Host => "host",
            Role::Sensor => "sensor",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Session lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Idle,
    Connecting,
    Open,
    Closed,
    Failed,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Connecting => "connecting",
            SessionState::Open => "open",
            SessionState::Closed => "closed",
            SessionState::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Closed | SessionState::Failed)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Session counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub frames_sent: u64,
    pub stats_sent: u64,
    pub messages_received: u64,
}

/// Relay session
#[derive(Debug, Clone)]
pub struct RelaySession {
    role: Role,
    /// Host: the displayed session code. Sensor: a random local id.
    local_id: PeerId,
    /// Host: the connected sensor, once open. Sensor: the code it dials.
    peer_id: Option<PeerId>,
    state: SessionState,
    failure: Option<String>,
    pub stats: SessionStats,
}

impl RelaySession {
    /// Host session with a fresh four-digit code
    pub fn host<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self::with_ids(Role::Host, PeerId::session_code(rng), None)
    }

    /// Sensor session that will dial `remote`
    pub fn sensor<R: Rng + ?Sized>(rng: &mut R, remote: PeerId) -> Self {
        Self::with_ids(Role::Sensor, PeerId::random(rng), Some(remote))
    }

    fn with_ids(role: Role, local_id: PeerId, peer_id: Option<PeerId>) -> Self {
        RelaySession {
            role,
            local_id,
            peer_id,
            state: SessionState::Idle,
            failure: None,
            stats: SessionStats::default(),
        }
    }

    fn transition(&mut self, to: SessionState) {
        info!(
            role = self.role.as_str(),
            session = %self.session_code().map(|c| c.as_str()).unwrap_or("-"),
            from = self.state.as_str(),
            to = to.as_str(),
            "relay session transition"
        );
        self.state = to;
    }

    fn invalid(&self, to: SessionState) -> PlexaError {
        PlexaError::InvalidTransition {
            from: self.state.as_str(),
            to: to.as_str(),
        }
    }

    /// Idle -> Connecting. The Host starts listening, the Sensor dials.
    pub fn begin(&mut self) -> PlexaResult<()> {
        if self.state != SessionState::Idle {
            return Err(self.invalid(SessionState::Connecting));
        }
        self.transition(SessionState::Connecting);
        Ok(())
    }

    /// Connecting -> Open once the handshake with `peer` succeeded
    ///
    /// A Host accepts any sensor as its single live peer. A Sensor only
    /// accepts the Host it dialed.
    pub fn open(&mut self, peer: PeerId) -> PlexaResult<()> {
        match self.state {
            SessionState::Connecting => {}
            SessionState::Open if self.role == Role::Host => return Err(PlexaError::SessionBusy),
            _ => return Err(self.invalid(SessionState::Open)),
        }

        match self.role {
            Role::Host => self.peer_id = Some(peer),
            Role::Sensor => {
                if let Some(expected) = &self.peer_id {
                    if *expected != peer {
                        return Err(PlexaError::PeerMismatch {
                            expected: expected.to_string(),
                            actual: peer.to_string(),
                        });
                    }
                }
            }
        }

        self.transition(SessionState::Open);
        Ok(())
    }

    /// Handshake failure, unreachable peer or mid-session drop
    pub fn fail(&mut self, reason: impl Into<String>) -> PlexaResult<()> {
        if self.state.is_terminal() {
            return Err(self.invalid(SessionState::Failed));
        }
        let reason = reason.into();
        warn!(role = self.role.as_str(), reason = %reason, "relay session failed");
        self.failure = Some(reason);
        self.transition(SessionState::Failed);
        Ok(())
    }

    /// Orderly teardown. Closing a terminal session does nothing.
    pub fn close(&mut self) {
        if !self.state.is_terminal() {
            self.transition(SessionState::Closed);
        }
    }

    /// Fresh Idle session with the same role
    ///
    /// A Host draws a new code; a Sensor keeps dialing the same Host.
    pub fn retry<R: Rng + ?Sized>(&self, rng: &mut R) -> PlexaResult<RelaySession> {
        if !self.state.is_terminal() {
            return Err(self.invalid(SessionState::Idle));
        }
        Ok(match self.role {
            Role::Host => RelaySession::host(rng),
            Role::Sensor => Self::with_ids(Role::Sensor, PeerId::random(rng), self.peer_id.clone()),
        })
    }

    /// Landmark batch for the frame's bodies
    ///
    /// Only an open Sensor relays, and only when at least one body was
    /// detected.
    pub fn relay_frame(&mut self, bodies: &[LandmarkFrame]) -> Option<RelayMessage> {
        if !self.can_send() || bodies.is_empty() {
            return None;
        }
        self.stats.frames_sent += 1;
        Some(RelayMessage::Landmarks(LandmarksMessage {
            bodies: bodies.to_vec(),
        }))
    }

    /// Status snapshot, when this is an open Sensor
    pub fn relay_stats(&mut self, detected: bool, environment: &Environment) -> Option<RelayMessage> {
        if !self.can_send() {
            return None;
        }
        self.stats.stats_sent += 1;
        Some(RelayMessage::Stats(StatsMessage::snapshot(detected, environment)))
    }

    /// Open Sensor; the only state that produces outgoing messages
    pub fn can_send(&self) -> bool {
        self.role == Role::Sensor && self.state == SessionState::Open
    }

    /// Accept an inbound message for republishing
    pub fn receive(&mut self, msg: RelayMessage) -> PlexaResult<RelayMessage> {
        if self.role != Role::Host {
            return Err(PlexaError::WrongRole { expected: "host" });
        }
        if self.state != SessionState::Open {
            return Err(PlexaError::SessionNotOpen);
        }
        self.stats.messages_received += 1;
        Ok(msg)
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.state == SessionState::Open
    }

    pub fn local_id(&self) -> &PeerId {
        &self.local_id
    }

    pub fn peer_id(&self) -> Option<&PeerId> {
        self.peer_id.as_ref()
    }

    /// The code both sides agree on: the Host's own id, or the one a
    /// Sensor dials
    pub fn session_code(&self) -> Option<&PeerId> {
        match self.role {
            Role::Host => Some(&self.local_id),
            Role::Sensor => self.peer_id.as_ref(),
        }
    }

    /// Why the session failed, if it did
    pub fn failure(&self) -> Option<&str> {
        self.failure.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plexa_core::PoseSketch;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(3)
    }

    fn code(s: &str) -> PeerId {
        PeerId::parse(s).unwrap()
    }

    fn open_pair() -> (RelaySession, RelaySession) {
        let mut rng = rng();
        let mut host = RelaySession::host(&mut rng);
        let host_code = host.local_id().clone();
        let mut sensor = RelaySession::sensor(&mut rng, host_code.clone());

        host.begin().unwrap();
        sensor.begin().unwrap();
        host.open(sensor.local_id().clone()).unwrap();
        sensor.open(host_code).unwrap();
        (host, sensor)
    }

    #[test]
    fn test_lifecycle() {
        let (mut host, sensor) = open_pair();
        assert!(host.is_open());
        assert!(sensor.is_open());
        assert_eq!(host.peer_id(), Some(sensor.local_id()));
        assert_eq!(host.session_code(), sensor.session_code());

        host.close();
        assert_eq!(host.state(), SessionState::Closed);
        host.close();
        assert_eq!(host.state(), SessionState::Closed);
    }

    #[test]
    fn test_invalid_transitions() {
        let mut session = RelaySession::host(&mut rng());
        assert!(matches!(
            session.open(code("abc")),
            Err(PlexaError::InvalidTransition { from: "idle", to: "open" })
        ));

        session.begin().unwrap();
        assert!(session.begin().is_err());

        session.fail("listener died").unwrap();
        assert!(session.fail("again").is_err());
        assert!(session.begin().is_err());
        assert_eq!(session.failure(), Some("listener died"));
    }

    #[test]
    fn test_host_allows_one_live_peer() {
        let (mut host, _) = open_pair();
        assert!(matches!(
            host.open(code("intruder")),
            Err(PlexaError::SessionBusy)
        ));
    }

    #[test]
    fn test_sensor_rejects_wrong_host() {
        let mut sensor = RelaySession::sensor(&mut rng(), code("4821"));
        sensor.begin().unwrap();
        assert!(matches!(
            sensor.open(code("1234")),
            Err(PlexaError::PeerMismatch { .. })
        ));
        assert_eq!(sensor.state(), SessionState::Connecting);
    }

    #[test]
    fn test_only_open_sensor_relays_bodies() {
        let body = PoseSketch::new().build();
        let mut rng = rng();

        let mut idle = RelaySession::sensor(&mut rng, code("4821"));
        assert!(idle.relay_frame(&[body.clone()]).is_none());

        let (mut host, mut sensor) = open_pair();
        assert!(host.relay_frame(&[body.clone()]).is_none());
        assert!(sensor.relay_frame(&[]).is_none());

        let msg = sensor.relay_frame(&[body.clone(), body]).unwrap();
        match &msg {
            RelayMessage::Landmarks(batch) => assert_eq!(batch.bodies.len(), 2),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(sensor.stats.frames_sent, 1);

        assert!(sensor.relay_stats(true, &Environment::default()).is_some());
        assert!(host.relay_stats(true, &Environment::default()).is_none());
    }

    #[test]
    fn test_receive_requires_open_host() {
        let msg = RelayMessage::Stats(StatsMessage::snapshot(true, &Environment::default()));
        let (mut host, mut sensor) = open_pair();

        assert!(matches!(
            sensor.receive(msg.clone()),
            Err(PlexaError::WrongRole { expected: "host" })
        ));
        assert_eq!(host.receive(msg.clone()).unwrap(), msg);
        assert_eq!(host.stats.messages_received, 1);

        host.fail("connection lost").unwrap();
        assert!(matches!(host.receive(msg), Err(PlexaError::SessionNotOpen)));
    }

    #[test]
    fn test_retry_is_explicit() {
        let (mut host, mut sensor) = open_pair();
        let mut rng = StdRng::seed_from_u64(99);

        assert!(host.retry(&mut rng).is_err());

        host.fail("connection lost").unwrap();
        sensor.fail("connection lost").unwrap();

        let host2 = host.retry(&mut rng).unwrap();
        assert_eq!(host2.state(), SessionState::Idle);
        assert_eq!(host2.role(), Role::Host);
        assert!(host2.peer_id().is_none());

        let sensor2 = sensor.retry(&mut rng).unwrap();
        assert_eq!(sensor2.state(), SessionState::Idle);
        assert_eq!(sensor2.session_code(), sensor.session_code());
    }
}

//! Motion node - per-tick pipeline and relay integration

use std::collections::VecDeque;

use tracing::{debug, info, warn};

use plexa_core::{FrameTime, LandmarkFrame, PeerId};
use plexa_relay::{Environment, LinkEvent, RelayMessage, RelaySession, Role, SessionState};
use plexa_time::{FpsMeter, FrameClock};

use crate::{Dispatch, Mode, ModeDispatcher, NodeConfig, OutputEvent, RemoteStatus};

/// Something the transport observed on the session's connection
#[derive(Debug, Clone, PartialEq)]
pub enum RelayEvent {
    /// Handshake succeeded with this peer
    Opened(PeerId),
    Message(RelayMessage),
    /// Handshake failure, unreachable peer or mid-session drop
    Lost(String),
    /// Orderly shutdown
    Closed,
}

impl From<LinkEvent> for RelayEvent {
    fn from(event: LinkEvent) -> Self {
        match event {
            LinkEvent::Message(msg) => RelayEvent::Message(msg),
            LinkEvent::Closed => RelayEvent::Closed,
            LinkEvent::Lost(reason) => RelayEvent::Lost(reason),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct NodeStats {
    pub ticks: u64,
    pub frames_relayed: u64,
    pub stats_relayed: u64,
    pub outgoing_popped: u64,
    pub outgoing_dropped: u64,
    pub remote_messages: u64,
    pub remote_frames_interpreted: u64,
}

/// PlexaMotion node
pub struct MotionNode {
    config: NodeConfig,
    dispatcher: ModeDispatcher,
    /// Status clock; unlike the dispatcher's it survives mode changes
    status_clock: FrameClock,
    fps: FpsMeter,
    session: Option<RelaySession>,
    environment: Environment,
    /// Outgoing relay messages
    outgoing: VecDeque<RelayMessage>,
    last_detected: bool,
    last_stats_at: Option<FrameTime>,
    stats: NodeStats,
}

impl MotionNode {
    pub fn new() -> Self {
        Self::with_config(NodeConfig::default())
    }

    pub fn with_config(config: NodeConfig) -> Self {
        let mut dispatcher = ModeDispatcher::new(
            config.engines.clone(),
            FrameClock::with_config(&config.clock),
        );
        if config.initial_mode != Mode::None {
            dispatcher.set_mode(config.initial_mode);
        }

        MotionNode {
            dispatcher,
            status_clock: FrameClock::with_config(&config.clock),
            fps: FpsMeter::new(config.clock.fps_smoothing),
            session: None,
            environment: Environment::default(),
            outgoing: VecDeque::new(),
            last_detected: false,
            last_stats_at: None,
            stats: NodeStats::default(),
            config,
        }
    }

    pub fn mode(&self) -> Mode {
        self.dispatcher.mode()
    }

    pub fn set_mode(&mut self, mode: Mode) -> Vec<OutputEvent> {
        self.dispatcher.set_mode(mode)
    }

    pub fn reset_game(&mut self) -> Vec<OutputEvent> {
        self.dispatcher.reset_game()
    }

    /// Process one tick of local estimator output
    pub fn process_frame(&mut self, bodies: &[LandmarkFrame], now: FrameTime) -> Vec<OutputEvent> {
        self.stats.ticks += 1;

        let dt = self.status_clock.tick(now);
        let fps = self.fps.record(dt);
        let detected = !bodies.is_empty();
        self.last_detected = detected;

        let mut events = match self.dispatcher.dispatch(bodies, now) {
            Dispatch::Output(events) => events,
            Dispatch::Idle | Dispatch::Forward => Vec::new(),
        };

        // A due snapshot is queued ahead of the landmarks
        self.maybe_send_stats(now);
        // A sensor forwards every tick regardless of local interpretation
        if !bodies.is_empty() && self.enqueue("landmarks", |session, _| session.relay_frame(bodies)) {
            self.stats.frames_relayed += 1;
        }

        events.push(OutputEvent::Status { detected, fps });
        events
    }

    // ------------------------------------------------------------------
    // Relay
    // ------------------------------------------------------------------

    /// Take ownership of a fresh session and start it
    pub fn attach_session(&mut self, mut session: RelaySession) -> Vec<OutputEvent> {
        if let Err(e) = session.begin() {
            warn!(error = %e, "attached session could not start");
        }
        self.outgoing.clear();
        self.last_stats_at = None;
        self.session = Some(session);
        self.session_event().into_iter().collect()
    }

    /// Drop the session without notifying anyone
    pub fn detach_session(&mut self) -> Option<RelaySession> {
        self.outgoing.clear();
        self.session.take()
    }

    pub fn session(&self) -> Option<&RelaySession> {
        self.session.as_ref()
    }

    /// Apply a transport observation to the session
    pub fn on_relay_event(&mut self, event: RelayEvent, now: FrameTime) -> Vec<OutputEvent> {
        let Some(session) = self.session.as_mut() else {
            debug!("relay event without a session");
            return Vec::new();
        };

        match event {
            RelayEvent::Opened(peer) => match session.open(peer) {
                Ok(()) => {
                    // First snapshot goes out with the next tick
                    self.last_stats_at = None;
                    self.session_event().into_iter().collect()
                }
                Err(e) => {
                    warn!(error = %e, "relay open refused");
                    Vec::new()
                }
            },
            RelayEvent::Message(msg) => self.republish(msg, now),
            RelayEvent::Lost(reason) => {
                if session.fail(reason).is_err() {
                    return Vec::new();
                }
                self.outgoing.clear();
                self.session_event().into_iter().collect()
            }
            RelayEvent::Closed => {
                if session.state().is_terminal() {
                    return Vec::new();
                }
                session.close();
                self.outgoing.clear();
                self.session_event().into_iter().collect()
            }
        }
    }

    fn republish(&mut self, msg: RelayMessage, now: FrameTime) -> Vec<OutputEvent> {
        let Some(session) = self.session.as_mut() else {
            return Vec::new();
        };

        let msg = match session.receive(msg) {
            Ok(msg) => msg,
            Err(e) => {
                warn!(error = %e, "dropping relay message");
                return Vec::new();
            }
        };
        self.stats.remote_messages += 1;

        match msg {
            RelayMessage::Stats(stats) => vec![OutputEvent::RemoteStatus(RemoteStatus::from(stats))],
            RelayMessage::Landmarks(batch) => {
                let interpret = self.config.relay.interpret_remote && self.dispatcher.mode().interprets();
                let engine_events = if interpret {
                    match self.dispatcher.dispatch(&batch.bodies, now) {
                        Dispatch::Output(events) => {
                            self.stats.remote_frames_interpreted += 1;
                            events
                        }
                        Dispatch::Idle | Dispatch::Forward => Vec::new(),
                    }
                } else {
                    Vec::new()
                };

                let mut events = vec![OutputEvent::RemoteSkeleton {
                    bodies: batch.bodies,
                }];
                events.extend(engine_events);
                events
            }
        }
    }

    /// Update the sensor environment and push a fresh snapshot right away
    pub fn update_environment(&mut self, environment: Environment, now: FrameTime) {
        self.environment = environment;
        self.send_stats(now);
    }

    fn maybe_send_stats(&mut self, now: FrameTime) {
        let due = match self.last_stats_at {
            None => true,
            Some(last) => now - last >= self.config.relay.stats_interval(),
        };
        if due {
            self.send_stats(now);
        }
    }

    /// A snapshot that could not be queued stays due
    fn send_stats(&mut self, now: FrameTime) {
        let detected = self.last_detected;
        if self.enqueue("stats", |session, env| session.relay_stats(detected, env)) {
            self.stats.stats_relayed += 1;
            self.last_stats_at = Some(now);
        }
    }

    /// Build and queue one message for an open sensor session.
    /// Nothing is built, and nothing is counted as sent, while the queue is full.
    fn enqueue<F>(&mut self, kind: &'static str, build: F) -> bool
    where
        F: FnOnce(&mut RelaySession, &Environment) -> Option<RelayMessage>,
    {
        let Some(session) = self.session.as_mut() else {
            return false;
        };
        if !session.can_send() {
            return false;
        }
        if self.outgoing.len() >= self.config.max_outgoing_buffer {
            self.stats.outgoing_dropped += 1;
            warn!(kind, queued = self.outgoing.len(), "outgoing relay queue full");
            return false;
        }
        match build(session, &self.environment) {
            Some(msg) => {
                self.outgoing.push_back(msg);
                true
            }
            None => false,
        }
    }

    /// Get next outgoing relay message (if any)
    pub fn pop_outgoing(&mut self) -> Option<RelayMessage> {
        let msg = self.outgoing.pop_front();
        if msg.is_some() {
            self.stats.outgoing_popped += 1;
        }
        msg
    }

    pub fn outgoing_len(&self) -> usize {
        self.outgoing.len()
    }

    fn session_event(&self) -> Option<OutputEvent> {
        let session = self.session.as_ref()?;
        if session.state() != SessionState::Idle {
            info!(
                role = session.role().as_str(),
                state = session.state().as_str(),
                "relay session state"
            );
        }
        Some(OutputEvent::Session {
            role: session.role(),
            state: session.state(),
            code: session.session_code().cloned(),
            reason: session.failure().map(str::to_string),
        })
    }

    pub fn role(&self) -> Option<Role> {
        self.session.as_ref().map(|s| s.role())
    }

    pub fn stats(&self) -> &NodeStats {
        &self.stats
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }
}

impl Default for MotionNode {
    fn default() -> Self {
        Self::new()
    }
}

//! Host/Sensor node pair joined by a simulated link

use std::time::Duration;

use rand::rngs::StdRng;
use rand::SeedableRng;

use plexa_core::{FrameTime, LandmarkFrame, PlexaResult};
use plexa_relay::{Environment, RelaySession, SessionState};
use plexa_runtime::{Mode, MotionNode, NodeConfig, OutputEvent, RelayEvent};

use crate::simulator::{LinkConditions, SimulatedLink};

/// Two motion nodes, a Sensor streaming to a Host
pub struct RelayPair {
    pub host: MotionNode,
    pub sensor: MotionNode,
    link: SimulatedLink,
    rng: StdRng,
    now: FrameTime,
    host_events: Vec<OutputEvent>,
    sensor_events: Vec<OutputEvent>,
}

impl RelayPair {
    /// Both sessions attached and open, the host running `host_mode`
    pub fn connected(config: NodeConfig, host_mode: Mode, conditions: LinkConditions, seed: u64) -> Self {
        let mut host = MotionNode::with_config(config.clone());
        let mut sensor = MotionNode::with_config(config);
        host.set_mode(host_mode);
        sensor.set_mode(Mode::SensorRelay);

        let mut pair = RelayPair {
            host,
            sensor,
            link: SimulatedLink::new(conditions, seed),
            rng: StdRng::seed_from_u64(seed),
            now: FrameTime::ZERO,
            host_events: Vec::new(),
            sensor_events: Vec::new(),
        };

        let host_session = RelaySession::host(&mut pair.rng);
        let code = host_session.local_id().clone();
        let sensor_session = RelaySession::sensor(&mut pair.rng, code);
        pair.attach(host_session, sensor_session);
        pair
    }

    /// Default config over a zero-latency link
    pub fn instant(host_mode: Mode) -> Self {
        Self::connected(NodeConfig::default(), host_mode, LinkConditions::instant(), 0)
    }

    fn attach(&mut self, host_session: RelaySession, sensor_session: RelaySession) {
        let code = host_session.local_id().clone();
        let sensor_id = sensor_session.local_id().clone();

        let events = self.host.attach_session(host_session);
        self.host_events.extend(events);
        let events = self.sensor.attach_session(sensor_session);
        self.sensor_events.extend(events);

        let events = self.host.on_relay_event(RelayEvent::Opened(sensor_id), self.now);
        self.host_events.extend(events);
        let events = self.sensor.on_relay_event(RelayEvent::Opened(code), self.now);
        self.sensor_events.extend(events);
    }

    /// Advance time by `dt`, feed one estimator frame to the sensor, and
    /// deliver whatever the link releases to the host
    pub fn tick(&mut self, bodies: &[LandmarkFrame], dt: Duration) -> PlexaResult<()> {
        self.now = self.now + dt;

        let events = self.sensor.process_frame(bodies, self.now);
        self.sensor_events.extend(events);
        self.flush()
    }

    /// Let the link drain without new frames
    pub fn settle(&mut self, dt: Duration) -> PlexaResult<()> {
        self.now = self.now + dt;
        self.flush()
    }

    fn flush(&mut self) -> PlexaResult<()> {
        while let Some(msg) = self.sensor.pop_outgoing() {
            if let Err(e) = self.link.send(&msg, self.now) {
                let events = self.sensor.on_relay_event(RelayEvent::Lost(e.to_string()), self.now);
                self.sensor_events.extend(events);
                return Ok(());
            }
        }

        for msg in self.link.deliver(self.now)? {
            let events = self.host.on_relay_event(RelayEvent::Message(msg), self.now);
            self.host_events.extend(events);
        }
        Ok(())
    }

    pub fn update_environment(&mut self, environment: Environment) -> PlexaResult<()> {
        self.sensor.update_environment(environment, self.now);
        self.flush()
    }

    /// Sever the link; both sides observe the loss
    pub fn cut(&mut self, reason: &str) {
        self.link.cut();
        let events = self.host.on_relay_event(RelayEvent::Lost(reason.to_string()), self.now);
        self.host_events.extend(events);
        let events = self.sensor.on_relay_event(RelayEvent::Lost(reason.to_string()), self.now);
        self.sensor_events.extend(events);
    }

    /// Explicit reconnect: fresh sessions from the failed ones, new link
    pub fn retry(&mut self) -> PlexaResult<()> {
        let Some(old_host) = self.host.detach_session() else {
            return Ok(());
        };
        self.sensor.detach_session();

        let host_session = old_host.retry(&mut self.rng)?;
        // The host shows a new code and the user types it into the sensor
        let code = host_session.local_id().clone();
        let sensor_session = RelaySession::sensor(&mut self.rng, code);

        self.link.restore();
        self.attach(host_session, sensor_session);
        Ok(())
    }

    pub fn host_state(&self) -> Option<SessionState> {
        self.host.session().map(|s| s.state())
    }

    pub fn sensor_state(&self) -> Option<SessionState> {
        self.sensor.session().map(|s| s.state())
    }

    /// Events the host produced since the last call
    pub fn take_host_events(&mut self) -> Vec<OutputEvent> {
        std::mem::take(&mut self.host_events)
    }

    pub fn take_sensor_events(&mut self) -> Vec<OutputEvent> {
        std::mem::take(&mut self.sensor_events)
    }

    pub fn link(&self) -> &SimulatedLink {
        &self.link
    }

    pub fn now(&self) -> FrameTime {
        self.now
    }
}

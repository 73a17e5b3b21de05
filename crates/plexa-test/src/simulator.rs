//! In-memory relay link for deterministic Host/Sensor testing
//!
//! Messages go through the real framing codec, so a simulated run exercises
//! the same bytes a TCP link would carry. Delivery is strictly in send
//! order: jitter can delay a message but never lets it overtake an earlier
//! one, matching a stream transport.

use std::collections::VecDeque;
use std::time::Duration;

use bytes::BytesMut;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use plexa_core::{FrameTime, PlexaError, PlexaResult};
use plexa_relay::{FrameCodec, RelayMessage, DEFAULT_MAX_FRAME_LEN};

/// Link conditions
#[derive(Clone, Debug)]
pub struct LinkConditions {
    /// Base one-way latency
    pub latency: Duration,
    /// Extra random delay, uniform in `[0, jitter]`
    pub jitter: Duration,
}

impl LinkConditions {
    /// Zero latency
    pub fn instant() -> Self {
        LinkConditions {
            latency: Duration::ZERO,
            jitter: Duration::ZERO,
        }
    }

    /// Home Wi-Fi
    pub fn lan() -> Self {
        LinkConditions {
            latency: Duration::from_millis(5),
            jitter: Duration::from_millis(3),
        }
    }

    /// Congested mobile uplink
    pub fn mobile() -> Self {
        LinkConditions {
            latency: Duration::from_millis(60),
            jitter: Duration::from_millis(40),
        }
    }
}

impl Default for LinkConditions {
    fn default() -> Self {
        Self::lan()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LinkCounters {
    pub sent: u64,
    pub delivered: u64,
    /// Sent after the cut, or in flight when it happened
    pub lost: u64,
    pub bytes: u64,
}

/// One direction of a simulated relay connection
pub struct SimulatedLink {
    conditions: LinkConditions,
    codec: FrameCodec,
    rng: StdRng,
    /// Encoded frames with their delivery deadline, in send order
    in_flight: VecDeque<(FrameTime, BytesMut)>,
    last_due: FrameTime,
    cut: bool,
    counters: LinkCounters,
}

impl SimulatedLink {
    pub fn new(conditions: LinkConditions, seed: u64) -> Self {
        SimulatedLink {
            conditions,
            codec: FrameCodec::new(DEFAULT_MAX_FRAME_LEN),
            rng: StdRng::seed_from_u64(seed),
            in_flight: VecDeque::new(),
            last_due: FrameTime::ZERO,
            cut: false,
            counters: LinkCounters::default(),
        }
    }

    pub fn instant() -> Self {
        Self::new(LinkConditions::instant(), 0)
    }

    /// Queue a message sent at `now`
    pub fn send(&mut self, msg: &RelayMessage, now: FrameTime) -> PlexaResult<()> {
        self.counters.sent += 1;
        if self.cut {
            self.counters.lost += 1;
            return Err(PlexaError::ConnectionLost);
        }

        let bytes = self.codec.encode_message(msg)?;
        self.counters.bytes += bytes.len() as u64;

        let jitter_us = self.conditions.jitter.as_micros() as u64;
        let jitter = match jitter_us {
            0 => Duration::ZERO,
            max => Duration::from_micros(self.rng.gen_range(0..=max)),
        };
        let due = (now + self.conditions.latency + jitter).max(self.last_due);
        self.last_due = due;

        self.in_flight.push_back((due, BytesMut::from(&bytes[..])));
        Ok(())
    }

    /// Decode every message due by `now`, oldest first
    pub fn deliver(&mut self, now: FrameTime) -> PlexaResult<Vec<RelayMessage>> {
        let mut delivered = Vec::new();
        while let Some((due, _)) = self.in_flight.front() {
            if *due > now {
                break;
            }
            let Some((_, mut buf)) = self.in_flight.pop_front() else {
                break;
            };
            let frame = self
                .codec
                .decode(&mut buf)?
                .ok_or_else(|| PlexaError::Codec("truncated frame in flight".to_string()))?;
            let msg = frame
                .into_message()
                .ok_or_else(|| PlexaError::UnexpectedFrame("handshake".to_string()))?;
            self.counters.delivered += 1;
            delivered.push(msg);
        }
        Ok(delivered)
    }

    /// Sever the link. Everything in flight is lost.
    pub fn cut(&mut self) {
        self.cut = true;
        self.counters.lost += self.in_flight.len() as u64;
        self.in_flight.clear();
    }

    /// Fresh connection over the same conditions
    pub fn restore(&mut self) {
        self.cut = false;
        self.last_due = FrameTime::ZERO;
    }

    pub fn is_cut(&self) -> bool {
        self.cut
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    pub fn counters(&self) -> &LinkCounters {
        &self.counters
    }
}

//! End-to-end relay scenarios
//!
//! A sensor streams synthetic movement to a host over a simulated link and
//! the host interprets it with its own engine:
//! - Remote squat counting under different link conditions
//! - Status snapshots interleaved with landmark batches
//! - Link loss and explicit reconnect

use std::time::Duration;

use plexa_core::{LandmarkFrame, PlexaResult, PoseSketch};
use plexa_relay::SessionState;
use plexa_runtime::{Mode, NodeConfig, OutputEvent};

use crate::harness::RelayPair;
use crate::simulator::{LinkConditions, LinkCounters};

/// Roughly 30 fps
pub const FRAME_INTERVAL: Duration = Duration::from_millis(33);

// ============================================================================
// MOVEMENT SCRIPTS
// ============================================================================

/// Knee angles for `reps` squats, each phase held for `dwell` frames
pub fn squat_script(reps: u32, dwell: usize) -> Vec<f32> {
    let mut angles = vec![170.0; dwell];
    for _ in 0..reps {
        angles.extend(std::iter::repeat(100.0).take(dwell));
        angles.extend(std::iter::repeat(170.0).take(dwell));
    }
    angles
}

fn frames_for(angles: &[f32]) -> Vec<Vec<LandmarkFrame>> {
    angles
        .iter()
        .map(|angle| vec![PoseSketch::new().knees(*angle).build()])
        .collect()
}

// ============================================================================
// SCENARIOS
// ============================================================================

/// What the host saw during a scenario
#[derive(Debug, Clone, Default)]
pub struct ScenarioReport {
    /// Last squat count the host reported
    pub host_reps: u32,
    pub remote_statuses: usize,
    pub remote_skeletons: usize,
    pub link: LinkCounters,
    pub host_state: Option<SessionState>,
    pub sensor_state: Option<SessionState>,
}

impl ScenarioReport {
    fn absorb(&mut self, events: &[OutputEvent]) {
        for event in events {
            match event {
                OutputEvent::Squat(report) => self.host_reps = report.rep_count,
                OutputEvent::RemoteStatus(_) => self.remote_statuses += 1,
                OutputEvent::RemoteSkeleton { .. } => self.remote_skeletons += 1,
                _ => {}
            }
        }
    }
}

/// Stream a squat session from sensor to a fitness-mode host
pub fn remote_squat_scenario(
    reps: u32,
    conditions: LinkConditions,
    seed: u64,
) -> PlexaResult<ScenarioReport> {
    let mut pair = RelayPair::connected(NodeConfig::default(), Mode::Fitness, conditions, seed);
    let mut report = ScenarioReport::default();

    for bodies in frames_for(&squat_script(reps, 5)) {
        pair.tick(&bodies, FRAME_INTERVAL)?;
        report.absorb(&pair.take_host_events());
    }
    pair.settle(Duration::from_secs(1))?;
    report.absorb(&pair.take_host_events());

    report.link = pair.link().counters().clone();
    report.host_state = pair.host_state();
    report.sensor_state = pair.sensor_state();
    Ok(report)
}

/// Cut the link halfway through, reconnect, finish the set
///
/// Reps counted before the cut are kept by the host; the new session
/// resumes counting on the same engine.
pub fn cut_and_retry_scenario(reps_before: u32, reps_after: u32) -> PlexaResult<(ScenarioReport, ScenarioReport)> {
    let mut pair = RelayPair::instant(Mode::Fitness);
    let mut before = ScenarioReport::default();

    for bodies in frames_for(&squat_script(reps_before, 3)) {
        pair.tick(&bodies, FRAME_INTERVAL)?;
        before.absorb(&pair.take_host_events());
    }
    pair.cut("wifi dropped");
    before.link = pair.link().counters().clone();
    before.host_state = pair.host_state();
    before.sensor_state = pair.sensor_state();

    // Frames while disconnected reach nobody
    for bodies in frames_for(&squat_script(1, 3)) {
        pair.tick(&bodies, FRAME_INTERVAL)?;
    }

    pair.retry()?;
    let mut after = ScenarioReport::default();
    for bodies in frames_for(&squat_script(reps_after, 3)) {
        pair.tick(&bodies, FRAME_INTERVAL)?;
        after.absorb(&pair.take_host_events());
    }
    after.link = pair.link().counters().clone();
    after.host_state = pair.host_state();
    after.sensor_state = pair.sensor_state();

    Ok((before, after))
}

//! Mode dispatcher
//!
//! Exactly one engine is live at a time. Switching modes drops the previous
//! engine and builds the new one from configuration defaults, so nothing
//! leaks across modes. The frame clock restarts with every switch: the first
//! tick in a new mode always sees a zero delta.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::info;

use plexa_core::{FrameTime, LandmarkFrame, PlexaError, NOSE};
use plexa_motion::{Carousel, GameSimulator, SquatCounter, SwipeDetector, YogaTimer};
use plexa_time::FrameClock;

use crate::{Cue, EngineConfig, OutputEvent};

pub const CUE_FITNESS: &str = "Fitness Mode Activated. Get ready.";
pub const CUE_YOGA: &str = "Yoga Mode. Assume Warrior Two pose.";
pub const CUE_GAME: &str = "Game Mode Activated.";
pub const CUE_GESTURE: &str = "Gesture Control Active.";
pub const CUE_NAMASTE: &str = "Perfect. Namaste.";
pub const CUE_SWIPE: &str = "Swipe";
pub const CUE_RESTART: &str = "Restarting";

/// Operating mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// No engine; frames are ignored
    #[default]
    None,
    Fitness,
    Yoga,
    Game,
    Gesture,
    /// Frames go to the relay without local interpretation
    SensorRelay,
}

impl Mode {
    pub const ALL: [Mode; 6] = [
        Mode::None,
        Mode::Fitness,
        Mode::Yoga,
        Mode::Game,
        Mode::Gesture,
        Mode::SensorRelay,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::None => "none",
            Mode::Fitness => "fitness",
            Mode::Yoga => "yoga",
            Mode::Game => "game",
            Mode::Gesture => "gesture",
            Mode::SensorRelay => "sensor_relay",
        }
    }

    /// Whether frames in this mode reach a local engine
    pub fn interprets(&self) -> bool {
        !matches!(self, Mode::None | Mode::SensorRelay)
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = PlexaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('-', "_");
        Mode::ALL
            .into_iter()
            .find(|mode| mode.as_str() == wanted)
            .ok_or_else(|| PlexaError::Config(format!("unknown mode {:?}", s)))
    }
}

/// The live engine and its state
#[derive(Debug)]
pub enum EngineState {
    Idle,
    Fitness(SquatCounter),
    Yoga(YogaTimer),
    Game(GameSimulator),
    Gesture {
        detector: SwipeDetector,
        carousel: Carousel,
    },
    Relay,
}

impl EngineState {
    /// Fresh start-of-session state for `mode`
    pub fn for_mode(mode: Mode, config: &EngineConfig) -> Self {
        match mode {
            Mode::None => EngineState::Idle,
            Mode::Fitness => EngineState::Fitness(SquatCounter::with_config(config.squat.clone())),
            Mode::Yoga => EngineState::Yoga(YogaTimer::with_config(config.yoga.clone())),
            Mode::Game => EngineState::Game(GameSimulator::with_config(config.game.clone())),
            Mode::Gesture => EngineState::Gesture {
                detector: SwipeDetector::with_config(config.gesture.clone()),
                carousel: Carousel::new(config.gallery_len),
            },
            Mode::SensorRelay => EngineState::Relay,
        }
    }
}

/// What a dispatched frame turned into
#[derive(Debug, Clone, PartialEq)]
pub enum Dispatch {
    /// No active engine
    Idle,
    /// Engine outputs, possibly empty
    Output(Vec<OutputEvent>),
    /// Frame belongs to the relay
    Forward,
}

/// Routes each frame to the active engine
#[derive(Debug)]
pub struct ModeDispatcher {
    config: EngineConfig,
    mode: Mode,
    engine: EngineState,
    clock: FrameClock,
}

impl ModeDispatcher {
    pub fn new(config: EngineConfig, clock: FrameClock) -> Self {
        ModeDispatcher {
            config,
            mode: Mode::None,
            engine: EngineState::Idle,
            clock,
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn engine(&self) -> &EngineState {
        &self.engine
    }

    /// Discard the current engine and start `mode` from scratch
    ///
    /// Reselecting the current mode restarts it as well.
    pub fn set_mode(&mut self, mode: Mode) -> Vec<OutputEvent> {
        info!(from = self.mode.as_str(), to = mode.as_str(), "mode change");

        self.mode = mode;
        self.engine = EngineState::for_mode(mode, &self.config);
        self.clock.reset();

        let mut events = vec![OutputEvent::Mode { mode }];
        let announcement = match mode {
            Mode::Fitness => Some(CUE_FITNESS),
            Mode::Yoga => Some(CUE_YOGA),
            Mode::Game => Some(CUE_GAME),
            Mode::Gesture => Some(CUE_GESTURE),
            Mode::None | Mode::SensorRelay => None,
        };
        if let Some(text) = announcement {
            events.push(OutputEvent::speak(text));
        }
        events
    }

    /// Restart the game in place. Outside game mode this does nothing.
    pub fn reset_game(&mut self) -> Vec<OutputEvent> {
        match &mut self.engine {
            EngineState::Game(game) => {
                game.reset();
                vec![OutputEvent::speak(CUE_RESTART), OutputEvent::Game(game.snapshot())]
            }
            _ => Vec::new(),
        }
    }

    /// Route one tick's bodies to the active engine. Only the first body
    /// drives an engine.
    pub fn dispatch(&mut self, bodies: &[LandmarkFrame], now: FrameTime) -> Dispatch {
        let dt = self.clock.tick(now);
        let body = bodies.first();

        match &mut self.engine {
            EngineState::Idle => Dispatch::Idle,
            EngineState::Relay => Dispatch::Forward,

            EngineState::Fitness(counter) => match body {
                Some(frame) => Dispatch::Output(vec![OutputEvent::Squat(counter.advance(frame))]),
                None => Dispatch::Output(Vec::new()),
            },

            EngineState::Yoga(timer) => {
                let Some(frame) = body else {
                    return Dispatch::Output(Vec::new());
                };
                let report = timer.advance(frame, dt);
                let mut events = Vec::with_capacity(3);
                if report.entered_pose {
                    events.push(OutputEvent::cue(Cue::Success));
                }
                if report.announce_completion {
                    events.push(OutputEvent::speak(CUE_NAMASTE));
                }
                events.push(OutputEvent::Yoga(report));
                Dispatch::Output(events)
            }

            EngineState::Game(game) => {
                if game.is_over() {
                    return Dispatch::Output(Vec::new());
                }
                let input = body.map(|frame| frame.landmark(NOSE).x);
                let snapshot = game.step(input);
                let mut events = Vec::with_capacity(2);
                if snapshot.just_ended {
                    events.push(OutputEvent::speak(format!(
                        "Game Over. Final Score {}",
                        snapshot.score
                    )));
                }
                events.push(OutputEvent::Game(snapshot));
                Dispatch::Output(events)
            }

            EngineState::Gesture { detector, carousel } => {
                let Some(frame) = body else {
                    return Dispatch::Output(Vec::new());
                };
                let Some(direction) = detector.advance(frame, now) else {
                    return Dispatch::Output(Vec::new());
                };
                let selection = carousel.step(direction);
                let mut events = vec![OutputEvent::Gesture {
                    direction,
                    selection,
                }];
                if selection.is_some() {
                    events.push(OutputEvent::speak(CUE_SWIPE));
                }
                Dispatch::Output(events)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plexa_core::PoseSketch;
    use plexa_motion::{GameConfig, HoldDisplay, SwipeDirection};
    use proptest::prelude::*;

    fn dispatcher() -> ModeDispatcher {
        let config = EngineConfig {
            game: GameConfig {
                seed: Some(1),
                ..GameConfig::default()
            },
            ..EngineConfig::default()
        };
        ModeDispatcher::new(config, FrameClock::new())
    }

    fn ms(millis: u64) -> FrameTime {
        FrameTime::from_millis(millis)
    }

    fn outputs(dispatch: Dispatch) -> Vec<OutputEvent> {
        match dispatch {
            Dispatch::Output(events) => events,
            other => panic!("expected output, got {:?}", other),
        }
    }

    #[test]
    fn test_mode_parse() {
        assert_eq!("Fitness".parse::<Mode>().unwrap(), Mode::Fitness);
        assert_eq!("sensor-relay".parse::<Mode>().unwrap(), Mode::SensorRelay);
        assert!("dance".parse::<Mode>().is_err());
    }

    #[test]
    fn test_idle_and_relay_modes() {
        let mut d = dispatcher();
        let body = [PoseSketch::new().build()];
        assert_eq!(d.dispatch(&body, ms(0)), Dispatch::Idle);

        d.set_mode(Mode::SensorRelay);
        assert_eq!(d.dispatch(&body, ms(16)), Dispatch::Forward);
    }

    #[test]
    fn test_fitness_routes_first_body() {
        let mut d = dispatcher();
        let events = d.set_mode(Mode::Fitness);
        assert_eq!(events[0], OutputEvent::Mode { mode: Mode::Fitness });
        assert_eq!(events[1], OutputEvent::speak(CUE_FITNESS));

        let mut reps = 0;
        for (i, angle) in [170.0, 100.0, 170.0].into_iter().enumerate() {
            let bodies = [PoseSketch::new().knees(angle).build()];
            for event in outputs(d.dispatch(&bodies, ms(i as u64 * 33))) {
                if let OutputEvent::Squat(report) = event {
                    reps = report.rep_count;
                }
            }
        }
        assert_eq!(reps, 1);

        // No body: nothing to report
        assert!(outputs(d.dispatch(&[], ms(200))).is_empty());
    }

    #[test]
    fn test_mode_switch_discards_state() {
        let mut d = dispatcher();
        d.set_mode(Mode::Fitness);
        d.dispatch(&[PoseSketch::new().knees(100.0).build()], ms(0));

        d.set_mode(Mode::Game);
        d.set_mode(Mode::Fitness);

        let events = outputs(d.dispatch(&[PoseSketch::new().knees(170.0).build()], ms(50)));
        match &events[0] {
            OutputEvent::Squat(report) => assert_eq!(report.rep_count, 0),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_yoga_first_tick_has_zero_dt() {
        let mut d = dispatcher();
        d.set_mode(Mode::Yoga);
        let warrior = [PoseSketch::new().right_knee(120.0).left_knee(175.0).elbows(175.0).build()];

        // A huge timestamp on the first tick must not count as hold time
        let events = outputs(d.dispatch(&warrior, ms(1_000_000)));
        assert_eq!(events[0], OutputEvent::cue(Cue::Success));
        match &events[1] {
            OutputEvent::Yoga(report) => {
                assert_eq!(report.hold_seconds, 0.0);
                assert_eq!(report.display, HoldDisplay::Remaining(10));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_yoga_completion_cue_once() {
        let mut d = dispatcher();
        d.set_mode(Mode::Yoga);
        let warrior = [PoseSketch::new().right_knee(120.0).left_knee(175.0).elbows(175.0).build()];

        let mut namaste = 0;
        for i in 0..400u64 {
            for event in outputs(d.dispatch(&warrior, ms(i * 50))) {
                if event == OutputEvent::speak(CUE_NAMASTE) {
                    namaste += 1;
                }
            }
        }
        assert_eq!(namaste, 1);
    }

    #[test]
    fn test_game_over_cue_and_reset() {
        let mut d = dispatcher();
        d.set_mode(Mode::Game);
        if let EngineState::Game(game) = &mut d.engine {
            game.place_obstacle(330.0, 400.0);
        }

        let events = outputs(d.dispatch(&[], ms(0)));
        assert_eq!(events[0], OutputEvent::speak("Game Over. Final Score 0"));

        // Inert afterwards
        assert!(outputs(d.dispatch(&[], ms(16))).is_empty());

        let events = d.reset_game();
        assert_eq!(events[0], OutputEvent::speak(CUE_RESTART));
        match &events[1] {
            OutputEvent::Game(snapshot) => {
                assert!(!snapshot.over);
                assert_eq!(snapshot.score, 0);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_reset_game_outside_game_mode() {
        let mut d = dispatcher();
        d.set_mode(Mode::Fitness);
        assert!(d.reset_game().is_empty());
    }

    #[test]
    fn test_gesture_moves_gallery() {
        let mut d = dispatcher();
        d.set_mode(Mode::Gesture);

        let mut seen = Vec::new();
        for i in 0..15u64 {
            let x = 0.6 - 0.02 * i as f32;
            let bodies = [PoseSketch::new().right_wrist_x(x).build()];
            seen.extend(outputs(d.dispatch(&bodies, ms(i * 16))));
        }

        // Image-space motion towards smaller x is a right swipe when mirrored
        assert_eq!(
            seen,
            vec![
                OutputEvent::Gesture {
                    direction: SwipeDirection::Right,
                    selection: Some(1),
                },
                OutputEvent::speak(CUE_SWIPE),
            ]
        );
    }

    proptest! {
        #[test]
        fn prop_outputs_belong_to_active_mode(
            script in proptest::collection::vec((0usize..Mode::ALL.len(), 60.0f32..180.0, any::<bool>()), 1..60)
        ) {
            let mut d = dispatcher();
            for (i, (mode_index, knee, present)) in script.into_iter().enumerate() {
                if i % 7 == 0 {
                    d.set_mode(Mode::ALL[mode_index]);
                }
                let bodies = if present {
                    vec![PoseSketch::new().knees(knee).build()]
                } else {
                    Vec::new()
                };

                let mode = d.mode();
                match d.dispatch(&bodies, ms(i as u64 * 33)) {
                    Dispatch::Idle => prop_assert_eq!(mode, Mode::None),
                    Dispatch::Forward => prop_assert_eq!(mode, Mode::SensorRelay),
                    Dispatch::Output(events) => {
                        for event in events {
                            let owned = match &event {
                                OutputEvent::Squat(_) => mode == Mode::Fitness,
                                OutputEvent::Yoga(_) => mode == Mode::Yoga,
                                OutputEvent::Game(_) => mode == Mode::Game,
                                OutputEvent::Gesture { .. } => mode == Mode::Gesture,
                                OutputEvent::Cue { .. } => mode.interprets(),
                                _ => false,
                            };
                            prop_assert!(owned, "{:?} emitted in {}", event, mode);
                        }
                    }
                }
            }
        }
    }
}

//! Output contract consumed by rendering and audio

use serde::Serialize;

use plexa_core::{LandmarkFrame, PeerId};
use plexa_motion::{GameSnapshot, SquatReport, SwipeDirection, YogaReport};
use plexa_relay::{Role, SessionState, StatsMessage, UNKNOWN};

use crate::Mode;

pub const STATUS_DETECTED_REMOTE: &str = "DETECTED (REMOTE)";
pub const STATUS_SEARCHING_REMOTE: &str = "SEARCHING (REMOTE)";

/// Audio cue for the external speech/sound collaborator
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Cue {
    /// Short success chime
    Success,
    /// Spoken phrase
    Speak(String),
}

impl Cue {
    pub fn speak(text: impl Into<String>) -> Self {
        Cue::Speak(text.into())
    }
}

/// Status fields a Host shows for its remote sensor
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RemoteStatus {
    pub detected: bool,
    pub status: String,
    pub confidence: String,
    pub env: String,
    pub lat: String,
    pub lon: String,
}

impl From<StatsMessage> for RemoteStatus {
    fn from(stats: StatsMessage) -> Self {
        let status = if stats.detected {
            STATUS_DETECTED_REMOTE
        } else {
            STATUS_SEARCHING_REMOTE
        };
        RemoteStatus {
            detected: stats.detected,
            status: status.to_string(),
            confidence: stats.confidence,
            env: stats.env,
            lat: non_empty_or_unknown(stats.lat),
            lon: non_empty_or_unknown(stats.lon),
        }
    }
}

fn non_empty_or_unknown(value: Option<String>) -> String {
    value
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| UNKNOWN.to_string())
}

/// One event on the output contract
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum OutputEvent {
    /// Local detection state, every tick
    Status { detected: bool, fps: f32 },
    Mode { mode: Mode },
    Squat(SquatReport),
    Gesture {
        direction: SwipeDirection,
        /// Gallery position after the swipe, if a gallery is configured
        selection: Option<usize>,
    },
    Yoga(YogaReport),
    Game(GameSnapshot),
    Cue { cue: Cue },
    RemoteStatus(RemoteStatus),
    RemoteSkeleton { bodies: Vec<LandmarkFrame> },
    Session {
        role: Role,
        state: SessionState,
        code: Option<PeerId>,
        #[serde(skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
}

impl OutputEvent {
    pub fn cue(cue: Cue) -> Self {
        OutputEvent::Cue { cue }
    }

    pub fn speak(text: impl Into<String>) -> Self {
        OutputEvent::Cue {
            cue: Cue::speak(text),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            OutputEvent::Status { .. } => "status",
            OutputEvent::Mode { .. } => "mode",
            OutputEvent::Squat(_) => "squat",
            OutputEvent::Gesture { .. } => "gesture",
            OutputEvent::Yoga(_) => "yoga",
            OutputEvent::Game(_) => "game",
            OutputEvent::Cue { .. } => "cue",
            OutputEvent::RemoteStatus(_) => "remote_status",
            OutputEvent::RemoteSkeleton { .. } => "remote_skeleton",
            OutputEvent::Session { .. } => "session",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plexa_relay::Environment;

    #[test]
    fn test_remote_status_mapping() {
        let located = Environment::located("GPS ACTIVE", 1.5, -2.25);
        let status = RemoteStatus::from(StatsMessage::snapshot(true, &located));
        assert_eq!(status.status, STATUS_DETECTED_REMOTE);
        assert_eq!(status.confidence, "LIVE");
        assert_eq!(status.lat, "1.500000");

        let status = RemoteStatus::from(StatsMessage::snapshot(false, &Environment::default()));
        assert_eq!(status.status, STATUS_SEARCHING_REMOTE);
        assert_eq!(status.confidence, "--");
        assert_eq!(status.lat, "--");
        assert_eq!(status.lon, "--");
    }

    #[test]
    fn test_event_json_shape() {
        let json = serde_json::to_value(OutputEvent::speak("Swipe")).unwrap();
        assert_eq!(json["event"], "cue");
        assert_eq!(json["cue"]["speak"], "Swipe");

        let json = serde_json::to_value(OutputEvent::Status { detected: true, fps: 30.0 }).unwrap();
        assert_eq!(json["event"], "status");
        assert_eq!(json["detected"], true);

        let json = serde_json::to_value(OutputEvent::cue(Cue::Success)).unwrap();
        assert_eq!(json["cue"], "success");
    }
}

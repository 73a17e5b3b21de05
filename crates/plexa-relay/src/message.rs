//! Relay message shapes
//!
//! ```text
//! {"type":"stats","detected":bool,"conf":string,"env":string,"lat":string?,"lon":string?}
//! {"type":"landmarks","landmarks":[[{x,y,z,visibility} x 33] x bodies]}
//! ```

use serde::{Deserialize, Serialize};

use plexa_core::LandmarkFrame;

/// Confidence label while a body is tracked
pub const CONF_LIVE: &str = "LIVE";
/// Confidence label while searching
pub const CONF_NONE: &str = "--";
/// Placeholder for unknown environment fields
pub const UNKNOWN: &str = "--";

/// Message exchanged over an open relay session
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum RelayMessage {
    Stats(StatsMessage),
    Landmarks(LandmarksMessage),
}

impl RelayMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            RelayMessage::Stats(_) => "stats",
            RelayMessage::Landmarks(_) => "landmarks",
        }
    }
}

/// Sensor status snapshot
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StatsMessage {
    pub detected: bool,
    #[serde(rename = "conf")]
    pub confidence: String,
    #[serde(default)]
    pub env: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lat: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lon: Option<String>,
}

impl StatsMessage {
    /// Snapshot of the sensor's detection state and environment
    pub fn snapshot(detected: bool, environment: &Environment) -> Self {
        StatsMessage {
            detected,
            confidence: if detected { CONF_LIVE } else { CONF_NONE }.to_string(),
            env: environment.status.clone(),
            lat: environment.lat.clone(),
            lon: environment.lon.clone(),
        }
    }
}

/// Landmark batch, one frame per detected body
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LandmarksMessage {
    #[serde(rename = "landmarks")]
    pub bodies: Vec<LandmarkFrame>,
}

/// Auxiliary sensor environment (location fix and its status label)
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Environment {
    pub status: String,
    pub lat: Option<String>,
    pub lon: Option<String>,
}

impl Default for Environment {
    fn default() -> Self {
        Environment {
            status: UNKNOWN.to_string(),
            lat: None,
            lon: None,
        }
    }
}

impl Environment {
    /// Environment with a location fix, coordinates rendered to 6 decimals
    pub fn located(status: impl Into<String>, lat: f64, lon: f64) -> Self {
        Environment {
            status: status.into(),
            lat: Some(format!("{:.6}", lat)),
            lon: Some(format!("{:.6}", lon)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plexa_core::{Landmark, PoseSketch, LANDMARK_COUNT};
    use proptest::prelude::*;

    #[test]
    fn test_stats_wire_shape() {
        let msg = RelayMessage::Stats(StatsMessage::snapshot(
            true,
            &Environment::located("GPS ACTIVE", 52.52, 13.405),
        ));
        let json: serde_json::Value = serde_json::to_value(&msg).unwrap();

        assert_eq!(json["type"], "stats");
        assert_eq!(json["detected"], true);
        assert_eq!(json["conf"], "LIVE");
        assert_eq!(json["env"], "GPS ACTIVE");
        assert_eq!(json["lat"], "52.520000");
        assert_eq!(json["lon"], "13.405000");
    }

    #[test]
    fn test_stats_without_location() {
        let msg = RelayMessage::Stats(StatsMessage::snapshot(false, &Environment::default()));
        let json = serde_json::to_string(&msg).unwrap();
        assert!(!json.contains("lat"));

        let parsed: RelayMessage =
            serde_json::from_str(r#"{"type":"stats","detected":false,"conf":"--"}"#).unwrap();
        match parsed {
            RelayMessage::Stats(stats) => {
                assert_eq!(stats.confidence, CONF_NONE);
                assert!(stats.env.is_empty());
                assert!(stats.lat.is_none());
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_landmarks_wire_shape() {
        let msg = RelayMessage::Landmarks(LandmarksMessage {
            bodies: vec![PoseSketch::new().build()],
        });
        let json: serde_json::Value = serde_json::to_value(&msg).unwrap();

        assert_eq!(json["type"], "landmarks");
        assert_eq!(json["landmarks"].as_array().unwrap().len(), 1);
        assert_eq!(json["landmarks"][0].as_array().unwrap().len(), LANDMARK_COUNT);
    }

    #[test]
    fn test_short_body_rejected() {
        let points = vec![serde_json::json!({"x": 0.1, "y": 0.2, "visibility": 1.0}); 32];
        let raw = serde_json::json!({"type": "landmarks", "landmarks": [points]});
        assert!(serde_json::from_value::<RelayMessage>(raw).is_err());
    }

    fn arb_landmark() -> impl Strategy<Value = Landmark> {
        (
            0.0f32..1.0,
            0.0f32..1.0,
            proptest::option::of(-1.0f32..1.0),
            0.0f32..1.0,
        )
            .prop_map(|(x, y, z, visibility)| Landmark { x, y, z, visibility })
    }

    fn arb_frame() -> impl Strategy<Value = LandmarkFrame> {
        proptest::collection::vec(arb_landmark(), LANDMARK_COUNT)
            .prop_map(|points| LandmarkFrame::try_from(points).unwrap())
    }

    proptest! {
        #[test]
        fn prop_landmarks_round_trip(bodies in proptest::collection::vec(arb_frame(), 0..4)) {
            let msg = RelayMessage::Landmarks(LandmarksMessage { bodies });
            let json = serde_json::to_string(&msg).unwrap();
            let back: RelayMessage = serde_json::from_str(&json).unwrap();
            prop_assert_eq!(back, msg);
        }
    }
}

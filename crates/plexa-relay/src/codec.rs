//! Wire framing
//!
//! ```text
//! +----------------+------------------------------------------+
//! | Length (4)     | JSON payload (variable)                  |
//! | big-endian u32 | handshake frame or relay message         |
//! +----------------+------------------------------------------+
//! ```
//!
//! The length is validated before any payload is buffered, so an oversized
//! or corrupt prefix cannot make the reader allocate without bound.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};

use plexa_core::{PeerId, PlexaError, PlexaResult};

use crate::{LandmarksMessage, RelayMessage, StatsMessage, DEFAULT_MAX_FRAME_LEN};

/// Length prefix size
pub const LENGTH_PREFIX: usize = 4;

/// Everything that travels on a relay connection
///
/// `hello`, `welcome` and `reject` only appear during bootstrap; afterwards
/// only relay messages are exchanged until one side says `bye`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum WireFrame {
    /// Sensor asks to join the session the Host displays
    Hello {
        session: PeerId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        sensor: Option<PeerId>,
    },
    Welcome,
    Reject {
        reason: String,
    },
    Stats(StatsMessage),
    Landmarks(LandmarksMessage),
    /// Orderly close; any other end of stream is a lost connection
    Bye,
}

impl WireFrame {
    pub fn kind(&self) -> &'static str {
        match self {
            WireFrame::Hello { .. } => "hello",
            WireFrame::Welcome => "welcome",
            WireFrame::Reject { .. } => "reject",
            WireFrame::Stats(_) => "stats",
            WireFrame::Landmarks(_) => "landmarks",
            WireFrame::Bye => "bye",
        }
    }

    /// The relay payload, if this is not a handshake frame
    pub fn into_message(self) -> Option<RelayMessage> {
        match self {
            WireFrame::Stats(stats) => Some(RelayMessage::Stats(stats)),
            WireFrame::Landmarks(batch) => Some(RelayMessage::Landmarks(batch)),
            _ => None,
        }
    }
}

impl From<RelayMessage> for WireFrame {
    fn from(msg: RelayMessage) -> Self {
        match msg {
            RelayMessage::Stats(stats) => WireFrame::Stats(stats),
            RelayMessage::Landmarks(batch) => WireFrame::Landmarks(batch),
        }
    }
}

/// Length-prefixed JSON codec
#[derive(Clone, Copy, Debug)]
pub struct FrameCodec {
    max_frame_len: usize,
}

impl FrameCodec {
    pub fn new(max_frame_len: usize) -> Self {
        FrameCodec {
            max_frame_len: max_frame_len.min(u32::MAX as usize),
        }
    }

    pub fn max_frame_len(&self) -> usize {
        self.max_frame_len
    }

    /// Encode one frame
    pub fn encode(&self, frame: &WireFrame) -> PlexaResult<Bytes> {
        self.encode_json(frame)
    }

    /// Encode a relay message; same bytes as its [`WireFrame`] form
    pub fn encode_message(&self, msg: &RelayMessage) -> PlexaResult<Bytes> {
        self.encode_json(msg)
    }

    fn encode_json<T: Serialize>(&self, value: &T) -> PlexaResult<Bytes> {
        let json = serde_json::to_vec(value).map_err(|e| PlexaError::Codec(e.to_string()))?;

        if json.len() > self.max_frame_len {
            return Err(PlexaError::FrameTooLarge {
                size: json.len(),
                limit: self.max_frame_len,
            });
        }

        let mut buf = BytesMut::with_capacity(LENGTH_PREFIX + json.len());
        buf.put_u32(json.len() as u32);
        buf.put_slice(&json);
        Ok(buf.freeze())
    }

    /// Try to decode the next frame from the front of `buf`
    ///
    /// Returns `Ok(None)` until a complete frame is buffered. A frame whose
    /// JSON is invalid is consumed before the error is returned, so the
    /// caller may skip it and keep reading. `FrameTooLarge` leaves the
    /// buffer untouched; the stream cannot be resynchronized after it.
    pub fn decode(&self, buf: &mut BytesMut) -> PlexaResult<Option<WireFrame>> {
        if buf.len() < LENGTH_PREFIX {
            return Ok(None);
        }

        let len = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]) as usize;
        if len > self.max_frame_len {
            return Err(PlexaError::FrameTooLarge {
                size: len,
                limit: self.max_frame_len,
            });
        }

        if buf.len() < LENGTH_PREFIX + len {
            buf.reserve(LENGTH_PREFIX + len - buf.len());
            return Ok(None);
        }

        buf.advance(LENGTH_PREFIX);
        let payload = buf.split_to(len);

        serde_json::from_slice(&payload)
            .map(Some)
            .map_err(|e| PlexaError::Codec(e.to_string()))
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FRAME_LEN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plexa_core::PoseSketch;

    fn hello() -> WireFrame {
        WireFrame::Hello {
            session: PeerId::parse("4821").unwrap(),
            sensor: None,
        }
    }

    #[test]
    fn test_encode_layout() {
        let codec = FrameCodec::default();
        let bytes = codec.encode(&WireFrame::Welcome).unwrap();

        let body = br#"{"type":"welcome"}"#;
        assert_eq!(&bytes[..4], &(body.len() as u32).to_be_bytes());
        assert_eq!(&bytes[4..], body);
    }

    #[test]
    fn test_hello_wire_shape() {
        let codec = FrameCodec::default();
        let bytes = codec.encode(&hello()).unwrap();
        assert_eq!(&bytes[4..], br#"{"type":"hello","session":"4821"}"#);
    }

    #[test]
    fn test_hello_with_invalid_id_rejected() {
        let codec = FrameCodec::default();
        for body in [
            r#"{"type":"hello","session":""}"#.to_string(),
            r#"{"type":"hello","session":"4821","sensor":"a b/c"}"#.to_string(),
            format!(r#"{{"type":"hello","session":"4821","sensor":"{}"}}"#, "x".repeat(500)),
        ] {
            let mut buf = BytesMut::new();
            buf.put_u32(body.len() as u32);
            buf.put_slice(body.as_bytes());
            assert!(matches!(codec.decode(&mut buf), Err(PlexaError::Codec(_))), "{body}");
            assert!(buf.is_empty());
        }
    }

    #[test]
    fn test_bye_wire_shape() {
        let codec = FrameCodec::default();
        let bytes = codec.encode(&WireFrame::Bye).unwrap();
        assert_eq!(&bytes[4..], br#"{"type":"bye"}"#);
        assert_eq!(WireFrame::Bye.into_message(), None);
    }

    #[test]
    fn test_partial_input_waits() {
        let codec = FrameCodec::default();
        let bytes = codec.encode(&hello()).unwrap();

        let mut buf = BytesMut::new();
        buf.extend_from_slice(&bytes[..2]);
        assert!(codec.decode(&mut buf).unwrap().is_none());

        buf.extend_from_slice(&bytes[2..bytes.len() - 1]);
        assert!(codec.decode(&mut buf).unwrap().is_none());

        buf.extend_from_slice(&bytes[bytes.len() - 1..]);
        assert_eq!(codec.decode(&mut buf).unwrap(), Some(hello()));
        assert!(buf.is_empty());
    }

    #[test]
    fn test_back_to_back_frames_keep_order() {
        let codec = FrameCodec::default();
        let stats = WireFrame::Stats(StatsMessage::snapshot(true, &Default::default()));
        let batch = WireFrame::Landmarks(LandmarksMessage {
            bodies: vec![PoseSketch::new().knees(100.0).build()],
        });

        let mut buf = BytesMut::new();
        buf.extend_from_slice(&codec.encode(&stats).unwrap());
        buf.extend_from_slice(&codec.encode(&batch).unwrap());

        assert_eq!(codec.decode(&mut buf).unwrap(), Some(stats));
        assert_eq!(codec.decode(&mut buf).unwrap(), Some(batch));
        assert_eq!(codec.decode(&mut buf).unwrap(), None);
    }

    #[test]
    fn test_oversized_prefix_rejected() {
        let codec = FrameCodec::new(64);
        let mut buf = BytesMut::new();
        buf.put_u32(65);

        match codec.decode(&mut buf) {
            Err(PlexaError::FrameTooLarge { size: 65, limit: 64 }) => {}
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_oversized_encode_rejected() {
        let codec = FrameCodec::new(16);
        let batch = WireFrame::Landmarks(LandmarksMessage {
            bodies: vec![PoseSketch::new().build()],
        });
        assert!(matches!(
            codec.encode(&batch),
            Err(PlexaError::FrameTooLarge { .. })
        ));
    }

    #[test]
    fn test_bad_json_is_skippable() {
        let codec = FrameCodec::default();
        let mut buf = BytesMut::new();
        buf.put_u32(5);
        buf.put_slice(b"{oops");
        buf.extend_from_slice(&codec.encode(&WireFrame::Welcome).unwrap());

        assert!(matches!(codec.decode(&mut buf), Err(PlexaError::Codec(_))));
        assert_eq!(codec.decode(&mut buf).unwrap(), Some(WireFrame::Welcome));
    }

    #[test]
    fn test_message_conversion() {
        let msg = RelayMessage::Stats(StatsMessage::snapshot(false, &Default::default()));
        let frame = WireFrame::from(msg.clone());
        assert_eq!(frame.kind(), "stats");
        let codec = FrameCodec::default();
        assert_eq!(
            codec.encode(&frame).unwrap(),
            codec.encode_message(&msg).unwrap()
        );
        assert_eq!(frame.into_message(), Some(msg));
        assert_eq!(WireFrame::Welcome.into_message(), None);
    }
}

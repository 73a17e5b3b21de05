//! TCP transport for relay sessions
//!
//! The Host binds a [`RelayListener`] and waits for a Sensor whose hello
//! names its session code. The Sensor dials with [`RelayLink::connect`].
//! After the handshake both sides hold a [`RelayLink`]: writes go straight
//! to the socket, reads are decoded by a background task and delivered as
//! [`LinkEvent`]s in arrival order. [`RelayLink::close`] says `bye` first;
//! a peer that disappears without it is reported as a lost connection.

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::BytesMut;
use parking_lot::Mutex;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use plexa_core::{PeerId, PlexaError, PlexaResult};

use crate::{FrameCodec, RelayConfig, RelayMessage, WireFrame};

/// Read buffer growth step
const READ_CHUNK: usize = 8 * 1024;

/// What the reader task observed
#[derive(Debug, Clone, PartialEq)]
pub enum LinkEvent {
    Message(RelayMessage),
    /// Peer said bye
    Closed,
    /// Connection dropped without bye, or the stream became undecodable
    Lost(String),
}

/// Link counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkStats {
    pub frames_in: u64,
    pub frames_out: u64,
    pub bytes_in: u64,
    pub bytes_out: u64,
    /// Undecodable or out-of-place frames skipped by the reader
    pub dropped_frames: u64,
}

fn transport_err(e: std::io::Error) -> PlexaError {
    PlexaError::Transport(e.to_string())
}

/// Read until one whole frame is buffered. `Ok(None)` on clean EOF.
async fn read_frame<R: AsyncRead + Unpin>(
    reader: &mut R,
    codec: &FrameCodec,
    buf: &mut BytesMut,
) -> PlexaResult<Option<WireFrame>> {
    loop {
        if let Some(frame) = codec.decode(buf)? {
            return Ok(Some(frame));
        }
        buf.reserve(READ_CHUNK);
        let n = reader.read_buf(buf).await.map_err(transport_err)?;
        if n == 0 {
            return if buf.is_empty() {
                Ok(None)
            } else {
                Err(PlexaError::ConnectionLost)
            };
        }
    }
}

async fn write_frame(stream: &mut TcpStream, codec: &FrameCodec, frame: &WireFrame) -> PlexaResult<()> {
    let bytes = codec.encode(frame)?;
    stream.write_all(&bytes).await.map_err(transport_err)
}

/// Host-side listener
pub struct RelayListener {
    listener: TcpListener,
    local_addr: SocketAddr,
    config: RelayConfig,
}

impl RelayListener {
    /// Bind to a local address
    pub async fn bind(addr: SocketAddr, config: RelayConfig) -> PlexaResult<Self> {
        let listener = TcpListener::bind(addr).await.map_err(transport_err)?;
        let local_addr = listener.local_addr().map_err(transport_err)?;

        Ok(RelayListener {
            listener,
            local_addr,
            config,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Wait for a sensor that names `session`
    ///
    /// Connections that time out, send garbage or name another session are
    /// rejected and dropped; listening continues until a sensor matches.
    pub async fn accept(&self, session: &PeerId) -> PlexaResult<(RelayLink, PeerId)> {
        let codec = FrameCodec::new(self.config.max_frame_len);

        loop {
            let (mut stream, addr) = self.listener.accept().await.map_err(transport_err)?;
            let mut buf = BytesMut::with_capacity(READ_CHUNK);

            let hello = match timeout(
                self.config.handshake_timeout(),
                read_frame(&mut stream, &codec, &mut buf),
            )
            .await
            {
                Err(_) => {
                    warn!(%addr, "relay handshake timed out");
                    continue;
                }
                Ok(Err(e)) => {
                    warn!(%addr, error = %e, "relay handshake failed");
                    continue;
                }
                Ok(Ok(None)) => {
                    debug!(%addr, "connection closed before hello");
                    continue;
                }
                Ok(Ok(Some(frame))) => frame,
            };

            let (requested, sensor) = match hello {
                WireFrame::Hello { session, sensor } => (session, sensor),
                other => {
                    let reason = format!("expected hello, got {}", other.kind());
                    warn!(%addr, %reason, "relay handshake rejected");
                    let _ = write_frame(&mut stream, &codec, &WireFrame::Reject { reason }).await;
                    continue;
                }
            };

            if requested != *session {
                let reason = format!("unknown session {}", requested);
                warn!(%addr, %reason, "relay handshake rejected");
                let _ = write_frame(&mut stream, &codec, &WireFrame::Reject { reason }).await;
                continue;
            }

            if let Err(e) = write_frame(&mut stream, &codec, &WireFrame::Welcome).await {
                warn!(%addr, error = %e, "failed to send welcome");
                continue;
            }

            let peer = match sensor {
                Some(id) => id,
                None => PeerId::parse(&format!("sensor-{}", addr.port()))?,
            };
            info!(%addr, %peer, %session, "relay sensor joined");

            return Ok((RelayLink::start(stream, buf, codec, &self.config)?, peer));
        }
    }
}

/// An established relay connection
pub struct RelayLink {
    writer: OwnedWriteHalf,
    events: mpsc::Receiver<LinkEvent>,
    codec: FrameCodec,
    peer_addr: SocketAddr,
    stats: Arc<Mutex<LinkStats>>,
    reader: JoinHandle<()>,
}

impl RelayLink {
    /// Dial a Host and join `session`
    pub async fn connect(
        addr: SocketAddr,
        session: &PeerId,
        sensor: &PeerId,
        config: &RelayConfig,
    ) -> PlexaResult<Self> {
        let codec = FrameCodec::new(config.max_frame_len);
        let handshake = async {
            let mut stream = TcpStream::connect(addr).await.map_err(transport_err)?;
            let hello = WireFrame::Hello {
                session: session.clone(),
                sensor: Some(sensor.clone()),
            };
            write_frame(&mut stream, &codec, &hello).await?;

            let mut buf = BytesMut::with_capacity(READ_CHUNK);
            let reply = read_frame(&mut stream, &codec, &mut buf).await?;
            Ok::<_, PlexaError>((stream, buf, reply))
        };

        let (stream, buf, reply) = timeout(config.handshake_timeout(), handshake)
            .await
            .map_err(|_| PlexaError::HandshakeTimeout)??;

        match reply {
            Some(WireFrame::Welcome) => {
                info!(%addr, %session, "relay handshake accepted");
                Self::start(stream, buf, codec, config)
            }
            Some(WireFrame::Reject { reason }) => Err(PlexaError::HandshakeRejected(reason)),
            Some(other) => Err(PlexaError::UnexpectedFrame(other.kind().to_string())),
            None => Err(PlexaError::ConnectionLost),
        }
    }

    fn start(
        stream: TcpStream,
        buf: BytesMut,
        codec: FrameCodec,
        config: &RelayConfig,
    ) -> PlexaResult<Self> {
        let peer_addr = stream.peer_addr().map_err(transport_err)?;
        let _ = stream.set_nodelay(true);
        let (read_half, writer) = stream.into_split();

        let stats = Arc::new(Mutex::new(LinkStats::default()));
        let (tx, events) = mpsc::channel(config.event_buffer.max(1));
        let reader = start_read_loop(read_half, buf, codec, tx, Arc::clone(&stats));

        Ok(RelayLink {
            writer,
            events,
            codec,
            peer_addr,
            stats,
            reader,
        })
    }

    /// Send one relay message
    pub async fn send(&mut self, msg: &RelayMessage) -> PlexaResult<()> {
        let bytes = self.codec.encode_message(msg)?;
        self.writer.write_all(&bytes).await.map_err(|e| {
            warn!(peer = %self.peer_addr, error = %e, "relay send failed");
            transport_err(e)
        })?;

        let mut stats = self.stats.lock();
        stats.frames_out += 1;
        stats.bytes_out += bytes.len() as u64;
        Ok(())
    }

    /// Next inbound event; `None` once the reader has stopped and every
    /// event was consumed
    pub async fn recv(&mut self) -> Option<LinkEvent> {
        self.events.recv().await
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    pub fn stats(&self) -> LinkStats {
        *self.stats.lock()
    }

    /// Say bye, shut down the write side and stop reading
    pub async fn close(mut self) {
        if let Ok(bytes) = self.codec.encode(&WireFrame::Bye) {
            let _ = self.writer.write_all(&bytes).await;
        }
        let _ = self.writer.shutdown().await;
        self.reader.abort();
    }
}

impl Drop for RelayLink {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

/// Decode frames in the background and forward them in arrival order
fn start_read_loop(
    mut reader: OwnedReadHalf,
    mut buf: BytesMut,
    codec: FrameCodec,
    tx: mpsc::Sender<LinkEvent>,
    stats: Arc<Mutex<LinkStats>>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match codec.decode(&mut buf) {
                Ok(Some(WireFrame::Bye)) => {
                    debug!("relay peer said bye");
                    let _ = tx.send(LinkEvent::Closed).await;
                    break;
                }
                Ok(Some(frame)) => {
                    let kind = frame.kind();
                    match frame.into_message() {
                        Some(msg) => {
                            stats.lock().frames_in += 1;
                            if tx.send(LinkEvent::Message(msg)).await.is_err() {
                                break; // Link dropped
                            }
                        }
                        None => {
                            stats.lock().dropped_frames += 1;
                            warn!(kind, "handshake frame on open relay link");
                        }
                    }
                    continue;
                }
                Ok(None) => {}
                Err(PlexaError::Codec(e)) => {
                    stats.lock().dropped_frames += 1;
                    warn!(error = %e, "dropping undecodable relay frame");
                    continue;
                }
                Err(e) => {
                    warn!(error = %e, "relay stream unrecoverable");
                    let _ = tx.send(LinkEvent::Lost(e.to_string())).await;
                    break;
                }
            }

            buf.reserve(READ_CHUNK);
            match reader.read_buf(&mut buf).await {
                Ok(0) => {
                    let reason = if buf.is_empty() {
                        "peer closed the connection without bye"
                    } else {
                        "connection closed mid-frame"
                    };
                    warn!(reason, "relay connection lost");
                    let _ = tx.send(LinkEvent::Lost(reason.to_string())).await;
                    break;
                }
                Ok(n) => stats.lock().bytes_in += n as u64,
                Err(e) => {
                    warn!(error = %e, "relay receive error");
                    let _ = tx.send(LinkEvent::Lost(e.to_string())).await;
                    break;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Environment, LandmarksMessage, StatsMessage};
    use plexa_core::PoseSketch;
    use std::time::Duration;

    fn code(s: &str) -> PeerId {
        PeerId::parse(s).unwrap()
    }

    async fn listener() -> RelayListener {
        RelayListener::bind("127.0.0.1:0".parse().unwrap(), RelayConfig::default())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_listener_bind() {
        let listener = listener().await;
        assert_ne!(listener.local_addr().port(), 0);
    }

    #[tokio::test]
    async fn test_loopback_preserves_order() {
        let listener = listener().await;
        let addr = listener.local_addr();
        let session = code("4821");

        let accept = {
            let session = session.clone();
            tokio::spawn(async move { listener.accept(&session).await })
        };

        let mut sensor = RelayLink::connect(addr, &session, &code("cafe0001"), &RelayConfig::default())
            .await
            .unwrap();
        let (mut host, peer) = accept.await.unwrap().unwrap();
        assert_eq!(peer, code("cafe0001"));

        let stats = RelayMessage::Stats(StatsMessage::snapshot(true, &Environment::default()));
        let batch = RelayMessage::Landmarks(LandmarksMessage {
            bodies: vec![PoseSketch::new().knees(100.0).build()],
        });
        sensor.send(&stats).await.unwrap();
        sensor.send(&batch).await.unwrap();

        assert_eq!(host.recv().await, Some(LinkEvent::Message(stats)));
        assert_eq!(host.recv().await, Some(LinkEvent::Message(batch)));
        assert_eq!(sensor.stats().frames_out, 2);

        sensor.close().await;
        assert_eq!(host.recv().await, Some(LinkEvent::Closed));
        assert_eq!(host.stats().frames_in, 2);
    }

    #[tokio::test]
    async fn test_wrong_code_rejected_and_listening_continues() {
        let listener = listener().await;
        let addr = listener.local_addr();

        let accept = tokio::spawn(async move { listener.accept(&code("4821")).await });

        let wrong = RelayLink::connect(addr, &code("1111"), &code("a1"), &RelayConfig::default()).await;
        assert!(matches!(wrong, Err(PlexaError::HandshakeRejected(_))));

        let right = RelayLink::connect(addr, &code("4821"), &code("a2"), &RelayConfig::default()).await;
        assert!(right.is_ok());

        let (_, peer) = accept.await.unwrap().unwrap();
        assert_eq!(peer, code("a2"));
    }

    #[tokio::test]
    async fn test_silent_host_times_out() {
        let raw = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = raw.local_addr().unwrap();
        let _hold = tokio::spawn(async move {
            let (stream, _) = raw.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
            drop(stream);
        });

        let config = RelayConfig {
            handshake_timeout_ms: 100,
            ..RelayConfig::default()
        };
        let result = RelayLink::connect(addr, &code("4821"), &code("a1"), &config).await;
        assert!(matches!(result, Err(PlexaError::HandshakeTimeout)));
    }

    #[tokio::test]
    async fn test_host_drop_is_reported() {
        let listener = listener().await;
        let addr = listener.local_addr();
        let accept = tokio::spawn(async move { listener.accept(&code("4821")).await });

        let mut sensor = RelayLink::connect(addr, &code("4821"), &code("a1"), &RelayConfig::default())
            .await
            .unwrap();
        let (host, _) = accept.await.unwrap().unwrap();
        drop(host);

        assert!(matches!(sensor.recv().await, Some(LinkEvent::Lost(_))));
    }

    #[tokio::test]
    async fn test_sensor_vanishing_mid_session_is_lost() {
        let listener = listener().await;
        let addr = listener.local_addr();
        let accept = tokio::spawn(async move { listener.accept(&code("4821")).await });

        let mut sensor = RelayLink::connect(addr, &code("4821"), &code("a1"), &RelayConfig::default())
            .await
            .unwrap();
        let (mut host, _) = accept.await.unwrap().unwrap();

        let stats = RelayMessage::Stats(StatsMessage::snapshot(true, &Environment::default()));
        sensor.send(&stats).await.unwrap();
        drop(sensor);

        assert_eq!(host.recv().await, Some(LinkEvent::Message(stats)));
        match host.recv().await {
            Some(LinkEvent::Lost(reason)) => assert!(reason.contains("without bye")),
            other => panic!("unexpected {:?}", other),
        }
    }
}

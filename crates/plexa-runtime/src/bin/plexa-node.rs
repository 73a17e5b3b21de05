//! plexa-node - drive a motion node from the command line
//!
//! # Usage
//!
//! ```bash
//! # Run the squat counter over a recording
//! plexa-node replay --input session.jsonl --mode fitness
//!
//! # Host: print a session code and republish whatever a sensor sends
//! plexa-node host --bind 0.0.0.0:7420 --mode fitness
//!
//! # Sensor: stream a recording to a host at its real pace
//! plexa-node sensor --connect 192.168.1.20:7420 --code 4821 --input session.jsonl --realtime
//!
//! # Verbose logging
//! RUST_LOG=debug plexa-node replay --input session.jsonl
//! ```
//!
//! Output events go to stdout as JSON lines, logs go to stderr.

use std::io::Write;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use plexa_core::{FrameTime, PeerId};
use plexa_relay::{Environment, RelayLink, RelayListener, RelaySession};
use plexa_runtime::{init_tracing, Mode, MotionNode, NodeConfig, OutputEvent, RelayEvent, ReplayReader};

/// PlexaMotion node
#[derive(Parser, Debug)]
#[command(name = "plexa-node")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file (JSON)
    #[arg(short = 'c', long, global = true, env = "PLEXA_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log filter when RUST_LOG is unset (trace, debug, info, warn, error)
    #[arg(short = 'l', long, global = true, env = "PLEXA_LOG_LEVEL")]
    log_level: Option<String>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a recording through a mode and print output events
    Replay {
        /// JSON-lines recording
        #[arg(short, long, value_name = "FILE")]
        input: PathBuf,

        /// Mode to run (fitness, yoga, game, gesture)
        #[arg(short, long)]
        mode: Option<Mode>,
    },

    /// Wait for a sensor and republish its data
    Host {
        #[arg(short, long, default_value = "0.0.0.0:7420")]
        bind: SocketAddr,

        /// Mode used to interpret remote frames
        #[arg(short, long)]
        mode: Option<Mode>,
    },

    /// Stream a recording to a host
    Sensor {
        /// Host address
        #[arg(long)]
        connect: SocketAddr,

        /// Session code shown by the host
        #[arg(long)]
        code: String,

        /// JSON-lines recording
        #[arg(short, long, value_name = "FILE")]
        input: PathBuf,

        /// Pace frames by their recorded timestamps
        #[arg(long)]
        realtime: bool,

        /// Latitude reported in status snapshots
        #[arg(long, requires = "lon", allow_hyphen_values = true)]
        lat: Option<f64>,

        /// Longitude reported in status snapshots
        #[arg(long, requires = "lat", allow_hyphen_values = true)]
        lon: Option<f64>,
    },
}

fn load_config(args: &Args) -> Result<NodeConfig> {
    let mut config = match &args.config {
        Some(path) => NodeConfig::from_file(path)
            .with_context(|| format!("Failed to load config: {path:?}"))?,
        None => NodeConfig::default(),
    };
    if let Some(level) = &args.log_level {
        config.logging.level = level.clone();
    }
    if args.json_logs {
        config.logging.json = true;
    }
    Ok(config)
}

/// Print events as JSON lines
fn emit(events: &[OutputEvent]) -> Result<()> {
    if events.is_empty() {
        return Ok(());
    }
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    for event in events {
        serde_json::to_writer(&mut out, event)?;
        out.write_all(b"\n")?;
    }
    out.flush()?;
    Ok(())
}

/// Local receipt time since the node started
fn since(start: Instant) -> FrameTime {
    FrameTime::from_micros(start.elapsed().as_micros() as u64)
}

fn with_mode(node: &mut MotionNode, mode: Option<Mode>) -> Result<()> {
    if let Some(mode) = mode {
        emit(&node.set_mode(mode))?;
    }
    Ok(())
}

fn run_replay(config: NodeConfig, input: PathBuf, mode: Option<Mode>) -> Result<()> {
    let mut node = MotionNode::with_config(config);
    with_mode(&mut node, mode)?;

    let reader = ReplayReader::open(&input)?;
    for record in reader {
        let record = record.with_context(|| format!("Failed to read {input:?}"))?;
        emit(&node.process_frame(&record.bodies, record.timestamp()))?;
    }

    info!(ticks = node.stats().ticks, "replay finished");
    Ok(())
}

async fn run_host(config: NodeConfig, bind: SocketAddr, mode: Option<Mode>) -> Result<()> {
    let relay_config = config.relay.clone();
    let mut node = MotionNode::with_config(config);
    with_mode(&mut node, mode)?;

    let session = RelaySession::host(&mut rand::thread_rng());
    let code = session.local_id().clone();
    emit(&node.attach_session(session))?;

    let listener = RelayListener::bind(bind, relay_config).await?;
    info!(addr = %listener.local_addr(), %code, "waiting for sensor");
    eprintln!("Session code: {code}");

    let start = Instant::now();
    let (mut link, peer) = listener.accept(&code).await?;
    emit(&node.on_relay_event(RelayEvent::Opened(peer), since(start)))?;

    while let Some(event) = link.recv().await {
        let event = RelayEvent::from(event);
        let done = matches!(event, RelayEvent::Closed | RelayEvent::Lost(_));
        emit(&node.on_relay_event(event, since(start)))?;
        if done {
            break;
        }
    }

    let stats = link.stats();
    info!(frames_in = stats.frames_in, dropped = stats.dropped_frames, "host session ended");
    Ok(())
}

async fn run_sensor(
    config: NodeConfig,
    connect: SocketAddr,
    code: String,
    input: PathBuf,
    realtime: bool,
    location: Option<(f64, f64)>,
) -> Result<()> {
    let relay_config = config.relay.clone();
    let mut node = MotionNode::with_config(config);
    node.set_mode(Mode::SensorRelay);

    let code = PeerId::parse(&code)?;
    let session = RelaySession::sensor(&mut rand::thread_rng(), code.clone());
    let local = session.local_id().clone();
    emit(&node.attach_session(session))?;

    let mut link = match RelayLink::connect(connect, &code, &local, &relay_config).await {
        Ok(link) => link,
        Err(e) => {
            emit(&node.on_relay_event(RelayEvent::Lost(e.to_string()), FrameTime::ZERO))?;
            return Err(e).context("Failed to join host");
        }
    };
    emit(&node.on_relay_event(RelayEvent::Opened(code), FrameTime::ZERO))?;

    let reader = ReplayReader::open(&input)?;
    let start = Instant::now();
    let mut first: Option<FrameTime> = None;

    for record in reader {
        let record = record.with_context(|| format!("Failed to read {input:?}"))?;
        let now = record.timestamp();
        let origin = *first.get_or_insert(now);

        if realtime {
            let due = now - origin;
            let elapsed = start.elapsed();
            if due > elapsed {
                tokio::time::sleep(due - elapsed).await;
            }
        }

        if node.stats().ticks == 0 {
            if let Some((lat, lon)) = location {
                node.update_environment(Environment::located("GPS ACTIVE", lat, lon), now);
            }
        }
        emit(&node.process_frame(&record.bodies, now))?;

        while let Some(msg) = node.pop_outgoing() {
            if let Err(e) = link.send(&msg).await {
                warn!(error = %e, "host unreachable");
                emit(&node.on_relay_event(RelayEvent::Lost(e.to_string()), now))?;
                return Err(e).context("Relay link lost");
            }
        }
    }

    let stats = link.stats();
    link.close().await;
    emit(&node.on_relay_event(RelayEvent::Closed, since(start)))?;
    info!(frames_out = stats.frames_out, bytes_out = stats.bytes_out, "sensor stream finished");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = load_config(&args)?;
    init_tracing(&config.logging)?;

    match args.command {
        Command::Replay { input, mode } => run_replay(config, input, mode),
        Command::Host { bind, mode } => run_host(config, bind, mode).await,
        Command::Sensor {
            connect,
            code,
            input,
            realtime,
            lat,
            lon,
        } => {
            let location = lat.zip(lon);
            run_sensor(config, connect, code, input, realtime, location).await
        }
    }
}

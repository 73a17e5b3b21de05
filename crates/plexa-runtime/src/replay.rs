//! Recorded frame streams
//!
//! One JSON document per line:
//!
//! ```text
//! {"t": 1034.5, "bodies": [[{"x":0.51,"y":0.14,"visibility":0.99}, ...33]]}
//! ```
//!
//! `t` is the estimator timestamp in milliseconds. Blank lines are skipped.

use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use plexa_core::{FrameTime, LandmarkFrame, PlexaError, PlexaResult};

/// One recorded tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameRecord {
    /// Milliseconds
    pub t: f64,
    #[serde(default)]
    pub bodies: Vec<LandmarkFrame>,
}

impl FrameRecord {
    pub fn new(timestamp: FrameTime, bodies: Vec<LandmarkFrame>) -> Self {
        FrameRecord {
            t: timestamp.as_micros() as f64 / 1000.0,
            bodies,
        }
    }

    pub fn timestamp(&self) -> FrameTime {
        FrameTime::from_millis_f64(self.t)
    }
}

/// Line-by-line reader over a recording
pub struct ReplayReader<R> {
    lines: std::io::Lines<R>,
    line_no: usize,
}

impl<R: BufRead> ReplayReader<R> {
    pub fn new(reader: R) -> Self {
        ReplayReader {
            lines: reader.lines(),
            line_no: 0,
        }
    }
}

impl ReplayReader<BufReader<File>> {
    pub fn open(path: impl AsRef<Path>) -> PlexaResult<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|e| PlexaError::Config(format!("{}: {}", path.display(), e)))?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: BufRead> Iterator for ReplayReader<R> {
    type Item = PlexaResult<FrameRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(e) => return Some(Err(PlexaError::Transport(e.to_string()))),
            };
            self.line_no += 1;

            if line.trim().is_empty() {
                continue;
            }

            return Some(
                serde_json::from_str(&line)
                    .map_err(|e| PlexaError::Codec(format!("line {}: {}", self.line_no, e))),
            );
        }
    }
}

/// Write records as JSON lines
pub fn write_records<W: Write>(mut out: W, records: &[FrameRecord]) -> PlexaResult<()> {
    for record in records {
        let line = serde_json::to_string(record).map_err(|e| PlexaError::Codec(e.to_string()))?;
        writeln!(out, "{}", line).map_err(|e| PlexaError::Transport(e.to_string()))?;
    }
    Ok(())
}

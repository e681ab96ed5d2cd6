//! Replay of a recorded night from a JSON-lines file.
//!
//! Each line holds one recording tick:
//!
//! ```text
//! {"bpm":63,"x":0.02,"y":-0.11,"z":9.79}
//! ```

use crate::collector::types::SensorReading;
use crate::collector::{forward, ProducerHandle, READING_CHANNEL_CAPACITY};
use crossbeam_channel::{bounded, Receiver};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// One recorded tick of heart rate and acceleration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RecordedTick {
    pub bpm: u16,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl RecordedTick {
    fn readings(&self) -> [SensorReading; 2] {
        [
            SensorReading::HeartRate { bpm: self.bpm },
            SensorReading::Acceleration {
                x: self.x,
                y: self.y,
                z: self.z,
            },
        ]
    }
}

/// Errors loading a replay file.
#[derive(Debug)]
pub enum ReplayError {
    Io(String),
    Parse { line: usize, message: String },
}

impl std::fmt::Display for ReplayError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReplayError::Io(e) => write!(f, "IO error: {e}"),
            ReplayError::Parse { line, message } => {
                write!(f, "Parse error on line {line}: {message}")
            }
        }
    }
}

impl std::error::Error for ReplayError {}

/// Parse a JSON-lines recording. Blank lines are skipped.
pub fn parse_recording(content: &str) -> Result<Vec<RecordedTick>, ReplayError> {
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            serde_json::from_str(line).map_err(|e| ReplayError::Parse {
                line: i + 1,
                message: e.to_string(),
            })
        })
        .collect()
}

/// Start a producer that replays `path`, one tick per `period`.
///
/// The channel disconnects once the recording is exhausted.
pub fn spawn_replay(
    path: &Path,
    period: Duration,
) -> Result<(ProducerHandle, Receiver<SensorReading>), ReplayError> {
    let content = std::fs::read_to_string(path).map_err(|e| ReplayError::Io(e.to_string()))?;
    let ticks = parse_recording(&content)?;
    tracing::info!(ticks = ticks.len(), path = %path.display(), "loaded recording");

    let (sender, receiver) = bounded(READING_CHANNEL_CAPACITY);
    let running = Arc::new(AtomicBool::new(true));
    let flag = running.clone();

    let thread = thread::spawn(move || {
        for tick in ticks {
            if !flag.load(Ordering::SeqCst) {
                break;
            }
            if !tick.readings().into_iter().all(|r| forward(&sender, r)) {
                break;
            }
            thread::sleep(period);
        }
        flag.store(false, Ordering::SeqCst);
    });

    Ok((ProducerHandle::new(running, thread), receiver))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_recording() {
        let ticks = parse_recording(
            "{\"bpm\":63,\"x\":0.0,\"y\":0.0,\"z\":9.8}\n\n{\"bpm\":64,\"x\":0.1,\"y\":0.0,\"z\":9.8}\n",
        )
        .unwrap();
        assert_eq!(ticks.len(), 2);
        assert_eq!(ticks[1].bpm, 64);
    }

    #[test]
    fn test_parse_error_reports_line() {
        let err = parse_recording("{\"bpm\":63,\"x\":0.0,\"y\":0.0,\"z\":9.8}\nnot json\n")
            .unwrap_err();
        assert!(matches!(err, ReplayError::Parse { line: 2, .. }));
    }

    #[test]
    fn test_replay_disconnects_when_exhausted() {
        let path = std::env::temp_dir().join(format!("replay-{}.jsonl", uuid::Uuid::new_v4()));
        std::fs::write(&path, "{\"bpm\":70,\"x\":0.0,\"y\":0.0,\"z\":1.0}\n").unwrap();

        let (_handle, receiver) = spawn_replay(&path, Duration::from_millis(1)).unwrap();
        let readings: Vec<SensorReading> = receiver.iter().collect();
        assert_eq!(readings.len(), 2);
        assert_eq!(readings[0], SensorReading::HeartRate { bpm: 70 });

        let _ = std::fs::remove_file(path);
    }
}

//! Sensor collection for the Synheart Sleep Agent.
//!
//! Sensor drivers push [`SensorReading`]s into a channel as they arrive. The
//! recording tick pulls a [`RawSample`] from a [`SensorSource`], which keeps
//! the latest value of each reading.

pub mod channel;
pub mod replay;
pub mod simulated;
pub mod types;

pub use channel::ChannelSensor;
pub use replay::{spawn_replay, RecordedTick, ReplayError};
pub use simulated::spawn_simulator;
pub use types::{squared_magnitude, RawSample, SensorReading, SensorUnavailable};

use crossbeam_channel::{SendTimeoutError, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

/// Capacity of the reading channel between producer and sensor source.
pub const READING_CHANNEL_CAPACITY: usize = 1_024;

/// How long a producer waits on a full channel before dropping a reading.
const SEND_TIMEOUT: Duration = Duration::from_millis(100);

/// Source of raw samples for the recording tick.
pub trait SensorSource {
    /// Latest combined sample, or which reading is missing.
    fn read(&mut self) -> Result<RawSample, SensorUnavailable>;

    /// Latest heart rate seen, for display.
    fn latest_heart_rate(&self) -> Option<u16>;
}

/// Handle to a background reading producer.
///
/// The producer thread stops when the handle is stopped or dropped.
pub struct ProducerHandle {
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl ProducerHandle {
    pub(crate) fn new(running: Arc<AtomicBool>, thread: JoinHandle<()>) -> Self {
        Self {
            running,
            thread: Some(thread),
        }
    }

    /// Check if the producer is still emitting readings.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Stop the producer and wait for its thread.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::warn!("sensor producer thread panicked");
            }
        }
    }
}

impl Drop for ProducerHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Push a reading to the channel. Returns false once the receiver is gone.
///
/// A reading that cannot be queued in time is dropped; the consumer only
/// ever keeps the newest value anyway.
pub(crate) fn forward(sender: &Sender<SensorReading>, reading: SensorReading) -> bool {
    match sender.send_timeout(reading, SEND_TIMEOUT) {
        Ok(()) | Err(SendTimeoutError::Timeout(_)) => true,
        Err(SendTimeoutError::Disconnected(_)) => false,
    }
}

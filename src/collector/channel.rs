//! Channel-fed sensor source.

use crate::collector::types::{RawSample, SensorReading, SensorUnavailable};
use crate::collector::SensorSource;
use crossbeam_channel::{Receiver, TryRecvError};

/// Sensor source fed by a reading channel.
///
/// Mirrors the callback model of wearable sensor APIs: every reading
/// overwrites the previous value of its kind, and a tick samples whatever is
/// current.
pub struct ChannelSensor {
    receiver: Receiver<SensorReading>,
    heart_rate: Option<u16>,
    acceleration: Option<(f64, f64, f64)>,
    disconnected: bool,
}

impl ChannelSensor {
    pub fn new(receiver: Receiver<SensorReading>) -> Self {
        Self {
            receiver,
            heart_rate: None,
            acceleration: None,
            disconnected: false,
        }
    }

    /// Apply every queued reading.
    fn drain(&mut self) {
        loop {
            match self.receiver.try_recv() {
                Ok(reading) => self.apply(reading),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.disconnected = true;
                    break;
                }
            }
        }
    }

    fn apply(&mut self, reading: SensorReading) {
        match reading {
            SensorReading::HeartRate { bpm } => self.heart_rate = Some(bpm),
            SensorReading::Acceleration { x, y, z } => self.acceleration = Some((x, y, z)),
        }
    }
}

impl SensorSource for ChannelSensor {
    fn read(&mut self) -> Result<RawSample, SensorUnavailable> {
        self.drain();

        // Values held after the producer left are stale.
        if self.disconnected {
            return Err(SensorUnavailable::Disconnected);
        }

        let heart_rate = self.heart_rate.ok_or(SensorUnavailable::HeartRate)?;
        let (x, y, z) = self.acceleration.ok_or(SensorUnavailable::Acceleration)?;
        Ok(RawSample::from_readings(heart_rate, x, y, z))
    }

    fn latest_heart_rate(&self) -> Option<u16> {
        self.heart_rate
    }
}

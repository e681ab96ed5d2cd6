//! Reading and sample types for the Synheart Sleep Agent.

use serde::{Deserialize, Serialize};

/// A single reading delivered by a sensor driver.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "sensor", rename_all = "snake_case")]
pub enum SensorReading {
    /// Heart rate in beats per minute
    HeartRate { bpm: u16 },
    /// Accelerometer axes in m/s²
    Acceleration { x: f64, y: f64, z: f64 },
}

/// One recording tick's worth of sensor data.
///
/// Transient: consumed by the reducer, never persisted individually.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawSample {
    pub heart_rate: u16,
    /// Rounded `x² + y² + z²`
    pub accel_squared_magnitude: f64,
}

impl RawSample {
    pub fn from_readings(heart_rate: u16, x: f64, y: f64, z: f64) -> Self {
        Self {
            heart_rate,
            accel_squared_magnitude: squared_magnitude(x, y, z),
        }
    }
}

/// Squared acceleration magnitude rounded to the nearest integer.
pub fn squared_magnitude(x: f64, y: f64, z: f64) -> f64 {
    (x * x + y * y + z * z).round()
}

/// Which reading was missing when a tick fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorUnavailable {
    HeartRate,
    Acceleration,
    /// The reading producer has gone away
    Disconnected,
}

impl std::fmt::Display for SensorUnavailable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SensorUnavailable::HeartRate => write!(f, "No heart-rate reading available"),
            SensorUnavailable::Acceleration => write!(f, "No accelerometer reading available"),
            SensorUnavailable::Disconnected => write!(f, "Sensor producer disconnected"),
        }
    }
}

impl std::error::Error for SensorUnavailable {}

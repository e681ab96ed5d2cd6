//! Reduction of raw per-tick samples into windowed statistics.
//!
//! Samples are collected into fixed-count windows. Once a window holds
//! exactly `window_size` samples it is reduced to a [`WindowedStat`] and the
//! accumulator starts over.
//!
//! The dispersion measures are population variances (mean squared deviation,
//! no square root). Detection thresholds are tuned against these values.

use crate::collector::types::RawSample;
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

/// Statistics of one completed window, rounded to one decimal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WindowedStat {
    /// Mean heart rate (bpm)
    pub avg_heart_rate: f64,
    /// Population variance of the heart rate
    pub hr_variance: f64,
    /// Population variance of the squared acceleration magnitude
    pub accel_variance: f64,
}

/// Errors raised while reducing a window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReducerError {
    /// A statistic was requested over zero samples
    EmptyWindow,
    /// Variance is undefined for windows of one sample or fewer
    InvalidWindowSize(usize),
}

impl std::fmt::Display for ReducerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReducerError::EmptyWindow => write!(f, "Cannot reduce an empty window"),
            ReducerError::InvalidWindowSize(n) => {
                write!(f, "Window size must be at least 2, got {n}")
            }
        }
    }
}

impl std::error::Error for ReducerError {}

/// Accumulates raw samples and emits one [`WindowedStat`] per full window.
#[derive(Debug, Clone)]
pub struct SampleReducer {
    window_size: usize,
    heart_rates: Vec<f64>,
    accel_magnitudes: Vec<f64>,
}

impl SampleReducer {
    pub fn new(window_size: usize) -> Result<Self, ReducerError> {
        if window_size <= 1 {
            return Err(ReducerError::InvalidWindowSize(window_size));
        }
        Ok(Self {
            window_size,
            heart_rates: Vec::with_capacity(window_size),
            accel_magnitudes: Vec::with_capacity(window_size),
        })
    }

    /// Append a sample; returns the window statistic when the window fills.
    pub fn ingest(&mut self, sample: RawSample) -> Result<Option<WindowedStat>, ReducerError> {
        self.heart_rates.push(f64::from(sample.heart_rate));
        self.accel_magnitudes.push(sample.accel_squared_magnitude);

        if self.heart_rates.len() < self.window_size {
            return Ok(None);
        }

        let stat = reduce_window(&self.heart_rates, &self.accel_magnitudes)?;
        self.reset();
        Ok(Some(stat))
    }

    /// Samples accumulated toward the current window.
    pub fn len(&self) -> usize {
        self.heart_rates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heart_rates.is_empty()
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    /// Drop any partially accumulated window.
    pub fn reset(&mut self) {
        self.heart_rates.clear();
        self.accel_magnitudes.clear();
    }
}

/// Reduce one window of heart rates and acceleration magnitudes.
pub fn reduce_window(
    heart_rates: &[f64],
    accel_magnitudes: &[f64],
) -> Result<WindowedStat, ReducerError> {
    if heart_rates.is_empty() || accel_magnitudes.is_empty() {
        return Err(ReducerError::EmptyWindow);
    }

    Ok(WindowedStat {
        avg_heart_rate: round_tenth(heart_rates.iter().mean()),
        hr_variance: round_tenth(heart_rates.iter().population_variance()),
        accel_variance: round_tenth(accel_magnitudes.iter().population_variance()),
    })
}

/// Round to one decimal place.
pub fn round_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

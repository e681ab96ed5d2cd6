//! Bounded in-memory batching of windowed statistics.
//!
//! Statistics accumulate into three index-aligned series. Once the batch
//! holds `memory_bound` values (3 per statistic) a [`FlushRequest`] is
//! produced. The batch is only cleared when the caller confirms the request
//! was persisted, so a failed write keeps every value for the next attempt.

use crate::core::reducer::WindowedStat;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Values contributed to the batch by one statistic.
pub const VALUES_PER_STAT: usize = 3;

/// A batch ready to be persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlushRequest {
    pub avg_heart_rate: Vec<f64>,
    pub hr_variance: Vec<f64>,
    pub accel_variance: Vec<f64>,
    /// When the batch began
    pub batch_start: DateTime<Utc>,
    /// When the flush was requested
    pub batch_end: DateTime<Utc>,
}

impl FlushRequest {
    /// Number of statistics in the batch.
    pub fn len(&self) -> usize {
        self.avg_heart_rate.len()
    }

    pub fn is_empty(&self) -> bool {
        self.avg_heart_rate.is_empty()
    }
}

/// Accumulates statistics until the memory bound is reached.
#[derive(Debug, Clone)]
pub struct BatchBuffer {
    memory_bound: usize,
    avg_heart_rate: Vec<f64>,
    hr_variance: Vec<f64>,
    accel_variance: Vec<f64>,
    size: usize,
    batch_start: DateTime<Utc>,
    /// End stamp of the first unconfirmed request, reused by every retry
    pending_end: Option<DateTime<Utc>>,
}

impl BatchBuffer {
    pub fn new(memory_bound: usize, batch_start: DateTime<Utc>) -> Self {
        let capacity = memory_bound / VALUES_PER_STAT + 1;
        Self {
            memory_bound,
            avg_heart_rate: Vec::with_capacity(capacity),
            hr_variance: Vec::with_capacity(capacity),
            accel_variance: Vec::with_capacity(capacity),
            size: 0,
            batch_start,
            pending_end: None,
        }
    }

    /// Append a statistic; returns a flush request once the bound is reached.
    pub fn absorb(&mut self, stat: &WindowedStat, now: DateTime<Utc>) -> Option<FlushRequest> {
        self.avg_heart_rate.push(stat.avg_heart_rate);
        self.hr_variance.push(stat.hr_variance);
        self.accel_variance.push(stat.accel_variance);
        self.size += VALUES_PER_STAT;

        if self.size >= self.memory_bound {
            Some(self.request(now))
        } else {
            None
        }
    }

    /// Request a flush of whatever is buffered, full or not.
    pub fn drain(&mut self, now: DateTime<Utc>) -> Option<FlushRequest> {
        if self.is_empty() {
            None
        } else {
            Some(self.request(now))
        }
    }

    /// Confirm that `request` was persisted.
    ///
    /// Clears the values it covered and starts the next batch at its end.
    /// Statistics absorbed after the request was issued are kept.
    pub fn complete_flush(&mut self, request: &FlushRequest) {
        let covered = request.len().min(self.avg_heart_rate.len());
        self.avg_heart_rate.drain(..covered);
        self.hr_variance.drain(..covered);
        self.accel_variance.drain(..covered);
        self.size = self.avg_heart_rate.len() * VALUES_PER_STAT;
        self.batch_start = request.batch_end;
        self.pending_end = None;
    }

    /// Snapshot the buffer. Until a request is confirmed every later one
    /// keeps its end stamp, so a retry lands on the same keys as the failed
    /// attempt and overwrites them with a superset.
    fn request(&mut self, now: DateTime<Utc>) -> FlushRequest {
        let batch_end = *self.pending_end.get_or_insert(now);
        FlushRequest {
            avg_heart_rate: self.avg_heart_rate.clone(),
            hr_variance: self.hr_variance.clone(),
            accel_variance: self.accel_variance.clone(),
            batch_start: self.batch_start,
            batch_end,
        }
    }

    /// Buffered values, counting 3 per statistic.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Number of buffered statistics.
    pub fn len(&self) -> usize {
        self.avg_heart_rate.len()
    }

    pub fn is_empty(&self) -> bool {
        self.avg_heart_rate.is_empty()
    }

    pub fn batch_start(&self) -> DateTime<Utc> {
        self.batch_start
    }

    pub fn memory_bound(&self) -> usize {
        self.memory_bound
    }
}

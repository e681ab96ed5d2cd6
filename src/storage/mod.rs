//! Persistence of measure batches.
//!
//! A flushed batch becomes three stored series sharing one key stem:
//!
//! ```text
//! <D>_<M>_<YYYY>_<start>_<end>_<suffix>
//! 19_11_2020_23h0m4_2h0m4_hr_avg_measures
//! ```
//!
//! The date is the flush date and the time tokens are unpadded
//! `<h>h<m>m<s>`, both in the configured timezone.

pub mod files;
pub mod sink;

pub use files::{format_series, list_batches, load_series, prune_batches, SERIES_PER_LINE};
pub use sink::{JsonFileSink, MemorySink, PersistenceError, PersistenceSink};

use crate::core::batch::FlushRequest;
use chrono::{DateTime, Datelike, Timelike, Utc};
use chrono_tz::Tz;

/// The three persisted series.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeriesKind {
    AvgHeartRate,
    HeartRateVariance,
    AccelVariance,
}

impl SeriesKind {
    pub const ALL: [SeriesKind; 3] = [
        SeriesKind::AvgHeartRate,
        SeriesKind::HeartRateVariance,
        SeriesKind::AccelVariance,
    ];

    /// Key suffix identifying the series.
    pub fn suffix(&self) -> &'static str {
        match self {
            SeriesKind::AvgHeartRate => "hr_avg_measures",
            SeriesKind::HeartRateVariance => "hr_var_measures",
            SeriesKind::AccelVariance => "acc_var_measures",
        }
    }

    /// Parse the short CLI names `hr_avg`, `hr_var`, `acc_var`.
    pub fn from_short(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "hr_avg" => Some(SeriesKind::AvgHeartRate),
            "hr_var" => Some(SeriesKind::HeartRateVariance),
            "acc_var" => Some(SeriesKind::AccelVariance),
            _ => None,
        }
    }

    fn values<'a>(&self, request: &'a FlushRequest) -> &'a [f64] {
        match self {
            SeriesKind::AvgHeartRate => &request.avg_heart_rate,
            SeriesKind::HeartRateVariance => &request.hr_variance,
            SeriesKind::AccelVariance => &request.accel_variance,
        }
    }
}

/// Date stamp such as `19_11_2020`.
pub fn date_stamp(at: DateTime<Utc>, tz: Tz) -> String {
    let local = at.with_timezone(&tz);
    format!("{}_{}_{}", local.day(), local.month(), local.year())
}

/// Time token such as `23h0m4`.
pub fn time_token(at: DateTime<Utc>, tz: Tz) -> String {
    let local = at.with_timezone(&tz);
    format!("{}h{}m{}", local.hour(), local.minute(), local.second())
}

/// Storage key for one series of a batch.
pub fn batch_key(request: &FlushRequest, kind: SeriesKind, tz: Tz) -> String {
    format!(
        "{}_{}_{}_{}",
        date_stamp(request.batch_end, tz),
        time_token(request.batch_start, tz),
        time_token(request.batch_end, tz),
        kind.suffix()
    )
}

/// Store the three series of a batch.
///
/// Stops at the first failing write; the caller keeps the batch and retries
/// on a later flush.
pub fn persist_batch(
    sink: &mut dyn PersistenceSink,
    request: &FlushRequest,
    tz: Tz,
) -> Result<(), PersistenceError> {
    for kind in SeriesKind::ALL {
        sink.store(&batch_key(request, kind, tz), kind.values(request))?;
    }
    Ok(())
}

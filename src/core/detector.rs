//! Threshold-based REM detection with a stimulus cooldown.
//!
//! REM is assumed when the body is nearly motionless (acceleration variance
//! from gravity only), the heart rate is elevated, and the heart rate is not
//! erratic. Firing is restricted to the later hours of the night.

use crate::config::Thresholds;
use crate::core::clock::Mode;
use crate::core::reducer::WindowedStat;
use chrono::{DateTime, Duration, Utc};

/// Time of the last automatic night stimulus.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CooldownState {
    pub last_stimulus: Option<DateTime<Utc>>,
}

impl CooldownState {
    /// Whether at least `interval` has passed since the last stimulus.
    pub fn elapsed(&self, now: DateTime<Utc>, interval: Duration) -> bool {
        match self.last_stimulus {
            Some(last) => now - last >= interval,
            None => true,
        }
    }
}

/// Why a detection pass did not fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Fire,
    DayMode,
    OutsideHours,
    Moving,
    HeartRateLow,
    HeartRateErratic,
    CoolingDown,
}

impl Verdict {
    pub fn fired(&self) -> bool {
        matches!(self, Verdict::Fire)
    }
}

/// Evaluates the latest statistic against the REM thresholds.
#[derive(Debug, Clone)]
pub struct SleepStageDetector {
    thresholds: Thresholds,
    vibration_interval: Duration,
}

impl SleepStageDetector {
    pub fn new(thresholds: Thresholds, vibration_interval: Duration) -> Self {
        Self {
            thresholds,
            vibration_interval,
        }
    }

    /// Decide whether to fire, recording the stimulus in `cooldown` if so.
    pub fn evaluate(
        &self,
        latest: &WindowedStat,
        mode: Mode,
        local_hour: u32,
        now: DateTime<Utc>,
        cooldown: &mut CooldownState,
    ) -> bool {
        let verdict = self.judge(latest, mode, local_hour, now, cooldown);
        if verdict.fired() {
            cooldown.last_stimulus = Some(now);
        }
        verdict.fired()
    }

    /// Side-effect free version of [`evaluate`](Self::evaluate).
    pub fn judge(
        &self,
        latest: &WindowedStat,
        mode: Mode,
        local_hour: u32,
        now: DateTime<Utc>,
        cooldown: &CooldownState,
    ) -> Verdict {
        let t = &self.thresholds;

        if mode != Mode::Night {
            return Verdict::DayMode;
        }
        if !self.within_gate(local_hour) {
            return Verdict::OutsideHours;
        }
        if latest.accel_variance > t.accel_variance {
            return Verdict::Moving;
        }
        if latest.avg_heart_rate < t.avg_heart_rate {
            return Verdict::HeartRateLow;
        }
        if latest.hr_variance > t.hr_variance {
            return Verdict::HeartRateErratic;
        }
        if !cooldown.elapsed(now, self.vibration_interval) {
            return Verdict::CoolingDown;
        }
        Verdict::Fire
    }

    /// Whether `local_hour` falls in the firing gate.
    ///
    /// Hours are shifted by the offset modulo 24, so with an offset of 3 and
    /// a span of 7 the gate covers 03:00 through 10:59.
    pub fn within_gate(&self, local_hour: u32) -> bool {
        let shifted = (i64::from(local_hour) - i64::from(self.thresholds.hours_offset)).rem_euclid(24);
        shifted <= i64::from(self.thresholds.gate_span_hours)
    }
}

//! The aggregation engine.
//!
//! Owns every piece of mutable monitoring state: the window accumulator, the
//! batch buffer, the latest statistic, the cooldown, and the current mode.
//! Its methods are the only way that state changes. The engine performs no
//! I/O; flush requests are handed back to the caller, who confirms them with
//! [`SleepEngine::complete_flush`] once persisted.

use crate::collector::types::RawSample;
use crate::config::{Config, ConfigError};
use crate::core::batch::{BatchBuffer, FlushRequest};
use crate::core::clock::{Mode, ModeClassifier, ModeUpdate};
use crate::core::detector::{CooldownState, SleepStageDetector, Verdict};
use crate::core::reducer::{ReducerError, SampleReducer, WindowedStat};
use crate::core::stimulus::{DayPolicy, DayStimulus};
use chrono::{DateTime, Utc};
use rand::Rng;

/// Result of a recording tick.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordOutcome {
    /// Statistic emitted if the sample completed a window
    pub stat: Option<WindowedStat>,
    /// Batch to persist if the memory bound was reached
    pub flush: Option<FlushRequest>,
}

/// Result of a mode tick.
#[derive(Debug, Clone, PartialEq)]
pub struct ModeTransition {
    pub update: ModeUpdate,
    /// Partial batch to persist when a night ends
    pub flush: Option<FlushRequest>,
}

/// Result of a detection tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Detection {
    pub fired: bool,
    pub verdict: Verdict,
}

pub struct SleepEngine {
    classifier: ModeClassifier,
    reducer: SampleReducer,
    buffer: BatchBuffer,
    detector: SleepStageDetector,
    cooldown: CooldownState,
    day_policy: DayPolicy,
    latest: Option<WindowedStat>,
    mode: Mode,
}

impl SleepEngine {
    /// Build an engine from a validated configuration.
    pub fn from_config(config: &Config, now: DateTime<Utc>) -> Result<Self, ConfigError> {
        config.validate()?;

        let classifier = ModeClassifier::new(config.schedule, config.tz()?)
            .with_override(config.mode_override);
        let reducer = SampleReducer::new(config.window_size)
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        let vibration_interval = chrono::Duration::from_std(config.vibration_interval)
            .map_err(|e| ConfigError::Invalid(format!("vibration_interval: {e}")))?;
        let mode = classifier.classify(now);

        Ok(Self {
            classifier,
            reducer,
            buffer: BatchBuffer::new(config.memory_bound, now),
            detector: SleepStageDetector::new(config.thresholds, vibration_interval),
            cooldown: CooldownState::default(),
            day_policy: DayPolicy::new(&config.day_stimulus),
            latest: None,
            mode,
        })
    }

    /// Reclassify the mode.
    ///
    /// When a night ends the partial window and the latest statistic are
    /// discarded, so a window never spans two nights, and any buffered
    /// statistics are offered for flushing.
    pub fn update_mode(&mut self, now: DateTime<Utc>) -> ModeTransition {
        let update = self.classifier.update(now);
        let previous = std::mem::replace(&mut self.mode, update.mode);

        let flush = if previous == Mode::Night && update.mode == Mode::Day {
            if !self.reducer.is_empty() {
                tracing::debug!(
                    samples = self.reducer.len(),
                    "discarding partial window at end of night"
                );
            }
            self.reducer.reset();
            self.latest = None;
            self.buffer.drain(now)
        } else {
            None
        };

        ModeTransition { update, flush }
    }

    /// Feed one raw sample. Ignored outside night mode.
    pub fn record(
        &mut self,
        sample: RawSample,
        now: DateTime<Utc>,
    ) -> Result<RecordOutcome, ReducerError> {
        if self.mode != Mode::Night {
            return Ok(RecordOutcome::default());
        }

        let Some(stat) = self.reducer.ingest(sample)? else {
            return Ok(RecordOutcome::default());
        };

        self.latest = Some(stat);
        let flush = self.buffer.absorb(&stat, now);
        Ok(RecordOutcome {
            stat: Some(stat),
            flush,
        })
    }

    /// Confirm a flush request was persisted.
    pub fn complete_flush(&mut self, request: &FlushRequest) {
        self.buffer.complete_flush(request);
    }

    /// Evaluate the latest statistic. `None` until a window has completed.
    pub fn detect(&mut self, now: DateTime<Utc>) -> Option<Detection> {
        let latest = self.latest?;
        let hour = self.classifier.local_hour(now);

        let fired = self
            .detector
            .evaluate(&latest, self.mode, hour, now, &mut self.cooldown);
        let verdict = if fired {
            Verdict::Fire
        } else {
            self.detector
                .judge(&latest, self.mode, hour, now, &self.cooldown)
        };

        Some(Detection { fired, verdict })
    }

    /// Draw for a day-mode reality check.
    pub fn day_tick<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<DayStimulus> {
        self.day_policy.check(self.mode, rng)
    }

    /// Flush request for everything still buffered, e.g. at shutdown.
    pub fn drain(&mut self, now: DateTime<Utc>) -> Option<FlushRequest> {
        self.buffer.drain(now)
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Most recently emitted statistic.
    pub fn latest(&self) -> Option<&WindowedStat> {
        self.latest.as_ref()
    }

    pub fn buffer(&self) -> &BatchBuffer {
        &self.buffer
    }

    pub fn reducer(&self) -> &SampleReducer {
        &self.reducer
    }

    pub fn cooldown(&self) -> &CooldownState {
        &self.cooldown
    }

    pub fn classifier(&self) -> &ModeClassifier {
        &self.classifier
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn config() -> Config {
        Config {
            memory_bound: 9,
            ..Config::default()
        }
    }

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2020, 11, day, hour, 0, 0).unwrap()
    }

    fn sample(heart_rate: u16) -> RawSample {
        RawSample {
            heart_rate,
            accel_squared_magnitude: 96.0,
        }
    }

    fn record_window(engine: &mut SleepEngine, hr: u16, now: DateTime<Utc>) -> RecordOutcome {
        let mut last = RecordOutcome::default();
        for _ in 0..5 {
            last = engine.record(sample(hr), now).unwrap();
        }
        last
    }

    #[test]
    fn test_rejects_invalid_config() {
        let mut bad = config();
        bad.window_size = 1;
        assert!(SleepEngine::from_config(&bad, at(19, 23)).is_err());
    }

    #[test]
    fn test_day_mode_does_not_record() {
        let mut engine = SleepEngine::from_config(&config(), at(19, 12)).unwrap();
        assert_eq!(engine.mode(), Mode::Day);
        let outcome = record_window(&mut engine, 75, at(19, 12));
        assert_eq!(outcome, RecordOutcome::default());
        assert!(engine.reducer().is_empty());
    }

    #[test]
    fn test_night_records_and_flushes() {
        let now = at(20, 4);
        let mut engine = SleepEngine::from_config(&config(), now).unwrap();
        assert_eq!(engine.mode(), Mode::Night);

        assert!(record_window(&mut engine, 60, now).flush.is_none());
        assert!(record_window(&mut engine, 62, now).flush.is_none());
        let outcome = record_window(&mut engine, 64, now);
        assert_eq!(outcome.stat.unwrap().avg_heart_rate, 64.0);

        let flush = outcome.flush.unwrap();
        assert_eq!(flush.avg_heart_rate, vec![60.0, 62.0, 64.0]);
        engine.complete_flush(&flush);
        assert!(engine.buffer().is_empty());
        assert_eq!(engine.latest().unwrap().avg_heart_rate, 64.0);
    }

    #[test]
    fn test_detect_uses_latest_window() {
        let now = at(20, 4);
        let mut engine = SleepEngine::from_config(&config(), now).unwrap();
        assert!(engine.detect(now).is_none());

        record_window(&mut engine, 60, now);
        let detection = engine.detect(now).unwrap();
        assert!(!detection.fired);
        assert_eq!(detection.verdict, Verdict::HeartRateLow);

        record_window(&mut engine, 75, now);
        assert!(engine.detect(now).unwrap().fired);
        assert_eq!(engine.cooldown().last_stimulus, Some(now));

        let again = engine.detect(now + Duration::minutes(30)).unwrap();
        assert_eq!(again.verdict, Verdict::CoolingDown);
    }

    #[test]
    fn test_end_of_night_drains_and_discards_partial_window() {
        let night = at(20, 8);
        let mut engine = SleepEngine::from_config(&config(), night).unwrap();
        engine.update_mode(night);

        record_window(&mut engine, 60, night);
        engine.record(sample(60), night).unwrap();
        assert_eq!(engine.reducer().len(), 1);

        let transition = engine.update_mode(at(20, 9));
        assert_eq!(transition.update.mode, Mode::Day);
        assert!(transition.update.changed);
        assert_eq!(transition.flush.unwrap().len(), 1);
        assert!(engine.reducer().is_empty());
        assert!(engine.latest().is_none());
    }

    #[test]
    fn test_day_tick_only_in_day() {
        let mut cfg = config();
        cfg.day_stimulus.probability = 1.0;
        let mut rng = StdRng::seed_from_u64(9);

        let engine = SleepEngine::from_config(&cfg, at(19, 12)).unwrap();
        assert!(engine.day_tick(&mut rng).is_some());

        let engine = SleepEngine::from_config(&cfg, at(20, 2)).unwrap();
        assert!(engine.day_tick(&mut rng).is_none());
    }
}

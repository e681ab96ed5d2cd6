//! The cooperative tick loop.
//!
//! Four fixed-rate timers (mode, day stimulus, recording, detection) and the
//! transient-message deadline all run on one task. Handlers never await each
//! other; they communicate only through the engine's state, so no locking is
//! needed.

use crate::collector::SensorSource;
use crate::config::{Config, ConfigError, TimerConfig};
use crate::core::batch::FlushRequest;
use crate::core::clock::Mode;
use crate::core::engine::SleepEngine;
use crate::host::{StimulusActuator, UiSink};
use crate::storage::{persist_batch, PersistenceSink};
use crate::transparency::SharedTransparencyLog;
use chrono::{DateTime, Timelike, Utc};
use chrono_tz::Tz;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, interval_at, sleep_until, Instant, Interval, MissedTickBehavior};

/// How often the loop checks the shutdown flag.
const SHUTDOWN_POLL: Duration = Duration::from_millis(200);

/// Collaborators the monitor drives.
pub struct Collaborators {
    pub sensor: Box<dyn SensorSource>,
    pub sink: Box<dyn PersistenceSink>,
    pub actuator: Box<dyn StimulusActuator>,
    pub ui: Box<dyn UiSink>,
    pub log: SharedTransparencyLog,
}

/// Runs the engine against its collaborators.
pub struct Monitor {
    engine: SleepEngine,
    io: Collaborators,
    rng: StdRng,
    tz: Tz,
    timers: TimerConfig,
    vibration_pattern: String,
    failure_alert_threshold: u32,
    consecutive_failures: u32,
}

impl Monitor {
    /// Build a monitor. `seed` makes the reality-check draws reproducible.
    pub fn new(
        config: &Config,
        io: Collaborators,
        seed: Option<u64>,
        now: DateTime<Utc>,
    ) -> Result<Self, ConfigError> {
        let engine = SleepEngine::from_config(config, now)?;
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Ok(Self {
            engine,
            io,
            rng,
            tz: config.tz()?,
            timers: config.timers,
            vibration_pattern: config.vibration_pattern.clone(),
            failure_alert_threshold: config.failure_alert_threshold,
            consecutive_failures: 0,
        })
    }

    pub fn engine(&self) -> &SleepEngine {
        &self.engine
    }

    pub fn log(&self) -> &SharedTransparencyLog {
        &self.io.log
    }

    /// Flushes that failed since the last successful one.
    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Reclassify the mode and refresh the clock and mode labels.
    pub fn on_mode_tick(&mut self, now: DateTime<Utc>) {
        let transition = self.engine.update_mode(now);

        let local = now.with_timezone(&self.tz);
        self.io
            .ui
            .set_time_label(&format!("{}:{:02}", local.hour(), local.minute()));

        if transition.update.changed {
            tracing::info!(mode = %transition.update.mode, "mode changed");
            self.io
                .ui
                .set_mode_label(&format!("Mode: {}", transition.update.mode));
        }

        if let Some(request) = transition.flush {
            self.flush(request);
        }
    }

    /// Sample the sensors and, at night, feed the engine.
    pub fn on_record_tick(&mut self, now: DateTime<Utc>) {
        let reading = self.io.sensor.read();

        if let Some(bpm) = self.io.sensor.latest_heart_rate() {
            self.io.ui.set_heart_rate_label(&format!("BPM: {bpm}"));
        }

        if self.engine.mode() != Mode::Night {
            return;
        }

        let sample = match reading {
            Ok(sample) => sample,
            Err(e) => {
                // The window pauses rather than taking a placeholder.
                tracing::debug!("skipping recording tick: {e}");
                self.io.log.record_skipped_tick();
                return;
            }
        };

        match self.engine.record(sample, now) {
            Ok(outcome) => {
                self.io.log.record_sample();
                if let Some(stat) = outcome.stat {
                    self.io.log.record_window();
                    tracing::debug!(
                        avg_heart_rate = stat.avg_heart_rate,
                        hr_variance = stat.hr_variance,
                        accel_variance = stat.accel_variance,
                        "window completed"
                    );
                }
                if let Some(request) = outcome.flush {
                    self.flush(request);
                }
            }
            Err(e) => tracing::warn!("could not reduce window: {e}"),
        }
    }

    /// Evaluate the latest window and vibrate if it looks like REM.
    pub fn on_detect_tick(&mut self, now: DateTime<Utc>) {
        let Some(detection) = self.engine.detect(now) else {
            return;
        };

        if detection.fired {
            tracing::info!("REM detected, firing stimulus");
            self.io.actuator.fire(&self.vibration_pattern);
            self.io.log.record_night_stimulus();
        } else {
            tracing::trace!(verdict = ?detection.verdict, "no stimulus");
        }
    }

    /// Maybe fire a reality check. Returns how long its message should stay.
    pub fn on_day_tick(&mut self) -> Option<Duration> {
        let stimulus = self.engine.day_tick(&mut self.rng)?;

        tracing::info!("reality check");
        self.io.ui.set_message(&stimulus.message.text);
        self.io.actuator.fire(&self.vibration_pattern);
        self.io.log.record_day_stimulus();
        Some(stimulus.message.ttl)
    }

    /// Clear the transient message.
    pub fn clear_message(&mut self) {
        self.io.ui.set_message("");
    }

    /// Persist a batch, keeping it in memory if the sink fails.
    fn flush(&mut self, request: FlushRequest) {
        match persist_batch(self.io.sink.as_mut(), &request, self.tz) {
            Ok(()) => {
                self.engine.complete_flush(&request);
                self.io.log.record_flush();
                self.consecutive_failures = 0;
                tracing::info!(
                    stats = request.len(),
                    start = %request.batch_start,
                    end = %request.batch_end,
                    "batch stored"
                );
            }
            Err(e) => {
                self.consecutive_failures += 1;
                self.io.log.record_flush_failure();
                tracing::warn!(
                    retained = self.engine.buffer().len(),
                    "batch not stored, retrying on next flush: {e}"
                );
                if self.consecutive_failures >= self.failure_alert_threshold {
                    tracing::error!(
                        failures = self.consecutive_failures,
                        retained = self.engine.buffer().len(),
                        "storage keeps failing; measures are accumulating in memory"
                    );
                }
            }
        }
    }

    /// Store whatever is still buffered and save the transparency log.
    pub fn shutdown(&mut self, now: DateTime<Utc>) {
        if let Some(request) = self.engine.drain(now) {
            self.flush(request);
        }
        if let Err(e) = self.io.log.save() {
            tracing::warn!("could not save transparency log: {e}");
        }
    }

    /// Drive the timers until `running` is cleared, then shut down.
    pub async fn run(&mut self, running: Arc<AtomicBool>) {
        let mut mode_tick = fixed_rate(self.timers.mode);
        let mut record_tick = fixed_rate(self.timers.record);
        let mut detect_tick = after_first_period(self.timers.detect);
        let mut day_tick = after_first_period(self.timers.day_stimulus);
        let mut shutdown_poll = fixed_rate(SHUTDOWN_POLL);
        let mut message_deadline: Option<Instant> = None;

        loop {
            tokio::select! {
                biased;

                _ = shutdown_poll.tick() => {
                    if !running.load(Ordering::SeqCst) {
                        break;
                    }
                }
                _ = mode_tick.tick() => self.on_mode_tick(Utc::now()),
                _ = record_tick.tick() => self.on_record_tick(Utc::now()),
                _ = detect_tick.tick() => self.on_detect_tick(Utc::now()),
                _ = day_tick.tick() => {
                    if let Some(ttl) = self.on_day_tick() {
                        message_deadline = Some(Instant::now() + ttl);
                    }
                }
                _ = wait_for(message_deadline) => {
                    self.clear_message();
                    message_deadline = None;
                }
            }
        }

        tracing::info!("stopping monitor");
        self.shutdown(Utc::now());
    }
}

/// Timer whose first tick completes immediately.
fn fixed_rate(period: Duration) -> Interval {
    skip_missed(interval(period))
}

/// Timer whose first tick comes one full period after start.
fn after_first_period(period: Duration) -> Interval {
    skip_missed(interval_at(Instant::now() + period, period))
}

fn skip_missed(mut timer: Interval) -> Interval {
    timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
    timer
}

async fn wait_for(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

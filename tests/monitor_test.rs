//! Integration tests for the record -> flush -> detect path.

use chrono::{DateTime, Duration, TimeZone, Utc};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use synheart_sleep_agent::collector::{RawSample, SensorSource, SensorUnavailable};
use synheart_sleep_agent::config::Config;
use synheart_sleep_agent::core::Mode;
use synheart_sleep_agent::host::{StimulusActuator, UiSink};
use synheart_sleep_agent::runtime::{Collaborators, Monitor};
use synheart_sleep_agent::storage::{list_batches, load_series, JsonFileSink, PersistenceError,
    PersistenceSink};
use synheart_sleep_agent::transparency::create_shared_log;

/// Sensor returning a fixed sample, switchable at runtime.
#[derive(Clone)]
struct SteadySensor(Rc<RefCell<Option<RawSample>>>);

impl SensorSource for SteadySensor {
    fn read(&mut self) -> Result<RawSample, SensorUnavailable> {
        self.0.borrow().ok_or(SensorUnavailable::HeartRate)
    }

    fn latest_heart_rate(&self) -> Option<u16> {
        self.0.borrow().map(|s| s.heart_rate)
    }
}

/// Sink that rejects the writes whose 1-based call numbers are listed.
#[derive(Clone, Default)]
struct FlakySink {
    failing_calls: Rc<RefCell<Vec<u32>>>,
    calls: Rc<RefCell<u32>>,
    stored: Rc<RefCell<HashMap<String, Vec<f64>>>>,
}

impl FlakySink {
    fn fail_calls(&self, calls: &[u32]) {
        *self.failing_calls.borrow_mut() = calls.to_vec();
    }
}

impl PersistenceSink for FlakySink {
    fn store(&mut self, key: &str, series: &[f64]) -> Result<(), PersistenceError> {
        let mut calls = self.calls.borrow_mut();
        *calls += 1;
        if self.failing_calls.borrow().contains(&*calls) {
            return Err(PersistenceError::Io("card removed".to_string()));
        }
        self.stored
            .borrow_mut()
            .insert(key.to_string(), series.to_vec());
        Ok(())
    }
}

#[derive(Clone, Default)]
struct Pulses(Rc<RefCell<Vec<String>>>);

impl StimulusActuator for Pulses {
    fn fire(&mut self, pattern: &str) {
        self.0.borrow_mut().push(pattern.to_string());
    }
}

#[derive(Clone, Default)]
struct Labels(Rc<RefCell<HashMap<&'static str, String>>>);

impl UiSink for Labels {
    fn set_mode_label(&mut self, text: &str) {
        self.0.borrow_mut().insert("mode", text.to_string());
    }
    fn set_heart_rate_label(&mut self, text: &str) {
        self.0.borrow_mut().insert("hrm", text.to_string());
    }
    fn set_message(&mut self, text: &str) {
        self.0.borrow_mut().insert("rc", text.to_string());
    }
    fn set_time_label(&mut self, text: &str) {
        self.0.borrow_mut().insert("time", text.to_string());
    }
}

struct Harness {
    monitor: Monitor,
    sensor: SteadySensor,
    sink: FlakySink,
    pulses: Pulses,
    labels: Labels,
}

fn harness(config: &Config, now: DateTime<Utc>) -> Harness {
    let sensor = SteadySensor(Rc::new(RefCell::new(None)));
    let sink = FlakySink::default();
    let pulses = Pulses::default();
    let labels = Labels::default();

    let io = Collaborators {
        sensor: Box::new(sensor.clone()),
        sink: Box::new(sink.clone()),
        actuator: Box::new(pulses.clone()),
        ui: Box::new(labels.clone()),
        log: create_shared_log(),
    };
    let monitor = Monitor::new(config, io, Some(11), now).unwrap();

    Harness {
        monitor,
        sensor,
        sink,
        pulses,
        labels,
    }
}

fn small_batches() -> Config {
    Config {
        memory_bound: 9,
        ..Config::default()
    }
}

fn night() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2020, 11, 20, 4, 0, 0).unwrap()
}

fn rem_sample() -> RawSample {
    RawSample {
        heart_rate: 74,
        accel_squared_magnitude: 96.0,
    }
}

/// Run `ticks` one-second recording ticks starting at `start`.
fn record(h: &mut Harness, start: DateTime<Utc>, ticks: i64) -> DateTime<Utc> {
    let mut now = start;
    for i in 0..ticks {
        now = start + Duration::seconds(i);
        h.monitor.on_record_tick(now);
    }
    now
}

#[test]
fn test_three_windows_make_one_batch() {
    let mut h = harness(&small_batches(), night());
    h.monitor.on_mode_tick(night());
    *h.sensor.0.borrow_mut() = Some(rem_sample());

    record(&mut h, night(), 15);

    let stored = h.sink.stored.borrow();
    assert_eq!(stored.len(), 3);
    for (key, series) in stored.iter() {
        assert!(key.starts_with("20_11_2020_4h0m0_4h0m14_"), "{key}");
        assert_eq!(series.len(), 3);
    }
    assert_eq!(stored["20_11_2020_4h0m0_4h0m14_hr_avg_measures"], vec![74.0; 3]);
    assert!(h.monitor.engine().buffer().is_empty());

    let stats = h.monitor.log().stats();
    assert_eq!(stats.samples_recorded, 15);
    assert_eq!(stats.windows_emitted, 3);
    assert_eq!(stats.batches_flushed, 1);
}

#[test]
fn test_failed_flush_keeps_data_and_batch_start() {
    let mut h = harness(&small_batches(), night());
    h.monitor.on_mode_tick(night());
    *h.sensor.0.borrow_mut() = Some(rem_sample());
    // First flush attempt fails on its first write.
    h.sink.fail_calls(&[1]);

    record(&mut h, night(), 15);
    assert!(h.sink.stored.borrow().is_empty());
    assert_eq!(h.monitor.engine().buffer().len(), 3);
    assert_eq!(h.monitor.consecutive_failures(), 1);

    // The next window retries with every statistic under the same key.
    record(&mut h, night() + Duration::seconds(15), 5);
    let stored = h.sink.stored.borrow();
    assert_eq!(stored.len(), 3);
    let series = &stored["20_11_2020_4h0m0_4h0m14_acc_var_measures"];
    assert_eq!(series.len(), 4);
    assert_eq!(h.monitor.consecutive_failures(), 0);
    assert_eq!(h.monitor.log().stats().flush_failures, 1);
}

#[test]
fn test_partial_write_is_overwritten_by_retry() {
    let mut h = harness(&small_batches(), night());
    h.monitor.on_mode_tick(night());
    *h.sensor.0.borrow_mut() = Some(rem_sample());
    // The average series is written, then the variance write fails.
    h.sink.fail_calls(&[2]);

    record(&mut h, night(), 15);
    assert_eq!(h.sink.stored.borrow().len(), 1);
    assert_eq!(h.monitor.consecutive_failures(), 1);

    record(&mut h, night() + Duration::seconds(15), 5);
    let stored = h.sink.stored.borrow();
    assert_eq!(stored.len(), 3);
    for kind in ["hr_avg_measures", "hr_var_measures", "acc_var_measures"] {
        let keys: Vec<_> = stored.keys().filter(|k| k.ends_with(kind)).collect();
        assert_eq!(keys, [&format!("20_11_2020_4h0m0_4h0m14_{kind}")]);
        assert_eq!(stored[keys[0]].len(), 4);
    }
    let persisted: usize = stored.values().map(Vec::len).sum();
    assert_eq!(persisted, 3 * 4);
    assert!(h.monitor.engine().buffer().is_empty());
}

#[test]
fn test_rem_window_fires_once_per_interval() {
    let mut h = harness(&Config::default(), night());
    h.monitor.on_mode_tick(night());
    *h.sensor.0.borrow_mut() = Some(rem_sample());

    // One hour of 1 s recording with detection every 30 s.
    for i in 0..3600 {
        let now = night() + Duration::seconds(i);
        h.monitor.on_record_tick(now);
        if i % 30 == 29 {
            h.monitor.on_detect_tick(now);
        }
    }

    assert_eq!(h.pulses.0.borrow().as_slice(), ["ping"]);
    assert_eq!(h.monitor.log().stats().night_stimuli, 1);
}

#[test]
fn test_low_heart_rate_never_fires() {
    let mut h = harness(&Config::default(), night());
    h.monitor.on_mode_tick(night());
    *h.sensor.0.borrow_mut() = Some(RawSample {
        heart_rate: 58,
        accel_squared_magnitude: 96.0,
    });

    let now = record(&mut h, night(), 30);
    h.monitor.on_detect_tick(now);

    assert!(h.pulses.0.borrow().is_empty());
}

#[test]
fn test_no_recording_or_detection_by_day() {
    let noon = Utc.with_ymd_and_hms(2020, 11, 20, 12, 0, 0).unwrap();
    let mut h = harness(&Config::default(), noon);
    h.monitor.on_mode_tick(noon);
    *h.sensor.0.borrow_mut() = Some(rem_sample());

    let now = record(&mut h, noon, 30);
    h.monitor.on_detect_tick(now);

    assert_eq!(h.monitor.engine().mode(), Mode::Day);
    assert!(h.monitor.engine().reducer().is_empty());
    assert!(h.pulses.0.borrow().is_empty());
    assert_eq!(h.labels.0.borrow()["mode"], "Mode: Day");
    assert_eq!(h.labels.0.borrow()["hrm"], "BPM: 74");
    assert_eq!(h.labels.0.borrow()["time"], "12:00");
}

#[test]
fn test_reality_check_shows_and_clears_message() {
    let mut config = Config::default();
    config.day_stimulus.probability = 1.0;
    let noon = Utc.with_ymd_and_hms(2020, 11, 20, 12, 0, 0).unwrap();
    let mut h = harness(&config, noon);
    h.monitor.on_mode_tick(noon);

    let ttl = h.monitor.on_day_tick().unwrap();
    assert_eq!(ttl, std::time::Duration::from_secs(10));
    assert_eq!(h.labels.0.borrow()["rc"], "Are you dreaming?");
    assert_eq!(h.pulses.0.borrow().len(), 1);

    h.monitor.clear_message();
    assert_eq!(h.labels.0.borrow()["rc"], "");
    assert_eq!(h.monitor.log().stats().day_stimuli, 1);
}

#[test]
fn test_morning_flushes_partial_batch() {
    let mut h = harness(&Config::default(), night());
    h.monitor.on_mode_tick(night());
    *h.sensor.0.borrow_mut() = Some(rem_sample());
    record(&mut h, night(), 12);
    assert_eq!(h.monitor.engine().buffer().len(), 2);

    let morning = Utc.with_ymd_and_hms(2020, 11, 20, 9, 0, 0).unwrap();
    h.monitor.on_mode_tick(morning);

    let stored = h.sink.stored.borrow();
    assert_eq!(stored["20_11_2020_4h0m0_9h0m0_hr_var_measures"].len(), 2);
    assert!(h.monitor.engine().reducer().is_empty());
    assert_eq!(h.labels.0.borrow()["mode"], "Mode: Day");
}

#[test]
fn test_shutdown_writes_json_files() {
    let dir = std::env::temp_dir().join(format!("sleep-agent-{}", uuid::Uuid::new_v4()));
    let sensor = SteadySensor(Rc::new(RefCell::new(Some(rem_sample()))));

    let io = Collaborators {
        sensor: Box::new(sensor),
        sink: Box::new(JsonFileSink::new(&dir)),
        actuator: Box::new(Pulses::default()),
        ui: Box::new(Labels::default()),
        log: create_shared_log(),
    };
    let mut monitor = Monitor::new(&Config::default(), io, Some(5), night()).unwrap();
    monitor.on_mode_tick(night());
    for i in 0..10 {
        monitor.on_record_tick(night() + Duration::seconds(i));
    }
    monitor.shutdown(night() + Duration::seconds(10));

    let files = list_batches(&dir, Some("20_11_2020"), None).unwrap();
    assert_eq!(files.len(), 3);

    let avg = list_batches(&dir, None, Some("hr_avg_measures")).unwrap();
    assert_eq!(load_series(&avg[0]).unwrap(), vec![74.0, 74.0]);

    let _ = std::fs::remove_dir_all(dir);
}

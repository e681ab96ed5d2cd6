//! Configuration for the Synheart Sleep Agent.

use crate::core::clock::Mode;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration for the sleep agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// IANA timezone used to read the wall-clock hour
    pub timezone: String,

    /// Hours delimiting day mode
    pub schedule: ModeSchedule,

    /// Force a mode regardless of the clock (bench testing)
    #[serde(default)]
    pub mode_override: Option<Mode>,

    /// Raw samples reduced into one windowed statistic
    pub window_size: usize,

    /// Batch bound, counted as 3 values per windowed statistic
    pub memory_bound: usize,

    /// REM detection thresholds
    pub thresholds: Thresholds,

    /// Minimum time between two night stimuli
    #[serde(with = "duration_serde")]
    pub vibration_interval: Duration,

    /// Periods of the cooperative timers
    pub timers: TimerConfig,

    /// Day-mode reality check policy
    pub day_stimulus: DayStimulusConfig,

    /// Pattern token handed to the actuator
    pub vibration_pattern: String,

    /// Path for persisted batches and the transparency log
    pub data_path: PathBuf,

    /// Consecutive flush failures before an operator alert
    pub failure_alert_threshold: u32,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("synheart-sleep-agent");

        Self {
            timezone: "UTC".to_string(),
            schedule: ModeSchedule::default(),
            mode_override: None,
            window_size: 5,
            memory_bound: 1080,
            thresholds: Thresholds::default(),
            vibration_interval: Duration::from_secs(60 * 60),
            timers: TimerConfig::default(),
            day_stimulus: DayStimulusConfig::default(),
            vibration_pattern: "ping".to_string(),
            data_path: data_dir,
            failure_alert_threshold: 3,
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_path();

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)
                .map_err(|e| ConfigError::IoError(e.to_string()))?;
            let config: Config = serde_json::from_str(&content)
                .map_err(|e| ConfigError::ParseError(e.to_string()))?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        let config_path = Self::config_path();

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::IoError(e.to_string()))?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(&config_path, content).map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("synheart-sleep-agent")
            .join("config.json")
    }

    /// Directory holding persisted measure batches.
    pub fn measures_path(&self) -> PathBuf {
        self.data_path.join("measures")
    }

    /// Ensure all required directories exist.
    pub fn ensure_directories(&self) -> Result<(), ConfigError> {
        std::fs::create_dir_all(self.measures_path())
            .map_err(|e| ConfigError::IoError(e.to_string()))?;
        Ok(())
    }

    /// Parse the configured timezone.
    pub fn tz(&self) -> Result<Tz, ConfigError> {
        self.timezone
            .parse::<Tz>()
            .map_err(|_| ConfigError::Invalid(format!("unknown timezone '{}'", self.timezone)))
    }

    /// Check every invariant the engine relies on.
    ///
    /// A failure here is fatal: the agent must not start.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.tz()?;

        if self.window_size <= 1 {
            return Err(invalid(format!(
                "window_size must be at least 2, got {}",
                self.window_size
            )));
        }
        if self.memory_bound < 3 {
            return Err(invalid(format!(
                "memory_bound must hold at least one statistic (3 values), got {}",
                self.memory_bound
            )));
        }

        self.schedule.validate()?;
        self.thresholds.validate()?;

        let p = self.day_stimulus.probability;
        if !(0.0..=1.0).contains(&p) {
            return Err(invalid(format!(
                "day_stimulus.probability must be within [0, 1], got {p}"
            )));
        }

        self.timers.validate()?;
        // A fresh statistic must exist at every detection tick.
        let window_span = u32::try_from(self.window_size)
            .ok()
            .and_then(|w| self.timers.record.checked_mul(w))
            .ok_or_else(|| invalid("window_size x timers.record overflows".to_string()))?;
        if self.timers.detect <= window_span {
            return Err(invalid(format!(
                "timers.detect ({}s) must exceed window_size x timers.record ({}s)",
                self.timers.detect.as_secs_f64(),
                window_span.as_secs_f64()
            )));
        }

        if self.vibration_interval.is_zero() {
            return Err(invalid("vibration_interval must be non-zero".to_string()));
        }
        whole_seconds("vibration_interval", self.vibration_interval)?;
        whole_seconds("day_stimulus.message_ttl", self.day_stimulus.message_ttl)?;

        Ok(())
    }
}

/// Hours of the day during which day mode holds: `[day_start_hour, night_start_hour)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModeSchedule {
    pub day_start_hour: u32,
    pub night_start_hour: u32,
}

impl Default for ModeSchedule {
    fn default() -> Self {
        Self {
            day_start_hour: 9,
            night_start_hour: 23,
        }
    }
}

impl ModeSchedule {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.day_start_hour > 24 || self.night_start_hour > 24 {
            return Err(invalid(format!(
                "schedule hours must be within 0..=24, got {}..{}",
                self.day_start_hour, self.night_start_hour
            )));
        }
        if self.day_start_hour >= self.night_start_hour {
            return Err(invalid(format!(
                "schedule.day_start_hour ({}) must precede schedule.night_start_hour ({})",
                self.day_start_hour, self.night_start_hour
            )));
        }
        Ok(())
    }
}

/// Thresholds of the REM heuristic.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    /// Minimum window average heart rate (bpm)
    pub avg_heart_rate: f64,
    /// Maximum window heart-rate variance
    pub hr_variance: f64,
    /// Maximum window acceleration variance
    pub accel_variance: f64,
    /// Hours after midnight at which the firing gate opens
    pub hours_offset: u32,
    /// Width of the firing gate in hours past the offset (inclusive)
    pub gate_span_hours: u32,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            avg_heart_rate: 70.0,
            hr_variance: 10.0,
            accel_variance: 4.0,
            hours_offset: 3,
            gate_span_hours: 7,
        }
    }
}

impl Thresholds {
    fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("avg_heart_rate", self.avg_heart_rate),
            ("hr_variance", self.hr_variance),
            ("accel_variance", self.accel_variance),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(invalid(format!(
                    "thresholds.{name} must be a non-negative number, got {value}"
                )));
            }
        }
        if self.hours_offset > 23 || self.gate_span_hours > 23 {
            return Err(invalid(format!(
                "thresholds.hours_offset and gate_span_hours must be below 24, got {} and {}",
                self.hours_offset, self.gate_span_hours
            )));
        }
        Ok(())
    }
}

/// Periods of the four cooperative timers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerConfig {
    #[serde(with = "duration_serde")]
    pub mode: Duration,
    #[serde(with = "duration_serde")]
    pub day_stimulus: Duration,
    #[serde(with = "duration_serde")]
    pub record: Duration,
    #[serde(with = "duration_serde")]
    pub detect: Duration,
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            mode: Duration::from_secs(60),
            day_stimulus: Duration::from_secs(180),
            record: Duration::from_secs(1),
            detect: Duration::from_secs(30),
        }
    }
}

impl TimerConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.mode.is_zero()
            || self.day_stimulus.is_zero()
            || self.record.is_zero()
            || self.detect.is_zero()
        {
            return Err(invalid("timer periods must be non-zero".to_string()));
        }
        for (name, period) in [
            ("mode", self.mode),
            ("day_stimulus", self.day_stimulus),
            ("record", self.record),
            ("detect", self.detect),
        ] {
            whole_seconds(&format!("timers.{name}"), period)?;
        }
        Ok(())
    }
}

/// Day-mode reality check settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayStimulusConfig {
    /// Chance of a stimulus at each day tick
    pub probability: f64,
    /// Message shown alongside the stimulus
    pub message: String,
    /// How long the message stays on screen
    #[serde(with = "duration_serde")]
    pub message_ttl: Duration,
}

impl Default for DayStimulusConfig {
    fn default() -> Self {
        Self {
            probability: 0.03,
            message: "Are you dreaming?".to_string(),
            message_ttl: Duration::from_secs(10),
        }
    }
}

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    IoError(String),
    ParseError(String),
    SerializeError(String),
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {e}"),
            ConfigError::ParseError(e) => write!(f, "Parse error: {e}"),
            ConfigError::SerializeError(e) => write!(f, "Serialize error: {e}"),
            ConfigError::Invalid(e) => write!(f, "Invalid configuration: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

fn invalid(reason: String) -> ConfigError {
    ConfigError::Invalid(reason)
}

/// Durations are stored as whole seconds; a fraction would not survive a save.
fn whole_seconds(name: &str, duration: Duration) -> Result<(), ConfigError> {
    if duration.subsec_nanos() != 0 {
        return Err(invalid(format!(
            "{name} must be a whole number of seconds, got {}s",
            duration.as_secs_f64()
        )));
    }
    Ok(())
}

/// Serde support for Duration.
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

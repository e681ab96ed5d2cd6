//! Wall-clock to operating-mode classification.

use crate::config::ModeSchedule;
use chrono::{DateTime, Timelike, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// Operating mode of the agent.
///
/// Night enables recording and REM detection, Day enables reality checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Day,
    Night,
}

impl Mode {
    pub fn label(&self) -> &'static str {
        match self {
            Mode::Day => "Day",
            Mode::Night => "Night",
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Result of a classification pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModeUpdate {
    pub mode: Mode,
    /// Whether the mode differs from the previously reported one
    pub changed: bool,
}

/// Maps wall-clock time to a [`Mode`] and tracks changes between calls.
#[derive(Debug, Clone)]
pub struct ModeClassifier {
    schedule: ModeSchedule,
    tz: Tz,
    mode_override: Option<Mode>,
    previous: Option<Mode>,
}

impl ModeClassifier {
    pub fn new(schedule: ModeSchedule, tz: Tz) -> Self {
        Self {
            schedule,
            tz,
            mode_override: None,
            previous: None,
        }
    }

    /// Pin the mode regardless of the clock.
    pub fn with_override(mut self, mode: Option<Mode>) -> Self {
        self.mode_override = mode;
        self
    }

    /// Local hour of `now` in the configured timezone.
    pub fn local_hour(&self, now: DateTime<Utc>) -> u32 {
        now.with_timezone(&self.tz).hour()
    }

    pub fn tz(&self) -> Tz {
        self.tz
    }

    /// Pure classification, no change tracking.
    pub fn classify(&self, now: DateTime<Utc>) -> Mode {
        if let Some(mode) = self.mode_override {
            return mode;
        }
        let hour = self.local_hour(now);
        if hour >= self.schedule.day_start_hour && hour < self.schedule.night_start_hour {
            Mode::Day
        } else {
            Mode::Night
        }
    }

    /// Classify and report whether the mode changed since the last update.
    ///
    /// The first update always reports a change.
    pub fn update(&mut self, now: DateTime<Utc>) -> ModeUpdate {
        let mode = self.classify(now);
        let changed = self.previous != Some(mode);
        self.previous = Some(mode);
        ModeUpdate { mode, changed }
    }

    /// Last mode reported by [`update`](Self::update).
    pub fn current(&self) -> Option<Mode> {
        self.previous
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at_hour(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2020, 11, 19, hour, 30, 0).unwrap()
    }

    fn classifier() -> ModeClassifier {
        ModeClassifier::new(
            ModeSchedule {
                day_start_hour: 9,
                night_start_hour: 23,
            },
            Tz::UTC,
        )
    }

    #[test]
    fn test_day_window_is_half_open() {
        let c = classifier();
        assert_eq!(c.classify(at_hour(8)), Mode::Night);
        assert_eq!(c.classify(at_hour(9)), Mode::Day);
        assert_eq!(c.classify(at_hour(22)), Mode::Day);
        assert_eq!(c.classify(at_hour(23)), Mode::Night);
        assert_eq!(c.classify(at_hour(0)), Mode::Night);
    }

    #[test]
    fn test_change_detection() {
        let mut c = classifier();
        assert!(c.update(at_hour(10)).changed);
        assert!(!c.update(at_hour(11)).changed);

        let update = c.update(at_hour(23));
        assert_eq!(update.mode, Mode::Night);
        assert!(update.changed);
        assert_eq!(c.current(), Some(Mode::Night));
    }

    #[test]
    fn test_timezone_shifts_hour() {
        let c = ModeClassifier::new(ModeSchedule::default(), chrono_tz::Europe::Paris);
        // 08:30 UTC in November is 09:30 in Paris.
        assert_eq!(c.classify(at_hour(8)), Mode::Day);
    }

    #[test]
    fn test_override_wins() {
        let c = classifier().with_override(Some(Mode::Night));
        assert_eq!(c.classify(at_hour(12)), Mode::Night);
    }
}

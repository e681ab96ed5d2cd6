//! Stimulus policies.
//!
//! The day policy fires random reality checks. The night policy is driven by
//! the [`SleepStageDetector`](crate::core::detector::SleepStageDetector) and
//! lives in the engine's detection tick.

use crate::config::DayStimulusConfig;
use crate::core::clock::Mode;
use rand::Rng;
use std::time::Duration;

/// A message to show briefly alongside a stimulus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransientMessage {
    pub text: String,
    /// How long until the message is cleared
    pub ttl: Duration,
}

/// What a day tick decided.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayStimulus {
    pub message: TransientMessage,
}

/// Random reality checks during the day.
///
/// Each tick fires with probability `p`, so the expected spacing between
/// stimuli is `tick / p`.
#[derive(Debug, Clone)]
pub struct DayPolicy {
    probability: f64,
    message: String,
    message_ttl: Duration,
}

impl DayPolicy {
    pub fn new(config: &DayStimulusConfig) -> Self {
        Self {
            probability: config.probability,
            message: config.message.clone(),
            message_ttl: config.message_ttl,
        }
    }

    /// Draw once for this tick.
    pub fn check<R: Rng + ?Sized>(&self, mode: Mode, rng: &mut R) -> Option<DayStimulus> {
        if mode != Mode::Day {
            return None;
        }
        let draw: f64 = rng.gen();
        if draw < self.probability {
            Some(DayStimulus {
                message: TransientMessage {
                    text: self.message.clone(),
                    ttl: self.message_ttl,
                },
            })
        } else {
            None
        }
    }

    /// Expected time between two stimuli for a given tick period.
    pub fn expected_interval(&self, tick: Duration) -> Option<Duration> {
        if self.probability > 0.0 {
            Some(tick.div_f64(self.probability))
        } else {
            None
        }
    }
}

//! Synheart Sleep Agent - REM-cued stimulus for lucid-dream training.
//!
//! This library turns a wearable's heart-rate and accelerometer stream into
//! windowed statistics, stores them in bounded batches, and uses the latest
//! statistics to decide whether the wearer is likely in REM sleep, in which
//! case a vibration is fired. During the day it fires random reality checks.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                       Synheart Sleep Agent                        │
//! ├──────────────────────────────────────────────────────────────────┤
//! │  ┌───────────┐   ┌───────────┐   ┌───────────┐   ┌───────────┐   │
//! │  │ Collector │──▶│  Reducer  │──▶│   Batch   │──▶│  Storage  │   │
//! │  │ (HR, acc) │   │ (W ticks) │   │ (M bound) │   │  (JSON)   │   │
//! │  └───────────┘   └───────────┘   └───────────┘   └───────────┘   │
//! │                        │                                          │
//! │                        ▼ latest                                   │
//! │  ┌───────────┐   ┌───────────┐   ┌───────────┐                    │
//! │  │   Clock   │──▶│ Detector  │──▶│ Actuator  │◀── day policy      │
//! │  │ Day/Night │   │ (cooldown)│   │ (vibrate) │                    │
//! │  └───────────┘   └───────────┘   └───────────┘                    │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use synheart_sleep_agent::{collector, core::SleepEngine, Config};
//! use chrono::Utc;
//!
//! let config = Config::default();
//! let mut engine = SleepEngine::from_config(&config, Utc::now()).expect("valid config");
//!
//! let sample = collector::RawSample::from_readings(64, 0.1, 0.0, 9.8);
//! let outcome = engine.record(sample, Utc::now()).expect("window reduced");
//! if let Some(request) = outcome.flush {
//!     // persist, then confirm
//!     engine.complete_flush(&request);
//! }
//! ```

pub mod collector;
pub mod config;
pub mod core;
pub mod host;
pub mod runtime;
pub mod storage;
pub mod transparency;

// Re-export key types at crate root for convenience
pub use collector::{ChannelSensor, RawSample, SensorReading, SensorSource, SensorUnavailable};
pub use config::{Config, ConfigError, Thresholds};
pub use self::core::{FlushRequest, Mode, SleepEngine, WindowedStat};
pub use host::{ConsoleUi, LogActuator, StimulusActuator, UiSink};
pub use runtime::{Collaborators, Monitor};
pub use storage::{JsonFileSink, MemorySink, PersistenceError, PersistenceSink};
pub use transparency::{SharedTransparencyLog, TransparencyLog, TransparencyStats};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Notice shown before the agent is used.
pub const DISCLAIMER: &str = r#"
╔══════════════════════════════════════════════════════════════════╗
║             SYNHEART SLEEP AGENT - PLEASE READ                   ║
╠══════════════════════════════════════════════════════════════════╣
║                                                                  ║
║  This agent is NOT a medical device.                             ║
║                                                                  ║
║  ✓ WHAT IT DOES:                                                 ║
║    • Averages heart rate and motion over short windows at night  ║
║    • Vibrates when those averages look like REM sleep            ║
║    • Vibrates at random during the day as a reality check        ║
║                                                                  ║
║  ✗ WHAT IT DOES NOT DO:                                          ║
║    • Diagnose sleep disorders or measure sleep quality           ║
║    • Adapt its thresholds to you (they are fixed in the config)  ║
║    • Send your measurements anywhere                             ║
║                                                                  ║
║  Measures stay on this device under the data directory and can   ║
║  be removed at any time with:                                    ║
║    synheart-sleep prune --date <D_M_YYYY>                        ║
║                                                                  ║
╚══════════════════════════════════════════════════════════════════╝
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disclaimer_contents() {
        assert!(DISCLAIMER.contains("NOT a medical device"));
        assert!(DISCLAIMER.contains("reality check"));
        assert!(DISCLAIMER.contains("prune"));
    }
}

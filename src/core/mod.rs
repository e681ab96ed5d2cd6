//! Core functionality for the Synheart Sleep Agent.
//!
//! This module contains:
//! - Mode classification from the wall clock
//! - Reduction of raw samples into windowed statistics
//! - Bounded batching of statistics for persistence
//! - REM detection and stimulus policies
//! - The engine tying them together

pub mod batch;
pub mod clock;
pub mod detector;
pub mod engine;
pub mod reducer;
pub mod stimulus;

// Re-export commonly used types
pub use batch::{BatchBuffer, FlushRequest, VALUES_PER_STAT};
pub use clock::{Mode, ModeClassifier, ModeUpdate};
pub use detector::{CooldownState, SleepStageDetector, Verdict};
pub use engine::{Detection, ModeTransition, RecordOutcome, SleepEngine};
pub use reducer::{reduce_window, round_tenth, ReducerError, SampleReducer, WindowedStat};
pub use stimulus::{DayPolicy, DayStimulus, TransientMessage};

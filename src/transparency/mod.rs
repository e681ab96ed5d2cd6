//! Transparency module for the Synheart Sleep Agent.
//!
//! Tracks what the agent recorded, stored, and triggered during a session
//! without keeping any of the measurements themselves.

pub mod log;

// Re-export commonly used types
pub use log::{
    create_shared_log, create_shared_log_with_persistence, SharedTransparencyLog, TransparencyLog,
    TransparencyStats,
};

//! Session transparency log.
//!
//! Counts what the agent recorded, stored, and triggered, so the wearer can
//! see exactly what happened overnight. No measurement values are kept here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use uuid::Uuid;

/// Counters for the current session.
#[derive(Debug)]
pub struct TransparencyLog {
    /// Raw samples fed to the reducer
    samples_recorded: AtomicU64,
    /// Recording ticks skipped for lack of a reading
    ticks_skipped: AtomicU64,
    /// Windowed statistics emitted
    windows_emitted: AtomicU64,
    /// Batches persisted
    batches_flushed: AtomicU64,
    /// Failed persistence attempts
    flush_failures: AtomicU64,
    /// REM-cued vibrations
    night_stimuli: AtomicU64,
    /// Reality-check vibrations
    day_stimuli: AtomicU64,
    /// Unique identifier of this session
    session_id: Uuid,
    /// Session start time
    session_start: DateTime<Utc>,
    /// Where cumulative totals are written
    persist_path: Option<PathBuf>,
}

impl TransparencyLog {
    pub fn new() -> Self {
        Self {
            samples_recorded: AtomicU64::new(0),
            ticks_skipped: AtomicU64::new(0),
            windows_emitted: AtomicU64::new(0),
            batches_flushed: AtomicU64::new(0),
            flush_failures: AtomicU64::new(0),
            night_stimuli: AtomicU64::new(0),
            day_stimuli: AtomicU64::new(0),
            session_id: Uuid::new_v4(),
            session_start: Utc::now(),
            persist_path: None,
        }
    }

    /// Create a log that accumulates on top of previously saved totals.
    pub fn with_persistence(path: PathBuf) -> Self {
        let mut log = Self::new();
        log.persist_path = Some(path);

        if let Err(e) = log.load() {
            tracing::warn!("could not load previous transparency stats: {e}");
        }

        log
    }

    /// Read the totals saved at `path` without starting a session.
    ///
    /// Returns `None` when nothing has been saved yet. Unlike
    /// [`with_persistence`](Self::with_persistence), a corrupt file is an error.
    pub fn open_persisted(path: PathBuf) -> Result<Option<Self>, std::io::Error> {
        if !path.exists() {
            return Ok(None);
        }
        let mut log = Self::new();
        log.persist_path = Some(path);
        log.load()?;
        Ok(Some(log))
    }

    pub fn record_sample(&self) {
        self.samples_recorded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_skipped_tick(&self) {
        self.ticks_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_window(&self) {
        self.windows_emitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_flush(&self) {
        self.batches_flushed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_flush_failure(&self) {
        self.flush_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_night_stimulus(&self) {
        self.night_stimuli.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_day_stimulus(&self) {
        self.day_stimuli.fetch_add(1, Ordering::Relaxed);
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn stats(&self) -> TransparencyStats {
        TransparencyStats {
            samples_recorded: self.samples_recorded.load(Ordering::Relaxed),
            ticks_skipped: self.ticks_skipped.load(Ordering::Relaxed),
            windows_emitted: self.windows_emitted.load(Ordering::Relaxed),
            batches_flushed: self.batches_flushed.load(Ordering::Relaxed),
            flush_failures: self.flush_failures.load(Ordering::Relaxed),
            night_stimuli: self.night_stimuli.load(Ordering::Relaxed),
            day_stimuli: self.day_stimuli.load(Ordering::Relaxed),
            session_start: self.session_start,
            session_duration_secs: (Utc::now() - self.session_start).num_seconds().max(0) as u64,
        }
    }

    /// Human-readable session report.
    pub fn summary(&self) -> String {
        let stats = self.stats();
        format!(
            "Session Statistics:\n\
             - Samples recorded: {}\n\
             - Ticks skipped (no reading): {}\n\
             - Windows emitted: {}\n\
             - Batches stored: {}\n\
             - Storage failures: {}\n\
             - Night vibrations: {}\n\
             - Reality checks: {}\n\
             - Session duration: {} seconds",
            stats.samples_recorded,
            stats.ticks_skipped,
            stats.windows_emitted,
            stats.batches_flushed,
            stats.flush_failures,
            stats.night_stimuli,
            stats.day_stimuli,
            stats.session_duration_secs
        )
    }

    /// Save stats to disk.
    pub fn save(&self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            let stats = self.stats();
            let persisted = PersistedStats {
                samples_recorded: stats.samples_recorded,
                ticks_skipped: stats.ticks_skipped,
                windows_emitted: stats.windows_emitted,
                batches_flushed: stats.batches_flushed,
                flush_failures: stats.flush_failures,
                night_stimuli: stats.night_stimuli,
                day_stimuli: stats.day_stimuli,
                last_session: self.session_id,
                last_updated: Utc::now(),
            };

            let json = serde_json::to_string_pretty(&persisted).map_err(std::io::Error::other)?;

            std::fs::write(path, json)?;
        }
        Ok(())
    }

    fn load(&mut self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if path.exists() {
                let content = std::fs::read_to_string(path)?;
                let persisted: PersistedStats =
                    serde_json::from_str(&content).map_err(std::io::Error::other)?;

                self.samples_recorded
                    .store(persisted.samples_recorded, Ordering::Relaxed);
                self.ticks_skipped
                    .store(persisted.ticks_skipped, Ordering::Relaxed);
                self.windows_emitted
                    .store(persisted.windows_emitted, Ordering::Relaxed);
                self.batches_flushed
                    .store(persisted.batches_flushed, Ordering::Relaxed);
                self.flush_failures
                    .store(persisted.flush_failures, Ordering::Relaxed);
                self.night_stimuli
                    .store(persisted.night_stimuli, Ordering::Relaxed);
                self.day_stimuli
                    .store(persisted.day_stimuli, Ordering::Relaxed);
            }
        }
        Ok(())
    }

    /// Reset all counters.
    pub fn reset(&self) {
        for counter in [
            &self.samples_recorded,
            &self.ticks_skipped,
            &self.windows_emitted,
            &self.batches_flushed,
            &self.flush_failures,
            &self.night_stimuli,
            &self.day_stimuli,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

impl Default for TransparencyLog {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransparencyStats {
    pub samples_recorded: u64,
    pub ticks_skipped: u64,
    pub windows_emitted: u64,
    pub batches_flushed: u64,
    pub flush_failures: u64,
    pub night_stimuli: u64,
    pub day_stimuli: u64,
    pub session_start: DateTime<Utc>,
    pub session_duration_secs: u64,
}

/// On-disk form of the cumulative totals.
#[derive(Debug, Serialize, Deserialize)]
struct PersistedStats {
    samples_recorded: u64,
    ticks_skipped: u64,
    windows_emitted: u64,
    batches_flushed: u64,
    flush_failures: u64,
    night_stimuli: u64,
    day_stimuli: u64,
    last_session: Uuid,
    last_updated: DateTime<Utc>,
}

/// Log shared between the monitor and the CLI.
pub type SharedTransparencyLog = Arc<TransparencyLog>;

pub fn create_shared_log() -> SharedTransparencyLog {
    Arc::new(TransparencyLog::new())
}

pub fn create_shared_log_with_persistence(path: PathBuf) -> SharedTransparencyLog {
    Arc::new(TransparencyLog::with_persistence(path))
}

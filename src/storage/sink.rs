//! Persistence sinks for measure series.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Errors raised by a persistence sink.
#[derive(Debug)]
pub enum PersistenceError {
    Io(String),
    Serialize(String),
}

impl std::fmt::Display for PersistenceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PersistenceError::Io(e) => write!(f, "Storage IO error: {e}"),
            PersistenceError::Serialize(e) => write!(f, "Storage serialize error: {e}"),
        }
    }
}

impl std::error::Error for PersistenceError {}

/// Host storage for measure series.
pub trait PersistenceSink {
    fn store(&mut self, key: &str, series: &[f64]) -> Result<(), PersistenceError>;
}

/// Writes each series as a JSON array to `<dir>/<key>.json`.
#[derive(Debug, Clone)]
pub struct JsonFileSink {
    dir: PathBuf,
}

impl JsonFileSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl PersistenceSink for JsonFileSink {
    fn store(&mut self, key: &str, series: &[f64]) -> Result<(), PersistenceError> {
        std::fs::create_dir_all(&self.dir).map_err(|e| PersistenceError::Io(e.to_string()))?;

        let json =
            serde_json::to_string(series).map_err(|e| PersistenceError::Serialize(e.to_string()))?;

        std::fs::write(self.path_for(key), json).map_err(|e| PersistenceError::Io(e.to_string()))
    }
}

/// Keeps series in memory. Useful on hosts without storage and in tests.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    pub stored: HashMap<String, Vec<f64>>,
    /// Reject every write
    pub fail_writes: bool,
}

impl PersistenceSink for MemorySink {
    fn store(&mut self, key: &str, series: &[f64]) -> Result<(), PersistenceError> {
        if self.fail_writes {
            return Err(PersistenceError::Io("storage unavailable".to_string()));
        }
        self.stored.insert(key.to_string(), series.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_file_sink_writes_array() {
        let dir = std::env::temp_dir().join(format!("sink-{}", uuid::Uuid::new_v4()));
        let mut sink = JsonFileSink::new(&dir);

        sink.store("19_11_2020_23h0m0_2h0m0_hr_avg_measures", &[64.0, 65.5])
            .unwrap();

        let content =
            std::fs::read_to_string(sink.path_for("19_11_2020_23h0m0_2h0m0_hr_avg_measures"))
                .unwrap();
        assert_eq!(content, "[64.0,65.5]");

        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn test_json_file_sink_reports_io_errors() {
        let file = std::env::temp_dir().join(format!("not-a-dir-{}", uuid::Uuid::new_v4()));
        std::fs::write(&file, "occupied").unwrap();

        let mut sink = JsonFileSink::new(&file);
        let err = sink.store("key", &[1.0]).unwrap_err();
        assert!(matches!(err, PersistenceError::Io(_)));

        let _ = std::fs::remove_file(file);
    }
}

//! Browsing and housekeeping of stored measure files.

use crate::core::reducer::round_tenth;
use crate::storage::sink::PersistenceError;
use std::path::{Path, PathBuf};

/// Values printed per line by [`format_series`].
pub const SERIES_PER_LINE: usize = 40;

/// List stored series files, oldest name first.
///
/// `date_prefix` (e.g. `19_11_2020`) and `suffix` (e.g. `acc_var_measures`)
/// narrow the match when given. A missing directory yields an empty list.
pub fn list_batches(
    dir: &Path,
    date_prefix: Option<&str>,
    suffix: Option<&str>,
) -> Result<Vec<PathBuf>, PersistenceError> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(PersistenceError::Io(e.to_string())),
    };

    let mut files: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.extension().map(|e| e == "json").unwrap_or(false))
        .filter(|p| {
            let Some(stem) = p.file_stem().and_then(|s| s.to_str()) else {
                return false;
            };
            date_prefix.map_or(true, |d| matches_date(stem, d))
                && suffix.map_or(true, |s| stem.ends_with(s))
        })
        .collect();

    files.sort();
    Ok(files)
}

/// `19_11_2020` must not match `9_11_2020_...`, nor `1_11_2020` match `11_11_2020`.
fn matches_date(stem: &str, date: &str) -> bool {
    stem.strip_prefix(date)
        .map(|rest| rest.starts_with('_'))
        .unwrap_or(false)
}

/// Read one stored series.
pub fn load_series(path: &Path) -> Result<Vec<f64>, PersistenceError> {
    let content = std::fs::read_to_string(path).map_err(|e| PersistenceError::Io(e.to_string()))?;
    serde_json::from_str(&content).map_err(|e| PersistenceError::Serialize(e.to_string()))
}

/// Render a series rounded to one decimal, `per_line` values per line.
pub fn format_series(series: &[f64], per_line: usize) -> Vec<String> {
    series
        .chunks(per_line.max(1))
        .map(|chunk| {
            chunk
                .iter()
                .map(|v| round_tenth(*v).to_string())
                .collect::<Vec<_>>()
                .join(", ")
        })
        .collect()
}

/// Delete every stored series of one date. Returns the removed paths.
pub fn prune_batches(dir: &Path, date_prefix: &str) -> Result<Vec<PathBuf>, PersistenceError> {
    let files = list_batches(dir, Some(date_prefix), None)?;
    for file in &files {
        std::fs::remove_file(file).map_err(|e| PersistenceError::Io(e.to_string()))?;
    }
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("batches-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn touch(dir: &Path, name: &str) {
        std::fs::write(dir.join(name), "[1.0]").unwrap();
    }

    #[test]
    fn test_list_filters_by_date_and_suffix() {
        let dir = scratch_dir();
        touch(&dir, "19_11_2020_23h0m0_2h0m0_hr_avg_measures.json");
        touch(&dir, "19_11_2020_23h0m0_2h0m0_acc_var_measures.json");
        touch(&dir, "9_11_2020_23h0m0_2h0m0_acc_var_measures.json");
        touch(&dir, "notes.txt");

        assert_eq!(list_batches(&dir, None, None).unwrap().len(), 3);
        assert_eq!(list_batches(&dir, Some("19_11_2020"), None).unwrap().len(), 2);

        let acc = list_batches(&dir, Some("19_11_2020"), Some("acc_var_measures")).unwrap();
        assert_eq!(acc.len(), 1);
        assert!(acc[0].to_string_lossy().contains("19_11_2020_23h0m0"));

        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn test_missing_dir_lists_nothing() {
        let dir = std::env::temp_dir().join(format!("absent-{}", uuid::Uuid::new_v4()));
        assert!(list_batches(&dir, None, None).unwrap().is_empty());
    }

    #[test]
    fn test_format_series_chunks() {
        let series: Vec<f64> = (0..85).map(|i| i as f64 + 0.04).collect();
        let lines = format_series(&series, SERIES_PER_LINE);
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("0, 1, 2"));
        assert_eq!(lines[2], "80, 81, 82, 83, 84");
    }

    #[test]
    fn test_prune_removes_only_matching_date() {
        let dir = scratch_dir();
        touch(&dir, "19_11_2020_23h0m0_2h0m0_hr_avg_measures.json");
        touch(&dir, "20_11_2020_23h0m0_2h0m0_hr_avg_measures.json");

        let removed = prune_batches(&dir, "19_11_2020").unwrap();
        assert_eq!(removed.len(), 1);
        assert_eq!(list_batches(&dir, None, None).unwrap().len(), 1);

        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn test_load_series() {
        let dir = scratch_dir();
        let path = dir.join("x.json");
        std::fs::write(&path, "[64.0, 8.5]").unwrap();
        assert_eq!(load_series(&path).unwrap(), vec![64.0, 8.5]);
        let _ = std::fs::remove_dir_all(dir);
    }
}

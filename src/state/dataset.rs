use std::collections::HashSet;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use super::data::{CalibrationImageRecord, DetectionState};
use crate::error::DatasetError;

/// Counts produced by one reconciliation pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub added: usize,
    pub removed: usize,
}

/// The Dataset tracks the calibration images in the backing directory.
///
/// Records keep their insertion order, so an index obtained before a
/// reconciliation still names the same file unless that file was dropped.
/// Only the coordinator mutates a Dataset; workers get filename snapshots.
pub struct Dataset {
    directory: PathBuf,
    records: Vec<CalibrationImageRecord>,
}

impl Dataset {
    /// Create an empty dataset backed by `directory`.
    /// Nothing is read until the first `rescan`.
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            records: Vec::new(),
        }
    }

    /// Get the backing image directory
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// List the regular files directly inside `directory`, sorted by name.
    /// A missing or unreadable directory lists as empty.
    pub fn list_directory(directory: &Path) -> Vec<String> {
        if !directory.is_dir() {
            return Vec::new();
        }

        let mut filenames: Vec<String> = WalkDir::new(directory)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.file_name().to_string_lossy().to_string())
            .collect();

        filenames.sort();
        filenames
    }

    /// List the backing directory and reconcile against it
    pub fn rescan(&mut self) -> ReconcileReport {
        let listing = Self::list_directory(&self.directory);
        self.reconcile(&listing)
    }

    /// Synchronize the records with a directory listing.
    ///
    /// Records for files that are still listed keep their position and their
    /// detection state. Unlisted records are dropped. Newly listed files are
    /// appended as `Unknown` in listing order.
    pub fn reconcile(&mut self, listing: &[String]) -> ReconcileReport {
        let listed: HashSet<&str> = listing.iter().map(String::as_str).collect();

        let before = self.records.len();
        self.records.retain(|r| listed.contains(r.filename.as_str()));
        let removed = before - self.records.len();

        let mut known: HashSet<String> =
            self.records.iter().map(|r| r.filename.clone()).collect();
        let mut added = 0;
        for filename in listing {
            if known.insert(filename.clone()) {
                self.records.push(CalibrationImageRecord::new(filename.clone()));
                added += 1;
            }
        }

        if added > 0 || removed > 0 {
            log::debug!(
                "Reconciled {}: {} added, {} removed, {} total",
                self.directory.display(),
                added,
                removed,
                self.records.len()
            );
        }

        ReconcileReport { added, removed }
    }

    /// Record a detection outcome.
    /// Returns false when the file has left the dataset in the meantime.
    pub fn apply_detection_result(&mut self, filename: &str, found: bool) -> bool {
        match self.records.iter_mut().find(|r| r.filename == filename) {
            Some(record) => {
                record.detection_state = DetectionState::from_found(found);
                true
            }
            None => {
                log::debug!("Dropping detection result for vanished {}", filename);
                false
            }
        }
    }

    /// Delete the backing file and then its record.
    ///
    /// The record is kept when the file cannot be deleted. A file that is
    /// already gone counts as deleted.
    pub fn remove(&mut self, filename: &str) -> Result<(), DatasetError> {
        let index = self
            .position(filename)
            .ok_or_else(|| DatasetError::UnknownRecord(filename.to_string()))?;

        let path = self.directory.join(filename);
        match std::fs::remove_file(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::warn!("{} was already gone", path.display());
            }
            Err(source) => return Err(DatasetError::Delete { path, source }),
        }

        self.records.remove(index);
        log::info!("Deleted {}", path.display());
        Ok(())
    }

    /// Index of `filename` in the current ordering
    pub fn position(&self, filename: &str) -> Option<usize> {
        self.records.iter().position(|r| r.filename == filename)
    }

    pub fn get(&self, index: usize) -> Option<&CalibrationImageRecord> {
        self.records.get(index)
    }

    pub fn records(&self) -> &[CalibrationImageRecord] {
        &self.records
    }

    /// Owned copy of the filenames, in order, for handing to a worker
    pub fn filenames(&self) -> Vec<String> {
        self.records.iter().map(|r| r.filename.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

// Implement Debug without dumping every record
impl std::fmt::Debug for Dataset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dataset")
            .field("directory", &self.directory)
            .field("records", &self.records.len())
            .finish()
    }
}

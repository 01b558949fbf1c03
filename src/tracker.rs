//! Per-file change tracking, persisted as `metadata.json`.
//!
//! The document maps each root-relative path to the modification time seen
//! when the file was last indexed. A file is reindexed only when its current
//! mtime is strictly newer.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use crate::error::Result;
use crate::models::IndexedFileRecord;

pub const METADATA_FILE: &str = "metadata.json";

#[derive(Debug)]
pub struct ChangeTracker {
    path: PathBuf,
    records: BTreeMap<String, IndexedFileRecord>,
}

impl ChangeTracker {
    /// Load the tracker document from `index_dir`.
    ///
    /// A missing or unreadable document is treated as empty, which forces a
    /// full reindex.
    pub fn load(index_dir: &Path) -> Self {
        let path = index_dir.join(METADATA_FILE);
        let records = match std::fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(records) => records,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "change tracker corrupt, starting empty");
                    BTreeMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "change tracker unreadable, starting empty");
                BTreeMap::new()
            }
        };

        Self { path, records }
    }

    pub fn should_index(&self, abs_path: &Path, rel_path: &str, force: bool) -> bool {
        if force {
            return true;
        }
        let Some(record) = self.records.get(rel_path) else {
            return true;
        };
        match file_mtime(abs_path) {
            Ok(mtime) => mtime > record.mtime,
            Err(_) => true,
        }
    }

    /// Record `rel_path` as indexed at `mtime`, which must have been captured
    /// before the file was read.
    pub fn record(&mut self, rel_path: &str, mtime: f64) {
        self.records.insert(
            rel_path.to_string(),
            IndexedFileRecord {
                mtime,
                last_indexed: chrono::Utc::now().to_rfc3339(),
            },
        );
    }

    pub fn remove(&mut self, rel_path: &str) -> Option<IndexedFileRecord> {
        self.records.remove(rel_path)
    }

    pub fn get(&self, rel_path: &str) -> Option<&IndexedFileRecord> {
        self.records.get(rel_path)
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.records.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Write the document via a temporary file and rename.
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        let json = serde_json::to_string_pretty(&self.records)?;
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

/// Modification time in fractional seconds since the Unix epoch.
pub fn file_mtime(path: &Path) -> std::io::Result<f64> {
    let modified = std::fs::metadata(path)?.modified()?;
    let secs = modified
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0);
    Ok(secs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::{Duration, SystemTime};

    fn set_mtime(path: &Path, time: SystemTime) {
        let file = fs::OpenOptions::new().write(true).open(path).unwrap();
        file.set_modified(time).unwrap();
    }

    #[test]
    fn test_unknown_file_needs_indexing() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.py");
        fs::write(&file, "x = 1").unwrap();

        let tracker = ChangeTracker::load(dir.path());
        assert!(tracker.should_index(&file, "a.py", false));
    }

    #[test]
    fn test_requires_strictly_newer_mtime() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.py");
        fs::write(&file, "x = 1").unwrap();
        let t0 = SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000);
        set_mtime(&file, t0);

        let mut tracker = ChangeTracker::load(dir.path());
        tracker.record("a.py", file_mtime(&file).unwrap());
        assert!(!tracker.should_index(&file, "a.py", false));
        assert!(tracker.should_index(&file, "a.py", true));

        set_mtime(&file, t0 + Duration::from_secs(5));
        assert!(tracker.should_index(&file, "a.py", false));
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let index_dir = dir.path().join(".oracle_index");

        let mut tracker = ChangeTracker::load(&index_dir);
        tracker.record("src/lib.rs", 12.5);
        tracker.save().unwrap();

        let reloaded = ChangeTracker::load(&index_dir);
        assert_eq!(reloaded.len(), 1);
        let record = reloaded.get("src/lib.rs").unwrap();
        assert_eq!(record.mtime, 12.5);
        assert!(chrono::DateTime::parse_from_rfc3339(&record.last_indexed).is_ok());
        assert!(!index_dir.join("metadata.json.tmp").exists());
    }

    #[test]
    fn test_corrupt_document_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(METADATA_FILE), "{not json").unwrap();

        let tracker = ChangeTracker::load(dir.path());
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_remove() {
        let dir = tempfile::tempdir().unwrap();
        let mut tracker = ChangeTracker::load(dir.path());
        tracker.record("gone.rs", 1.0);
        assert!(tracker.remove("gone.rs").is_some());
        assert!(tracker.remove("gone.rs").is_none());
    }
}

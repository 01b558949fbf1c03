//! Directory walk producing the files eligible for indexing.
//!
//! Hidden entries (any path component starting with `.`) and the index
//! directory itself are pruned, `target/` and `node_modules/` are excluded by
//! default, and `index.exclude_globs` adds more. Results are sorted by
//! relative path.
//!
//! Entries the walk could not read are reported in [`ScanOutcome::failures`]
//! rather than silently dropped: a path missing from the listing is only
//! known to be gone when no failure covers it.

use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

use crate::config::IndexConfig;
use crate::error::{OracleError, Result};

/// A file found under the root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedFile {
    pub abs_path: PathBuf,
    /// Root-relative, `/`-separated.
    pub rel_path: String,
}

/// A path the walk could not read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanFailure {
    /// Root-relative, `/`-separated; empty when the failure could not be
    /// attributed to a path under the root.
    pub rel_path: String,
    pub error: String,
}

impl ScanFailure {
    /// Whether `rel_path` is this path or lies beneath it.
    pub fn covers(&self, rel_path: &str) -> bool {
        self.rel_path.is_empty()
            || rel_path == self.rel_path
            || rel_path
                .strip_prefix(self.rel_path.as_str())
                .is_some_and(|rest| rest.starts_with('/'))
    }
}

#[derive(Debug, Clone, Default)]
pub struct ScanOutcome {
    pub files: Vec<ScannedFile>,
    pub failures: Vec<ScanFailure>,
}

impl ScanOutcome {
    /// True when a walk failure may be hiding `rel_path`.
    pub fn is_obscured(&self, rel_path: &str) -> bool {
        self.failures.iter().any(|f| f.covers(rel_path))
    }
}

pub fn scan_tree(root: &Path, index_dir: &Path, config: &IndexConfig) -> Result<ScanOutcome> {
    if !root.is_dir() {
        return Err(OracleError::InvalidInput(format!(
            "index root is not a directory: {}",
            root.display()
        )));
    }

    let mut excludes = vec![
        "**/target/**".to_string(),
        "**/node_modules/**".to_string(),
    ];
    excludes.extend(config.exclude_globs.iter().cloned());
    let exclude_set = build_globset(&excludes)?;

    let mut outcome = ScanOutcome::default();

    let walker = WalkDir::new(root)
        .follow_links(config.follow_symlinks)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || (!is_hidden(e) && e.path() != index_dir));

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                let rel_path = e
                    .path()
                    .and_then(|p| p.strip_prefix(root).ok())
                    .map(relative_key)
                    .unwrap_or_default();
                tracing::warn!(path = %rel_path, error = %e, "skipping unreadable directory entry");
                outcome.failures.push(ScanFailure {
                    rel_path,
                    error: e.to_string(),
                });
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let Ok(relative) = path.strip_prefix(root) else {
            continue;
        };
        let rel_path = relative_key(relative);

        if exclude_set.is_match(&rel_path) {
            continue;
        }

        match entry.metadata() {
            Ok(meta) if meta.len() > config.max_file_bytes => {
                tracing::debug!(file = %rel_path, bytes = meta.len(), "skipping oversized file");
                continue;
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(file = %rel_path, error = %e, "cannot stat file");
                outcome.failures.push(ScanFailure {
                    rel_path,
                    error: e.to_string(),
                });
                continue;
            }
        }

        outcome.files.push(ScannedFile {
            abs_path: path.to_path_buf(),
            rel_path,
        });
    }

    outcome.files.sort_by(|a, b| a.rel_path.cmp(&b.rel_path));
    Ok(outcome)
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .is_some_and(|name| name.starts_with('.'))
}

fn relative_key(relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern).map_err(|e| {
            OracleError::InvalidInput(format!("invalid exclude glob '{}': {}", pattern, e))
        })?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|e| OracleError::InvalidInput(format!("invalid exclude globs: {}", e)))
}

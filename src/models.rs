//! Core data types shared across the pipeline.

use serde::{Deserialize, Serialize};

/// A retrievable unit of source text: a declaration or a fixed-size window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Chunk {
    pub text: String,
    pub symbol: Option<String>,
    pub kind: String,
    /// 1-based.
    pub start_line: usize,
    /// Root-relative path, `/`-separated.
    pub file: String,
    pub language: Option<String>,
}

/// Metadata written alongside every code chunk.
///
/// Only `file` is guaranteed; consumers must tolerate the rest being absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub file: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_line: Option<usize>,
}

impl ChunkMetadata {
    pub fn from_chunk(chunk: &Chunk) -> Self {
        Self {
            file: chunk.file.clone(),
            symbol: chunk.symbol.clone(),
            kind: Some(chunk.kind.clone()),
            language: chunk.language.clone(),
            start_line: Some(chunk.start_line),
        }
    }

    /// Fallback windows carry nothing beyond the file and kind.
    pub fn fallback(file: &str) -> Self {
        Self {
            file: file.to_string(),
            kind: Some("fallback".to_string()),
            ..Default::default()
        }
    }
}

/// A document as stored in a vector collection.
///
/// `embedding == None` asks the store to compute it from `document`.
#[derive(Debug, Clone)]
pub struct VectorRecord {
    pub id: String,
    /// Path the record belongs to; `None` for records not tied to a file.
    pub file: Option<String>,
    pub document: String,
    pub metadata: serde_json::Value,
    pub embedding: Option<Vec<f32>>,
}

/// One nearest-neighbour result from a store.
#[derive(Debug, Clone)]
pub struct StoredHit {
    pub id: String,
    pub document: String,
    pub metadata: serde_json::Value,
    pub score: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryHit {
    pub content: String,
    pub metadata: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResponse {
    pub query: String,
    pub results: Vec<QueryHit>,
    /// Sorted, de-duplicated `metadata.file` values across `results`.
    pub files: Vec<String>,
}

/// One line of the project memory log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryEntry {
    pub query: String,
    pub files: Vec<String>,
    #[serde(default)]
    pub insight: Option<String>,
    /// RFC 3339.
    pub timestamp: String,
}

/// Change-tracker record for a single file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedFileRecord {
    /// Seconds since the Unix epoch, fractional.
    pub mtime: f64,
    /// RFC 3339.
    pub last_indexed: String,
}

/// Summary returned by a build.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BuildReport {
    pub files_scanned: usize,
    pub files_indexed: usize,
    pub files_unchanged: usize,
    /// Files indexed through line windows instead of syntax chunks.
    pub files_fallback: usize,
    pub files_failed: usize,
    /// Binary files recorded but not chunked.
    pub files_skipped: usize,
    pub files_removed: usize,
    pub chunks_written: usize,
    pub total_chunks: u64,
    pub duration_ms: u64,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Overview {
    /// `"ready"` when the chunk collection is non-empty, else `"empty"`.
    pub status: String,
    pub root: String,
    pub total_chunks: u64,
    pub tracked_files: usize,
    pub memory_entries: u64,
    pub supported_languages: Vec<String>,
    pub loaded_languages: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymbolUsages {
    pub symbol: String,
    pub found_in_files: Vec<String>,
}

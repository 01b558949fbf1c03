//! Per-file indexing: read, chunk, embed, write, record.
//!
//! Each file is processed to completion before the caller moves on, and its
//! records replace every previous record for that path in one store call, so
//! a crash leaves each file either fully old or fully new.

use std::path::Path;

use crate::chunk;
use crate::config::ChunkingConfig;
use crate::error::{OracleError, Result};
use crate::fallback;
use crate::languages::{detect_language, Lang};
use crate::models::{Chunk, ChunkMetadata, VectorRecord};
use crate::parser::ParserRegistry;
use crate::scan::ScannedFile;
use crate::store::{VectorStore, CHUNK_COLLECTION};
use crate::tracker::{file_mtime, ChangeTracker};

/// Bytes inspected for a NUL when deciding whether a file is binary.
const BINARY_SNIFF_BYTES: usize = 8192;

/// How a file ended up in the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOutcome {
    Syntax { chunks: usize },
    Fallback { chunks: usize },
    /// Binary content; tracked but not chunked.
    Skipped,
}

impl FileOutcome {
    pub fn chunks(self) -> usize {
        match self {
            Self::Syntax { chunks } | Self::Fallback { chunks } => chunks,
            Self::Skipped => 0,
        }
    }
}

pub struct IndexWriter<'a> {
    registry: &'a ParserRegistry,
    store: &'a dyn VectorStore,
    chunking: &'a ChunkingConfig,
}

impl<'a> IndexWriter<'a> {
    pub fn new(
        registry: &'a ParserRegistry,
        store: &'a dyn VectorStore,
        chunking: &'a ChunkingConfig,
    ) -> Self {
        Self {
            registry,
            store,
            chunking,
        }
    }

    /// Index one file and update its change-tracker record.
    ///
    /// A read failure returns [`OracleError::UnreadableFile`] and leaves the
    /// tracker untouched so the file is retried on the next build.
    pub async fn index_file(
        &self,
        tracker: &mut ChangeTracker,
        file: &ScannedFile,
    ) -> Result<FileOutcome> {
        let unreadable = |source| OracleError::UnreadableFile {
            path: file.abs_path.clone(),
            source,
        };

        // Captured before the read so an edit during indexing is seen next time.
        let mtime = file_mtime(&file.abs_path).map_err(unreadable)?;
        let bytes = tokio::fs::read(&file.abs_path).await.map_err(unreadable)?;

        let Some(source) = decode_source(&bytes) else {
            self.store
                .delete_file(CHUNK_COLLECTION, &file.rel_path)
                .await?;
            tracker.record(&file.rel_path, mtime);
            tracing::debug!(file = %file.rel_path, "binary file skipped");
            return Ok(FileOutcome::Skipped);
        };

        let lang = detect_language(Path::new(&file.rel_path));

        let chunks = self.syntax_chunks(lang, &source, &file.rel_path);
        let outcome = if chunks.is_empty() {
            let records = self.fallback_records(&source, &file.rel_path)?;
            let written = self
                .store
                .replace_file(CHUNK_COLLECTION, &file.rel_path, records)
                .await?;
            FileOutcome::Fallback { chunks: written }
        } else {
            let records = self.syntax_records(chunks).await?;
            let written = self
                .store
                .replace_file(CHUNK_COLLECTION, &file.rel_path, records)
                .await?;
            FileOutcome::Syntax { chunks: written }
        };

        tracker.record(&file.rel_path, mtime);
        Ok(outcome)
    }

    fn syntax_chunks(&self, lang: Option<Lang>, source: &str, rel_path: &str) -> Vec<Chunk> {
        let Some(lang) = lang else {
            return Vec::new();
        };

        let tree = match self.registry.parse(lang, source) {
            Ok(Some(tree)) => tree,
            Ok(None) => return Vec::new(),
            Err(e) => {
                tracing::warn!(file = %rel_path, error = %e, "parse failed, using fallback chunking");
                return Vec::new();
            }
        };

        let chunks = chunk::extract(
            &tree,
            source,
            rel_path,
            Some(lang.id()),
            self.chunking.min_syntax_chars,
        );
        if chunks.is_empty() {
            tracing::debug!(file = %rel_path, "no declarations extracted, using fallback chunking");
        }
        chunks
    }

    /// Syntax chunks are embedded here with a single provider call.
    async fn syntax_records(&self, chunks: Vec<Chunk>) -> Result<Vec<VectorRecord>> {
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let embeddings = self
            .store
            .embedder()
            .embed(&texts)
            .await
            .map_err(OracleError::Embedding)?;
        if embeddings.len() != chunks.len() {
            return Err(OracleError::Embedding(anyhow::anyhow!(
                "provider returned {} vectors for {} chunks",
                embeddings.len(),
                chunks.len()
            )));
        }

        chunks
            .into_iter()
            .zip(embeddings)
            .enumerate()
            .map(|(ordinal, (chunk, embedding))| -> Result<VectorRecord> {
                Ok(VectorRecord {
                    id: format!("{}:{}", chunk.file, ordinal),
                    file: Some(chunk.file.clone()),
                    metadata: serde_json::to_value(ChunkMetadata::from_chunk(&chunk))?,
                    document: chunk.text,
                    embedding: Some(embedding),
                })
            })
            .collect()
    }

    /// Fallback windows leave embedding to the store.
    fn fallback_records(&self, source: &str, rel_path: &str) -> Result<Vec<VectorRecord>> {
        let metadata = serde_json::to_value(ChunkMetadata::fallback(rel_path))?;
        let records = fallback::chunk_text(
            source,
            self.chunking.fallback_window_lines,
            self.chunking.fallback_overlap_lines,
            self.chunking.min_fallback_chars,
        )
        .into_iter()
        .map(|w| VectorRecord {
            id: format!("{}:fb_{}", rel_path, w.offset),
            file: Some(rel_path.to_string()),
            document: w.text,
            metadata: metadata.clone(),
            embedding: None,
        })
        .collect();
        Ok(records)
    }
}

/// Decode file bytes as text, or `None` for binary content.
///
/// UTF-16 is recognised by its byte-order mark, or without one when the
/// sniffed prefix alternates NUL and non-NUL bytes. Everything else is
/// binary if the prefix contains a NUL and lossy UTF-8 otherwise.
fn decode_source(bytes: &[u8]) -> Option<String> {
    match bytes {
        [0xFF, 0xFE, rest @ ..] => return Some(decode_utf16(rest, u16::from_le_bytes)),
        [0xFE, 0xFF, rest @ ..] => return Some(decode_utf16(rest, u16::from_be_bytes)),
        _ => {}
    }

    let sample = &bytes[..bytes.len().min(BINARY_SNIFF_BYTES)];
    if !sample.contains(&0) {
        return Some(String::from_utf8_lossy(bytes).into_owned());
    }

    match utf16_order(sample) {
        Some(Utf16Order::Le) => Some(decode_utf16(bytes, u16::from_le_bytes)),
        Some(Utf16Order::Be) => Some(decode_utf16(bytes, u16::from_be_bytes)),
        None => None,
    }
}

enum Utf16Order {
    Le,
    Be,
}

/// Mostly-ASCII UTF-16 has a NUL in nearly every high byte and almost none
/// in the low bytes.
fn utf16_order(sample: &[u8]) -> Option<Utf16Order> {
    let pairs = sample.len() / 2;
    if pairs < 4 {
        return None;
    }
    let even_nuls = sample.iter().step_by(2).take(pairs).filter(|&&b| b == 0).count();
    let odd_nuls = sample.iter().skip(1).step_by(2).filter(|&&b| b == 0).count();

    let mostly = |n: usize| n * 10 >= pairs * 9;
    let rarely = |n: usize| n * 10 <= pairs;
    if mostly(odd_nuls) && rarely(even_nuls) {
        Some(Utf16Order::Le)
    } else if mostly(even_nuls) && rarely(odd_nuls) {
        Some(Utf16Order::Be)
    } else {
        None
    }
}

fn decode_utf16(bytes: &[u8], unit: fn([u8; 2]) -> u16) -> String {
    let units = bytes.chunks_exact(2).map(|pair| unit([pair[0], pair[1]]));
    char::decode_utf16(units)
        .map(|c| c.unwrap_or(char::REPLACEMENT_CHARACTER))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashProvider;
    use crate::store::InMemoryVectorStore;
    use std::sync::Arc;

    fn scanned(root: &Path, rel: &str, body: &[u8]) -> ScannedFile {
        let abs_path = root.join(rel);
        std::fs::write(&abs_path, body).unwrap();
        ScannedFile {
            abs_path,
            rel_path: rel.to_string(),
        }
    }

    #[tokio::test]
    async fn unparsed_file_uses_fallback_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let store = InMemoryVectorStore::new(Arc::new(HashProvider::new(32)));
        let registry = ParserRegistry::empty();
        let chunking = ChunkingConfig::default();
        let writer = IndexWriter::new(&registry, &store, &chunking);
        let mut tracker = ChangeTracker::load(&dir.path().join(".oracle_index"));

        let body = "This deployment guide explains how the oracle indexes a repository.\n".repeat(3);
        let file = scanned(dir.path(), "GUIDE.txt", body.as_bytes());
        let outcome = writer.index_file(&mut tracker, &file).await.unwrap();

        assert_eq!(outcome, FileOutcome::Fallback { chunks: 1 });
        assert!(tracker.get("GUIDE.txt").is_some());

        let hits = store.query_text(CHUNK_COLLECTION, "deployment", 5).await.unwrap();
        assert_eq!(hits[0].id, "GUIDE.txt:fb_0");
        assert_eq!(
            hits[0].metadata,
            serde_json::json!({"file": "GUIDE.txt", "kind": "fallback"})
        );
    }

    #[tokio::test]
    async fn binary_file_is_tracked_not_chunked() {
        let dir = tempfile::tempdir().unwrap();
        let store = InMemoryVectorStore::new(Arc::new(HashProvider::new(32)));
        let registry = ParserRegistry::empty();
        let chunking = ChunkingConfig::default();
        let writer = IndexWriter::new(&registry, &store, &chunking);
        let mut tracker = ChangeTracker::load(&dir.path().join(".oracle_index"));

        let file = scanned(dir.path(), "logo.png", &[0x89, b'P', b'N', b'G', 0, 0, 1]);
        let outcome = writer.index_file(&mut tracker, &file).await.unwrap();
        assert_eq!(outcome, FileOutcome::Skipped);
        assert_eq!(store.count(CHUNK_COLLECTION).await.unwrap(), 0);
        assert!(tracker.get("logo.png").is_some());
    }

    fn utf16le(text: &str, bom: bool) -> Vec<u8> {
        let mut bytes = if bom { vec![0xFF, 0xFE] } else { Vec::new() };
        bytes.extend(text.encode_utf16().flat_map(u16::to_le_bytes));
        bytes
    }

    #[test]
    fn decode_source_recognises_utf16() {
        let text = "namespace Billing { class Invoice {} }";
        assert_eq!(decode_source(&utf16le(text, true)).as_deref(), Some(text));
        assert_eq!(decode_source(&utf16le(text, false)).as_deref(), Some(text));

        let mut be = vec![0xFE, 0xFF];
        be.extend(text.encode_utf16().flat_map(u16::to_be_bytes));
        assert_eq!(decode_source(&be).as_deref(), Some(text));

        assert_eq!(decode_source(b"plain ascii").as_deref(), Some("plain ascii"));
        assert!(decode_source(&[0x89, b'P', b'N', b'G', 0, 0, 0, 13, b'I', b'H', 0, 0]).is_none());
    }

    #[tokio::test]
    async fn utf16_text_file_is_indexed() {
        let dir = tempfile::tempdir().unwrap();
        let store = InMemoryVectorStore::new(Arc::new(HashProvider::new(32)));
        let registry = ParserRegistry::empty();
        let chunking = ChunkingConfig::default();
        let writer = IndexWriter::new(&registry, &store, &chunking);
        let mut tracker = ChangeTracker::load(&dir.path().join(".oracle_index"));

        let body = "Release checklist: bump the version, tag the commit, publish the crate.\n";
        let file = scanned(dir.path(), "RELEASE.txt", &utf16le(body, true));
        let outcome = writer.index_file(&mut tracker, &file).await.unwrap();
        assert_eq!(outcome, FileOutcome::Fallback { chunks: 1 });

        let hits = store.query_text(CHUNK_COLLECTION, "release checklist", 1).await.unwrap();
        assert_eq!(hits[0].document, body.trim_end());
    }

    #[tokio::test]
    async fn missing_file_is_unreadable_and_untracked() {
        let dir = tempfile::tempdir().unwrap();
        let store = InMemoryVectorStore::new(Arc::new(HashProvider::new(32)));
        let registry = ParserRegistry::empty();
        let chunking = ChunkingConfig::default();
        let writer = IndexWriter::new(&registry, &store, &chunking);
        let mut tracker = ChangeTracker::load(&dir.path().join(".oracle_index"));

        let file = ScannedFile {
            abs_path: dir.path().join("gone.rs"),
            rel_path: "gone.rs".to_string(),
        };
        let err = writer.index_file(&mut tracker, &file).await.unwrap_err();
        assert!(matches!(err, OracleError::UnreadableFile { .. }));
        assert!(tracker.is_empty());
    }

    #[cfg(feature = "lang-python")]
    #[tokio::test]
    async fn syntax_chunks_get_ordinal_ids_and_full_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let store = InMemoryVectorStore::new(Arc::new(HashProvider::new(64)));
        let registry = ParserRegistry::load();
        let chunking = ChunkingConfig::default();
        let writer = IndexWriter::new(&registry, &store, &chunking);
        let mut tracker = ChangeTracker::load(&dir.path().join(".oracle_index"));

        let body = "def load_settings(path):\n    with open(path) as handle:\n        return handle.read()\n";
        let file = scanned(dir.path(), "settings.py", body.as_bytes());
        let outcome = writer.index_file(&mut tracker, &file).await.unwrap();
        assert_eq!(outcome, FileOutcome::Syntax { chunks: 1 });

        let hits = store.query_text(CHUNK_COLLECTION, "load settings", 1).await.unwrap();
        assert_eq!(hits[0].id, "settings.py:0");
        assert_eq!(hits[0].metadata["symbol"], "load_settings");
        assert_eq!(hits[0].metadata["language"], "python");
        assert_eq!(hits[0].metadata["start_line"], 1);
    }
}
